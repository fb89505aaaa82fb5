//! # media-relay
//!
//! Backend library for batch media transfer: take a manifest of media links,
//! fetch each resource, and relay it to a destination messaging surface,
//! splitting files that exceed the destination's per-message payload cap.
//!
//! ## Design Philosophy
//!
//! media-relay is designed to be:
//! - **Library-first** - No CLI or chat front-end, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to a progress/status stream, no polling
//! - **Fault-isolating** - No per-item failure is ever fatal to a batch
//! - **Pluggable at the edges** - The destination transport is a trait; the
//!   manifest classifier is a pure function a front-end can replace
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_relay::{Config, Destination, DestinationError, MediaRelay, RequesterId};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! struct StdoutDestination;
//!
//! #[async_trait::async_trait]
//! impl Destination for StdoutDestination {
//!     async fn send_video(
//!         &self,
//!         chat: RequesterId,
//!         path: &Path,
//!         caption: &str,
//!         _streamable: bool,
//!     ) -> Result<(), DestinationError> {
//!         println!("video for {chat}: {} ({caption})", path.display());
//!         Ok(())
//!     }
//!
//!     async fn send_document(
//!         &self,
//!         chat: RequesterId,
//!         path: &Path,
//!         caption: &str,
//!     ) -> Result<(), DestinationError> {
//!         println!("document for {chat}: {} ({caption})", path.display());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = MediaRelay::new(Config::default(), Arc::new(StdoutDestination)).await?;
//!
//!     // Subscribe to events
//!     let mut events = relay.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = relay
//!         .start_batch(
//!             RequesterId::new(42),
//!             "Lecture 1: https://ex.com/a.mp4\nNotes: https://ex.com/b.pdf",
//!             Some("Course X".to_string()),
//!         )
//!         .await?;
//!     println!("done: {summary:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch sessions and orchestration
pub mod batch;
/// Manifest link classification
pub mod classifier;
/// Configuration types
pub mod config;
/// Destination messaging surface abstraction
pub mod destination;
/// Error types
pub mod error;
/// Resource retrieval (videos via the extraction engine, documents over HTTP)
pub mod fetcher;
/// Bounded-rate progress event gate
pub mod progress;
/// Public facade
pub mod relay;
/// Bounded fixed-delay retry
pub mod retry;
/// Size-aware artifact splitting
pub mod splitter;
/// Container normalization via an external encoder
pub mod transcode;
/// Core types and events
pub mod types;
/// Upload/relay stage
pub mod uploader;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use batch::BatchSession;
pub use config::{Config, FetchConfig, ToolsConfig, TransferConfig, UploadConfig};
pub use destination::{Destination, DestinationError};
pub use error::{Error, FetchError, Result, SplitError};
pub use fetcher::Fetcher;
pub use progress::ProgressSender;
pub use relay::MediaRelay;
pub use transcode::Transcoder;
pub use types::{
    BatchState, BatchSummary, Event, LocalArtifact, MediaKind, PartFile, RequesterId, Stage,
    TransferProgress, UploadOutcome, WorkItem,
};
pub use uploader::Uploader;
