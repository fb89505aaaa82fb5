//! Destination messaging surface abstraction
//!
//! The pipeline relays files through this trait; the concrete transport (a
//! chat bot API, a webhook bridge, a test double) lives outside the crate.
//! Implementations are responsible for honoring the destination's own payload
//! limits only to the extent of classifying rejections correctly — the
//! pipeline already splits payloads to [`crate::config::TransferConfig::payload_cap`]
//! and truncates captions before calling in.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::retry::IsRetryable;
use crate::types::RequesterId;

/// Errors a destination implementation can report
#[derive(Debug, Error)]
pub enum DestinationError {
    /// Transport-level failure; worth retrying
    #[error("network failure: {0}")]
    Network(String),

    /// The send did not finish in time; worth retrying
    #[error("send timed out: {0}")]
    Timeout(String),

    /// Protocol-level rejection (payload refused, permission denied); final
    #[error("rejected by destination: {0}")]
    Rejected(String),
}

impl IsRetryable for DestinationError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DestinationError::Network(_) | DestinationError::Timeout(_)
        )
    }
}

/// A messaging surface that accepts local files with captions
///
/// Both methods send one complete payload per call. The `chat` parameter is
/// the requester's chat; `streamable` asks the destination to present a video
/// as playable rather than as an opaque attachment.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Relay a video file
    async fn send_video(
        &self,
        chat: RequesterId,
        path: &Path,
        caption: &str,
        streamable: bool,
    ) -> Result<(), DestinationError>;

    /// Relay a generic document file
    async fn send_document(
        &self,
        chat: RequesterId,
        path: &Path,
        caption: &str,
    ) -> Result<(), DestinationError>;
}
