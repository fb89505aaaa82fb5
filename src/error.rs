//! Error types for media-relay
//!
//! The top-level [`Error`] covers configuration and batch-level failures.
//! Per-item failures inside a running batch are represented by the domain
//! sub-errors ([`FetchError`], [`SplitError`], [`crate::destination::DestinationError`])
//! and are never fatal to the batch: the orchestrator logs them, counts the
//! item as failed, and moves on.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{BatchState, RequesterId};

/// Result type alias for media-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "payload_cap")
        key: Option<String>,
    },

    /// The manifest yielded zero classified work items
    #[error("no items found in manifest")]
    NoItems,

    /// A batch is already running for this requester
    #[error("a batch is already running for requester {0}")]
    BatchInProgress(RequesterId),

    /// A session method was called from a state that does not allow it
    #[error("invalid batch state {state:?} for {action}")]
    InvalidState {
        /// State the session was in when the call was made
        state: BatchState,
        /// The attempted operation
        action: &'static str,
    },

    /// Fetch-related error
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// File-splitting error
    #[error("split error: {0}")]
    Split(#[from] SplitError),

    /// Destination relay error
    #[error("destination error: {0}")]
    Destination(#[from] crate::destination::DestinationError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while retrieving a resource to local storage
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status code
    #[error("HTTP status {status} fetching {url}")]
    HttpStatus {
        /// The status code returned by the server
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Network-level failure (DNS, connect, TLS, mid-body disconnect)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that was requested
        url: String,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The transfer did not finish within the configured deadline
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The external engine finished but left no file matching the prefix
    #[error("no output file produced for prefix '{prefix}'")]
    MissingOutput {
        /// The destination filename prefix that was scanned for
        prefix: String,
    },

    /// An external tool exited unsuccessfully or could not be spawned
    #[error("external tool '{tool}' failed: {reason}")]
    ExternalTool {
        /// Tool name (yt-dlp, ffmpeg)
        tool: String,
        /// Exit status or spawn failure description
        reason: String,
    },

    /// A required external tool is not installed or not on PATH
    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    /// Local filesystem failure while writing the artifact
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being written
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced while partitioning an artifact into part files
#[derive(Debug, Error)]
pub enum SplitError {
    /// A part count of zero was requested
    #[error("invalid part count: {0}")]
    InvalidPartCount(u32),

    /// The produced parts do not add up to the source file size
    #[error("part sizes sum to {produced} bytes, expected {expected}")]
    SizeMismatch {
        /// Total bytes written across all parts
        produced: u64,
        /// Size of the source artifact
        expected: u64,
    },

    /// Filesystem failure while reading the source or writing a part
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being read or written
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
