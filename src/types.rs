//! Core types and events for media-relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Identity of the requester a batch belongs to
///
/// Doubles as the destination chat identifier: a batch relays its files back
/// to the chat of the requester that submitted the manifest.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RequesterId(pub i64);

impl RequesterId {
    /// Create a new RequesterId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RequesterId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequesterId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Media kind of a classified link
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A video resource, retrieved via the external extraction engine
    Video,
    /// A generic file (PDF and friends), retrieved over streaming HTTP
    Document,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Document => write!(f, "document"),
        }
    }
}

/// One classified manifest link: source URL, inferred kind, and label
///
/// Immutable once produced by the classifier; the orchestrator consumes it
/// read-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Source URL to fetch
    pub url: String,
    /// Inferred media kind
    pub kind: MediaKind,
    /// Caption label carried through to the relayed message
    pub label: String,
}

/// Pipeline stage an item is currently in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Retrieving the resource to local storage
    Fetching,
    /// Normalizing the container via the external encoder
    Transcoding,
    /// Partitioning an oversized artifact into parts
    Splitting,
    /// Relaying the artifact (or its parts) to the destination
    Uploading,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fetching => write!(f, "fetching"),
            Stage::Transcoding => write!(f, "transcoding"),
            Stage::Splitting => write!(f, "splitting"),
            Stage::Uploading => write!(f, "uploading"),
        }
    }
}

/// Byte-level progress of a single fetch or upload
///
/// Owned exclusively by the stage producing it. Derived figures (percent,
/// rate, ETA) are recomputed on demand and never stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Bytes transferred so far
    pub bytes_done: u64,
    /// Total bytes, when the source announces one
    pub bytes_total: Option<u64>,
    /// When the transfer started
    pub started_at: DateTime<Utc>,
    /// When progress was last recorded
    pub last_report: DateTime<Utc>,
}

impl TransferProgress {
    /// Start tracking a transfer with an optionally-known total
    pub fn start(bytes_total: Option<u64>) -> Self {
        let now = Utc::now();
        Self {
            bytes_done: 0,
            bytes_total,
            started_at: now,
            last_report: now,
        }
    }

    /// Record the cumulative byte count
    pub fn record(&mut self, bytes_done: u64) {
        self.bytes_done = bytes_done;
        self.last_report = Utc::now();
    }

    /// Completion percentage, when the total is known
    pub fn percent(&self) -> Option<f64> {
        self.bytes_total.filter(|t| *t > 0).map(|total| {
            (self.bytes_done as f64 / total as f64) * 100.0
        })
    }

    /// Average transfer rate in bytes per second since the start
    pub fn rate_bps(&self) -> f64 {
        let elapsed = (self.last_report - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / elapsed
    }

    /// Estimated time remaining, when the total is known and data is flowing
    pub fn eta(&self) -> Option<Duration> {
        let total = self.bytes_total?;
        let remaining = total.saturating_sub(self.bytes_done);
        let rate = self.rate_bps();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}

/// A fetched file on durable local storage with known size
///
/// Owned by the orchestrator between fetch completion and upload completion;
/// deleted unconditionally once the upload resolves or the batch is cancelled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalArtifact {
    /// Path to the file on disk
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl LocalArtifact {
    /// Build an artifact record from an existing file, reading its size
    pub async fn from_path(path: PathBuf) -> std::io::Result<Self> {
        let meta = tokio::fs::metadata(&path).await?;
        Ok(Self {
            path,
            size: meta.len(),
        })
    }
}

/// A contiguous byte-range slice of an artifact, numbered 1..count
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartFile {
    /// Path to the part file (`<base>_part<N><ext>`)
    pub path: PathBuf,
    /// 1-based part number
    pub index: u32,
    /// Total number of parts the artifact was split into
    pub count: u32,
    /// Size of this part in bytes
    pub size: u64,
}

/// Result of relaying one artifact, possibly across several parts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    /// True only when every part (or the single payload) was accepted
    pub success: bool,
    /// Parts accepted by the destination
    pub parts_succeeded: u32,
    /// Parts attempted (1 for an artifact under the cap)
    pub parts_total: u32,
}

impl UploadOutcome {
    /// Outcome of a single-payload attempt
    pub fn single(success: bool) -> Self {
        Self {
            success,
            parts_succeeded: u32::from(success),
            parts_total: 1,
        }
    }
}

/// Aggregate result of one batch run
///
/// Items skipped by cancellation appear in `total` but in neither counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items fetched and relayed successfully
    pub succeeded: usize,
    /// Items that failed at any stage
    pub failed: usize,
    /// Full manifest length, including items never started
    pub total: usize,
}

/// Lifecycle state of a batch session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Freshly created, no manifest accepted yet
    Idle,
    /// Waiting for a manifest to classify
    AwaitingManifest,
    /// Manifest accepted, waiting for the optional extra caption
    AwaitingExtraCaption,
    /// The pipeline is iterating work items
    Running,
    /// All items drained
    Completed,
    /// Stopped early at an item boundary by a cancellation request
    Cancelled,
}

/// Event emitted during batch lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch started running
    BatchStarted {
        /// Requester the batch belongs to
        requester: RequesterId,
        /// Number of classified work items
        item_total: usize,
    },

    /// An item entered the pipeline
    ItemStarted {
        /// Requester the batch belongs to
        requester: RequesterId,
        /// 1-based item position
        item_index: usize,
        /// Number of classified work items
        item_total: usize,
        /// Source URL
        url: String,
        /// Classified media kind
        kind: MediaKind,
    },

    /// Throttled byte-level progress for the item's current stage
    ItemProgress {
        /// Requester the batch belongs to
        requester: RequesterId,
        /// 1-based item position
        item_index: usize,
        /// Number of classified work items
        item_total: usize,
        /// Stage producing the progress
        stage: Stage,
        /// Bytes transferred so far
        bytes_done: u64,
        /// Total bytes, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes_total: Option<u64>,
    },

    /// The splitter finished writing one part file
    PartCreated {
        /// Requester the batch belongs to
        requester: RequesterId,
        /// 1-based item position
        item_index: usize,
        /// 1-based part number
        part_index: u32,
        /// Total parts for this artifact
        part_total: u32,
    },

    /// The item was fetched, relayed, and cleaned up successfully
    ItemCompleted {
        /// Requester the batch belongs to
        requester: RequesterId,
        /// 1-based item position
        item_index: usize,
        /// Number of classified work items
        item_total: usize,
    },

    /// The item failed; the batch continues with the next one
    ItemFailed {
        /// Requester the batch belongs to
        requester: RequesterId,
        /// 1-based item position
        item_index: usize,
        /// Number of classified work items
        item_total: usize,
        /// Stage the failure occurred in
        stage: Stage,
    },

    /// The batch drained every item
    BatchCompleted {
        /// Requester the batch belongs to
        requester: RequesterId,
        /// Aggregate counters
        summary: BatchSummary,
    },

    /// The batch stopped early on a cancellation request
    BatchCancelled {
        /// Requester the batch belongs to
        requester: RequesterId,
        /// Counters at the point of cancellation
        summary: BatchSummary,
    },
}
