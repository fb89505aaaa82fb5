//! Configuration types for media-relay

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Transfer limits and working directory
///
/// Groups settings shared by every stage of the pipeline. Used as a nested
/// sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Working directory for transient artifacts (default: "./downloads")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Maximum payload the destination accepts per message (default: 2 GiB)
    ///
    /// Artifacts above this size are split into `ceil(size / payload_cap)`
    /// parts before relaying.
    #[serde(default = "default_payload_cap")]
    pub payload_cap: u64,

    /// Maximum caption length the destination accepts, in characters (default: 1024)
    #[serde(default = "default_caption_limit")]
    pub caption_limit: usize,

    /// I/O chunk size for streaming reads and writes (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            payload_cap: default_payload_cap(),
            caption_limit: default_caption_limit(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Fetch stage configuration (timeouts, hardening, progress cadence)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Connection establishment timeout (default: 30s)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Full-transfer deadline for a single document fetch (default: 15min)
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout: Duration,

    /// User agent presented to source servers and the extraction engine
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-download retry count passed to the extraction engine (default: 10)
    #[serde(default = "default_engine_retries")]
    pub engine_retries: u32,

    /// Fragment-level retry count for adaptive streams (default: 10)
    #[serde(default = "default_engine_retries")]
    pub fragment_retries: u32,

    /// Skip certificate verification for source domains (default: true)
    ///
    /// Many of the course/CDN hosts this pipeline targets serve media behind
    /// broken certificate chains.
    #[serde(default = "default_true")]
    pub insecure: bool,

    /// Minimum interval between forwarded progress updates (default: 2.5s)
    ///
    /// Applied by the progress gate, not by the transfer stages themselves,
    /// so that the notification surface is never rate-limited by chunk-level
    /// reporting.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            transfer_timeout: default_transfer_timeout(),
            user_agent: default_user_agent(),
            engine_retries: default_engine_retries(),
            fragment_retries: default_engine_retries(),
            insecure: default_true(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// Upload stage configuration (retry policy and send deadline)
///
/// The retry policy is deliberately fixed-count with a fixed delay, not
/// exponential. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum send attempts per payload, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (default: 5s)
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Deadline for a single send attempt (default: 5min)
    #[serde(default = "default_send_timeout")]
    pub send_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            send_timeout: default_send_timeout(),
        }
    }
}

/// External tool paths (yt-dlp, ffmpeg)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            search_path: default_true(),
        }
    }
}

/// Main configuration for [`crate::MediaRelay`]
///
/// Fields are organized into logical sub-configs:
/// - [`transfer`](TransferConfig) — working directory, payload/caption limits
/// - [`fetch`](FetchConfig) — timeouts, network hardening, progress cadence
/// - [`upload`](UploadConfig) — bounded retry policy
/// - [`tools`](ToolsConfig) — external binary discovery
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer limits and working directory
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Fetch stage settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Upload stage settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Validate limits that the pipeline divides by or allocates from
    pub fn validate(&self) -> Result<()> {
        if self.transfer.payload_cap == 0 {
            return Err(Error::Config {
                message: "payload_cap must be greater than zero".to_string(),
                key: Some("payload_cap".to_string()),
            });
        }
        if self.transfer.chunk_size == 0 {
            return Err(Error::Config {
                message: "chunk_size must be greater than zero".to_string(),
                key: Some("chunk_size".to_string()),
            });
        }
        if self.transfer.caption_limit == 0 {
            return Err(Error::Config {
                message: "caption_limit must be greater than zero".to_string(),
                key: Some("caption_limit".to_string()),
            });
        }
        if self.upload.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".to_string(),
                key: Some("max_attempts".to_string()),
            });
        }
        Ok(())
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_payload_cap() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_caption_limit() -> usize {
    1024
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) media-relay/0.1".to_string()
}

fn default_engine_retries() -> u32 {
    10
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(2500)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_true() -> bool {
    true
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_destination_limits() {
        let config = Config::default();
        assert_eq!(config.transfer.payload_cap, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.transfer.caption_limit, 1024);
        assert_eq!(config.transfer.chunk_size, 1024 * 1024);
        assert_eq!(config.upload.max_attempts, 3);
        assert_eq!(config.upload.retry_delay, Duration::from_secs(5));
        assert!(config.fetch.insecure);
        assert!(config.tools.search_path);
    }

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_payload_cap_is_rejected() {
        let mut config = Config::default();
        config.transfer.payload_cap = 0;
        let err = config.validate().unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("payload_cap")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_max_attempts_is_rejected() {
        let mut config = Config::default();
        config.upload.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.transfer.payload_cap, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.fetch.engine_retries, 10);
    }

    #[test]
    fn serde_round_trip_preserves_overrides() {
        let mut config = Config::default();
        config.transfer.payload_cap = 4096;
        config.upload.retry_delay = Duration::from_millis(50);

        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transfer.payload_cap, 4096);
        assert_eq!(back.upload.retry_delay, Duration::from_millis(50));
    }
}
