//! Resource retrieval with progress reporting
//!
//! Videos go through the external extraction engine (yt-dlp), which follows
//! redirects and adaptive manifests itself and retries at the fragment level.
//! Documents are streamed over plain HTTP in fixed-size chunks. Either way the
//! result is a [`LocalArtifact`] under the working directory named by the
//! caller's prefix; every failure mode maps to a [`FetchError`] the
//! orchestrator treats as a per-item, non-fatal fault.
//!
//! Cancellation is not checked here: a fetch runs to completion (or error)
//! once started, and the orchestrator decides at item boundaries.

use futures::StreamExt;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, FetchError, Result};
use crate::progress::ProgressSender;
use crate::transcode::{Transcoder, normalize_or_keep};
use crate::types::{LocalArtifact, MediaKind, Stage, WorkItem};
use crate::utils::{extension_from_url, find_by_prefix, remove_quietly, resolve_tool};

/// Fallback extension for documents whose URL path carries none
const DEFAULT_DOCUMENT_EXTENSION: &str = "pdf";

/// Retrieves one resource to local storage
#[derive(Clone)]
pub struct Fetcher {
    config: Arc<Config>,
    client: reqwest::Client,
    transcoder: Transcoder,
}

impl Fetcher {
    /// Build a fetcher sharing one hardened HTTP client across items
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.fetch.user_agent.clone())
            .connect_timeout(config.fetch.connect_timeout)
            .danger_accept_invalid_certs(config.fetch.insecure)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {e}"),
                key: None,
            })?;
        let transcoder = Transcoder::new(config.clone());
        Ok(Self {
            config,
            client,
            transcoder,
        })
    }

    /// Fetch one work item into the working directory under `prefix`
    pub async fn fetch(
        &self,
        item: &WorkItem,
        prefix: &str,
        progress: &ProgressSender,
    ) -> std::result::Result<LocalArtifact, FetchError> {
        match item.kind {
            MediaKind::Video => self.fetch_video(item, prefix, progress).await,
            MediaKind::Document => self.fetch_document(item, prefix, progress).await,
        }
    }

    /// Video path: delegate to the extraction engine, then normalize the container
    async fn fetch_video(
        &self,
        item: &WorkItem,
        prefix: &str,
        progress: &ProgressSender,
    ) -> std::result::Result<LocalArtifact, FetchError> {
        let engine = resolve_tool(
            self.config.tools.ytdlp_path.as_deref(),
            "yt-dlp",
            self.config.tools.search_path,
        )?;
        let work_dir = &self.config.transfer.work_dir;
        let template = work_dir.join(format!("{prefix}.%(ext)s"));

        info!(url = %item.url, prefix, "starting video fetch via extraction engine");

        let mut cmd = Command::new(&engine);
        cmd.arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--newline")
            .arg("--progress-template")
            .arg("download:%(progress.downloaded_bytes)s/%(progress.total_bytes_estimate)s")
            .args(["-f", "bv*+ba/b"])
            .args(["--retries", &self.config.fetch.engine_retries.to_string()])
            .args([
                "--fragment-retries",
                &self.config.fetch.fragment_retries.to_string(),
            ])
            .args([
                "--socket-timeout",
                &self.config.fetch.connect_timeout.as_secs().to_string(),
            ])
            .args(["--user-agent", &self.config.fetch.user_agent]);
        if self.config.fetch.insecure {
            cmd.arg("--no-check-certificate");
        }
        cmd.arg("-o")
            .arg(&template)
            .arg(&item.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| FetchError::ExternalTool {
            tool: "yt-dlp".to_string(),
            reason: format!("failed to spawn: {e}"),
        })?;

        // Forward the engine's own progress lines into the gated channel
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some((done, total)) = parse_progress_line(&line) {
                    progress.report(Stage::Fetching, done, total);
                }
            }
        }

        let status = child.wait().await.map_err(|e| FetchError::ExternalTool {
            tool: "yt-dlp".to_string(),
            reason: format!("failed to await: {e}"),
        })?;

        if !status.success() {
            self.discard_prefix(prefix).await;
            return Err(FetchError::ExternalTool {
                tool: "yt-dlp".to_string(),
                reason: format!("exited with {status}"),
            });
        }

        let produced = find_by_prefix(work_dir, prefix)
            .await
            .ok_or_else(|| FetchError::MissingOutput {
                prefix: prefix.to_string(),
            })?;

        // Non-canonical containers get one transcode attempt; the original
        // survives verbatim if that fails.
        progress.report(Stage::Transcoding, 0, None);
        let final_path = normalize_or_keep(&self.transcoder, &produced).await;

        let artifact = LocalArtifact::from_path(final_path.clone())
            .await
            .map_err(|e| FetchError::Io {
                path: final_path,
                source: e,
            })?;
        info!(
            url = %item.url,
            path = %artifact.path.display(),
            bytes = artifact.size,
            "video fetch complete"
        );
        Ok(artifact)
    }

    /// Document path: streaming GET written to disk in fixed-size chunks
    async fn fetch_document(
        &self,
        item: &WorkItem,
        prefix: &str,
        progress: &ProgressSender,
    ) -> std::result::Result<LocalArtifact, FetchError> {
        let ext = extension_from_url(&item.url)
            .unwrap_or_else(|| DEFAULT_DOCUMENT_EXTENSION.to_string());
        let path = self
            .config
            .transfer
            .work_dir
            .join(format!("{prefix}.{ext}"));

        info!(url = %item.url, path = %path.display(), "starting document fetch");

        let deadline = self.config.fetch.transfer_timeout;
        let result = tokio::time::timeout(
            deadline,
            self.stream_to_disk(item, &path, progress),
        )
        .await;

        match result {
            Ok(Ok(artifact)) => {
                info!(
                    url = %item.url,
                    bytes = artifact.size,
                    "document fetch complete"
                );
                Ok(artifact)
            }
            Ok(Err(e)) => {
                remove_quietly(&path).await;
                Err(e)
            }
            Err(_) => {
                warn!(url = %item.url, ?deadline, "document fetch timed out");
                remove_quietly(&path).await;
                Err(FetchError::Timeout(deadline))
            }
        }
    }

    async fn stream_to_disk(
        &self,
        item: &WorkItem,
        path: &std::path::Path,
        progress: &ProgressSender,
    ) -> std::result::Result<LocalArtifact, FetchError> {
        let response = self
            .client
            .get(&item.url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: item.url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: item.url.clone(),
            });
        }

        let total = response.content_length();
        let chunk_size = self.config.transfer.chunk_size;
        let mut file = tokio::fs::File::create(path).await.map_err(|e| FetchError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut stream = response.bytes_stream();
        let mut done: u64 = 0;
        let mut since_report: usize = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Network {
                url: item.url.clone(),
                source: e,
            })?;
            file.write_all(&chunk).await.map_err(|e| FetchError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            done += chunk.len() as u64;
            since_report += chunk.len();
            // Accumulated-byte report roughly once per chunk_size of data
            if since_report >= chunk_size {
                progress.report(Stage::Fetching, done, total);
                since_report = 0;
            }
        }
        file.flush().await.map_err(|e| FetchError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        progress.report(Stage::Fetching, done, total.or(Some(done)));

        debug!(bytes = done, "document stream finished");
        Ok(LocalArtifact {
            path: path.to_path_buf(),
            size: done,
        })
    }

    /// Remove whatever a failed engine run left behind under the prefix
    async fn discard_prefix(&self, prefix: &str) {
        let work_dir = &self.config.transfer.work_dir;
        let Ok(mut entries) = tokio::fs::read_dir(work_dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(prefix))
            {
                remove_quietly(&entry.path()).await;
            }
        }
    }
}

/// Parse one `downloaded/total` progress line from the extraction engine
///
/// The total is `NA` or `None` when the source does not announce one.
fn parse_progress_line(line: &str) -> Option<(u64, Option<u64>)> {
    let (done, total) = line.trim().split_once('/')?;
    // The engine prints byte counts as integers or floats, and "NA"/"None"
    // when the source announces no total
    let done = done.trim().parse::<f64>().ok()? as u64;
    let total = total.trim().parse::<f64>().ok().map(|t| t as u64);
    Some((done, total))
}
