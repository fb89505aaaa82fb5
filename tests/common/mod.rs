//! Common test utilities for media-relay integration tests

use async_trait::async_trait;
use media_relay::{Config, Destination, DestinationError, MediaKind, RequesterId};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// One recorded destination call
#[derive(Clone, Debug)]
pub struct SentPayload {
    pub kind: MediaKind,
    pub chat: RequesterId,
    pub file_name: String,
    pub caption: String,
    pub bytes: u64,
}

/// Scriptable, recording destination double
///
/// Pops one result per call from the script (Ok once the script runs dry),
/// optionally sleeping inside each send and firing a oneshot on the first
/// call so tests can act while an upload is in flight.
pub struct RecordingDestination {
    sent: Mutex<Vec<SentPayload>>,
    script: Mutex<VecDeque<Result<(), DestinationError>>>,
    hold: Option<Duration>,
    first_send: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl RecordingDestination {
    pub fn new() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Result<(), DestinationError>>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
            hold: None,
            first_send: Mutex::new(None),
        })
    }

    /// A destination that sleeps inside every send and signals the first one
    pub fn holding(
        hold: Duration,
    ) -> (Arc<Self>, tokio::sync::oneshot::Receiver<()>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        (
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                script: Mutex::new(VecDeque::new()),
                hold: Some(hold),
                first_send: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    pub fn sent(&self) -> Vec<SentPayload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    async fn handle(
        &self,
        kind: MediaKind,
        chat: RequesterId,
        path: &Path,
        caption: &str,
    ) -> Result<(), DestinationError> {
        let bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        self.sent.lock().unwrap().push(SentPayload {
            kind,
            chat,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            caption: caption.to_string(),
            bytes,
        });
        if let Some(tx) = self.first_send.lock().unwrap().take() {
            let _ = tx.send(());
        }
        if let Some(hold) = self.hold {
            tokio::time::sleep(hold).await;
        }
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl Destination for RecordingDestination {
    async fn send_video(
        &self,
        chat: RequesterId,
        path: &Path,
        caption: &str,
        _streamable: bool,
    ) -> Result<(), DestinationError> {
        self.handle(MediaKind::Video, chat, path, caption).await
    }

    async fn send_document(
        &self,
        chat: RequesterId,
        path: &Path,
        caption: &str,
    ) -> Result<(), DestinationError> {
        self.handle(MediaKind::Document, chat, path, caption).await
    }
}

/// Config with a temp working directory, fast retries, and a tight gate interval
pub fn test_config() -> (Config, TempDir) {
    let temp = TempDir::new().expect("create temp dir");
    let mut config = Config::default();
    config.transfer.work_dir = temp.path().to_path_buf();
    config.transfer.chunk_size = 1024;
    config.upload.retry_delay = Duration::from_millis(10);
    config.fetch.progress_interval = Duration::from_millis(10);
    // Keep video tests deterministic: never pick up a host yt-dlp/ffmpeg
    config.tools.search_path = false;
    (config, temp)
}

/// Files currently present in the working directory
pub fn work_dir_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
