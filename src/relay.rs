//! Public facade: [`MediaRelay`]
//!
//! Owns the shared stage bundle, the event broadcast channel, the progress
//! gate task, and the map of running batches keyed by requester. One batch
//! runs per requester at a time; batches of distinct requesters are
//! independent and may run concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::batch::{BatchSession, Pipeline};
use crate::config::Config;
use crate::destination::Destination;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::progress;
use crate::types::{BatchSummary, Event, RequesterId};
use crate::uploader::Uploader;

/// Buffer size of the event broadcast channel
const EVENT_CHANNEL_SIZE: usize = 1024;

/// Buffer size of the raw progress channel feeding the gate
const PROGRESS_CHANNEL_SIZE: usize = 256;

/// Batch transfer front door (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaRelay {
    pipeline: Pipeline,
    event_tx: broadcast::Sender<Event>,
    /// Cancellation tokens of running batches, keyed by requester
    active: Arc<Mutex<HashMap<RequesterId, CancellationToken>>>,
}

impl MediaRelay {
    /// Create a new MediaRelay instance
    ///
    /// Validates the configuration, ensures the working directory exists,
    /// and spawns the progress gate that throttles byte-level updates onto
    /// the event stream.
    pub async fn new(config: Config, destination: Arc<dyn Destination>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.transfer.work_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create working directory '{}': {}",
                        config.transfer.work_dir.display(),
                        e
                    ),
                ))
            })?;

        let config = Arc::new(config);
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (update_tx, update_rx) = mpsc::channel(PROGRESS_CHANNEL_SIZE);
        // The gate runs detached until the last update sender is dropped
        let _gate = progress::spawn_gate(update_rx, event_tx.clone(), config.fetch.progress_interval);

        let fetcher = Fetcher::new(config.clone())?;
        let uploader = Uploader::new(config.clone(), destination);

        Ok(Self {
            pipeline: Pipeline {
                config,
                fetcher,
                uploader,
                events: event_tx.clone(),
                updates: update_tx,
            },
            event_tx,
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Subscribe to the batch event stream
    ///
    /// Every subscriber receives all events independently. Slow subscribers
    /// may observe lag on the broadcast channel; the pipeline never blocks on
    /// them.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The effective configuration
    pub fn config(&self) -> &Config {
        &self.pipeline.config
    }

    /// Classify a manifest and run the resulting batch to completion
    ///
    /// Returns the aggregate summary once the batch has drained, been
    /// cancelled, or failed to produce any work items. Per-item failures are
    /// reflected in the summary, never as an `Err`. A requester can only run
    /// one batch at a time.
    pub async fn start_batch(
        &self,
        requester: RequesterId,
        manifest: &str,
        extra_caption: Option<String>,
    ) -> Result<BatchSummary> {
        let mut session = BatchSession::new(requester);
        session.accept_manifest(manifest)?;
        session.set_extra_caption(extra_caption)?;

        {
            let mut active = self.active.lock().await;
            if active.contains_key(&requester) {
                return Err(Error::BatchInProgress(requester));
            }
            active.insert(requester, session.cancel_token());
        }

        let result = self.pipeline.run(&mut session).await;
        self.active.lock().await.remove(&requester);
        result
    }

    /// Request cancellation of a requester's running batch
    ///
    /// Takes effect at the next item boundary, never mid-item. Returns true
    /// when a running batch was signalled, false when none was found.
    pub async fn request_cancel(&self, requester: RequesterId) -> bool {
        match self.active.lock().await.get(&requester) {
            Some(token) => {
                info!(requester = %requester, "cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a batch is currently running for the requester
    pub async fn is_running(&self, requester: RequesterId) -> bool {
        self.active.lock().await.contains_key(&requester)
    }
}
