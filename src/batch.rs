//! Batch orchestration
//!
//! A [`BatchSession`] is one requester's run through the state machine
//! `Idle → AwaitingManifest → AwaitingExtraCaption → Running →
//! {Completed | Cancelled}`. The session object carries all per-run mutable
//! state — work items, extra caption, cancellation token — so nothing about a
//! batch lives in process-wide ambient state.
//!
//! The [`Pipeline`] drives a session: strictly one item at a time, fetch
//! fully completing before the upload starts and the upload (all parts
//! included) completing before the next fetch begins, which bounds local disk
//! usage to one in-flight artifact. Cancellation is honored at item
//! boundaries only; an in-flight stage always runs to completion.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::classifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::progress::{ProgressSender, ProgressUpdate};
use crate::types::{BatchState, BatchSummary, Event, RequesterId, Stage, WorkItem};
use crate::uploader::Uploader;
use crate::utils::{artifact_prefix, compose_caption, remove_quietly};

/// One requester's batch run: items, extra caption, and cancellation flag
#[derive(Debug)]
pub struct BatchSession {
    requester: RequesterId,
    state: BatchState,
    items: Vec<WorkItem>,
    extra_caption: Option<String>,
    cancel: CancellationToken,
}

impl BatchSession {
    /// Create an idle session for a requester
    pub fn new(requester: RequesterId) -> Self {
        Self {
            requester,
            state: BatchState::Idle,
            items: Vec::new(),
            extra_caption: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Requester this session belongs to
    pub fn requester(&self) -> RequesterId {
        self.requester
    }

    /// Current lifecycle state
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Classified work items accepted so far
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Clone of the cancellation token; cancelling it stops the run at the
    /// next item boundary
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Classify a manifest into this session
    ///
    /// Returns the item count. A manifest with no usable links is rejected
    /// with [`Error::NoItems`] and the session stays where it was.
    pub fn accept_manifest(&mut self, manifest: &str) -> Result<usize> {
        if !matches!(self.state, BatchState::Idle | BatchState::AwaitingManifest) {
            return Err(Error::InvalidState {
                state: self.state,
                action: "accept_manifest",
            });
        }
        let items = classifier::classify(manifest);
        if items.is_empty() {
            return Err(Error::NoItems);
        }
        info!(
            requester = %self.requester,
            items = items.len(),
            "manifest accepted"
        );
        self.items = items;
        self.state = BatchState::AwaitingExtraCaption;
        Ok(self.items.len())
    }

    /// Provide (or skip, with `None`) the batch-wide extra caption
    pub fn set_extra_caption(&mut self, extra: Option<String>) -> Result<()> {
        if self.state != BatchState::AwaitingExtraCaption {
            return Err(Error::InvalidState {
                state: self.state,
                action: "set_extra_caption",
            });
        }
        self.extra_caption = extra.filter(|s| !s.trim().is_empty());
        Ok(())
    }
}

/// Shared stage bundle that executes batch sessions
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub(crate) config: Arc<Config>,
    pub(crate) fetcher: Fetcher,
    pub(crate) uploader: Uploader,
    pub(crate) events: broadcast::Sender<Event>,
    pub(crate) updates: mpsc::Sender<ProgressUpdate>,
}

impl Pipeline {
    /// Drain the session's items in manifest order
    ///
    /// Per item: cancellation check, fetch, caption composition, upload,
    /// unconditional artifact cleanup, status event. Per-item failures are
    /// counted and skipped over; only cancellation stops the loop early, and
    /// items never started stay out of both counters.
    pub(crate) async fn run(&self, session: &mut BatchSession) -> Result<BatchSummary> {
        if session.state != BatchState::AwaitingExtraCaption {
            return Err(Error::InvalidState {
                state: session.state,
                action: "run",
            });
        }
        session.state = BatchState::Running;

        let requester = session.requester;
        let total = session.items.len();
        let mut summary = BatchSummary {
            succeeded: 0,
            failed: 0,
            total,
        };

        info!(requester = %requester, items = total, "batch started");
        let _ = self.events.send(Event::BatchStarted {
            requester,
            item_total: total,
        });

        for (i, item) in session.items.iter().enumerate() {
            let item_index = i + 1;

            if session.cancel.is_cancelled() {
                info!(
                    requester = %requester,
                    next_item = item_index,
                    "cancellation requested, stopping at item boundary"
                );
                session.state = BatchState::Cancelled;
                let _ = self.events.send(Event::BatchCancelled { requester, summary });
                return Ok(summary);
            }

            let _ = self.events.send(Event::ItemStarted {
                requester,
                item_index,
                item_total: total,
                url: item.url.clone(),
                kind: item.kind,
            });
            let progress = ProgressSender::new(
                requester,
                item_index,
                total,
                self.updates.clone(),
                self.events.clone(),
            );

            let prefix = artifact_prefix(requester);
            let artifact = match self.fetcher.fetch(item, &prefix, &progress).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    error!(
                        requester = %requester,
                        item_index,
                        url = %item.url,
                        stage = %Stage::Fetching,
                        error = %e,
                        "item failed during fetch"
                    );
                    summary.failed += 1;
                    let _ = self.events.send(Event::ItemFailed {
                        requester,
                        item_index,
                        item_total: total,
                        stage: Stage::Fetching,
                    });
                    continue;
                }
            };

            let caption = compose_caption(&item.label, session.extra_caption.as_deref());
            let outcome = self
                .uploader
                .upload(item, &artifact, &caption, requester, &progress)
                .await;

            // The artifact is finished with whatever happened above
            remove_quietly(&artifact.path).await;

            if outcome.success {
                summary.succeeded += 1;
                let _ = self.events.send(Event::ItemCompleted {
                    requester,
                    item_index,
                    item_total: total,
                });
            } else {
                error!(
                    requester = %requester,
                    item_index,
                    url = %item.url,
                    stage = %Stage::Uploading,
                    parts_succeeded = outcome.parts_succeeded,
                    parts_total = outcome.parts_total,
                    "item failed during upload"
                );
                summary.failed += 1;
                let _ = self.events.send(Event::ItemFailed {
                    requester,
                    item_index,
                    item_total: total,
                    stage: Stage::Uploading,
                });
            }
        }

        session.state = BatchState::Completed;
        info!(
            requester = %requester,
            succeeded = summary.succeeded,
            failed = summary.failed,
            total = summary.total,
            "batch completed"
        );
        let _ = self.events.send(Event::BatchCompleted { requester, summary });
        Ok(summary)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_walks_the_state_machine() {
        let mut session = BatchSession::new(RequesterId(1));
        assert_eq!(session.state(), BatchState::Idle);

        let count = session
            .accept_manifest("Notes: https://ex.com/b.pdf")
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(session.state(), BatchState::AwaitingExtraCaption);

        session.set_extra_caption(Some("Course X".to_string())).unwrap();
        assert_eq!(session.state(), BatchState::AwaitingExtraCaption);
    }

    #[test]
    fn empty_manifest_is_rejected_with_no_items() {
        let mut session = BatchSession::new(RequesterId(1));
        let err = session.accept_manifest("nothing useful here").unwrap_err();
        assert!(matches!(err, Error::NoItems));
        assert_eq!(session.state(), BatchState::Idle, "state is unchanged");
    }

    #[test]
    fn manifest_cannot_be_replaced_after_acceptance() {
        let mut session = BatchSession::new(RequesterId(1));
        session
            .accept_manifest("Notes: https://ex.com/b.pdf")
            .unwrap();

        let err = session
            .accept_manifest("Other: https://ex.com/c.pdf")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: BatchState::AwaitingExtraCaption,
                ..
            }
        ));
    }

    #[test]
    fn extra_caption_requires_an_accepted_manifest() {
        let mut session = BatchSession::new(RequesterId(1));
        let err = session.set_extra_caption(Some("X".to_string())).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn blank_extra_caption_counts_as_skipped() {
        let mut session = BatchSession::new(RequesterId(1));
        session
            .accept_manifest("Notes: https://ex.com/b.pdf")
            .unwrap();
        session.set_extra_caption(Some("   ".to_string())).unwrap();
        assert!(session.extra_caption.is_none());
    }

    #[test]
    fn cancel_token_clones_share_the_flag() {
        let session = BatchSession::new(RequesterId(1));
        let token = session.cancel_token();
        assert!(!session.cancel.is_cancelled());
        token.cancel();
        assert!(session.cancel.is_cancelled());
    }
}
