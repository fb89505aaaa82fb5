//! Relay stage: push one artifact (or its parts) to the destination
//!
//! An artifact at or under the payload cap goes out as a single payload;
//! anything larger is split into `ceil(size / cap)` parts relayed in order,
//! each with a `Part i/N` caption suffix and each deleted the moment its
//! attempt resolves. Transient destination failures are retried on the fixed
//! policy in [`crate::retry`]; protocol rejections fail immediately. Nothing
//! in this stage is fatal to the batch — the orchestrator reads the
//! [`UploadOutcome`] and counts.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::destination::{Destination, DestinationError};
use crate::progress::ProgressSender;
use crate::retry::retry_fixed;
use crate::splitter;
use crate::types::{LocalArtifact, MediaKind, Stage, UploadOutcome, WorkItem};
use crate::utils::{remove_quietly, truncate_caption};

/// Pushes local files to the destination with size-aware splitting
#[derive(Clone)]
pub struct Uploader {
    config: Arc<Config>,
    destination: Arc<dyn Destination>,
}

impl Uploader {
    /// Create an uploader relaying through the given destination
    pub fn new(config: Arc<Config>, destination: Arc<dyn Destination>) -> Self {
        Self {
            config,
            destination,
        }
    }

    /// Relay one artifact, splitting it first when it exceeds the payload cap
    ///
    /// Never returns an error: every failure mode is absorbed into the
    /// outcome so the batch keeps draining.
    pub async fn upload(
        &self,
        item: &WorkItem,
        artifact: &LocalArtifact,
        caption: &str,
        chat: crate::types::RequesterId,
        progress: &ProgressSender,
    ) -> UploadOutcome {
        let cap = self.config.transfer.payload_cap;
        if artifact.size <= cap {
            progress.report(Stage::Uploading, 0, Some(artifact.size));
            let ok = self
                .upload_single(item, &artifact.path, caption, chat)
                .await;
            if ok {
                progress.report(Stage::Uploading, artifact.size, Some(artifact.size));
            }
            return UploadOutcome::single(ok);
        }

        let part_count = artifact.size.div_ceil(cap) as u32;
        info!(
            url = %item.url,
            size = artifact.size,
            cap,
            parts = part_count,
            "artifact exceeds payload cap, splitting"
        );
        progress.report(Stage::Splitting, 0, Some(artifact.size));

        let parts = match splitter::split(
            artifact,
            part_count,
            self.config.transfer.chunk_size,
            progress,
        )
        .await
        {
            Ok(parts) => parts,
            Err(e) => {
                error!(url = %item.url, error = %e, "split failed, item cannot be relayed");
                return UploadOutcome {
                    success: false,
                    parts_succeeded: 0,
                    parts_total: part_count,
                };
            }
        };

        let mut succeeded = 0u32;
        let mut relayed_bytes = 0u64;
        for part in &parts {
            let part_caption = format!("{caption}\n\nPart {}/{}", part.index, part.count);
            let ok = self
                .upload_single(item, &part.path, &part_caption, chat)
                .await;
            // The part file is finished with either way; reclaim disk now,
            // not at end of batch
            remove_quietly(&part.path).await;
            if ok {
                succeeded += 1;
                relayed_bytes += part.size;
                progress.report(Stage::Uploading, relayed_bytes, Some(artifact.size));
            } else {
                warn!(
                    url = %item.url,
                    part = part.index,
                    of = part.count,
                    "part upload failed, continuing with remaining parts"
                );
            }
        }

        UploadOutcome {
            success: succeeded == part_count,
            parts_succeeded: succeeded,
            parts_total: part_count,
        }
    }

    /// One payload, bounded retries, caption truncated before every attempt
    async fn upload_single(
        &self,
        item: &WorkItem,
        path: &Path,
        caption: &str,
        chat: crate::types::RequesterId,
    ) -> bool {
        let caption = truncate_caption(caption, self.config.transfer.caption_limit);
        let send_timeout = self.config.upload.send_timeout;
        let destination = self.destination.clone();
        let kind = item.kind;
        let path_owned = path.to_path_buf();

        let result = retry_fixed(
            self.config.upload.max_attempts,
            self.config.upload.retry_delay,
            || {
                let destination = destination.clone();
                let caption = caption.clone();
                let path = path_owned.clone();
                async move {
                    let send = async {
                        match kind {
                            MediaKind::Video => {
                                destination.send_video(chat, &path, &caption, true).await
                            }
                            MediaKind::Document => {
                                destination.send_document(chat, &path, &caption).await
                            }
                        }
                    };
                    match tokio::time::timeout(send_timeout, send).await {
                        Ok(result) => result,
                        Err(_) => Err(DestinationError::Timeout(format!(
                            "send exceeded {send_timeout:?}"
                        ))),
                    }
                }
            },
        )
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(
                    url = %item.url,
                    path = %path.display(),
                    error = %e,
                    "upload failed"
                );
                false
            }
        }
    }
}
