//! Size-aware artifact splitting
//!
//! Divides an oversized local file into ordered, re-assemblable byte-range
//! parts. Partition size is `ceil(total / part_count)`, so every part is at
//! most the partition size and only the last part can be smaller. I/O is
//! strictly sequential; this stage is disk-bound, not latency-sensitive.

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, info};

use crate::error::SplitError;
use crate::progress::ProgressSender;
use crate::types::{LocalArtifact, PartFile};
use crate::utils::{part_path, remove_quietly};

/// Split an artifact into exactly `part_count` part files
///
/// Parts are named `<base>_part<N><ext>` next to the source file and emit one
/// [`crate::types::Event::PartCreated`] each. On any failure every part written so far is
/// removed before the error is returned, so a failed split leaves no orphans.
pub async fn split(
    artifact: &LocalArtifact,
    part_count: u32,
    chunk_size: usize,
    progress: &ProgressSender,
) -> Result<Vec<PartFile>, SplitError> {
    if part_count == 0 {
        return Err(SplitError::InvalidPartCount(0));
    }

    let mut created: Vec<std::path::PathBuf> = Vec::with_capacity(part_count as usize);
    match split_inner(artifact, part_count, chunk_size, progress, &mut created).await {
        Ok(parts) => Ok(parts),
        Err(e) => {
            error!(
                path = %artifact.path.display(),
                parts_written = created.len(),
                error = %e,
                "split failed, removing partial parts"
            );
            for path in &created {
                remove_quietly(path).await;
            }
            Err(e)
        }
    }
}

async fn split_inner(
    artifact: &LocalArtifact,
    part_count: u32,
    chunk_size: usize,
    progress: &ProgressSender,
    created: &mut Vec<std::path::PathBuf>,
) -> Result<Vec<PartFile>, SplitError> {
    let partition = artifact.size.div_ceil(u64::from(part_count));
    let mut src = File::open(&artifact.path).await.map_err(|e| SplitError::Io {
        path: artifact.path.clone(),
        source: e,
    })?;

    let mut parts = Vec::with_capacity(part_count as usize);
    let mut buf = vec![0u8; chunk_size];

    for index in 1..=part_count {
        let path = part_path(&artifact.path, index);
        let mut dst = File::create(&path).await.map_err(|e| SplitError::Io {
            path: path.clone(),
            source: e,
        })?;
        created.push(path.clone());

        let mut written: u64 = 0;
        while written < partition {
            let want = std::cmp::min(chunk_size as u64, partition - written) as usize;
            let n = src
                .read(&mut buf[..want])
                .await
                .map_err(|e| SplitError::Io {
                    path: artifact.path.clone(),
                    source: e,
                })?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n]).await.map_err(|e| SplitError::Io {
                path: path.clone(),
                source: e,
            })?;
            written += n as u64;
        }
        dst.flush().await.map_err(|e| SplitError::Io {
            path: path.clone(),
            source: e,
        })?;

        info!(
            part = index,
            of = part_count,
            bytes = written,
            path = %path.display(),
            "created part file"
        );
        progress.part_created(index, part_count);

        parts.push(PartFile {
            path,
            index,
            count: part_count,
            size: written,
        });
    }

    let produced: u64 = parts.iter().map(|p| p.size).sum();
    if produced != artifact.size {
        return Err(SplitError::SizeMismatch {
            produced,
            expected: artifact.size,
        });
    }
    Ok(parts)
}
