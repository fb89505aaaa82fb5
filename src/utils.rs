//! Utility functions for artifact naming, caption handling, and cleanup

use std::path::{Path, PathBuf};

use crate::error::FetchError;
use crate::types::RequesterId;

/// Build the transient-file prefix for one work item: `<requesterId>_<timestamp>`
///
/// The fetch stage appends an extension (or lets the extraction engine pick
/// one); [`find_by_prefix`] locates the result afterwards.
pub fn artifact_prefix(requester: RequesterId) -> String {
    format!("{}_{}", requester, chrono::Utc::now().timestamp_micros())
}

/// Derive the path of part `index` for an artifact: `<base>_part<N><ext>`
pub fn part_path(path: &Path, index: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_part{index}.{ext}"),
        None => format!("{stem}_part{index}"),
    };
    path.with_file_name(name)
}

/// Extract a plausible file extension from a URL's path, if it carries one
///
/// Query strings and fragments are ignored. Extensions longer than 5
/// characters are treated as noise (path segments with dots in them).
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?.to_string();
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Scan `dir` for the first regular file whose name starts with `prefix`
///
/// Skips the extraction engine's in-progress suffixes (`.part`, `.ytdl`) so a
/// half-written file is never mistaken for the finished artifact.
pub async fn find_by_prefix(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(prefix) {
            continue;
        }
        if name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            return Some(entry.path());
        }
    }
    None
}

/// Delete a file if it exists, logging rather than propagating failures
///
/// Cleanup must never fail the pipeline.
pub async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed transient file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove transient file"),
    }
}

/// Resolve an external tool from an explicit path or by searching PATH
pub(crate) fn resolve_tool(
    explicit: Option<&Path>,
    name: &str,
    search_path: bool,
) -> Result<PathBuf, FetchError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(FetchError::ToolNotFound(format!(
            "{name} not found at configured path {}",
            path.display()
        )));
    }
    if search_path {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }
    Err(FetchError::ToolNotFound(name.to_string()))
}

/// Compose the final caption for an item: the label alone, or label plus the
/// batch-wide extra caption separated by a blank line
pub fn compose_caption(label: &str, extra: Option<&str>) -> String {
    match extra {
        Some(extra) if !extra.trim().is_empty() => {
            format!("{label}\n\n{}", extra.trim()).trim().to_string()
        }
        _ => label.trim().to_string(),
    }
}

/// Truncate a caption to at most `limit` characters
pub fn truncate_caption(caption: &str, limit: usize) -> String {
    caption.chars().take(limit).collect()
}
