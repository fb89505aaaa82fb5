//! Container normalization via an external encoder
//!
//! Some source hosts deliver video in containers the destination will not
//! stream (mkv, webm, raw HLS remuxes). The adapter shells out to ffmpeg with
//! fixed compatibility settings; the caller decides what to do on failure —
//! the fetch stage keeps the untranscoded original rather than failing the
//! item.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::utils::{remove_quietly, resolve_tool};

/// The canonical container the destination streams reliably
pub const CANONICAL_CONTAINER: &str = "mp4";

/// Adapter around the external encoding process
#[derive(Clone)]
pub struct Transcoder {
    config: Arc<Config>,
}

impl Transcoder {
    /// Create a transcoder backed by the configured (or discovered) ffmpeg
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Re-encode `input` into `output` with fixed quality/compatibility settings
    ///
    /// Target: H.264 constant quality, AAC audio, streaming-friendly layout.
    /// A non-zero exit or missing output file is an error; the adapter never
    /// retries.
    pub async fn transcode(&self, input: &Path, output: &Path) -> Result<(), FetchError> {
        let ffmpeg = resolve_tool(
            self.config.tools.ffmpeg_path.as_deref(),
            "ffmpeg",
            self.config.tools.search_path,
        )?;

        info!(
            input = %input.display(),
            output = %output.display(),
            "normalizing container via ffmpeg"
        );

        let status = Command::new(&ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args([
                "-c:v",
                "libx264",
                "-crf",
                "23",
                "-preset",
                "veryfast",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
            ])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| FetchError::ExternalTool {
                tool: "ffmpeg".to_string(),
                reason: format!("failed to spawn: {e}"),
            })?;

        if !status.success() {
            // A partial output would poison the prefix scan later
            remove_quietly(output).await;
            return Err(FetchError::ExternalTool {
                tool: "ffmpeg".to_string(),
                reason: format!("exited with {status}"),
            });
        }

        let produced = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if produced == 0 {
            remove_quietly(output).await;
            return Err(FetchError::ExternalTool {
                tool: "ffmpeg".to_string(),
                reason: "no output produced".to_string(),
            });
        }

        debug!(bytes = produced, "transcode complete");
        Ok(())
    }

    /// Whether a produced file already uses the canonical container
    pub fn is_canonical(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(CANONICAL_CONTAINER))
    }
}

/// Log-and-continue wrapper used by the fetch stage: on success the artifact
/// is replaced, on failure the original survives verbatim
pub(crate) async fn normalize_or_keep(
    transcoder: &Transcoder,
    original: &Path,
) -> std::path::PathBuf {
    if Transcoder::is_canonical(original) {
        return original.to_path_buf();
    }
    let target = original.with_extension(CANONICAL_CONTAINER);
    match transcoder.transcode(original, &target).await {
        Ok(()) => {
            remove_quietly(original).await;
            target
        }
        Err(e) => {
            warn!(
                path = %original.display(),
                error = %e,
                "transcode failed, relaying original container"
            );
            original.to_path_buf()
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_check_is_case_insensitive() {
        assert!(Transcoder::is_canonical(Path::new("/tmp/a.mp4")));
        assert!(Transcoder::is_canonical(Path::new("/tmp/a.MP4")));
        assert!(!Transcoder::is_canonical(Path::new("/tmp/a.mkv")));
        assert!(!Transcoder::is_canonical(Path::new("/tmp/a")));
    }

    #[tokio::test]
    async fn missing_tool_reports_tool_not_found() {
        let mut config = Config::default();
        config.tools.search_path = false;
        let transcoder = Transcoder::new(Arc::new(config));

        let err = transcoder
            .transcode(Path::new("/tmp/in.mkv"), Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn normalize_keeps_original_when_transcode_fails() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("clip.mkv");
        tokio::fs::write(&original, b"not really video").await.unwrap();

        let mut config = Config::default();
        config.tools.search_path = false; // force a transcode failure
        let transcoder = Transcoder::new(Arc::new(config));

        let kept = normalize_or_keep(&transcoder, &original).await;
        assert_eq!(kept, original);
        assert!(tokio::fs::try_exists(&original).await.unwrap());
    }

    #[tokio::test]
    async fn normalize_skips_canonical_files() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("clip.mp4");
        tokio::fs::write(&original, b"x").await.unwrap();

        let mut config = Config::default();
        config.tools.search_path = false;
        let transcoder = Transcoder::new(Arc::new(config));

        let kept = normalize_or_keep(&transcoder, &original).await;
        assert_eq!(kept, original, "canonical container needs no work");
    }
}
