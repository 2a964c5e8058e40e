use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::core::config::UploadConfig;
use crate::core::error::TranscodeError;

/// How much captured stderr to keep on a transcoder failure. ffmpeg puts the
/// actionable diagnostics at the end of its output.
const STDERR_TAIL_BYTES: usize = 2048;

// ---------------------------------------------------------------------------
// Remuxer capability
// ---------------------------------------------------------------------------

/// Narrow capability interface over the external remuxing tool, so tests can
/// substitute a fake without spawning processes.
#[async_trait]
pub trait Remuxer: Send + Sync {
    /// Rewrite `input` into `output` with container metadata at the front,
    /// without re-encoding the audio/video payloads.
    async fn remux(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

// ---------------------------------------------------------------------------
// ffmpeg implementation
// ---------------------------------------------------------------------------

/// Production remuxer invoking ffmpeg:
/// `ffmpeg -i <input> -c copy -movflags faststart -f mp4 <output>`.
///
/// Stream copy only; the payload bytes are untouched, the moov atom is moved
/// to the front so playback can start before the full file downloads.
pub struct FfmpegRemuxer {
    ffmpeg_path: String,
}

impl FfmpegRemuxer {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
        }
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    async fn remux(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let result = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(input)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .arg(output)
            .output()
            .await
            .map_err(|e| TranscodeError::ToolNotFound {
                tool: self.ffmpeg_path.clone(),
                reason: e.to_string(),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(TranscodeError::ExitFailure {
                status: result.status.to_string(),
                stderr: stderr_tail(&stderr),
            });
        }

        // Success requires a readable output file, not just a zero exit.
        tokio::fs::metadata(output)
            .await
            .map_err(|e| TranscodeError::UnreadableOutput {
                path: output.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            input = %input.display(),
            output = %output.display(),
            "fast-start remux complete"
        );
        Ok(())
    }
}

fn stderr_tail(stderr: &str) -> String {
    if stderr.len() <= STDERR_TAIL_BYTES {
        return stderr.trim().to_string();
    }
    let start = stderr.len() - STDERR_TAIL_BYTES;
    // Avoid splitting a UTF-8 sequence.
    let start = (start..stderr.len())
        .find(|&i| stderr.is_char_boundary(i))
        .unwrap_or(start);
    stderr[start..].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail_short_input() {
        assert_eq!(stderr_tail("  moov atom not found \n"), "moov atom not found");
    }

    #[test]
    fn test_stderr_tail_truncates_long_input() {
        let long = "x".repeat(10_000);
        let tail = stderr_tail(&long);
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
    }

    #[tokio::test]
    async fn test_missing_tool_is_distinguishable() {
        let remuxer = FfmpegRemuxer {
            ffmpeg_path: "/nonexistent/ffmpeg-binary".to_string(),
        };
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        std::fs::write(&input, b"not media").unwrap();

        let err = remuxer.remux(&input, &output).await.unwrap_err();
        assert!(matches!(err, TranscodeError::ToolNotFound { .. }));
    }
}
