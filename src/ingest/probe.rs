use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::core::config::UploadConfig;
use crate::core::error::ProbeError;
use crate::core::types::Orientation;

// ---------------------------------------------------------------------------
// Prober capability
// ---------------------------------------------------------------------------

/// Narrow capability interface over the external media-inspection tool.
///
/// Probing happens only on the transcoded output, never the original staged
/// file, so the reported geometry matches what will actually be served.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Inspect the file's first video stream and classify its display
    /// aspect ratio. Structural failures error; unknown ratios do not.
    async fn probe(&self, path: &Path) -> Result<Orientation, ProbeError>;
}

// ---------------------------------------------------------------------------
// ffprobe output shape (only the fields we read)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    display_aspect_ratio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

/// Parse ffprobe JSON and classify the first video stream's display aspect
/// ratio.
///
/// Errors are structural only: malformed JSON, an empty stream list, or no
/// video stream carrying a `display_aspect_ratio` field. A ratio value we do
/// not recognize classifies as `Orientation::Other` rather than erroring.
pub fn parse_probe_output(json: &[u8]) -> Result<Orientation, ProbeError> {
    let output: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| ProbeError::MalformedOutput {
            reason: e.to_string(),
        })?;

    if output.streams.is_empty() {
        return Err(ProbeError::NoStreams);
    }

    let ratio = output
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .find_map(|s| s.display_aspect_ratio.as_deref())
        .ok_or(ProbeError::MissingAspectRatio)?;

    Ok(Orientation::from_display_aspect_ratio(ratio))
}

// ---------------------------------------------------------------------------
// ffprobe implementation
// ---------------------------------------------------------------------------

/// Production prober invoking ffprobe:
/// `ffprobe -v error -print_format json -show_streams <path>`.
pub struct FfprobeProber {
    ffprobe_path: String,
}

impl FfprobeProber {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            ffprobe_path: config.ffprobe_path.clone(),
        }
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<Orientation, ProbeError> {
        let result = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()
            .await
            .map_err(|e| ProbeError::ToolNotFound {
                tool: self.ffprobe_path.clone(),
                reason: e.to_string(),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ProbeError::ExitFailure {
                status: result.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let orientation = parse_probe_output(&result.stdout)?;
        debug!(path = %path.display(), %orientation, "probe classified stream geometry");
        Ok(orientation)
    }
}
