use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::core::error::IngestError;
use crate::core::types::VideoId;

// ---------------------------------------------------------------------------
// Scoped temp-file lifetime
// ---------------------------------------------------------------------------

/// Owns a temp-file path and deletes the file when dropped.
///
/// Guards are created at acquisition time, before the file is written, so
/// deletion is guaranteed on every exit path out of the pipeline, including
/// partial writes and mid-stage errors. A guard is never handed across
/// requests; each pipeline run owns its guards exclusively.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Request-unique staging paths
// ---------------------------------------------------------------------------

/// Random per-request token so concurrent ingests of the same record never
/// collide on temp-file names.
pub fn request_token() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

/// Path for the raw staged copy of an upload.
pub fn staged_path(staging_dir: &Path, video_id: VideoId, token: &str) -> PathBuf {
    staging_dir.join(format!("{}.{}.src.mp4", video_id, token))
}

/// Path for the fast-start transcoded output.
pub fn transcoded_path(staging_dir: &Path, video_id: VideoId, token: &str) -> PathBuf {
    staging_dir.join(format!("{}.{}.faststart.mp4", video_id, token))
}

// ---------------------------------------------------------------------------
// Stream materializer
// ---------------------------------------------------------------------------

/// Copy an inbound byte stream to `dest`, byte for byte.
///
/// Enforces `max_bytes` while streaming; the caller's guard deletes any
/// partially written file. Returns the number of bytes written.
pub async fn materialize<S, E>(mut body: S, dest: &Path, max_bytes: u64) -> Result<u64, IngestError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| IngestError::StreamFailed {
            reason: e.to_string(),
        })?;
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(IngestError::UploadTooLarge {
                size_bytes: written,
                max_bytes,
            });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}
