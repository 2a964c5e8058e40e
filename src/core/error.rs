use thiserror::Error;

// ---------------------------------------------------------------------------
// Transcode errors
// ---------------------------------------------------------------------------

/// Errors from the fast-start remux step.
///
/// `ToolNotFound` and `ExitFailure` are deliberately separate variants so a
/// caller can distinguish "the transcoder is not installed" from "the input
/// media is bad"; the latter carries the tool's captured stderr.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("transcoder `{tool}` could not be started: {reason}")]
    ToolNotFound { tool: String, reason: String },

    #[error("transcoder exited with {status}: {stderr}")]
    ExitFailure { status: String, stderr: String },

    #[error("transcoder produced no readable output at {path}: {reason}")]
    UnreadableOutput { path: String, reason: String },
}

// ---------------------------------------------------------------------------
// Probe errors
// ---------------------------------------------------------------------------

/// Structural errors from the geometry probe step.
///
/// An unrecognized aspect-ratio *value* is never an error; it classifies as
/// `Orientation::Other`. Only structural failures land here.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("prober `{tool}` could not be started: {reason}")]
    ToolNotFound { tool: String, reason: String },

    #[error("prober exited with {status}: {stderr}")]
    ExitFailure { status: String, stderr: String },

    #[error("prober output is not parseable: {reason}")]
    MalformedOutput { reason: String },

    #[error("prober reported no streams")]
    NoStreams,

    #[error("no video stream with a display_aspect_ratio field")]
    MissingAspectRatio,
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from the object store backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store PUT failed for key {key}: {reason}")]
    PutFailed { key: String, reason: String },

    #[error("could not read local file for upload: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Record store errors
// ---------------------------------------------------------------------------

/// Errors from the video record store.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("video record not found: {id}")]
    NotFound { id: String },

    #[error("record store error: {reason}")]
    Backend { reason: String },
}

// ---------------------------------------------------------------------------
// Auth errors
// ---------------------------------------------------------------------------

/// Errors from bearer-token validation.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MissingToken,

    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },
}

// ---------------------------------------------------------------------------
// Ingest errors — the caller-visible taxonomy for the upload pipeline
// ---------------------------------------------------------------------------

/// Every failure the ingestion pipeline can surface, one variant per stage.
#[derive(Debug, Error)]
pub enum IngestError {
    // -- Validation (before any local I/O) --
    #[error("unsupported content type: expected {expected}, got {actual}")]
    UnsupportedContentType { expected: String, actual: String },

    #[error("upload too large: {size_bytes} bytes exceeds limit {max_bytes} bytes")]
    UploadTooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("missing multipart field `{field}`")]
    MissingField { field: String },

    // -- Staging --
    #[error("inbound stream failed: {reason}")]
    StreamFailed { reason: String },

    #[error("ingest I/O error: {0}")]
    Io(#[from] std::io::Error),

    // -- Later stages --
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Upload(#[from] StorageError),

    #[error("record update failed after upload: {0}")]
    Persist(#[source] RecordError),
}

impl IngestError {
    /// Map an ingest error to its HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::UnsupportedContentType { .. } => 415,
            IngestError::UploadTooLarge { .. } => 413,
            IngestError::MissingField { .. } | IngestError::StreamFailed { .. } => 400,
            IngestError::Io(_) => 500,
            IngestError::Transcode(e) => match e {
                TranscodeError::ExitFailure { .. } => 422,
                _ => 500,
            },
            IngestError::Probe(e) => match e {
                ProbeError::ToolNotFound { .. } => 500,
                _ => 422,
            },
            IngestError::Upload(_) => 502,
            IngestError::Persist(_) => 500,
        }
    }

    /// Stable error code string for JSON responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            IngestError::UnsupportedContentType { .. } => "unsupported_media_type",
            IngestError::UploadTooLarge { .. } => "payload_too_large",
            IngestError::MissingField { .. } => "missing_field",
            IngestError::StreamFailed { .. } => "upload_stream_failed",
            IngestError::Io(_) => "io_error",
            IngestError::Transcode(_) => "transcode_failed",
            IngestError::Probe(_) => "probe_failed",
            IngestError::Upload(_) => "storage_error",
            IngestError::Persist(_) => "persist_failed",
        }
    }

    /// Pipeline stage label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::UnsupportedContentType { .. } => "validate",
            IngestError::UploadTooLarge { .. }
            | IngestError::MissingField { .. }
            | IngestError::StreamFailed { .. }
            | IngestError::Io(_) => "stage",
            IngestError::Transcode(_) => "transcode",
            IngestError::Probe(_) => "probe",
            IngestError::Upload(_) => "upload",
            IngestError::Persist(_) => "persist",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_by_stage() {
        let e = IngestError::UnsupportedContentType {
            expected: "video/mp4".into(),
            actual: "video/avi".into(),
        };
        assert_eq!(e.status_code(), 415);
        assert_eq!(e.stage(), "validate");

        let e = IngestError::Transcode(TranscodeError::ExitFailure {
            status: "1".into(),
            stderr: "moov atom not found".into(),
        });
        assert_eq!(e.status_code(), 422);

        let e = IngestError::Transcode(TranscodeError::ToolNotFound {
            tool: "ffmpeg".into(),
            reason: "No such file or directory".into(),
        });
        assert_eq!(e.status_code(), 500);

        let e = IngestError::Probe(ProbeError::NoStreams);
        assert_eq!(e.status_code(), 422);
        assert_eq!(e.stage(), "probe");

        let e = IngestError::Upload(StorageError::PutFailed {
            key: "other/abc.mp4".into(),
            reason: "timeout".into(),
        });
        assert_eq!(e.status_code(), 502);
    }
}
