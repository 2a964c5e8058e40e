use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::core::auth::bearer_token;
use crate::core::error::IngestError;
use crate::core::types::{UserId, VideoId, VideoRecord};
use crate::observability::metrics as obs;

use super::router::AppState;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Uniform JSON error body used by every handler.
fn error_json(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "message": message,
        })),
    )
        .into_response()
}

/// Resolve the caller from the `Authorization` header, or produce the
/// 401 response to return.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserId, Response> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = bearer_token(header_value).map_err(|e| {
        error_json(StatusCode::UNAUTHORIZED, "unauthorized", &e.to_string())
    })?;

    state.auth.verify_token(token).map_err(|e| {
        debug!(error = %e, "rejected bearer token");
        error_json(StatusCode::UNAUTHORIZED, "unauthorized", "Invalid token.")
    })
}

/// Fetch a record and enforce that the caller owns it.
async fn fetch_owned_record(
    state: &AppState,
    video_id: uuid::Uuid,
    caller: UserId,
) -> Result<VideoRecord, Response> {
    let id = VideoId::from_uuid(video_id);
    match state.videos.get(id).await {
        Ok(Some(record)) if record.owner_id == caller => Ok(record),
        Ok(Some(_)) => Err(error_json(
            StatusCode::FORBIDDEN,
            "forbidden",
            "You do not own this video.",
        )),
        Ok(None) => Err(error_json(
            StatusCode::NOT_FOUND,
            "video_not_found",
            "No such video.",
        )),
        Err(e) => {
            error!(video_id = %id, error = %e, "record store lookup failed");
            Err(error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "record_store_error",
                "Could not load the video record.",
            ))
        }
    }
}

/// Client-facing message for a pipeline failure. Validation errors carry
/// their own wording; later-stage failures get a generic line while the
/// diagnostic detail stays in the logs.
fn ingest_client_message(err: &IngestError) -> String {
    match err {
        IngestError::UnsupportedContentType { .. }
        | IngestError::UploadTooLarge { .. }
        | IngestError::MissingField { .. }
        | IngestError::StreamFailed { .. } => err.to_string(),
        IngestError::Transcode(_) => "Could not process the uploaded video.".to_string(),
        IngestError::Probe(_) => "Could not read the video's stream geometry.".to_string(),
        IngestError::Upload(_) => "Could not store the video.".to_string(),
        IngestError::Io(_) | IngestError::Persist(_) => "Internal error.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Video records
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateVideoRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// `POST /api/videos` — create an empty video record owned by the caller.
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateVideoRequest>,
) -> Response {
    let caller = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    if req.title.trim().is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "invalid_title",
            "Title must not be empty.",
        );
    }

    let record = VideoRecord::new(caller, req.title, req.description);
    if let Err(e) = state.videos.create(record.clone()).await {
        error!(error = %e, "record create failed");
        return error_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            "record_store_error",
            "Could not create the video record.",
        );
    }

    (StatusCode::CREATED, Json(record)).into_response()
}

/// `GET /api/videos` — list the caller's video records.
pub async fn list_videos(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let caller = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match state.videos.list_by_owner(caller).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!(error = %e, "record list failed");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "record_store_error",
                "Could not list video records.",
            )
        }
    }
}

/// `GET /api/videos/{video_id}` — fetch one of the caller's records.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<uuid::Uuid>,
    headers: HeaderMap,
) -> Response {
    let caller = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match fetch_owned_record(&state, video_id, caller).await {
        Ok(record) => Json(record).into_response(),
        Err(resp) => resp,
    }
}

// ---------------------------------------------------------------------------
// Video upload
// ---------------------------------------------------------------------------

/// `POST /api/videos/{video_id}/upload` — ingest a video payload.
///
/// The body is multipart form data; the payload must be in a field named
/// `video`. The field's bytes are streamed straight into the pipeline,
/// never buffered whole in memory.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<uuid::Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let caller = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let record = match fetch_owned_record(&state, video_id, caller).await {
        Ok(record) => record,
        Err(resp) => return resp,
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_json(
                    StatusCode::BAD_REQUEST,
                    "malformed_multipart",
                    &e.to_string(),
                )
            }
        };

        if field.name() != Some("video") {
            continue;
        }

        let declared_content_type = field.content_type().unwrap_or("").to_string();

        return match state
            .pipeline
            .ingest(record, &declared_content_type, Box::pin(field))
            .await
        {
            Ok(updated) => Json(updated).into_response(),
            Err(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                error_json(status, e.error_code(), &ingest_client_message(&e))
            }
        };
    }

    let err = IngestError::MissingField {
        field: "video".to_string(),
    };
    error_json(
        StatusCode::BAD_REQUEST,
        err.error_code(),
        &ingest_client_message(&err),
    )
}

// ---------------------------------------------------------------------------
// Thumbnail upload
// ---------------------------------------------------------------------------

/// `POST /api/videos/{video_id}/thumbnail` — set a video's thumbnail.
///
/// The image in the `thumbnail` multipart field is stored inline on the
/// record as a base64 data URL. Thumbnails are small, so unlike the video
/// path the whole payload is buffered in memory.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<uuid::Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let caller = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let mut record = match fetch_owned_record(&state, video_id, caller).await {
        Ok(record) => record,
        Err(resp) => return resp,
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                obs::inc_thumbnail_outcome("failure");
                return error_json(
                    StatusCode::BAD_REQUEST,
                    "malformed_multipart",
                    &e.to_string(),
                );
            }
        };

        if field.name() != Some("thumbnail") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            obs::inc_thumbnail_outcome("failure");
            return error_json(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                "Thumbnail must be an image.",
            );
        }

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                obs::inc_thumbnail_outcome("failure");
                return error_json(
                    StatusCode::BAD_REQUEST,
                    "upload_stream_failed",
                    &e.to_string(),
                );
            }
        };

        let max = state.config.upload.max_thumbnail_size_bytes;
        if data.len() as u64 > max {
            obs::inc_thumbnail_outcome("failure");
            return error_json(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                &format!("Thumbnail exceeds the {} byte limit.", max),
            );
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
        record.thumbnail_url = Some(format!("data:{};base64,{}", content_type, encoded));
        record.updated_at = Utc::now();

        if let Err(e) = state.videos.update(&record).await {
            warn!(video_id = %record.id, error = %e, "thumbnail record update failed");
            obs::inc_thumbnail_outcome("failure");
            return error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "persist_failed",
                "Could not update the video record.",
            );
        }

        obs::inc_thumbnail_outcome("success");
        return Json(record).into_response();
    }

    obs::inc_thumbnail_outcome("failure");
    error_json(
        StatusCode::BAD_REQUEST,
        "missing_field",
        "Multipart field `thumbnail` is required.",
    )
}

/// Decode a `data:{media_type};base64,{payload}` URL into its media type
/// and raw bytes.
fn parse_data_url(url: &str) -> Option<(&str, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (media_type, payload) = rest.split_once(";base64,")?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .ok()?;
    Some((media_type, data))
}

/// `GET /api/videos/{video_id}/thumbnail` — serve a video's thumbnail.
///
/// Unauthenticated: like the stored video objects themselves, thumbnails
/// are readable by anyone holding the video id. 404 when the record does
/// not exist or has no thumbnail set.
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<uuid::Uuid>,
) -> Response {
    let id = VideoId::from_uuid(video_id);
    let record = match state.videos.get(id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_json(StatusCode::NOT_FOUND, "video_not_found", "No such video.")
        }
        Err(e) => {
            error!(video_id = %id, error = %e, "record store lookup failed");
            return error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "record_store_error",
                "Could not load the video record.",
            );
        }
    };

    let Some(url) = record.thumbnail_url.as_deref() else {
        return error_json(
            StatusCode::NOT_FOUND,
            "thumbnail_not_found",
            "Video has no thumbnail.",
        );
    };

    match parse_data_url(url) {
        Some((media_type, data)) => {
            ([(header::CONTENT_TYPE, media_type.to_string())], data).into_response()
        }
        None => {
            error!(video_id = %id, "stored thumbnail is not a decodable data URL");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "thumbnail_unreadable",
                "Stored thumbnail could not be decoded.",
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Health and metrics
// ---------------------------------------------------------------------------

/// `GET /healthz` — liveness.
pub async fn healthz(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
    .into_response()
}

async fn check_tool(path: &str) -> Result<(), String> {
    match tokio::process::Command::new(path)
        .arg("-version")
        .output()
        .await
    {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(format!("exited with {}", out.status)),
        Err(e) => Err(format!("not runnable: {}", e)),
    }
}

/// `GET /readyz` — readiness.
///
/// Verifies the external media tools are runnable; a node whose transcoder
/// or prober is missing can serve record reads but not ingest, so it is
/// reported not ready.
pub async fn readyz(State(state): State<AppState>) -> Response {
    let ffmpeg = check_tool(&state.config.upload.ffmpeg_path).await;
    let ffprobe = check_tool(&state.config.upload.ffprobe_path).await;

    let ready = ffmpeg.is_ok() && ffprobe.is_ok();
    let check = |r: &Result<(), String>| match r {
        Ok(()) => json!({ "ok": true }),
        Err(reason) => json!({ "ok": false, "reason": reason }),
    };

    let body = Json(json!({
        "status": if ready { "ready" } else { "not_ready" },
        "checks": {
            "ffmpeg": check(&ffmpeg),
            "ffprobe": check(&ffprobe),
        },
    }));

    if ready {
        body.into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}

/// `GET /metrics` — Prometheus exposition.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics_handle.render(),
    )
        .into_response()
}
