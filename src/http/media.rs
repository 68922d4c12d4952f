use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::http::state::AppState;
use crate::media::catalog::VideoId;
use crate::media::mime::video_mime;

/// GET /video_raw/{id} — stream the whole video file from the source directory.
///
/// Only names that are valid video ids with a recognized extension are
/// served; anything else is a 404, so the route cannot be used to read other
/// files.
pub async fn serve_video(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Ok(id) = VideoId::new(name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(mime) = video_mime(id.as_str()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let path = state.reconciler.source().join(id.as_str());
    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(e) => {
            tracing::error!("Failed to open video {}: {}", path.display(), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let file_size = match file.metadata().await {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("Failed to stat video {}: {}", path.display(), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file_size));
    let body = Body::from_stream(ReaderStream::new(file));
    (StatusCode::OK, headers, body).into_response()
}

/// GET /thumb/{id} — the stored thumbnail for a video, or 404 if there is none.
/// The page falls back to a placeholder image on any error.
pub async fn serve_thumbnail(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Ok(id) = VideoId::new(name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let store = state.reconciler.store().clone();
    let read = tokio::task::spawn_blocking(move || store.read(&id)).await;
    match read {
        Ok(Ok(Some(bytes))) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                // A name can be reused by a different video after cleanup.
                (header::CACHE_CONTROL, "no-cache"),
            ],
            bytes,
        )
            .into_response(),
        Ok(Ok(None)) => StatusCode::NOT_FOUND.into_response(),
        Ok(Err(e)) => {
            tracing::warn!("Failed to read thumbnail: {}", e);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::error!("Thumbnail read task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
