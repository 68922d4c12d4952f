pub mod media;
pub mod pages;
pub mod state;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use crate::http::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/watch/{id}", get(pages::watch))
        .route("/video_raw/{id}", get(media::serve_video))
        .route("/thumb/{id}", get(media::serve_thumbnail))
        .route("/api/videos", get(pages::catalog_json))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
