use std::borrow::Cow;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::state::AppState;
use crate::media::catalog::VideoId;
use crate::media::reconcile::Reconciliation;
use crate::net::local_ip;

const PLACEHOLDER_THUMB: &str = "https://placehold.co/320x180/111/white?text=No+Preview";

const STYLE: &str = r#"
:root { --primary: #ff4b2b; --secondary: #ff416c; --bg: #050510; --card-bg: rgba(255,255,255,0.03); }
body { font-family: 'Poppins', sans-serif; background: var(--bg); color: white; margin: 0; padding: 20px;
       background-image: radial-gradient(circle at 50% -20%, #2a1b3d 0%, #050510 80%); }
.container { max-width: 1200px; margin: auto; }
h1 { font-family: 'Orbitron', sans-serif; letter-spacing: 5px; margin-bottom: 5px;
     background: linear-gradient(90deg, #ff416c, #ff4b2b); -webkit-background-clip: text; -webkit-text-fill-color: transparent; }
.ip-banner { font-size: 0.9rem; color: #888; margin-bottom: 30px; border-left: 3px solid var(--primary); padding-left: 15px; }
.video-container { border-radius: 24px; overflow: hidden; border: 1px solid rgba(255,255,255,0.1);
                   box-shadow: 0 0 50px rgba(0,0,0,0.9), 0 0 20px rgba(255,75,43,0.2); }
video { width: 100%; display: block; background: black; }
.movie-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 30px; padding: 20px 0; }
.card { display: block; color: inherit; text-decoration: none; background: var(--card-bg); border-radius: 20px;
        overflow: hidden; border: 1px solid rgba(255,255,255,0.08); transition: all 0.4s cubic-bezier(0.175, 0.885, 0.32, 1.275); }
.card:hover { transform: translateY(-10px) scale(1.02); border-color: var(--primary); box-shadow: 0 15px 30px rgba(255,75,43,0.2); }
.thumb-wrapper { width: 100%; height: 160px; overflow: hidden; }
.thumb { width: 100%; height: 100%; object-fit: cover; transition: 0.5s; }
.card:hover .thumb { transform: scale(1.1); }
.card-info { padding: 18px; }
.movie-title { font-size: 0.95rem; font-weight: 600; margin: 0; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; color: #eee; }
.empty { color: #888; }
.back { color: #aaa; text-decoration: none; display: inline-block; margin-bottom: 15px; }
"#;

// Resume position is kept per video in localStorage; double-click toggles
// picture-in-picture.
const PLAYER_SCRIPT: &str = r#"
const video = document.getElementById('mainPlayer');
const storageKey = 'resume_' + video.dataset.video;
video.addEventListener('loadedmetadata', () => {
    const saved = localStorage.getItem(storageKey);
    if (saved) video.currentTime = saved;
});
video.addEventListener('timeupdate', () => {
    localStorage.setItem(storageKey, video.currentTime);
});
video.addEventListener('dblclick', () => {
    if (document.pictureInPictureElement) document.exitPictureInPicture();
    else video.requestPictureInPicture();
});
"#;

fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

fn url_segment(id: &VideoId) -> Cow<'_, str> {
    urlencoding::encode(id.as_str())
}

fn layout(title: &str, content: &str, port: u16) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<meta name="viewport" content="width=device-width, initial-scale=1, maximum-scale=1, user-scalable=0">
<link href="https://fonts.googleapis.com/css2?family=Orbitron:wght@700&family=Poppins:wght@300;600&display=swap" rel="stylesheet">
<style>{STYLE}</style>
</head>
<body>
<div class="container">
<h1>VIDSHELF</h1>
<div class="ip-banner">Streaming live at <b>{ip}:{port}</b></div>
{content}
</div>
</body>
</html>
"#,
        title = escape(title),
        ip = local_ip(),
    )
}

/// Render the catalog grid. Videos without a stored thumbnail still get a
/// card; the browser swaps in a placeholder when the image fails to load.
pub fn render_index(pass: &Reconciliation, port: u16) -> String {
    let mut grid = String::new();
    for id in pass.catalog.iter() {
        let url = url_segment(id);
        let name = escape(id.as_str());
        grid.push_str(&format!(
            r#"<a class="card" href="/watch/{url}">
<div class="thumb-wrapper"><img class="thumb" src="/thumb/{url}" alt="{name}" onerror="this.onerror=null;this.src='{PLACEHOLDER_THUMB}'"></div>
<div class="card-info"><p class="movie-title">{name}</p></div>
</a>
"#
        ));
    }
    let content = if pass.catalog.is_empty() {
        r#"<p class="empty">No videos found.</p>"#.to_string()
    } else {
        format!("<div class=\"movie-grid\">\n{grid}</div>")
    };
    layout("vidshelf", &content, port)
}

pub fn render_watch(id: &VideoId, port: u16) -> String {
    let name = escape(id.as_str());
    let content = format!(
        r#"<a class="back" href="/">&larr; Back to library</a>
<h3 id="title">Now Playing: <span style="color:var(--primary)">{name}</span></h3>
<div class="video-container">
<video id="mainPlayer" controls playsinline data-video="{name}">
<source src="/video_raw/{url}">
</video>
</div>
<script>{PLAYER_SCRIPT}</script>"#,
        url = url_segment(id),
    );
    layout(id.as_str(), &content, port)
}

/// GET / — reconcile the thumbnail cache, then render the catalog.
pub async fn index(State(state): State<AppState>) -> Response {
    match state.reconciler.reconcile().await {
        Ok(pass) => Html(render_index(&pass, state.port)).into_response(),
        Err(e) => {
            tracing::error!("Catalog unavailable: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "video directory is unreadable").into_response()
        }
    }
}

/// GET /watch/{id} — player page. Does not touch the catalog or the cache.
pub async fn watch(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match VideoId::new(name) {
        Ok(id) => Html(render_watch(&id, state.port)).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub thumbnail: bool,
}

#[derive(Debug, Serialize)]
pub struct CatalogBody {
    pub videos: Vec<CatalogEntry>,
    pub failed: Vec<String>,
}

impl From<&Reconciliation> for CatalogBody {
    fn from(pass: &Reconciliation) -> Self {
        CatalogBody {
            videos: pass
                .catalog
                .iter()
                .map(|id| CatalogEntry {
                    id: id.to_string(),
                    thumbnail: pass.has_thumbnail(id),
                })
                .collect(),
            failed: pass.failed.iter().map(VideoId::to_string).collect(),
        }
    }
}

/// GET /api/videos — reconcile, then return the catalog as JSON.
pub async fn catalog_json(State(state): State<AppState>) -> Response {
    match state.reconciler.reconcile().await {
        Ok(pass) => Json(CatalogBody::from(&pass)).into_response(),
        Err(e) => {
            tracing::error!("Catalog unavailable: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "video directory is unreadable").into_response()
        }
    }
}
