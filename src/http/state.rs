use std::sync::Arc;

use crate::media::reconcile::Reconciler;

/// Shared application state injected into all route handlers via axum::extract::State.
/// Arc provides cheap clone; the Reconciler serializes its own passes internally.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    /// Port shown next to the advertised address in the page banner.
    pub port: u16,
}
