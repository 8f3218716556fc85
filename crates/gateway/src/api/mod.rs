pub mod cancel;
pub mod chat;
pub mod health;
pub mod history;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the AG-UI API router.
///
/// The chat endpoint and `/cancel` are mounted under the configured base
/// path; `/cancel` has no dedicated config flag (unlike history) since
/// the cancel registry is core run bookkeeping, not an optional feature.
/// `/history` is mounted only when `history.enabled` is set. `/v1/health`
/// is always mounted, independent of the base path.
pub fn router(state: &AppState) -> Router<AppState> {
    let base = state.config.server.base_path.trim_end_matches('/');
    let chat_path = if base.is_empty() { "/".to_string() } else { base.to_string() };
    let cancel_path = format!("{base}/cancel");

    let mut router = Router::new()
        .route("/v1/health", get(health::health))
        .route(&chat_path, post(chat::chat))
        .route(&cancel_path, post(cancel::cancel));

    if state.config.history.enabled {
        let history_path = format!("{base}/history");
        router = router.route(&history_path, get(history::history));
    }

    router.layer(tower_http::trace::TraceLayer::new_for_http())
}
