//! `POST <base_path>/cancel` — cancel an in-flight run.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(rename = "appName")]
    #[allow(dead_code)]
    pub app_name: String,
    #[serde(rename = "userId")]
    #[allow(dead_code)]
    pub user_id: String,
    #[serde(rename = "sessionId")]
    #[allow(dead_code)]
    pub session_id: String,
    #[serde(rename = "runId")]
    pub run_id: String,
}

/// Cancel a run by id. `appName`/`userId`/`sessionId` are accepted per
/// the wire contract but not consulted — the cancel registry is keyed
/// by run id alone, which is already globally unique within a process.
pub async fn cancel(State(state): State<AppState>, Json(body): Json<CancelRequest>) -> impl IntoResponse {
    if state.cancel_registry.cancel(&body.run_id) {
        axum::http::StatusCode::NO_CONTENT.into_response()
    } else {
        (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no matching in-flight run" })),
        )
            .into_response()
    }
}
