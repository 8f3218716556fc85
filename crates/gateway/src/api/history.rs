//! `GET <base_path>/history` — reduced message history for a session.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use ag_domain::message::Message;
use ag_domain::trace::TraceEvent;
use ag_sessions::{reduce, SessionKey, TrackService};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "appName")]
    pub app_name: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default)]
    pub follow: bool,
    #[serde(rename = "timeoutMs", default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Return the reduced message history for a session.
///
/// With `follow=true` there is no client-supplied cursor, so "wait for
/// new events" means: if the track is currently empty, block (bounded by
/// `timeoutMs`, itself capped by `history.max_follow_ms`) for the first
/// event to land before reducing; if it already has events, respond
/// immediately — there is nothing to wait for.
pub async fn history(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> impl IntoResponse {
    let key = match SessionKey::new(query.app_name, query.user_id, query.session_id) {
        Ok(key) => key,
        Err(e) => {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let events = if query.follow {
        let deadline_ms = query
            .timeout_ms
            .unwrap_or(state.config.history.max_follow_ms)
            .min(state.config.history.max_follow_ms);
        match state.sessions.follow_track(&key, Duration::from_millis(deadline_ms)).await {
            Ok(events) => events,
            Err(e) => {
                return (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": e.to_string() })),
                )
                    .into_response();
            }
        }
    } else {
        match state.sessions.read_track(&key).await {
            Ok(events) => events,
            Err(e) => {
                return (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": e.to_string() })),
                )
                    .into_response();
            }
        }
    };

    let result = reduce(&events, &key.app_name, &key.user_id);

    TraceEvent::HistoryReduced {
        session_key: key.to_string(),
        message_count: result.messages.len(),
        warning: result.warning.clone(),
    }
    .emit();

    Json(HistoryResponse {
        messages: result.messages,
        warning: result.warning,
    })
    .into_response()
}
