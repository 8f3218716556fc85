//! `POST <base_path>` — start a run and stream AG-UI events over SSE.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;

use ag_domain::message::Message;
use ag_domain::runner::RunInvocation;
use ag_sessions::{SessionKey, TrackService};

use crate::runtime::run_controller;
use crate::runtime::session_lock::SessionBusy;
use crate::state::AppState;

/// Identifies the caller on a chat request. The AG-UI chat body
/// (`threadId`/`runId`/`messages`/`state`/`tools`) carries no notion of
/// `appName`/`userId` — those travel as query parameters instead,
/// mirroring `/cancel` and `/history`. Callers that omit them land in a
/// shared `default`/`default` scope.
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(rename = "appName", default = "default_app_name")]
    pub app_name: String,
    #[serde(rename = "userId", default = "default_user_id")]
    pub user_id: String,
}

fn default_app_name() -> String {
    "default".to_string()
}

fn default_user_id() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "threadId")]
    pub thread_id: String,
    #[serde(rename = "runId", default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub state: Option<serde_json::Value>,
    #[serde(default)]
    pub tools: Option<serde_json::Value>,
}

pub async fn chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    let key = match SessionKey::new(query.app_name, query.user_id, body.thread_id.clone()) {
        Ok(key) => key,
        Err(e) => {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let permit = match state.session_locks.try_acquire(&key.flat()) {
        Ok(permit) => permit,
        Err(SessionBusy) => {
            return (
                axum::http::StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({ "error": SessionBusy.to_string() })),
            )
                .into_response();
        }
    };

    let (session, _is_new) = state.sessions.get_or_create(&key);
    let run_id = body.run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let invocation = RunInvocation {
        thread_id: body.thread_id,
        run_id: run_id.clone(),
        messages: body.messages.into_iter().map(into_domain_message).collect(),
        state: body.state,
        tools: body.tools,
    };

    let rx = run_controller(
        state.sessions.clone() as std::sync::Arc<dyn TrackService>,
        session,
        state.runner.clone(),
        invocation,
        state.cancel_registry.clone(),
        state.run_registry.clone(),
        state.config.run.aggregate_text_deltas,
        Duration::from_millis(state.config.run.flush_interval_ms),
    );

    // run_controller registers the cancel token synchronously before
    // returning, so arming the timeout here can't race that registration.
    let cancel_registry = state.cancel_registry.clone();
    let timeout_run_id = run_id;
    let timeout = Duration::from_secs(state.config.run.timeout_secs);
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        cancel_registry.cancel(&timeout_run_id);
    });

    Sse::new(sse_stream(rx, permit)).keep_alive(KeepAlive::default()).into_response()
}

fn into_domain_message(msg: ChatMessage) -> Message {
    match msg.role.as_str() {
        "assistant" => {
            let mut m = Message::assistant(uuid::Uuid::new_v4().to_string(), "assistant");
            m.content = Some(msg.content);
            m
        }
        "user" => Message::user(uuid::Uuid::new_v4().to_string(), "user", msg.content),
        other => Message::activity(
            uuid::Uuid::new_v4().to_string(),
            other.to_string(),
            serde_json::json!({ "content": msg.content }),
        ),
    }
}

fn sse_stream(
    mut rx: tokio::sync::mpsc::Receiver<ag_domain::event::AgUiEvent>,
    _permit: tokio::sync::OwnedSemaphorePermit,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().data(data));
        }
        // _permit is dropped here, releasing the session lock.
    }
}
