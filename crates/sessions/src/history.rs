//! The history reducer: a stateless fold over a track's payloads that
//! reconstructs the canonical message list.
//!
//! Unlike every other component in this core, the reducer does not fail
//! fast. A track is produced by a live, possibly-interrupted run, so an
//! open text message or an awaiting-result tool call at the tail is
//! normal, not an error. The reducer returns whatever messages it could
//! reconstruct together with a diagnostic describing the first hard
//! violation it found, if any.

use ag_domain::event::AgUiEvent;
use ag_domain::message::{ContentPart, Message, Role, ToolCall};

use crate::track::TrackEvent;

/// Output of [`reduce`]: the reconstructed messages plus an optional
/// diagnostic. `warning` is `Some` both for tolerated incomplete tails
/// (S5) and for hard protocol violations (S6) — in both cases the
/// messages accumulated up to that point are still returned.
#[derive(Debug, Clone, Default)]
pub struct ReduceResult {
    pub messages: Vec<Message>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextPhase {
    Receiving,
    Ended,
}

struct TextState {
    buffer: String,
    phase: TextPhase,
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolPhase {
    AwaitingArgs,
    AwaitingResult,
    Completed,
}

struct ToolCallState {
    parent_index: usize,
    tool_call_index: usize,
    arg_buffer: String,
    phase: ToolPhase,
}

/// Reduce a track's payloads into a message snapshot.
///
/// `app_name`/`user_id` name the synthetic `name` field on assistant and
/// user messages respectively (mirroring the `SessionKey` the track was
/// read from).
pub fn reduce(events: &[TrackEvent], app_name: &str, user_id: &str) -> ReduceResult {
    let mut messages: Vec<Message> = Vec::new();
    let mut texts: std::collections::HashMap<String, TextState> = std::collections::HashMap::new();
    let mut tool_calls: std::collections::HashMap<String, ToolCallState> =
        std::collections::HashMap::new();
    let mut activity_seq: usize = 0;
    let mut warning: Option<String> = None;

    for track_event in events {
        let event: AgUiEvent = match serde_json::from_value(track_event.payload.clone()) {
            Ok(e) => e,
            Err(e) => {
                warning = Some(format!("malformed track payload: {e}"));
                break;
            }
        };

        let outcome = apply(
            event,
            app_name,
            user_id,
            &mut messages,
            &mut texts,
            &mut tool_calls,
            &mut activity_seq,
        );

        if let Err(e) = outcome {
            warning = Some(e);
            break;
        }
    }

    if warning.is_none() {
        if let Some(unclosed) = texts.values().find(|t| t.phase == TextPhase::Receiving) {
            let _ = unclosed;
            let id = texts
                .iter()
                .find(|(_, t)| t.phase == TextPhase::Receiving)
                .map(|(id, _)| id.clone());
            if let Some(id) = id {
                warning = Some(format!("unclosed text message at end of track: {id}"));
            }
        } else if let Some((id, _)) = tool_calls
            .iter()
            .find(|(_, t)| t.phase != ToolPhase::Completed)
        {
            warning = Some(format!("tool call never completed at end of track: {id}"));
        }
    }

    ReduceResult { messages, warning }
}

#[allow(clippy::too_many_arguments)]
fn apply(
    event: AgUiEvent,
    app_name: &str,
    user_id: &str,
    messages: &mut Vec<Message>,
    texts: &mut std::collections::HashMap<String, TextState>,
    tool_calls: &mut std::collections::HashMap<String, ToolCallState>,
    activity_seq: &mut usize,
) -> Result<(), String> {
    match event {
        AgUiEvent::RunStarted { .. } | AgUiEvent::RunFinished { .. } | AgUiEvent::RunError { .. } => {
            // Run framing events carry no reconstructable message content.
        }

        AgUiEvent::TextMessageStart { message_id, role } => {
            if texts.contains_key(&message_id) {
                return Err(format!("duplicate text message start: {message_id}"));
            }
            let role = parse_text_role(&role)?;
            let name = if role == Role::User { user_id } else { app_name };
            let index = messages.len();
            messages.push(Message {
                id: message_id.clone(),
                role,
                name: Some(name.to_string()),
                content: Some(String::new()),
                content_parts: None,
                tool_calls: Vec::new(),
                tool_call_id: None,
                activity_type: None,
                activity_content: None,
            });
            texts.insert(
                message_id,
                TextState {
                    buffer: String::new(),
                    phase: TextPhase::Receiving,
                    index,
                },
            );
        }

        AgUiEvent::TextMessageContent { message_id, delta } => {
            let state = texts
                .get_mut(&message_id)
                .ok_or_else(|| format!("text content without matching start: {message_id}"))?;
            if state.phase == TextPhase::Ended {
                return Err(format!("text message content after end: {message_id}"));
            }
            state.buffer.push_str(&delta);
            messages[state.index].content = Some(state.buffer.clone());
        }

        AgUiEvent::TextMessageEnd { message_id } => {
            let state = texts
                .get_mut(&message_id)
                .ok_or_else(|| format!("text message end without matching start: {message_id}"))?;
            if state.phase == TextPhase::Ended {
                return Err(format!("duplicate text message end: {message_id}"));
            }
            state.phase = TextPhase::Ended;
            messages[state.index].content = Some(state.buffer.clone());
        }

        AgUiEvent::TextMessageChunk { message_id, role, delta } => {
            let message_id = message_id
                .ok_or_else(|| "text message chunk missing id".to_string())?;
            if texts.contains_key(&message_id) {
                return Err(format!("duplicate text message chunk: {message_id}"));
            }
            let role = parse_text_role(&role.unwrap_or_else(|| "assistant".to_string()))?;
            let name = if role == Role::User { user_id } else { app_name };
            let content = delta.unwrap_or_default();
            let index = messages.len();
            messages.push(Message {
                id: message_id.clone(),
                role,
                name: Some(name.to_string()),
                content: Some(content.clone()),
                content_parts: None,
                tool_calls: Vec::new(),
                tool_call_id: None,
                activity_type: None,
                activity_content: None,
            });
            texts.insert(
                message_id,
                TextState {
                    buffer: content,
                    phase: TextPhase::Ended,
                    index,
                },
            );
        }

        AgUiEvent::ToolCallStart { tool_call_id, tool_call_name, parent_message_id } => {
            if tool_calls.contains_key(&tool_call_id) {
                return Err(format!("duplicate tool call start: {tool_call_id}"));
            }
            let parent_message_id = parent_message_id
                .ok_or_else(|| format!("tool call start missing parent message id: {tool_call_id}"))?;

            let parent_index = if let Some(state) = texts.get(&parent_message_id) {
                state.index
            } else {
                let index = messages.len();
                messages.push(Message {
                    id: parent_message_id.clone(),
                    role: Role::Assistant,
                    name: Some(app_name.to_string()),
                    content: Some(String::new()),
                    content_parts: None,
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                    activity_type: None,
                    activity_content: None,
                });
                texts.insert(
                    parent_message_id.clone(),
                    TextState {
                        buffer: String::new(),
                        phase: TextPhase::Ended,
                        index,
                    },
                );
                index
            };

            let tool_call_index = messages[parent_index].tool_calls.len();
            messages[parent_index].tool_calls.push(ToolCall {
                id: tool_call_id.clone(),
                name: tool_call_name,
                arguments: String::new(),
            });
            tool_calls.insert(
                tool_call_id,
                ToolCallState {
                    parent_index,
                    tool_call_index,
                    arg_buffer: String::new(),
                    phase: ToolPhase::AwaitingArgs,
                },
            );
        }

        AgUiEvent::ToolCallArgs { tool_call_id, delta } => {
            let state = tool_calls
                .get_mut(&tool_call_id)
                .ok_or_else(|| format!("tool call args without matching start: {tool_call_id}"))?;
            if state.phase != ToolPhase::AwaitingArgs {
                return Err(format!("tool call args after end: {tool_call_id}"));
            }
            state.arg_buffer.push_str(&delta);
        }

        AgUiEvent::ToolCallEnd { tool_call_id } => {
            let state = tool_calls
                .get_mut(&tool_call_id)
                .ok_or_else(|| format!("tool call end without matching start: {tool_call_id}"))?;
            if state.phase != ToolPhase::AwaitingArgs {
                return Err(format!("duplicate tool call end: {tool_call_id}"));
            }
            messages[state.parent_index].tool_calls[state.tool_call_index].arguments =
                state.arg_buffer.clone();
            state.phase = ToolPhase::AwaitingResult;
        }

        AgUiEvent::ToolCallResult { message_id, tool_call_id, content, .. } => {
            let state = tool_calls
                .get_mut(&tool_call_id)
                .ok_or_else(|| format!("tool call result without matching call: {tool_call_id}"))?;
            if state.phase != ToolPhase::AwaitingResult {
                return Err(format!("tool call result without completed end: {tool_call_id}"));
            }
            messages.push(Message::tool_result(message_id, tool_call_id.clone(), content));
            state.phase = ToolPhase::Completed;
        }

        AgUiEvent::Custom { name, value } if name == "user_message" => {
            append_user_message(messages, user_id, value);
        }

        other => {
            *activity_seq += 1;
            let (activity_type, content) = activity_fields(&other);
            messages.push(Message::activity(
                format!("activity:{app_name}:{activity_seq}"),
                activity_type,
                content,
            ));
        }
    }

    Ok(())
}

fn parse_text_role(role: &str) -> Result<Role, String> {
    match role {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        other => Err(format!("unsupported role: {other}")),
    }
}

fn append_user_message(messages: &mut Vec<Message>, user_id: &str, value: serde_json::Value) {
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("user-msg:{}", messages.len()));
    let content = value
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let mut msg = Message::user(id, user_id, content);
    if let Some(parts) = value.get("content_parts") {
        if let Ok(parts) = serde_json::from_value::<Vec<ContentPart>>(parts.clone()) {
            msg.content_parts = Some(parts);
        }
    }
    messages.push(msg);
}

/// Capture an activity-class event's fields into a wire-stable label +
/// opaque JSON blob, without interpreting the body.
fn activity_fields(event: &AgUiEvent) -> (String, serde_json::Value) {
    match event {
        AgUiEvent::StepStarted { step_name } => {
            ("STEP_STARTED".to_string(), serde_json::json!({ "step_name": step_name }))
        }
        AgUiEvent::StepFinished { step_name } => {
            ("STEP_FINISHED".to_string(), serde_json::json!({ "step_name": step_name }))
        }
        AgUiEvent::StateSnapshot { snapshot } => {
            ("STATE_SNAPSHOT".to_string(), snapshot.clone())
        }
        AgUiEvent::StateDelta { delta } => ("STATE_DELTA".to_string(), delta.clone()),
        AgUiEvent::MessagesSnapshot { messages } => {
            ("MESSAGES_SNAPSHOT".to_string(), messages.clone())
        }
        AgUiEvent::ActivitySnapshot { snapshot } => {
            ("ACTIVITY_SNAPSHOT".to_string(), snapshot.clone())
        }
        AgUiEvent::ActivityDelta { delta } => ("ACTIVITY_DELTA".to_string(), delta.clone()),
        AgUiEvent::Custom { name, value } => {
            (format!("CUSTOM:{name}"), value.clone())
        }
        AgUiEvent::Raw { value } => ("RAW".to_string(), value.clone()),
        // Handled by the caller before reaching here.
        _ => ("UNKNOWN".to_string(), serde_json::Value::Null),
    }
}
