use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream of agent-internal events, the shape an
/// [`crate::runner::AgentRunner`] hands back for one invocation.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted by the underlying agent runner. This is the input
/// vocabulary to the event translator; it never crosses the HTTP boundary
/// directly — only [`AgUiEvent`] does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    /// An incremental assistant delta. `response_id` is stable across all
    /// deltas belonging to the same logical message.
    #[serde(rename = "delta")]
    Delta {
        response_id: String,
        delta: String,
    },
    /// The final, non-partial form of an assistant message.
    #[serde(rename = "message_final")]
    MessageFinal {
        response_id: String,
        content: String,
    },
    /// A tool invocation has begun. `parent_msg_id` names the assistant
    /// message the call is attached to; it need not already exist.
    #[serde(rename = "tool_call_begin")]
    ToolCallBegin {
        call_id: String,
        name: String,
        parent_msg_id: String,
    },
    #[serde(rename = "tool_call_args")]
    ToolCallArgs { call_id: String, delta: String },
    #[serde(rename = "tool_call_end")]
    ToolCallEnd { call_id: String },
    #[serde(rename = "tool_call_result")]
    ToolCallResult {
        call_id: String,
        msg_id: String,
        content: String,
    },
    /// Pass-through activity payload (step/state/custom/raw); the
    /// translator does not interpret its body.
    #[serde(rename = "activity")]
    Activity {
        activity_type: String,
        content: serde_json::Value,
    },
    /// Terminal success.
    #[serde(rename = "done")]
    Done { usage: Option<Usage> },
    /// Terminal failure.
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The wire-level AG-UI event vocabulary. Every event written to an SSE
/// frame, and every event persisted to a track, is one of these, encoded
/// as `{"type": "...", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgUiEvent {
    #[serde(rename = "RUN_STARTED")]
    RunStarted { thread_id: String, run_id: String },
    #[serde(rename = "RUN_FINISHED")]
    RunFinished { thread_id: String, run_id: String },
    #[serde(rename = "RUN_ERROR")]
    RunError {
        code: String,
        message: String,
    },
    #[serde(rename = "TEXT_MESSAGE_START")]
    TextMessageStart { message_id: String, role: String },
    #[serde(rename = "TEXT_MESSAGE_CONTENT")]
    TextMessageContent { message_id: String, delta: String },
    #[serde(rename = "TEXT_MESSAGE_END")]
    TextMessageEnd { message_id: String },
    #[serde(rename = "TEXT_MESSAGE_CHUNK")]
    TextMessageChunk {
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        delta: Option<String>,
    },
    #[serde(rename = "TOOL_CALL_START")]
    ToolCallStart {
        tool_call_id: String,
        tool_call_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },
    #[serde(rename = "TOOL_CALL_ARGS")]
    ToolCallArgs { tool_call_id: String, delta: String },
    #[serde(rename = "TOOL_CALL_END")]
    ToolCallEnd { tool_call_id: String },
    #[serde(rename = "TOOL_CALL_RESULT")]
    ToolCallResult {
        message_id: String,
        tool_call_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
    #[serde(rename = "STEP_STARTED")]
    StepStarted { step_name: String },
    #[serde(rename = "STEP_FINISHED")]
    StepFinished { step_name: String },
    #[serde(rename = "STATE_SNAPSHOT")]
    StateSnapshot { snapshot: serde_json::Value },
    #[serde(rename = "STATE_DELTA")]
    StateDelta { delta: serde_json::Value },
    #[serde(rename = "MESSAGES_SNAPSHOT")]
    MessagesSnapshot { messages: serde_json::Value },
    #[serde(rename = "ACTIVITY_SNAPSHOT")]
    ActivitySnapshot { snapshot: serde_json::Value },
    #[serde(rename = "ACTIVITY_DELTA")]
    ActivityDelta { delta: serde_json::Value },
    #[serde(rename = "CUSTOM")]
    Custom { name: String, value: serde_json::Value },
    #[serde(rename = "RAW")]
    Raw { value: serde_json::Value },
}

impl AgUiEvent {
    /// True for the two events that legally terminate a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgUiEvent::RunFinished { .. } | AgUiEvent::RunError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_started_tag_matches_wire_constant() {
        let event = AgUiEvent::RunStarted {
            thread_id: "t1".into(),
            run_id: "r1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RUN_STARTED");
    }

    #[test]
    fn run_finished_and_error_are_terminal() {
        assert!(AgUiEvent::RunFinished { thread_id: "t".into(), run_id: "r".into() }.is_terminal());
        assert!(AgUiEvent::RunError { code: "AGENT".into(), message: "x".into() }.is_terminal());
        assert!(!AgUiEvent::TextMessageEnd { message_id: "m".into() }.is_terminal());
    }

    #[test]
    fn agent_event_delta_round_trips() {
        let ev = AgentEvent::Delta { response_id: "m1".into(), delta: "hi".into() };
        let json = serde_json::to_string(&ev).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        match back {
            AgentEvent::Delta { response_id, delta } => {
                assert_eq!(response_id, "m1");
                assert_eq!(delta, "hi");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
