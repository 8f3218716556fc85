//! Translates agent-internal events into framed AG-UI events.
//!
//! Owns the per-run framing state machine: which text message is
//! currently open, which tool calls are awaiting args/result, and whether
//! the run has already terminated. `feed` is the only entry point; it
//! never panics on out-of-order input from the agent — a truly impossible
//! transition degrades to an error close rather than a panic, since the
//! agent is an external, fallible collaborator.

use std::collections::HashMap;

use ag_domain::event::{AgUiEvent, AgentEvent};

struct OpenTextMessage {
    #[allow(dead_code)]
    role: String,
}

struct OpenToolCall {
    #[allow(dead_code)]
    parent_msg_id: String,
    #[allow(dead_code)]
    name: String,
}

/// Per-run framing state. One instance is owned exclusively by the run
/// controller's pump loop for the lifetime of a single run.
pub struct EventTranslator {
    thread_id: String,
    run_id: String,
    run_started_emitted: bool,
    open_text_messages: HashMap<String, OpenTextMessage>,
    open_tool_calls: HashMap<String, OpenToolCall>,
    current_text_message_id: Option<String>,
    terminated: bool,
}

impl EventTranslator {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            run_started_emitted: false,
            open_text_messages: HashMap::new(),
            open_tool_calls: HashMap::new(),
            current_text_message_id: None,
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Translate one agent event into zero or more framed AG-UI events.
    /// Inputs received after termination are silently ignored.
    pub fn feed(&mut self, event: AgentEvent) -> Vec<AgUiEvent> {
        if self.terminated {
            return Vec::new();
        }

        let mut out = Vec::new();
        self.maybe_emit_run_started(&mut out);

        match event {
            AgentEvent::Delta { response_id, delta } => self.on_delta(response_id, delta, &mut out),
            AgentEvent::MessageFinal { response_id, .. } => self.on_text_final(response_id, &mut out),
            AgentEvent::ToolCallBegin { call_id, name, parent_msg_id } => {
                self.on_tool_call_begin(call_id, name, parent_msg_id, &mut out)
            }
            AgentEvent::ToolCallArgs { call_id, delta } => {
                out.push(AgUiEvent::ToolCallArgs { tool_call_id: call_id, delta });
            }
            AgentEvent::ToolCallEnd { call_id } => {
                out.push(AgUiEvent::ToolCallEnd { tool_call_id: call_id });
            }
            AgentEvent::ToolCallResult { call_id, msg_id, content } => {
                self.open_tool_calls.remove(&call_id);
                out.push(AgUiEvent::ToolCallResult {
                    message_id: msg_id,
                    tool_call_id: call_id,
                    content,
                    role: Some("tool".into()),
                });
            }
            AgentEvent::Activity { activity_type, content } => {
                out.push(AgUiEvent::Custom { name: activity_type, value: content });
            }
            AgentEvent::Error { message } => self.on_terminate(Err(message), &mut out),
            AgentEvent::Done { .. } => self.on_terminate(Ok(()), &mut out),
        }

        out
    }

    fn maybe_emit_run_started(&mut self, out: &mut Vec<AgUiEvent>) {
        if !self.run_started_emitted {
            out.push(AgUiEvent::RunStarted {
                thread_id: self.thread_id.clone(),
                run_id: self.run_id.clone(),
            });
            self.run_started_emitted = true;
        }
    }

    fn on_delta(&mut self, response_id: String, delta: String, out: &mut Vec<AgUiEvent>) {
        if delta.is_empty() && self.current_text_message_id.as_deref() == Some(response_id.as_str()) {
            return;
        }

        if self.current_text_message_id.as_deref() != Some(response_id.as_str()) {
            self.close_current_text_message(out);
            out.push(AgUiEvent::TextMessageStart {
                message_id: response_id.clone(),
                role: "assistant".into(),
            });
            self.open_text_messages.insert(response_id.clone(), OpenTextMessage { role: "assistant".into() });
            self.current_text_message_id = Some(response_id.clone());
        }

        if !delta.is_empty() {
            out.push(AgUiEvent::TextMessageContent { message_id: response_id, delta });
        }
    }

    fn on_text_final(&mut self, response_id: String, out: &mut Vec<AgUiEvent>) {
        if self.open_text_messages.remove(&response_id).is_some() {
            out.push(AgUiEvent::TextMessageEnd { message_id: response_id.clone() });
            if self.current_text_message_id.as_deref() == Some(response_id.as_str()) {
                self.current_text_message_id = None;
            }
        }
    }

    fn on_tool_call_begin(&mut self, call_id: String, name: String, parent_msg_id: String, out: &mut Vec<AgUiEvent>) {
        if !self.open_text_messages.contains_key(&parent_msg_id) {
            out.push(AgUiEvent::TextMessageStart {
                message_id: parent_msg_id.clone(),
                role: "assistant".into(),
            });
            out.push(AgUiEvent::TextMessageEnd { message_id: parent_msg_id.clone() });
        }

        out.push(AgUiEvent::ToolCallStart {
            tool_call_id: call_id.clone(),
            tool_call_name: name.clone(),
            parent_message_id: Some(parent_msg_id.clone()),
        });
        self.open_tool_calls.insert(call_id, OpenToolCall { parent_msg_id, name });
    }

    fn on_terminate(&mut self, result: Result<(), String>, out: &mut Vec<AgUiEvent>) {
        // Close in LIFO order: tool calls nest inside their parent message.
        let open_calls: Vec<String> = self.open_tool_calls.keys().cloned().collect();
        for call_id in open_calls {
            out.push(AgUiEvent::ToolCallEnd { tool_call_id: call_id.clone() });
            self.open_tool_calls.remove(&call_id);
        }
        self.close_current_text_message(out);

        match result {
            Ok(()) => out.push(AgUiEvent::RunFinished {
                thread_id: self.thread_id.clone(),
                run_id: self.run_id.clone(),
            }),
            Err(message) => out.push(AgUiEvent::RunError { code: "AGENT".into(), message }),
        }
        self.terminated = true;
    }

    /// Force-terminate the run due to cancellation. Closes any open
    /// framing and emits `RUN_ERROR{code=CANCELLED}` (or the supplied
    /// code, e.g. for client-disconnect).
    pub fn cancel(&mut self, code: &str, message: &str) -> Vec<AgUiEvent> {
        if self.terminated {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.maybe_emit_run_started(&mut out);

        let open_calls: Vec<String> = self.open_tool_calls.keys().cloned().collect();
        for call_id in open_calls {
            out.push(AgUiEvent::ToolCallEnd { tool_call_id: call_id.clone() });
            self.open_tool_calls.remove(&call_id);
        }
        self.close_current_text_message(&mut out);

        out.push(AgUiEvent::RunError { code: code.into(), message: message.into() });
        self.terminated = true;
        out
    }

    fn close_current_text_message(&mut self, out: &mut Vec<AgUiEvent>) {
        if let Some(id) = self.current_text_message_id.take() {
            if self.open_text_messages.remove(&id).is_some() {
                out.push(AgUiEvent::TextMessageEnd { message_id: id });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(events: &[AgUiEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                AgUiEvent::RunStarted { .. } => "RUN_STARTED",
                AgUiEvent::RunFinished { .. } => "RUN_FINISHED",
                AgUiEvent::RunError { .. } => "RUN_ERROR",
                AgUiEvent::TextMessageStart { .. } => "TEXT_MESSAGE_START",
                AgUiEvent::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
                AgUiEvent::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
                AgUiEvent::ToolCallStart { .. } => "TOOL_CALL_START",
                AgUiEvent::ToolCallArgs { .. } => "TOOL_CALL_ARGS",
                AgUiEvent::ToolCallEnd { .. } => "TOOL_CALL_END",
                AgUiEvent::ToolCallResult { .. } => "TOOL_CALL_RESULT",
                _ => "OTHER",
            })
            .collect()
    }

    /// S1 — single assistant reply.
    #[test]
    fn single_assistant_reply() {
        let mut t = EventTranslator::new("t1", "r1");
        let mut out = t.feed(AgentEvent::Delta { response_id: "m1".into(), delta: "hello".into() });
        out.extend(t.feed(AgentEvent::Done { usage: None }));

        assert_eq!(
            types(&out),
            vec!["RUN_STARTED", "TEXT_MESSAGE_START", "TEXT_MESSAGE_CONTENT", "TEXT_MESSAGE_END", "RUN_FINISHED"]
        );
    }

    /// S3 — tool call with a synthetic parent message.
    #[test]
    fn tool_call_synthesizes_parent_message() {
        let mut t = EventTranslator::new("t1", "r1");
        let mut out = t.feed(AgentEvent::ToolCallBegin {
            call_id: "c1".into(),
            name: "calc".into(),
            parent_msg_id: "a1".into(),
        });
        out.extend(t.feed(AgentEvent::ToolCallArgs { call_id: "c1".into(), delta: "{\"x\":1}".into() }));
        out.extend(t.feed(AgentEvent::ToolCallEnd { call_id: "c1".into() }));
        out.extend(t.feed(AgentEvent::ToolCallResult {
            call_id: "c1".into(),
            msg_id: "tm1".into(),
            content: "42".into(),
        }));
        out.extend(t.feed(AgentEvent::Done { usage: None }));

        assert_eq!(
            types(&out),
            vec![
                "RUN_STARTED",
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_END",
                "TOOL_CALL_START",
                "TOOL_CALL_ARGS",
                "TOOL_CALL_END",
                "TOOL_CALL_RESULT",
                "RUN_FINISHED",
            ]
        );
    }

    #[test]
    fn switching_response_id_closes_previous_message() {
        let mut t = EventTranslator::new("t1", "r1");
        let mut out = t.feed(AgentEvent::Delta { response_id: "m1".into(), delta: "a".into() });
        out.extend(t.feed(AgentEvent::Delta { response_id: "m2".into(), delta: "b".into() }));

        assert_eq!(
            types(&out),
            vec!["RUN_STARTED", "TEXT_MESSAGE_START", "TEXT_MESSAGE_CONTENT", "TEXT_MESSAGE_END", "TEXT_MESSAGE_START", "TEXT_MESSAGE_CONTENT"]
        );
    }

    #[test]
    fn error_closes_open_framing() {
        let mut t = EventTranslator::new("t1", "r1");
        let mut out = t.feed(AgentEvent::Delta { response_id: "m1".into(), delta: "hi".into() });
        out.extend(t.feed(AgentEvent::Error { message: "boom".into() }));

        assert_eq!(
            types(&out),
            vec!["RUN_STARTED", "TEXT_MESSAGE_START", "TEXT_MESSAGE_CONTENT", "TEXT_MESSAGE_END", "RUN_ERROR"]
        );
        assert!(t.is_terminated());
    }

    #[test]
    fn events_after_termination_are_ignored() {
        let mut t = EventTranslator::new("t1", "r1");
        t.feed(AgentEvent::Done { usage: None });
        let out = t.feed(AgentEvent::Delta { response_id: "m1".into(), delta: "late".into() });
        assert!(out.is_empty());
    }

    /// S4 — cancellation mid-stream closes any open text message.
    #[test]
    fn cancel_closes_open_text_message() {
        let mut t = EventTranslator::new("t1", "r1");
        t.feed(AgentEvent::Delta { response_id: "m1".into(), delta: "foo".into() });
        let out = t.cancel("CANCELLED", "client cancelled");

        assert_eq!(types(&out), vec!["TEXT_MESSAGE_END", "RUN_ERROR"]);
        assert!(t.is_terminated());
    }

    #[test]
    fn empty_delta_is_dropped_but_does_not_reopen_message() {
        let mut t = EventTranslator::new("t1", "r1");
        let mut out = t.feed(AgentEvent::Delta { response_id: "m1".into(), delta: "hi".into() });
        out.extend(t.feed(AgentEvent::Delta { response_id: "m1".into(), delta: "".into() }));
        assert_eq!(types(&out), vec!["RUN_STARTED", "TEXT_MESSAGE_START", "TEXT_MESSAGE_CONTENT"]);
    }
}
