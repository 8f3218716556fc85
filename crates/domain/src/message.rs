use serde::{Deserialize, Serialize};

/// A tool call attached to an assistant message, as it appears in a
/// reduced history snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments, assembled from streamed `TOOL_CALL_ARGS`
    /// deltas. Left as a string (not parsed) since malformed argument JSON
    /// must not fail history reduction.
    pub arguments: String,
}

/// The role a message plays in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    Activity,
}

/// A single part of a multimodal message's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

/// A message in the reduced conversation history.
///
/// This is the *output* shape the history reducer produces, not the wire
/// shape of AG-UI events (see [`crate::event::AgUiEvent`]) — one message
/// here is usually assembled from several events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_parts: Option<Vec<ContentPart>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_content: Option<serde_json::Value>,
}

impl Message {
    pub fn user(id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            name: Some(name.into()),
            content: Some(content.into()),
            content_parts: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            activity_type: None,
            activity_content: None,
        }
    }

    pub fn assistant(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            name: Some(name.into()),
            content: Some(String::new()),
            content_parts: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            activity_type: None,
            activity_content: None,
        }
    }

    pub fn tool_result(id: impl Into<String>, tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Tool,
            name: None,
            content: Some(content.into()),
            content_parts: None,
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            activity_type: None,
            activity_content: None,
        }
    }

    pub fn activity(id: impl Into<String>, activity_type: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            role: Role::Activity,
            name: None,
            content: None,
            content_parts: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            activity_type: Some(activity_type.into()),
            activity_content: Some(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_message_starts_empty() {
        let m = Message::assistant("a1", "agent");
        assert_eq!(m.content.as_deref(), Some(""));
        assert!(m.tool_calls.is_empty());
    }

    #[test]
    fn tool_result_carries_call_id() {
        let m = Message::tool_result("tm1", "c1", "42");
        assert_eq!(m.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(m.content.as_deref(), Some("42"));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
