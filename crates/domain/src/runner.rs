use crate::event::{AgentEvent, BoxStream};
use crate::message::Message;
use crate::Result;

/// One invocation of the underlying agent: the messages to replay, the
/// new user turn, and whatever opaque client state/tools accompanied the
/// request.
#[derive(Debug, Clone)]
pub struct RunInvocation {
    pub thread_id: String,
    pub run_id: String,
    pub messages: Vec<Message>,
    pub state: Option<serde_json::Value>,
    pub tools: Option<serde_json::Value>,
}

/// The external contract this core consumes. An agent runner turns one
/// invocation into a finite, single-reader stream of [`AgentEvent`]s.
///
/// Implementations own everything about *how* the agent produces text and
/// tool calls; the core only requires that the stream eventually yields a
/// `Done` or `Error` event.
#[async_trait::async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, invocation: RunInvocation) -> Result<BoxStream<'static, AgentEvent>>;
}
