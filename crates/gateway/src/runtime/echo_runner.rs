//! A stand-in [`AgentRunner`] that echoes the last user message back.
//!
//! The real agent is an external contract this core does not implement
//! (see the runner trait's docs) — this exists so the gateway binary has
//! something to wire by default and so the HTTP surface can be exercised
//! end to end without a real agent attached.

use ag_domain::event::{AgentEvent, BoxStream};
use ag_domain::message::Role;
use ag_domain::runner::{AgentRunner, RunInvocation};
use ag_domain::Result;

pub struct EchoAgentRunner;

#[async_trait::async_trait]
impl AgentRunner for EchoAgentRunner {
    async fn run(&self, invocation: RunInvocation) -> Result<BoxStream<'static, AgentEvent>> {
        let content = invocation
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.clone())
            .unwrap_or_default();

        let response_id = uuid::Uuid::new_v4().to_string();
        let events = vec![
            AgentEvent::Delta { response_id: response_id.clone(), delta: content.clone() },
            AgentEvent::MessageFinal { response_id, content },
            AgentEvent::Done { usage: None },
        ];

        Ok(Box::pin(futures_util::stream::iter(events)))
    }
}
