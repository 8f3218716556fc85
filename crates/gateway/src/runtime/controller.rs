//! The run controller: drives one chat request's agent stream through the
//! translator and aggregator, persisting every emitted event to the track
//! and forwarding it to the SSE writer.
//!
//! One controller instance exists per HTTP request. It owns the run's
//! cancel token for its lifetime and is the only writer to the track for
//! that run — the session lock held by the caller guarantees as much.

use std::sync::Arc;
use std::time::Duration;

use ag_domain::event::{AgUiEvent, AgentEvent};
use ag_domain::runner::{AgentRunner, RunInvocation};
use ag_domain::trace::TraceEvent;
use ag_sessions::service::TrackService;
use ag_sessions::Session;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::aggregator::Aggregator;
use crate::runtime::cancel::CancelRegistry;
use crate::runtime::registry::{RunRegistry, RunStatus};
use crate::translator::EventTranslator;

pub struct RunOutcome {
    pub status: RunStatus,
    pub event_count: u64,
}

/// Start a run and return the channel the HTTP handler turns into an SSE
/// stream. The pump loop runs on its own spawned task so a slow or
/// disconnected client never blocks the agent from making progress — it
/// only stops pulling once the channel fills up.
///
/// The cancel token is registered synchronously, before this function
/// returns, so a caller that wants to wire a timeout (or any other
/// cancellation source) against `cancel_registry` can do so immediately
/// without racing the spawned pump task's own registration.
#[allow(clippy::too_many_arguments)]
pub fn run_controller(
    track_service: Arc<dyn TrackService>,
    session: Session,
    runner: Arc<dyn AgentRunner>,
    invocation: RunInvocation,
    cancel_registry: Arc<CancelRegistry>,
    run_registry: Arc<RunRegistry>,
    aggregate_text_deltas: bool,
    flush_interval: Duration,
) -> mpsc::Receiver<AgUiEvent> {
    let (tx, rx) = mpsc::channel(256);
    let run_id = invocation.run_id.clone();
    let cancel_token = cancel_registry.register(&run_id);
    run_registry.start(&run_id, &invocation.thread_id);

    tokio::spawn(async move {
        pump(
            track_service,
            session,
            runner,
            invocation,
            cancel_token,
            cancel_registry,
            run_registry,
            aggregate_text_deltas,
            flush_interval,
            tx,
        )
        .await;
    });
    rx
}

#[allow(clippy::too_many_arguments)]
async fn pump(
    track_service: Arc<dyn TrackService>,
    session: Session,
    runner: Arc<dyn AgentRunner>,
    invocation: RunInvocation,
    cancel_token: crate::runtime::cancel::CancelToken,
    cancel_registry: Arc<CancelRegistry>,
    run_registry: Arc<RunRegistry>,
    aggregate_text_deltas: bool,
    flush_interval: Duration,
    tx: mpsc::Sender<AgUiEvent>,
) -> RunOutcome {
    let thread_id = invocation.thread_id.clone();
    let run_id = invocation.run_id.clone();
    let session_key = session.key.to_string();
    let started = Instant::now();

    let mut translator = EventTranslator::new(thread_id.clone(), run_id.clone());
    let mut aggregator = Aggregator::new(aggregate_text_deltas);

    TraceEvent::RunStarted {
        session_key: session_key.clone(),
        run_id: run_id.clone(),
    }
    .emit();

    let status = match runner.run(invocation).await {
        Ok(mut stream) => {
            let mut final_status = RunStatus::Completed;
            let mut interval = tokio::time::interval(flush_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // first tick fires immediately; discard it

            loop {
                tokio::select! {
                    biased;

                    next = stream.next() => {
                        let agent_event = match next {
                            Some(event) => event,
                            None => AgentEvent::Done { usage: None },
                        };
                        let translated = translator.feed(agent_event.clone());
                        if !drain(translated, &mut aggregator, &track_service, &session, &tx, &run_registry, &run_id).await {
                            final_status = RunStatus::Failed;
                            break;
                        }
                        if translator.is_terminated() {
                            final_status = matches!(agent_event, AgentEvent::Error { .. })
                                .then_some(RunStatus::Failed)
                                .unwrap_or(RunStatus::Completed);
                            break;
                        }
                    }

                    _ = interval.tick() => {
                        if cancel_token.is_cancelled() {
                            let translated = translator.cancel("CANCELLED", "run cancelled");
                            drain(translated, &mut aggregator, &track_service, &session, &tx, &run_registry, &run_id).await;
                            final_status = RunStatus::Cancelled;
                            break;
                        }
                        let flushed = aggregator.flush();
                        if !write_out(flushed, &track_service, &session, &tx, &run_registry, &run_id).await {
                            final_status = RunStatus::Failed;
                            break;
                        }
                    }
                }
            }

            let flushed = aggregator.flush();
            write_out(flushed, &track_service, &session, &tx, &run_registry, &run_id).await;
            final_status
        }
        Err(e) => {
            let translated = translator.feed(AgentEvent::Error { message: e.to_string() });
            drain(translated, &mut aggregator, &track_service, &session, &tx, &run_registry, &run_id).await;
            let flushed = aggregator.flush();
            write_out(flushed, &track_service, &session, &tx, &run_registry, &run_id).await;
            RunStatus::Failed
        }
    };

    run_registry.finish(&run_id, status);
    cancel_registry.remove(&run_id);

    let event_count = run_registry.get(&run_id).map(|s| s.event_count).unwrap_or(0);
    match status {
        RunStatus::Completed => TraceEvent::RunFinished {
            session_key,
            run_id: run_id.clone(),
            event_count: event_count as usize,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit(),
        RunStatus::Cancelled => TraceEvent::RunCancelled {
            session_key,
            run_id: run_id.clone(),
            reason: "cancelled".to_string(),
        }
        .emit(),
        RunStatus::Failed => TraceEvent::RunError {
            session_key,
            run_id: run_id.clone(),
            code: "AGENT".to_string(),
            message: "run failed".to_string(),
        }
        .emit(),
        RunStatus::Running => {}
    }

    RunOutcome {
        status,
        event_count,
    }
}

/// Push translated events through the aggregator and write whatever comes
/// out the other side. Returns `false` if the track append failed or the
/// client disconnected, signalling the pump loop to stop.
async fn drain(
    events: Vec<AgUiEvent>,
    aggregator: &mut Aggregator,
    track_service: &Arc<dyn TrackService>,
    session: &Session,
    tx: &mpsc::Sender<AgUiEvent>,
    run_registry: &Arc<RunRegistry>,
    run_id: &str,
) -> bool {
    for event in events {
        let out = aggregator.append(event);
        if !write_out(out, track_service, session, tx, run_registry, run_id).await {
            return false;
        }
    }
    true
}

async fn write_out(
    events: Vec<AgUiEvent>,
    track_service: &Arc<dyn TrackService>,
    session: &Session,
    tx: &mpsc::Sender<AgUiEvent>,
    run_registry: &Arc<RunRegistry>,
    run_id: &str,
) -> bool {
    for event in events {
        let payload = match serde_json::to_value(&event) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(run_id, error = %e, "failed to serialize ag-ui event, dropping");
                continue;
            }
        };
        if let Err(e) = track_service.append_event(session, payload).await {
            tracing::warn!(run_id, error = %e, "failed to append event to track, aborting run");
            return false;
        }
        run_registry.record_event(run_id);
        if tx.send(event).await.is_err() {
            tracing::debug!(run_id, "sse receiver dropped, aborting run");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ag_domain::event::BoxStream;
    use ag_domain::message::Message;
    use ag_domain::Result;
    use ag_sessions::{SessionKey, SessionService, TrackService, TrackStore};
    use async_trait::async_trait;

    struct ScriptedRunner {
        events: Vec<AgentEvent>,
        /// When true, the stream never completes after yielding `events` —
        /// simulates an agent still "thinking" so a test can race a
        /// cancellation against it instead of a natural `Done`.
        hang_after: bool,
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        async fn run(&self, _invocation: RunInvocation) -> Result<BoxStream<'static, AgentEvent>> {
            let events = self.events.clone();
            let finite = futures_util::stream::iter(events);
            if self.hang_after {
                Ok(Box::pin(finite.chain(futures_util::stream::pending())))
            } else {
                Ok(Box::pin(finite))
            }
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl AgentRunner for FailingRunner {
        async fn run(&self, _invocation: RunInvocation) -> Result<BoxStream<'static, AgentEvent>> {
            Err(ag_domain::Error::Agent("agent unavailable".to_string()))
        }
    }

    fn invocation() -> RunInvocation {
        RunInvocation {
            thread_id: "t1".to_string(),
            run_id: "r1".to_string(),
            messages: vec![Message::user("u1", "user-1", "hi")],
            state: None,
            tools: None,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<AgUiEvent>) -> Vec<AgUiEvent> {
        let mut out = Vec::new();
        while let Some(ev) = rx.recv().await {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn happy_path_emits_start_text_and_finish() {
        let dir = tempfile::tempdir().unwrap();
        let track_store = Arc::new(TrackStore::new(dir.path()).unwrap());
        let sessions = Arc::new(SessionService::with_track_store(track_store));
        let key = SessionKey::new("app", "user-1", "s1").unwrap();
        let (session, _) = sessions.get_or_create(&key);

        let runner = Arc::new(ScriptedRunner {
            events: vec![
                AgentEvent::Delta { response_id: "m1".to_string(), delta: "hi".to_string() },
                AgentEvent::MessageFinal { response_id: "m1".to_string(), content: "hi".to_string() },
                AgentEvent::Done { usage: None },
            ],
            hang_after: false,
        });

        let rx = run_controller(
            sessions.clone() as Arc<dyn TrackService>,
            session.clone(),
            runner,
            invocation(),
            Arc::new(CancelRegistry::new()),
            Arc::new(RunRegistry::new()),
            true,
            Duration::from_millis(20),
        );

        let events = collect(rx).await;
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                AgUiEvent::RunStarted { .. } => "RUN_STARTED",
                AgUiEvent::TextMessageStart { .. } => "TEXT_MESSAGE_START",
                AgUiEvent::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
                AgUiEvent::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
                AgUiEvent::RunFinished { .. } => "RUN_FINISHED",
                _ => "OTHER",
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                "RUN_STARTED",
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END",
                "RUN_FINISHED",
            ]
        );

        let track = sessions.read_track(&key).await.unwrap();
        assert_eq!(track.len(), events.len());
    }

    #[tokio::test]
    async fn agent_error_before_any_event_still_opens_and_closes_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let track_store = Arc::new(TrackStore::new(dir.path()).unwrap());
        let sessions = Arc::new(SessionService::with_track_store(track_store));
        let key = SessionKey::new("app", "user-1", "s1").unwrap();
        let (session, _) = sessions.get_or_create(&key);

        let rx = run_controller(
            sessions.clone() as Arc<dyn TrackService>,
            session,
            Arc::new(FailingRunner),
            invocation(),
            Arc::new(CancelRegistry::new()),
            Arc::new(RunRegistry::new()),
            true,
            Duration::from_millis(20),
        );

        let events = collect(rx).await;
        assert!(matches!(events[0], AgUiEvent::RunStarted { .. }));
        assert!(matches!(events.last().unwrap(), AgUiEvent::RunError { .. }));
    }

    #[tokio::test]
    async fn cancellation_closes_the_run_with_cancelled_error() {
        let dir = tempfile::tempdir().unwrap();
        let track_store = Arc::new(TrackStore::new(dir.path()).unwrap());
        let sessions = Arc::new(SessionService::with_track_store(track_store));
        let key = SessionKey::new("app", "user-1", "s1").unwrap();
        let (session, _) = sessions.get_or_create(&key);

        let runner = Arc::new(ScriptedRunner {
            events: vec![AgentEvent::Delta { response_id: "m1".to_string(), delta: "partial".to_string() }],
            hang_after: true,
        });
        let cancel_registry = Arc::new(CancelRegistry::new());

        let rx = run_controller(
            sessions.clone() as Arc<dyn TrackService>,
            session,
            runner,
            invocation(),
            cancel_registry.clone(),
            Arc::new(RunRegistry::new()),
            true,
            Duration::from_millis(10),
        );

        // Give the pump loop a moment to process the one scripted delta,
        // then cancel before it would otherwise hang waiting for more.
        tokio::time::sleep(Duration::from_millis(15)).await;
        cancel_registry.cancel("r1");

        let events = collect(rx).await;
        let last = events.last().unwrap();
        match last {
            AgUiEvent::RunError { code, .. } => assert_eq!(code, "CANCELLED"),
            other => panic!("expected RUN_ERROR, got {other:?}"),
        }
    }
}
