//! Shared application state handed to every axum handler.

use std::sync::Arc;
use std::time::Instant;

use ag_domain::config::Config;
use ag_domain::runner::AgentRunner;
use ag_sessions::SessionService;

use crate::runtime::{CancelRegistry, RunRegistry, SessionLockMap};

/// Everything a request handler needs: configuration, the session/track
/// backend, the pluggable agent runner, and the process-wide run
/// bookkeeping (cancel registry, run registry, per-session lock map).
///
/// Cheap to clone — every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionService>,
    pub runner: Arc<dyn AgentRunner>,
    pub cancel_registry: Arc<CancelRegistry>,
    pub run_registry: Arc<RunRegistry>,
    pub session_locks: Arc<SessionLockMap>,
    pub started_at: Instant,
}
