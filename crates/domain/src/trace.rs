use serde::Serialize;

/// Structured trace events emitted across the AG-UI core crates.
///
/// Each variant is logged as a single `tracing::info!` call carrying the
/// event serialized as JSON, rather than as a scattered set of ad-hoc
/// `tracing::info!` call sites with inconsistent fields.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_key: String,
        is_new: bool,
    },
    TrackAppended {
        session_key: String,
        event_type: String,
    },
    RunStarted {
        session_key: String,
        run_id: String,
    },
    RunFinished {
        session_key: String,
        run_id: String,
        event_count: usize,
        duration_ms: u64,
    },
    RunError {
        session_key: String,
        run_id: String,
        code: String,
        message: String,
    },
    RunCancelled {
        session_key: String,
        run_id: String,
        reason: String,
    },
    HistoryReduced {
        session_key: String,
        message_count: usize,
        warning: Option<String>,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ag_event");
    }
}
