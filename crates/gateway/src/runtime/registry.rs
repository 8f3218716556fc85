//! In-memory bookkeeping for in-flight and recently finished runs.
//!
//! Unlike the track, which is the durable record of what happened, the
//! registry is a derived, best-effort view for operational visibility
//! (health checks, debugging) — it is never consulted to decide framing
//! or replay, and nothing depends on it surviving a restart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub thread_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub event_count: u64,
}

/// Tracks run summaries keyed by run id. Entries for finished runs are
/// kept around until the next idle prune so a `/cancel` race or a status
/// check right after completion still finds something.
pub struct RunRegistry {
    runs: Mutex<HashMap<String, RunSummary>>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn start(&self, run_id: &str, thread_id: &str) {
        self.runs.lock().insert(
            run_id.to_owned(),
            RunSummary {
                run_id: run_id.to_owned(),
                thread_id: thread_id.to_owned(),
                status: RunStatus::Running,
                started_at: Utc::now(),
                ended_at: None,
                event_count: 0,
            },
        );
    }

    pub fn record_event(&self, run_id: &str) {
        if let Some(summary) = self.runs.lock().get_mut(run_id) {
            summary.event_count += 1;
        }
    }

    pub fn finish(&self, run_id: &str, status: RunStatus) {
        if let Some(summary) = self.runs.lock().get_mut(run_id) {
            summary.status = status;
            summary.ended_at = Some(Utc::now());
        }
    }

    pub fn get(&self, run_id: &str) -> Option<RunSummary> {
        self.runs.lock().get(run_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop summaries for runs that ended more than `max_age` ago.
    pub fn prune_finished(&self, max_age: chrono::Duration) {
        let cutoff = Utc::now() - max_age;
        self.runs.lock().retain(|_, summary| match summary.ended_at {
            Some(ended_at) => ended_at > cutoff,
            None => true,
        });
    }
}
