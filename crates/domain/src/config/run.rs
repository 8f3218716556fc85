use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run controller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Hard wall-clock budget for a single run before it is cancelled.
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum interval between forced HTTP writer flushes.
    #[serde(default = "d_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Whether adjacent TEXT_MESSAGE_CONTENT deltas for the same message
    /// id are coalesced before being streamed/persisted.
    #[serde(default = "d_true")]
    pub aggregate_text_deltas: bool,
    /// Whether more than one run may be in flight per session at once.
    #[serde(default)]
    pub allow_concurrent_runs_per_session: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: d_timeout_secs(),
            flush_interval_ms: d_flush_interval_ms(),
            aggregate_text_deltas: true,
            allow_concurrent_runs_per_session: false,
        }
    }
}

fn d_timeout_secs() -> u64 {
    120
}
fn d_flush_interval_ms() -> u64 {
    50
}
fn d_true() -> bool {
    true
}
