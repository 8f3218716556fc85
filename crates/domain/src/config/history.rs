use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History / sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Whether `GET /history` is mounted at all.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Upper bound on how long a `follow=true` history request may block
    /// waiting for new track events, regardless of the client-supplied
    /// `timeoutMs` query parameter.
    #[serde(default = "d_max_follow_ms")]
    pub max_follow_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_follow_ms: d_max_follow_ms(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_max_follow_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory the JSONL track files live under.
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            data_dir: d_data_dir(),
        }
    }
}

fn d_data_dir() -> String {
    "./data/sessions".into()
}
