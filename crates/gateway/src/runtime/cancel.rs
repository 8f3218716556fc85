//! Per-run cancellation tokens.
//!
//! Each streaming run gets a `CancelToken`. Calling `cancel()` signals the
//! run controller's pump loop to stop the run at its next suspension
//! point. The registry is keyed by run id so the `/cancel` endpoint (or a
//! timeout task) can find the right token without holding a reference to
//! the in-flight request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A cancellation token that can be checked by the run controller's pump
/// loop at every suspension point.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks active cancellation tokens per run id.
pub struct CancelRegistry {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Default for CancelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register a new cancel token for a run.
    pub fn register(&self, run_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(run_id.to_owned(), token.clone());
        token
    }

    /// Cancel a running run by id. Returns true if a token was found.
    pub fn cancel(&self, run_id: &str) -> bool {
        if let Some(token) = self.tokens.lock().get(run_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// Remove the token for a run (called when the run terminates).
    pub fn remove(&self, run_id: &str) {
        self.tokens.lock().remove(run_id);
    }

    /// Check if a run is currently registered (i.e. in flight).
    pub fn is_running(&self, run_id: &str) -> bool {
        self.tokens.lock().contains_key(run_id)
    }

    /// Number of tracked in-flight runs (for monitoring/pruning).
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
