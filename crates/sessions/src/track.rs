//! Append-only track storage.
//!
//! Each session key gets a `<flat key>.jsonl` file under the configured
//! data directory. Every AG-UI event appended to a run is written as one
//! JSON line. Payloads are opaque to the store: it never parses them.
//!
//! `append`/`read_all`/`follow` all go through `tokio::fs`, so a run's
//! pump task never blocks its executor thread on disk I/O — only the
//! one-time `create_dir_all` in `new` is a blocking `std::fs` call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ag_domain::error::{Error, Result};
use ag_domain::trace::TraceEvent;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::session_key::SessionKey;

/// One record in a track: an opaque JSON payload plus the time it was
/// appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEvent {
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl TrackEvent {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Per-key state: the in-memory event buffer (mirrors the JSONL file) and
/// a notifier so `follow` can wake up without polling.
struct TrackState {
    events: Mutex<Vec<TrackEvent>>,
    notify: Notify,
}

/// Append-only, ordered log of [`TrackEvent`]s keyed by [`SessionKey`],
/// backed by per-key JSONL files.
///
/// Concurrency model: each key's events are guarded by its own mutex, so
/// appends to different sessions never contend. A single process-wide
/// `RwLock` guards the key→state map itself, held only long enough to
/// look up or insert an entry.
pub struct TrackStore {
    base_dir: PathBuf,
    tracks: RwLock<HashMap<String, Arc<TrackState>>>,
}

impl TrackStore {
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            tracks: RwLock::new(HashMap::new()),
        })
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.base_dir.join(format!("{}.jsonl", key.flat()))
    }

    async fn state_for(&self, key: &SessionKey) -> Result<Arc<TrackState>> {
        let flat = key.flat();

        if let Some(state) = self.tracks.read().get(&flat) {
            return Ok(state.clone());
        }

        // Load from disk before taking the write lock: the write lock is
        // only held long enough to insert, not across the await point.
        let events = self.load_from_disk(key).await?;

        let mut tracks = self.tracks.write();
        if let Some(state) = tracks.get(&flat) {
            return Ok(state.clone());
        }
        let state = Arc::new(TrackState {
            events: Mutex::new(events),
            notify: Notify::new(),
        });
        tracks.insert(flat, state.clone());
        Ok(state)
    }

    async fn load_from_disk(&self, key: &SessionKey) -> Result<Vec<TrackEvent>> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        let mut events = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrackEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(session_key = %key, error = %e, "skipping malformed track line");
                }
            }
        }
        Ok(events)
    }

    /// Append one event to the track, in order, and persist it.
    pub async fn append(&self, key: &SessionKey, payload: serde_json::Value) -> Result<()> {
        let state = self.state_for(key).await?;
        let event = TrackEvent::new(payload);

        let json = serde_json::to_string(&event)?;
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(key))
            .await
            .map_err(Error::Io)?;
        file.write_all(json.as_bytes()).await.map_err(Error::Io)?;
        file.write_all(b"\n").await.map_err(Error::Io)?;

        state.events.lock().push(event);
        state.notify.notify_waiters();

        TraceEvent::TrackAppended {
            session_key: key.to_string(),
            event_type: "event".into(),
        }
        .emit();

        Ok(())
    }

    /// Return a snapshot of all events for `key` in insertion order. An
    /// unknown key returns an empty vec, never an error.
    pub async fn read_all(&self, key: &SessionKey) -> Result<Vec<TrackEvent>> {
        let state = self.state_for(key).await?;
        Ok(state.events.lock().clone())
    }

    /// Block until at least one new event beyond `from_seq` is available,
    /// or `deadline` elapses, then return the snapshot from `from_seq`
    /// onward.
    pub async fn follow(
        &self,
        key: &SessionKey,
        from_seq: usize,
        deadline: std::time::Duration,
    ) -> Result<Vec<TrackEvent>> {
        let state = self.state_for(key).await?;

        let snapshot = state.events.lock().clone();
        if snapshot.len() > from_seq {
            return Ok(snapshot[from_seq..].to_vec());
        }

        let notified = state.notify.notified();
        let _ = tokio::time::timeout(deadline, notified).await;

        let snapshot = state.events.lock().clone();
        if snapshot.len() > from_seq {
            Ok(snapshot[from_seq..].to_vec())
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> SessionKey {
        SessionKey::new("chat", "u1", id).unwrap()
    }

    #[tokio::test]
    async fn append_then_read_all_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrackStore::new(dir.path()).unwrap();
        let k = key("s1");

        store.append(&k, serde_json::json!({"n": 1})).await.unwrap();
        store.append(&k, serde_json::json!({"n": 2})).await.unwrap();
        store.append(&k, serde_json::json!({"n": 3})).await.unwrap();

        let events = store.read_all(&k).await.unwrap();
        let ns: Vec<_> = events.iter().map(|e| e.payload["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn read_all_unknown_key_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrackStore::new(dir.path()).unwrap();
        let events = store.read_all(&key("nope")).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn reloads_from_disk_on_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let k = key("s1");
        {
            let store = TrackStore::new(dir.path()).unwrap();
            store.append(&k, serde_json::json!({"n": 1})).await.unwrap();
        }
        let store = TrackStore::new(dir.path()).unwrap();
        let events = store.read_all(&k).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let k = key("s1");
        let path = dir.path().join(format!("{}.jsonl", k.flat()));
        std::fs::write(&path, "not json\n{\"timestamp\":\"2024-01-01T00:00:00Z\",\"payload\":{\"n\":1}}\n").unwrap();

        let store = TrackStore::new(dir.path()).unwrap();
        let events = store.read_all(&k).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn follow_returns_immediately_when_already_ahead() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrackStore::new(dir.path()).unwrap();
        let k = key("s1");
        store.append(&k, serde_json::json!({"n": 1})).await.unwrap();
        store.append(&k, serde_json::json!({"n": 2})).await.unwrap();

        let events = store
            .follow(&k, 1, std::time::Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn follow_times_out_with_no_new_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrackStore::new(dir.path()).unwrap();
        let k = key("s1");
        store.append(&k, serde_json::json!({"n": 1})).await.unwrap();

        let events = store
            .follow(&k, 1, std::time::Duration::from_millis(20))
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn follow_wakes_on_new_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TrackStore::new(dir.path()).unwrap());
        let k = key("s1");
        store.append(&k, serde_json::json!({"n": 1})).await.unwrap();

        let store2 = store.clone();
        let k2 = k.clone();
        let handle = tokio::spawn(async move {
            store2.follow(&k2, 1, std::time::Duration::from_secs(5)).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        store.append(&k, serde_json::json!({"n": 2})).await.unwrap();

        let events = handle.await.unwrap().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["n"], 2);
    }
}
