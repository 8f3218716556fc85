//! Session lifecycle: lazy creation, and the [`TrackService`] capability
//! handed to the run controller and the history reducer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ag_domain::error::Result;
use ag_domain::trace::TraceEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::session_key::SessionKey;
use crate::track::{TrackEvent, TrackStore};

/// A session record. Created lazily on first chat request for a given
/// [`SessionKey`]; destroyed only by explicit delete (not implemented —
/// no caller in this core needs it yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The capability a [`Session`]-aware caller needs to read and write a
/// session's track, independent of how sessions themselves are stored.
#[async_trait]
pub trait TrackService: Send + Sync {
    async fn append_event(&self, session: &Session, payload: serde_json::Value) -> Result<()>;
    async fn read_track(&self, key: &SessionKey) -> Result<Vec<TrackEvent>>;
    /// Block (bounded by `deadline`) until at least one new event is
    /// available for `key`, or return immediately if it already has any.
    async fn follow_track(&self, key: &SessionKey, deadline: Duration) -> Result<Vec<TrackEvent>>;
}

/// In-memory session registry plus the track store it delegates to.
///
/// Mirrors the fast-path/slow-path `resolve_or_create` shape: a read lock
/// is tried first, and only promoted to a write lock when the session
/// doesn't exist yet.
pub struct SessionService {
    sessions: RwLock<HashMap<String, Session>>,
    tracks: Arc<TrackStore>,
}

impl SessionService {
    pub fn new(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            tracks: Arc::new(TrackStore::new(data_dir)?),
        })
    }

    pub fn with_track_store(tracks: Arc<TrackStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            tracks,
        }
    }

    /// Resolve the session for `key`, creating it if this is the first
    /// time it has been seen. Returns `(session, is_new)`.
    pub fn get_or_create(&self, key: &SessionKey) -> (Session, bool) {
        let flat = key.flat();

        if let Some(session) = self.sessions.read().get(&flat) {
            return (session.clone(), false);
        }

        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get(&flat) {
            return (session.clone(), false);
        }

        let now = Utc::now();
        let session = Session {
            key: key.clone(),
            created_at: now,
            updated_at: now,
        };
        sessions.insert(flat, session.clone());

        TraceEvent::SessionResolved {
            session_key: key.to_string(),
            is_new: true,
        }
        .emit();

        (session, true)
    }

    pub fn touch(&self, key: &SessionKey) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&key.flat()) {
            session.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl TrackService for SessionService {
    async fn append_event(&self, session: &Session, payload: serde_json::Value) -> Result<()> {
        self.tracks.append(&session.key, payload).await?;
        self.touch(&session.key);
        Ok(())
    }

    async fn read_track(&self, key: &SessionKey) -> Result<Vec<TrackEvent>> {
        self.tracks.read_all(key).await
    }

    async fn follow_track(&self, key: &SessionKey, deadline: Duration) -> Result<Vec<TrackEvent>> {
        self.tracks.follow(key, 0, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> SessionKey {
        SessionKey::new("chat", "u1", id).unwrap()
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let svc = SessionService::new(dir.path()).unwrap();

        let (s1, is_new1) = svc.get_or_create(&key("s1"));
        assert!(is_new1);
        let (s2, is_new2) = svc.get_or_create(&key("s1"));
        assert!(!is_new2);
        assert_eq!(s1.created_at, s2.created_at);
    }

    #[test]
    fn different_keys_get_different_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let svc = SessionService::new(dir.path()).unwrap();

        let (s1, _) = svc.get_or_create(&key("s1"));
        let (s2, _) = svc.get_or_create(&key("s2"));
        assert_ne!(s1.key, s2.key);
    }

    #[tokio::test]
    async fn append_event_delegates_to_track_store() {
        let dir = tempfile::tempdir().unwrap();
        let svc = SessionService::new(dir.path()).unwrap();
        let (session, _) = svc.get_or_create(&key("s1"));

        svc.append_event(&session, serde_json::json!({"type": "RUN_STARTED"})).await.unwrap();
        let events = svc.read_track(&session.key).await.unwrap();
        assert_eq!(events.len(), 1);
    }
}
