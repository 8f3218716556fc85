//! Session identity: the `(app_name, user_id, session_id)` triple that
//! scopes every track and run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniquely identifies a session. `session_id` is only unique within the
/// scope of `(app_name, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

/// A validation failure for a would-be session key's components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyError {
    EmptyAppName,
    EmptyUserId,
    EmptySessionId,
}

impl fmt::Display for SessionKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKeyError::EmptyAppName => write!(f, "app_name must not be empty"),
            SessionKeyError::EmptyUserId => write!(f, "user_id must not be empty"),
            SessionKeyError::EmptySessionId => write!(f, "session_id must not be empty"),
        }
    }
}

impl SessionKey {
    /// Construct a session key, rejecting empty components.
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self, SessionKeyError> {
        let app_name = app_name.into();
        let user_id = user_id.into();
        let session_id = session_id.into();

        if app_name.is_empty() {
            return Err(SessionKeyError::EmptyAppName);
        }
        if user_id.is_empty() {
            return Err(SessionKeyError::EmptyUserId);
        }
        if session_id.is_empty() {
            return Err(SessionKeyError::EmptySessionId);
        }

        Ok(Self {
            app_name,
            user_id,
            session_id,
        })
    }

    /// A flat string form suitable for use as a filesystem-safe cache key.
    /// Components are percent-free; any `/` in a component is replaced so
    /// the result is always a single path segment.
    pub fn flat(&self) -> String {
        let sanitize = |s: &str| s.replace('/', "_");
        format!(
            "{}:{}:{}",
            sanitize(&self.app_name),
            sanitize(&self.user_id),
            sanitize(&self.session_id)
        )
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}
