//! Session identity, track storage, and session lifecycle for the AG-UI
//! gateway core.

pub mod history;
pub mod service;
pub mod session_key;
pub mod track;

pub use history::{reduce, ReduceResult};
pub use service::{Session, SessionService, TrackService};
pub use session_key::{SessionKey, SessionKeyError};
pub use track::{TrackEvent, TrackStore};
