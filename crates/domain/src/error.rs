/// Shared error type used across the AG-UI core crates.
///
/// Variants map to the error taxonomy the run pipeline distinguishes:
/// protocol/framing errors abort a run before anything is emitted or as
/// soon as detected, agent/infra errors abort mid-stream, cancellation
/// is not logged as a failure.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("framing: {0}")]
    Framing(String),

    #[error("agent: {0}")]
    Agent(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The `RUN_ERROR` wire code this error maps to.
    pub fn run_error_code(&self) -> &'static str {
        match self {
            Error::Protocol(_) => "PROTOCOL",
            Error::Framing(_) => "FRAMING",
            Error::Agent(_) => "AGENT",
            Error::Cancelled(_) => "CANCELLED",
            Error::Timeout(_) => "CANCELLED",
            Error::Io(_) | Error::Json(_) | Error::Config(_) | Error::Other(_) => "INTERNAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
