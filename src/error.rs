use std::fmt;
use std::io;

/// All failures are fatal to a run; nothing is retried or downgraded.
/// The next scheduled invocation is the recovery mechanism.
#[derive(Debug)]
pub enum SyncError {
    /// Missing or malformed configuration, surfaced at startup.
    Config(String),
    /// Authorization was refused, timed out, or could not complete.
    Auth(String),
    /// Transport failure or non-2xx HTTP status from either service.
    Request(String),
    /// A 2xx response whose body reports a service-level failure, or one
    /// that does not match the expected schema.
    Api(String),
    Io(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Config(msg) => write!(f, "{msg}"),
            SyncError::Auth(msg) => write!(f, "authorization failed: {msg}"),
            SyncError::Request(msg) => write!(f, "request failed: {msg}"),
            SyncError::Api(msg) => write!(f, "service error: {msg}"),
            SyncError::Io(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<io::Error> for SyncError {
    fn from(err: io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}
