//! Error taxonomy of the core.
//!
//! [StorageError] is anything the durable store reports. [TimerError] is what an action returns to
//! its caller. Data-integrity problems (deleting something that isn't there) are not errors at
//! all: they are logged with `warn!` and treated as no-ops.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("store I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("record {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The action isn't valid in the current timer state. Nothing was mutated.
    #[error("{0}")]
    InvalidTransition(&'static str),

    #[error("{0}")]
    InvalidInput(String),
}

pub const NO_PAUSED_TIMER: &str = "no paused timer";
pub const NO_RUNNING_TIMER: &str = "no running timer";
pub const NO_ELAPSED_TIME: &str = "no elapsed time";
pub const NOTHING_STAGED: &str = "nothing staged";
pub const NO_ACTIVE_FOCUS: &str = "no active focus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Storage,
    InvalidTransition,
    InvalidInput,
    Protocol,
}

/// Error half of a reply sent back over the control socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReply {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Protocol,
            message: message.into(),
        }
    }
}

impl From<&TimerError> for ErrorReply {
    fn from(error: &TimerError) -> Self {
        let kind = match error {
            TimerError::Storage(_) => ErrorKind::Storage,
            TimerError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            TimerError::InvalidInput(_) => ErrorKind::InvalidInput,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
