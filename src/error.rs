use std::path::PathBuf;

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::id::MessageId;
use crate::domain::lifecycle::Action;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Broker terminal failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Connectivity or terminal-side hiccup. Safe to retry.
    #[error("transient terminal failure: {0}")]
    Transient(String),

    /// The broker refused the request. Retrying will not help.
    #[error("rejected by broker: {0}")]
    Rejected(String),

    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last: String,
    },
}

impl ExecutionError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("{action} failed for message {message_id}: {source}")]
    Transition {
        message_id: MessageId,
        action: Action,
        #[source]
        source: Box<Error>,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("classifier error: {0}")]
    Classification(String),

    #[error("another instance (pid {pid}) holds {}", path.display())]
    LockContention { pid: u32, path: PathBuf },

    #[error("stale lock {} left by pid {pid}; run `signal-relay unlock` after checking the broker", path.display())]
    StaleLock { pid: u32, path: PathBuf },

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{0} (pass --yes to confirm)")]
    Unconfirmed(&'static str),
}

impl Error {
    /// Wrap `self` as the cause of a failed transition.
    #[must_use]
    pub fn in_transition(self, message_id: MessageId, action: Action) -> Self {
        match self {
            already @ Self::Transition { .. } => already,
            other => Self::Transition {
                message_id,
                action,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_wraps_once() {
        let err = Error::from(ExecutionError::Rejected("no money".into()))
            .in_transition(MessageId::new(7), Action::Open)
            .in_transition(MessageId::new(7), Action::Close);

        match &err {
            Error::Transition { action, .. } => assert_eq!(*action, Action::Open),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "open failed for message 7: rejected by broker: no money"
        );
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(ExecutionError::Transient("x".into()).is_transient());
        assert!(!ExecutionError::Rejected("x".into()).is_transient());
    }
}
