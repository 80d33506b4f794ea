//! Error types for the smtp-agent crate.

use thiserror::Error;

/// Errors that can occur while processing bus events.
#[derive(Debug, Error)]
pub enum AgentError {
    /// An alert referenced an asset the directory has never seen.
    #[error("unknown asset: {name}")]
    UnknownAsset {
        /// The asset name that was not found.
        name: String,
    },

    /// An event was missing a field the engine cannot do without.
    #[error("missing field '{field}' in {kind} event")]
    MissingField {
        /// The kind of event ("asset" or "alert").
        kind: &'static str,
        /// The name of the missing field.
        field: &'static str,
    },

    /// An event carried a field that could not be interpreted.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// The name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An inbound message could not be decoded.
    #[error("cannot decode event: {0}")]
    Decode(String),

    /// The mail transport refused or failed to deliver a notification.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The event processing task failed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Errors reported by a [`MailTransport`](crate::transport::MailTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The mail program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// The program that was invoked.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The message could not be fully written to the mail program.
    #[error("failed to pipe message to '{program}': {source}")]
    Pipe {
        /// The program that was invoked.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The mail program exited unsuccessfully.
    #[error("'{program}' exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        /// The program that was invoked.
        program: String,
        /// The exit code, or -1 when terminated by a signal.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The message was rejected before any delivery attempt.
    #[error("message rejected: {reason}")]
    Rejected {
        /// Why the message was rejected.
        reason: String,
    },
}

impl TransportError {
    /// Create a rejected error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
