//! Error types for the client core.
//!
//! This module defines error types for message parsing failures,
//! mode configuration issues, user list operations, capability
//! negotiation, and connection-level I/O.

use thiserror::Error;

/// Convenience type alias for Results using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse an IRC message.
    #[error("invalid message: {0}")]
    Message(#[from] MessageParseError),

    /// Connection-level failure.
    #[error("connection error: {0}")]
    Connection(#[from] IoError),
}

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// Message prefix was empty.
    #[error("invalid prefix")]
    InvalidPrefix,
}

/// Errors from mode configuration and mode changes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModeError {
    /// Flag letter is not in the configured set.
    #[error("invalid flag")]
    InvalidFlag,

    /// Missing `+`/`-` before a flag.
    #[error("missing '+'/'-'")]
    InvalidSet,

    /// Prefix character is not in the configured PREFIX mapping.
    #[error("invalid prefix")]
    InvalidPrefix,

    /// Configuration string was rejected.
    #[error("invalid config")]
    InvalidConfig,
}

/// Errors from user list operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UserError {
    /// Nick already present under the active casemapping.
    #[error("duplicate user")]
    Duplicate,

    /// Nick not present.
    #[error("user not found")]
    NotFound,
}

/// Errors from IRCv3 capability state transitions.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CapError {
    /// Capability is not known to the client.
    #[error("not supported")]
    NotSupported,

    /// No request was outstanding for this capability.
    #[error("no cap REQ")]
    NoReq,

    /// ACK would enable a capability that is already set.
    #[error("was set")]
    WasSet,

    /// ACK would disable a capability that is already unset.
    #[error("was unset")]
    WasUnset,
}

/// Errors from the connection I/O engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IoError {
    /// Socket already connected.
    #[error("socket connected")]
    Connected,

    /// Socket connection already in progress.
    #[error("socket connection in progress")]
    Connecting,

    /// Socket not connected.
    #[error("socket not connected")]
    Disconnected,

    /// Failed to format an outgoing message.
    #[error("failed to format message")]
    Format,

    /// Outgoing message exceeded the wire limit.
    #[error("data truncated")]
    Truncated,

    /// Write to the socket or TLS session failed.
    #[error("write failure")]
    Write,

    /// Failed to spawn the connection worker thread.
    #[error("failed to create thread")]
    Thread,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", IoError::Truncated), "data truncated");
        assert_eq!(format!("{}", CapError::NoReq), "no cap REQ");
        assert_eq!(
            format!("{}", MessageParseError::InvalidCommand),
            "invalid command"
        );
    }

    #[test]
    fn test_error_source_chaining() {
        let err: Error = MessageParseError::EmptyMessage.into();
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert_eq!(source.unwrap().to_string(), "empty message");
    }
}
