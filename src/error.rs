//! Error types for the engine.
//!
//! This module defines error types for protocol-level failures and
//! message parsing issues. Anomalies in *inbound* traffic never surface
//! here; they are reported through the [`Client::on_error`](crate::client::Client::on_error)
//! event slot as data.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error while writing to the output sink.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The invalid message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },

    /// An outgoing command violated a protocol invariant and was not sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session was invalidated (own QUIT observed or `quit()` called);
    /// further pushes are a caller bug.
    #[error("session closed")]
    SessionClosed,
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

    /// Invalid message prefix.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// Tags section was not properly terminated.
    #[error("unterminated tags section")]
    UnterminatedTags,

    /// Parsing error with position information.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Character position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::InvalidInput("KICK reason too long".into());
        assert_eq!(format!("{}", err), "invalid input: KICK reason too long");

        let err = MessageParseError::ParseContext {
            position: 4,
            context: "command".into(),
        };
        assert_eq!(format!("{}", err), "parsing failed at position 4: command");
    }

    #[test]
    fn test_error_source_chaining() {
        let cause = MessageParseError::InvalidCommand;
        let err = ProtocolError::InvalidMessage {
            string: "???".into(),
            cause: cause.clone(),
        };
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert_eq!(source.unwrap().to_string(), cause.to_string());
    }
}
