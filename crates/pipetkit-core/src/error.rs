//! Error handling for PipetKit
//!
//! Provides the error types for both layers of the protocol engine:
//! - Connection errors (serial transport)
//! - Command errors (orchestrator, the closed set the facade switches on)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Transport-layer error type
///
/// Represents failures of the serial link itself: opening the port,
/// reading, writing, and read deadlines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// Failed to open the serial port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// No complete response line arrived before the deadline
    #[error("Read timed out after {timeout_ms}ms")]
    ConnectionTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Operation attempted on a closed link
    #[error("Serial link not connected")]
    NotConnected,

    /// I/O error on an open link
    #[error("I/O error: {reason}")]
    IoError {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Command-layer error type
///
/// The closed taxonomy for one command round-trip. The facade dispatcher
/// matches on this exhaustively to pick status codes; variants are never
/// distinguished by message text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Transport open or handshake failure; operator intervention required
    #[error("Failed to establish connection: {reason}")]
    Connect {
        /// The reason the connection could not be established.
        reason: String,
    },

    /// Write/read failure or timeout mid-command; outcome unknown
    #[error("Transport failure, outcome unknown: {reason}")]
    Transport {
        /// The underlying transport failure.
        reason: String,
    },

    /// Projected volume would leave the safe operating range
    #[error("Projected volume {projected_ul}ul outside safe bounds [{lower_ul}, {upper_ul}]")]
    OutOfBounds {
        /// The volume the operation would have produced.
        projected_ul: i64,
        /// Lower safe bound in microliters.
        lower_ul: i64,
        /// Upper safe bound in microliters.
        upper_ul: i64,
    },

    /// Local validation failure; nothing was transmitted
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// The reason the argument was rejected.
        reason: String,
    },

    /// The device returned a failure acknowledgment
    #[error("Device rejected command: {message}")]
    DeviceRejected {
        /// The device's diagnostic message, passed through verbatim.
        message: String,
    },

    /// A response line that is not valid protocol data
    #[error("Unparseable response line: {line:?}")]
    Format {
        /// The offending raw line.
        line: String,
    },
}

impl CommandError {
    /// Check if this error leaves the command outcome unknown
    /// (the caller must re-synchronize before trusting device state).
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, CommandError::Transport { .. } | CommandError::Format { .. })
    }

    /// Check if this error was produced locally, before any byte
    /// reached the wire.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CommandError::OutOfBounds { .. } | CommandError::InvalidArgument { .. }
        )
    }
}

/// Main error type for PipetKit
///
/// A unified error type used at the application boundary; library APIs
/// return the specific layer's type directly.
#[derive(Error, Debug)]
pub enum Error {
    /// Command-layer error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Transport-layer error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
