//! Transport link abstraction
//!
//! Defines the blocking line-oriented transport contract the command
//! orchestrator drives, plus the serial implementation. Every read is
//! bounded by a caller-supplied deadline measured from issue time, so a
//! device that stalls mid-response cannot hang the orchestrator.

pub mod serial;

use pipetkit_core::ConnectionError;
use std::time::Duration;

/// Parameters for establishing an instrument connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port: String,

    /// Baud rate
    pub baud_rate: u32,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            // Stock firmware ships at 9600 baud
            baud_rate: 9600,
        }
    }
}

/// Blocking line-oriented transport to the instrument
///
/// Implementations must guarantee the underlying link is released on
/// every exit path (`disconnect` or drop).
pub trait Communicator: Send {
    /// Open the link with the given parameters
    fn connect(&mut self, params: &ConnectionParams) -> Result<(), ConnectionError>;

    /// Close the link
    fn disconnect(&mut self) -> Result<(), ConnectionError>;

    /// Check if the link is open
    fn is_connected(&self) -> bool;

    /// Discard any stale buffered input
    fn flush_input(&mut self) -> Result<(), ConnectionError>;

    /// Write one command line; the implementation appends the terminator
    fn write_line(&mut self, line: &str) -> Result<(), ConnectionError>;

    /// Read one response line, waiting at most `timeout` from the time
    /// of this call (not from the last byte received)
    fn read_line(&mut self, timeout: Duration) -> Result<String, ConnectionError>;
}
