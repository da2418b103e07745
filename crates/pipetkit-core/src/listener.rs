//! Controller listener interface
//!
//! Defines the event sink trait the orchestrator emits into. The core
//! performs no logging or console output of its own; the surrounding
//! application registers a listener and wires it to whatever
//! observability stack it prefers.

use crate::data::{Acknowledgment, Command, ConnectionState};

/// Handle for a registered controller listener.
///
/// Uniquely identifies a listener subscription. Can be used to
/// unsubscribe from controller events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControllerListenerHandle(pub String);

/// Listener trait for controller events
///
/// Implement this trait to observe the command/acknowledgment traffic
/// and connection state changes. All methods default to no-ops.
pub trait ControllerListener: Send + Sync {
    /// Called after a command is encoded, before it is transmitted
    fn on_command_sent(&self, _command: &Command, _wire_line: &str) {}

    /// Called when an acknowledgment is decoded
    fn on_acknowledgment(&self, _ack: &Acknowledgment) {}

    /// Called when the connection state changes
    fn on_state_changed(&self, _old: ConnectionState, _new: ConnectionState) {}

    /// Called when a command fails
    fn on_error(&self, _message: &str) {}
}
