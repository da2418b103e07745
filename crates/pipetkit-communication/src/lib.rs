//! # PipetKit Communication
//!
//! Serial transport and firmware protocol engine for PipetKit.
//! Owns the line-based command/acknowledgment exchange with the
//! pipette microcontroller and the connection state machine.

pub mod communication;
pub mod firmware;

pub use communication::{
    serial::{list_ports, SerialCommunicator, SerialPortInfo},
    Communicator, ConnectionParams,
};

pub use firmware::{
    command_creator,
    controller::{CommandOutcome, ControllerConfig, PipetteController},
    response_parser::{ResponseParser, STARTUP_BANNER},
};
