//! Firmware protocol implementation for the pipette microcontroller
//!
//! The stock firmware speaks a single-line ASCII command grammar and
//! replies with one JSON acknowledgment object per command, or with the
//! startup banner right after reset.

pub mod command_creator;
pub mod controller;
pub mod response_parser;

pub use controller::{CommandOutcome, ControllerConfig, PipetteController};
pub use response_parser::{ResponseParser, STARTUP_BANNER};
