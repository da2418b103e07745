//! # PipetKit
//!
//! A Rust-based control stack for motorized pipetting instruments:
//! a host process exchanges line-based commands with the instrument
//! microcontroller over a serial link and exposes its operations
//! (aspirate, dispense, eject, zero, parameter tuning) through a
//! request/response facade.
//!
//! ## Architecture
//!
//! PipetKit is organized as a workspace with multiple crates:
//!
//! 1. **pipetkit-core** - Device state model, error taxonomy, listener traits
//! 2. **pipetkit-communication** - Serial transport, wire codec, command orchestrator
//! 3. **pipetkit-server** - Facade dispatcher and TCP service binding
//! 4. **pipetkit** - Main binary that integrates all crates

pub use pipetkit_core::{
    AckOutcome, Acknowledgment, Command, CommandError, ConnectionError, ConnectionState,
    ControllerListener, ControllerListenerHandle, DeviceState, Error, ParameterUpdate,
    PipetteParameters, Result, SafeBounds,
};

pub use pipetkit_communication::{
    list_ports, CommandOutcome, Communicator, ConnectionParams, ControllerConfig,
    PipetteController, ResponseParser, SerialCommunicator, SerialPortInfo, STARTUP_BANNER,
};

pub use pipetkit_server::{
    serve, spawn_keepalive, status_code, Dispatcher, FacadeResponse, Operation, ResponseStatus,
    ServiceConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
