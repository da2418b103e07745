//! Pipette controller implementation
//!
//! The command orchestrator: sequences safety-check → encode →
//! transmit → await-acknowledgment → state-update for every instrument
//! operation, and owns the connection state machine including the
//! ping handshake and degraded-link recovery.

use crate::communication::{Communicator, ConnectionParams};
use crate::firmware::command_creator;
use crate::firmware::response_parser::ResponseParser;
use pipetkit_core::{
    Acknowledgment, Command, CommandError, ConnectionState, ControllerListener,
    ControllerListenerHandle, DeviceState, ParameterUpdate, SafeBounds,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Configuration for the command orchestrator
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long to wait for one acknowledgment, measured from the time
    /// the read is issued
    pub response_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of one committed instrument operation
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Reservoir volume after the operation, in microliters
    pub volume_ul: i64,
    /// Device diagnostic message, if any
    pub message: Option<String>,
}

/// Command orchestrator for one pipette instrument
///
/// Exclusively owns the instrument's [`DeviceState`] and its transport.
/// At most one command is in flight at any time; concurrent callers
/// must serialize access externally (one lock per instrument). State is
/// committed only after a confirmed success acknowledgment, so a
/// transport failure can never leave it partially updated.
pub struct PipetteController {
    communicator: Box<dyn Communicator>,
    parser: ResponseParser,
    state: DeviceState,
    config: ControllerConfig,
    listeners: HashMap<String, Arc<dyn ControllerListener>>,
}

impl PipetteController {
    /// Create a controller over the given transport with manufacturer
    /// default state
    pub fn new(communicator: Box<dyn Communicator>, config: ControllerConfig) -> Self {
        Self {
            communicator,
            parser: ResponseParser::new(),
            state: DeviceState::default(),
            config,
            listeners: HashMap::new(),
        }
    }

    /// The instrument's current in-memory state
    pub fn device_state(&self) -> &DeviceState {
        &self.state
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection_state
    }

    /// Current reservoir volume in microliters. Local read, no device
    /// contact.
    pub fn current_volume(&self) -> i64 {
        self.state.current_volume_ul
    }

    /// Open the transport and perform the ping handshake.
    ///
    /// On success the controller enters `Ready` and pushes the
    /// last-known calibration parameters so the physical drive matches
    /// the in-memory state. A parameter push failure is logged but does
    /// not block readiness. On handshake failure the transport is
    /// closed again and the controller stays `Disconnected`.
    pub fn connect(&mut self, params: &ConnectionParams) -> Result<(), CommandError> {
        if self.state.connection_state.is_connected() {
            let _ = self.communicator.disconnect();
            self.set_connection_state(ConnectionState::Disconnected);
        }

        self.set_connection_state(ConnectionState::Connecting);
        if let Err(e) = self.communicator.connect(params) {
            self.set_connection_state(ConnectionState::Disconnected);
            return Err(self.fail(CommandError::Connect {
                reason: e.to_string(),
            }));
        }

        if let Err(e) = self.handshake() {
            let _ = self.communicator.disconnect();
            self.set_connection_state(ConnectionState::Disconnected);
            return Err(self.fail(e));
        }

        self.push_parameters();
        Ok(())
    }

    /// Close the transport
    pub fn disconnect(&mut self) -> Result<(), CommandError> {
        self.communicator
            .disconnect()
            .map_err(|e| CommandError::Connect {
                reason: e.to_string(),
            })?;
        self.set_connection_state(ConnectionState::Disconnected);
        Ok(())
    }

    /// Draw liquid into the tip
    pub fn aspirate(
        &mut self,
        volume_ul: i64,
        rate_ul_per_s: i64,
    ) -> Result<CommandOutcome, CommandError> {
        let command = Command::Aspirate {
            volume_ul,
            rate_ul_per_s,
        };
        self.transfer(command, volume_ul, rate_ul_per_s, volume_ul)
    }

    /// Expel liquid from the tip
    pub fn dispense(
        &mut self,
        volume_ul: i64,
        rate_ul_per_s: i64,
    ) -> Result<CommandOutcome, CommandError> {
        let command = Command::Dispense {
            volume_ul,
            rate_ul_per_s,
        };
        self.transfer(command, volume_ul, rate_ul_per_s, -volume_ul)
    }

    /// Eject the disposable tip
    pub fn eject(&mut self) -> Result<CommandOutcome, CommandError> {
        self.ensure_ready()?;
        let ack = self.round_trip(&Command::Eject)?;
        if !ack.is_success() {
            return Err(self.rejected(ack));
        }
        Ok(CommandOutcome {
            volume_ul: self.state.current_volume_ul,
            message: ack.message,
        })
    }

    /// Define the current plunger position as the zero reference.
    ///
    /// On a confirmed success the logical volume is set to exactly
    /// zero regardless of prior bookkeeping.
    pub fn zero(&mut self) -> Result<CommandOutcome, CommandError> {
        self.ensure_ready()?;
        let ack = self.round_trip(&Command::Zero)?;
        if !ack.is_success() {
            return Err(self.rejected(ack));
        }
        self.state.current_volume_ul = 0;
        Ok(CommandOutcome {
            volume_ul: 0,
            message: ack.message,
        })
    }

    /// Probe that the device is responsive
    pub fn ping(&mut self) -> Result<CommandOutcome, CommandError> {
        self.ensure_ready()?;
        let ack = self.round_trip(&Command::Ping)?;
        if !ack.is_success() {
            return Err(self.rejected(ack));
        }
        Ok(CommandOutcome {
            volume_ul: self.state.current_volume_ul,
            message: ack.message,
        })
    }

    /// Update calibration parameters. Unchanged fields are omitted from
    /// the wire string; an empty or negative update is rejected locally
    /// without touching the transport.
    pub fn set_parameters(
        &mut self,
        update: ParameterUpdate,
    ) -> Result<CommandOutcome, CommandError> {
        let update = update.normalized();
        if let Err(e) = update.validate() {
            return Err(self.fail(e));
        }
        self.ensure_ready()?;
        let ack = self.round_trip(&Command::SetParameters(update))?;
        if !ack.is_success() {
            return Err(self.rejected(ack));
        }
        self.state.parameters.apply(&update);
        Ok(CommandOutcome {
            volume_ul: self.state.current_volume_ul,
            message: ack.message,
        })
    }

    /// Set the device-side additive volume correction
    pub fn set_calibration_offset(
        &mut self,
        offset_ul: f64,
    ) -> Result<CommandOutcome, CommandError> {
        if !offset_ul.is_finite() || offset_ul < 0.0 {
            return Err(self.fail(CommandError::InvalidArgument {
                reason: format!("calibration offset must be non-negative, got {}", offset_ul),
            }));
        }
        self.ensure_ready()?;
        let ack = self.round_trip(&Command::SetCalibrationOffset { offset_ul })?;
        if !ack.is_success() {
            return Err(self.rejected(ack));
        }
        self.state.calibration_offset_ul = offset_ul;
        Ok(CommandOutcome {
            volume_ul: self.state.current_volume_ul,
            message: ack.message,
        })
    }

    /// Set the safe operating range. Host-side policy only: the pair is
    /// normalized and stored, the device is never contacted.
    pub fn set_safe_bounds(&mut self, a_ul: i64, b_ul: i64) -> SafeBounds {
        let bounds = SafeBounds::new(a_ul, b_ul);
        self.state.safe_bounds = bounds;
        tracing::debug!(%bounds, "safe bounds updated");
        bounds
    }

    /// Register a listener for controller events
    pub fn register_listener(
        &mut self,
        listener: Arc<dyn ControllerListener>,
    ) -> ControllerListenerHandle {
        let id = Uuid::new_v4().to_string();
        let handle = ControllerListenerHandle(id.clone());
        self.listeners.insert(id, listener);
        handle
    }

    /// Remove a previously registered listener
    pub fn unregister_listener(&mut self, handle: ControllerListenerHandle) {
        let _ = self.listeners.remove(&handle.0);
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Aspirate/dispense shared path.
    ///
    /// Order is fixed: readiness, projected-volume safety check,
    /// argument validation, then the wire round trip. Nothing is
    /// transmitted for a request that fails any local check.
    fn transfer(
        &mut self,
        command: Command,
        volume_ul: i64,
        rate_ul_per_s: i64,
        delta_ul: i64,
    ) -> Result<CommandOutcome, CommandError> {
        self.ensure_ready()?;

        let bounds = self.state.safe_bounds;
        let projected = self.state.current_volume_ul.saturating_add(delta_ul);
        if !bounds.contains(projected) {
            return Err(self.fail(CommandError::OutOfBounds {
                projected_ul: projected,
                lower_ul: bounds.lower_ul(),
                upper_ul: bounds.upper_ul(),
            }));
        }

        if volume_ul < 0 || rate_ul_per_s < 0 {
            return Err(self.fail(CommandError::InvalidArgument {
                reason: format!(
                    "volume and rate must be non-negative, got volume={} rate={}",
                    volume_ul, rate_ul_per_s
                ),
            }));
        }

        let ack = self.round_trip(&command)?;
        if !ack.is_success() {
            return Err(self.rejected(ack));
        }

        self.state.current_volume_ul = projected;
        Ok(CommandOutcome {
            volume_ul: projected,
            message: ack.message,
        })
    }

    /// Require a `Ready` link, re-handshaking a degraded one.
    fn ensure_ready(&mut self) -> Result<(), CommandError> {
        match self.state.connection_state {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Degraded => {
                tracing::info!("connection degraded, re-attempting handshake");
                match self.handshake() {
                    Ok(()) => {
                        self.push_parameters();
                        Ok(())
                    }
                    // Still degraded; the next call will try again
                    Err(e) => Err(self.fail(e)),
                }
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                Err(self.fail(CommandError::Connect {
                    reason: "instrument not connected".to_string(),
                }))
            }
        }
    }

    /// Ping handshake: flush stale input, send `Ping`, require a
    /// decoded success within the timeout. Sets `Ready` on success and
    /// leaves the connection state untouched on failure (the caller
    /// decides between `Disconnected` and `Degraded`).
    fn handshake(&mut self) -> Result<(), CommandError> {
        let connect_err = |reason: String| CommandError::Connect { reason };

        self.communicator
            .flush_input()
            .map_err(|e| connect_err(e.to_string()))?;

        let line = command_creator::encode(&Command::Ping);
        self.notify_command(&Command::Ping, &line);
        self.communicator
            .write_line(&line)
            .map_err(|e| connect_err(e.to_string()))?;

        let raw = self
            .communicator
            .read_line(self.config.response_timeout)
            .map_err(|e| connect_err(e.to_string()))?;

        let ack = self
            .parser
            .parse(&raw)
            .map_err(|e| connect_err(e.to_string()))?;
        self.notify_ack(&ack);

        if ack.is_success() {
            self.set_connection_state(ConnectionState::Ready);
            Ok(())
        } else {
            Err(connect_err(
                ack.message
                    .unwrap_or_else(|| "handshake rejected by device".to_string()),
            ))
        }
    }

    /// Re-issue the in-memory calibration to the physical drive.
    /// Called on every entry to `Ready`; a failure here is logged and
    /// retried on the next explicit parameter change.
    fn push_parameters(&mut self) {
        let params = self.state.parameters;
        let update = ParameterUpdate {
            microsteps: Some(params.microsteps as i64),
            lead_mm_per_rev: Some(params.lead_mm_per_rev),
            volume_to_travel_ratio_ul_per_mm: Some(params.volume_to_travel_ratio_ul_per_mm),
        };

        match self.round_trip(&Command::SetParameters(update)) {
            Ok(ack) if ack.is_success() => {}
            Ok(ack) => {
                tracing::warn!(message = ?ack.message, "device rejected calibration push")
            }
            Err(e) => tracing::warn!("failed to push calibration parameters: {}", e),
        }
    }

    /// One command round trip: encode, transmit, await acknowledgment.
    ///
    /// Any transport-level failure (write error, read timeout, read
    /// error) or unparseable response marks the connection `Degraded`
    /// and surfaces without mutating device state.
    fn round_trip(&mut self, command: &Command) -> Result<Acknowledgment, CommandError> {
        let line = command_creator::encode(command);
        self.notify_command(command, &line);
        tracing::debug!(command = %line, "transmitting");

        if let Err(e) = self.communicator.write_line(&line) {
            self.set_connection_state(ConnectionState::Degraded);
            return Err(self.fail(CommandError::Transport {
                reason: e.to_string(),
            }));
        }

        let raw = match self.communicator.read_line(self.config.response_timeout) {
            Ok(raw) => raw,
            Err(e) => {
                self.set_connection_state(ConnectionState::Degraded);
                return Err(self.fail(CommandError::Transport {
                    reason: e.to_string(),
                }));
            }
        };

        let ack = match self.parser.parse(&raw) {
            Ok(ack) => ack,
            Err(e) => {
                // Protocol desync is a transport-class failure
                self.set_connection_state(ConnectionState::Degraded);
                return Err(self.fail(e));
            }
        };

        self.notify_ack(&ack);
        Ok(ack)
    }

    fn rejected(&self, ack: Acknowledgment) -> CommandError {
        self.fail(CommandError::DeviceRejected {
            message: ack
                .message
                .unwrap_or_else(|| "device reported failure".to_string()),
        })
    }

    /// Log a command failure at the severity its class warrants and
    /// forward it to listeners, then hand it back for propagation.
    fn fail(&self, err: CommandError) -> CommandError {
        match &err {
            CommandError::Connect { .. } => tracing::error!("{}", err),
            CommandError::Transport { .. } | CommandError::Format { .. } => {
                tracing::warn!("{}", err)
            }
            _ => tracing::debug!("{}", err),
        }
        let text = err.to_string();
        for listener in self.listeners.values() {
            listener.on_error(&text);
        }
        err
    }

    fn set_connection_state(&mut self, new: ConnectionState) {
        let old = self.state.connection_state;
        if old == new {
            return;
        }
        debug_assert!(
            old.can_transition_to(new),
            "invalid connection state transition {} -> {}",
            old,
            new
        );
        self.state.connection_state = new;
        tracing::info!(%old, %new, "connection state changed");
        for listener in self.listeners.values() {
            listener.on_state_changed(old, new);
        }
    }

    fn notify_command(&self, command: &Command, wire_line: &str) {
        for listener in self.listeners.values() {
            listener.on_command_sent(command, wire_line);
        }
    }

    fn notify_ack(&self, ack: &Acknowledgment) {
        for listener in self.listeners.values() {
            listener.on_acknowledgment(ack);
        }
    }
}
