//! Facade dispatcher
//!
//! Maps the abstract operation set onto orchestrator calls and typed
//! errors onto status codes. The dispatcher performs no safety or
//! argument checks of its own; the orchestrator's checks are
//! authoritative and duplicating them here would risk divergence.

use parking_lot::Mutex;
use pipetkit_communication::{CommandOutcome, PipetteController};
use pipetkit_core::{CommandError, ParameterUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One facade request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Draw liquid into the tip
    Aspirate {
        /// Volume in microliters
        volume: i64,
        /// Rate in microliters per second
        rate: i64,
    },
    /// Expel liquid from the tip
    Dispense {
        /// Volume in microliters
        volume: i64,
        /// Rate in microliters per second
        rate: i64,
    },
    /// Eject the disposable tip
    Eject,
    /// Zero the plunger reference position
    Zero,
    /// Read the logical reservoir volume
    GetVolume,
    /// Update calibration parameters; absent or zero fields are left
    /// unchanged
    SetParameters {
        /// Stepper microsteps
        #[serde(default)]
        microsteps: Option<i64>,
        /// Lead in mm per revolution
        #[serde(default)]
        lead: Option<f64>,
        /// Volume-to-travel ratio in ul per mm
        #[serde(default)]
        ratio: Option<f64>,
    },
    /// Set the device-side additive volume correction
    SetCalibrationOffset {
        /// Offset in microliters
        offset: f64,
    },
    /// Set the safe operating range (host-side policy)
    SetSafeBounds {
        /// One end of the range in microliters
        lower: i64,
        /// Other end of the range in microliters
        upper: i64,
    },
    /// Probe that the instrument is responsive
    Ping,
}

/// Facade response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The operation was committed
    Success,
    /// The operation failed; `code` classifies the failure
    Error,
}

/// One facade reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacadeResponse {
    /// Success or error
    pub status: ResponseStatus,
    /// HTTP-style status code
    pub code: u16,
    /// Human-readable outcome text
    pub message: String,
}

impl FacadeResponse {
    /// Build a success reply
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            code: 200,
            message: message.into(),
        }
    }

    /// Build an error reply
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            code,
            message: message.into(),
        }
    }

    /// Check for a success status
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    fn from_error(error: CommandError) -> Self {
        Self::error(status_code(&error), error.to_string())
    }
}

/// Map a command error to its status code.
///
/// Safety violations, validation failures, and transport failures must
/// stay distinguishable to callers:
/// - 400 validation (nothing transmitted)
/// - 409 safety-bound violation (nothing transmitted)
/// - 422 rejected by the device
/// - 502 unparseable device response (protocol desync)
/// - 503 not connected / handshake failed
/// - 504 transport failure mid-command, outcome unknown
pub fn status_code(error: &CommandError) -> u16 {
    match error {
        CommandError::InvalidArgument { .. } => 400,
        CommandError::OutOfBounds { .. } => 409,
        CommandError::DeviceRejected { .. } => 422,
        CommandError::Format { .. } => 502,
        CommandError::Connect { .. } => 503,
        CommandError::Transport { .. } => 504,
    }
}

/// Routes facade operations to the instrument's orchestrator.
///
/// Holds the single exclusive lock for the instrument; callers queue on
/// it, so at most one command is ever in flight on the wire.
pub struct Dispatcher {
    controller: Arc<Mutex<PipetteController>>,
}

impl Dispatcher {
    /// Wrap a controller in the per-instrument lock
    pub fn new(controller: PipetteController) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    /// The shared controller handle
    pub fn controller(&self) -> &Arc<Mutex<PipetteController>> {
        &self.controller
    }

    /// Execute one operation to completion
    pub fn dispatch(&self, operation: Operation) -> FacadeResponse {
        tracing::debug!(?operation, "dispatching");
        let mut controller = self.controller.lock();

        match operation {
            Operation::Aspirate { volume, rate } => {
                command_response(controller.aspirate(volume, rate), |outcome| {
                    format!(
                        "Aspirated {} ul at a rate of {} ul/s. Current volume: {} ul",
                        volume, rate, outcome.volume_ul
                    )
                })
            }
            Operation::Dispense { volume, rate } => {
                command_response(controller.dispense(volume, rate), |outcome| {
                    format!(
                        "Dispensed {} ul at a rate of {} ul/s. Current volume: {} ul",
                        volume, rate, outcome.volume_ul
                    )
                })
            }
            Operation::Eject => command_response(controller.eject(), |_| "Tip ejected".to_string()),
            Operation::Zero => command_response(controller.zero(), |_| {
                "Instrument zeroed. Current volume: 0 ul".to_string()
            }),
            Operation::GetVolume => FacadeResponse::success(format!(
                "Current volume: {} ul",
                controller.current_volume()
            )),
            Operation::SetParameters {
                microsteps,
                lead,
                ratio,
            } => {
                let update = ParameterUpdate {
                    microsteps,
                    lead_mm_per_rev: lead,
                    volume_to_travel_ratio_ul_per_mm: ratio,
                };
                match controller.set_parameters(update) {
                    Ok(_) => {
                        let params = controller.device_state().parameters;
                        FacadeResponse::success(format!(
                            "Parameters set: microsteps {}, lead {} mm/rev, ratio {} ul/mm",
                            params.microsteps,
                            params.lead_mm_per_rev,
                            params.volume_to_travel_ratio_ul_per_mm
                        ))
                    }
                    Err(e) => FacadeResponse::from_error(e),
                }
            }
            Operation::SetCalibrationOffset { offset } => {
                command_response(controller.set_calibration_offset(offset), |_| {
                    format!("Calibration offset set to {} ul", offset)
                })
            }
            Operation::SetSafeBounds { lower, upper } => {
                let bounds = controller.set_safe_bounds(lower, upper);
                FacadeResponse::success(format!("Safe bounds set to {}", bounds))
            }
            Operation::Ping => command_response(controller.ping(), |outcome| {
                outcome.message.clone().unwrap_or_else(|| "pong".to_string())
            }),
        }
    }
}

fn command_response(
    result: Result<CommandOutcome, CommandError>,
    message: impl FnOnce(&CommandOutcome) -> String,
) -> FacadeResponse {
    match result {
        Ok(outcome) => FacadeResponse::success(message(&outcome)),
        Err(e) => FacadeResponse::from_error(e),
    }
}
