//! Data models for instrument state, commands, and acknowledgments
//!
//! This module provides:
//! - The authoritative in-memory instrument state
//! - Safe operating bounds with normalization on assignment
//! - Mechanical calibration parameters and partial updates
//! - The connection state machine states
//! - Command and acknowledgment value objects

use crate::error::CommandError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state machine states
///
/// Tracks the lifecycle of the link between the host and the instrument
/// microcontroller, from initial connection through degraded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected to any instrument
    Disconnected,
    /// Transport open, handshake in progress
    Connecting,
    /// Handshake completed, ready for commands
    Ready,
    /// A transport failure occurred; a fresh handshake is required
    /// before further commands are trusted
    Degraded,
}

impl ConnectionState {
    /// Check if this state indicates an open transport
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    /// Check if a transition from this state to `target` is valid.
    ///
    /// Valid transitions:
    /// - Disconnected → Connecting
    /// - Connecting → Ready (handshake success) or Disconnected (failure)
    /// - Ready ⇄ Degraded
    /// - Any connected state → Disconnected
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        use ConnectionState::*;
        if *self == target {
            return true;
        }
        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Ready | Disconnected)
                | (Ready, Degraded | Disconnected)
                | (Degraded, Ready | Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Ready => write!(f, "Ready"),
            Self::Degraded => write!(f, "Degraded"),
        }
    }
}

/// Inclusive safe operating range for the reservoir volume
///
/// The pair is normalized on construction: `new(b, a)` and `new(a, b)`
/// store identical bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeBounds {
    lower_ul: i64,
    upper_ul: i64,
}

impl SafeBounds {
    /// Create normalized bounds from an unordered pair
    pub fn new(a_ul: i64, b_ul: i64) -> Self {
        Self {
            lower_ul: a_ul.min(b_ul),
            upper_ul: a_ul.max(b_ul),
        }
    }

    /// Lower bound in microliters
    pub fn lower_ul(&self) -> i64 {
        self.lower_ul
    }

    /// Upper bound in microliters
    pub fn upper_ul(&self) -> i64 {
        self.upper_ul
    }

    /// Inclusive containment check
    pub fn contains(&self, volume_ul: i64) -> bool {
        self.lower_ul <= volume_ul && volume_ul <= self.upper_ul
    }
}

impl Default for SafeBounds {
    fn default() -> Self {
        Self::new(0, 1000)
    }
}

impl fmt::Display for SafeBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower_ul, self.upper_ul)
    }
}

/// Mechanical calibration parameters of the pipette drive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipetteParameters {
    /// Stepper driver microsteps per full step
    pub microsteps: u32,
    /// Lead screw travel per revolution, in millimeters
    pub lead_mm_per_rev: f64,
    /// Plunger travel to volume conversion, in microliters per millimeter
    pub volume_to_travel_ratio_ul_per_mm: f64,
}

impl Default for PipetteParameters {
    fn default() -> Self {
        // Manufacturer defaults for the stock pipette drive
        Self {
            microsteps: 16,
            lead_mm_per_rev: 1.0,
            volume_to_travel_ratio_ul_per_mm: 0.1,
        }
    }
}

impl PipetteParameters {
    /// Apply a partial update, leaving absent fields unchanged
    pub fn apply(&mut self, update: &ParameterUpdate) {
        if let Some(microsteps) = update.microsteps {
            self.microsteps = microsteps as u32;
        }
        if let Some(lead) = update.lead_mm_per_rev {
            self.lead_mm_per_rev = lead;
        }
        if let Some(ratio) = update.volume_to_travel_ratio_ul_per_mm {
            self.volume_to_travel_ratio_ul_per_mm = ratio;
        }
    }
}

/// Partial update of the calibration parameters
///
/// `None` leaves a field unchanged. Zero is the wire-level sentinel for
/// "unchanged" and is normalized to `None` before validation, so it is
/// never transmitted as a real target value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterUpdate {
    /// New microsteps setting, if changed
    pub microsteps: Option<i64>,
    /// New lead, if changed
    pub lead_mm_per_rev: Option<f64>,
    /// New volume-to-travel ratio, if changed
    pub volume_to_travel_ratio_ul_per_mm: Option<f64>,
}

impl ParameterUpdate {
    /// Check whether the update carries no fields
    pub fn is_empty(&self) -> bool {
        self.microsteps.is_none()
            && self.lead_mm_per_rev.is_none()
            && self.volume_to_travel_ratio_ul_per_mm.is_none()
    }

    /// Map zero sentinels to `None`
    pub fn normalized(self) -> Self {
        Self {
            microsteps: self.microsteps.filter(|&m| m != 0),
            lead_mm_per_rev: self.lead_mm_per_rev.filter(|&l| l != 0.0),
            volume_to_travel_ratio_ul_per_mm: self
                .volume_to_travel_ratio_ul_per_mm
                .filter(|&v| v != 0.0),
        }
    }

    /// Validate a normalized update: at least one field, no negative or
    /// non-finite values.
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.is_empty() {
            return Err(CommandError::InvalidArgument {
                reason: "no parameters provided".to_string(),
            });
        }
        if let Some(microsteps) = self.microsteps {
            if microsteps < 0 {
                return Err(CommandError::InvalidArgument {
                    reason: format!("microsteps must be positive, got {}", microsteps),
                });
            }
            if microsteps > u32::MAX as i64 {
                return Err(CommandError::InvalidArgument {
                    reason: format!("microsteps out of range: {}", microsteps),
                });
            }
        }
        if let Some(lead) = self.lead_mm_per_rev {
            if !lead.is_finite() || lead < 0.0 {
                return Err(CommandError::InvalidArgument {
                    reason: format!("lead must be positive, got {}", lead),
                });
            }
        }
        if let Some(ratio) = self.volume_to_travel_ratio_ul_per_mm {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(CommandError::InvalidArgument {
                    reason: format!("volume-to-travel ratio must be positive, got {}", ratio),
                });
            }
        }
        Ok(())
    }
}

/// The authoritative in-memory model of one instrument
///
/// Exclusively owned and mutated by the command orchestrator; committed
/// only after a confirmed success acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Logical reservoir level in microliters
    pub current_volume_ul: i64,
    /// Caller-settable safe operating range
    pub safe_bounds: SafeBounds,
    /// Mechanical calibration parameters
    pub parameters: PipetteParameters,
    /// Additive correction applied device-side, tracked for observability
    pub calibration_offset_ul: f64,
    /// Connection state machine state
    pub connection_state: ConnectionState,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            current_volume_ul: 0,
            safe_bounds: SafeBounds::default(),
            parameters: PipetteParameters::default(),
            calibration_offset_ul: 0.0,
            connection_state: ConnectionState::Disconnected,
        }
    }
}

/// Outcome of one command round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckOutcome {
    /// The device accepted and executed the command
    Success,
    /// The device refused the command
    Failure,
}

/// The decoded reply for one transmitted command
///
/// Ephemeral: matched against to update [`DeviceState`] or to produce a
/// typed error, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    /// Success or failure as reported by the device
    pub outcome: AckOutcome,
    /// Optional diagnostic text from the device
    pub message: Option<String>,
}

impl Acknowledgment {
    /// Create a success acknowledgment
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: AckOutcome::Success,
            message: Some(message.into()),
        }
    }

    /// Create a failure acknowledgment
    pub fn failure(message: Option<String>) -> Self {
        Self {
            outcome: AckOutcome::Failure,
            message,
        }
    }

    /// Check if the device reported success
    pub fn is_success(&self) -> bool {
        self.outcome == AckOutcome::Success
    }
}

/// A requested instrument operation, consumed by the wire codec
///
/// Setting safe bounds is host-side policy and never reaches the wire,
/// so it has no variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Draw liquid in at the given rate
    Aspirate {
        /// Volume to draw, in microliters
        volume_ul: i64,
        /// Plunger rate, in microliters per second
        rate_ul_per_s: i64,
    },
    /// Push liquid out at the given rate
    Dispense {
        /// Volume to expel, in microliters
        volume_ul: i64,
        /// Plunger rate, in microliters per second
        rate_ul_per_s: i64,
    },
    /// Eject the disposable tip
    Eject,
    /// Define the current plunger position as the zero reference
    Zero,
    /// Update calibration parameters (unchanged fields omitted)
    SetParameters(ParameterUpdate),
    /// Set the device-side additive volume correction
    SetCalibrationOffset {
        /// New offset in microliters
        offset_ul: f64,
    },
    /// Handshake probe
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_normalize_on_construction() {
        assert_eq!(SafeBounds::new(10, 3), SafeBounds::new(3, 10));
        assert_eq!(SafeBounds::new(10, 3).lower_ul(), 3);
        assert_eq!(SafeBounds::new(10, 3).upper_ul(), 10);
    }

    #[test]
    fn bounds_contains_is_inclusive() {
        let bounds = SafeBounds::new(0, 1000);
        assert!(bounds.contains(0));
        assert!(bounds.contains(1000));
        assert!(!bounds.contains(-1));
        assert!(!bounds.contains(1001));
    }

    #[test]
    fn parameter_update_zero_is_unchanged() {
        let update = ParameterUpdate {
            microsteps: Some(0),
            lead_mm_per_rev: Some(2.0),
            volume_to_travel_ratio_ul_per_mm: Some(0.0),
        }
        .normalized();
        assert_eq!(update.microsteps, None);
        assert_eq!(update.lead_mm_per_rev, Some(2.0));
        assert_eq!(update.volume_to_travel_ratio_ul_per_mm, None);
    }

    #[test]
    fn parameter_update_rejects_empty_and_negative() {
        assert!(matches!(
            ParameterUpdate::default().validate(),
            Err(CommandError::InvalidArgument { .. })
        ));

        let negative = ParameterUpdate {
            microsteps: Some(-4),
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(CommandError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn parameter_apply_is_partial() {
        let mut params = PipetteParameters::default();
        params.apply(&ParameterUpdate {
            lead_mm_per_rev: Some(4.0),
            ..Default::default()
        });
        assert_eq!(params.microsteps, 16);
        assert_eq!(params.lead_mm_per_rev, 4.0);
        assert_eq!(params.volume_to_travel_ratio_ul_per_mm, 0.1);
    }

    #[test]
    fn connection_state_transitions() {
        use ConnectionState::*;
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Ready));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Ready.can_transition_to(Degraded));
        assert!(Degraded.can_transition_to(Ready));
        assert!(!Disconnected.can_transition_to(Ready));
        assert!(!Degraded.can_transition_to(Connecting));
    }
}
