//! Pipette command encoding
//!
//! Encodes logical commands into the single-line ASCII strings the
//! microcontroller expects. One line per command; the transport appends
//! the terminator.

use pipetkit_core::{Command, ParameterUpdate};

/// Encode a command into its wire form
pub fn encode(command: &Command) -> String {
    match command {
        Command::Aspirate {
            volume_ul,
            rate_ul_per_s,
        } => format!("A{} R{}", volume_ul, rate_ul_per_s),
        Command::Dispense {
            volume_ul,
            rate_ul_per_s,
        } => format!("D{} R{}", volume_ul, rate_ul_per_s),
        Command::Eject => "E".to_string(),
        Command::Zero => "Z".to_string(),
        Command::SetParameters(update) => encode_parameters(update),
        Command::SetCalibrationOffset { offset_ul } => format!("C{}", offset_ul),
        Command::Ping => "Ping".to_string(),
    }
}

/// Encode a parameter update, omitting unchanged fields entirely.
/// Zero is the firmware's "unchanged" sentinel, so an absent field must
/// never be sent as a literal zero.
fn encode_parameters(update: &ParameterUpdate) -> String {
    let mut tokens = Vec::new();
    if let Some(microsteps) = update.microsteps {
        tokens.push(format!("S{}", microsteps));
    }
    if let Some(lead) = update.lead_mm_per_rev {
        tokens.push(format!("L{}", lead));
    }
    if let Some(ratio) = update.volume_to_travel_ratio_ul_per_mm {
        tokens.push(format!("V{}", ratio));
    }
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_transfer_commands() {
        let aspirate = Command::Aspirate {
            volume_ul: 100,
            rate_ul_per_s: 50,
        };
        assert_eq!(encode(&aspirate), "A100 R50");

        let dispense = Command::Dispense {
            volume_ul: 30,
            rate_ul_per_s: 5,
        };
        assert_eq!(encode(&dispense), "D30 R5");
    }

    #[test]
    fn encode_simple_commands() {
        assert_eq!(encode(&Command::Eject), "E");
        assert_eq!(encode(&Command::Zero), "Z");
        assert_eq!(encode(&Command::Ping), "Ping");
    }

    #[test]
    fn encode_calibration_offset() {
        assert_eq!(
            encode(&Command::SetCalibrationOffset { offset_ul: 2.5 }),
            "C2.5"
        );
    }

    #[test]
    fn encode_full_parameter_update() {
        let update = ParameterUpdate {
            microsteps: Some(16),
            lead_mm_per_rev: Some(1.0),
            volume_to_travel_ratio_ul_per_mm: Some(0.1),
        };
        assert_eq!(encode(&Command::SetParameters(update)), "S16 L1 V0.1");
    }

    #[test]
    fn encode_omits_unchanged_parameters() {
        let update = ParameterUpdate {
            microsteps: None,
            lead_mm_per_rev: Some(2.0),
            volume_to_travel_ratio_ul_per_mm: None,
        };
        assert_eq!(encode(&Command::SetParameters(update)), "L2");

        let only_microsteps = ParameterUpdate {
            microsteps: Some(32),
            ..Default::default()
        };
        assert_eq!(encode(&Command::SetParameters(only_microsteps)), "S32");
    }
}
