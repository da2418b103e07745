use pipetkit_communication::{
    Communicator, ConnectionParams, ControllerConfig, PipetteController, ResponseParser,
};
use pipetkit_core::{AckOutcome, CommandError, ConnectionError, SafeBounds};
use proptest::prelude::*;
use std::time::Duration;

/// Instrument that accepts everything. Used to drive long random
/// command sequences where only the host-side invariants matter.
struct AgreeableInstrument {
    connected: bool,
}

impl Communicator for AgreeableInstrument {
    fn connect(&mut self, _params: &ConnectionParams) -> Result<(), ConnectionError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn flush_input(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn write_line(&mut self, _line: &str) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<String, ConnectionError> {
        Ok(r#"{"status":"success","message":"done"}"#.to_string())
    }
}

fn agreeable_controller() -> PipetteController {
    let mut controller = PipetteController::new(
        Box::new(AgreeableInstrument { connected: false }),
        ControllerConfig::default(),
    );
    controller
        .connect(&ConnectionParams {
            port: "mock".to_string(),
            ..Default::default()
        })
        .expect("handshake");
    controller
}

proptest! {
    /// For any sequence of transfers the committed volume never leaves
    /// the safe bounds, and a rejected transfer leaves it untouched.
    #[test]
    fn volume_never_leaves_safe_bounds(
        ops in prop::collection::vec((any::<bool>(), 0i64..2000), 1..40)
    ) {
        let mut controller = agreeable_controller();
        for (is_aspirate, volume) in ops {
            let before = controller.current_volume();
            let result = if is_aspirate {
                controller.aspirate(volume, 10)
            } else {
                controller.dispense(volume, 10)
            };

            let after = controller.current_volume();
            prop_assert!((0..=1000).contains(&after));
            if result.is_err() {
                prop_assert_eq!(before, after);
            }
        }
    }

    /// `set_safe_bounds(a, b)` and `set_safe_bounds(b, a)` store
    /// identical bounds.
    #[test]
    fn bounds_normalization_is_order_independent(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(SafeBounds::new(a, b), SafeBounds::new(b, a));
    }

    /// Any well-formed acknowledgment object decodes to the matching
    /// outcome with its message intact.
    #[test]
    fn well_formed_replies_round_trip(
        success in any::<bool>(),
        message in "[ -~]{0,40}".prop_filter("banner text is handshake-only", |m| !m.contains("Pipette")),
    ) {
        let status = if success { "Success" } else { "Error" };
        let wire = serde_json::json!({"status": status, "message": message}).to_string();

        let ack = ResponseParser::new().parse(&wire).unwrap();
        let expected = if success { AckOutcome::Success } else { AckOutcome::Failure };
        prop_assert_eq!(ack.outcome, expected);
        prop_assert_eq!(ack.message.as_deref(), Some(message.as_str()));
    }

    /// Lines without object framing are never accepted and never
    /// panic the parser.
    #[test]
    fn unframed_lines_always_fail_closed(
        line in "[^{}]{0,60}".prop_filter("banner text is handshake-only", |l| !l.contains("Pipette")),
    ) {
        prop_assert!(
            matches!(
                ResponseParser::new().parse(&line),
                Err(CommandError::Format { .. })
            ),
            "unframed line should fail closed with a Format error"
        );
    }
}
