use pipetkit_communication::{Communicator, ConnectionParams, ControllerConfig, PipetteController};
use pipetkit_core::ConnectionError;
use pipetkit_server::{Dispatcher, Operation, ResponseStatus};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted instrument, same shape as the communication crate's test
/// double: replays queued replies, times out when the queue runs dry.
#[derive(Clone, Default)]
struct MockInstrument {
    connected: Arc<Mutex<bool>>,
    replies: Arc<Mutex<VecDeque<String>>>,
}

impl MockInstrument {
    fn push_ok(&self, message: &str) {
        self.replies.lock().unwrap().push_back(format!(
            r#"{{"status":"success","message":"{}"}}"#,
            message
        ));
    }

    fn push_failure(&self, message: &str) {
        self.replies.lock().unwrap().push_back(format!(
            r#"{{"status":"error","message":"{}"}}"#,
            message
        ));
    }
}

impl Communicator for MockInstrument {
    fn connect(&mut self, _params: &ConnectionParams) -> Result<(), ConnectionError> {
        *self.connected.lock().unwrap() = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        *self.connected.lock().unwrap() = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }

    fn flush_input(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn write_line(&mut self, _line: &str) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String, ConnectionError> {
        self.replies.lock().unwrap().pop_front().ok_or(
            ConnectionError::ConnectionTimeout {
                timeout_ms: timeout.as_millis() as u64,
            },
        )
    }
}

fn ready_dispatcher() -> (Dispatcher, MockInstrument) {
    let mock = MockInstrument::default();
    mock.push_ok("pong"); // handshake
    mock.push_ok("parameters set"); // calibration push

    let mut controller =
        PipetteController::new(Box::new(mock.clone()), ControllerConfig::default());
    controller
        .connect(&ConnectionParams {
            port: "mock".to_string(),
            ..Default::default()
        })
        .expect("handshake");

    (Dispatcher::new(controller), mock)
}

fn disconnected_dispatcher() -> Dispatcher {
    let controller = PipetteController::new(
        Box::new(MockInstrument::default()),
        ControllerConfig::default(),
    );
    Dispatcher::new(controller)
}

#[test]
fn aspirate_success_is_200() {
    let (dispatcher, mock) = ready_dispatcher();

    mock.push_ok("Aspirated 100 ul");
    let response = dispatcher.dispatch(Operation::Aspirate {
        volume: 100,
        rate: 50,
    });
    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.code, 200);
    assert!(response.message.contains("Aspirated 100 ul"));
}

#[test]
fn out_of_bounds_is_409_and_volume_unchanged() {
    let (dispatcher, mock) = ready_dispatcher();

    mock.push_ok("Aspirated 100 ul");
    dispatcher.dispatch(Operation::Aspirate {
        volume: 100,
        rate: 50,
    });

    let response = dispatcher.dispatch(Operation::Aspirate {
        volume: 950,
        rate: 50,
    });
    assert_eq!(response.status, ResponseStatus::Error);
    assert_eq!(response.code, 409);

    let response = dispatcher.dispatch(Operation::GetVolume);
    assert_eq!(response.code, 200);
    assert_eq!(response.message, "Current volume: 100 ul");
}

#[test]
fn validation_failure_is_400() {
    let (dispatcher, _mock) = ready_dispatcher();

    let response = dispatcher.dispatch(Operation::SetParameters {
        microsteps: None,
        lead: None,
        ratio: None,
    });
    assert_eq!(response.code, 400);

    let response = dispatcher.dispatch(Operation::Aspirate {
        volume: 10,
        rate: -1,
    });
    assert_eq!(response.code, 400);
}

#[test]
fn device_rejection_is_422_with_message() {
    let (dispatcher, mock) = ready_dispatcher();

    mock.push_failure("plunger stalled");
    let response = dispatcher.dispatch(Operation::Eject);
    assert_eq!(response.code, 422);
    assert!(response.message.contains("plunger stalled"));
}

#[test]
fn timeout_is_504_then_reconnect_is_503_while_silent() {
    let (dispatcher, _mock) = ready_dispatcher();

    // Queue is dry: the zero command times out mid-flight
    let response = dispatcher.dispatch(Operation::Zero);
    assert_eq!(response.code, 504);

    // Still silent: the re-handshake ping fails too
    let response = dispatcher.dispatch(Operation::Zero);
    assert_eq!(response.code, 503);
}

#[test]
fn disconnected_instrument_is_503() {
    let dispatcher = disconnected_dispatcher();

    let response = dispatcher.dispatch(Operation::Ping);
    assert_eq!(response.code, 503);
}

#[test]
fn set_safe_bounds_is_local_and_normalized() {
    let dispatcher = disconnected_dispatcher();

    // Host-side policy works even without a connected instrument
    let response = dispatcher.dispatch(Operation::SetSafeBounds {
        lower: 900,
        upper: -100,
    });
    assert_eq!(response.code, 200);
    assert!(response.message.contains("[-100, 900]"));
}

#[test]
fn ping_returns_device_message() {
    let (dispatcher, mock) = ready_dispatcher();

    mock.push_ok("pong");
    let response = dispatcher.dispatch(Operation::Ping);
    assert_eq!(response.code, 200);
    assert_eq!(response.message, "pong");
}
