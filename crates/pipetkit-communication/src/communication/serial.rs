//! Serial port communication implementation
//!
//! Provides the serial transport for direct hardware connection to the
//! pipette microcontroller via USB or RS-232.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate configuration
//! - Deadline-bounded line reads

use crate::communication::{Communicator, ConnectionParams};
use pipetkit_core::ConnectionError;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// How long a single poll of the port blocks. Short enough that the
/// read deadline is honored with low jitter.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,
}

/// List available serial ports on the system
///
/// Filters ports to patterns instrument controllers enumerate as:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>, ConnectionError> {
    let ports = serialport::available_ports().map_err(|e| ConnectionError::IoError {
        reason: format!("failed to enumerate ports: {}", e),
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_instrument_port(&port.port_name))
        .map(|port| {
            let (description, manufacturer) = match &port.port_type {
                serialport::SerialPortType::UsbPort(usb_info) => (
                    format!(
                        "USB {}",
                        usb_info.product.as_deref().unwrap_or("Serial Port")
                    ),
                    usb_info.manufacturer.clone(),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth Serial".to_string(), None)
                }
                serialport::SerialPortType::PciPort => ("PCI Serial".to_string(), None),
                _ => ("Serial Port".to_string(), None),
            };

            SerialPortInfo {
                port_name: port.port_name.clone(),
                description,
                manufacturer,
            }
        })
        .collect())
}

/// Check if a port name matches instrument controller patterns
fn is_instrument_port(port_name: &str) -> bool {
    // Windows COM ports
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    // Linux USB and ACM devices
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    // macOS serial and modem devices
    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// Serial transport implementation using the serialport crate
///
/// The port is configured with a short internal timeout; `read_line`
/// aggregates short polls under the caller's deadline. The port is
/// closed when the communicator is dropped.
pub struct SerialCommunicator {
    port: Option<Box<dyn serialport::SerialPort>>,
    /// Bytes received past the last complete line
    pending: Vec<u8>,
}

impl SerialCommunicator {
    /// Create a communicator with no open port
    pub fn new() -> Self {
        Self {
            port: None,
            pending: Vec::new(),
        }
    }

    /// Take one complete line out of the pending buffer, if present
    fn take_pending_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(
            String::from_utf8_lossy(&raw)
                .trim_end_matches(['\r', '\n'])
                .to_string(),
        )
    }
}

impl Default for SerialCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for SerialCommunicator {
    fn connect(&mut self, params: &ConnectionParams) -> Result<(), ConnectionError> {
        let port = serialport::new(&params.port, params.baud_rate)
            .timeout(POLL_INTERVAL)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                ConnectionError::FailedToOpen {
                    port: params.port.clone(),
                    reason: e.to_string(),
                }
            })?;

        self.port = Some(port);
        self.pending.clear();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        // Dropping the handle closes the OS port
        self.port = None;
        self.pending.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn flush_input(&mut self) -> Result<(), ConnectionError> {
        let port = self.port.as_mut().ok_or(ConnectionError::NotConnected)?;
        self.pending.clear();
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| ConnectionError::IoError {
                reason: e.to_string(),
            })
    }

    fn write_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        let port = self.port.as_mut().ok_or(ConnectionError::NotConnected)?;
        let io_err = |e: io::Error| ConnectionError::IoError {
            reason: e.to_string(),
        };
        port.write_all(line.as_bytes()).map_err(io_err)?;
        port.write_all(b"\n").map_err(io_err)?;
        port.flush().map_err(io_err)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String, ConnectionError> {
        if self.port.is_none() {
            return Err(ConnectionError::NotConnected);
        }
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(line) = self.take_pending_line() {
                return Ok(line);
            }

            if Instant::now() >= deadline {
                return Err(ConnectionError::ConnectionTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }

            let port = self.port.as_mut().ok_or(ConnectionError::NotConnected)?;
            let mut buf = [0u8; 256];
            match port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                // The short port timeout is the poll interval, not a failure
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    return Err(ConnectionError::IoError {
                        reason: e.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_port_patterns() {
        assert!(is_instrument_port("COM3"));
        assert!(is_instrument_port("/dev/ttyUSB0"));
        assert!(is_instrument_port("/dev/ttyACM1"));
        assert!(is_instrument_port("/dev/cu.usbmodem14101"));
        assert!(!is_instrument_port("/dev/ttyS0"));
        assert!(!is_instrument_port("COMX"));
    }

    #[test]
    fn read_line_requires_connection() {
        let mut comm = SerialCommunicator::new();
        assert_eq!(
            comm.read_line(Duration::from_millis(1)),
            Err(ConnectionError::NotConnected)
        );
    }
}
