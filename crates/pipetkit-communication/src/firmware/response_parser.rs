//! Pipette response parser
//!
//! Decodes and sanitizes raw response lines from the microcontroller
//! into structured acknowledgments. The firmware is an untrusted,
//! low-resource peer: any frame that is not the startup banner or a
//! well-formed JSON acknowledgment is rejected outright, never
//! partially recovered.

use pipetkit_core::{Acknowledgment, CommandError};
use serde_json::Value;

/// Banner the firmware prints once after reset. Seen during the
/// handshake instead of a command reply.
pub const STARTUP_BANNER: &str = "Pipette controller ready";

/// Placeholder for success replies that carry no message field
const DEFAULT_SUCCESS_MESSAGE: &str = "ok";

/// Pipette response parser
#[derive(Debug, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        Self
    }

    /// Parse one raw response line.
    ///
    /// Rules, applied in order:
    /// 1. Trim whitespace.
    /// 2. A line containing the startup banner maps to a synthetic
    ///    success acknowledgment.
    /// 3. Anything not framed as `{...}` is not protocol data.
    /// 4. The object must carry a `status` field; exactly the
    ///    case-insensitive literal `"success"` is a success, anything
    ///    else is a failure. A missing `message` on a success is
    ///    replaced with a neutral placeholder.
    pub fn parse(&self, line: &str) -> Result<Acknowledgment, CommandError> {
        let trimmed = line.trim();

        if trimmed.contains(STARTUP_BANNER) {
            return Ok(Acknowledgment::success(trimmed));
        }

        if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
            return Err(CommandError::Format {
                line: trimmed.to_string(),
            });
        }

        let value: Value = serde_json::from_str(trimmed).map_err(|_| CommandError::Format {
            line: trimmed.to_string(),
        })?;

        let object = value.as_object().ok_or_else(|| CommandError::Format {
            line: trimmed.to_string(),
        })?;

        let status = object.get("status").ok_or_else(|| CommandError::Format {
            line: trimmed.to_string(),
        })?;

        let message = object
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        let is_success = status
            .as_str()
            .map(|s| s.eq_ignore_ascii_case("success"))
            .unwrap_or(false);

        if is_success {
            Ok(Acknowledgment::success(
                message.unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
            ))
        } else {
            Ok(Acknowledgment::failure(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipetkit_core::AckOutcome;

    #[test]
    fn parse_success_reply() {
        let parser = ResponseParser::new();
        let ack = parser
            .parse(r#"{"status":"success","message":"Aspirated 100 ul"}"#)
            .unwrap();
        assert_eq!(ack.outcome, AckOutcome::Success);
        assert_eq!(ack.message.as_deref(), Some("Aspirated 100 ul"));
    }

    #[test]
    fn parse_status_is_case_insensitive() {
        let parser = ResponseParser::new();
        assert!(parser.parse(r#"{"status":"Success"}"#).unwrap().is_success());
        assert!(parser.parse(r#"{"status":"SUCCESS"}"#).unwrap().is_success());
    }

    #[test]
    fn parse_failure_reply() {
        let parser = ResponseParser::new();
        let ack = parser
            .parse(r#"{"status":"Error","message":"plunger stalled"}"#)
            .unwrap();
        assert_eq!(ack.outcome, AckOutcome::Failure);
        assert_eq!(ack.message.as_deref(), Some("plunger stalled"));
    }

    #[test]
    fn parse_synthesizes_missing_success_message() {
        let parser = ResponseParser::new();
        let ack = parser.parse(r#"{"status":"success"}"#).unwrap();
        assert!(ack.is_success());
        assert_eq!(ack.message.as_deref(), Some("ok"));
    }

    #[test]
    fn parse_startup_banner_is_success() {
        let parser = ResponseParser::new();
        let ack = parser.parse("Pipette controller ready (v2.3)").unwrap();
        assert!(ack.is_success());
    }

    #[test]
    fn parse_trims_whitespace() {
        let parser = ResponseParser::new();
        assert!(parser
            .parse("  {\"status\":\"success\"}\r\n")
            .unwrap()
            .is_success());
    }

    #[test]
    fn parse_rejects_unframed_lines() {
        let parser = ResponseParser::new();
        for line in ["", "garbage", "status: success", "{\"status\":\"success\""] {
            assert!(matches!(
                parser.parse(line),
                Err(CommandError::Format { .. })
            ));
        }
    }

    #[test]
    fn parse_rejects_missing_status() {
        let parser = ResponseParser::new();
        assert!(matches!(
            parser.parse(r#"{"message":"no status here"}"#),
            Err(CommandError::Format { .. })
        ));
    }

    #[test]
    fn parse_non_string_status_is_failure() {
        let parser = ResponseParser::new();
        let ack = parser.parse(r#"{"status":42}"#).unwrap();
        assert_eq!(ack.outcome, AckOutcome::Failure);
    }
}
