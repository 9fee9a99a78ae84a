//! Scenario configuration for a verification run.

use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_RESET_PULSE: u64 = 10;
const DEFAULT_SETTLE: u64 = 3;
const DEFAULT_STROBE_HIGH: u64 = 10;
const DEFAULT_STROBE_LOW: u64 = 10;
const DEFAULT_BLOCK_GAP: u64 = 20;
const DEFAULT_RESULT_SETUP: u64 = 2;
const DEFAULT_BUSY_BUDGET: u64 = 10_000;

/// A single verification scenario loaded from JSON.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    pub(crate) scenario_id: String,
    pub(crate) message: MessageSpec,
    /// Expected digest as 64 hex chars; computed from the message when absent.
    #[serde(default)]
    pub(crate) expected_sha256: Option<String>,
    #[serde(default)]
    pub(crate) timing: Timing,
}

/// Message payload, either ASCII text or raw bytes as hex.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MessageSpec {
    Text(String),
    Hex(String),
}

impl MessageSpec {
    /// Decode the message to raw bytes.
    pub(crate) fn bytes(&self) -> Result<Vec<u8>, TypeMismatch> {
        match self {
            MessageSpec::Text(text) => {
                if !text.is_ascii() {
                    return Err(TypeMismatch {
                        detail: "text message contains non-ASCII characters".to_string(),
                    });
                }
                Ok(text.as_bytes().to_vec())
            }
            MessageSpec::Hex(digits) => hex::decode(digits).map_err(|err| TypeMismatch {
                detail: format!("hex message does not decode: {err}"),
            }),
        }
    }
}

/// The scenario message is not byte-like.
#[derive(Debug)]
pub(crate) struct TypeMismatch {
    pub(crate) detail: String,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message is not byte-like: {}", self.detail)
    }
}

impl std::error::Error for TypeMismatch {}

/// Protocol timing, all values in clock edges.
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct Timing {
    /// Width of each phase of the reset pulse.
    pub(crate) reset_pulse: u64,
    /// Edges a nibble is held on the data line before the strobe.
    pub(crate) settle: u64,
    /// Edges `inputReady` stays asserted per nibble.
    pub(crate) strobe_high: u64,
    /// Edges `inputReady` stays deasserted after each strobe.
    pub(crate) strobe_low: u64,
    /// Edges inserted after each block before the busy drain.
    pub(crate) block_gap: u64,
    /// Edges between asserting `result` and the first digest sample.
    pub(crate) result_setup: u64,
    /// Budget for any single `busy` wait before the run fails.
    pub(crate) busy_budget: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            reset_pulse: DEFAULT_RESET_PULSE,
            settle: DEFAULT_SETTLE,
            strobe_high: DEFAULT_STROBE_HIGH,
            strobe_low: DEFAULT_STROBE_LOW,
            block_gap: DEFAULT_BLOCK_GAP,
            result_setup: DEFAULT_RESULT_SETUP,
            busy_budget: DEFAULT_BUSY_BUDGET,
        }
    }
}

/// Validate a decoded scenario; `Some` carries the accumulated problems.
pub(crate) fn validate_scenario(scenario: &Scenario) -> Option<Vec<String>> {
    let mut errors = Vec::new();

    if scenario.scenario_id.trim().is_empty() {
        errors.push("scenario_id must not be empty".to_string());
    }

    if let Some(expected) = &scenario.expected_sha256 {
        if expected.len() != 64 {
            errors.push(format!(
                "expected_sha256 must be 64 hex chars, got {}",
                expected.len()
            ));
        } else if !expected.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            errors.push("expected_sha256 contains non-hex characters".to_string());
        }
    }

    let timing = scenario.timing;
    for (name, value) in [
        ("reset_pulse", timing.reset_pulse),
        ("strobe_high", timing.strobe_high),
        ("strobe_low", timing.strobe_low),
        ("result_setup", timing.result_setup),
        ("busy_budget", timing.busy_budget),
    ] {
        if value == 0 {
            errors.push(format!("timing.{name} must be nonzero"));
        }
    }

    if errors.is_empty() {
        None
    } else {
        Some(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(json: &str) -> Scenario {
        serde_json::from_str(json).expect("decode scenario")
    }

    #[test]
    fn default_timing_values() {
        let scenario = minimal(r#"{"scenario_id": "s", "message": {"text": "abc"}}"#);
        let timing = scenario.timing;
        assert_eq!(timing.reset_pulse, 10);
        assert_eq!(timing.settle, 3);
        assert_eq!(timing.strobe_high, 10);
        assert_eq!(timing.strobe_low, 10);
        assert_eq!(timing.block_gap, 20);
        assert_eq!(timing.result_setup, 2);
        assert!(validate_scenario(&scenario).is_none());
    }

    #[test]
    fn text_message_decodes_to_ascii_bytes() {
        let scenario = minimal(r#"{"scenario_id": "s", "message": {"text": "abc"}}"#);
        assert_eq!(scenario.message.bytes().unwrap(), b"abc");
    }

    #[test]
    fn non_ascii_text_is_rejected() {
        let scenario = minimal(r#"{"scenario_id": "s", "message": {"text": "grüß"}}"#);
        let err = scenario.message.bytes().unwrap_err();
        assert!(err.to_string().contains("not byte-like"));
    }

    #[test]
    fn hex_message_decodes_and_bad_hex_is_rejected() {
        let scenario = minimal(r#"{"scenario_id": "s", "message": {"hex": "61626380"}}"#);
        assert_eq!(scenario.message.bytes().unwrap(), [0x61, 0x62, 0x63, 0x80]);

        let scenario = minimal(r#"{"scenario_id": "s", "message": {"hex": "xyz"}}"#);
        assert!(scenario.message.bytes().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Scenario, _> =
            serde_json::from_str(r#"{"scenario_id": "s", "message": {"text": "a"}, "extra": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn validation_flags_bad_expected_digest_and_zero_timing() {
        let scenario = minimal(
            r#"{
                "scenario_id": " ",
                "message": {"text": "a"},
                "expected_sha256": "abc123",
                "timing": {"strobe_high": 0}
            }"#,
        );
        let errors = validate_scenario(&scenario).expect("errors");
        assert!(errors.iter().any(|e| e.contains("scenario_id")));
        assert!(errors.iter().any(|e| e.contains("expected_sha256")));
        assert!(errors.iter().any(|e| e.contains("strobe_high")));
    }
}
