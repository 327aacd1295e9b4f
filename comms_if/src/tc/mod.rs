//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications 
//! interface. Telecommands are JSON objects tagged by a `"type"` string, with
//! any data carried in a `"payload"` object, for example:
//!
//! ```json
//! {"type": "MANUAL", "payload": {"throttle": 0.5, "turn": 0.0}}
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the vehicle by the operator or
/// a script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tc {
    /// Allow the wheels to be driven.
    Arm,

    /// Force the wheels to stop.
    Disarm,

    /// Select the active driving modes.
    Mode {
        manual: bool,
        mission: bool
    },

    /// Move the joystick to the given position. The joystick keeps streaming
    /// this position until it is moved again or lost.
    Manual {
        throttle: f64,
        turn: f64
    },

    /// Simulate loss of the joystick link, no more manual samples will arrive.
    ManualLoss,

    /// Inject a setpoint that bypasses manual and mission arbitration.
    Override {
        speed_ms: f64,
        yaw_rate_rads: f64
    },

    /// Set the target of the mission guidance.
    Heading {
        heading_rad: f64,
        speed_ms: f64
    },

    /// Reload the parameter file from disk.
    ReloadParams,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_unit_tc() {
        assert_eq!(Tc::from_json(r#"{"type": "ARM"}"#).unwrap(), Tc::Arm);
        assert_eq!(
            Tc::from_json(r#"{"type": "MANUAL_LOSS"}"#).unwrap(), 
            Tc::ManualLoss
        );
    }

    #[test]
    fn test_parse_payload_tc() {
        let tc = Tc::from_json(
            r#"{"type": "MANUAL", "payload": {"throttle": 0.5, "turn": -0.25}}"#
        ).unwrap();

        assert_eq!(tc, Tc::Manual { throttle: 0.5, turn: -0.25 });
    }

    #[test]
    fn test_parse_invalid_tc() {
        assert!(Tc::from_json(r#"{"type": "LAUNCH"}"#).is_err());
        assert!(Tc::from_json(r#"{"type": "MODE"}"#).is_err());
        assert!(Tc::from_json("not json").is_err());
    }
}
