//! # Safety and saturation stage
//!
//! Applied to the raw wheel demands after the inverse kinematics. Stateless.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use util::maths::clamp;

use super::WheelCommand;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The reasons the wheels were forced to stop on a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StopCauses {
    /// The vehicle is not armed.
    pub disarmed: bool,

    /// The active setpoint is older than the freshness window.
    pub setpoint_timeout: bool,

    /// The speed scale is not configured.
    pub invalid_speed_scale: bool,

    /// The kinematics produced NaN or infinite demands.
    pub non_finite_output: bool,
}

/// Conditions checked by the safety stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyInput {
    pub armed: bool,

    /// Age of the active setpoint at the current cycle time.
    ///
    /// Units: seconds
    pub setpoint_age_s: f64,

    /// Freshness window.
    ///
    /// Units: seconds
    pub setpoint_timeout_s: f64,

    pub speed_scale_valid: bool,
}

/// Result of the safety stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SafetyOutput {
    /// Final wheel demands, always within [-1, 1].
    pub cmd: WheelCommand,

    pub stop: StopCauses,

    /// Whether each wheel (`[left, right]`) had to be clamped.
    pub saturated: [bool; 2],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StopCauses {
    /// True if any cause is active.
    pub fn any(&self) -> bool {
        self.disarmed 
            || self.setpoint_timeout 
            || self.invalid_speed_scale 
            || self.non_finite_output
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Apply the safety conditions and saturation to a raw wheel command.
///
/// The wheels are stopped if the vehicle is disarmed, the setpoint is stale,
/// the speed scale is invalid, or the command is not finite. A setpoint
/// whose age is negative or not a number counts as stale. Otherwise each
/// wheel is clamped to [-1, 1].
pub fn apply_safety(raw: WheelCommand, input: &SafetyInput) -> SafetyOutput {
    let stop = StopCauses {
        disarmed: !input.armed,
        setpoint_timeout: !(input.setpoint_age_s >= 0.0 
            && input.setpoint_age_s <= input.setpoint_timeout_s),
        invalid_speed_scale: !input.speed_scale_valid,
        non_finite_output: !raw.is_finite(),
    };

    if stop.any() {
        return SafetyOutput {
            cmd: WheelCommand::default(),
            stop,
            saturated: [false; 2]
        };
    }

    SafetyOutput {
        cmd: WheelCommand {
            left: clamp(raw.left, -1.0, 1.0),
            right: clamp(raw.right, -1.0, 1.0),
        },
        stop,
        saturated: [raw.left.abs() > 1.0, raw.right.abs() > 1.0]
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn safe() -> SafetyInput {
        SafetyInput {
            armed: true,
            setpoint_age_s: 0.0,
            setpoint_timeout_s: 0.1,
            speed_scale_valid: true,
        }
    }

    #[test]
    fn test_pass_through() {
        let raw = WheelCommand { left: 0.375, right: -0.625 };
        let out = apply_safety(raw, &safe());

        assert_eq!(out.cmd, raw);
        assert!(!out.stop.any());
        assert_eq!(out.saturated, [false, false]);
    }

    #[test]
    fn test_saturation() {
        let out = apply_safety(WheelCommand { left: 1.5, right: -7.0 }, &safe());

        assert_eq!(out.cmd, WheelCommand { left: 1.0, right: -1.0 });
        assert_eq!(out.saturated, [true, true]);
    }

    #[test]
    fn test_disarmed() {
        let raw = WheelCommand { left: 0.5, right: 0.5 };
        let out = apply_safety(raw, &SafetyInput { armed: false, ..safe() });

        assert_eq!(out.cmd, WheelCommand::default());
        assert!(out.stop.disarmed);
    }

    #[test]
    fn test_setpoint_timeout() {
        let raw = WheelCommand { left: 0.5, right: 0.5 };

        // Exactly at the window is still fresh
        let out = apply_safety(raw, &SafetyInput { setpoint_age_s: 0.1, ..safe() });
        assert_eq!(out.cmd, raw);

        let out = apply_safety(raw, &SafetyInput { setpoint_age_s: 0.1001, ..safe() });
        assert_eq!(out.cmd, WheelCommand::default());
        assert!(out.stop.setpoint_timeout);

        let out = apply_safety(raw, &SafetyInput { setpoint_age_s: f64::NAN, ..safe() });
        assert!(out.stop.setpoint_timeout);
    }

    #[test]
    fn test_setpoint_from_future() {
        let raw = WheelCommand { left: 0.5, right: 0.5 };

        let out = apply_safety(raw, &SafetyInput { setpoint_age_s: 0.0, ..safe() });
        assert_eq!(out.cmd, raw);

        let out = apply_safety(raw, &SafetyInput { setpoint_age_s: -0.001, ..safe() });
        assert_eq!(out.cmd, WheelCommand::default());
        assert!(out.stop.setpoint_timeout);

        let out = apply_safety(raw, &SafetyInput { setpoint_age_s: -940.0, ..safe() });
        assert!(out.stop.setpoint_timeout);
    }

    #[test]
    fn test_invalid_speed_scale() {
        let raw = WheelCommand { left: 0.5, right: 0.5 };
        let out = apply_safety(raw, &SafetyInput { speed_scale_valid: false, ..safe() });

        assert_eq!(out.cmd, WheelCommand::default());
        assert!(out.stop.invalid_speed_scale);
    }

    #[test]
    fn test_non_finite() {
        let out = apply_safety(WheelCommand { left: f64::NAN, right: 0.5 }, &safe());

        assert_eq!(out.cmd, WheelCommand::default());
        assert!(out.stop.non_finite_output);
    }
}
