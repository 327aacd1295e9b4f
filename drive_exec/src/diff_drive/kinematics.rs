//! Differential drive inverse kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::Params;
use comms_if::eqpt::actuator::NUM_WHEEL_MOTORS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Vehicle geometry and limits used to turn body motion into wheel demands.
///
/// Read only during a cycle, rebuilt when the parameters change.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct DiffDriveKinematics {
    /// Distance between the wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// Linear speed of a wheel at its maximum rate.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Yaw rate of the vehicle with the wheels at maximum speed in opposite
    /// directions.
    ///
    /// Units: radians/second
    pub max_angular_velocity_rads: f64,
}

/// A pair of normalised wheel demands.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct WheelCommand {
    pub left: f64,
    pub right: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DiffDriveKinematics {

    /// Build the kinematics from the drive parameters.
    pub fn from_params(params: &Params) -> Self {
        Self {
            wheel_base_m: params.wheel_base_m,
            max_speed_ms: params.max_speed_ms(),
            max_angular_velocity_rads: params.max_angular_velocity_rads(),
        }
    }

    /// Compute the normalised wheel demands for a body speed and yaw rate.
    ///
    /// A positive yaw rate drives the right wheel faster than the left. Each
    /// wheel speed is divided by the maximum speed, so a wheel at
    /// the vehicle's maximum speed has a magnitude of 1. No clamping is
    /// applied; demands may exceed [-1, 1].
    ///
    /// If the maximum speed is not positive (or either input is not finite)
    /// both wheels are zero.
    pub fn compute_inverse_kinematics(&self, speed_ms: f64, yaw_rate_rads: f64) -> WheelCommand {
        if !(self.max_speed_ms > 0.0) || !self.max_speed_ms.is_finite() {
            return WheelCommand::default();
        }

        let half_base_m = self.wheel_base_m / 2.0;

        let cmd = WheelCommand {
            left: (speed_ms - yaw_rate_rads * half_base_m) / self.max_speed_ms,
            right: (speed_ms + yaw_rate_rads * half_base_m) / self.max_speed_ms,
        };

        if cmd.is_finite() {
            cmd
        }
        else {
            WheelCommand::default()
        }
    }
}

impl WheelCommand {
    /// True if neither wheel is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }

    /// Return the command as an array ordered `[left, right]`.
    pub fn to_array(&self) -> [f64; NUM_WHEEL_MOTORS] {
        [self.left, self.right]
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
