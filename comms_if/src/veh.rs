//! # Vehicle state snapshots
//!
//! Each struct in this module is a single sample published by some other part of the system
//! (the flight/drive mode manager, the attitude estimator, the joystick reader, ...). The drive
//! controller polls for new samples at the start of every cycle and keeps the last good one.
//!
//! All timestamps are seconds on the same monotonic clock as the controller's cycle time.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Arm state and active control mode flags.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleControlMode {
    pub time_s: f64,

    /// True if the actuators are allowed to move.
    pub armed: bool,

    /// Manual (joystick) driving is enabled.
    pub manual_enabled: bool,

    /// Autonomous mission driving is enabled.
    pub mission_enabled: bool,
}

/// Attitude estimate of the vehicle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VehicleAttitude {
    pub time_s: f64,

    /// Unit quaternion rotating the body frame into the local frame, ordered `[w, x, y, z]`.
    pub q: [f64; 4],
}

/// Body frame angular velocity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleAngularVelocity {
    pub time_s: f64,

    /// Angular rate about the body `[x, y, z]` axes.
    ///
    /// Units: radians/second
    pub xyz_rads: [f64; 3],
}

/// Velocity of the vehicle expressed in the local (north-east-down) frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleLocalVelocity {
    pub time_s: f64,

    /// Units: meters/second
    pub vx_ms: f64,

    /// Units: meters/second
    pub vy_ms: f64,

    /// Units: meters/second
    pub vz_ms: f64,
}

/// A sample of the operator's joystick axes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualControlInput {
    pub time_s: f64,

    /// Forward/backward stick position in [-1, +1].
    pub throttle: f64,

    /// Left/right stick position in [-1, +1]. Positive drives the right wheel faster than the
    /// left, increasing the heading.
    pub turn: f64,
}

/// A drive setpoint in physical units.
///
/// Published by the controller for telemetry, and accepted as an external override which
/// bypasses manual and mission arbitration.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveSetpoint {
    /// Time at which the setpoint was produced.
    pub time_s: f64,

    /// Forward speed of the vehicle body.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Turn rate about the vehicle's Z+ (down) axis. Positive increases the heading.
    ///
    /// Units: radians/second
    pub yaw_rate_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for VehicleAttitude {
    fn default() -> Self {
        Self {
            time_s: 0.0,
            q: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl DriveSetpoint {
    /// Return a zero setpoint stamped with the given time.
    pub fn stopped(time_s: f64) -> Self {
        Self {
            time_s,
            speed_ms: 0.0,
            yaw_rate_rads: 0.0,
        }
    }

    /// Age of the setpoint at `now_s`.
    pub fn age_s(&self, now_s: f64) -> f64 {
        now_s - self.time_s
    }
}
