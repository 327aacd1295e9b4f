//! # Vehicle simulation
//!
//! A simple plant model of a differential drive vehicle on flat ground, used
//! to close the loop when no hardware is present. Each wheel follows its
//! demand with a first order lag, and the body motion is integrated from the
//! resulting wheel speeds. The plant produces the same snapshots the real
//! vehicle would publish.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use comms_if::{
    eqpt::actuator::ActuatorMotors,
    veh::{VehicleAngularVelocity, VehicleAttitude, VehicleLocalVelocity},
};
use util::maths::{clamp, rem_euclid};
use crate::diff_drive::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the plant model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    /// Distance between the wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// Ground speed of a wheel driven at a demand of 1.
    ///
    /// Units: meters/second
    pub max_wheel_ground_speed_ms: f64,

    /// Time constant of the wheel response.
    ///
    /// Units: seconds
    pub wheel_time_const_s: f64,
}

/// Simulated vehicle state.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VehicleSim {
    params: SimParams,

    /// Ground speed of the left wheel.
    ///
    /// Units: meters/second
    pub left_speed_ms: f64,

    /// Ground speed of the right wheel.
    ///
    /// Units: meters/second
    pub right_speed_ms: f64,

    /// Position in the local frame, `[north, east]`.
    ///
    /// Units: meters
    pub pos_m_lm: [f64; 2],

    /// Heading from north, in [0, 2*pi).
    ///
    /// Units: radians
    pub heading_rad: f64,

    /// Time of the last step.
    pub time_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimParams {
    /// Build a plant which exactly matches the given drive parameters.
    pub fn from_drive_params(params: &Params, wheel_time_const_s: f64) -> Self {
        Self {
            wheel_base_m: params.wheel_base_m,
            max_wheel_ground_speed_ms: params.max_speed_ms(),
            wheel_time_const_s,
        }
    }
}

impl VehicleSim {
    /// Create a new stationary vehicle at the origin, pointing north.
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            left_speed_ms: 0.0,
            right_speed_ms: 0.0,
            pos_m_lm: [0.0; 2],
            heading_rad: 0.0,
            time_s: 0.0,
        }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Forward speed of the body.
    ///
    /// Units: meters/second
    pub fn speed_ms(&self) -> f64 {
        0.5 * (self.left_speed_ms + self.right_speed_ms)
    }

    /// Yaw rate of the body, positive when the right wheel is faster, which
    /// increases the heading.
    ///
    /// Units: radians/second
    pub fn yaw_rate_rads(&self) -> f64 {
        if self.params.wheel_base_m > 0.0 {
            (self.right_speed_ms - self.left_speed_ms) / self.params.wheel_base_m
        }
        else {
            0.0
        }
    }

    /// Advance the plant to `time_s` while applying the given motor demands.
    ///
    /// Demands are clamped to [-1, 1] like a real motor driver. Non-finite
    /// demands are treated as zero, and a time in the past does nothing.
    pub fn step(&mut self, motors: &ActuatorMotors, time_s: f64) {
        let dt_s = time_s - self.time_s;
        if !(dt_s > 0.0) {
            return;
        }
        self.time_s = time_s;

        let dem = |d: f64| if d.is_finite() { clamp(d, -1.0, 1.0) } else { 0.0 };
        let left_dem_ms = dem(motors.left()) * self.params.max_wheel_ground_speed_ms;
        let right_dem_ms = dem(motors.right()) * self.params.max_wheel_ground_speed_ms;

        // First order lag, exact for a constant demand over the step
        let alpha = if self.params.wheel_time_const_s > 0.0 {
            1.0 - (-dt_s / self.params.wheel_time_const_s).exp()
        }
        else {
            1.0
        };
        self.left_speed_ms += alpha * (left_dem_ms - self.left_speed_ms);
        self.right_speed_ms += alpha * (right_dem_ms - self.right_speed_ms);

        // Integrate the pose with the new rates
        let speed_ms = self.speed_ms();
        let yaw_rate_rads = self.yaw_rate_rads();

        let mid_heading_rad = self.heading_rad + 0.5 * yaw_rate_rads * dt_s;
        self.pos_m_lm[0] += speed_ms * mid_heading_rad.cos() * dt_s;
        self.pos_m_lm[1] += speed_ms * mid_heading_rad.sin() * dt_s;
        self.heading_rad = rem_euclid(
            self.heading_rad + yaw_rate_rads * dt_s, 
            2.0 * std::f64::consts::PI
        );
    }

    /// Attitude snapshot, `[w, x, y, z]`, containing only the heading.
    pub fn attitude(&self) -> VehicleAttitude {
        let half_rad = 0.5 * self.heading_rad;
        VehicleAttitude {
            time_s: self.time_s,
            q: [half_rad.cos(), 0.0, 0.0, half_rad.sin()],
        }
    }

    /// Angular velocity snapshot in the body frame.
    pub fn angular_velocity(&self) -> VehicleAngularVelocity {
        VehicleAngularVelocity {
            time_s: self.time_s,
            xyz_rads: [0.0, 0.0, self.yaw_rate_rads()],
        }
    }

    /// Velocity snapshot in the local (north, east, down) frame.
    pub fn local_velocity(&self) -> VehicleLocalVelocity {
        let speed_ms = self.speed_ms();
        VehicleLocalVelocity {
            time_s: self.time_s,
            vx_ms: speed_ms * self.heading_rad.cos(),
            vy_ms: speed_ms * self.heading_rad.sin(),
            vz_ms: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
