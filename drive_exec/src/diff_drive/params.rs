//! Parameters structure for DiffDrive

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{DEFAULT_MAX_DT_S, DEFAULT_SETPOINT_TIMEOUT_S, SPEED_SCALE_EPSILON};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for differential drive control.
///
/// The defaults describe an unconfigured vehicle: zero geometry and zero
/// speed scale, which the safety stage turns into a permanent stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- GEOMETRY ----

    /// Distance between the left and right wheel contact points.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// The radius of the vehicle's wheels.
    ///
    /// Units: meters
    pub wheel_radius_m: f64,

    // ---- CAPABILITIES ----

    /// Maximum wheel rotation rate.
    ///
    /// Units: radians/second
    pub max_wheel_speed_rads: f64,

    // ---- MANUAL DRIVING ----

    /// Fraction of the maximum speed reached at full throttle.
    pub speed_scale: f64,

    /// Fraction of the maximum angular velocity reached at full turn.
    pub ang_velocity_scale: f64,

    // ---- CONTROLLERS ----

    /// Speed controller proportional gain
    pub speed_k_p: f64,

    /// Speed controller integral gain
    pub speed_k_i: f64,

    /// Bound on the magnitude of the speed controller integral.
    pub speed_integral_limit: f64,

    /// Bound on the magnitude of the speed controller output.
    pub speed_output_limit: f64,

    /// Yaw rate controller proportional gain
    pub yaw_rate_k_p: f64,

    /// Yaw rate controller integral gain
    pub yaw_rate_k_i: f64,

    /// Bound on the magnitude of the yaw rate controller integral.
    pub yaw_rate_integral_limit: f64,

    /// Bound on the magnitude of the yaw rate controller output.
    pub yaw_rate_output_limit: f64,

    // ---- TIMING ----

    /// Ceiling applied to the measured cycle dt before it reaches the
    /// controllers.
    ///
    /// Units: seconds
    pub max_dt_s: f64,

    /// A setpoint older than this is stale and the wheels are stopped.
    ///
    /// Units: seconds
    pub setpoint_timeout_s: f64,

    // ---- ACTUATORS ----

    /// Bitmask of reversible motors passed through to the actuators.
    pub reversible_flags: u16,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            wheel_base_m: 0.0,
            wheel_radius_m: 0.0,
            max_wheel_speed_rads: 0.0,
            speed_scale: 0.0,
            ang_velocity_scale: 0.0,
            speed_k_p: 0.0,
            speed_k_i: 0.0,
            speed_integral_limit: 2.0,
            speed_output_limit: 200.0,
            yaw_rate_k_p: 0.0,
            yaw_rate_k_i: 0.0,
            yaw_rate_integral_limit: 20.0,
            yaw_rate_output_limit: 200.0,
            max_dt_s: DEFAULT_MAX_DT_S,
            setpoint_timeout_s: DEFAULT_SETPOINT_TIMEOUT_S,
            reversible_flags: 3,
        }
    }
}

impl Params {
    /// Maximum linear speed of the vehicle, reached with both wheels at
    /// their maximum rate.
    ///
    /// Units: meters/second
    pub fn max_speed_ms(&self) -> f64 {
        self.max_wheel_speed_rads * self.wheel_radius_m
    }

    /// Maximum angular velocity of the vehicle, reached by driving the wheels
    /// at maximum speed in opposite directions.
    ///
    /// Zero if the wheel base is not positive.
    ///
    /// Units: radians/second
    pub fn max_angular_velocity_rads(&self) -> f64 {
        if self.wheel_base_m > 0.0 {
            self.max_speed_ms() / (self.wheel_base_m / 2.0)
        }
        else {
            0.0
        }
    }

    /// True if the speed scale has been configured.
    pub fn speed_scale_valid(&self) -> bool {
        self.speed_scale > SPEED_SCALE_EPSILON
    }

    /// Return a list of human readable problems with these parameters. The
    /// controller still runs with invalid parameters, but will only ever
    /// command a stop.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = vec![];

        if !(self.max_speed_ms() > 0.0) {
            problems.push(format!(
                "Maximum speed is not positive ({} rad/s * {} m)",
                self.max_wheel_speed_rads,
                self.wheel_radius_m
            ));
        }
        if !(self.wheel_base_m > 0.0) {
            problems.push(format!("Wheel base is not positive ({} m)", self.wheel_base_m));
        }
        if !self.speed_scale_valid() {
            problems.push(format!("Speed scale is not configured ({})", self.speed_scale));
        }
        if !(self.max_dt_s > 0.0) {
            problems.push(format!("Maximum dt is not positive ({} s)", self.max_dt_s));
        }

        problems
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
