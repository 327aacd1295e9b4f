//! Heading hold guidance
//!
//! Steers the vehicle onto a target heading at a cruise speed. The yaw rate
//! demand is proportional to the wrapped heading error, damped by the
//! measured yaw rate, and the speed is reduced as the heading error grows so
//! that large corrections are made almost on the spot.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::{Deserialize, Serialize};

// Internal
use super::{Guidance, GuidanceOutput};
use util::maths::{clamp, clamp_sym, get_ang_dist_2pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for heading guidance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingGuidanceParams {
    /// Yaw rate demand per radian of heading error.
    ///
    /// Units: 1/seconds
    pub heading_k_p: f64,

    /// Yaw rate damping gain on the measured yaw rate.
    pub yaw_rate_k_d: f64,

    /// Maximum rate of change of the speed demand.
    ///
    /// Units: meters/second^2
    pub max_accel_ms2: f64,
}

/// Target of the heading guidance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadingTarget {
    pub heading_rad: f64,
    pub speed_ms: f64,
}

/// Heading hold guidance.
#[derive(Debug, Clone)]
pub struct HeadingGuidance {
    params: HeadingGuidanceParams,

    target: Option<HeadingTarget>,

    max_speed_ms: f64,
    max_yaw_rate_rads: f64,

    /// Speed demanded on the previous call, used to limit acceleration.
    speed_dem_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HeadingGuidance {

    /// Create a new guidance instance with no target. Until the limits are
    /// set the guidance only demands zero.
    pub fn new(params: HeadingGuidanceParams) -> Self {
        Self {
            params,
            target: None,
            max_speed_ms: 0.0,
            max_yaw_rate_rads: 0.0,
            speed_dem_ms: 0.0,
        }
    }

    /// Set a new target, or clear it with `None` to stop.
    pub fn set_target(&mut self, target: Option<HeadingTarget>) {
        debug!("New heading target: {:?}", target);
        self.target = target;
    }

    pub fn target(&self) -> Option<HeadingTarget> {
        self.target
    }
}

impl Guidance for HeadingGuidance {
    fn compute_guidance(&mut self, heading_rad: f64, yaw_rate_rads: f64, dt_s: f64) 
        -> GuidanceOutput 
    {
        let (yaw_rate_dem_rads, speed_target_ms) = match self.target {
            Some(t) => {
                let head_err_rad = get_ang_dist_2pi(heading_rad, t.heading_rad);

                let yaw_rate_dem = clamp_sym(
                    self.params.heading_k_p * head_err_rad 
                        - self.params.yaw_rate_k_d * yaw_rate_rads,
                    self.max_yaw_rate_rads
                );

                // Full speed when aligned, none when a quarter turn or more
                // away from the target.
                let speed = clamp_sym(t.speed_ms, self.max_speed_ms) 
                    * head_err_rad.cos().max(0.0);

                (yaw_rate_dem, speed)
            },
            None => (0.0, 0.0)
        };

        // Limit the change in speed demand
        let max_step_ms = self.params.max_accel_ms2.abs() * dt_s.max(0.0);
        self.speed_dem_ms = clamp(
            speed_target_ms,
            self.speed_dem_ms - max_step_ms,
            self.speed_dem_ms + max_step_ms
        );

        GuidanceOutput {
            speed_ms: self.speed_dem_ms,
            yaw_rate_rads: yaw_rate_dem_rads
        }
    }

    fn set_limits(&mut self, max_speed_ms: f64, max_yaw_rate_rads: f64) {
        self.max_speed_ms = max_speed_ms.max(0.0);
        self.max_yaw_rate_rads = max_yaw_rate_rads.max(0.0);
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
