//! # Autonomy module
//!
//! Provides the guidance used while the vehicle is in mission mode. The drive
//! controller only sees the `Guidance` trait, and takes whatever speed and
//! yaw rate it returns as the setpoint.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod heading;

pub use heading::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Setpoint produced by a guidance algorithm, in physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GuidanceOutput {
    /// Units: meters/second
    pub speed_ms: f64,

    /// Units: radians/second
    pub yaw_rate_rads: f64,
}

/// Guidance which always returns the same output.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedGuidance(pub GuidanceOutput);

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A mission guidance algorithm.
pub trait Guidance {
    /// Compute the desired speed and yaw rate.
    ///
    /// Only called while the vehicle is in mission mode.
    ///
    /// # Inputs
    /// - `heading_rad`: Current heading of the vehicle.
    /// - `yaw_rate_rads`: Measured yaw rate of the vehicle.
    /// - `dt_s`: Time since the previous control cycle (already clamped).
    fn compute_guidance(&mut self, heading_rad: f64, yaw_rate_rads: f64, dt_s: f64) 
        -> GuidanceOutput;

    /// Inform the guidance of the vehicle's capabilities. Called whenever the
    /// drive parameters change.
    fn set_limits(&mut self, _max_speed_ms: f64, _max_yaw_rate_rads: f64) {}
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Guidance for FixedGuidance {
    fn compute_guidance(&mut self, _heading_rad: f64, _yaw_rate_rads: f64, _dt_s: f64) 
        -> GuidanceOutput 
    {
        self.0
    }
}

impl<G: Guidance + ?Sized> Guidance for Box<G> {
    fn compute_guidance(&mut self, heading_rad: f64, yaw_rate_rads: f64, dt_s: f64) 
        -> GuidanceOutput 
    {
        (**self).compute_guidance(heading_rad, yaw_rate_rads, dt_s)
    }

    fn set_limits(&mut self, max_speed_ms: f64, max_yaw_rate_rads: f64) {
        (**self).set_limits(max_speed_ms, max_yaw_rate_rads)
    }
}
