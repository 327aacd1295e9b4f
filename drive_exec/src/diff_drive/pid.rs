//! # Proportional-integral controller
//!
//! The derivative term is deliberately absent: the drive controllers track
//! rates (speed and yaw rate) whose measurements are too noisy to
//! differentiate usefully.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use util::maths::clamp_sym;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PI controller with anti-windup and output saturation.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct PiController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Bound on the magnitude of the integral accumulation
    integral_limit: f64,

    /// Bound on the magnitude of the output
    output_limit: f64,

    /// The integral accumulation
    integral: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PiController {

    /// Create a new controller with the given gains and limits.
    ///
    /// The signs of the limits are ignored.
    pub fn new(k_p: f64, k_i: f64, integral_limit: f64, output_limit: f64) -> Self {
        Self {
            k_p,
            k_i,
            integral_limit: integral_limit.abs(),
            output_limit: output_limit.abs(),
            integral: 0.0
        }
    }

    /// Change the gains and limits of the controller.
    ///
    /// The integral is kept, but pulled back inside the new integral limit.
    pub fn set_parameters(
        &mut self, 
        k_p: f64, 
        k_i: f64, 
        integral_limit: f64, 
        output_limit: f64
    ) {
        self.k_p = k_p;
        self.k_i = k_i;
        self.integral_limit = integral_limit.abs();
        self.output_limit = output_limit.abs();
        self.integral = clamp_sym(self.integral, self.integral_limit);
    }

    /// Step the controller and return the new output.
    ///
    /// A negative or non-finite `dt_s` is treated as zero, so no integral is
    /// accumulated. Limiting large values of `dt_s` is the caller's job. If
    /// either input is non-finite the controller state is untouched and the
    /// output is zero.
    pub fn update(&mut self, setpoint: f64, measurement: f64, dt_s: f64) -> f64 {
        let error = setpoint - measurement;

        if !error.is_finite() {
            return 0.0;
        }

        let dt_s = if dt_s.is_finite() && dt_s > 0.0 { dt_s } else { 0.0 };

        // Accumulate then clamp the integral (anti-windup)
        self.integral = clamp_sym(self.integral + error * dt_s, self.integral_limit);

        clamp_sym(
            self.k_p * error + self.k_i * self.integral, 
            self.output_limit
        )
    }

    /// Zero the integral accumulation.
    pub fn reset(&mut self) {
        self.integral = 0.0;
    }

    /// Current integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Current integral limit.
    pub fn integral_limit(&self) -> f64 {
        self.integral_limit
    }

    /// Current output limit.
    pub fn output_limit(&self) -> f64 {
        self.output_limit
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
