//! # Actuator Motor Demands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of wheel motors driven by the differential drive.
pub const NUM_WHEEL_MOTORS: usize = 2;

/// Index of the left wheel in [`ActuatorMotors::control`].
pub const LEFT_WHEEL: usize = 0;

/// Index of the right wheel in [`ActuatorMotors::control`].
pub const RIGHT_WHEEL: usize = 1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Normalised motor demands sent to the wheel actuators once per cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ActuatorMotors {
    /// Time at which the demand was produced.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Bitmask of the motors which may be driven in reverse. Bit `i` refers to `control[i]`.
    pub reversible_flags: u16,

    /// Normalised demand for each wheel, `[left, right]`, always inside [-1, +1].
    pub control: [f64; NUM_WHEEL_MOTORS],
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl ActuatorMotors {
    /// Left wheel demand.
    pub fn left(&self) -> f64 {
        self.control[LEFT_WHEEL]
    }

    /// Right wheel demand.
    pub fn right(&self) -> f64 {
        self.control[RIGHT_WHEEL]
    }

    /// True if every wheel is commanded to zero.
    pub fn is_stopped(&self) -> bool {
        self.control.iter().all(|c| *c == 0.0)
    }
}

impl Default for ActuatorMotors {
    fn default() -> Self {
        Self {
            time_s: 0.0,
            reversible_flags: 0,
            control: [0.0; NUM_WHEEL_MOTORS],
        }
    }
}
