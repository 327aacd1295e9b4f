//! # Differential drive control module
//!
//! Converts a desired motion (forward speed and yaw rate), arbitrated from
//! manual, mission or externally injected sources, into normalised left and
//! right wheel demands. One call to `DiffDrive::proc` is one control cycle:
//!
//! 1. Apply any parameter refresh and compute the (clamped) cycle dt.
//! 2. Ingest the latest vehicle state snapshots.
//! 3. Arbitrate the setpoint source (override > manual > mission > hold).
//! 4. Run the speed and yaw rate PI controllers and add their trim to the
//!    setpoint.
//! 5. Run the inverse kinematics.
//! 6. Apply the safety stage (arm state, setpoint freshness, saturation).
//! 7. Emit the actuator demand.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod kinematics;
mod mode;
mod params;
mod pid;
mod safety;
mod state;
mod vehicle;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use kinematics::*;
pub use mode::*;
pub use params::*;
pub use pid::*;
pub use safety::*;
pub use state::*;
pub use vehicle::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Nominal period of the control cycle.
///
/// Units: seconds
pub const CYCLE_PERIOD_S: f64 = 0.01;

/// Default freshness window of the active setpoint.
///
/// Units: seconds
pub const DEFAULT_SETPOINT_TIMEOUT_S: f64 = 0.1;

/// Default ceiling on the cycle dt passed to the controllers.
///
/// Units: seconds
pub const DEFAULT_MAX_DT_S: f64 = 0.5;

/// Speed scale values at or below this are treated as unconfigured.
pub const SPEED_SCALE_EPSILON: f64 = f32::EPSILON as f64;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DiffDrive operation.
#[derive(Debug, thiserror::Error)]
pub enum DiffDriveError {
    #[error("Could not load the DiffDrive parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Could not initialise the DiffDrive archives: {0}")]
    ArchiveError(util::archive::ArchiveError),
}
