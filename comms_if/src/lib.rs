//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Command and response definitions for equipment (like the wheel motors)
pub mod eqpt;

/// Vehicle state and setpoint snapshots consumed by the drive controller
pub mod veh;
