//! # Drive library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to
//! access items defined inside the drive crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Autonomy module - provides the guidance followed in mission mode
pub mod auto;

/// Differential drive control module - converts speed and yaw rate demands into wheel commands
pub mod diff_drive;

/// Simulation - a plant model of the vehicle for closed loop runs without hardware
pub mod sim;

/// Global data store for the executable
pub mod data_store;
