//! # Telecommand processor module
//!
//! The telecommand processor handles various TCs coming from any source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use comms_if::{tc::Tc, veh::DriveSetpoint};
use drive_lib::{
    auto::HeadingTarget,
    data_store::{DataStore, Joystick},
    diff_drive::Params,
};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Mutates the datastore to send commands to different modules. Must be
/// called after `DataStore::cycle_start`, as some TCs write directly into
/// this cycle's drive input.
pub(crate) fn exec(ds: &mut DataStore, tc: &Tc) {

    // Handle different Tcs
    match tc {
        Tc::Arm => {
            debug!("Recieved Arm command");
            ds.control_mode.armed = true;
        },
        Tc::Disarm => {
            debug!("Recieved Disarm command");
            ds.control_mode.armed = false;
        },
        Tc::Mode { manual, mission } => {
            debug!("Recieved Mode command (manual: {}, mission: {})", manual, mission);
            ds.control_mode.manual_enabled = *manual;
            ds.control_mode.mission_enabled = *mission;
        },
        Tc::Manual { throttle, turn } => {
            if throttle.abs() > 1.0 || turn.abs() > 1.0 {
                warn!(
                    "Joystick position ({}, {}) outside [-1, 1], clamping", 
                    throttle, 
                    turn
                );
            }
            ds.joystick = Some(Joystick {
                throttle: clamp(*throttle, -1.0, 1.0),
                turn: clamp(*turn, -1.0, 1.0),
            });
            ds.drive_input.manual = ds.joystick.map(|j| comms_if::veh::ManualControlInput {
                time_s: ds.time_s,
                throttle: j.throttle,
                turn: j.turn,
            });
        },
        Tc::ManualLoss => {
            info!("Joystick link lost");
            ds.joystick = None;
            ds.drive_input.manual = None;
        },
        Tc::Override { speed_ms, yaw_rate_rads } => {
            debug!("Recieved Override command");
            ds.drive_input.setpoint_override = Some(DriveSetpoint {
                time_s: ds.time_s,
                speed_ms: *speed_ms,
                yaw_rate_rads: *yaw_rate_rads,
            });
        },
        Tc::Heading { heading_rad, speed_ms } => {
            ds.drive.guidance_mut().set_target(Some(HeadingTarget {
                heading_rad: *heading_rad,
                speed_ms: *speed_ms,
            }));
        },
        Tc::ReloadParams => {
            match util::params::load::<Params, _>(&ds.drive_params_path) {
                Ok(p) => {
                    info!("Reloaded DiffDrive parameters from {:?}", ds.drive_params_path);
                    ds.drive_input.params = Some(p);
                },
                Err(e) => warn!(
                    "Could not reload DiffDrive parameters, keeping the current set: {}", 
                    e
                )
            }
        }
    }

}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
