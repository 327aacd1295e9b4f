//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::PathBuf;

use comms_if::{
    eqpt::actuator::ActuatorMotors,
    veh::{ManualControlInput, VehicleControlMode},
};

use crate::{
    auto::HeadingGuidance,
    diff_drive::{self, DiffDrive},
    sim::VehicleSim,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A joystick position as last commanded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joystick {
    pub throttle: f64,
    pub turn: f64,
}

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session elapsed time at the start of this cycle
    pub time_s: f64,

    // Vehicle commanding
    /// Arm and mode flags, published to the drive every cycle.
    pub control_mode: VehicleControlMode,

    /// Joystick position, `None` if the joystick link is lost.
    pub joystick: Option<Joystick>,

    /// Path to the drive parameters, relative to the params directory.
    pub drive_params_path: PathBuf,

    // DiffDrive
    pub drive: DiffDrive<HeadingGuidance>,
    pub drive_input: diff_drive::InputData,
    pub drive_output: ActuatorMotors,
    pub drive_status_rpt: diff_drive::StatusReport,

    // Simulation
    pub sim: VehicleSim,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Create a new data store around an initialised drive and plant.
    pub fn new<P: Into<PathBuf>>(
        drive: DiffDrive<HeadingGuidance>, 
        drive_params_path: P,
        sim: VehicleSim
    ) -> Self {
        Self {
            num_cycles: 0,
            is_1_hz_cycle: false,
            time_s: 0.0,
            control_mode: VehicleControlMode::default(),
            joystick: None,
            drive_params_path: drive_params_path.into(),
            drive,
            drive_input: diff_drive::InputData::default(),
            drive_output: ActuatorMotors::default(),
            drive_status_rpt: diff_drive::StatusReport::default(),
            sim,
            num_consec_cycle_overruns: 0,
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Advances the plant to this cycle's time under the previous output,
    /// then clears the drive input and fills it with the cycle time, the
    /// current mode flags, the joystick (if connected) and the plant's
    /// snapshots. Also sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, time_s: f64, cycle_frequency_hz: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz as u128).max(1) == 0;

        self.sim.step(&self.drive_output, time_s);

        self.time_s = time_s;
        self.control_mode.time_s = time_s;

        self.drive_input = diff_drive::InputData {
            time_s,
            control_mode: Some(self.control_mode),
            attitude: Some(self.sim.attitude()),
            angular_velocity: Some(self.sim.angular_velocity()),
            local_velocity: Some(self.sim.local_velocity()),
            manual: self.joystick.map(|j| ManualControlInput {
                time_s,
                throttle: j.throttle,
                turn: j.turn,
            }),
            ..Default::default()
        };
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        auto::HeadingGuidanceParams,
        diff_drive::Params,
        sim::SimParams,
    };

    fn data_store() -> DataStore {
        let drive = DiffDrive::new(
            Params::default(), 
            HeadingGuidance::new(HeadingGuidanceParams {
                heading_k_p: 1.0,
                yaw_rate_k_d: 0.0,
                max_accel_ms2: 1.0,
            })
        );
        let sim = VehicleSim::new(SimParams {
            wheel_base_m: 0.5,
            max_wheel_ground_speed_ms: 2.0,
            wheel_time_const_s: 0.1,
        });

        DataStore::new(drive, "diff_drive.toml", sim)
    }

    #[test]
    fn test_cycle_start() {
        let mut ds = data_store();
        ds.control_mode.armed = true;
        ds.drive_input.setpoint_override = Some(Default::default());

        ds.cycle_start(2.5, 100.0);

        assert!(ds.is_1_hz_cycle);
        assert_eq!(ds.drive_input.time_s, 2.5);
        assert_eq!(ds.drive_input.setpoint_override, None);
        assert_eq!(ds.drive_input.manual, None);
        assert!(ds.drive_input.control_mode.unwrap().armed);
        assert_eq!(ds.drive_input.control_mode.unwrap().time_s, 2.5);
        assert!(ds.drive_input.attitude.is_some());

        ds.joystick = Some(Joystick { throttle: 0.5, turn: -0.5 });
        ds.drive_output.control = [1.0, 1.0];
        ds.cycle_end();
        ds.cycle_start(2.6, 100.0);

        assert!(!ds.is_1_hz_cycle);
        assert_eq!(
            ds.drive_input.manual, 
            Some(ManualControlInput { time_s: 2.6, throttle: 0.5, turn: -0.5 })
        );

        // The plant moved under the previous output
        assert_eq!(ds.sim.time_s, 2.6);
        assert!(ds.drive_input.local_velocity.unwrap().vx_ms > 0.0);
    }
}
