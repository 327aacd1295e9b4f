//! Implementations for the DiffDrive state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use serde::Serialize;
use std::path::PathBuf;

// Internal
use super::{
    apply_safety, Arbitration, ArbiterInput, DiffDriveError, DiffDriveKinematics, DriveMode,
    ModeArbiter, Params, PiController, SafetyInput, SetpointLimits, StopCauses, VehicleState,
};
use crate::auto::Guidance;
use comms_if::{
    eqpt::actuator::ActuatorMotors,
    veh::{
        DriveSetpoint, ManualControlInput, VehicleAngularVelocity, VehicleAttitude,
        VehicleControlMode, VehicleLocalVelocity,
    },
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Differential drive control module state
pub struct DiffDrive<G> {

    params: Params,

    kinematics: DiffDriveKinematics,

    speed_ctrl: PiController,

    yaw_rate_ctrl: PiController,

    arbiter: ModeArbiter,

    guidance: G,

    /// Last known vehicle state
    vehicle: VehicleState,

    /// Last known joystick sample
    manual: Option<ManualControlInput>,

    /// Setpoint currently being tracked
    setpoint: DriveSetpoint,

    /// Time of the previous cycle
    last_time_s: Option<f64>,

    report: StatusReport,
    arch_report: Archiver,

    output: ActuatorMotors,
    arch_output: Archiver,
}

/// Input data to differential drive control. Any `None` field means no new
/// data arrived for it this cycle.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Time of this cycle.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// New parameters to apply before this cycle.
    pub params: Option<Params>,

    pub control_mode: Option<VehicleControlMode>,
    pub attitude: Option<VehicleAttitude>,
    pub angular_velocity: Option<VehicleAngularVelocity>,
    pub local_velocity: Option<VehicleLocalVelocity>,
    pub manual: Option<ManualControlInput>,

    /// An externally injected setpoint.
    pub setpoint_override: Option<DriveSetpoint>,
}

/// Status report for DiffDrive processing.
///
/// Flat so it can be archived directly as a CSV record.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct StatusReport {
    pub time_s: f64,

    pub mode: DriveMode,

    /// dt passed to the controllers.
    pub dt_s: f64,

    /// The measured dt was above the ceiling and was clamped.
    pub dt_limited: bool,

    pub integrators_reset: bool,

    pub setpoint_speed_ms: f64,
    pub setpoint_yaw_rate_rads: f64,
    pub setpoint_age_s: f64,

    pub speed_ctrl_output: f64,
    pub yaw_rate_ctrl_output: f64,

    /// Setpoint plus controller trim, passed to the kinematics.
    pub cmd_speed_ms: f64,
    pub cmd_yaw_rate_rads: f64,

    pub stop_disarmed: bool,
    pub stop_setpoint_timeout: bool,
    pub stop_invalid_speed_scale: bool,
    pub stop_non_finite_output: bool,

    pub left_saturated: bool,
    pub right_saturated: bool,
}

/// Output record in the archive.
#[derive(Serialize)]
struct OutputRecord {
    time_s: f64,
    left: f64,
    right: f64,
    reversible_flags: u16,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            time_s: 0.0,
            mode: DriveMode::Idle,
            dt_s: 0.0,
            dt_limited: false,
            integrators_reset: false,
            setpoint_speed_ms: 0.0,
            setpoint_yaw_rate_rads: 0.0,
            setpoint_age_s: 0.0,
            speed_ctrl_output: 0.0,
            yaw_rate_ctrl_output: 0.0,
            cmd_speed_ms: 0.0,
            cmd_yaw_rate_rads: 0.0,
            stop_disarmed: false,
            stop_setpoint_timeout: false,
            stop_invalid_speed_scale: false,
            stop_non_finite_output: false,
            left_saturated: false,
            right_saturated: false,
        }
    }
}

impl StatusReport {
    /// The stop causes active on this cycle.
    pub fn stop_causes(&self) -> StopCauses {
        StopCauses {
            disarmed: self.stop_disarmed,
            setpoint_timeout: self.stop_setpoint_timeout,
            invalid_speed_scale: self.stop_invalid_speed_scale,
            non_finite_output: self.stop_non_finite_output,
        }
    }
}

impl<G: Guidance> State for DiffDrive<G> {
    type InitData = PathBuf;
    type InitError = DiffDriveError;

    type InputData = InputData;
    type OutputData = ActuatorMotors;
    type StatusReport = StatusReport;
    type ProcError = DiffDriveError;

    /// Initialise the DiffDrive module.
    ///
    /// Expected init data is the path to the parameter file, relative to the
    /// params directory.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        // Load the parameters
        let params: Params = params::load(&init_data)
            .map_err(DiffDriveError::ParamLoadError)?;
        self.set_params(params);

        // Initialise the archivers
        self.arch_report = Archiver::from_path(session, "diff_drive/status_report.csv")
            .map_err(DiffDriveError::ArchiveError)?;
        self.arch_output = Archiver::from_path(session, "diff_drive/output.csv")
            .map_err(DiffDriveError::ArchiveError)?;

        Ok(())
    }

    /// Perform one control cycle.
    ///
    /// Never fails: missing or malformed inputs leave the previous values in
    /// place and unsafe conditions produce a stop demand.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let now_s = input_data.time_s;
        let prev_report = self.report;
        self.report = StatusReport { time_s: now_s, ..Default::default() };

        // ---- PARAMETERS AND TIMING ----

        if let Some(ref p) = input_data.params {
            info!("Applying new DiffDrive parameters");
            self.set_params(p.clone());
        }

        let (dt_s, dt_limited) = self.cycle_dt(now_s);
        if dt_limited {
            warn!("Cycle dt limited to {:.3} s", dt_s);
        }
        self.report.dt_s = dt_s;
        self.report.dt_limited = dt_limited;

        // ---- STATE INGESTION ----

        self.ingest(input_data);

        // ---- ARBITRATION ----

        let arb = self.arbitrate(input_data, dt_s);
        if arb.reset_integrators {
            self.speed_ctrl.reset();
            self.yaw_rate_ctrl.reset();
        }
        self.setpoint = arb.setpoint;

        self.report.mode = arb.mode;
        self.report.integrators_reset = arb.reset_integrators;
        self.report.setpoint_speed_ms = self.setpoint.speed_ms;
        self.report.setpoint_yaw_rate_rads = self.setpoint.yaw_rate_rads;

        // ---- CLOSED LOOP CONTROL ----

        // Controllers trim the setpoint rather than replace it
        let speed_out = self.speed_ctrl.update(
            self.setpoint.speed_ms, 
            self.vehicle.forward_speed_ms, 
            dt_s
        );
        let yaw_rate_out = self.yaw_rate_ctrl.update(
            self.setpoint.yaw_rate_rads,
            self.vehicle.yaw_rate_rads,
            dt_s
        );

        let cmd_speed_ms = self.setpoint.speed_ms + speed_out;
        let cmd_yaw_rate_rads = self.setpoint.yaw_rate_rads + yaw_rate_out;

        self.report.speed_ctrl_output = speed_out;
        self.report.yaw_rate_ctrl_output = yaw_rate_out;
        self.report.cmd_speed_ms = cmd_speed_ms;
        self.report.cmd_yaw_rate_rads = cmd_yaw_rate_rads;

        // ---- KINEMATICS AND SAFETY ----

        let raw = self.kinematics.compute_inverse_kinematics(cmd_speed_ms, cmd_yaw_rate_rads);

        let setpoint_age_s = self.setpoint.age_s(now_s);
        let safe = apply_safety(raw, &SafetyInput {
            armed: self.vehicle.armed,
            setpoint_age_s,
            setpoint_timeout_s: self.params.setpoint_timeout_s,
            speed_scale_valid: self.params.speed_scale_valid(),
        });

        self.report.setpoint_age_s = setpoint_age_s;
        self.report.stop_disarmed = safe.stop.disarmed;
        self.report.stop_setpoint_timeout = safe.stop.setpoint_timeout;
        self.report.stop_invalid_speed_scale = safe.stop.invalid_speed_scale;
        self.report.stop_non_finite_output = safe.stop.non_finite_output;
        self.report.left_saturated = safe.saturated[0];
        self.report.right_saturated = safe.saturated[1];

        if safe.stop != prev_report.stop_causes() {
            info!("DiffDrive stop causes: {:?}", safe.stop);
        }

        // ---- OUTPUT ----

        self.output = ActuatorMotors {
            time_s: now_s,
            reversible_flags: self.params.reversible_flags,
            control: safe.cmd.to_array(),
        };

        trace!(
            "DiffDrive output: {:?} (mode {:?}, cmd {:.3} m/s {:.3} rad/s)",
            self.output.control,
            arb.mode,
            cmd_speed_ms,
            cmd_yaw_rate_rads
        );

        Ok((self.output, self.report))
    }
}

impl<G: Guidance> Archived for DiffDrive<G> {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)?;
        self.arch_output.serialise(OutputRecord {
            time_s: self.output.time_s,
            left: self.output.left(),
            right: self.output.right(),
            reversible_flags: self.output.reversible_flags,
        })?;

        Ok(())
    }
}

impl<G: Guidance> DiffDrive<G> {

    /// Create a new controller from the given parameters and guidance.
    ///
    /// Archives are not opened until `init` is called.
    pub fn new(params: Params, guidance: G) -> Self {
        let mut dd = Self {
            params: Params::default(),
            kinematics: DiffDriveKinematics::default(),
            speed_ctrl: PiController::new(0.0, 0.0, 0.0, 0.0),
            yaw_rate_ctrl: PiController::new(0.0, 0.0, 0.0, 0.0),
            arbiter: ModeArbiter::new(),
            guidance,
            vehicle: VehicleState::default(),
            manual: None,
            setpoint: DriveSetpoint::stopped(0.0),
            last_time_s: None,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            output: ActuatorMotors::default(),
            arch_output: Archiver::default(),
        };

        dd.set_params(params);

        dd
    }

    /// Apply a new set of parameters.
    ///
    /// Controller integrals are kept but clamped to the new limits.
    pub fn set_params(&mut self, params: Params) {
        for p in params.problems() {
            warn!("DiffDrive parameter problem, the vehicle will not move: {}", p);
        }

        self.speed_ctrl.set_parameters(
            params.speed_k_p,
            params.speed_k_i,
            params.speed_integral_limit,
            params.speed_output_limit
        );
        self.yaw_rate_ctrl.set_parameters(
            params.yaw_rate_k_p,
            params.yaw_rate_k_i,
            params.yaw_rate_integral_limit,
            params.yaw_rate_output_limit
        );

        self.kinematics = DiffDriveKinematics::from_params(&params);
        self.guidance.set_limits(
            self.kinematics.max_speed_ms, 
            self.kinematics.max_angular_velocity_rads
        );

        self.params = params;
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Output of the last cycle.
    pub fn output(&self) -> &ActuatorMotors {
        &self.output
    }

    /// Status report of the last cycle.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    pub fn guidance(&self) -> &G {
        &self.guidance
    }

    pub fn guidance_mut(&mut self) -> &mut G {
        &mut self.guidance
    }

    pub fn vehicle_state(&self) -> &VehicleState {
        &self.vehicle
    }

    pub fn setpoint(&self) -> &DriveSetpoint {
        &self.setpoint
    }

    pub fn speed_ctrl(&self) -> &PiController {
        &self.speed_ctrl
    }

    pub fn yaw_rate_ctrl(&self) -> &PiController {
        &self.yaw_rate_ctrl
    }

    /// Compute the dt since the previous cycle, clamped to `[0, max_dt_s]`.
    ///
    /// The first cycle, or a time going backwards, gives zero. Returns the dt
    /// and whether it was limited by the ceiling.
    fn cycle_dt(&mut self, now_s: f64) -> (f64, bool) {
        if !now_s.is_finite() {
            warn!("Cycle time is not finite ({}), using zero dt", now_s);
            return (0.0, false);
        }

        let raw_s = match self.last_time_s.replace(now_s) {
            Some(t) => now_s - t,
            None => 0.0
        };
        let max_s = self.params.max_dt_s.max(0.0);

        if raw_s > max_s {
            (max_s, true)
        }
        else if raw_s > 0.0 {
            (raw_s, false)
        }
        else {
            (0.0, false)
        }
    }

    /// Update the sticky vehicle state from any new snapshots.
    fn ingest(&mut self, input: &InputData) {
        if let Some(ref m) = input.control_mode {
            self.vehicle.update_control_mode(m);
        }

        // Attitude before velocity, so the velocity is rotated with the
        // latest attitude.
        if let Some(ref a) = input.attitude {
            if let Err(e) = self.vehicle.update_attitude(a) {
                warn!("Discarding attitude snapshot: {}", e);
            }
        }

        if let Some(ref w) = input.angular_velocity {
            if let Err(e) = self.vehicle.update_angular_velocity(w) {
                warn!("Discarding angular velocity snapshot: {}", e);
            }
        }

        if let Some(ref v) = input.local_velocity {
            if let Err(e) = self.vehicle.update_local_velocity(v) {
                warn!("Discarding local velocity snapshot: {}", e);
            }
        }

        // A sample stamped after the cycle time would never go stale
        if let Some(m) = input.manual {
            if m.time_s.is_finite() && m.throttle.is_finite() && m.turn.is_finite() {
                if m.time_s > input.time_s {
                    warn!(
                        "Discarding manual control snapshot stamped {:.3} s in the future", 
                        m.time_s - input.time_s
                    );
                }
                else {
                    self.manual = Some(m);
                }
            }
            else {
                warn!("Discarding manual control snapshot: {:?}", m);
            }
        }
    }

    /// Run the mode arbiter for this cycle.
    fn arbitrate(&mut self, input: &InputData, dt_s: f64) -> Arbitration {
        let new_override = match input.setpoint_override {
            Some(sp) if sp.time_s > input.time_s => {
                warn!(
                    "Discarding setpoint override stamped {:.3} s in the future", 
                    sp.time_s - input.time_s
                );
                None
            },
            Some(sp) if sp.time_s.is_finite() 
                && sp.speed_ms.is_finite() 
                && sp.yaw_rate_rads.is_finite() => Some(sp),
            Some(sp) => {
                warn!("Discarding setpoint override: {:?}", sp);
                None
            },
            None => None
        };

        let arb_input = ArbiterInput {
            time_s: input.time_s,
            dt_s,
            vehicle: &self.vehicle,
            manual: self.manual.as_ref(),
            new_override: new_override.as_ref(),
            limits: SetpointLimits {
                max_speed_ms: self.kinematics.max_speed_ms,
                max_angular_velocity_rads: self.kinematics.max_angular_velocity_rads,
                speed_scale: self.params.speed_scale,
                ang_velocity_scale: self.params.ang_velocity_scale,
            },
        };

        self.arbiter.arbitrate(&arb_input, &mut self.guidance, self.setpoint)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::auto::{FixedGuidance, GuidanceOutput};

    /// Guidance which records the dt values it is called with.
    struct RecordingGuidance {
        output: GuidanceOutput,
        dts: Vec<f64>,
    }

    impl Guidance for RecordingGuidance {
        fn compute_guidance(&mut self, _heading_rad: f64, _yaw_rate_rads: f64, dt_s: f64) 
            -> GuidanceOutput 
        {
            self.dts.push(dt_s);
            self.output
        }
    }

    /// 2 m/s max speed, 0.5 m wheel base, no controller gains.
    fn params() -> Params {
        Params {
            wheel_base_m: 0.5,
            wheel_radius_m: 0.1,
            max_wheel_speed_rads: 20.0,
            speed_scale: 1.0,
            ang_velocity_scale: 1.0,
            ..Default::default()
        }
    }

    fn guidance(speed_ms: f64, yaw_rate_rads: f64) -> FixedGuidance {
        FixedGuidance(GuidanceOutput { speed_ms, yaw_rate_rads })
    }

    fn mode(time_s: f64, armed: bool, manual: bool, mission: bool) -> Option<VehicleControlMode> {
        Some(VehicleControlMode {
            time_s,
            armed,
            manual_enabled: manual,
            mission_enabled: mission,
        })
    }

    fn joystick(time_s: f64, throttle: f64, turn: f64) -> Option<ManualControlInput> {
        Some(ManualControlInput { time_s, throttle, turn })
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_manual_full_throttle() {
        let mut dd = DiffDrive::new(params(), guidance(0.0, 0.0));

        let (out, rpt) = dd.proc(&InputData {
            time_s: 1.0,
            control_mode: mode(1.0, true, true, false),
            manual: joystick(1.0, 1.0, 0.0),
            ..Default::default()
        }).unwrap();

        assert_eq!(rpt.mode, DriveMode::Manual);
        assert_close(rpt.setpoint_speed_ms, 2.0);
        assert_eq!(rpt.setpoint_yaw_rate_rads, 0.0);
        assert_close(out.left(), 1.0);
        assert_close(out.right(), 1.0);
        assert_eq!(out.time_s, 1.0);
        assert_eq!(out.reversible_flags, 3);
    }

    #[test]
    fn test_mission_turn() {
        let mut dd = DiffDrive::new(params(), guidance(1.0, 1.0));

        let (out, rpt) = dd.proc(&InputData {
            time_s: 1.0,
            control_mode: mode(1.0, true, false, true),
            ..Default::default()
        }).unwrap();

        assert_eq!(rpt.mode, DriveMode::Mission);
        assert_close(out.left(), 0.375);
        assert_close(out.right(), 0.625);
    }

    #[test]
    fn test_disarmed_always_stops() {
        let mut p = params();
        p.speed_k_p = 3.0;
        p.speed_k_i = 1.0;
        let mut dd = DiffDrive::new(p, guidance(2.0, -3.0));

        for i in 0..50 {
            let t = i as f64 * 0.01;
            let (out, rpt) = dd.proc(&InputData {
                time_s: t,
                control_mode: mode(t, false, i % 2 == 0, true),
                manual: joystick(t, 1.0, 1.0),
                setpoint_override: Some(DriveSetpoint { time_s: t, speed_ms: 5.0, yaw_rate_rads: 0.0 }),
                ..Default::default()
            }).unwrap();

            assert!(out.is_stopped());
            assert!(rpt.stop_disarmed);
        }
    }

    #[test]
    fn test_stale_manual_setpoint_stops() {
        let mut dd = DiffDrive::new(params(), guidance(0.0, 0.0));

        let (out, _) = dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, true, false),
            manual: joystick(0.0, 0.5, 0.0),
            ..Default::default()
        }).unwrap();
        assert!(!out.is_stopped());

        // No new joystick samples: still fresh at 100 ms...
        let (out, _) = dd.proc(&InputData { time_s: 0.1, ..Default::default() }).unwrap();
        assert!(!out.is_stopped());

        // ...stale after
        let (out, rpt) = dd.proc(&InputData { time_s: 0.15, ..Default::default() }).unwrap();
        assert!(out.is_stopped());
        assert!(rpt.stop_setpoint_timeout);
        assert!(!rpt.stop_disarmed);

        // A new sample recovers
        let (out, _) = dd.proc(&InputData {
            time_s: 0.16,
            manual: joystick(0.16, 0.5, 0.0),
            ..Default::default()
        }).unwrap();
        assert_close(out.left(), 0.5);
    }

    #[test]
    fn test_invalid_speed_scale_stops() {
        let mut p = params();
        p.speed_scale = 0.0;
        let mut dd = DiffDrive::new(p, guidance(1.0, 0.0));

        let (out, rpt) = dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, false, true),
            ..Default::default()
        }).unwrap();

        assert!(out.is_stopped());
        assert!(rpt.stop_invalid_speed_scale);
    }

    #[test]
    fn test_zero_max_speed_stops_without_nan() {
        let mut p = params();
        p.wheel_radius_m = 0.0;
        let mut dd = DiffDrive::new(p, guidance(1.0, 1.0));

        let (out, _) = dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, false, true),
            ..Default::default()
        }).unwrap();

        assert_eq!(out.control, [0.0, 0.0]);
    }

    #[test]
    fn test_output_always_bounded() {
        let mut p = params();
        p.speed_k_p = 10.0;
        p.speed_k_i = 10.0;
        p.yaw_rate_k_p = 10.0;
        p.yaw_rate_k_i = 10.0;
        let mut dd = DiffDrive::new(p, guidance(0.0, 0.0));

        for i in 0..200 {
            let t = i as f64 * 0.01;
            let (out, _) = dd.proc(&InputData {
                time_s: t,
                control_mode: mode(t, true, true, false),
                manual: joystick(t, if i % 3 == 0 { 1.0 } else { -1.0 }, 1.0),
                angular_velocity: Some(VehicleAngularVelocity { 
                    time_s: t, xyz_rads: [0.0, 0.0, -50.0] 
                }),
                ..Default::default()
            }).unwrap();

            assert!(out.left().abs() <= 1.0);
            assert!(out.right().abs() <= 1.0);
        }
    }

    #[test]
    fn test_controller_trim_is_added() {
        let mut p = params();
        p.speed_k_p = 0.5;
        let mut dd = DiffDrive::new(p, guidance(1.0, 0.0));

        // Vehicle measured at standstill, so the speed error is 1 m/s
        let (_, rpt) = dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, false, true),
            ..Default::default()
        }).unwrap();

        assert_close(rpt.speed_ctrl_output, 0.5);
        assert_close(rpt.cmd_speed_ms, 1.5);
    }

    #[test]
    fn test_mode_switch_resets_integrators() {
        let mut p = params();
        p.speed_k_i = 1.0;
        p.yaw_rate_k_i = 1.0;
        let mut dd = DiffDrive::new(p, guidance(1.0, 0.5));

        // Build up integral in manual mode
        for i in 0..20 {
            let t = i as f64 * 0.01;
            dd.proc(&InputData {
                time_s: t,
                control_mode: mode(t, true, true, false),
                manual: joystick(t, 0.5, 0.5),
                ..Default::default()
            }).unwrap();
        }
        assert!(dd.speed_ctrl().integral() > 0.0);
        assert!(dd.yaw_rate_ctrl().integral() > 0.0);

        // Switch to mission
        let (_, rpt) = dd.proc(&InputData {
            time_s: 0.2,
            control_mode: mode(0.2, true, false, true),
            ..Default::default()
        }).unwrap();

        assert!(rpt.integrators_reset);
        assert_eq!(rpt.mode, DriveMode::Mission);

        // Only this cycle's error has been integrated since the reset
        assert_close(dd.speed_ctrl().integral(), 1.0 * 0.01);
        assert_close(dd.yaw_rate_ctrl().integral(), 0.5 * 0.01);
    }

    #[test]
    fn test_override_resets_and_bypasses() {
        let mut p = params();
        p.speed_k_i = 1.0;
        let mut dd = DiffDrive::new(p, guidance(1.0, 0.0));

        for i in 0..10 {
            let t = i as f64 * 0.01;
            dd.proc(&InputData {
                time_s: t,
                control_mode: mode(t, true, false, true),
                ..Default::default()
            }).unwrap();
        }
        assert!(dd.speed_ctrl().integral() > 0.0);

        let (out, rpt) = dd.proc(&InputData {
            time_s: 0.1,
            setpoint_override: Some(DriveSetpoint { time_s: 0.1, speed_ms: -1.0, yaw_rate_rads: 0.0 }),
            ..Default::default()
        }).unwrap();

        assert_eq!(rpt.mode, DriveMode::ExternalOverride);
        assert!(rpt.integrators_reset);
        assert_close(dd.speed_ctrl().integral(), -1.0 * 0.01);
        assert!(out.left() < 0.0 && out.right() < 0.0);
    }

    #[test]
    fn test_future_override_rejected() {
        let mut dd = DiffDrive::new(params(), guidance(0.0, 0.0));

        // Stamped far ahead of the cycle clock
        let (out, rpt) = dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, false, false),
            setpoint_override: Some(DriveSetpoint { time_s: 1000.0, speed_ms: 1.0, yaw_rate_rads: 0.0 }),
            ..Default::default()
        }).unwrap();
        assert_eq!(rpt.mode, DriveMode::Idle);
        assert!(out.is_stopped());

        // No new data for a long time
        let (out, rpt) = dd.proc(&InputData { time_s: 60.0, ..Default::default() }).unwrap();
        assert!(out.is_stopped());
        assert!(rpt.stop_setpoint_timeout);

        // A correctly stamped stop is still accepted
        let (out, rpt) = dd.proc(&InputData {
            time_s: 60.01,
            setpoint_override: Some(DriveSetpoint::stopped(60.01)),
            ..Default::default()
        }).unwrap();
        assert_eq!(rpt.mode, DriveMode::ExternalOverride);
        assert!(rpt.integrators_reset);
        assert!(!rpt.stop_setpoint_timeout);
        assert!(out.is_stopped());
    }

    #[test]
    fn test_overrides_applied_in_arrival_order() {
        let mut dd = DiffDrive::new(params(), guidance(0.0, 0.0));

        let (out, _) = dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, false, false),
            setpoint_override: Some(DriveSetpoint { time_s: 0.0, speed_ms: 1.0, yaw_rate_rads: 0.0 }),
            ..Default::default()
        }).unwrap();
        assert_close(out.left(), 0.5);

        // A future stamp neither replaces the active override nor keeps it
        // alive
        let (out, rpt) = dd.proc(&InputData {
            time_s: 0.05,
            setpoint_override: Some(DriveSetpoint { time_s: 5.0, speed_ms: -1.0, yaw_rate_rads: 0.0 }),
            ..Default::default()
        }).unwrap();
        assert_eq!(rpt.mode, DriveMode::Idle);
        assert_close(out.left(), 0.5);

        let (out, _) = dd.proc(&InputData { time_s: 0.15, ..Default::default() }).unwrap();
        assert!(out.is_stopped());

        let (out, _) = dd.proc(&InputData {
            time_s: 0.2,
            setpoint_override: Some(DriveSetpoint { time_s: 0.19, speed_ms: -1.0, yaw_rate_rads: 0.0 }),
            ..Default::default()
        }).unwrap();
        assert_close(out.left(), -0.5);

        // Stamped before the previous override but delivered after it
        let (out, rpt) = dd.proc(&InputData {
            time_s: 0.21,
            setpoint_override: Some(DriveSetpoint::stopped(0.18)),
            ..Default::default()
        }).unwrap();
        assert_eq!(rpt.mode, DriveMode::ExternalOverride);
        assert!(!rpt.stop_setpoint_timeout);
        assert_eq!(out.control, [0.0, 0.0]);
    }

    #[test]
    fn test_future_manual_sample_rejected() {
        let mut dd = DiffDrive::new(params(), guidance(0.0, 0.0));

        let (out, rpt) = dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, true, false),
            manual: joystick(0.5, 1.0, 0.0),
            ..Default::default()
        }).unwrap();
        assert_eq!(rpt.mode, DriveMode::Manual);
        assert!(out.is_stopped());

        let (out, _) = dd.proc(&InputData {
            time_s: 0.01,
            manual: joystick(0.01, 0.5, 0.0),
            ..Default::default()
        }).unwrap();
        assert_close(out.left(), 0.5);
    }

    #[test]
    fn test_dt_clamped() {
        let g = RecordingGuidance { output: GuidanceOutput::default(), dts: vec![] };
        let mut p = params();
        p.max_dt_s = 0.2;
        let mut dd = DiffDrive::new(p, g);

        for &t in &[0.0, 0.01, 5.0, 5.01, 4.0, 4.1] {
            dd.proc(&InputData {
                time_s: t,
                control_mode: mode(t, true, false, true),
                ..Default::default()
            }).unwrap();
        }

        let dts = &dd.guidance().dts;
        assert_eq!(dts.len(), 6);
        assert_eq!(dts[0], 0.0);
        assert_close(dts[1], 0.01);
        assert_eq!(dts[2], 0.2);
        assert_close(dts[3], 0.01);
        assert_eq!(dts[4], 0.0);
        assert_close(dts[5], 0.1);
    }

    #[test]
    fn test_long_pause_limits_integral_kick() {
        let mut p = params();
        p.speed_k_i = 1.0;
        p.max_dt_s = 0.5;
        let mut dd = DiffDrive::new(p, guidance(1.0, 0.0));

        dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, false, true),
            ..Default::default()
        }).unwrap();

        let (_, rpt) = dd.proc(&InputData { time_s: 60.0, ..Default::default() }).unwrap();

        assert!(rpt.dt_limited);
        assert_eq!(rpt.dt_s, 0.5);
        assert_close(dd.speed_ctrl().integral(), 0.5);
    }

    #[test]
    fn test_sticky_state_and_malformed_snapshots() {
        let mut dd = DiffDrive::new(params(), guidance(0.0, 0.0));

        dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, true, false),
            angular_velocity: Some(VehicleAngularVelocity { time_s: 0.0, xyz_rads: [0.0, 0.0, 0.25] }),
            local_velocity: Some(VehicleLocalVelocity { time_s: 0.0, vx_ms: 0.5, vy_ms: 0.0, vz_ms: 0.0 }),
            ..Default::default()
        }).unwrap();

        dd.proc(&InputData {
            time_s: 0.01,
            attitude: Some(VehicleAttitude { time_s: 0.01, q: [0.0; 4] }),
            angular_velocity: Some(VehicleAngularVelocity { time_s: 0.01, xyz_rads: [0.0, 0.0, f64::NAN] }),
            manual: joystick(0.01, f64::NAN, 0.0),
            ..Default::default()
        }).unwrap();

        let v = dd.vehicle_state();
        assert!(v.armed);
        assert!(v.manual_enabled);
        assert_eq!(v.heading_rad, 0.0);
        assert_eq!(v.yaw_rate_rads, 0.25);
        assert_close(v.forward_speed_ms, 0.5);
    }

    #[test]
    fn test_idle_holds_setpoint_until_stale() {
        let mut dd = DiffDrive::new(params(), guidance(1.0, 0.0));

        dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, false, true),
            ..Default::default()
        }).unwrap();

        // Mission dropped, setpoint held
        let (out, rpt) = dd.proc(&InputData {
            time_s: 0.05,
            control_mode: mode(0.05, true, false, false),
            ..Default::default()
        }).unwrap();
        assert_eq!(rpt.mode, DriveMode::Idle);
        assert_close(out.left(), 0.5);

        let (out, _) = dd.proc(&InputData { time_s: 0.2, ..Default::default() }).unwrap();
        assert!(out.is_stopped());
    }

    #[test]
    fn test_param_refresh() {
        let mut dd = DiffDrive::new(Params::default(), guidance(1.0, 0.0));

        // Unconfigured vehicle never moves
        let (out, _) = dd.proc(&InputData {
            time_s: 0.0,
            control_mode: mode(0.0, true, false, true),
            ..Default::default()
        }).unwrap();
        assert!(out.is_stopped());

        // Refresh applied before this cycle's arbitration
        let (out, _) = dd.proc(&InputData {
            time_s: 0.01,
            params: Some(params()),
            ..Default::default()
        }).unwrap();
        assert_close(out.left(), 0.5);
        assert_eq!(dd.params().wheel_base_m, 0.5);
    }
}
