//! # Mode arbitration
//!
//! Decides which source is authoritative for the setpoint on each cycle.
//! Sources are resolved in priority order:
//!
//! 1. An external override delivered this cycle, which is applied
//!    immediately. Overrides are ordered by arrival, never by the sender's
//!    timestamp.
//! 2. Manual driving, mapping the latest joystick sample to a setpoint.
//! 3. Mission driving, taking the guidance output verbatim.
//! 4. Nothing, in which case the previous setpoint is held.
//!
//! Modes are level triggered on the vehicle's mode flags. The controller
//! integrators are reset whenever a different source takes over the setpoint
//! and whenever a new override is applied, so that integral history built up
//! while tracking one source is never applied to another.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;

// Internal
use super::VehicleState;
use crate::auto::Guidance;
use comms_if::veh::{DriveSetpoint, ManualControlInput};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The mode the arbiter resolved on a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriveMode {
    /// No source is active, the previous setpoint is held.
    Idle,
    /// Setpoint produced from the joystick.
    Manual,
    /// Setpoint produced by the mission guidance.
    Mission,
    /// Setpoint injected from outside, bypassing manual and mission.
    ExternalOverride,
}

/// The source selected for one cycle, carrying the data it needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetpointSource {
    ExternalOverride(DriveSetpoint),
    Manual(Option<ManualControlInput>),
    Mission,
    Hold,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Scale factors and limits for producing setpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetpointLimits {
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Units: radians/second
    pub max_angular_velocity_rads: f64,

    /// Fraction of the maximum speed reached at full throttle.
    pub speed_scale: f64,

    /// Fraction of the maximum angular velocity reached at full turn.
    pub ang_velocity_scale: f64,
}

/// Everything the arbiter looks at on one cycle.
#[derive(Debug, Clone, Copy)]
pub struct ArbiterInput<'a> {
    /// Current cycle time.
    pub time_s: f64,

    /// Clamped cycle dt.
    pub dt_s: f64,

    /// Latest vehicle state.
    pub vehicle: &'a VehicleState,

    /// Latest known joystick sample.
    pub manual: Option<&'a ManualControlInput>,

    /// Override delivered this cycle, if any. The caller must already have
    /// rejected malformed or future-stamped overrides.
    pub new_override: Option<&'a DriveSetpoint>,

    pub limits: SetpointLimits,
}

/// The result of one arbitration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arbitration {
    pub mode: DriveMode,
    pub setpoint: DriveSetpoint,

    /// True if the controller integrators must be reset before use.
    pub reset_integrators: bool,
}

/// Setpoint source arbiter.
#[derive(Debug, Clone, Default)]
pub struct ModeArbiter {
    /// Mode resolved on the last cycle.
    mode: Option<DriveMode>,

    /// The last mode which actually produced a setpoint. Holding the setpoint
    /// does not change the origin of the setpoint being tracked.
    origin: Option<DriveMode>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModeArbiter {

    pub fn new() -> Self {
        Self::default()
    }

    /// Select the setpoint source for this cycle.
    pub fn resolve_source(&self, input: &ArbiterInput) -> SetpointSource {
        if let Some(sp) = input.new_override {
            return SetpointSource::ExternalOverride(*sp);
        }

        if input.vehicle.manual_enabled {
            SetpointSource::Manual(input.manual.copied())
        }
        else if input.vehicle.mission_enabled {
            SetpointSource::Mission
        }
        else {
            SetpointSource::Hold
        }
    }

    /// Arbitrate the setpoint for this cycle.
    ///
    /// `current` is the setpoint from the previous cycle, returned unchanged
    /// when no source produces a new one.
    pub fn arbitrate<G: Guidance + ?Sized>(
        &mut self,
        input: &ArbiterInput,
        guidance: &mut G,
        current: DriveSetpoint
    ) -> Arbitration {
        let source = self.resolve_source(input);

        let (mode, setpoint) = match source {
            SetpointSource::ExternalOverride(sp) => (DriveMode::ExternalOverride, sp),
            SetpointSource::Manual(Some(manual)) => 
                (DriveMode::Manual, manual_setpoint(&manual, &input.limits)),
            SetpointSource::Manual(None) => (DriveMode::Manual, current),
            SetpointSource::Mission => {
                let out = guidance.compute_guidance(
                    input.vehicle.heading_rad,
                    input.vehicle.yaw_rate_rads,
                    input.dt_s
                );

                if out.speed_ms.is_finite() && out.yaw_rate_rads.is_finite() {
                    (DriveMode::Mission, DriveSetpoint {
                        time_s: input.time_s,
                        speed_ms: out.speed_ms,
                        yaw_rate_rads: out.yaw_rate_rads
                    })
                }
                else {
                    warn!("Guidance produced a non-finite output {:?}, holding setpoint", out);
                    (DriveMode::Mission, current)
                }
            },
            SetpointSource::Hold => (DriveMode::Idle, current)
        };

        // A new override always replaces the tracking in progress, otherwise
        // reset only when the setpoint's origin changes.
        let mut reset_integrators = matches!(source, SetpointSource::ExternalOverride(_));
        if mode != DriveMode::Idle {
            if self.origin.map_or(false, |o| o != mode) {
                reset_integrators = true;
            }
            self.origin = Some(mode);
        }

        if self.mode != Some(mode) {
            debug!("Drive mode changed from {:?} to {:?}", self.mode, mode);
        }
        if reset_integrators {
            debug!("Resetting controller integrators ({:?})", mode);
        }

        self.mode = Some(mode);

        Arbitration {
            mode,
            setpoint,
            reset_integrators
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a joystick sample to a physical setpoint, stamped with the sample's
/// own time so that a joystick which stops streaming goes stale.
pub fn manual_setpoint(manual: &ManualControlInput, limits: &SetpointLimits) -> DriveSetpoint {
    DriveSetpoint {
        time_s: manual.time_s,
        speed_ms: manual.throttle * limits.speed_scale * limits.max_speed_ms,
        yaw_rate_rads: manual.turn 
            * limits.ang_velocity_scale 
            * limits.max_angular_velocity_rads
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::auto::{FixedGuidance, GuidanceOutput};

    fn limits() -> SetpointLimits {
        SetpointLimits {
            max_speed_ms: 2.0,
            max_angular_velocity_rads: 8.0,
            speed_scale: 1.0,
            ang_velocity_scale: 0.5,
        }
    }

    fn vehicle(manual: bool, mission: bool) -> VehicleState {
        VehicleState {
            armed: true,
            manual_enabled: manual,
            mission_enabled: mission,
            ..Default::default()
        }
    }

    fn input<'a>(
        time_s: f64,
        vehicle: &'a VehicleState,
        manual: Option<&'a ManualControlInput>,
        new_override: Option<&'a DriveSetpoint>
    ) -> ArbiterInput<'a> {
        ArbiterInput { time_s, dt_s: 0.01, vehicle, manual, new_override, limits: limits() }
    }

    fn guidance() -> FixedGuidance {
        FixedGuidance(GuidanceOutput { speed_ms: 1.0, yaw_rate_rads: 1.0 })
    }

    #[test]
    fn test_manual_mapping() {
        let manual = ManualControlInput { time_s: 0.5, throttle: 0.5, turn: -1.0 };
        let sp = manual_setpoint(&manual, &limits());

        assert_eq!(sp.time_s, 0.5);
        assert_eq!(sp.speed_ms, 1.0);
        assert_eq!(sp.yaw_rate_rads, -4.0);
    }

    #[test]
    fn test_priority_order() {
        let arb = ModeArbiter::new();
        let manual = ManualControlInput { time_s: 0.0, throttle: 1.0, turn: 0.0 };
        let sp = DriveSetpoint { time_s: 1.0, speed_ms: 0.2, yaw_rate_rads: 0.0 };

        let both = vehicle(true, true);
        let mission = vehicle(false, true);
        let none = vehicle(false, false);

        assert_eq!(
            arb.resolve_source(&input(1.0, &both, Some(&manual), Some(&sp))),
            SetpointSource::ExternalOverride(sp)
        );
        assert_eq!(
            arb.resolve_source(&input(1.0, &both, Some(&manual), None)),
            SetpointSource::Manual(Some(manual))
        );
        assert_eq!(
            arb.resolve_source(&input(1.0, &mission, Some(&manual), None)),
            SetpointSource::Mission
        );
        assert_eq!(
            arb.resolve_source(&input(1.0, &none, Some(&manual), None)),
            SetpointSource::Hold
        );
    }

    #[test]
    fn test_mission_uses_guidance() {
        let mut arb = ModeArbiter::new();
        let veh = vehicle(false, true);

        let a = arb.arbitrate(&input(2.0, &veh, None, None), &mut guidance(), DriveSetpoint::default());
        assert_eq!(a.mode, DriveMode::Mission);
        assert_eq!(a.setpoint, DriveSetpoint { time_s: 2.0, speed_ms: 1.0, yaw_rate_rads: 1.0 });
        assert!(!a.reset_integrators);
    }

    #[test]
    fn test_hold_keeps_setpoint() {
        let mut arb = ModeArbiter::new();
        let veh = vehicle(false, false);
        let current = DriveSetpoint { time_s: 0.3, speed_ms: 0.7, yaw_rate_rads: -0.1 };

        let a = arb.arbitrate(&input(1.0, &veh, None, None), &mut guidance(), current);
        assert_eq!(a.mode, DriveMode::Idle);
        assert_eq!(a.setpoint, current);
    }

    #[test]
    fn test_manual_without_sample_holds() {
        let mut arb = ModeArbiter::new();
        let veh = vehicle(true, false);
        let current = DriveSetpoint { time_s: 0.3, speed_ms: 0.7, yaw_rate_rads: -0.1 };

        let a = arb.arbitrate(&input(1.0, &veh, None, None), &mut guidance(), current);
        assert_eq!(a.mode, DriveMode::Manual);
        assert_eq!(a.setpoint, current);
    }

    #[test]
    fn test_override_applied_on_arrival() {
        let mut arb = ModeArbiter::new();
        let veh = vehicle(true, false);
        let manual = ManualControlInput { time_s: 1.0, throttle: 0.5, turn: 0.0 };
        let sp = DriveSetpoint { time_s: 1.0, speed_ms: 0.2, yaw_rate_rads: 0.1 };

        let a = arb.arbitrate(&input(1.0, &veh, Some(&manual), Some(&sp)), &mut guidance(), DriveSetpoint::default());
        assert_eq!(a.mode, DriveMode::ExternalOverride);
        assert_eq!(a.setpoint, sp);
        assert!(a.reset_integrators);

        // Without a new delivery the flags decide again
        let a = arb.arbitrate(&input(1.01, &veh, Some(&manual), None), &mut guidance(), sp);
        assert_eq!(a.mode, DriveMode::Manual);
        assert_eq!(a.setpoint.speed_ms, 1.0);

        // A later delivery wins even with an older timestamp, and each
        // delivery replaces the tracking in progress
        let old = DriveSetpoint::stopped(0.5);
        let a = arb.arbitrate(&input(1.02, &veh, Some(&manual), Some(&old)), &mut guidance(), sp);
        assert_eq!(a.mode, DriveMode::ExternalOverride);
        assert_eq!(a.setpoint, old);
        assert!(a.reset_integrators);

        let a = arb.arbitrate(&input(1.03, &veh, Some(&manual), Some(&old)), &mut guidance(), old);
        assert_eq!(a.mode, DriveMode::ExternalOverride);
        assert!(a.reset_integrators);
    }

    #[test]
    fn test_reset_on_source_change() {
        let mut arb = ModeArbiter::new();
        let manual = ManualControlInput { time_s: 0.0, throttle: 0.5, turn: 0.0 };
        let manual_veh = vehicle(true, false);
        let mission_veh = vehicle(false, true);
        let idle_veh = vehicle(false, false);
        let sp = DriveSetpoint::default();

        // First producing source does not reset
        assert!(!arb.arbitrate(&input(0.0, &manual_veh, Some(&manual), None), &mut guidance(), sp).reset_integrators);
        assert!(!arb.arbitrate(&input(0.01, &manual_veh, Some(&manual), None), &mut guidance(), sp).reset_integrators);

        // Manual -> mission resets
        assert!(arb.arbitrate(&input(0.02, &mission_veh, Some(&manual), None), &mut guidance(), sp).reset_integrators);
        assert!(!arb.arbitrate(&input(0.03, &mission_veh, Some(&manual), None), &mut guidance(), sp).reset_integrators);

        // Mission -> idle -> mission keeps tracking the same origin
        assert!(!arb.arbitrate(&input(0.04, &idle_veh, Some(&manual), None), &mut guidance(), sp).reset_integrators);
        assert!(!arb.arbitrate(&input(0.05, &mission_veh, Some(&manual), None), &mut guidance(), sp).reset_integrators);

        // Mission -> manual resets
        assert!(arb.arbitrate(&input(0.06, &manual_veh, Some(&manual), None), &mut guidance(), sp).reset_integrators);
    }

    #[test]
    fn test_non_finite_guidance_holds() {
        let mut arb = ModeArbiter::new();
        let veh = vehicle(false, true);
        let current = DriveSetpoint { time_s: 0.3, speed_ms: 0.7, yaw_rate_rads: -0.1 };
        let mut bad = FixedGuidance(GuidanceOutput { speed_ms: f64::NAN, yaw_rate_rads: 0.0 });

        let a = arb.arbitrate(&input(1.0, &veh, None, None), &mut bad, current);
        assert_eq!(a.setpoint, current);
    }
}
