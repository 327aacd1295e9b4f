//! Last known state of the vehicle, built from the incoming snapshots.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Serialize;
use thiserror::Error;

// Internal
use comms_if::veh::{
    VehicleAngularVelocity, VehicleAttitude, VehicleControlMode, VehicleLocalVelocity
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Quaternions with a norm below this are rejected.
const MIN_QUATERNION_NORM: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The vehicle state used by the controller.
///
/// Each field is sticky: it only changes when a valid snapshot for it
/// arrives.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VehicleState {
    /// Actuators may be driven.
    pub armed: bool,

    /// Manual driving is enabled.
    pub manual_enabled: bool,

    /// Mission driving is enabled.
    pub mission_enabled: bool,

    /// Yaw angle of the vehicle in the local frame.
    ///
    /// Units: radians
    pub heading_rad: f64,

    /// Measured angular rate about the body Z axis.
    ///
    /// Units: radians/second
    pub yaw_rate_rads: f64,

    /// Measured forward (body X) velocity.
    ///
    /// Units: meters/second
    pub forward_speed_ms: f64,

    /// Latest attitude, used to rotate local velocities into the body frame.
    #[serde(skip)]
    pub attitude_q: UnitQuaternion<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a snapshot can be rejected.
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("Attitude quaternion {0:?} is not finite")]
    NonFiniteQuaternion([f64; 4]),

    #[error("Attitude quaternion {0:?} has (near) zero norm")]
    DegenerateQuaternion([f64; 4]),

    #[error("{0} snapshot contains non-finite values")]
    NonFinite(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            armed: false,
            manual_enabled: false,
            mission_enabled: false,
            heading_rad: 0.0,
            yaw_rate_rads: 0.0,
            forward_speed_ms: 0.0,
            attitude_q: UnitQuaternion::identity(),
        }
    }
}

impl VehicleState {

    /// Update the arm and mode flags.
    pub fn update_control_mode(&mut self, mode: &VehicleControlMode) {
        self.armed = mode.armed;
        self.manual_enabled = mode.manual_enabled;
        self.mission_enabled = mode.mission_enabled;
    }

    /// Update the attitude and heading.
    pub fn update_attitude(&mut self, att: &VehicleAttitude) -> Result<(), SnapshotError> {
        if !att.q.iter().all(|v| v.is_finite()) {
            return Err(SnapshotError::NonFiniteQuaternion(att.q));
        }

        let q = Quaternion::new(att.q[0], att.q[1], att.q[2], att.q[3]);

        if q.norm() < MIN_QUATERNION_NORM {
            return Err(SnapshotError::DegenerateQuaternion(att.q));
        }

        self.attitude_q = UnitQuaternion::from_quaternion(q);
        self.heading_rad = self.attitude_q.euler_angles().2;

        Ok(())
    }

    /// Update the measured yaw rate.
    pub fn update_angular_velocity(
        &mut self, 
        ang_vel: &VehicleAngularVelocity
    ) -> Result<(), SnapshotError> {
        if !ang_vel.xyz_rads[2].is_finite() {
            return Err(SnapshotError::NonFinite("Angular velocity"));
        }

        self.yaw_rate_rads = ang_vel.xyz_rads[2];

        Ok(())
    }

    /// Update the measured forward speed by rotating the local velocity into
    /// the body frame using the latest attitude.
    pub fn update_local_velocity(
        &mut self, 
        vel: &VehicleLocalVelocity
    ) -> Result<(), SnapshotError> {
        let vel_m_lm = Vector3::new(vel.vx_ms, vel.vy_ms, vel.vz_ms);

        if !vel_m_lm.iter().all(|v| v.is_finite()) {
            return Err(SnapshotError::NonFinite("Local velocity"));
        }

        let vel_m_rb = self.attitude_q.inverse_transform_vector(&vel_m_lm);
        self.forward_speed_ms = vel_m_rb[0];

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn yaw_q(yaw_rad: f64) -> [f64; 4] {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad);
        [q.w, q.i, q.j, q.k]
    }

    #[test]
    fn test_heading_from_attitude() {
        let mut state = VehicleState::default();

        state.update_attitude(&VehicleAttitude { time_s: 0.0, q: yaw_q(0.7) }).unwrap();
        assert!((state.heading_rad - 0.7).abs() < 1e-9);

        // Non-normalised quaternions are accepted
        let q = yaw_q(-1.2);
        state.update_attitude(&VehicleAttitude { 
            time_s: 0.0, 
            q: [q[0] * 3.0, q[1] * 3.0, q[2] * 3.0, q[3] * 3.0]
        }).unwrap();
        assert!((state.heading_rad + 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_body_frame_velocity() {
        let mut state = VehicleState::default();

        // Facing along local Y and moving along local Y is forwards
        state.update_attitude(&VehicleAttitude { time_s: 0.0, q: yaw_q(FRAC_PI_2) }).unwrap();
        state.update_local_velocity(&VehicleLocalVelocity {
            time_s: 0.0, vx_ms: 0.0, vy_ms: 1.5, vz_ms: 0.0
        }).unwrap();
        assert!((state.forward_speed_ms - 1.5).abs() < 1e-9);

        // Moving along local X is sideways, so no forward speed
        state.update_local_velocity(&VehicleLocalVelocity {
            time_s: 0.0, vx_ms: 1.5, vy_ms: 0.0, vz_ms: 0.0
        }).unwrap();
        assert!(state.forward_speed_ms.abs() < 1e-9);
    }

    #[test]
    fn test_malformed_snapshots_are_rejected() {
        let mut state = VehicleState::default();
        state.update_attitude(&VehicleAttitude { time_s: 0.0, q: yaw_q(0.5) }).unwrap();
        state.update_angular_velocity(&VehicleAngularVelocity {
            time_s: 0.0, xyz_rads: [0.0, 0.0, 0.3]
        }).unwrap();

        assert_eq!(
            state.update_attitude(&VehicleAttitude { time_s: 0.0, q: [0.0; 4] }),
            Err(SnapshotError::DegenerateQuaternion([0.0; 4]))
        );
        assert!(state.update_attitude(
            &VehicleAttitude { time_s: 0.0, q: [f64::NAN, 0.0, 0.0, 1.0] }
        ).is_err());
        assert!(state.update_angular_velocity(
            &VehicleAngularVelocity { time_s: 0.0, xyz_rads: [0.0, 0.0, f64::INFINITY] }
        ).is_err());
        assert!(state.update_local_velocity(
            &VehicleLocalVelocity { time_s: 0.0, vx_ms: f64::NAN, vy_ms: 0.0, vz_ms: 0.0 }
        ).is_err());

        // Previous values retained
        assert!((state.heading_rad - 0.5).abs() < 1e-9);
        assert_eq!(state.yaw_rate_rads, 0.3);
    }

    #[test]
    fn test_control_mode() {
        let mut state = VehicleState::default();
        assert!(!state.armed);

        state.update_control_mode(&VehicleControlMode {
            time_s: 0.0, armed: true, manual_enabled: true, mission_enabled: false
        });
        assert!(state.armed);
        assert!(state.manual_enabled);
        assert!(!state.mission_enabled);
    }
}
