// SPDX-License-Identifier: MIT OR Apache-2.0
//! Euler rotations with winding bookkeeping.
//!
//! Movement tracks store rotation as Euler angles so authored values can
//! exceed a full turn. Quaternions are used for frame composition, but a
//! quaternion round-trip collapses angles into `(-180, 180]`; the winding
//! split here carries the whole-turn component across that round-trip.

use glam::{DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// An Euler rotation in degrees.
///
/// Convention: Y-up, yaw 0 faces +Z, positive pitch looks up, yaw applied
/// first, then pitch, then roll.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    /// Elevation, degrees; positive looks up
    pub pitch: f64,
    /// Heading about +Y, degrees
    pub yaw: f64,
    /// Bank about the facing axis, degrees
    pub roll: f64,
}

/// Normalize one angle to `(-180, 180]`, returning `(winding, remainder)`
/// with `winding + remainder == angle` and `winding` a multiple of 360.
fn wind_angle(angle: f64) -> (f64, f64) {
    let mut remainder = angle % 360.0;
    if remainder > 180.0 {
        remainder -= 360.0;
    } else if remainder <= -180.0 {
        remainder += 360.0;
    }
    (angle - remainder, remainder)
}

/// Shift `angle` by whole turns so it lands within 180 degrees of `reference`
fn nearest_branch(angle: f64, reference: f64) -> f64 {
    let (_, delta) = wind_angle(angle - reference);
    reference + delta
}

impl Rotator {
    /// Identity rotation
    pub const ZERO: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    /// Create from components in degrees
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Create from a `(pitch, yaw, roll)` vector in degrees
    pub fn from_euler(euler: DVec3) -> Self {
        Self::new(euler.x, euler.y, euler.z)
    }

    /// Components as a `(pitch, yaw, roll)` vector in degrees
    pub fn as_euler(self) -> DVec3 {
        DVec3::new(self.pitch, self.yaw, self.roll)
    }

    /// Split into a whole-turns component and a `(-180, 180]` remainder
    pub fn winding_and_remainder(self) -> (Self, Self) {
        let (wp, rp) = wind_angle(self.pitch);
        let (wy, ry) = wind_angle(self.yaw);
        let (wr, rr) = wind_angle(self.roll);
        (Self::new(wp, wy, wr), Self::new(rp, ry, rr))
    }

    /// Shift each component by whole turns to the branch closest to
    /// `reference`'s matching component
    pub fn nearest_branch_to(self, reference: Self) -> Self {
        Self::new(
            nearest_branch(self.pitch, reference.pitch),
            nearest_branch(self.yaw, reference.yaw),
            nearest_branch(self.roll, reference.roll),
        )
    }

    /// Convert to a quaternion (collapses winding)
    pub fn to_quat(self) -> DQuat {
        // Positive pitch looks up, which is a negative rotation about +X.
        DQuat::from_euler(
            EulerRot::YXZ,
            self.yaw.to_radians(),
            (-self.pitch).to_radians(),
            self.roll.to_radians(),
        )
    }

    /// Recover a rotator from a quaternion; all components in `(-180, 180]`
    pub fn from_quat(quat: DQuat) -> Self {
        let (yaw, x_angle, roll) = quat.to_euler(EulerRot::YXZ);
        Self::new(-x_angle.to_degrees(), yaw.to_degrees(), roll.to_degrees())
    }

    /// The unit direction this rotation faces (roll has no effect)
    pub fn direction(self) -> DVec3 {
        self.to_quat() * DVec3::Z
    }

    /// The rotation that faces from `from` toward `to`, with zero roll.
    ///
    /// Returns identity when the points coincide.
    pub fn facing(from: DVec3, to: DVec3) -> Self {
        let delta = to - from;
        if delta.length_squared() < 1.0e-12 {
            return Self::ZERO;
        }
        let dir = delta.normalize();
        let yaw = dir.x.atan2(dir.z).to_degrees();
        let pitch = dir.y.clamp(-1.0, 1.0).asin().to_degrees();
        Self::new(pitch, yaw, 0.0)
    }

    /// Compose `relative` onto this rotation, preserving winding.
    ///
    /// The remainder composes through quaternions; the whole-turn component
    /// and the branch nearest the accumulated Euler sum are restored
    /// afterwards so wind state above a full turn survives.
    pub fn compose(self, relative: Rotator) -> Self {
        let (winding, remainder) = self.winding_and_remainder();
        let quat = remainder.to_quat() * relative.to_quat();
        let accumulated = remainder + relative;
        let composed = Rotator::from_quat(quat).nearest_branch_to(accumulated);
        winding + composed
    }
}

impl Add for Rotator {
    type Output = Rotator;

    fn add(self, rhs: Rotator) -> Rotator {
        Rotator::new(
            self.pitch + rhs.pitch,
            self.yaw + rhs.yaw,
            self.roll + rhs.roll,
        )
    }
}

impl Sub for Rotator {
    type Output = Rotator;

    fn sub(self, rhs: Rotator) -> Rotator {
        Rotator::new(
            self.pitch - rhs.pitch,
            self.yaw - rhs.yaw,
            self.roll - rhs.roll,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winding_split() {
        let (winding, remainder) = Rotator::new(0.0, 725.0, -190.0).winding_and_remainder();
        assert_eq!(winding.yaw, 720.0);
        assert_eq!(remainder.yaw, 5.0);
        assert_eq!(winding.roll, -360.0);
        assert_eq!(remainder.roll, 170.0);
        assert_eq!(winding.pitch + remainder.pitch, 0.0);
    }

    #[test]
    fn test_nearest_branch() {
        assert_eq!(nearest_branch(350.0, 0.0), -10.0);
        assert_eq!(nearest_branch(-350.0, 0.0), 10.0);
        assert_eq!(nearest_branch(10.0, 720.0), 730.0);
        assert_eq!(nearest_branch(10.0, 10.0), 10.0);
    }

    #[test]
    fn test_quat_round_trip_collapses_winding() {
        let rot = Rotator::new(10.0, 380.0, 0.0);
        let back = Rotator::from_quat(rot.to_quat());
        assert!((back.yaw - 20.0).abs() < 1e-9);
        assert!((back.pitch - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_compose_preserves_winding() {
        let initial = Rotator::new(0.0, 720.0, 0.0);
        let composed = initial.compose(Rotator::new(0.0, 30.0, 0.0));
        assert!((composed.yaw - 750.0).abs() < 1e-9);
    }

    #[test]
    fn test_compose_identity() {
        let rot = Rotator::new(15.0, -40.0, 5.0);
        let composed = rot.compose(Rotator::ZERO);
        assert!((composed.pitch - rot.pitch).abs() < 1e-9);
        assert!((composed.yaw - rot.yaw).abs() < 1e-9);
        assert!((composed.roll - rot.roll).abs() < 1e-9);
    }

    #[test]
    fn test_facing_axes() {
        let ahead = Rotator::facing(DVec3::ZERO, DVec3::new(0.0, 0.0, 5.0));
        assert!(ahead.yaw.abs() < 1e-9);
        assert!(ahead.pitch.abs() < 1e-9);

        let right = Rotator::facing(DVec3::ZERO, DVec3::new(3.0, 0.0, 0.0));
        assert!((right.yaw - 90.0).abs() < 1e-9);

        let up = Rotator::facing(DVec3::ZERO, DVec3::new(0.0, 2.0, 0.0));
        assert!((up.pitch - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_direction_matches_facing() {
        let target = DVec3::new(4.0, 1.0, -2.0);
        let rot = Rotator::facing(DVec3::ZERO, target);
        let dir = rot.direction();
        assert!(dir.dot(target.normalize()) > 0.9999);
    }
}
