// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions and interpolation primitives.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

/// Interpolation mode for the segment leaving a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InterpMode {
    /// Hold the key's value until the next key (step)
    Constant,
    /// Linear interpolation to the next key
    #[default]
    Linear,
    /// Cubic Hermite interpolation with user-authored tangents
    Cubic,
    /// Cubic Hermite interpolation with automatically recomputed tangents
    CubicAuto,
}

impl InterpMode {
    /// Whether this mode uses the arrive/leave tangents
    pub fn uses_tangents(self) -> bool {
        matches!(self, InterpMode::Cubic | InterpMode::CubicAuto)
    }
}

/// Value types a curve can carry.
///
/// Implemented by anything with component-wise add/sub and scaling by a
/// time scalar (`f64`, `glam::DVec3`, `glam::DVec4`, ...).
pub trait CurveValue:
    Copy
    + Default
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
{
}

impl<T> CurveValue for T where
    T: Copy
        + Default
        + Debug
        + PartialEq
        + Add<Output = T>
        + Sub<Output = T>
        + Mul<f64, Output = T>
{
}

/// A single time→value control point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    /// Time in seconds
    pub time: f64,
    /// Value at this keyframe
    pub value: T,
    /// Interpolation mode for the segment leaving this key
    pub interp: InterpMode,
    /// Incoming tangent (value units per second)
    pub arrive_tangent: T,
    /// Outgoing tangent (value units per second)
    pub leave_tangent: T,
}

impl<T: CurveValue> Keyframe<T> {
    /// Create a keyframe with zero tangents and the default interpolation
    pub fn new(time: f64, value: T) -> Self {
        Self {
            time,
            value,
            interp: InterpMode::default(),
            arrive_tangent: T::default(),
            leave_tangent: T::default(),
        }
    }

    /// Set the interpolation mode
    pub fn with_interp(mut self, interp: InterpMode) -> Self {
        self.interp = interp;
        self
    }

    /// Set both tangents
    pub fn with_tangents(mut self, arrive: T, leave: T) -> Self {
        self.arrive_tangent = arrive;
        self.leave_tangent = leave;
        self
    }
}

/// Linear interpolation between two values
pub fn lerp<T: CurveValue>(a: T, b: T, alpha: f64) -> T {
    a + (b - a) * alpha
}

/// Cubic Hermite interpolation.
///
/// Tangents are expected to already be scaled to the segment length, so
/// `alpha` runs over `[0, 1]`.
pub fn cubic_interp<T: CurveValue>(p0: T, t0: T, p1: T, t1: T, alpha: f64) -> T {
    let a2 = alpha * alpha;
    let a3 = a2 * alpha;

    let h00 = 2.0 * a3 - 3.0 * a2 + 1.0;
    let h10 = a3 - 2.0 * a2 + alpha;
    let h01 = -2.0 * a3 + 3.0 * a2;
    let h11 = a3 - a2;

    p0 * h00 + t0 * h10 + p1 * h01 + t1 * h11
}
