// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe curve storage and evaluation for Stagecraft.
//!
//! This crate provides the leaf component of the sequencing engine:
//! - Typed keyframes with per-segment interpolation modes
//! - Sorted key arrays with index-returning CRUD
//! - Constant / linear / cubic-Hermite evaluation
//! - Auto-tangent recomputation
//!
//! Curves are generic over a [`CurveValue`] payload so that scalar, vector
//! and color channels share one implementation.

pub mod curve;
pub mod keyframe;

pub use curve::{Curve, CurveError};
pub use keyframe::{cubic_interp, lerp, CurveValue, InterpMode, Keyframe};
