// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for authoring and activation.
//!
//! Runtime evaluation never surfaces errors: absent targets and missing
//! capabilities are expected per-tick conditions handled by no-op or
//! restore. Errors exist only on the authoring surface (keyframe CRUD) and
//! the activation surface (resolving bindings).

use crate::group::GroupId;
use crate::target::TargetId;
use stagecraft_curves::CurveError;

/// Error from a track authoring operation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackError {
    /// A curve-level CRUD error
    #[error(transparent)]
    Curve(#[from] CurveError),

    /// Key index out of range for a discrete key array
    #[error("key index {index} out of range (track has {len} keys)")]
    KeyIndexOutOfRange {
        /// The offending index
        index: usize,
        /// Number of keys in the track
        len: usize,
    },

    /// Companion channels of a composite track disagree in length.
    ///
    /// This indicates authoring-time corruption; the mutating operation is
    /// aborted and the track must be repaired before further edits.
    #[error("movement channels disagree: {positions} position / {rotations} rotation / {lookups} look-up keys")]
    ChannelMismatch {
        /// Position-channel key count
        positions: usize,
        /// Rotation-channel key count
        rotations: usize,
        /// Look-up-channel key count
        lookups: usize,
    },
}

/// Error from activating a sequence
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BindError {
    /// Two groups resolved to the same target object
    #[error("target {target:?} already bound by group {bound_by:?}")]
    TargetAlreadyBound {
        /// The doubly-claimed target
        target: TargetId,
        /// The group that claimed it first
        bound_by: GroupId,
    },
}
