// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline sequencing engine for Stagecraft.
//!
//! This crate drives scripted cinematic sequences: time-based interpolation
//! of transforms and properties, camera cuts, audio cues and discrete
//! events, applied to host-owned target objects.
//!
//! ## Architecture
//!
//! The engine is built on:
//! - Track kinds implementing one shared contract (keyframe CRUD,
//!   `evaluate_and_apply`, restore)
//! - Track groups describing one participant each
//! - Group bindings pairing a group with a live target and owning the
//!   per-target track instances
//! - A sequence controller owning the playhead state machine and the
//!   per-tick update ordering
//! - A handle-based [`Sequencer`] surface for hosts running several
//!   sequences at once
//!
//! Targets are registered in a [`TargetRegistry`] behind the
//! [`SequenceTarget`] capability trait; everything a track consults during
//! evaluation travels in a [`SequenceContext`].

pub mod binding;
pub mod context;
pub mod controller;
pub mod error;
pub mod group;
pub mod player;
pub mod rotator;
pub mod sequence;
pub mod target;
pub mod tracks;

pub use binding::GroupBinding;
pub use context::{SequenceContext, SequenceEvent};
pub use controller::{PendingAction, PlaybackState, SequenceController};
pub use error::{BindError, TrackError};
pub use group::{GroupId, ReferenceFrame, TrackGroup};
pub use player::{SequenceHandle, Sequencer};
pub use rotator::Rotator;
pub use sequence::{SequenceDef, SequenceId};
pub use target::{
    Animator, ParticleReplayer, PropertyHandle, PropertyKind, PropertyValue, SequenceTarget,
    Speaker, Switch, TargetId, TargetRegistry, ViewHolder,
};
pub use tracks::{
    AnimClipEntry, AnimTrack, AudioMasterTrack, BoolPropertyTrack, CameraCutEntry,
    ColorPropertyTrack, DirectorTrack, EventTrack, FloatPropertyTrack, LookAtTrack,
    MoveRotationSource, MovementTrack, NotifyTrack, ParticleReplayTrack, SoundTrack, Track,
    TrackCondition, TrackId, TrackInstance, TrackKind, ToggleAction, ToggleTrack,
    VectorPropertyTrack, VisibilityAction, VisibilityTrack,
};
