// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track definitions and the shared track contract.
//!
//! Every concrete kind lives in its own module; [`Track`] wraps one
//! [`TrackKind`] with the attributes shared by all kinds (name, condition
//! mask, disabled flag) and dispatches the uniform contract: keyframe CRUD,
//! per-tick `evaluate_and_apply`, restore, and authoring aids.

pub mod anim;
pub mod director;
pub mod discrete;
pub(crate) mod keys;
pub mod look_at;
pub mod movement;
pub mod particle;
pub mod property;
pub mod sound;

use crate::context::SequenceContext;
use crate::error::TrackError;
use crate::group::{GroupId, ReferenceFrame};
use crate::rotator::Rotator;
use crate::target::{PropertyKind, PropertyValue, SequenceTarget, TargetId, TargetRegistry};
use glam::{DVec3, DVec4};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use anim::{AnimClipEntry, AnimInstance, AnimTrack};
pub use director::{CameraCutEntry, DirectorInstance, DirectorKey, DirectorTrack};
pub use discrete::{
    EventKey, EventTrack, NotifyKey, NotifyTrack, ToggleAction, ToggleInstance, ToggleKey,
    ToggleTrack, VisibilityAction, VisibilityInstance, VisibilityKey, VisibilityTrack,
};
pub use look_at::{LookAtInstance, LookAtKey, LookAtTrack};
pub use movement::{MoveRotationSource, MovementInstance, MovementTrack};
pub use particle::{ParticleInstance, ParticleReplayKey, ParticleReplayTrack};
pub use property::{
    BoolKey, BoolPropertyTrack, ColorPropertyTrack, FloatPropertyTrack, PropertyInstance,
    VectorPropertyTrack,
};
pub use sound::{AudioMasterTrack, SoundInstance, SoundKey, SoundTrack};

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Create a new random track ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime condition mask gating a track's evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrackCondition {
    /// Evaluate regardless of runtime conditions
    #[default]
    Always,
    /// Evaluate only when the host runs in high-detail mode
    HighDetailOnly,
    /// Evaluate only when the host runs in low-detail mode
    LowDetailOnly,
}

impl TrackCondition {
    /// Whether the mask admits the current runtime condition
    pub fn is_active(self, high_detail: bool) -> bool {
        match self {
            TrackCondition::Always => true,
            TrackCondition::HighDetailOnly => high_detail,
            TrackCondition::LowDetailOnly => !high_detail,
        }
    }
}

/// Inputs to one track update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateArgs {
    /// Position at the previous update
    pub prev: f64,
    /// The new authoritative position
    pub position: f64,
    /// The playhead teleported rather than traversed
    pub is_jump: bool,
    /// Non-authoritative editor scrub; never fires side effects
    pub is_preview: bool,
    /// The update lands exactly on the sequence end, so final keys close
    /// the crossing interval
    pub at_end: bool,
}

impl UpdateArgs {
    /// Whether this update travels backward
    pub(crate) fn reversed(&self) -> bool {
        self.position < self.prev
    }
}

/// The closed set of track kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackKind {
    /// Position/rotation interpolation
    Movement(MovementTrack),
    /// Scalar property channel
    FloatProperty(FloatPropertyTrack),
    /// Vector property channel
    VectorProperty(VectorPropertyTrack),
    /// Color property channel
    ColorProperty(ColorPropertyTrack),
    /// Boolean property channel (stepped)
    BoolProperty(BoolPropertyTrack),
    /// Switch capability driver
    Toggle(ToggleTrack),
    /// Named host events
    Event(EventTrack),
    /// Opaque host notifies
    Notify(NotifyTrack),
    /// Show/hide driver
    Visibility(VisibilityTrack),
    /// Audio cue playback
    Sound(SoundTrack),
    /// Skeletal-animation clips
    Anim(AnimTrack),
    /// Camera-cut selection
    Director(DirectorTrack),
    /// Master audio levels (authored on the director's group)
    AudioMaster(AudioMasterTrack),
    /// Recorded particle playback
    ParticleReplay(ParticleReplayTrack),
    /// Head tracking toward another group
    LookAt(LookAtTrack),
}

impl TrackKind {
    /// Display name for this kind
    pub fn name(&self) -> &'static str {
        match self {
            TrackKind::Movement(_) => "Movement",
            TrackKind::FloatProperty(_) => "Float Property",
            TrackKind::VectorProperty(_) => "Vector Property",
            TrackKind::ColorProperty(_) => "Color Property",
            TrackKind::BoolProperty(_) => "Bool Property",
            TrackKind::Toggle(_) => "Toggle",
            TrackKind::Event(_) => "Event",
            TrackKind::Notify(_) => "Notify",
            TrackKind::Visibility(_) => "Visibility",
            TrackKind::Sound(_) => "Sound",
            TrackKind::Anim(_) => "Animation",
            TrackKind::Director(_) => "Director",
            TrackKind::AudioMaster(_) => "Audio Master",
            TrackKind::ParticleReplay(_) => "Particle Replay",
            TrackKind::LookAt(_) => "Look At",
        }
    }
}

/// Per-binding runtime state for one track
#[derive(Debug, Clone, Default)]
pub enum InstanceState {
    /// Movement state (anchor frame, reset transform)
    Movement(MovementInstance),
    /// Property state (resolved handle, reset value)
    Property(PropertyInstance),
    /// Toggle state (reset level)
    Toggle(ToggleInstance),
    /// Visibility state (reset hidden flag)
    Visibility(VisibilityInstance),
    /// Sound state (active cue)
    Sound(SoundInstance),
    /// Animation state (pose-control flag)
    Anim(AnimInstance),
    /// Director state (saved viewpoint)
    Director(DirectorInstance),
    /// Particle-replay state (active clip)
    Particle(ParticleInstance),
    /// Look-at state (reset rotation)
    LookAt(LookAtInstance),
    /// Kinds with no per-binding state
    #[default]
    Stateless,
}

/// Runtime state for one (track, binding) pair: the last evaluated
/// position plus kind-specific state
#[derive(Debug, Clone, Default)]
pub struct TrackInstance {
    /// Position at the last update
    pub last_position: f64,
    /// Kind-specific state
    pub state: InstanceState,
}

/// A single channel of sequenced behavior, bound to one capability of a
/// target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Runtime condition mask
    #[serde(default)]
    pub condition: TrackCondition,
    /// Disabled tracks restore their reset state instead of evaluating
    #[serde(default)]
    pub disabled: bool,
    /// The concrete kind
    pub kind: TrackKind,
}

impl Track {
    /// Create a track of the given kind
    pub fn new(name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            condition: TrackCondition::default(),
            disabled: false,
            kind,
        }
    }

    /// Whether this is a skeletal-animation track (deferred to the second
    /// pass within a binding, because pose application can be overwritten
    /// by generic property writes)
    pub fn is_anim(&self) -> bool {
        matches!(self.kind, TrackKind::Anim(_))
    }

    /// Build the per-binding instance, snapshotting whatever target state
    /// this track may later need to restore and performing one-time
    /// startup (e.g. taking pose control)
    pub fn init_instance(
        &self,
        target: Option<TargetId>,
        registry: &mut TargetRegistry,
        base_at_bind: Option<(DVec3, Rotator)>,
    ) -> TrackInstance {
        let state = match &self.kind {
            TrackKind::Movement(_) => InstanceState::Movement(
                target
                    .and_then(|id| registry.get(id))
                    .map(|t| MovementInstance::capture(t, base_at_bind))
                    .unwrap_or_default(),
            ),
            TrackKind::FloatProperty(track) => InstanceState::Property(
                bind_property(target, registry, &track.property, PropertyKind::Float),
            ),
            TrackKind::VectorProperty(track) => InstanceState::Property(
                bind_property(target, registry, &track.property, PropertyKind::Vector),
            ),
            TrackKind::ColorProperty(track) => InstanceState::Property(
                bind_property(target, registry, &track.property, PropertyKind::Color),
            ),
            TrackKind::BoolProperty(track) => InstanceState::Property(
                bind_property(target, registry, &track.property, PropertyKind::Bool),
            ),
            TrackKind::Toggle(_) => InstanceState::Toggle(ToggleInstance {
                reset_enabled: target
                    .and_then(|id| registry.get_mut(id))
                    .and_then(|t| t.as_switch())
                    .map(|s| s.is_enabled()),
            }),
            TrackKind::Visibility(_) => InstanceState::Visibility(VisibilityInstance {
                reset_hidden: target
                    .and_then(|id| registry.get(id))
                    .map(|t| t.is_hidden())
                    .unwrap_or(false),
            }),
            TrackKind::Sound(_) => InstanceState::Sound(SoundInstance::default()),
            TrackKind::Anim(_) => {
                let mut instance = AnimInstance::default();
                if let Some(animator) = target
                    .and_then(|id| registry.get_mut(id))
                    .and_then(|t| t.as_animator())
                {
                    animator.begin_control();
                    instance.controlling = true;
                }
                InstanceState::Anim(instance)
            }
            TrackKind::Director(_) => InstanceState::Director(
                target
                    .and_then(|id| registry.get_mut(id))
                    .map(|t| DirectorInstance::capture(t))
                    .unwrap_or_default(),
            ),
            TrackKind::ParticleReplay(_) => InstanceState::Particle(ParticleInstance::default()),
            TrackKind::LookAt(_) => InstanceState::LookAt(LookAtInstance {
                reset_rotation: target
                    .and_then(|id| registry.get(id))
                    .map(|t| t.rotation())
                    .unwrap_or_default(),
            }),
            TrackKind::Event(_) | TrackKind::Notify(_) | TrackKind::AudioMaster(_) => {
                InstanceState::Stateless
            }
        };
        TrackInstance {
            last_position: 0.0,
            state,
        }
    }

    /// The per-tick entry point: evaluate at the context's position and
    /// push the result to the bound target.
    ///
    /// Unbound targets make this a no-op; disabled or condition-masked
    /// tracks restore the reset snapshot instead so they never leave a
    /// stale value.
    pub fn evaluate_and_apply(
        &self,
        instance: &mut TrackInstance,
        target: Option<TargetId>,
        frame: ReferenceFrame,
        base_group: Option<GroupId>,
        ctx: &mut SequenceContext,
        is_jump: bool,
        is_preview: bool,
        at_end: bool,
    ) {
        let args = UpdateArgs {
            prev: instance.last_position,
            position: ctx.position,
            is_jump,
            is_preview,
            at_end,
        };
        instance.last_position = ctx.position;

        if self.disabled || !self.condition.is_active(ctx.high_detail) {
            self.restore_target_state(instance, target, ctx.registry);
            return;
        }
        let Some(target_id) = target else { return };
        if !ctx.registry.contains(target_id) {
            return;
        }

        match (&self.kind, &mut instance.state) {
            (TrackKind::Movement(track), InstanceState::Movement(inst)) => {
                let (position, rotation) =
                    track.evaluate(args.position, ctx, inst, frame, base_group);
                if let Some(target) = ctx.registry.get_mut(target_id) {
                    target.set_location(position);
                    target.set_rotation(rotation);
                }
            }
            (TrackKind::FloatProperty(track), InstanceState::Property(inst)) => {
                let value = PropertyValue::Float(track.evaluate(args.position));
                if let Some(target) = ctx.registry.get_mut(target_id) {
                    inst.apply(target, value);
                }
            }
            (TrackKind::VectorProperty(track), InstanceState::Property(inst)) => {
                let value = PropertyValue::Vector(track.evaluate(args.position));
                if let Some(target) = ctx.registry.get_mut(target_id) {
                    inst.apply(target, value);
                }
            }
            (TrackKind::ColorProperty(track), InstanceState::Property(inst)) => {
                let value = PropertyValue::Color(track.evaluate(args.position));
                if let Some(target) = ctx.registry.get_mut(target_id) {
                    inst.apply(target, value);
                }
            }
            (TrackKind::BoolProperty(track), InstanceState::Property(inst)) => {
                if let Some(value) = track.evaluate(args.position) {
                    if let Some(target) = ctx.registry.get_mut(target_id) {
                        inst.apply(target, PropertyValue::Bool(value));
                    }
                }
            }
            (TrackKind::Toggle(track), InstanceState::Toggle(_)) => {
                if let Some(switch) = ctx
                    .registry
                    .get_mut(target_id)
                    .and_then(|t| t.as_switch())
                {
                    track.update(&args, switch);
                }
            }
            (TrackKind::Visibility(track), InstanceState::Visibility(_)) => {
                if let Some(target) = ctx.registry.get_mut(target_id) {
                    track.update(&args, target);
                }
            }
            (TrackKind::Event(track), _) => track.update(&args, ctx),
            (TrackKind::Notify(track), _) => track.update(&args, ctx),
            (TrackKind::Sound(track), InstanceState::Sound(inst)) => {
                let (master_volume, master_pitch) = (ctx.master_volume, ctx.master_pitch);
                if let Some(speaker) = ctx
                    .registry
                    .get_mut(target_id)
                    .and_then(|t| t.as_speaker())
                {
                    track.update(&args, inst, speaker, master_volume, master_pitch);
                }
            }
            (TrackKind::Anim(track), InstanceState::Anim(_)) => {
                if let Some(animator) = ctx
                    .registry
                    .get_mut(target_id)
                    .and_then(|t| t.as_animator())
                {
                    track.update(&args, animator);
                }
            }
            (TrackKind::Director(track), InstanceState::Director(inst)) => {
                track.update(&args, inst, ctx, target_id);
            }
            (TrackKind::AudioMaster(_), _) => {
                // Consulted by the controller before the traversal; nothing
                // to apply per binding.
            }
            (TrackKind::ParticleReplay(track), InstanceState::Particle(inst)) => {
                if let Some(replayer) = ctx
                    .registry
                    .get_mut(target_id)
                    .and_then(|t| t.as_particle_replayer())
                {
                    track.update(&args, inst, replayer);
                }
            }
            (TrackKind::LookAt(track), InstanceState::LookAt(_)) => {
                let own_location = match ctx.registry.get(target_id) {
                    Some(target) => target.location(),
                    None => return,
                };
                if let Some(rotation) = track.evaluate(args.position, own_location, ctx) {
                    if let Some(target) = ctx.registry.get_mut(target_id) {
                        target.set_rotation(rotation);
                    }
                }
            }
            _ => debug_assert!(false, "track/instance kind mismatch on {}", self.name),
        }
    }

    /// Revert whatever this track mutated on the target to the instance's
    /// reset snapshot
    pub fn restore_target_state(
        &self,
        instance: &mut TrackInstance,
        target: Option<TargetId>,
        registry: &mut TargetRegistry,
    ) {
        let Some(target_id) = target else { return };
        match (&self.kind, &mut instance.state) {
            (TrackKind::Movement(_), InstanceState::Movement(inst)) => {
                if let Some(target) = registry.get_mut(target_id) {
                    target.set_location(inst.reset_location);
                    target.set_rotation(inst.reset_rotation);
                }
            }
            (
                TrackKind::FloatProperty(_)
                | TrackKind::VectorProperty(_)
                | TrackKind::ColorProperty(_)
                | TrackKind::BoolProperty(_),
                InstanceState::Property(inst),
            ) => {
                if let Some(target) = registry.get_mut(target_id) {
                    inst.restore(target);
                }
            }
            (TrackKind::Toggle(_), InstanceState::Toggle(inst)) => {
                if let (Some(reset), Some(switch)) = (
                    inst.reset_enabled,
                    registry.get_mut(target_id).and_then(|t| t.as_switch()),
                ) {
                    switch.set_enabled(reset);
                }
            }
            (TrackKind::Visibility(_), InstanceState::Visibility(inst)) => {
                if let Some(target) = registry.get_mut(target_id) {
                    target.set_hidden(inst.reset_hidden);
                }
            }
            (TrackKind::Sound(track), InstanceState::Sound(inst)) => {
                if let Some(speaker) = registry.get_mut(target_id).and_then(|t| t.as_speaker()) {
                    track.stop(inst, speaker);
                }
            }
            (TrackKind::Director(track), InstanceState::Director(inst)) => {
                track.restore(inst, registry, target_id);
            }
            (TrackKind::ParticleReplay(track), InstanceState::Particle(inst)) => {
                if let Some(replayer) = registry
                    .get_mut(target_id)
                    .and_then(|t| t.as_particle_replayer())
                {
                    track.stop(inst, replayer);
                }
            }
            (TrackKind::LookAt(_), InstanceState::LookAt(inst)) => {
                if let Some(target) = registry.get_mut(target_id) {
                    target.set_rotation(inst.reset_rotation);
                }
            }
            _ => {}
        }
    }

    /// Kind-specific teardown when the binding terminates; animation
    /// tracks hand pose control back to the target
    pub fn terminate_instance(
        &self,
        instance: &mut TrackInstance,
        target: Option<TargetId>,
        registry: &mut TargetRegistry,
    ) {
        if let (TrackKind::Anim(_), InstanceState::Anim(inst)) = (&self.kind, &mut instance.state) {
            if inst.controlling {
                inst.controlling = false;
                if let Some(animator) = target
                    .and_then(|id| registry.get_mut(id))
                    .and_then(|t| t.as_animator())
                {
                    animator.end_control();
                }
            }
        }
    }

    /// Add a keyframe at `time`, sampling the bound target's current state
    /// for the key's value where the kind supports it. Returns the new
    /// key's index.
    pub fn add_keyframe(
        &mut self,
        time: f64,
        instance: Option<&TrackInstance>,
        target: Option<&dyn SequenceTarget>,
        frame: ReferenceFrame,
    ) -> Result<usize, TrackError> {
        match &mut self.kind {
            TrackKind::Movement(track) => {
                let (position, rotation) = match target {
                    Some(target) => {
                        track.sample_from_target(target, movement_instance(instance), frame)
                    }
                    None => (DVec3::ZERO, Rotator::ZERO),
                };
                track.add_key(time, position, rotation)
            }
            TrackKind::FloatProperty(track) => {
                let value = sample_float(target, &track.property)
                    .unwrap_or_else(|| track.evaluate(time));
                Ok(track.curve.add_key(time, value))
            }
            TrackKind::VectorProperty(track) => {
                let value = sample_vector(target, &track.property)
                    .unwrap_or_else(|| track.evaluate(time));
                Ok(track.curve.add_key(time, value))
            }
            TrackKind::ColorProperty(track) => {
                let value = sample_color(target, &track.property)
                    .unwrap_or_else(|| track.evaluate(time));
                Ok(track.curve.add_key(time, value))
            }
            TrackKind::BoolProperty(track) => {
                let value = sample_bool(target, &track.property)
                    .or_else(|| track.evaluate(time))
                    .unwrap_or(false);
                Ok(keys::insert_key(&mut track.keys, BoolKey { time, value }))
            }
            TrackKind::Toggle(track) => Ok(track.add_toggle(time, ToggleAction::Trigger)),
            TrackKind::Event(track) => Ok(track.add_event(time, "")),
            TrackKind::Notify(track) => Ok(track.add_notify(time, "")),
            TrackKind::Visibility(track) => {
                let action = match target.map(|t| t.is_hidden()) {
                    Some(true) => VisibilityAction::Hide,
                    _ => VisibilityAction::Show,
                };
                Ok(track.add_key(time, action))
            }
            TrackKind::Sound(track) => Ok(track.add_cue(time, "", 1.0)),
            TrackKind::Anim(track) => Ok(track.add_entry(AnimClipEntry::new(time, ""))),
            TrackKind::Director(track) => Ok(track.add_cut(time, None, 0.0)),
            TrackKind::AudioMaster(track) => {
                let index = track.volume.add_key(time, 1.0);
                track.pitch.add_key(time, 1.0);
                Ok(index)
            }
            TrackKind::ParticleReplay(track) => Ok(track.add_replay(time, 1.0, 0)),
            TrackKind::LookAt(track) => Ok(track.add_key(time, None)),
        }
    }

    /// Re-sample the bound target's current state into the key at `index`
    /// (authoring aid; kinds without sampled values leave the key as-is)
    pub fn update_keyframe(
        &mut self,
        index: usize,
        instance: Option<&TrackInstance>,
        target: Option<&dyn SequenceTarget>,
        frame: ReferenceFrame,
    ) -> Result<(), TrackError> {
        match &mut self.kind {
            TrackKind::Movement(track) => {
                let Some(target) = target else { return Ok(()) };
                let (position, rotation) =
                    track.sample_from_target(target, movement_instance(instance), frame);
                track.set_key(index, position, rotation)
            }
            TrackKind::FloatProperty(track) => {
                if let Some(value) = sample_float(target, &track.property) {
                    track.curve.set_value(index, value)?;
                }
                Ok(())
            }
            TrackKind::VectorProperty(track) => {
                if let Some(value) = sample_vector(target, &track.property) {
                    track.curve.set_value(index, value)?;
                }
                Ok(())
            }
            TrackKind::ColorProperty(track) => {
                if let Some(value) = sample_color(target, &track.property) {
                    track.curve.set_value(index, value)?;
                }
                Ok(())
            }
            TrackKind::BoolProperty(track) => {
                if index >= track.keys.len() {
                    return Err(TrackError::KeyIndexOutOfRange {
                        index,
                        len: track.keys.len(),
                    });
                }
                if let Some(value) = sample_bool(target, &track.property) {
                    track.keys[index].value = value;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Remove the keyframe at `index`
    pub fn remove_keyframe(&mut self, index: usize) -> Result<(), TrackError> {
        match &mut self.kind {
            TrackKind::Movement(track) => track.remove_key(index),
            TrackKind::FloatProperty(track) => track.curve.remove_key(index).map(|_| ()).map_err(Into::into),
            TrackKind::VectorProperty(track) => track.curve.remove_key(index).map(|_| ()).map_err(Into::into),
            TrackKind::ColorProperty(track) => track.curve.remove_key(index).map(|_| ()).map_err(Into::into),
            TrackKind::BoolProperty(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
            TrackKind::Toggle(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
            TrackKind::Event(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
            TrackKind::Notify(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
            TrackKind::Visibility(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
            TrackKind::Sound(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
            TrackKind::Anim(track) => keys::remove_key(&mut track.entries, index).map(|_| ()),
            TrackKind::Director(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
            TrackKind::AudioMaster(track) => {
                track.volume.remove_key(index)?;
                track.pitch.remove_key(index)?;
                Ok(())
            }
            TrackKind::ParticleReplay(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
            TrackKind::LookAt(track) => keys::remove_key(&mut track.keys, index).map(|_| ()),
        }
    }

    /// Copy the keyframe at `index` to `new_time`. Returns the new index.
    pub fn duplicate_keyframe(&mut self, index: usize, new_time: f64) -> Result<usize, TrackError> {
        match &mut self.kind {
            TrackKind::Movement(track) => track.duplicate_key(index, new_time),
            TrackKind::FloatProperty(track) => track.curve.duplicate_key(index, new_time).map_err(Into::into),
            TrackKind::VectorProperty(track) => track.curve.duplicate_key(index, new_time).map_err(Into::into),
            TrackKind::ColorProperty(track) => track.curve.duplicate_key(index, new_time).map_err(Into::into),
            TrackKind::BoolProperty(track) => keys::duplicate_key(&mut track.keys, index, new_time),
            TrackKind::Toggle(track) => keys::duplicate_key(&mut track.keys, index, new_time),
            TrackKind::Event(track) => keys::duplicate_key(&mut track.keys, index, new_time),
            TrackKind::Notify(track) => keys::duplicate_key(&mut track.keys, index, new_time),
            TrackKind::Visibility(track) => keys::duplicate_key(&mut track.keys, index, new_time),
            TrackKind::Sound(track) => keys::duplicate_key(&mut track.keys, index, new_time),
            TrackKind::Anim(track) => keys::duplicate_key(&mut track.entries, index, new_time),
            TrackKind::Director(track) => keys::duplicate_key(&mut track.keys, index, new_time),
            TrackKind::AudioMaster(track) => {
                let new_index = track.volume.duplicate_key(index, new_time)?;
                track.pitch.duplicate_key(index, new_time)?;
                Ok(new_index)
            }
            TrackKind::ParticleReplay(track) => keys::duplicate_key(&mut track.keys, index, new_time),
            TrackKind::LookAt(track) => keys::duplicate_key(&mut track.keys, index, new_time),
        }
    }

    /// Move the keyframe at `index` to `new_time`. With `reorder` the key
    /// may change position in the array; without it the move is clamped so
    /// the key cannot cross its neighbors. Returns the key's index after
    /// the move — callers caching indices must re-validate.
    pub fn set_keyframe_time(
        &mut self,
        index: usize,
        new_time: f64,
        reorder: bool,
    ) -> Result<usize, TrackError> {
        let clamped = |times: (Option<f64>, Option<f64>)| {
            new_time.clamp(
                times.0.unwrap_or(f64::NEG_INFINITY),
                times.1.unwrap_or(f64::INFINITY),
            )
        };
        match &mut self.kind {
            TrackKind::Movement(track) => {
                let time = if reorder {
                    new_time
                } else {
                    clamped(neighbor_times_curve(&track.positions, index))
                };
                track.move_key(index, time)
            }
            TrackKind::FloatProperty(track) => {
                move_curve_key(&mut track.curve, index, new_time, reorder)
            }
            TrackKind::VectorProperty(track) => {
                move_curve_key(&mut track.curve, index, new_time, reorder)
            }
            TrackKind::ColorProperty(track) => {
                move_curve_key(&mut track.curve, index, new_time, reorder)
            }
            TrackKind::BoolProperty(track) => move_array_key(&mut track.keys, index, new_time, reorder),
            TrackKind::Toggle(track) => move_array_key(&mut track.keys, index, new_time, reorder),
            TrackKind::Event(track) => move_array_key(&mut track.keys, index, new_time, reorder),
            TrackKind::Notify(track) => move_array_key(&mut track.keys, index, new_time, reorder),
            TrackKind::Visibility(track) => move_array_key(&mut track.keys, index, new_time, reorder),
            TrackKind::Sound(track) => move_array_key(&mut track.keys, index, new_time, reorder),
            TrackKind::Anim(track) => move_array_key(&mut track.entries, index, new_time, reorder),
            TrackKind::Director(track) => move_array_key(&mut track.keys, index, new_time, reorder),
            TrackKind::AudioMaster(track) => {
                let time = if reorder {
                    new_time
                } else {
                    clamped(neighbor_times_curve(&track.volume, index))
                };
                let new_index = track.volume.move_key(index, time)?;
                track.pitch.move_key(index, time)?;
                Ok(new_index)
            }
            TrackKind::ParticleReplay(track) => move_array_key(&mut track.keys, index, new_time, reorder),
            TrackKind::LookAt(track) => move_array_key(&mut track.keys, index, new_time, reorder),
        }
    }

    /// Nearest key time to `near`, skipping the given key indices
    pub fn closest_snap_position(&self, near: f64, ignore: &[usize]) -> Option<f64> {
        match &self.kind {
            TrackKind::Movement(track) => track.positions.closest_snap_time(near, ignore),
            TrackKind::FloatProperty(track) => track.curve.closest_snap_time(near, ignore),
            TrackKind::VectorProperty(track) => track.curve.closest_snap_time(near, ignore),
            TrackKind::ColorProperty(track) => track.curve.closest_snap_time(near, ignore),
            TrackKind::BoolProperty(track) => keys::closest_snap(&track.keys, near, ignore),
            TrackKind::Toggle(track) => keys::closest_snap(&track.keys, near, ignore),
            TrackKind::Event(track) => keys::closest_snap(&track.keys, near, ignore),
            TrackKind::Notify(track) => keys::closest_snap(&track.keys, near, ignore),
            TrackKind::Visibility(track) => keys::closest_snap(&track.keys, near, ignore),
            TrackKind::Sound(track) => keys::closest_snap(&track.keys, near, ignore),
            TrackKind::Anim(track) => keys::closest_snap(&track.entries, near, ignore),
            TrackKind::Director(track) => keys::closest_snap(&track.keys, near, ignore),
            TrackKind::AudioMaster(track) => track.volume.closest_snap_time(near, ignore),
            TrackKind::ParticleReplay(track) => keys::closest_snap(&track.keys, near, ignore),
            TrackKind::LookAt(track) => keys::closest_snap(&track.keys, near, ignore),
        }
    }

    /// Number of keyframes
    pub fn keyframe_count(&self) -> usize {
        match &self.kind {
            TrackKind::Movement(track) => track.key_count(),
            TrackKind::FloatProperty(track) => track.curve.len(),
            TrackKind::VectorProperty(track) => track.curve.len(),
            TrackKind::ColorProperty(track) => track.curve.len(),
            TrackKind::BoolProperty(track) => track.keys.len(),
            TrackKind::Toggle(track) => track.keys.len(),
            TrackKind::Event(track) => track.keys.len(),
            TrackKind::Notify(track) => track.keys.len(),
            TrackKind::Visibility(track) => track.keys.len(),
            TrackKind::Sound(track) => track.keys.len(),
            TrackKind::Anim(track) => track.entries.len(),
            TrackKind::Director(track) => track.keys.len(),
            TrackKind::AudioMaster(track) => track.volume.len(),
            TrackKind::ParticleReplay(track) => track.keys.len(),
            TrackKind::LookAt(track) => track.keys.len(),
        }
    }
}

fn movement_instance(instance: Option<&TrackInstance>) -> Option<&MovementInstance> {
    match instance.map(|i| &i.state) {
        Some(InstanceState::Movement(inst)) => Some(inst),
        _ => None,
    }
}

fn bind_property(
    target: Option<TargetId>,
    registry: &TargetRegistry,
    name: &str,
    kind: PropertyKind,
) -> PropertyInstance {
    target
        .and_then(|id| registry.get(id))
        .map(|t| PropertyInstance::bind(t, name, kind))
        .unwrap_or_default()
}

fn sample_float(target: Option<&dyn SequenceTarget>, name: &str) -> Option<f64> {
    match target?.property(name)? {
        PropertyValue::Float(value) => Some(value),
        _ => None,
    }
}

fn sample_bool(target: Option<&dyn SequenceTarget>, name: &str) -> Option<bool> {
    match target?.property(name)? {
        PropertyValue::Bool(value) => Some(value),
        _ => None,
    }
}

fn sample_vector(target: Option<&dyn SequenceTarget>, name: &str) -> Option<DVec3> {
    match target?.property(name)? {
        PropertyValue::Vector(value) => Some(value),
        _ => None,
    }
}

fn sample_color(target: Option<&dyn SequenceTarget>, name: &str) -> Option<DVec4> {
    match target?.property(name)? {
        PropertyValue::Color(value) => Some(value),
        _ => None,
    }
}

fn neighbor_times_curve<T: stagecraft_curves::CurveValue>(
    curve: &stagecraft_curves::Curve<T>,
    index: usize,
) -> (Option<f64>, Option<f64>) {
    let before = index.checked_sub(1).and_then(|i| curve.key(i)).map(|k| k.time);
    let after = curve.key(index + 1).map(|k| k.time);
    (before, after)
}

fn move_curve_key<T: stagecraft_curves::CurveValue>(
    curve: &mut stagecraft_curves::Curve<T>,
    index: usize,
    new_time: f64,
    reorder: bool,
) -> Result<usize, TrackError> {
    let time = if reorder {
        new_time
    } else {
        let (before, after) = neighbor_times_curve(curve, index);
        new_time.clamp(
            before.unwrap_or(f64::NEG_INFINITY),
            after.unwrap_or(f64::INFINITY),
        )
    };
    curve.move_key(index, time).map_err(Into::into)
}

fn move_array_key<K: keys::TimedKey>(
    array: &mut Vec<K>,
    index: usize,
    new_time: f64,
    reorder: bool,
) -> Result<usize, TrackError> {
    if reorder {
        keys::move_key(array, index, new_time)
    } else {
        keys::set_time_clamped(array, index, new_time)
    }
}
