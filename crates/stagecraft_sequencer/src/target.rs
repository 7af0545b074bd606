// SPDX-License-Identifier: MIT OR Apache-2.0
//! Target object capability surface.
//!
//! The sequencer does not own the objects it animates. Hosts register their
//! objects in a [`TargetRegistry`] behind the [`SequenceTarget`] trait and
//! opt into extra behavior through the optional capability accessors
//! (`as_speaker`, `as_animator`, ...). Cross-track look-ups go through
//! [`TargetId`] so a dead target is observed as an absent registry entry,
//! never a dangling reference.

use crate::rotator::Rotator;
use glam::{DVec3, DVec4};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a registered target object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub Uuid);

impl TargetId {
    /// Create a new random target ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type tag for an animatable property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Scalar property
    Float,
    /// Boolean property
    Bool,
    /// 3-vector property
    Vector,
    /// RGBA color property
    Color,
}

/// A value written to or read from a target property
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    /// Scalar value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// 3-vector value
    Vector(DVec3),
    /// RGBA color value
    Color(DVec4),
}

impl PropertyValue {
    /// The kind tag for this value
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Vector(_) => PropertyKind::Vector,
            PropertyValue::Color(_) => PropertyKind::Color,
        }
    }
}

/// A property reference resolved against a target at bind time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyHandle {
    /// Property name on the target
    pub name: String,
    /// Expected value kind
    pub kind: PropertyKind,
}

impl PropertyHandle {
    /// Resolve `name` against `target`, checking that the property exists
    /// and carries the expected kind
    pub fn resolve(
        target: &dyn SequenceTarget,
        name: &str,
        kind: PropertyKind,
    ) -> Option<PropertyHandle> {
        let current = target.property(name)?;
        if current.kind() != kind {
            return None;
        }
        Some(PropertyHandle {
            name: name.to_owned(),
            kind,
        })
    }
}

/// Audio voice owned by a target ("speaker" capability)
pub trait Speaker {
    /// Start (or replace) the active cue on this target's voice
    fn play_cue(&mut self, cue: &str, volume: f64, pitch: f64);
    /// Adjust the active cue's levels without restarting it
    fn set_cue_levels(&mut self, volume: f64, pitch: f64);
    /// Stop the active cue, if any
    fn stop_cue(&mut self);
    /// Whether a cue is currently audible
    fn is_cue_playing(&self) -> bool;
}

/// Skeletal animation playback ("animator" capability)
pub trait Animator {
    /// Take exclusive control of the target's pose
    fn begin_control(&mut self);
    /// Hand pose control back to the target's default behavior
    fn end_control(&mut self);
    /// Length of the named clip in seconds, if the clip exists
    fn clip_length(&self, clip: &str) -> Option<f64>;
    /// Drive the named clip to `position` (clip-local seconds).
    ///
    /// `fire_notifies` lets embedded animation events fire for the span
    /// covered since the last call; a track walking multiple loop
    /// iterations calls this once per iteration.
    fn set_clip_position(&mut self, clip: &str, position: f64, looping: bool, fire_notifies: bool);
}

/// Active-viewpoint ownership ("view holder" capability, e.g. a player)
pub trait ViewHolder {
    /// The current view target, if any
    fn view_target(&self) -> Option<TargetId>;
    /// Transition the viewpoint to `target` over `blend_time` seconds
    fn set_view_target(&mut self, target: Option<TargetId>, blend_time: f64);
}

/// On/off state ("switch" capability, e.g. lights and particle systems)
pub trait Switch {
    /// Set the on/off level state
    fn set_enabled(&mut self, enabled: bool);
    /// Current level state
    fn is_enabled(&self) -> bool;
    /// One-shot activation, independent of level state
    fn trigger(&mut self);
}

/// Recorded particle-simulation playback ("particle replayer" capability)
pub trait ParticleReplayer {
    /// Begin playing back the recorded clip with the given id
    fn begin_clip_playback(&mut self, clip_id: u32);
    /// Stop any active clip playback
    fn end_clip_playback(&mut self);
}

/// The capability surface every sequenced object must provide.
///
/// Optional capabilities default to `None`; targets opt in by overriding
/// the matching accessor.
pub trait SequenceTarget {
    /// Current world-space location
    fn location(&self) -> DVec3;
    /// Move the target to a world-space location
    fn set_location(&mut self, location: DVec3);
    /// Current world-space rotation
    fn rotation(&self) -> Rotator;
    /// Rotate the target in world space
    fn set_rotation(&mut self, rotation: Rotator);

    /// Whether the target is hidden from rendering
    fn is_hidden(&self) -> bool {
        false
    }
    /// Show or hide the target
    fn set_hidden(&mut self, _hidden: bool) {}

    /// The target this one is attached to, if any (drives update ordering)
    fn attach_parent(&self) -> Option<TargetId> {
        None
    }

    /// Read an animatable property by name
    fn property(&self, _name: &str) -> Option<PropertyValue> {
        None
    }
    /// Write an animatable property; returns false if the property is
    /// unknown or the value kind does not match
    fn set_property(&mut self, _name: &str, _value: PropertyValue) -> bool {
        false
    }
    /// Recompute derived state after one or more property writes.
    ///
    /// Targets with a custom per-property callback can branch on `name`.
    fn notify_property_changed(&mut self, _name: &str) {}

    /// Audio capability, if this target owns a voice
    fn as_speaker(&mut self) -> Option<&mut dyn Speaker> {
        None
    }
    /// Skeletal animation capability
    fn as_animator(&mut self) -> Option<&mut dyn Animator> {
        None
    }
    /// Viewpoint-holding capability
    fn as_view_holder(&mut self) -> Option<&mut dyn ViewHolder> {
        None
    }
    /// On/off switch capability
    fn as_switch(&mut self) -> Option<&mut dyn Switch> {
        None
    }
    /// Particle replay capability
    fn as_particle_replayer(&mut self) -> Option<&mut dyn ParticleReplayer> {
        None
    }
}

/// Host-owned registry of sequenceable objects.
///
/// The registry is passed into every tick; entries may be removed between
/// ticks and the sequencer observes the absence instead of dangling.
#[derive(Default)]
pub struct TargetRegistry {
    targets: IndexMap<TargetId, Box<dyn SequenceTarget>>,
}

impl TargetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target under a fresh id
    pub fn register(&mut self, target: Box<dyn SequenceTarget>) -> TargetId {
        let id = TargetId::new();
        self.targets.insert(id, target);
        id
    }

    /// Register a target under a caller-chosen id, replacing any previous
    /// entry with that id
    pub fn register_with_id(&mut self, id: TargetId, target: Box<dyn SequenceTarget>) {
        self.targets.insert(id, target);
    }

    /// Remove a target; subsequent look-ups observe it as gone
    pub fn remove(&mut self, id: TargetId) -> Option<Box<dyn SequenceTarget>> {
        self.targets.shift_remove(&id)
    }

    /// Whether `id` is currently registered
    pub fn contains(&self, id: TargetId) -> bool {
        self.targets.contains_key(&id)
    }

    /// Shared access to a target
    pub fn get(&self, id: TargetId) -> Option<&dyn SequenceTarget> {
        self.targets.get(&id).map(|t| t.as_ref())
    }

    /// Exclusive access to a target
    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut (dyn SequenceTarget + '_)> {
        self.targets.get_mut(&id).map(|t| &mut **t as &mut dyn SequenceTarget)
    }

    /// Number of parent links from `id` to the root of its attachment chain,
    /// counting only parents that satisfy `counts`.
    ///
    /// Cycles are cut off at the registry size.
    pub fn attachment_depth(&self, id: TargetId, counts: impl Fn(TargetId) -> bool) -> usize {
        let mut depth = 0;
        let mut current = id;
        for _ in 0..self.targets.len() {
            let Some(parent) = self.get(current).and_then(|t| t.attach_parent()) else {
                break;
            };
            if counts(parent) {
                depth += 1;
            }
            current = parent;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        location: DVec3,
        parent: Option<TargetId>,
    }

    impl SequenceTarget for Dummy {
        fn location(&self) -> DVec3 {
            self.location
        }
        fn set_location(&mut self, location: DVec3) {
            self.location = location;
        }
        fn rotation(&self) -> Rotator {
            Rotator::ZERO
        }
        fn set_rotation(&mut self, _rotation: Rotator) {}
        fn attach_parent(&self) -> Option<TargetId> {
            self.parent
        }
        fn property(&self, name: &str) -> Option<PropertyValue> {
            (name == "intensity").then_some(PropertyValue::Float(1.0))
        }
    }

    fn dummy(parent: Option<TargetId>) -> Box<dyn SequenceTarget> {
        Box::new(Dummy {
            location: DVec3::ZERO,
            parent,
        })
    }

    #[test]
    fn test_registry_lifecycle() {
        let mut registry = TargetRegistry::new();
        let id = registry.register(dummy(None));
        assert!(registry.contains(id));
        registry.get_mut(id).unwrap().set_location(DVec3::ONE);
        assert_eq!(registry.get(id).unwrap().location(), DVec3::ONE);
        registry.remove(id);
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn test_attachment_depth_counts_filtered_parents() {
        let mut registry = TargetRegistry::new();
        let root = registry.register(dummy(None));
        let mid = registry.register(dummy(Some(root)));
        let leaf = registry.register(dummy(Some(mid)));

        assert_eq!(registry.attachment_depth(root, |_| true), 0);
        assert_eq!(registry.attachment_depth(leaf, |_| true), 2);
        // Only parents under sequencer control count.
        assert_eq!(registry.attachment_depth(leaf, |id| id == mid), 1);
    }

    #[test]
    fn test_property_handle_resolution() {
        let target = Dummy {
            location: DVec3::ZERO,
            parent: None,
        };
        assert!(PropertyHandle::resolve(&target, "intensity", PropertyKind::Float).is_some());
        assert!(PropertyHandle::resolve(&target, "intensity", PropertyKind::Bool).is_none());
        assert!(PropertyHandle::resolve(&target, "missing", PropertyKind::Float).is_none());
    }
}
