// SPDX-License-Identifier: MIT OR Apache-2.0
//! Movement tracks: position and rotation over time.
//!
//! A movement track carries three index-aligned channels: a position curve,
//! a rotation curve (Euler degrees, so authored values can wind past a full
//! turn) and a look-up channel that can source individual keyframes from
//! another group's live target. Authoring operations mirror every edit
//! across all three channels to keep them aligned.

use crate::context::SequenceContext;
use crate::error::TrackError;
use crate::group::{GroupId, ReferenceFrame};
use crate::rotator::Rotator;
use crate::target::SequenceTarget;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use stagecraft_curves::{cubic_interp, lerp, Curve, InterpMode};

/// Where a movement track's evaluated rotation comes from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum MoveRotationSource {
    /// The rotation curve
    #[default]
    Curve,
    /// Face another group's target, ignoring the rotation curve entirely
    LookAtGroup(GroupId),
}

/// Keyframed position and rotation for one target
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MovementTrack {
    /// Position channel
    pub positions: Curve<DVec3>,
    /// Rotation channel, Euler degrees as `(pitch, yaw, roll)`
    pub rotations: Curve<DVec3>,
    /// Per-key look-up: `Some(group)` sources this key from that group's
    /// live target instead of the local curves
    pub lookups: Vec<Option<GroupId>>,
    /// Rotation override mode
    pub rotation_source: MoveRotationSource,
}

/// Per-binding state for a movement track
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementInstance {
    /// Anchor location captured at bind time (relative frames)
    pub initial_location: DVec3,
    /// Anchor rotation captured at bind time (relative frames)
    pub initial_rotation: Rotator,
    /// The base group's transform at bind time, when a moving base is set
    pub base_at_bind: Option<(DVec3, Rotator)>,
    /// Location to restore when the sequence ends
    pub reset_location: DVec3,
    /// Rotation to restore when the sequence ends
    pub reset_rotation: Rotator,
}

impl MovementInstance {
    /// Snapshot the target's transform as both the anchor frame and the
    /// reset state
    pub fn capture(target: &dyn SequenceTarget, base_at_bind: Option<(DVec3, Rotator)>) -> Self {
        Self {
            initial_location: target.location(),
            initial_rotation: target.rotation(),
            base_at_bind,
            reset_location: target.location(),
            reset_rotation: target.rotation(),
        }
    }

    /// Re-capture the anchor frame from the target's current transform,
    /// leaving the reset state untouched. Called when a looping sequence
    /// wraps so relative offsets re-anchor cleanly.
    pub fn reanchor(&mut self, target: &dyn SequenceTarget, base_at_bind: Option<(DVec3, Rotator)>) {
        self.initial_location = target.location();
        self.initial_rotation = target.rotation();
        self.base_at_bind = base_at_bind;
    }
}

impl MovementTrack {
    /// Create an empty movement track
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keyframes (identical across all channels)
    pub fn key_count(&self) -> usize {
        self.positions.len()
    }

    /// Time of the key at `index`
    pub fn key_time(&self, index: usize) -> Option<f64> {
        self.positions.key(index).map(|k| k.time)
    }

    fn check_aligned(&self) -> Result<(), TrackError> {
        if self.positions.len() == self.rotations.len() && self.positions.len() == self.lookups.len()
        {
            Ok(())
        } else {
            Err(TrackError::ChannelMismatch {
                positions: self.positions.len(),
                rotations: self.rotations.len(),
                lookups: self.lookups.len(),
            })
        }
    }

    fn assert_aligned(&self) {
        debug_assert!(
            self.check_aligned().is_ok(),
            "movement channels out of alignment: {}/{}/{}",
            self.positions.len(),
            self.rotations.len(),
            self.lookups.len()
        );
    }

    /// Insert a key at `time` in all three channels. Returns the new index.
    pub fn add_key(&mut self, time: f64, position: DVec3, rotation: Rotator) -> Result<usize, TrackError> {
        self.check_aligned()?;
        let index = self.positions.add_key(time, position);
        let rot_index = self.rotations.add_key(time, rotation.as_euler());
        debug_assert_eq!(index, rot_index);
        self.lookups.insert(index, None);
        Ok(index)
    }

    /// Replace the stored value at `index`
    pub fn set_key(&mut self, index: usize, position: DVec3, rotation: Rotator) -> Result<(), TrackError> {
        self.check_aligned()?;
        self.positions.set_value(index, position)?;
        self.rotations.set_value(index, rotation.as_euler())?;
        Ok(())
    }

    /// Source the key at `index` from another group's live target
    pub fn set_lookup(&mut self, index: usize, group: Option<GroupId>) -> Result<(), TrackError> {
        self.check_aligned()?;
        if index >= self.lookups.len() {
            return Err(TrackError::KeyIndexOutOfRange {
                index,
                len: self.lookups.len(),
            });
        }
        self.lookups[index] = group;
        Ok(())
    }

    /// Remove the key at `index` from all three channels
    pub fn remove_key(&mut self, index: usize) -> Result<(), TrackError> {
        self.check_aligned()?;
        self.positions.remove_key(index)?;
        self.rotations.remove_key(index)?;
        self.lookups.remove(index);
        Ok(())
    }

    /// Move the key at `index` to `new_time` in all three channels.
    /// Returns the new index.
    pub fn move_key(&mut self, index: usize, new_time: f64) -> Result<usize, TrackError> {
        self.check_aligned()?;
        let new_index = self.positions.move_key(index, new_time)?;
        let rot_index = self.rotations.move_key(index, new_time)?;
        debug_assert_eq!(new_index, rot_index);
        let lookup = self.lookups.remove(index);
        self.lookups.insert(new_index, lookup);
        Ok(new_index)
    }

    /// Copy the key at `index` to `new_time`. Returns the new key's index.
    pub fn duplicate_key(&mut self, index: usize, new_time: f64) -> Result<usize, TrackError> {
        self.check_aligned()?;
        let new_index = self.positions.duplicate_key(index, new_time)?;
        let rot_index = self.rotations.duplicate_key(index, new_time)?;
        debug_assert_eq!(new_index, rot_index);
        let lookup = self.lookups[index];
        self.lookups.insert(new_index, lookup);
        Ok(new_index)
    }

    /// Whether any key sources its value from another group
    fn has_lookups(&self) -> bool {
        self.lookups.iter().any(Option::is_some)
    }

    /// Sample a key value from the target's current transform, mapped into
    /// this track's reference frame
    pub(crate) fn sample_from_target(
        &self,
        target: &dyn SequenceTarget,
        instance: Option<&MovementInstance>,
        frame: ReferenceFrame,
    ) -> (DVec3, Rotator) {
        let world_pos = target.location();
        let world_rot = target.rotation();
        match (frame, instance) {
            (ReferenceFrame::RelativeToInitial, Some(inst)) => {
                let inv = inst.initial_rotation.to_quat().inverse();
                let rel_pos = inv * (world_pos - inst.initial_location);
                let rel_rot = Rotator::from_quat(inv * world_rot.to_quat());
                (rel_pos, rel_rot)
            }
            _ => (world_pos, world_rot),
        }
    }

    /// Evaluate the track-space position and rotation at `time`
    fn evaluate_channels(
        &self,
        time: f64,
        ctx: &SequenceContext,
        instance: &MovementInstance,
        frame: ReferenceFrame,
    ) -> (DVec3, DVec3) {
        if !self.has_lookups() {
            return (
                self.positions.evaluate(time, DVec3::ZERO),
                self.rotations.evaluate(time, DVec3::ZERO),
            );
        }

        // Keys with look-ups resolve against live targets, so values can
        // change between ticks; materialize the resolved arrays and
        // finite-difference tangents from them.
        let inv_anchor = instance.initial_rotation.to_quat().inverse();
        let mut positions = Vec::with_capacity(self.positions.len());
        let mut rotations = Vec::with_capacity(self.rotations.len());
        for (index, &lookup) in self.lookups.iter().enumerate() {
            let resolved = lookup.and_then(|group| {
                let transform = ctx.group_transform(group);
                if transform.is_none() {
                    tracing::warn!(?group, "movement look-up target missing; using local key");
                }
                transform
            });
            match resolved {
                Some((world_pos, world_rot)) => {
                    // Look-up values are world-space; map them into the
                    // anchor frame so composition stays uniform.
                    let (pos, rot) = match frame {
                        ReferenceFrame::World => (world_pos, world_rot),
                        ReferenceFrame::RelativeToInitial => (
                            inv_anchor * (world_pos - instance.initial_location),
                            Rotator::from_quat(inv_anchor * world_rot.to_quat()),
                        ),
                    };
                    positions.push(pos);
                    rotations.push(rot.as_euler());
                }
                None => {
                    positions.push(self.positions.key(index).map_or(DVec3::ZERO, |k| k.value));
                    rotations.push(self.rotations.key(index).map_or(DVec3::ZERO, |k| k.value));
                }
            }
        }

        // Keep the Euler channel continuous: shift each key to the winding
        // branch closest to its predecessor.
        for index in 1..rotations.len() {
            rotations[index] = Rotator::from_euler(rotations[index])
                .nearest_branch_to(Rotator::from_euler(rotations[index - 1]))
                .as_euler();
        }

        (
            eval_resolved(&self.positions, &positions, time),
            eval_resolved(&self.rotations, &rotations, time),
        )
    }

    /// Evaluate the final world-space transform at `time`
    pub(crate) fn evaluate(
        &self,
        time: f64,
        ctx: &SequenceContext,
        instance: &MovementInstance,
        frame: ReferenceFrame,
        base_group: Option<GroupId>,
    ) -> (DVec3, Rotator) {
        self.assert_aligned();
        let (rel_pos, rel_euler) = self.evaluate_channels(time, ctx, instance, frame);
        let rel_rot = Rotator::from_euler(rel_euler);

        let (world_pos, mut world_rot) = match frame {
            ReferenceFrame::World => (rel_pos, rel_rot),
            ReferenceFrame::RelativeToInitial => {
                let (anchor_pos, anchor_rot) = self.anchor_frame(ctx, instance, base_group);
                (
                    anchor_pos + anchor_rot.to_quat() * rel_pos,
                    anchor_rot.compose(rel_rot),
                )
            }
        };

        if let MoveRotationSource::LookAtGroup(group) = self.rotation_source {
            match ctx.group_transform(group) {
                Some((look_pos, _)) => world_rot = Rotator::facing(world_pos, look_pos),
                // Stale reference: keep the curve rotation and re-probe
                // next tick.
                None => tracing::warn!(?group, "look-at target missing; keeping curve rotation"),
            }
        }

        (world_pos, world_rot)
    }

    /// The frame relative offsets compose onto: the bind-time anchor,
    /// carried along with the moving base when one is set
    fn anchor_frame(
        &self,
        ctx: &SequenceContext,
        instance: &MovementInstance,
        base_group: Option<GroupId>,
    ) -> (DVec3, Rotator) {
        let Some(base_group) = base_group else {
            return (instance.initial_location, instance.initial_rotation);
        };
        let (Some((base_pos_now, base_rot_now)), Some((base_pos_0, base_rot_0))) =
            (ctx.group_transform(base_group), instance.base_at_bind)
        else {
            return (instance.initial_location, instance.initial_rotation);
        };
        let inv_base = base_rot_0.to_quat().inverse();
        let offset_pos = inv_base * (instance.initial_location - base_pos_0);
        let offset_rot = Rotator::from_quat(inv_base * instance.initial_rotation.to_quat());
        (
            base_pos_now + base_rot_now.to_quat() * offset_pos,
            base_rot_now.compose(offset_rot),
        )
    }
}

/// Evaluate a channel against externally resolved key values.
///
/// Mirrors the curve evaluation contract but reads values from `values`
/// and finite-differences tangents from them, since resolved values have no
/// authored tangents.
fn eval_resolved(curve: &Curve<DVec3>, values: &[DVec3], time: f64) -> DVec3 {
    let keys = curve.keys();
    let n = keys.len();
    debug_assert_eq!(n, values.len());
    if n == 0 {
        return DVec3::ZERO;
    }
    if n < 2 || time <= keys[0].time {
        return values[0];
    }
    if time >= keys[n - 1].time {
        return values[n - 1];
    }

    let tangent = |index: usize| -> DVec3 {
        if index == 0 || index + 1 >= n {
            return DVec3::ZERO;
        }
        let span = keys[index + 1].time - keys[index - 1].time;
        if span <= f64::EPSILON {
            return DVec3::ZERO;
        }
        (values[index + 1] - values[index - 1]) / span
    };

    for i in 1..n {
        if time < keys[i].time {
            let diff = keys[i].time - keys[i - 1].time;
            if diff <= f64::EPSILON || keys[i - 1].interp == InterpMode::Constant {
                return values[i - 1];
            }
            let alpha = (time - keys[i - 1].time) / diff;
            return if keys[i - 1].interp == InterpMode::Linear {
                lerp(values[i - 1], values[i], alpha)
            } else {
                cubic_interp(
                    values[i - 1],
                    tangent(i - 1) * diff,
                    values[i],
                    tangent(i) * diff,
                    alpha,
                )
            };
        }
    }
    values[n - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SequenceEvent;
    use crate::target::{TargetId, TargetRegistry};
    use indexmap::IndexMap;

    struct Prop {
        location: DVec3,
        rotation: Rotator,
    }

    impl SequenceTarget for Prop {
        fn location(&self) -> DVec3 {
            self.location
        }
        fn set_location(&mut self, location: DVec3) {
            self.location = location;
        }
        fn rotation(&self) -> Rotator {
            self.rotation
        }
        fn set_rotation(&mut self, rotation: Rotator) {
            self.rotation = rotation;
        }
    }

    fn prop(location: DVec3) -> Box<dyn SequenceTarget> {
        Box::new(Prop {
            location,
            rotation: Rotator::ZERO,
        })
    }

    fn ctx_fixture<'a>(
        registry: &'a mut TargetRegistry,
        group_targets: &'a IndexMap<GroupId, TargetId>,
        events: &'a mut Vec<SequenceEvent>,
        position: f64,
    ) -> SequenceContext<'a> {
        SequenceContext {
            position,
            registry,
            group_targets,
            events,
            high_detail: true,
            master_volume: 1.0,
            master_pitch: 1.0,
        }
    }

    fn world_instance() -> MovementInstance {
        MovementInstance {
            initial_location: DVec3::ZERO,
            initial_rotation: Rotator::ZERO,
            base_at_bind: None,
            reset_location: DVec3::ZERO,
            reset_rotation: Rotator::ZERO,
        }
    }

    #[test]
    fn test_channels_stay_aligned_through_edits() {
        let mut track = MovementTrack::new();
        track.add_key(1.0, DVec3::X, Rotator::ZERO).unwrap();
        track.add_key(0.0, DVec3::ZERO, Rotator::ZERO).unwrap();
        track.add_key(2.0, DVec3::Y, Rotator::ZERO).unwrap();
        let moved = track.move_key(0, 3.0).unwrap();
        assert_eq!(moved, 2);
        track.remove_key(1).unwrap();
        assert_eq!(track.key_count(), 2);
        assert_eq!(track.positions.len(), track.rotations.len());
        assert_eq!(track.positions.len(), track.lookups.len());
    }

    #[test]
    fn test_mismatched_channels_abort_authoring() {
        let mut track = MovementTrack::new();
        track.add_key(0.0, DVec3::ZERO, Rotator::ZERO).unwrap();
        // Corrupt one channel behind the API's back.
        track.lookups.push(None);
        assert!(matches!(
            track.add_key(1.0, DVec3::X, Rotator::ZERO),
            Err(TrackError::ChannelMismatch { .. })
        ));
    }

    #[test]
    fn test_relative_frame_composes_onto_initial() {
        let mut track = MovementTrack::new();
        track.add_key(0.0, DVec3::ZERO, Rotator::ZERO).unwrap();
        track
            .add_key(5.0, DVec3::new(10.0, 0.0, 0.0), Rotator::ZERO)
            .unwrap();

        let mut registry = TargetRegistry::new();
        let group_targets = IndexMap::new();
        let mut events = Vec::new();
        let ctx = ctx_fixture(&mut registry, &group_targets, &mut events, 2.5);

        let instance = MovementInstance {
            initial_location: DVec3::new(100.0, 0.0, 0.0),
            initial_rotation: Rotator::ZERO,
            base_at_bind: None,
            reset_location: DVec3::ZERO,
            reset_rotation: Rotator::ZERO,
        };
        let (pos, _) = track.evaluate(2.5, &ctx, &instance, ReferenceFrame::RelativeToInitial, None);
        assert!((pos - DVec3::new(105.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_lookup_key_resolves_live_target() {
        let mut track = MovementTrack::new();
        track.add_key(0.0, DVec3::ZERO, Rotator::ZERO).unwrap();
        track
            .add_key(10.0, DVec3::new(999.0, 0.0, 0.0), Rotator::ZERO)
            .unwrap();

        let mut registry = TargetRegistry::new();
        let beacon = registry.register(prop(DVec3::new(50.0, 0.0, 0.0)));
        let beacon_group = GroupId::new();
        let mut group_targets = IndexMap::new();
        group_targets.insert(beacon_group, beacon);
        track.set_lookup(1, Some(beacon_group)).unwrap();

        let mut events = Vec::new();
        let ctx = ctx_fixture(&mut registry, &group_targets, &mut events, 5.0);
        let inst = world_instance();
        let (pos, _) = track.evaluate(5.0, &ctx, &inst, ReferenceFrame::World, None);
        // Midway between the origin and the beacon's live position.
        assert!((pos - DVec3::new(25.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_stale_lookup_falls_back_to_local_value() {
        let mut track = MovementTrack::new();
        track.add_key(0.0, DVec3::ZERO, Rotator::ZERO).unwrap();
        track
            .add_key(10.0, DVec3::new(40.0, 0.0, 0.0), Rotator::ZERO)
            .unwrap();
        track.set_lookup(1, Some(GroupId::new())).unwrap();

        let mut registry = TargetRegistry::new();
        let group_targets = IndexMap::new();
        let mut events = Vec::new();
        let ctx = ctx_fixture(&mut registry, &group_targets, &mut events, 5.0);
        let inst = world_instance();
        let (pos, _) = track.evaluate(5.0, &ctx, &inst, ReferenceFrame::World, None);
        assert!((pos - DVec3::new(20.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_look_at_overrides_rotation() {
        let mut track = MovementTrack::new();
        track.add_key(0.0, DVec3::ZERO, Rotator::new(0.0, 45.0, 0.0)).unwrap();

        let mut registry = TargetRegistry::new();
        let mark = registry.register(prop(DVec3::new(10.0, 0.0, 0.0)));
        let mark_group = GroupId::new();
        let mut group_targets = IndexMap::new();
        group_targets.insert(mark_group, mark);
        track.rotation_source = MoveRotationSource::LookAtGroup(mark_group);

        let mut events = Vec::new();
        let ctx = ctx_fixture(&mut registry, &group_targets, &mut events, 0.0);
        let inst = world_instance();
        let (_, rot) = track.evaluate(0.0, &ctx, &inst, ReferenceFrame::World, None);
        assert!((rot.yaw - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_winding_survives_relative_composition() {
        let mut track = MovementTrack::new();
        track
            .add_key(0.0, DVec3::ZERO, Rotator::new(0.0, 700.0, 0.0))
            .unwrap();

        let mut registry = TargetRegistry::new();
        let group_targets = IndexMap::new();
        let mut events = Vec::new();
        let ctx = ctx_fixture(&mut registry, &group_targets, &mut events, 0.0);

        let instance = MovementInstance {
            initial_location: DVec3::ZERO,
            initial_rotation: Rotator::new(0.0, 360.0, 0.0),
            base_at_bind: None,
            reset_location: DVec3::ZERO,
            reset_rotation: Rotator::ZERO,
        };
        let (_, rot) =
            track.evaluate(0.0, &ctx, &instance, ReferenceFrame::RelativeToInitial, None);
        // 360 of anchor wind plus 700 authored degrees.
        assert!((rot.yaw - 1060.0).abs() < 1e-6);
    }
}
