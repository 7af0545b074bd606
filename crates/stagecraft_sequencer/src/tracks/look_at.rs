// SPDX-License-Identifier: MIT OR Apache-2.0
//! Look-at tracks: head-tracking toward another group's target.
//!
//! Unlike a movement track in look-at mode, this kind carries no movement
//! curves at all; it only overrides the target's rotation to face the
//! tracked group while a key says so.

use crate::context::SequenceContext;
use crate::group::GroupId;
use crate::rotator::Rotator;
use crate::tracks::keys::{self, TimedKey};
use serde::{Deserialize, Serialize};

/// A tracking key: from this time, face `group` (or nothing)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookAtKey {
    /// Time in seconds
    pub time: f64,
    /// Group to face; `None` suspends tracking
    pub group: Option<GroupId>,
}

impl TimedKey for LookAtKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Per-binding state for a look-at track
#[derive(Debug, Clone, Copy, Default)]
pub struct LookAtInstance {
    /// Rotation to restore when the sequence ends
    pub reset_rotation: Rotator,
}

/// Rotates the bound target to face another group's live target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookAtTrack {
    /// Tracking keys in time order
    pub keys: Vec<LookAtKey>,
}

impl LookAtTrack {
    /// Create an empty look-at track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tracking key, keeping time order. Returns its index.
    pub fn add_key(&mut self, time: f64, group: Option<GroupId>) -> usize {
        keys::insert_key(&mut self.keys, LookAtKey { time, group })
    }

    /// The group to face at `position`, if tracking is active there
    pub fn group_at(&self, position: f64) -> Option<GroupId> {
        let index = keys::last_at_or_before(&self.keys, position)?;
        self.keys[index].group
    }

    /// The rotation to apply at `position`, given the bound target's own
    /// location. `None` when tracking is suspended or the tracked target is
    /// gone (stale references re-probe next tick).
    pub(crate) fn evaluate(
        &self,
        position: f64,
        own_location: glam::DVec3,
        ctx: &SequenceContext,
    ) -> Option<Rotator> {
        let group = self.group_at(position)?;
        match ctx.group_transform(group) {
            Some((look_pos, _)) => Some(Rotator::facing(own_location, look_pos)),
            None => {
                tracing::warn!(?group, "look-at target missing; holding rotation");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SequenceEvent;
    use crate::target::{SequenceTarget, TargetId, TargetRegistry};
    use glam::DVec3;
    use indexmap::IndexMap;

    struct Mark;

    impl SequenceTarget for Mark {
        fn location(&self) -> DVec3 {
            DVec3::new(0.0, 0.0, 10.0)
        }
        fn set_location(&mut self, _location: DVec3) {}
        fn rotation(&self) -> Rotator {
            Rotator::ZERO
        }
        fn set_rotation(&mut self, _rotation: Rotator) {}
    }

    #[test]
    fn test_tracks_group_and_suspends() {
        let mut registry = TargetRegistry::new();
        let mark = registry.register(Box::new(Mark));
        let mark_group = GroupId::new();
        let mut group_targets: IndexMap<GroupId, TargetId> = IndexMap::new();
        group_targets.insert(mark_group, mark);
        let mut events: Vec<SequenceEvent> = Vec::new();

        let mut track = LookAtTrack::new();
        track.add_key(1.0, Some(mark_group));
        track.add_key(3.0, None);

        let ctx = SequenceContext {
            position: 2.0,
            registry: &mut registry,
            group_targets: &group_targets,
            events: &mut events,
            high_detail: true,
            master_volume: 1.0,
            master_pitch: 1.0,
        };

        // Before the first key: no tracking.
        assert!(track.evaluate(0.5, DVec3::ZERO, &ctx).is_none());
        // Facing straight down +Z from the origin.
        let rot = track.evaluate(2.0, DVec3::ZERO, &ctx).unwrap();
        assert!(rot.yaw.abs() < 1e-9 && rot.pitch.abs() < 1e-9);
        // Suspended after the None key.
        assert!(track.evaluate(4.0, DVec3::ZERO, &ctx).is_none());
    }

    #[test]
    fn test_stale_target_holds_rotation() {
        let mut registry = TargetRegistry::new();
        let group_targets: IndexMap<GroupId, TargetId> = IndexMap::new();
        let mut events: Vec<SequenceEvent> = Vec::new();

        let mut track = LookAtTrack::new();
        track.add_key(0.0, Some(GroupId::new()));

        let ctx = SequenceContext {
            position: 1.0,
            registry: &mut registry,
            group_targets: &group_targets,
            events: &mut events,
            high_detail: true,
            master_volume: 1.0,
            master_pitch: 1.0,
        };
        assert!(track.evaluate(1.0, DVec3::ZERO, &ctx).is_none());
    }
}
