// SPDX-License-Identifier: MIT OR Apache-2.0
//! Group bindings: the runtime pairing of a track group with one target.

use crate::context::SequenceContext;
use crate::group::{GroupId, TrackGroup};
use crate::rotator::Rotator;
use crate::target::{TargetId, TargetRegistry};
use crate::tracks::{InstanceState, TrackInstance};
use glam::DVec3;

/// Runtime pairing of one [`TrackGroup`] with one target object.
///
/// A binding exclusively owns one [`TrackInstance`] per track in its group.
/// The target may be absent (an unbound "folder" group), in which case
/// every track no-ops.
#[derive(Debug)]
pub struct GroupBinding {
    group_id: GroupId,
    target: Option<TargetId>,
    instances: Vec<TrackInstance>,
    reanchor_count: u64,
    terminated: bool,
}

impl GroupBinding {
    /// Build the binding for `group`, constructing one instance per track.
    /// Each instance snapshots whatever target state it may later need to
    /// restore; tracks with one-time startup (taking pose control) perform
    /// it here, exactly once.
    pub fn init(
        group: &TrackGroup,
        target: Option<TargetId>,
        base_at_bind: Option<(DVec3, Rotator)>,
        registry: &mut TargetRegistry,
    ) -> Self {
        let instances = group
            .tracks
            .iter()
            .map(|track| track.init_instance(target, registry, base_at_bind))
            .collect();
        tracing::debug!(group = %group.name, ?target, "group binding initialized");
        Self {
            group_id: group.id,
            target,
            instances,
            reanchor_count: 0,
            terminated: false,
        }
    }

    /// The bound group's id
    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// The bound target, if any
    pub fn target(&self) -> Option<TargetId> {
        self.target
    }

    /// How often the relative-frame re-anchoring hook has run (once per
    /// loop wrap)
    pub fn reanchor_count(&self) -> u64 {
        self.reanchor_count
    }

    /// Whether the binding has been torn down
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Track instances, in track declaration order
    pub fn instances(&self) -> &[TrackInstance] {
        &self.instances
    }

    /// Evaluate every track against the context's position.
    ///
    /// Tracks run in declaration order, except that skeletal-animation
    /// tracks are deferred to a second pass: generic property writes may
    /// overwrite an applied pose, so the pose goes last.
    pub fn update(
        &mut self,
        group: &TrackGroup,
        ctx: &mut SequenceContext,
        is_jump: bool,
        is_preview: bool,
        at_end: bool,
    ) {
        for anim_pass in [false, true] {
            for (track, instance) in group.tracks.iter().zip(self.instances.iter_mut()) {
                if track.is_anim() != anim_pass {
                    continue;
                }
                track.evaluate_and_apply(
                    instance,
                    self.target,
                    group.reference_frame,
                    group.base_group,
                    ctx,
                    is_jump,
                    is_preview,
                    at_end,
                );
            }
        }
    }

    /// Re-capture every movement instance's anchor frame from the target's
    /// current transform. Runs when a looping sequence wraps, so relative
    /// offsets compose onto where the target actually is.
    pub fn reanchor(
        &mut self,
        registry: &TargetRegistry,
        base_at_bind: Option<(DVec3, Rotator)>,
    ) {
        self.reanchor_count += 1;
        let Some(target) = self.target.and_then(|id| registry.get(id)) else {
            return;
        };
        for instance in &mut self.instances {
            if let InstanceState::Movement(inst) = &mut instance.state {
                inst.reanchor(target, base_at_bind);
            }
        }
    }

    /// Restore every track's reset snapshot and tear the instances down,
    /// in the reverse of construction order. Only the first call applies.
    pub fn terminate(&mut self, group: &TrackGroup, registry: &mut TargetRegistry) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        for (track, instance) in group
            .tracks
            .iter()
            .zip(self.instances.iter_mut())
            .rev()
        {
            track.restore_target_state(instance, self.target, registry);
            track.terminate_instance(instance, self.target, registry);
        }
        tracing::debug!(group = %group.name, "group binding terminated");
    }

    /// Rebuild the instances after a previous termination, so a stopped
    /// sequence can play again with fresh snapshots
    pub fn reinit(
        &mut self,
        group: &TrackGroup,
        base_at_bind: Option<(DVec3, Rotator)>,
        registry: &mut TargetRegistry,
    ) {
        if !self.terminated {
            return;
        }
        self.instances = group
            .tracks
            .iter()
            .map(|track| track.init_instance(self.target, registry, base_at_bind))
            .collect();
        self.terminated = false;
    }
}
