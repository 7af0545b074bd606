// SPDX-License-Identifier: MIT OR Apache-2.0
//! Director tracks: camera-cut selection over time.
//!
//! A director track is bound to the viewer (the target holding the active
//! viewpoint). Each update it resolves which group should be the viewpoint
//! for the current position and requests a view-target transition when that
//! changes. The viewpoint that was active before the sequence took control
//! is remembered and restored exactly once when the sequence ends.

use crate::context::{SequenceContext, SequenceEvent};
use crate::group::GroupId;
use crate::target::{SequenceTarget, TargetId, TargetRegistry};
use crate::tracks::keys::{self, TimedKey};
use crate::tracks::UpdateArgs;
use serde::{Deserialize, Serialize};

/// A cut key on a director track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectorKey {
    /// Time of the cut
    pub time: f64,
    /// Group whose target becomes the viewpoint; `None` returns the view
    /// to whatever was active before the sequence started
    pub group: Option<GroupId>,
    /// Transition duration in seconds; 0 is a hard cut
    #[serde(default)]
    pub blend_time: f64,
}

impl TimedKey for DirectorKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Derived cut-boundary data for predictive resource preparation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCutEntry {
    /// Time of the cut
    pub time: f64,
    /// Group that becomes the viewpoint at this cut
    pub group: GroupId,
    /// Transition duration in seconds
    pub transition_duration: f64,
}

/// Per-binding state for a director track
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectorInstance {
    /// Viewpoint that was active before sequencer control began
    pub saved_view_target: Option<TargetId>,
    /// Group currently holding the viewpoint
    pub active_group: Option<GroupId>,
    /// Whether the saved viewpoint has already been restored
    pub restored: bool,
}

impl DirectorInstance {
    /// Capture the viewer's current view target so it can be restored when
    /// the sequence ends
    pub fn capture(viewer: &mut dyn SequenceTarget) -> Self {
        Self {
            saved_view_target: viewer.as_view_holder().and_then(|h| h.view_target()),
            active_group: None,
            restored: false,
        }
    }
}

/// Selects the active viewpoint over time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorTrack {
    /// Cut keys in time order
    pub keys: Vec<DirectorKey>,
}

impl DirectorTrack {
    /// Create an empty director track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cut key, keeping time order. Returns its index.
    pub fn add_cut(&mut self, time: f64, group: Option<GroupId>, blend_time: f64) -> usize {
        keys::insert_key(
            &mut self.keys,
            DirectorKey {
                time,
                group,
                blend_time,
            },
        )
    }

    /// The cut governing `position`: the last key at or before it
    pub fn active_cut(&self, position: f64) -> Option<&DirectorKey> {
        keys::last_at_or_before(&self.keys, position).map(|i| &self.keys[i])
    }

    /// The cut-boundary table, sorted by time, with consecutive cuts to the
    /// same group collapsed
    pub fn camera_cuts(&self) -> Vec<CameraCutEntry> {
        let mut cuts: Vec<CameraCutEntry> = Vec::new();
        for key in &self.keys {
            let Some(group) = key.group else { continue };
            if cuts.last().map(|c| c.group) == Some(group) {
                continue;
            }
            cuts.push(CameraCutEntry {
                time: key.time,
                group,
                transition_duration: key.blend_time,
            });
        }
        cuts
    }

    pub(crate) fn update(
        &self,
        args: &UpdateArgs,
        instance: &mut DirectorInstance,
        ctx: &mut SequenceContext,
        viewer: TargetId,
    ) {
        let cut = self.active_cut(args.position);
        let desired_group = cut.and_then(|k| k.group);
        let desired_target = desired_group
            .and_then(|g| ctx.resolve_group(g))
            .filter(|id| ctx.registry.contains(*id));

        if desired_group.is_some() && desired_target.is_none() {
            // Stale or unbound cut target: keep the current viewpoint and
            // re-probe next tick.
            tracing::warn!(?desired_group, "camera cut target unavailable");
            return;
        }
        if instance.active_group == desired_group {
            return;
        }

        let blend_time = cut.map_or(0.0, |k| k.blend_time);
        let new = desired_target.or(instance.saved_view_target);
        let mut old = None;
        let mut applied = false;
        if let Some(holder) = ctx.registry.get_mut(viewer).and_then(|t| t.as_view_holder()) {
            old = holder.view_target();
            holder.set_view_target(new, blend_time);
            applied = true;
        }
        if applied {
            instance.active_group = desired_group;
            tracing::debug!(?desired_group, blend_time, "view target cut");
            if !args.is_preview {
                ctx.emit(SequenceEvent::ViewTargetChanged {
                    old,
                    new,
                    blend_time,
                });
            }
        }
    }

    /// Return the viewpoint to its pre-sequence owner. Safe to call more
    /// than once; only the first call applies.
    pub(crate) fn restore(
        &self,
        instance: &mut DirectorInstance,
        registry: &mut TargetRegistry,
        viewer: TargetId,
    ) {
        if instance.restored {
            return;
        }
        instance.restored = true;
        if let Some(holder) = registry.get_mut(viewer).and_then(|t| t.as_view_holder()) {
            holder.set_view_target(instance.saved_view_target, 0.0);
        }
        instance.active_group = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotator::Rotator;
    use crate::target::ViewHolder;
    use glam::DVec3;
    use indexmap::IndexMap;

    #[derive(Default)]
    struct Viewer {
        view: Option<TargetId>,
        transitions: Vec<(Option<TargetId>, f64)>,
    }

    impl ViewHolder for Viewer {
        fn view_target(&self) -> Option<TargetId> {
            self.view
        }
        fn set_view_target(&mut self, target: Option<TargetId>, blend_time: f64) {
            self.view = target;
            self.transitions.push((target, blend_time));
        }
    }

    impl SequenceTarget for Viewer {
        fn location(&self) -> DVec3 {
            DVec3::ZERO
        }
        fn set_location(&mut self, _location: DVec3) {}
        fn rotation(&self) -> Rotator {
            Rotator::ZERO
        }
        fn set_rotation(&mut self, _rotation: Rotator) {}
        fn as_view_holder(&mut self) -> Option<&mut dyn ViewHolder> {
            Some(self)
        }
    }

    struct Camera;

    impl SequenceTarget for Camera {
        fn location(&self) -> DVec3 {
            DVec3::ZERO
        }
        fn set_location(&mut self, _location: DVec3) {}
        fn rotation(&self) -> Rotator {
            Rotator::ZERO
        }
        fn set_rotation(&mut self, _rotation: Rotator) {}
    }

    struct Fixture {
        registry: TargetRegistry,
        group_targets: IndexMap<GroupId, TargetId>,
        events: Vec<SequenceEvent>,
        viewer: TargetId,
        cam_group: GroupId,
        cam: TargetId,
    }

    fn fixture() -> Fixture {
        let mut registry = TargetRegistry::new();
        let viewer = registry.register(Box::new(Viewer::default()));
        let cam = registry.register(Box::new(Camera));
        let cam_group = GroupId::new();
        let mut group_targets = IndexMap::new();
        group_targets.insert(cam_group, cam);
        Fixture {
            registry,
            group_targets,
            events: Vec::new(),
            viewer,
            cam_group,
            cam,
        }
    }

    fn run(track: &DirectorTrack, fx: &mut Fixture, instance: &mut DirectorInstance, prev: f64, position: f64) {
        let args = UpdateArgs {
            prev,
            position,
            is_jump: false,
            is_preview: false,
            at_end: false,
        };
        let mut ctx = SequenceContext {
            position,
            registry: &mut fx.registry,
            group_targets: &fx.group_targets,
            events: &mut fx.events,
            high_detail: true,
            master_volume: 1.0,
            master_pitch: 1.0,
        };
        track.update(&args, instance, &mut ctx, fx.viewer);
    }

    #[test]
    fn test_cut_transitions_view_target_once() {
        let mut track = DirectorTrack::new();
        let mut fx = fixture();
        track.add_cut(1.0, Some(fx.cam_group), 0.5);

        let mut instance = DirectorInstance::default();
        run(&track, &mut fx, &mut instance, 0.0, 0.5);
        assert!(fx.events.is_empty());

        run(&track, &mut fx, &mut instance, 0.5, 1.5);
        assert_eq!(
            fx.events,
            vec![SequenceEvent::ViewTargetChanged {
                old: None,
                new: Some(fx.cam),
                blend_time: 0.5,
            }]
        );

        // Holding inside the same cut must not re-fire.
        run(&track, &mut fx, &mut instance, 1.5, 3.0);
        assert_eq!(fx.events.len(), 1);
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut track = DirectorTrack::new();
        let mut fx = fixture();
        track.add_cut(0.0, Some(fx.cam_group), 0.0);

        let mut instance = DirectorInstance::default();
        run(&track, &mut fx, &mut instance, 0.0, 0.5);

        track.restore(&mut instance, &mut fx.registry, fx.viewer);
        assert!(instance.restored);
        {
            let holder = fx.registry.get_mut(fx.viewer).unwrap().as_view_holder().unwrap();
            assert_eq!(holder.view_target(), None);
            // Simulate the host retargeting the view after the sequence
            // ended; a second restore must not clobber it.
            holder.set_view_target(Some(fx.cam), 0.0);
        }
        track.restore(&mut instance, &mut fx.registry, fx.viewer);
        let holder = fx.registry.get_mut(fx.viewer).unwrap().as_view_holder().unwrap();
        assert_eq!(holder.view_target(), Some(fx.cam));
    }

    #[test]
    fn test_stale_cut_target_keeps_current_view() {
        let mut track = DirectorTrack::new();
        let mut fx = fixture();
        track.add_cut(0.0, Some(fx.cam_group), 0.0);
        fx.registry.remove(fx.cam);

        let mut instance = DirectorInstance::default();
        run(&track, &mut fx, &mut instance, 0.0, 0.5);
        assert!(fx.events.is_empty());
        assert_eq!(instance.active_group, None);
    }

    #[test]
    fn test_camera_cut_table_dedups_consecutive_groups() {
        let mut track = DirectorTrack::new();
        let a = GroupId::new();
        let b = GroupId::new();
        track.add_cut(0.0, Some(a), 0.0);
        track.add_cut(1.0, Some(a), 0.0);
        track.add_cut(2.0, Some(b), 0.25);
        track.add_cut(3.0, None, 0.0);

        let cuts = track.camera_cuts();
        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[0].group, a);
        assert_eq!(cuts[1].group, b);
        assert_eq!(cuts[1].transition_duration, 0.25);
    }
}
