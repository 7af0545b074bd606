// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-tick context threaded through track evaluation.
//!
//! There is no ambient engine state: everything a track may consult during
//! `evaluate_and_apply` — the target registry, cross-group resolution, the
//! runtime condition flags, the event queue — travels in a
//! [`SequenceContext`] built by the controller for each update.

use crate::group::GroupId;
use crate::rotator::Rotator;
use crate::target::{TargetId, TargetRegistry};
use glam::DVec3;
use indexmap::IndexMap;

/// A discrete occurrence surfaced to the host.
///
/// Events accumulate during an update and are drained by the host after the
/// tick returns; handling them outside the traversal is what keeps host
/// callbacks from re-entering the controller mid-update.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceEvent {
    /// An event track crossed a named key
    EventFired {
        /// Authored event name
        name: String,
    },
    /// A notify track crossed a key
    Notify {
        /// Authored payload
        payload: String,
    },
    /// The director changed the active viewpoint
    ViewTargetChanged {
        /// Previously active viewpoint
        old: Option<TargetId>,
        /// Newly active viewpoint
        new: Option<TargetId>,
        /// Transition duration in seconds
        blend_time: f64,
    },
    /// Playback reached the end boundary and stopped
    Completed,
    /// Playback reached the start boundary while reversed and stopped
    Reversed,
}

/// Everything a track can see during one update
pub struct SequenceContext<'a> {
    /// The authoritative position for this update
    pub position: f64,
    /// Host-owned target registry
    pub registry: &'a mut TargetRegistry,
    /// Group → bound target, snapshotted at the start of the update
    pub group_targets: &'a IndexMap<GroupId, TargetId>,
    /// Event queue drained by the host after the tick
    pub events: &'a mut Vec<SequenceEvent>,
    /// Runtime condition flag gating detail-mode track masks
    pub high_detail: bool,
    /// Master volume from the director group's audio-master track
    pub master_volume: f64,
    /// Master pitch from the director group's audio-master track
    pub master_pitch: f64,
}

impl SequenceContext<'_> {
    /// The target bound to `group`, if the group is bound at all
    pub fn resolve_group(&self, group: GroupId) -> Option<TargetId> {
        self.group_targets.get(&group).copied()
    }

    /// Live transform of the target bound to `group`.
    ///
    /// Returns `None` for unbound groups and for targets that have been
    /// removed from the registry since binding (stale references).
    pub fn group_transform(&self, group: GroupId) -> Option<(DVec3, Rotator)> {
        let id = self.resolve_group(group)?;
        let target = self.registry.get(id)?;
        Some((target.location(), target.rotation()))
    }

    /// Queue an event for the host
    pub fn emit(&mut self, event: SequenceEvent) {
        self.events.push(event);
    }
}
