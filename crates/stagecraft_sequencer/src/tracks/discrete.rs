// SPDX-License-Identifier: MIT OR Apache-2.0
//! Discrete tracks: toggles, events, notifies and visibility.
//!
//! Nothing here interpolates. Each update computes the span of key times
//! traversed since the last update and fires the keys inside it, with a
//! half-open policy that is symmetric under time reversal. "Trigger"
//! actions fire on every crossing; "level" actions collapse to the most
//! recently crossed key so a scrub across several toggles produces a
//! single state change.

use crate::context::{SequenceContext, SequenceEvent};
use crate::target::{SequenceTarget, Switch};
use crate::tracks::keys::{self, TimedKey};
use crate::tracks::UpdateArgs;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Whether discrete side effects may fire for this update.
///
/// Preview scrubs never fire. Jumps fire only when moving forward and the
/// track opts in; there is deliberately no backward counterpart — jumping
/// backward never has side effects.
fn may_fire(args: &UpdateArgs, fire_when_jumping_forward: bool) -> bool {
    if args.is_preview {
        return false;
    }
    if args.is_jump {
        return !args.reversed() && fire_when_jumping_forward;
    }
    true
}

/// A named key on an event track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventKey {
    /// Time in seconds
    pub time: f64,
    /// Event name surfaced to the host
    pub name: String,
}

impl TimedKey for EventKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Fires named events at authored times
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTrack {
    /// Keys in time order
    pub keys: Vec<EventKey>,
    /// Fire while playing forward
    #[serde(default = "default_true")]
    pub fire_on_forward: bool,
    /// Fire while playing in reverse
    #[serde(default = "default_true")]
    pub fire_on_reverse: bool,
    /// Fire keys skipped by a forward jump
    #[serde(default)]
    pub fire_when_jumping_forward: bool,
}

impl Default for EventTrack {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            fire_on_forward: true,
            fire_on_reverse: true,
            fire_when_jumping_forward: false,
        }
    }
}

impl EventTrack {
    /// Create an empty event track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key, keeping time order. Returns its index.
    pub fn add_event(&mut self, time: f64, name: impl Into<String>) -> usize {
        keys::insert_key(
            &mut self.keys,
            EventKey {
                time,
                name: name.into(),
            },
        )
    }

    pub(crate) fn update(&self, args: &UpdateArgs, ctx: &mut SequenceContext) {
        if !may_fire(args, self.fire_when_jumping_forward) {
            return;
        }
        let reversed = args.reversed();
        if !args.is_jump {
            let allowed = if reversed {
                self.fire_on_reverse
            } else {
                self.fire_on_forward
            };
            if !allowed {
                return;
            }
        }
        let range = keys::crossed_range(&self.keys, args.prev, args.position, args.at_end);
        let mut fire = |index: usize| {
            ctx.emit(SequenceEvent::EventFired {
                name: self.keys[index].name.clone(),
            });
        };
        if reversed {
            range.rev().for_each(&mut fire);
        } else {
            range.for_each(&mut fire);
        }
    }
}

/// A payload key on a notify track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyKey {
    /// Time in seconds
    pub time: f64,
    /// Payload delivered to the host
    pub payload: String,
}

impl TimedKey for NotifyKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Delivers opaque payloads to the host at authored times
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyTrack {
    /// Keys in time order
    pub keys: Vec<NotifyKey>,
    /// Fire keys skipped by a forward jump
    #[serde(default)]
    pub fire_when_jumping_forward: bool,
}

impl NotifyTrack {
    /// Create an empty notify track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key, keeping time order. Returns its index.
    pub fn add_notify(&mut self, time: f64, payload: impl Into<String>) -> usize {
        keys::insert_key(
            &mut self.keys,
            NotifyKey {
                time,
                payload: payload.into(),
            },
        )
    }

    pub(crate) fn update(&self, args: &UpdateArgs, ctx: &mut SequenceContext) {
        if !may_fire(args, self.fire_when_jumping_forward) {
            return;
        }
        let range = keys::crossed_range(&self.keys, args.prev, args.position, args.at_end);
        let mut fire = |index: usize| {
            ctx.emit(SequenceEvent::Notify {
                payload: self.keys[index].payload.clone(),
            });
        };
        if args.reversed() {
            range.rev().for_each(&mut fire);
        } else {
            range.for_each(&mut fire);
        }
    }
}

/// What a toggle key does when crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleAction {
    /// Level action: switch on
    On,
    /// Level action: switch off
    Off,
    /// One-shot activation on every crossing
    Trigger,
}

/// A key on a toggle track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToggleKey {
    /// Time in seconds
    pub time: f64,
    /// Action performed when the key is crossed
    pub action: ToggleAction,
}

impl TimedKey for ToggleKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Per-binding state for a toggle track
#[derive(Debug, Clone, Copy, Default)]
pub struct ToggleInstance {
    /// Switch level captured at bind time; `None` when the target has no
    /// switch capability
    pub reset_enabled: Option<bool>,
}

/// Drives a target's switch capability (lights, particle systems)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToggleTrack {
    /// Keys in time order
    pub keys: Vec<ToggleKey>,
    /// Fire trigger keys skipped by a forward jump
    #[serde(default)]
    pub fire_when_jumping_forward: bool,
}

impl ToggleTrack {
    /// Create an empty toggle track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key, keeping time order. Returns its index.
    pub fn add_toggle(&mut self, time: f64, action: ToggleAction) -> usize {
        keys::insert_key(&mut self.keys, ToggleKey { time, action })
    }

    pub(crate) fn update(&self, args: &UpdateArgs, switch: &mut dyn Switch) {
        if args.is_preview {
            return;
        }
        let reversed = args.reversed();
        let range = keys::crossed_range(&self.keys, args.prev, args.position, args.at_end);
        if range.is_empty() {
            return;
        }

        if may_fire(args, self.fire_when_jumping_forward) {
            let triggers = range
                .clone()
                .filter(|&i| self.keys[i].action == ToggleAction::Trigger);
            if reversed {
                triggers.rev().for_each(|_| switch.trigger());
            } else {
                triggers.for_each(|_| switch.trigger());
            }
        }

        // Level actions collapse to the most recently crossed key: the later
        // index moving forward, the earlier index moving backward. Jumps
        // still apply the collapsed state so a scrub lands on the right
        // level.
        let level = |i: &usize| self.keys[*i].action != ToggleAction::Trigger;
        let latest = if reversed {
            range.clone().find(level)
        } else {
            range.clone().rev().find(level)
        };
        if let Some(index) = latest {
            switch.set_enabled(self.keys[index].action == ToggleAction::On);
        }
    }
}

/// What a visibility key does when crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisibilityAction {
    /// Level action: show the target
    Show,
    /// Level action: hide the target
    Hide,
    /// Flip the current state on every crossing
    Toggle,
}

/// A key on a visibility track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityKey {
    /// Time in seconds
    pub time: f64,
    /// Action performed when the key is crossed
    pub action: VisibilityAction,
}

impl TimedKey for VisibilityKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Per-binding state for a visibility track
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityInstance {
    /// Hidden flag captured at bind time
    pub reset_hidden: bool,
}

/// Shows and hides the bound target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisibilityTrack {
    /// Keys in time order
    pub keys: Vec<VisibilityKey>,
    /// Fire flip keys skipped by a forward jump
    #[serde(default)]
    pub fire_when_jumping_forward: bool,
}

impl VisibilityTrack {
    /// Create an empty visibility track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key, keeping time order. Returns its index.
    pub fn add_key(&mut self, time: f64, action: VisibilityAction) -> usize {
        keys::insert_key(&mut self.keys, VisibilityKey { time, action })
    }

    pub(crate) fn update(&self, args: &UpdateArgs, target: &mut dyn SequenceTarget) {
        if args.is_preview {
            return;
        }
        let reversed = args.reversed();
        let range = keys::crossed_range(&self.keys, args.prev, args.position, args.at_end);
        if range.is_empty() {
            return;
        }

        if may_fire(args, self.fire_when_jumping_forward) {
            let flips = range
                .clone()
                .filter(|&i| self.keys[i].action == VisibilityAction::Toggle)
                .count();
            if flips % 2 == 1 {
                target.set_hidden(!target.is_hidden());
            }
        }

        let level = |i: &usize| self.keys[*i].action != VisibilityAction::Toggle;
        let latest = if reversed {
            range.clone().find(level)
        } else {
            range.clone().rev().find(level)
        };
        if let Some(index) = latest {
            target.set_hidden(self.keys[index].action == VisibilityAction::Hide);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SequenceContext;
    use crate::group::GroupId;
    use crate::target::{TargetId, TargetRegistry};
    use indexmap::IndexMap;

    fn args(prev: f64, position: f64) -> UpdateArgs {
        UpdateArgs {
            prev,
            position,
            is_jump: false,
            is_preview: false,
            at_end: false,
        }
    }

    fn jump(prev: f64, position: f64) -> UpdateArgs {
        UpdateArgs {
            is_jump: true,
            ..args(prev, position)
        }
    }

    fn fired_names(events: &[SequenceEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                SequenceEvent::EventFired { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn run_track(track: &EventTrack, steps: &[UpdateArgs]) -> Vec<String> {
        let mut registry = TargetRegistry::new();
        let group_targets: IndexMap<GroupId, TargetId> = IndexMap::new();
        let mut events = Vec::new();
        for step in steps {
            let mut ctx = SequenceContext {
                position: step.position,
                registry: &mut registry,
                group_targets: &group_targets,
                events: &mut events,
                high_detail: true,
                master_volume: 1.0,
                master_pitch: 1.0,
            };
            track.update(step, &mut ctx);
        }
        fired_names(&events)
    }

    fn three_key_track() -> EventTrack {
        let mut track = EventTrack::new();
        track.add_event(1.0, "a");
        track.add_event(2.0, "b");
        track.add_event(3.0, "c");
        track
    }

    #[test]
    fn test_forward_firing_exactness() {
        let track = three_key_track();
        let fired = run_track(&track, &[args(0.0, 1.5), args(1.5, 3.5)]);
        assert_eq!(fired, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reverse_fires_same_keys_in_reverse_order() {
        let track = three_key_track();
        let fired = run_track(&track, &[args(3.5, 1.5), args(1.5, 0.0)]);
        assert_eq!(fired, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_no_duplicate_across_tick_split() {
        let track = three_key_track();
        // Landing exactly on a key defers it to the next tick.
        let fired = run_track(&track, &[args(0.0, 2.0), args(2.0, 2.5)]);
        assert_eq!(fired, vec!["a", "b"]);
    }

    #[test]
    fn test_end_boundary_key_fires_with_inclusive_upper() {
        let mut track = EventTrack::new();
        track.add_event(10.0, "end");
        let mut step = args(9.0, 10.0);
        assert_eq!(run_track(&track, &[step]), Vec::<String>::new());
        step.at_end = true;
        assert_eq!(run_track(&track, &[step]), vec!["end"]);
    }

    #[test]
    fn test_jump_fires_only_with_flag_and_only_forward() {
        let mut track = three_key_track();
        assert_eq!(run_track(&track, &[jump(0.0, 3.5)]), Vec::<String>::new());

        track.fire_when_jumping_forward = true;
        assert_eq!(run_track(&track, &[jump(0.0, 3.5)]), vec!["a", "b", "c"]);
        // No backward counterpart, by design.
        assert_eq!(run_track(&track, &[jump(3.5, 0.0)]), Vec::<String>::new());
    }

    #[test]
    fn test_preview_never_fires() {
        let track = three_key_track();
        let mut step = args(0.0, 3.5);
        step.is_preview = true;
        assert_eq!(run_track(&track, &[step]), Vec::<String>::new());
    }

    #[test]
    fn test_direction_masks() {
        let mut track = three_key_track();
        track.fire_on_reverse = false;
        assert_eq!(run_track(&track, &[args(3.5, 0.0)]), Vec::<String>::new());
        track.fire_on_forward = false;
        track.fire_on_reverse = true;
        assert_eq!(run_track(&track, &[args(0.0, 3.5)]), Vec::<String>::new());
        assert_eq!(run_track(&track, &[args(3.5, 0.0)]), vec!["c", "b", "a"]);
    }

    #[derive(Default)]
    struct TestSwitch {
        enabled: bool,
        level_changes: usize,
        triggers: usize,
    }

    impl Switch for TestSwitch {
        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
            self.level_changes += 1;
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn trigger(&mut self) {
            self.triggers += 1;
        }
    }

    #[test]
    fn test_level_toggle_collapse_on_scrub() {
        let mut track = ToggleTrack::new();
        track.add_toggle(1.0, ToggleAction::On);
        track.add_toggle(2.0, ToggleAction::Off);

        let mut switch = TestSwitch::default();
        track.update(&jump(0.0, 5.0), &mut switch);
        assert!(!switch.enabled);
        assert_eq!(switch.level_changes, 1);
        assert_eq!(switch.triggers, 0);
    }

    #[test]
    fn test_reverse_uses_earliest_crossed_level() {
        let mut track = ToggleTrack::new();
        track.add_toggle(1.0, ToggleAction::On);
        track.add_toggle(2.0, ToggleAction::Off);

        let mut switch = TestSwitch::default();
        track.update(&args(5.0, 0.5), &mut switch);
        assert!(switch.enabled);
        assert_eq!(switch.level_changes, 1);
    }

    #[test]
    fn test_triggers_fire_per_crossing() {
        let mut track = ToggleTrack::new();
        track.add_toggle(1.0, ToggleAction::Trigger);
        track.add_toggle(2.0, ToggleAction::Trigger);

        let mut switch = TestSwitch::default();
        track.update(&args(0.0, 2.5), &mut switch);
        assert_eq!(switch.triggers, 2);
        // Triggers are suppressed on jumps without the opt-in flag...
        let mut switch = TestSwitch::default();
        track.update(&jump(0.0, 2.5), &mut switch);
        assert_eq!(switch.triggers, 0);
        // ...and honored with it.
        track.fire_when_jumping_forward = true;
        let mut switch = TestSwitch::default();
        track.update(&jump(0.0, 2.5), &mut switch);
        assert_eq!(switch.triggers, 2);
    }
}
