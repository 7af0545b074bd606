// SPDX-License-Identifier: MIT OR Apache-2.0
//! The sequence controller: the top-level timeline state machine.
//!
//! One controller owns the authoritative playhead position for one live
//! sequence, all of its group bindings, and the per-tick update ordering.
//! Hosts drive it from their frame loop via [`SequenceController::tick`]
//! and drain [`SequenceController::take_events`] afterwards.

use crate::binding::GroupBinding;
use crate::context::{SequenceContext, SequenceEvent};
use crate::error::BindError;
use crate::group::GroupId;
use crate::rotator::Rotator;
use crate::sequence::SequenceDef;
use crate::target::{TargetId, TargetRegistry};
use glam::DVec3;
use indexmap::IndexMap;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Not advancing; targets restored
    #[default]
    Stopped,
    /// Advancing every tick
    Playing,
    /// Retaining position without advancing
    Paused,
}

/// A deferred playback request, applied at the start of the next tick.
///
/// Event handlers that want to change playback mode queue one of these
/// instead of mutating the controller mid-traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingAction {
    /// Begin playback
    Play,
    /// Toggle pause
    Pause,
    /// End playback and restore targets
    Stop,
    /// Begin reversed playback
    Reverse,
    /// Flip the playback direction in place
    ChangeDirection,
    /// Move the playhead
    SetPosition {
        /// New position in seconds
        time: f64,
        /// Teleport rather than traverse
        jump: bool,
    },
}

/// The top-level timeline state machine for one activated sequence
pub struct SequenceController {
    def: SequenceDef,
    position: f64,
    state: PlaybackState,
    reversed: bool,
    play_rate: f64,
    rewind_on_play: bool,
    forced_start_position: Option<f64>,
    high_detail: bool,
    ticked: bool,
    bindings: Vec<GroupBinding>,
    group_targets: IndexMap<GroupId, TargetId>,
    events: Vec<SequenceEvent>,
    pending: Vec<PendingAction>,
}

impl SequenceController {
    /// Activate `def`: resolve one target per group through `resolve` and
    /// build the group bindings.
    ///
    /// A target may back at most one binding; a resolver handing the same
    /// target to two groups is an activation error.
    pub fn activate(
        def: SequenceDef,
        registry: &mut TargetRegistry,
        mut resolve: impl FnMut(&str) -> Option<TargetId>,
    ) -> Result<Self, BindError> {
        let resolved: Vec<Option<TargetId>> =
            def.groups.iter().map(|g| resolve(&g.name)).collect();

        let mut group_targets: IndexMap<GroupId, TargetId> = IndexMap::new();
        let mut claimed: IndexMap<TargetId, GroupId> = IndexMap::new();
        for (group, target) in def.groups.iter().zip(&resolved) {
            let Some(target) = *target else { continue };
            if let Some(&bound_by) = claimed.get(&target) {
                return Err(BindError::TargetAlreadyBound { target, bound_by });
            }
            claimed.insert(target, group.id);
            group_targets.insert(group.id, target);
        }

        let bindings: Vec<GroupBinding> = def
            .groups
            .iter()
            .zip(&resolved)
            .map(|(group, target)| {
                let base = base_transform(group.base_group, &group_targets, registry);
                GroupBinding::init(group, *target, base, registry)
            })
            .collect();

        tracing::info!(
            sequence = %def.name,
            groups = def.groups.len(),
            bound = group_targets.len(),
            "sequence activated"
        );
        Ok(Self {
            def,
            position: 0.0,
            state: PlaybackState::Stopped,
            reversed: false,
            play_rate: 1.0,
            rewind_on_play: false,
            forced_start_position: None,
            high_detail: true,
            ticked: false,
            bindings,
            group_targets,
            events: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// The authoritative playhead position
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Timeline length in seconds
    pub fn length(&self) -> f64 {
        self.def.length
    }

    /// Whether playback is advancing (paused counts as playing)
    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
    }

    /// Whether playback is paused
    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    /// Whether playback runs backward
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Whether the sequence is activated but no update has run yet
    pub fn is_preparing(&self) -> bool {
        !self.ticked
    }

    /// The sequence definition this controller plays
    pub fn definition(&self) -> &SequenceDef {
        &self.def
    }

    /// Group bindings, one per group in definition order
    pub fn bindings(&self) -> &[GroupBinding] {
        &self.bindings
    }

    /// Playback speed multiplier
    pub fn set_play_rate(&mut self, rate: f64) {
        self.play_rate = rate.max(0.0);
    }

    /// Rewind to the start whenever playback begins from stopped
    pub fn set_rewind_on_play(&mut self, rewind: bool) {
        self.rewind_on_play = rewind;
    }

    /// Start every playback from this position instead of the playhead
    pub fn set_forced_start_position(&mut self, position: Option<f64>) {
        self.forced_start_position = position.map(|p| p.clamp(0.0, self.def.length));
    }

    /// Set the runtime detail condition gating condition-masked tracks
    pub fn set_high_detail(&mut self, high_detail: bool) {
        self.high_detail = high_detail;
    }

    /// Drain the events accumulated since the last drain
    pub fn take_events(&mut self) -> Vec<SequenceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queue a playback request for the start of the next tick
    pub fn queue_action(&mut self, action: PendingAction) {
        self.pending.push(action);
    }

    /// Begin (or resume) forward playback
    pub fn play(&mut self, registry: &mut TargetRegistry) {
        self.reversed = false;
        match self.state {
            PlaybackState::Stopped => {
                self.reinit_terminated(registry);
                if let Some(start) = self.forced_start_position {
                    self.update_to(start, registry, true, false);
                } else if self.rewind_on_play {
                    self.update_to(0.0, registry, true, false);
                }
                self.state = PlaybackState::Playing;
                tracing::info!(sequence = %self.def.name, "playback started");
            }
            PlaybackState::Paused => self.state = PlaybackState::Playing,
            PlaybackState::Playing => {}
        }
    }

    /// Begin (or continue) reversed playback
    pub fn reverse(&mut self, registry: &mut TargetRegistry) {
        self.reversed = true;
        if self.state == PlaybackState::Stopped {
            self.reinit_terminated(registry);
            self.state = PlaybackState::Playing;
            tracing::info!(sequence = %self.def.name, "reversed playback started");
        } else if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
        }
    }

    /// Toggle pause while playing
    pub fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => self.state = PlaybackState::Paused,
            PlaybackState::Paused => self.state = PlaybackState::Playing,
            PlaybackState::Stopped => {}
        }
    }

    /// Flip the playback direction in place
    pub fn change_direction(&mut self) {
        self.reversed = !self.reversed;
    }

    /// End playback, restoring every target to its reset snapshot.
    ///
    /// Safe to call repeatedly; only the first call restores.
    pub fn stop(&mut self, registry: &mut TargetRegistry) {
        if self.state != PlaybackState::Stopped {
            let event = if self.reversed {
                SequenceEvent::Reversed
            } else {
                SequenceEvent::Completed
            };
            self.finish(registry, event);
        } else {
            // Already stopped: termination below is a guarded no-op.
            self.terminate_bindings(registry);
        }
    }

    /// Move the playhead. While stopped this is a non-authoritative preview
    /// (no side effects); while playing it is an authoritative jump or
    /// traversal per `is_jump`.
    pub fn set_position(&mut self, time: f64, is_jump: bool, registry: &mut TargetRegistry) {
        let clamped = time.clamp(0.0, self.def.length);
        let is_preview = self.state == PlaybackState::Stopped;
        self.update_to(clamped, registry, is_jump, is_preview);
    }

    /// Advance the playhead by `dt` seconds of host time
    pub fn tick(&mut self, dt: f64, registry: &mut TargetRegistry) {
        self.drain_pending(registry);
        if self.state != PlaybackState::Playing {
            return;
        }

        let direction = if self.reversed { -1.0 } else { 1.0 };
        let mut remaining = dt.max(0.0) * self.play_rate * direction;
        loop {
            let candidate = self.position + remaining;
            if !self.reversed && candidate > self.def.length {
                let overflow = candidate - self.def.length;
                self.update_to(self.def.length, registry, false, false);
                if self.def.looping && self.def.length > 0.0 {
                    self.reanchor_bindings(registry);
                    self.update_to(0.0, registry, true, false);
                    remaining = overflow;
                    continue;
                }
                self.finish(registry, SequenceEvent::Completed);
                break;
            } else if self.reversed && candidate < 0.0 {
                let overflow = candidate;
                self.update_to(0.0, registry, false, false);
                if self.def.looping && self.def.length > 0.0 {
                    self.reanchor_bindings(registry);
                    self.update_to(self.def.length, registry, true, false);
                    remaining = overflow;
                    continue;
                }
                self.finish(registry, SequenceEvent::Reversed);
                break;
            } else {
                self.update_to(candidate, registry, false, false);
                break;
            }
        }
    }

    fn drain_pending(&mut self, registry: &mut TargetRegistry) {
        for action in std::mem::take(&mut self.pending) {
            match action {
                PendingAction::Play => self.play(registry),
                PendingAction::Pause => self.pause(),
                PendingAction::Stop => self.stop(registry),
                PendingAction::Reverse => self.reverse(registry),
                PendingAction::ChangeDirection => self.change_direction(),
                PendingAction::SetPosition { time, jump } => {
                    self.set_position(time, jump, registry);
                }
            }
        }
    }

    fn finish(&mut self, registry: &mut TargetRegistry, event: SequenceEvent) {
        self.state = PlaybackState::Stopped;
        self.events.push(event);
        self.terminate_bindings(registry);
        tracing::info!(sequence = %self.def.name, position = self.position, "playback stopped");
    }

    fn terminate_bindings(&mut self, registry: &mut TargetRegistry) {
        for (group, binding) in self.def.groups.iter().zip(self.bindings.iter_mut()) {
            binding.terminate(group, registry);
        }
    }

    fn reinit_terminated(&mut self, registry: &mut TargetRegistry) {
        for (group, binding) in self.def.groups.iter().zip(self.bindings.iter_mut()) {
            let base = base_transform(group.base_group, &self.group_targets, registry);
            binding.reinit(group, base, registry);
        }
    }

    fn reanchor_bindings(&mut self, registry: &mut TargetRegistry) {
        for (group, binding) in self.def.groups.iter().zip(self.bindings.iter_mut()) {
            let base = base_transform(group.base_group, &self.group_targets, registry);
            binding.reanchor(registry, base);
        }
    }

    /// One authoritative (or preview) update at `new_position`.
    ///
    /// Bindings are visited in ascending base-attachment depth — the number
    /// of attachment links from a target to another target also under this
    /// controller — recomputed every update, so a child's tracks always
    /// read its parent's already-updated transform.
    fn update_to(
        &mut self,
        new_position: f64,
        registry: &mut TargetRegistry,
        is_jump: bool,
        is_preview: bool,
    ) {
        // Refresh the group→target snapshot, dropping targets that have
        // been unregistered since the last update.
        self.group_targets.clear();
        for binding in &self.bindings {
            if let Some(id) = binding.target() {
                if registry.contains(id) {
                    self.group_targets.insert(binding.group_id(), id);
                }
            }
        }

        let controlled: Vec<TargetId> = self.group_targets.values().copied().collect();
        let mut order: Vec<usize> = (0..self.bindings.len()).collect();
        order.sort_by_key(|&index| {
            self.bindings[index].target().map_or(0, |id| {
                registry.attachment_depth(id, |parent| controlled.contains(&parent))
            })
        });

        let at_end = new_position >= self.def.length;
        let (master_volume, master_pitch) = self.def.audio_master_levels(new_position);

        let Self {
            def,
            bindings,
            group_targets,
            events,
            high_detail,
            ..
        } = self;
        let mut ctx = SequenceContext {
            position: new_position,
            registry,
            group_targets,
            events,
            high_detail: *high_detail,
            master_volume,
            master_pitch,
        };
        for &index in &order {
            bindings[index].update(&def.groups[index], &mut ctx, is_jump, is_preview, at_end);
        }

        self.position = new_position;
        self.ticked = true;
    }
}

fn base_transform(
    base_group: Option<GroupId>,
    group_targets: &IndexMap<GroupId, TargetId>,
    registry: &TargetRegistry,
) -> Option<(DVec3, Rotator)> {
    let id = *group_targets.get(&base_group?)?;
    let target = registry.get(id)?;
    Some((target.location(), target.rotation()))
}
