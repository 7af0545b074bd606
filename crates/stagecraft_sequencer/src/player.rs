// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handle-based host surface over live sequence controllers.
//!
//! Hosts that run several sequences at once hold one [`Sequencer`] and
//! address controllers by [`SequenceHandle`]; everything forwards to
//! [`SequenceController`].

use crate::context::SequenceEvent;
use crate::controller::SequenceController;
use crate::error::BindError;
use crate::sequence::SequenceDef;
use crate::target::{TargetId, TargetRegistry};
use indexmap::IndexMap;
use uuid::Uuid;

/// Handle to an activated sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceHandle(pub Uuid);

impl SequenceHandle {
    /// Create a new random handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SequenceHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Session-scoped collection of live sequence controllers
#[derive(Default)]
pub struct Sequencer {
    active: IndexMap<SequenceHandle, SequenceController>,
}

impl Sequencer {
    /// Create an empty sequencer
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `def`, resolving group names to targets through `resolve`
    pub fn activate(
        &mut self,
        def: SequenceDef,
        registry: &mut TargetRegistry,
        resolve: impl FnMut(&str) -> Option<TargetId>,
    ) -> Result<SequenceHandle, BindError> {
        let controller = SequenceController::activate(def, registry, resolve)?;
        let handle = SequenceHandle::new();
        self.active.insert(handle, controller);
        Ok(handle)
    }

    /// Stop and drop the controller behind `handle`
    pub fn deactivate(&mut self, handle: SequenceHandle, registry: &mut TargetRegistry) {
        if let Some(mut controller) = self.active.shift_remove(&handle) {
            controller.stop(registry);
        }
    }

    /// Advance one controller by `dt` seconds
    pub fn tick(&mut self, handle: SequenceHandle, dt: f64, registry: &mut TargetRegistry) {
        if let Some(controller) = self.active.get_mut(&handle) {
            controller.tick(dt, registry);
        }
    }

    /// Move one controller's playhead
    pub fn set_position(
        &mut self,
        handle: SequenceHandle,
        time: f64,
        is_jump: bool,
        registry: &mut TargetRegistry,
    ) {
        if let Some(controller) = self.active.get_mut(&handle) {
            controller.set_position(time, is_jump, registry);
        }
    }

    /// Begin (or resume) forward playback
    pub fn play(&mut self, handle: SequenceHandle, registry: &mut TargetRegistry) {
        if let Some(controller) = self.active.get_mut(&handle) {
            controller.play(registry);
        }
    }

    /// Toggle pause
    pub fn pause(&mut self, handle: SequenceHandle) {
        if let Some(controller) = self.active.get_mut(&handle) {
            controller.pause();
        }
    }

    /// End playback, restoring targets
    pub fn stop(&mut self, handle: SequenceHandle, registry: &mut TargetRegistry) {
        if let Some(controller) = self.active.get_mut(&handle) {
            controller.stop(registry);
        }
    }

    /// Begin (or continue) reversed playback
    pub fn reverse(&mut self, handle: SequenceHandle, registry: &mut TargetRegistry) {
        if let Some(controller) = self.active.get_mut(&handle) {
            controller.reverse(registry);
        }
    }

    /// Whether the controller is playing (paused counts as playing)
    pub fn is_playing(&self, handle: SequenceHandle) -> bool {
        self.active.get(&handle).is_some_and(SequenceController::is_playing)
    }

    /// Whether the controller has yet to run its first update
    pub fn is_preparing(&self, handle: SequenceHandle) -> bool {
        self.active
            .get(&handle)
            .is_some_and(SequenceController::is_preparing)
    }

    /// Current playhead position
    pub fn position(&self, handle: SequenceHandle) -> Option<f64> {
        self.active.get(&handle).map(SequenceController::position)
    }

    /// Timeline length
    pub fn length(&self, handle: SequenceHandle) -> Option<f64> {
        self.active.get(&handle).map(SequenceController::length)
    }

    /// Drain the controller's accumulated events
    pub fn take_events(&mut self, handle: SequenceHandle) -> Vec<SequenceEvent> {
        self.active
            .get_mut(&handle)
            .map(SequenceController::take_events)
            .unwrap_or_default()
    }

    /// Direct access to a controller
    pub fn controller(&self, handle: SequenceHandle) -> Option<&SequenceController> {
        self.active.get(&handle)
    }

    /// Direct mutable access to a controller
    pub fn controller_mut(&mut self, handle: SequenceHandle) -> Option<&mut SequenceController> {
        self.active.get_mut(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::TrackGroup;
    use crate::rotator::Rotator;
    use crate::target::SequenceTarget;
    use crate::tracks::{EventTrack, Track, TrackKind};
    use glam::DVec3;

    struct Prop;

    impl SequenceTarget for Prop {
        fn location(&self) -> DVec3 {
            DVec3::ZERO
        }
        fn set_location(&mut self, _location: DVec3) {}
        fn rotation(&self) -> Rotator {
            Rotator::ZERO
        }
        fn set_rotation(&mut self, _rotation: Rotator) {}
    }

    #[test]
    fn test_handle_surface_round_trip() {
        let mut registry = TargetRegistry::new();
        let prop = registry.register(Box::new(Prop));

        let mut def = SequenceDef::new("cine", 5.0);
        let mut group = TrackGroup::new("prop");
        let mut events = EventTrack::new();
        events.add_event(1.0, "hit");
        group.add_track(Track::new("events", TrackKind::Event(events)));
        def.add_group(group);

        let mut sequencer = Sequencer::new();
        let handle = sequencer
            .activate(def, &mut registry, |_| Some(prop))
            .unwrap();

        assert!(sequencer.is_preparing(handle));
        assert_eq!(sequencer.length(handle), Some(5.0));

        sequencer.play(handle, &mut registry);
        sequencer.tick(handle, 2.0, &mut registry);
        assert_eq!(sequencer.position(handle), Some(2.0));
        assert_eq!(
            sequencer.take_events(handle),
            vec![SequenceEvent::EventFired {
                name: "hit".to_owned()
            }]
        );

        sequencer.stop(handle, &mut registry);
        assert!(!sequencer.is_playing(handle));
        sequencer.deactivate(handle, &mut registry);
        assert_eq!(sequencer.position(handle), None);
    }
}
