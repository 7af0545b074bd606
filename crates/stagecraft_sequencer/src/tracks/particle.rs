// SPDX-License-Identifier: MIT OR Apache-2.0
//! Particle-replay tracks: spans of recorded particle-simulation playback.

use crate::target::ParticleReplayer;
use crate::tracks::keys::{self, TimedKey};
use crate::tracks::UpdateArgs;
use serde::{Deserialize, Serialize};

/// One replay span on a particle-replay track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleReplayKey {
    /// Time the replay starts
    pub time: f64,
    /// Length of the replay span
    pub duration: f64,
    /// Recorded clip to play back
    pub clip_id: u32,
}

impl TimedKey for ParticleReplayKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Per-binding state for a particle-replay track
#[derive(Debug, Clone, Copy, Default)]
pub struct ParticleInstance {
    /// Clip currently playing back, if any
    pub active_clip: Option<u32>,
}

/// Plays recorded particle clips through the target's replayer capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticleReplayTrack {
    /// Replay spans in time order
    pub keys: Vec<ParticleReplayKey>,
}

impl ParticleReplayTrack {
    /// Create an empty particle-replay track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a replay span, keeping time order. Returns its index.
    pub fn add_replay(&mut self, time: f64, duration: f64, clip_id: u32) -> usize {
        keys::insert_key(
            &mut self.keys,
            ParticleReplayKey {
                time,
                duration,
                clip_id,
            },
        )
    }

    /// The clip whose span contains `position`, if any
    fn clip_at(&self, position: f64) -> Option<u32> {
        let index = keys::last_at_or_before(&self.keys, position)?;
        let key = &self.keys[index];
        (position < key.time + key.duration).then_some(key.clip_id)
    }

    pub(crate) fn update(
        &self,
        args: &UpdateArgs,
        instance: &mut ParticleInstance,
        replayer: &mut dyn ParticleReplayer,
    ) {
        let desired = self.clip_at(args.position);
        if desired == instance.active_clip {
            return;
        }
        if instance.active_clip.is_some() {
            replayer.end_clip_playback();
        }
        if let Some(clip_id) = desired {
            replayer.begin_clip_playback(clip_id);
        }
        instance.active_clip = desired;
    }

    /// Stop any active playback when the sequence ends
    pub(crate) fn stop(&self, instance: &mut ParticleInstance, replayer: &mut dyn ParticleReplayer) {
        if instance.active_clip.take().is_some() {
            replayer.end_clip_playback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TestReplayer {
        active: Option<u32>,
        begins: usize,
        ends: usize,
    }

    impl ParticleReplayer for TestReplayer {
        fn begin_clip_playback(&mut self, clip_id: u32) {
            self.active = Some(clip_id);
            self.begins += 1;
        }
        fn end_clip_playback(&mut self) {
            self.active = None;
            self.ends += 1;
        }
    }

    fn step(prev: f64, position: f64) -> UpdateArgs {
        UpdateArgs {
            prev,
            position,
            is_jump: false,
            is_preview: false,
            at_end: false,
        }
    }

    #[test]
    fn test_replay_spans_drive_playback() {
        let mut track = ParticleReplayTrack::new();
        track.add_replay(1.0, 2.0, 7);

        let mut replayer = TestReplayer::default();
        let mut instance = ParticleInstance::default();

        track.update(&step(0.0, 0.5), &mut instance, &mut replayer);
        assert_eq!(replayer.active, None);

        track.update(&step(0.5, 1.5), &mut instance, &mut replayer);
        assert_eq!(replayer.active, Some(7));

        track.update(&step(1.5, 2.5), &mut instance, &mut replayer);
        assert_eq!(replayer.begins, 1, "staying inside a span must not restart");

        track.update(&step(2.5, 4.0), &mut instance, &mut replayer);
        assert_eq!(replayer.active, None);
        assert_eq!(replayer.ends, 1);
    }

    #[test]
    fn test_adjacent_spans_switch_clips() {
        let mut track = ParticleReplayTrack::new();
        track.add_replay(0.0, 1.0, 1);
        track.add_replay(1.0, 1.0, 2);

        let mut replayer = TestReplayer::default();
        let mut instance = ParticleInstance::default();
        track.update(&step(0.0, 0.5), &mut instance, &mut replayer);
        track.update(&step(0.5, 1.5), &mut instance, &mut replayer);
        assert_eq!(replayer.active, Some(2));
        assert_eq!(replayer.ends, 1);
        assert_eq!(replayer.begins, 2);
    }

    #[test]
    fn test_stop_ends_active_playback() {
        let mut track = ParticleReplayTrack::new();
        track.add_replay(0.0, 5.0, 3);

        let mut replayer = TestReplayer::default();
        let mut instance = ParticleInstance::default();
        track.update(&step(0.0, 1.0), &mut instance, &mut replayer);
        track.stop(&mut instance, &mut replayer);
        assert_eq!(replayer.active, None);
        track.stop(&mut instance, &mut replayer);
        assert_eq!(replayer.ends, 1);
    }
}
