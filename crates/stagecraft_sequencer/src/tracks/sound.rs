// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sound tracks and the director group's audio-master track.

use crate::target::Speaker;
use crate::tracks::keys::{self, TimedKey};
use crate::tracks::UpdateArgs;
use serde::{Deserialize, Serialize};
use stagecraft_curves::Curve;

fn default_level() -> f64 {
    1.0
}

/// A cue key on a sound track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundKey {
    /// Time the cue starts
    pub time: f64,
    /// Cue name handed to the target's speaker
    pub cue: String,
    /// Length of the cue's span on the timeline
    pub duration: f64,
    /// Per-key volume factor
    #[serde(default = "default_level")]
    pub volume: f64,
    /// Per-key pitch factor
    #[serde(default = "default_level")]
    pub pitch: f64,
}

impl TimedKey for SoundKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Per-binding state for a sound track: which cue span the lazily-created
/// voice is currently inside
#[derive(Debug, Clone, Copy, Default)]
pub struct SoundInstance {
    /// Index of the key whose cue is playing, if any
    pub active_key: Option<usize>,
}

/// Plays audio cues through the target's speaker capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundTrack {
    /// Cue keys in time order
    pub keys: Vec<SoundKey>,
    /// Volume envelope multiplied over every cue; empty means unity
    #[serde(default)]
    pub volume_envelope: Curve<f64>,
    /// Pitch envelope multiplied over every cue; empty means unity
    #[serde(default)]
    pub pitch_envelope: Curve<f64>,
    /// Let the final cue play out past its span instead of stopping at the
    /// span's end
    #[serde(default)]
    pub continue_when_finished: bool,
    /// Keep the voice alive when the sequence stops
    #[serde(default)]
    pub suppress_on_stop: bool,
}

impl SoundTrack {
    /// Create an empty sound track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cue key, keeping time order. Returns its index.
    pub fn add_cue(&mut self, time: f64, cue: impl Into<String>, duration: f64) -> usize {
        keys::insert_key(
            &mut self.keys,
            SoundKey {
                time,
                cue: cue.into(),
                duration,
                volume: 1.0,
                pitch: 1.0,
            },
        )
    }

    /// Final volume and pitch for `key` at `position`: the product of the
    /// per-key value, the track envelope and the master levels
    fn levels(&self, key: &SoundKey, position: f64, master_volume: f64, master_pitch: f64) -> (f64, f64) {
        (
            key.volume * self.volume_envelope.evaluate(position, 1.0) * master_volume,
            key.pitch * self.pitch_envelope.evaluate(position, 1.0) * master_pitch,
        )
    }

    pub(crate) fn update(
        &self,
        args: &UpdateArgs,
        instance: &mut SoundInstance,
        speaker: &mut dyn Speaker,
        master_volume: f64,
        master_pitch: f64,
    ) {
        // Scrubbing and jumping stop playback rather than retriggering it;
        // restarting cues on every scrub step is authoring noise.
        if args.is_preview || args.is_jump {
            if instance.active_key.take().is_some() {
                speaker.stop_cue();
            }
            return;
        }

        let position = args.position;
        if args.reversed() {
            // Reverse playback never starts cues; it only stops the active
            // one once the playhead backs out of its span.
            if let Some(index) = instance.active_key {
                if self.keys.get(index).map_or(true, |k| position < k.time) {
                    speaker.stop_cue();
                    instance.active_key = None;
                }
            }
            return;
        }

        let current = keys::last_at_or_before(&self.keys, position);
        match current {
            Some(index) => {
                let key = &self.keys[index];
                let in_span = position < key.time + key.duration;
                if instance.active_key != Some(index) {
                    if in_span {
                        let (volume, pitch) = self.levels(key, position, master_volume, master_pitch);
                        speaker.play_cue(&key.cue, volume, pitch);
                        instance.active_key = Some(index);
                    }
                } else if in_span || self.continue_when_finished {
                    let (volume, pitch) = self.levels(key, position, master_volume, master_pitch);
                    speaker.set_cue_levels(volume, pitch);
                } else {
                    speaker.stop_cue();
                    instance.active_key = None;
                }
            }
            None => {
                if instance.active_key.take().is_some() {
                    speaker.stop_cue();
                }
            }
        }
    }

    /// Stop the voice when the sequence ends, unless authored to linger
    pub(crate) fn stop(&self, instance: &mut SoundInstance, speaker: &mut dyn Speaker) {
        if !self.suppress_on_stop && instance.active_key.take().is_some() {
            speaker.stop_cue();
        }
    }
}

/// Master volume and pitch curves, authored on the director's group and
/// consulted by every sound track in the sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioMasterTrack {
    /// Master volume curve; empty means unity
    #[serde(default)]
    pub volume: Curve<f64>,
    /// Master pitch curve; empty means unity
    #[serde(default)]
    pub pitch: Curve<f64>,
}

impl AudioMasterTrack {
    /// Create a unity master track
    pub fn new() -> Self {
        Self::default()
    }

    /// Master `(volume, pitch)` at `position`
    pub fn levels_at(&self, position: f64) -> (f64, f64) {
        (
            self.volume.evaluate(position, 1.0),
            self.pitch.evaluate(position, 1.0),
        )
    }
}
