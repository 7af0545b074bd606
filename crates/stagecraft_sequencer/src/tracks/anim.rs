// SPDX-License-Identifier: MIT OR Apache-2.0
//! Skeletal-animation tracks.
//!
//! A track is a list of clip entries sorted by start time; each entry maps
//! a span of the timeline onto clip-local time. Forward playback walks
//! every entry and loop iteration spanned since the last update so that
//! notifies embedded in clips fire even under coarse per-tick deltas.

use crate::target::Animator;
use crate::tracks::keys::{self, TimedKey};
use crate::tracks::UpdateArgs;
use serde::{Deserialize, Serialize};

const MIN_CLIP_SPAN: f64 = 1.0e-6;

fn default_rate() -> f64 {
    1.0
}

/// One clip placement on an animation track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimClipEntry {
    /// Timeline time the clip starts
    pub start_time: f64,
    /// Clip name resolved by the target's animator
    pub clip: String,
    /// Clip-time seconds per timeline second
    #[serde(default = "default_rate")]
    pub play_rate: f64,
    /// Clip-local time skipped at the front
    #[serde(default)]
    pub start_offset: f64,
    /// Clip-local time trimmed off the back
    #[serde(default)]
    pub end_offset: f64,
    /// Wrap around instead of clamping at the clip's end
    #[serde(default)]
    pub looping: bool,
    /// Play the clip back to front
    #[serde(default)]
    pub reverse: bool,
}

impl AnimClipEntry {
    /// An entry playing `clip` from `start_time` with default settings
    pub fn new(start_time: f64, clip: impl Into<String>) -> Self {
        Self {
            start_time,
            clip: clip.into(),
            play_rate: 1.0,
            start_offset: 0.0,
            end_offset: 0.0,
            looping: false,
            reverse: false,
        }
    }
}

impl TimedKey for AnimClipEntry {
    fn time(&self) -> f64 {
        self.start_time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.start_time
    }
}

/// Per-binding state for an animation track
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimInstance {
    /// Whether this instance took pose control of the target at bind time
    pub controlling: bool,
}

/// Drives a target's animator capability from clip entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimTrack {
    /// Clip entries sorted by start time
    pub entries: Vec<AnimClipEntry>,
}

impl AnimTrack {
    /// Create an empty animation track
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, keeping start-time order. Returns its index.
    pub fn add_entry(&mut self, entry: AnimClipEntry) -> usize {
        keys::insert_key(&mut self.entries, entry)
    }

    /// The entry governing `position`: the last one starting at or before
    /// it, or the first entry for positions before the span
    fn entry_index_at(&self, position: f64) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        Some(keys::last_at_or_before(&self.entries, position).unwrap_or(0))
    }

    /// Timeline time the entry at `index` stops governing the track
    fn entry_end(&self, index: usize) -> f64 {
        self.entries
            .get(index + 1)
            .map_or(f64::INFINITY, |e| e.start_time)
    }

    /// Map a timeline position inside `entry` to clip-local seconds
    fn clip_position(entry: &AnimClipEntry, clip_length: f64, position: f64) -> f64 {
        let usable = (clip_length - entry.start_offset - entry.end_offset).max(MIN_CLIP_SPAN);
        let raw = (position - entry.start_time).max(0.0) * entry.play_rate.max(0.0);
        let mut local = if entry.looping {
            raw % usable
        } else {
            raw.min(usable)
        };
        if entry.reverse {
            local = usable - local;
        }
        entry.start_offset + local
    }

    /// Number of whole loop iterations between two raw clip offsets
    fn wraps_between(entry: &AnimClipEntry, clip_length: f64, from: f64, to: f64) -> u64 {
        if !entry.looping {
            return 0;
        }
        let usable = (clip_length - entry.start_offset - entry.end_offset).max(MIN_CLIP_SPAN);
        let raw = |position: f64| (position - entry.start_time).max(0.0) * entry.play_rate.max(0.0);
        let complete = |offset: f64| (offset / usable).floor() as u64;
        complete(raw(to)).saturating_sub(complete(raw(from)))
    }

    pub(crate) fn update(&self, args: &UpdateArgs, animator: &mut dyn Animator) {
        let Some(final_index) = self.entry_index_at(args.position) else {
            return;
        };

        let walk = !args.is_jump && !args.is_preview && !args.reversed();
        if !walk {
            let entry = &self.entries[final_index];
            if let Some(length) = animator.clip_length(&entry.clip) {
                let local = Self::clip_position(entry, length, args.position);
                animator.set_clip_position(&entry.clip, local, entry.looping, false);
            }
            return;
        }

        // Walk every entry spanned since the last update, and inside each
        // looping entry every completed iteration, so embedded notifies
        // fire once per pass regardless of the tick size.
        let first_index = self.entry_index_at(args.prev).unwrap_or(0);
        for index in first_index..=final_index {
            let entry = &self.entries[index];
            let Some(length) = animator.clip_length(&entry.clip) else {
                continue;
            };
            let span_start = args.prev.max(entry.start_time);
            let span_end = args.position.min(self.entry_end(index));
            if span_end < span_start {
                continue;
            }

            let usable = (length - entry.start_offset - entry.end_offset).max(MIN_CLIP_SPAN);
            let loop_end = if entry.reverse {
                entry.start_offset
            } else {
                entry.start_offset + usable
            };
            for _ in 0..Self::wraps_between(entry, length, span_start, span_end) {
                animator.set_clip_position(&entry.clip, loop_end, entry.looping, true);
            }
            let local = Self::clip_position(entry, length, span_end);
            animator.set_clip_position(&entry.clip, local, entry.looping, true);
        }
    }
}
