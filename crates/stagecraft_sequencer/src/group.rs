// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track groups: the authored description of one participant.

use crate::tracks::Track;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a track group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub Uuid);

impl GroupId {
    /// Create a new random group ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference frame for a group's movement and animation tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReferenceFrame {
    /// Keyframes are absolute world-space values
    #[default]
    World,
    /// Keyframes are offsets composed onto the target's transform captured
    /// at bind time
    RelativeToInitial,
}

/// An ordered collection of tracks describing one logical participant
/// (e.g. "Camera1", "Door_03") over the timeline.
///
/// Groups are authored before playback and immutable while a sequence is
/// live; all bindings of the same group share this definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackGroup {
    /// Unique group ID
    pub id: GroupId,
    /// Group name, matched against the host's target resolver
    pub name: String,
    /// Tracks in declaration order
    pub tracks: Vec<Track>,
    /// Reference frame for movement tracks
    pub reference_frame: ReferenceFrame,
    /// Optional moving base for `RelativeToInitial` frames: offsets ride
    /// along with this group's target instead of a fixed world anchor
    pub base_group: Option<GroupId>,
}

impl TrackGroup {
    /// Create an empty group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into(),
            tracks: Vec::new(),
            reference_frame: ReferenceFrame::default(),
            base_group: None,
        }
    }

    /// Set the reference frame
    pub fn with_reference_frame(mut self, frame: ReferenceFrame) -> Self {
        self.reference_frame = frame;
        self
    }

    /// Append a track, returning its index
    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    /// Track at `index`, if in range
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Mutable track at `index`, if in range
    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Nearest key time to `near` across every child track
    pub fn closest_snap_position(&self, near: f64) -> Option<f64> {
        self.tracks
            .iter()
            .filter_map(|t| t.closest_snap_position(near, &[]))
            .min_by(|a, b| {
                (a - near)
                    .abs()
                    .partial_cmp(&(b - near).abs())
                    .expect("key times are finite")
            })
    }
}
