// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequence definitions: the authored description of a whole cinematic.

use crate::group::{GroupId, TrackGroup};
use crate::tracks::{AudioMasterTrack, DirectorTrack, TrackKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a sequence definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub Uuid);

impl SequenceId {
    /// Create a new random sequence ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::new()
    }
}

/// An authored sequence: a fixed-length timeline of track groups.
///
/// Definitions are immutable while a controller is live; the controller
/// takes its own copy at activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceDef {
    /// Unique sequence ID
    pub id: SequenceId,
    /// Sequence name
    pub name: String,
    /// Timeline length in seconds
    pub length: f64,
    /// Wrap around at the boundaries instead of stopping
    #[serde(default)]
    pub looping: bool,
    /// Track groups, one per participant
    pub groups: Vec<TrackGroup>,
}

impl SequenceDef {
    /// Create an empty sequence
    pub fn new(name: impl Into<String>, length: f64) -> Self {
        Self {
            id: SequenceId::new(),
            name: name.into(),
            length,
            looping: false,
            groups: Vec::new(),
        }
    }

    /// Append a group, returning its id
    pub fn add_group(&mut self, group: TrackGroup) -> GroupId {
        let id = group.id;
        self.groups.push(group);
        id
    }

    /// Group by id
    pub fn group(&self, id: GroupId) -> Option<&TrackGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// The director track and its owning group, if the sequence has one
    pub fn director(&self) -> Option<(&TrackGroup, &DirectorTrack)> {
        self.groups.iter().find_map(|group| {
            group.tracks.iter().find_map(|track| match &track.kind {
                TrackKind::Director(director) => Some((group, director)),
                _ => None,
            })
        })
    }

    /// The audio-master track on the director's group, if any
    pub fn audio_master(&self) -> Option<&AudioMasterTrack> {
        let (group, _) = self.director()?;
        group.tracks.iter().find_map(|track| match &track.kind {
            TrackKind::AudioMaster(master) => Some(master),
            _ => None,
        })
    }

    /// Master `(volume, pitch)` at `position`; unity without a master track
    pub fn audio_master_levels(&self, position: f64) -> (f64, f64) {
        self.audio_master()
            .map_or((1.0, 1.0), |master| master.levels_at(position))
    }
}
