// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tracks: scalar, vector, color and boolean channels written to
//! named target properties.

use crate::target::{PropertyHandle, PropertyKind, PropertyValue, SequenceTarget};
use crate::tracks::keys::{self, TimedKey};
use glam::{DVec3, DVec4};
use serde::{Deserialize, Serialize};
use stagecraft_curves::Curve;

/// Per-binding state shared by all property track kinds
#[derive(Debug, Clone, Default)]
pub struct PropertyInstance {
    /// Property reference resolved at bind time; `None` when the target
    /// does not expose the property (the track no-ops)
    pub handle: Option<PropertyHandle>,
    /// Value to restore when the sequence ends
    pub reset_value: Option<PropertyValue>,
}

impl PropertyInstance {
    /// Resolve `name` against `target` and snapshot the current value
    pub fn bind(target: &dyn SequenceTarget, name: &str, kind: PropertyKind) -> Self {
        let handle = PropertyHandle::resolve(target, name, kind);
        if handle.is_none() {
            tracing::warn!(property = name, ?kind, "target does not expose property; track will no-op");
        }
        let reset_value = handle.as_ref().and_then(|h| target.property(&h.name));
        Self {
            handle,
            reset_value,
        }
    }

    /// Write `value` through the resolved handle, if any
    pub fn apply(&self, target: &mut dyn SequenceTarget, value: PropertyValue) {
        if let Some(handle) = &self.handle {
            if target.set_property(&handle.name, value) {
                target.notify_property_changed(&handle.name);
            }
        }
    }

    /// Restore the bind-time snapshot, if one was taken
    pub fn restore(&self, target: &mut dyn SequenceTarget) {
        if let Some(value) = self.reset_value {
            self.apply(target, value);
        }
    }
}

/// Scalar property channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatPropertyTrack {
    /// Name of the target property this track writes
    pub property: String,
    /// Value curve
    pub curve: Curve<f64>,
}

impl FloatPropertyTrack {
    /// Create an empty track for `property`
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            curve: Curve::new(),
        }
    }

    /// Evaluate at `time`, defaulting to the target's snapshot-free zero
    pub fn evaluate(&self, time: f64) -> f64 {
        self.curve.evaluate(time, 0.0)
    }
}

/// 3-vector property channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPropertyTrack {
    /// Name of the target property this track writes
    pub property: String,
    /// Value curve
    pub curve: Curve<DVec3>,
}

impl VectorPropertyTrack {
    /// Create an empty track for `property`
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            curve: Curve::new(),
        }
    }

    /// Evaluate at `time`
    pub fn evaluate(&self, time: f64) -> DVec3 {
        self.curve.evaluate(time, DVec3::ZERO)
    }
}

/// RGBA color property channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorPropertyTrack {
    /// Name of the target property this track writes
    pub property: String,
    /// Value curve
    pub curve: Curve<DVec4>,
}

impl ColorPropertyTrack {
    /// Create an empty track for `property`
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            curve: Curve::new(),
        }
    }

    /// Evaluate at `time`
    pub fn evaluate(&self, time: f64) -> DVec4 {
        self.curve.evaluate(time, DVec4::ZERO)
    }
}

/// A step key on a boolean track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoolKey {
    /// Time in seconds
    pub time: f64,
    /// Value held from this key until the next
    pub value: bool,
}

impl TimedKey for BoolKey {
    fn time(&self) -> f64 {
        self.time
    }
    fn time_mut(&mut self) -> &mut f64 {
        &mut self.time
    }
}

/// Boolean property channel; steps between keys, never interpolates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoolPropertyTrack {
    /// Name of the target property this track writes
    pub property: String,
    /// Step keys in time order
    pub keys: Vec<BoolKey>,
}

impl BoolPropertyTrack {
    /// Create an empty track for `property`
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            keys: Vec::new(),
        }
    }

    /// The value at `time`: the last key at or before the position, or the
    /// first key's value below the span. `None` with no keys.
    pub fn evaluate(&self, time: f64) -> Option<bool> {
        if self.keys.is_empty() {
            return None;
        }
        match keys::last_at_or_before(&self.keys, time) {
            Some(index) => Some(self.keys[index].value),
            None => Some(self.keys[0].value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotator::Rotator;

    #[test]
    fn test_bool_track_steps_without_interpolation() {
        let mut track = BoolPropertyTrack::new("enabled");
        keys::insert_key(&mut track.keys, BoolKey { time: 1.0, value: true });
        keys::insert_key(&mut track.keys, BoolKey { time: 3.0, value: false });

        assert_eq!(track.evaluate(0.0), Some(true)); // clamps to first key
        assert_eq!(track.evaluate(1.0), Some(true)); // exactly at boundary
        assert_eq!(track.evaluate(2.999), Some(true));
        assert_eq!(track.evaluate(3.0), Some(false));
        assert_eq!(track.evaluate(99.0), Some(false));
        assert_eq!(BoolPropertyTrack::new("x").evaluate(0.0), None);
    }

    struct Lamp {
        intensity: f64,
        recomputes: usize,
    }

    impl SequenceTarget for Lamp {
        fn location(&self) -> DVec3 {
            DVec3::ZERO
        }
        fn set_location(&mut self, _location: DVec3) {}
        fn rotation(&self) -> Rotator {
            Rotator::ZERO
        }
        fn set_rotation(&mut self, _rotation: Rotator) {}
        fn property(&self, name: &str) -> Option<PropertyValue> {
            (name == "intensity").then_some(PropertyValue::Float(self.intensity))
        }
        fn set_property(&mut self, name: &str, value: PropertyValue) -> bool {
            match (name, value) {
                ("intensity", PropertyValue::Float(v)) => {
                    self.intensity = v;
                    true
                }
                _ => false,
            }
        }
        fn notify_property_changed(&mut self, _name: &str) {
            self.recomputes += 1;
        }
    }

    #[test]
    fn test_instance_applies_and_restores() {
        let mut lamp = Lamp {
            intensity: 0.5,
            recomputes: 0,
        };
        let instance = PropertyInstance::bind(&lamp, "intensity", PropertyKind::Float);
        assert_eq!(instance.reset_value, Some(PropertyValue::Float(0.5)));

        instance.apply(&mut lamp, PropertyValue::Float(2.0));
        assert_eq!(lamp.intensity, 2.0);
        assert_eq!(lamp.recomputes, 1);

        instance.restore(&mut lamp);
        assert_eq!(lamp.intensity, 0.5);
    }

    #[test]
    fn test_missing_property_is_inert() {
        let mut lamp = Lamp {
            intensity: 1.0,
            recomputes: 0,
        };
        let instance = PropertyInstance::bind(&lamp, "unknown", PropertyKind::Float);
        assert!(instance.handle.is_none());
        instance.apply(&mut lamp, PropertyValue::Float(9.0));
        assert_eq!(lamp.intensity, 1.0);
        assert_eq!(lamp.recomputes, 0);
    }
}
