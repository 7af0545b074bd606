// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sorted keyframe arrays with index-returning CRUD and evaluation.

use crate::keyframe::{cubic_interp, lerp, CurveValue, InterpMode, Keyframe};
use serde::{Deserialize, Serialize};

/// Minimum segment length considered non-degenerate
const MIN_SEGMENT: f64 = 1.0e-8;

/// Error from a curve authoring operation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CurveError {
    /// Key index out of range
    #[error("key index {index} out of range (curve has {len} keys)")]
    KeyIndexOutOfRange {
        /// The offending index
        index: usize,
        /// Number of keys in the curve
        len: usize,
    },
}

/// An ordered sequence of keyframes over one channel.
///
/// Keys are kept sorted by time. All mutating operations return the
/// (possibly changed) index of the affected key; callers that cache indices
/// must re-validate after any insert/remove/move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve<T> {
    keys: Vec<Keyframe<T>>,
    /// Tension factor applied to auto tangents; 0 is a Catmull-Rom fit
    tension: f64,
}

impl<T> Default for Curve<T> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            tension: 0.0,
        }
    }
}

impl<T: CurveValue> Curve<T> {
    /// Create an empty curve
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty curve with an auto-tangent tension factor
    pub fn with_tension(tension: f64) -> Self {
        Self {
            keys: Vec::new(),
            tension,
        }
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the curve has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys in time order
    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    /// Key at `index`, if in range
    pub fn key(&self, index: usize) -> Option<&Keyframe<T>> {
        self.keys.get(index)
    }

    /// Time of the first key
    pub fn first_time(&self) -> Option<f64> {
        self.keys.first().map(|k| k.time)
    }

    /// Time of the last key
    pub fn last_time(&self) -> Option<f64> {
        self.keys.last().map(|k| k.time)
    }

    fn check_index(&self, index: usize) -> Result<(), CurveError> {
        if index < self.keys.len() {
            Ok(())
        } else {
            Err(CurveError::KeyIndexOutOfRange {
                index,
                len: self.keys.len(),
            })
        }
    }

    fn insert_position(&self, time: f64) -> usize {
        self.keys
            .iter()
            .position(|k| k.time >= time)
            .unwrap_or(self.keys.len())
    }

    /// Insert a key with the default interpolation mode. Returns its index.
    pub fn add_key(&mut self, time: f64, value: T) -> usize {
        self.add_keyframe(Keyframe::new(time, value))
    }

    /// Insert a fully specified keyframe. Returns its index.
    pub fn add_keyframe(&mut self, key: Keyframe<T>) -> usize {
        let index = self.insert_position(key.time);
        self.keys.insert(index, key);
        self.refresh_auto_tangents_around(index);
        index
    }

    /// Remove and return the key at `index`
    pub fn remove_key(&mut self, index: usize) -> Result<Keyframe<T>, CurveError> {
        self.check_index(index)?;
        let key = self.keys.remove(index);
        if !self.keys.is_empty() {
            self.refresh_auto_tangents_around(index.min(self.keys.len() - 1));
        }
        Ok(key)
    }

    /// Move the key at `index` to `new_time`, preserving its value, mode and
    /// tangents. The key may change position in the array; the new index is
    /// returned.
    pub fn move_key(&mut self, index: usize, new_time: f64) -> Result<usize, CurveError> {
        self.check_index(index)?;
        let mut key = self.keys.remove(index);
        key.time = new_time;
        let new_index = self.insert_position(new_time);
        self.keys.insert(new_index, key);
        // The edit can disturb auto tangents at both the old and new site.
        self.refresh_auto_tangents_around(index.min(self.keys.len() - 1));
        self.refresh_auto_tangents_around(new_index);
        Ok(new_index)
    }

    /// Copy the key at `index` to `new_time`. Returns the new key's index.
    pub fn duplicate_key(&mut self, index: usize, new_time: f64) -> Result<usize, CurveError> {
        self.check_index(index)?;
        let mut key = self.keys[index];
        key.time = new_time;
        Ok(self.add_keyframe(key))
    }

    /// Replace the value at `index`
    pub fn set_value(&mut self, index: usize, value: T) -> Result<(), CurveError> {
        self.check_index(index)?;
        self.keys[index].value = value;
        self.refresh_auto_tangents_around(index);
        Ok(())
    }

    /// Replace the interpolation mode at `index`
    pub fn set_interp(&mut self, index: usize, interp: InterpMode) -> Result<(), CurveError> {
        self.check_index(index)?;
        self.keys[index].interp = interp;
        self.refresh_auto_tangents_around(index);
        Ok(())
    }

    /// Set the auto-tangent tension factor and recompute all auto tangents
    pub fn set_tension(&mut self, tension: f64) {
        self.tension = tension;
        self.refresh_all_auto_tangents();
    }

    /// Index of the last key with `time <= at`, if any
    pub fn last_index_at_or_before(&self, at: f64) -> Option<usize> {
        self.keys.iter().rposition(|k| k.time <= at)
    }

    /// Nearest key time to `near`, skipping the given key indices
    pub fn closest_snap_time(&self, near: f64, ignore: &[usize]) -> Option<f64> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(i, _)| !ignore.contains(i))
            .map(|(_, k)| k.time)
            .min_by(|a, b| {
                (a - near)
                    .abs()
                    .partial_cmp(&(b - near).abs())
                    .expect("key times are finite")
            })
    }

    /// Evaluate the curve at `time`.
    ///
    /// Clamps to the first/last key's value outside the curve's span and
    /// returns `default` for an empty curve.
    pub fn evaluate(&self, time: f64, default: T) -> T {
        let n = self.keys.len();
        if n == 0 {
            return default;
        }
        if n < 2 || time <= self.keys[0].time {
            return self.keys[0].value;
        }
        if time >= self.keys[n - 1].time {
            return self.keys[n - 1].value;
        }

        for i in 1..n {
            if time < self.keys[i].time {
                let left = &self.keys[i - 1];
                let right = &self.keys[i];
                let diff = right.time - left.time;

                if diff > MIN_SEGMENT && left.interp != InterpMode::Constant {
                    let alpha = (time - left.time) / diff;
                    return if left.interp == InterpMode::Linear {
                        lerp(left.value, right.value, alpha)
                    } else {
                        cubic_interp(
                            left.value,
                            left.leave_tangent * diff,
                            right.value,
                            right.arrive_tangent * diff,
                            alpha,
                        )
                    };
                }
                return left.value;
            }
        }

        self.keys[n - 1].value
    }

    /// Recompute auto tangents for every key
    pub fn refresh_all_auto_tangents(&mut self) {
        for i in 0..self.keys.len() {
            self.refresh_auto_tangent(i);
        }
    }

    /// Recompute auto tangents for `index` and its immediate neighbors.
    ///
    /// A single key edit can change up to three tangents.
    fn refresh_auto_tangents_around(&mut self, index: usize) {
        let from = index.saturating_sub(1);
        let to = (index + 1).min(self.keys.len().saturating_sub(1));
        for i in from..=to {
            self.refresh_auto_tangent(i);
        }
    }

    fn refresh_auto_tangent(&mut self, index: usize) {
        if self.keys[index].interp != InterpMode::CubicAuto {
            return;
        }
        let n = self.keys.len();
        if index == 0 || index + 1 >= n {
            // Endpoint keys ease in/out with flat tangents.
            self.keys[index].arrive_tangent = T::default();
            self.keys[index].leave_tangent = T::default();
            return;
        }
        let prev = &self.keys[index - 1];
        let next = &self.keys[index + 1];
        let span = (next.time - prev.time).max(MIN_SEGMENT);
        let tangent = (next.value - prev.value) * ((1.0 - self.tension) / span);
        self.keys[index].arrive_tangent = tangent;
        self.keys[index].leave_tangent = tangent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn linear_curve(points: &[(f64, f64)]) -> Curve<f64> {
        let mut curve = Curve::new();
        for &(t, v) in points {
            curve.add_key(t, v);
        }
        curve
    }

    #[test]
    fn test_empty_curve_returns_default() {
        let curve: Curve<f64> = Curve::new();
        assert_eq!(curve.evaluate(3.0, 42.0), 42.0);
    }

    #[test]
    fn test_single_key_is_constant_everywhere() {
        let curve = linear_curve(&[(1.0, 7.0)]);
        assert_eq!(curve.evaluate(-10.0, 0.0), 7.0);
        assert_eq!(curve.evaluate(1.0, 0.0), 7.0);
        assert_eq!(curve.evaluate(100.0, 0.0), 7.0);
    }

    #[test]
    fn test_round_trip_at_every_key() {
        let points = [(0.0, 1.0), (0.5, -3.0), (2.0, 8.0), (2.0, 9.0), (4.5, 0.25)];
        let curve = linear_curve(&points);
        for i in 0..curve.len() {
            let key = curve.key(i).unwrap();
            // Duplicate times resolve to the value the eval contract picks,
            // which must still be one stored at that exact time.
            let value = curve.evaluate(key.time, f64::NAN);
            assert!(points.iter().any(|&(t, v)| t == key.time && v == value));
        }
    }

    #[test]
    fn test_boundary_clamp() {
        let curve = linear_curve(&[(1.0, 10.0), (3.0, 20.0)]);
        assert_eq!(curve.evaluate(0.0, 0.0), 10.0);
        assert_eq!(curve.evaluate(1.0, 0.0), 10.0);
        assert_eq!(curve.evaluate(3.0, 0.0), 20.0);
        assert_eq!(curve.evaluate(99.0, 0.0), 20.0);
    }

    #[test]
    fn test_linear_interpolation() {
        let curve = linear_curve(&[(0.0, 0.0), (4.0, 8.0)]);
        assert_eq!(curve.evaluate(1.0, 0.0), 2.0);
        assert_eq!(curve.evaluate(3.0, 0.0), 6.0);
    }

    #[test]
    fn test_constant_segment_holds_left_value() {
        let mut curve = linear_curve(&[(0.0, 1.0), (2.0, 5.0)]);
        curve.set_interp(0, InterpMode::Constant).unwrap();
        assert_eq!(curve.evaluate(1.999, 0.0), 1.0);
        assert_eq!(curve.evaluate(2.0, 0.0), 5.0);
    }

    #[test]
    fn test_move_key_across_neighbor_returns_new_index() {
        let mut curve = linear_curve(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let new_index = curve.move_key(0, 1.5).unwrap();
        assert_eq!(new_index, 1);
        assert_eq!(curve.key(0).unwrap().time, 1.0);
        assert_eq!(curve.key(1).unwrap().time, 1.5);
        assert_eq!(curve.key(1).unwrap().value, 0.0);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut curve = linear_curve(&[(0.0, 0.0)]);
        assert_eq!(
            curve.remove_key(3),
            Err(CurveError::KeyIndexOutOfRange { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_auto_tangent_central_difference() {
        let mut curve = Curve::new();
        curve.add_keyframe(Keyframe::new(0.0, 0.0).with_interp(InterpMode::CubicAuto));
        curve.add_keyframe(Keyframe::new(1.0, 2.0).with_interp(InterpMode::CubicAuto));
        curve.add_keyframe(Keyframe::new(3.0, 8.0).with_interp(InterpMode::CubicAuto));

        // Interior key: (8 - 0) / (3 - 0).
        let mid = curve.key(1).unwrap();
        assert!((mid.arrive_tangent - 8.0 / 3.0).abs() < 1e-12);
        assert!((mid.leave_tangent - 8.0 / 3.0).abs() < 1e-12);

        // Endpoints stay flat.
        assert_eq!(curve.key(0).unwrap().leave_tangent, 0.0);
        assert_eq!(curve.key(2).unwrap().arrive_tangent, 0.0);
    }

    #[test]
    fn test_auto_tangent_refresh_on_neighbor_edit() {
        let mut curve = Curve::new();
        for (t, v) in [(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)] {
            curve.add_keyframe(Keyframe::new(t, v).with_interp(InterpMode::CubicAuto));
        }
        // Symmetric neighbors: flat tangent at the peak.
        assert_eq!(curve.key(1).unwrap().leave_tangent, 0.0);

        curve.set_value(2, 4.0).unwrap();
        let mid = curve.key(1).unwrap();
        assert!((mid.leave_tangent - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_tension_scales_auto_tangents() {
        let mut curve = Curve::with_tension(0.5);
        for (t, v) in [(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)] {
            curve.add_keyframe(Keyframe::new(t, v).with_interp(InterpMode::CubicAuto));
        }
        let mid = curve.key(1).unwrap();
        assert!((mid.leave_tangent - 0.5 * 4.0 / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_cubic_eval_passes_through_keys() {
        let mut curve = Curve::new();
        for (t, v) in [(0.0, 0.0), (2.0, 3.0), (4.0, -1.0)] {
            curve.add_keyframe(Keyframe::new(t, v).with_interp(InterpMode::CubicAuto));
        }
        assert_eq!(curve.evaluate(0.0, f64::NAN), 0.0);
        assert_eq!(curve.evaluate(2.0, f64::NAN), 3.0);
        assert_eq!(curve.evaluate(4.0, f64::NAN), -1.0);
    }

    #[test]
    fn test_closest_snap_time() {
        let curve = linear_curve(&[(0.0, 0.0), (1.0, 0.0), (5.0, 0.0)]);
        assert_eq!(curve.closest_snap_time(1.2, &[]), Some(1.0));
        assert_eq!(curve.closest_snap_time(1.2, &[1]), Some(0.0));
        let empty: Curve<f64> = Curve::new();
        assert_eq!(empty.closest_snap_time(1.0, &[]), None);
    }

    #[test]
    fn test_vector_channel() {
        let mut curve = Curve::new();
        curve.add_key(0.0, DVec3::ZERO);
        curve.add_key(5.0, DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(curve.evaluate(2.5, DVec3::ZERO), DVec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut curve = Curve::new();
        curve.add_keyframe(
            Keyframe::new(0.5, 2.0)
                .with_interp(InterpMode::Cubic)
                .with_tangents(1.0, -1.0),
        );
        let text = ron::to_string(&curve).unwrap();
        let loaded: Curve<f64> = ron::from_str(&text).unwrap();
        assert_eq!(loaded, curve);
    }
}
