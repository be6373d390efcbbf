//! Named landmarks fixed to boundary indices.
//!
//! One landmark, [`Landmark::Reference`], is always present and defines
//! index 0 for every landmark-relative lookup. The map here is the raw
//! tag-to-index store; moving the reference together with a segment
//! partition, and recomputing [`Landmark::Intersection`], happens in
//! [`ProfiledOutline`](crate::outline::ProfiledOutline).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ring;
use crate::types::{ProfileError, Result};

/// A landmark identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Landmark {
    /// Zero point for relative addressing.
    Reference,
    /// Primary orientation point.
    Orientation,
    /// The point across the centroid from [`Landmark::Orientation`].
    /// Always derived, never set directly.
    Intersection,
    /// Topmost point when oriented.
    Top,
    /// Bottommost point when oriented.
    Bottom,
    /// Leftmost point when oriented.
    Left,
    /// Rightmost point when oriented.
    Right,
    /// Any other caller-defined landmark.
    Named(String),
}

impl Landmark {
    /// Whether the landmark is computed rather than assigned.
    #[must_use]
    pub const fn is_derived(&self) -> bool {
        matches!(self, Self::Intersection)
    }

    /// Lowercase name used for display.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Reference => "reference",
            Self::Orientation => "orientation",
            Self::Intersection => "intersection",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
            Self::Named(name) => name,
        }
    }
}

impl std::fmt::Display for Landmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Landmark {
    fn from(name: String) -> Self {
        if let Some(raw) = name.strip_prefix(NAMED_PREFIX) {
            return Self::Named(raw.to_string());
        }
        match name.as_str() {
            "reference" => Self::Reference,
            "orientation" => Self::Orientation,
            "intersection" => Self::Intersection,
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::Named(name),
        }
    }
}

impl From<&str> for Landmark {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<Landmark> for String {
    fn from(landmark: Landmark) -> Self {
        match landmark {
            Landmark::Named(name) if is_reserved(&name) => format!("{NAMED_PREFIX}{name}"),
            Landmark::Named(name) => name,
            other => other.name().to_string(),
        }
    }
}

/// Marks a caller-defined name that would otherwise parse as something
/// else, so `Named("top")` survives a round trip through its string form.
const NAMED_PREFIX: &str = "named:";

fn is_reserved(name: &str) -> bool {
    name.starts_with(NAMED_PREFIX) || !matches!(Landmark::from(name), Landmark::Named(_))
}

/// Serializable form of a [`LandmarkMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkMapState {
    /// Length of the ring.
    pub len: usize,
    /// Stored landmark indices.
    #[serde(default)]
    pub indices: BTreeMap<Landmark, usize>,
}

/// Landmark-to-index map over a ring of fixed length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LandmarkMapState", into = "LandmarkMapState")]
pub struct LandmarkMap {
    len: usize,
    indices: BTreeMap<Landmark, usize>,
}

impl LandmarkMap {
    /// A map for a ring of `len` with the reference at index 0.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let mut indices = BTreeMap::new();
        indices.insert(Landmark::Reference, 0);
        Self { len, indices }
    }

    /// Rebuild a map from stored indices.
    ///
    /// A missing reference is placed at 0.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if any index is out of range.
    pub fn from_indices(len: usize, indices: BTreeMap<Landmark, usize>) -> Result<Self> {
        if let Some(&index) = indices.values().find(|&&i| i >= len) {
            return Err(ProfileError::InvalidIndex { index, len });
        }
        let mut map = Self { len, indices };
        map.indices.entry(Landmark::Reference).or_insert(0);
        Ok(map)
    }

    /// Length of the ring the indices refer to.
    #[must_use]
    pub const fn ring_len(&self) -> usize {
        self.len
    }

    /// Index of the reference landmark.
    #[must_use]
    pub fn reference(&self) -> usize {
        self.indices.get(&Landmark::Reference).copied().unwrap_or(0)
    }

    /// Index assigned to a landmark.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableLandmark`] if it is unassigned.
    pub fn get(&self, landmark: &Landmark) -> Result<usize> {
        self.indices
            .get(landmark)
            .copied()
            .ok_or_else(|| ProfileError::UnavailableLandmark(landmark.clone()))
    }

    /// Whether a landmark has an index.
    #[must_use]
    pub fn contains(&self, landmark: &Landmark) -> bool {
        self.indices.contains_key(landmark)
    }

    /// Assign a landmark.
    ///
    /// This is the raw store: it does not move any segments.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `index >= len` and
    /// [`ProfileError::DerivedLandmark`] for derived landmarks.
    pub fn set(&mut self, landmark: Landmark, index: usize) -> Result<()> {
        if landmark.is_derived() {
            return Err(ProfileError::DerivedLandmark(landmark));
        }
        self.assign(landmark, index)
    }

    /// Assign any landmark, derived ones included.
    pub(crate) fn assign(&mut self, landmark: Landmark, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(ProfileError::InvalidIndex {
                index,
                len: self.len,
            });
        }
        self.indices.insert(landmark, index);
        Ok(())
    }

    /// Remove a landmark. The reference cannot be removed.
    pub fn remove(&mut self, landmark: &Landmark) -> Option<usize> {
        if *landmark == Landmark::Reference {
            return None;
        }
        self.indices.remove(landmark)
    }

    /// `wrap(index(landmark) + k)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableLandmark`] if it is unassigned.
    pub fn offset_index(&self, landmark: &Landmark, k: isize) -> Result<usize> {
        Ok(ring::offset(self.get(landmark)?, k, self.len))
    }

    /// Position of an absolute index counted from a landmark.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableLandmark`] if it is unassigned
    /// and [`ProfileError::InvalidIndex`] if `index >= len`.
    pub fn relative_position(&self, landmark: &Landmark, index: usize) -> Result<usize> {
        if index >= self.len {
            return Err(ProfileError::InvalidIndex {
                index,
                len: self.len,
            });
        }
        Ok(ring::distance(self.get(landmark)?, index, self.len))
    }

    /// Landmarks and indices in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&Landmark, usize)> {
        self.indices.iter().map(|(k, &v)| (k, v))
    }

    /// The stored indices.
    #[must_use]
    pub const fn indices(&self) -> &BTreeMap<Landmark, usize> {
        &self.indices
    }

    /// Mirror every index for a reversed ring.
    pub fn reverse(&mut self) {
        let len = self.len;
        for index in self.indices.values_mut() {
            *index = ring::mirror(*index, len);
        }
    }
}

impl TryFrom<LandmarkMapState> for LandmarkMap {
    type Error = ProfileError;

    fn try_from(state: LandmarkMapState) -> Result<Self> {
        Self::from_indices(state.len, state.indices)
    }
}

impl From<LandmarkMap> for LandmarkMapState {
    fn from(map: LandmarkMap) -> Self {
        Self {
            len: map.len,
            indices: map.indices,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_map_has_reference_at_zero() {
        let map = LandmarkMap::new(100);
        assert_eq!(map.get(&Landmark::Reference).unwrap(), 0);
        assert_eq!(map.reference(), 0);
    }

    #[test]
    fn get_unassigned_is_typed_failure() {
        let map = LandmarkMap::new(100);
        assert_eq!(
            map.get(&Landmark::Orientation),
            Err(ProfileError::UnavailableLandmark(Landmark::Orientation))
        );
    }

    #[test]
    fn set_rejects_out_of_range() {
        let mut map = LandmarkMap::new(10);
        assert_eq!(
            map.set(Landmark::Top, 10),
            Err(ProfileError::InvalidIndex { index: 10, len: 10 })
        );
        map.set(Landmark::Top, 9).unwrap();
        assert_eq!(map.get(&Landmark::Top).unwrap(), 9);
    }

    #[test]
    fn derived_landmark_cannot_be_set() {
        let mut map = LandmarkMap::new(10);
        assert!(matches!(
            map.set(Landmark::Intersection, 2),
            Err(ProfileError::DerivedLandmark(_))
        ));
    }

    #[test]
    fn offset_and_relative_lookup_wrap() {
        let mut map = LandmarkMap::new(100);
        map.set(Landmark::Reference, 90).unwrap();
        assert_eq!(map.offset_index(&Landmark::Reference, 15).unwrap(), 5);
        assert_eq!(map.offset_index(&Landmark::Reference, -95).unwrap(), 95);
        assert_eq!(map.relative_position(&Landmark::Reference, 5).unwrap(), 15);
    }

    #[test]
    fn reference_cannot_be_removed() {
        let mut map = LandmarkMap::new(10);
        map.set(Landmark::Left, 3).unwrap();
        assert_eq!(map.remove(&Landmark::Reference), None);
        assert_eq!(map.remove(&Landmark::Left), Some(3));
        assert!(!map.contains(&Landmark::Left));
    }

    #[test]
    fn reverse_mirrors_indices() {
        let mut map = LandmarkMap::new(10);
        map.set(Landmark::Orientation, 3).unwrap();
        map.reverse();
        assert_eq!(map.get(&Landmark::Reference).unwrap(), 9);
        assert_eq!(map.get(&Landmark::Orientation).unwrap(), 6);
    }

    #[test]
    fn names_round_trip_through_strings() {
        assert_eq!(Landmark::from("top"), Landmark::Top);
        assert_eq!(
            Landmark::from("tail tip"),
            Landmark::Named("tail tip".to_string())
        );
        assert_eq!(String::from(Landmark::Orientation), "orientation");
    }

    #[test]
    fn named_landmark_with_reserved_name_keeps_its_identity() {
        for name in ["top", "reference", "named:hook", "hook"] {
            let named = Landmark::Named(name.to_string());
            let text = String::from(named.clone());
            assert_eq!(Landmark::from(text), named, "name {name}");
        }
        assert_eq!(String::from(Landmark::Named("top".to_string())), "named:top");
        assert_eq!(String::from(Landmark::Named("hook".to_string())), "hook");
        assert_eq!(Landmark::from("named:top"), Landmark::Named("top".to_string()));

        let json = serde_json::to_string(&Landmark::Named("left".to_string())).unwrap();
        let back: Landmark = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Landmark::Named("left".to_string()));
    }

    #[test]
    fn map_serializes_with_string_keys() {
        let mut map = LandmarkMap::new(10);
        map.set(Landmark::Named("hook".to_string()), 4).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.contains("\"hook\":4"));
        let back: LandmarkMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn deserializing_rejects_out_of_range_index() {
        let stored = r#"{"len":10,"indices":{"reference":0,"top":57}}"#;
        assert!(serde_json::from_str::<LandmarkMap>(stored).is_err());
        let stored = r#"{"len":10,"indices":{"top":7}}"#;
        let map: LandmarkMap = serde_json::from_str(stored).unwrap();
        assert_eq!(map.get(&Landmark::Top).unwrap(), 7);
        assert_eq!(map.reference(), 0);
    }

    #[test]
    fn from_indices_validates() {
        let mut raw = BTreeMap::new();
        raw.insert(Landmark::Top, 12);
        assert!(LandmarkMap::from_indices(10, raw).is_err());
        let map = LandmarkMap::from_indices(10, BTreeMap::new()).unwrap();
        assert_eq!(map.reference(), 0);
    }
}
