//! A profiled outline: one boundary with its profiles, landmarks and
//! segments kept in step.
//!
//! [`ProfiledOutline`] owns the only copy of each piece of state and
//! applies the cross-cutting rules between them:
//!
//! - moving [`Landmark::Reference`] nudges every segment boundary by the
//!   same delta, so segments keep their meaning relative to the new zero;
//! - moving [`Landmark::Orientation`] recomputes
//!   [`Landmark::Intersection`] as the opposite point;
//! - reversal mirrors boundary, profiles, landmarks and segments together.
//!
//! Segment boundaries are stored as absolute boundary indices. Callers
//! see them relative to a landmark through
//! [`profile`](ProfiledOutline::profile) and
//! [`segments_from`](ProfiledOutline::segments_from).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::boundary::Boundary;
use crate::landmark::{Landmark, LandmarkMap};
use crate::measure::{ProfileKind, ProfileMeasure, window_size};
use crate::partition::{PartitionState, SegmentPartition};
use crate::profile::Profile;
use crate::segmented::SegmentedProfile;
use crate::types::{EngineConfig, Point, ProfileError, Result};

/// One closed outline with its derived profiles, landmarks and segments.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfiledOutline {
    boundary: Boundary,
    window_proportion: f64,
    profiles: BTreeMap<ProfileKind, Profile>,
    landmarks: LandmarkMap,
    partition: SegmentPartition,
    locked: bool,
}

impl ProfiledOutline {
    /// Build an outline from a ring of points, measuring every profile
    /// kind and starting with one all-covering segment.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidConfig`] for a bad configuration and
    /// [`ProfileError::DegenerateBoundary`] or
    /// [`ProfileError::InvalidValue`] for unusable points.
    pub fn new(points: Vec<Point>, config: &EngineConfig) -> Result<Self> {
        Self::from_boundary(Boundary::new(points)?, config)
    }

    /// Build an outline from an existing boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidConfig`] for a bad configuration.
    pub fn from_boundary(boundary: Boundary, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let len = boundary.len();
        let window = window_size(len, config.window_proportion);
        let profiles = ProfileKind::ALL
            .iter()
            .map(|&kind| (kind, kind.measure(&boundary, window)))
            .collect();
        tracing::debug!(points = len, window, "built outline");
        Ok(Self {
            window_proportion: config.window_proportion,
            profiles,
            landmarks: LandmarkMap::new(len),
            partition: SegmentPartition::new(len, config.min_segment_length)?,
            locked: false,
            boundary,
        })
    }

    /// The outline points.
    #[must_use]
    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Number of boundary points, which is also every profile's length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.boundary.len()
    }

    /// Always `false`; boundaries have at least three points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.boundary.is_empty()
    }

    /// Perimeter of the outline.
    #[must_use]
    pub const fn perimeter(&self) -> f64 {
        self.boundary.perimeter()
    }

    /// Angle window proportion the profiles were measured with.
    #[must_use]
    pub const fn window_proportion(&self) -> f64 {
        self.window_proportion
    }

    /// Angle window in points.
    #[must_use]
    pub fn window_size(&self) -> usize {
        window_size(self.len(), self.window_proportion)
    }

    /// Whether landmark and segment changes are ignored.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock or unlock the outline.
    pub const fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// The landmark map.
    #[must_use]
    pub const fn landmarks(&self) -> &LandmarkMap {
        &self.landmarks
    }

    /// Absolute index of a landmark.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableLandmark`] if it is unassigned.
    pub fn landmark(&self, landmark: &Landmark) -> Result<usize> {
        self.landmarks.get(landmark)
    }

    /// The stored profile of a kind, indexed from boundary point 0.
    #[must_use]
    pub fn raw_profile(&self, kind: ProfileKind) -> Option<&Profile> {
        self.profiles.get(&kind)
    }

    /// The segments in absolute boundary indices.
    #[must_use]
    pub const fn segments(&self) -> &SegmentPartition {
        &self.partition
    }

    /// The segments with `landmark` at index 0.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableLandmark`] if it is unassigned.
    #[allow(clippy::cast_possible_wrap)]
    pub fn segments_from(&self, landmark: &Landmark) -> Result<SegmentPartition> {
        let zero = self.landmarks.get(landmark)?;
        Ok(self.partition.nudged(-(zero as isize)))
    }

    /// A profile and its segments, rotated so that `landmark` is index 0.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableLandmark`] if the landmark is
    /// unassigned.
    #[allow(clippy::cast_possible_wrap)]
    pub fn profile(&self, kind: ProfileKind, landmark: &Landmark) -> Result<SegmentedProfile> {
        let zero = self.landmarks.get(landmark)?;
        let profile = match self.profiles.get(&kind) {
            Some(profile) => profile.clone(),
            None => kind.measure(&self.boundary, self.window_size()),
        };
        Ok(SegmentedProfile::new(profile, self.partition.clone())?.offset(zero as isize))
    }

    /// Assign a landmark, applying the reference and orientation rules.
    ///
    /// Does nothing while the outline is locked.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::DerivedLandmark`] for
    /// [`Landmark::Intersection`] and [`ProfileError::InvalidIndex`] for an
    /// index outside the boundary.
    #[allow(clippy::cast_possible_wrap)]
    pub fn set_landmark(&mut self, landmark: Landmark, index: usize) -> Result<()> {
        if self.locked {
            tracing::debug!(%landmark, index, "outline is locked, ignoring landmark move");
            return Ok(());
        }
        match landmark {
            Landmark::Reference => {
                let old = self.landmarks.reference();
                self.landmarks.set(Landmark::Reference, index)?;
                self.partition.nudge(index as isize - old as isize);
                tracing::debug!(old, new = index, "moved reference point");
            }
            Landmark::Orientation => {
                self.landmarks.set(Landmark::Orientation, index)?;
                self.update_intersection()?;
            }
            other => self.landmarks.set(other, index)?,
        }
        Ok(())
    }

    /// Remove a landmark. The reference cannot be removed; removing the
    /// orientation point also removes its intersection.
    pub fn remove_landmark(&mut self, landmark: &Landmark) -> Option<usize> {
        if self.locked {
            return None;
        }
        if *landmark == Landmark::Orientation {
            self.landmarks.remove(&Landmark::Intersection);
        }
        self.landmarks.remove(landmark)
    }

    fn update_intersection(&mut self) -> Result<()> {
        if let Ok(orientation) = self.landmarks.get(&Landmark::Orientation) {
            let opposite = self.boundary.opposite_index(orientation)?;
            self.landmarks.assign(Landmark::Intersection, opposite)?;
        }
        Ok(())
    }

    /// Replace the segments with a partition expressed relative to the
    /// reference point.
    ///
    /// Does nothing while the outline is locked.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if the partition does not
    /// cover the boundary.
    #[allow(clippy::cast_possible_wrap)]
    pub fn set_segments(&mut self, partition: SegmentPartition) -> Result<()> {
        if self.locked {
            tracing::debug!("outline is locked, ignoring new segments");
            return Ok(());
        }
        if partition.total() != self.len() {
            return Err(ProfileError::LengthMismatch(format!(
                "partition over {} does not fit an outline of {} points",
                partition.total(),
                self.len()
            )));
        }
        self.partition = partition.nudged(self.landmarks.reference() as isize);
        Ok(())
    }

    /// Apply an edit to the segments in absolute indices.
    ///
    /// The edit runs on a copy; the result replaces the current partition
    /// only if the edit succeeds and the length is unchanged. Does nothing
    /// while the outline is locked.
    ///
    /// # Errors
    ///
    /// Propagates the edit's error, or returns
    /// [`ProfileError::LengthMismatch`] if the edit changed the length.
    pub fn edit_segments(
        &mut self,
        edit: impl FnOnce(&mut SegmentPartition) -> Result<()>,
    ) -> Result<()> {
        if self.locked {
            tracing::debug!("outline is locked, ignoring segment edit");
            return Ok(());
        }
        let mut partition = self.partition.clone();
        edit(&mut partition)?;
        if partition.total() != self.len() {
            return Err(ProfileError::LengthMismatch(format!(
                "segment edit changed the length from {} to {}",
                self.len(),
                partition.total()
            )));
        }
        self.partition = partition;
        Ok(())
    }

    /// Change the angle window and remeasure the angle profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidConfig`] if `proportion` is not in
    /// `(0, 1)`.
    pub fn set_window_proportion(&mut self, proportion: f64) -> Result<()> {
        if !(proportion > 0.0 && proportion < 1.0) {
            return Err(ProfileError::InvalidConfig(format!(
                "window_proportion must be in (0, 1), got {proportion}"
            )));
        }
        self.window_proportion = proportion;
        let window = self.window_size();
        self.profiles.insert(
            ProfileKind::Angle,
            ProfileKind::Angle.measure(&self.boundary, window),
        );
        Ok(())
    }

    /// Invert the ring order of the whole outline.
    ///
    /// Boundary, profiles, landmarks and segments are mirrored together,
    /// and the intersection point is recomputed. Does nothing while the
    /// outline is locked.
    ///
    /// # Errors
    ///
    /// Propagates a failure to recompute the intersection point.
    pub fn reverse(&mut self) -> Result<()> {
        if self.locked {
            tracing::debug!("outline is locked, ignoring reversal");
            return Ok(());
        }
        self.boundary.reverse();
        for profile in self.profiles.values_mut() {
            profile.reverse();
        }
        self.landmarks.reverse();
        self.partition = self.partition.reversed();
        self.update_intersection()
    }

    /// Minimal persistent state.
    ///
    /// Stored profile values are included when `with_profiles` is set.
    #[must_use]
    pub fn to_state(&self, with_profiles: bool) -> OutlineState {
        OutlineState {
            points: self.boundary.points().to_vec(),
            window_proportion: self.window_proportion,
            landmarks: self.landmarks.indices().clone(),
            partition: self.partition.to_state(),
            locked: self.locked,
            profiles: if with_profiles {
                self.profiles
                    .iter()
                    .map(|(&kind, profile)| (kind, profile.values().to_vec()))
                    .collect()
            } else {
                BTreeMap::new()
            },
        }
    }

    /// Rebuild from persistent state.
    ///
    /// Stored profiles are used as-is and landmarks, including the
    /// intersection point, are taken verbatim. Only kinds with no stored
    /// values are measured.
    ///
    /// # Errors
    ///
    /// Returns an error if the points are unusable, an index is out of
    /// range, the segments do not tile the boundary, or a stored profile
    /// has the wrong length.
    pub fn from_state(state: OutlineState) -> Result<Self> {
        let boundary = Boundary::new(state.points)?;
        let len = boundary.len();
        let landmarks = LandmarkMap::from_indices(len, state.landmarks)?;
        let partition = SegmentPartition::try_from(state.partition)?;
        if partition.total() != len {
            return Err(ProfileError::LengthMismatch(format!(
                "stored segments cover {} of {len} points",
                partition.total()
            )));
        }
        let window = window_size(len, state.window_proportion);
        let mut stored = state.profiles;
        let profiles = ProfileKind::ALL
            .iter()
            .map(|&kind| {
                let profile = match stored.remove(&kind) {
                    Some(values) if values.len() == len => Profile::new(values)?,
                    Some(values) => {
                        return Err(ProfileError::LengthMismatch(format!(
                            "stored {kind} profile has {} values for {len} points",
                            values.len()
                        )));
                    }
                    None => kind.measure(&boundary, window),
                };
                Ok((kind, profile))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            boundary,
            window_proportion: state.window_proportion,
            profiles,
            landmarks,
            partition,
            locked: state.locked,
        })
    }
}

/// Serializable minimal state of a [`ProfiledOutline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineState {
    /// Outline points in ring order.
    pub points: Vec<Point>,
    /// Angle window proportion.
    pub window_proportion: f64,
    /// Landmark indices.
    pub landmarks: BTreeMap<Landmark, usize>,
    /// Segments and their history in absolute indices.
    pub partition: PartitionState,
    /// Outline lock.
    #[serde(default)]
    pub locked: bool,
    /// Stored profile values by kind.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<ProfileKind, Vec<f64>>,
}
