//! A profile together with the partition that divides it.

use serde::Serialize;

use crate::partition::SegmentPartition;
use crate::profile::Profile;
use crate::segment::SegmentId;
use crate::types::{ProfileError, Result};

/// A [`Profile`] and a [`SegmentPartition`] over the same ring.
///
/// The two always have the same length. Views such as
/// [`offset`](Self::offset) transform both together so that segment
/// ranges keep pointing at the same values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedProfile {
    profile: Profile,
    partition: SegmentPartition,
}

impl SegmentedProfile {
    /// Pair a profile with a partition.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if the partition does not
    /// cover exactly the profile's length.
    pub fn new(profile: Profile, partition: SegmentPartition) -> Result<Self> {
        if profile.len() != partition.total() {
            return Err(ProfileError::LengthMismatch(format!(
                "profile of length {} paired with partition over {}",
                profile.len(),
                partition.total()
            )));
        }
        Ok(Self { profile, partition })
    }

    /// A profile with a single all-covering segment.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if the profile is shorter
    /// than the minimum partition length.
    pub fn unsegmented(profile: Profile, min_length: usize) -> Result<Self> {
        let partition = SegmentPartition::new(profile.len(), min_length)?;
        Ok(Self { profile, partition })
    }

    /// The values.
    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    /// The segments.
    #[must_use]
    pub const fn partition(&self) -> &SegmentPartition {
        &self.partition
    }

    /// Replace the partition.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] on a length mismatch.
    pub fn set_partition(&mut self, partition: SegmentPartition) -> Result<()> {
        if partition.total() != self.profile.len() {
            return Err(ProfileError::LengthMismatch(format!(
                "partition over {} does not fit profile of length {}",
                partition.total(),
                self.profile.len()
            )));
        }
        self.partition = partition;
        Ok(())
    }

    /// Split into parts.
    #[must_use]
    pub fn into_parts(self) -> (Profile, SegmentPartition) {
        (self.profile, self.partition)
    }

    /// Ring length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.profile.len()
    }

    /// Always `false`; profiles are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.profile.is_empty()
    }

    /// Rotate so index 0 holds the old value at `k`; segment boundaries
    /// move by `-k` so each segment still covers the same values.
    #[must_use]
    pub fn offset(&self, k: isize) -> Self {
        Self {
            profile: self.profile.offset(k),
            partition: self.partition.nudged(-k),
        }
    }

    /// Resample both the values and the segment boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if `new_len` is too short
    /// for the profile or for the current segments.
    pub fn interpolated(&self, new_len: usize) -> Result<Self> {
        Ok(Self {
            profile: self.profile.interpolate(new_len)?,
            partition: self.partition.interpolated(new_len)?,
        })
    }

    /// Reverse both values and segments.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            profile: self.profile.reversed(),
            partition: self.partition.reversed(),
        }
    }

    /// Values covered by one segment, in ring order.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id.
    pub fn segment_values(&self, id: SegmentId) -> Result<Profile> {
        let segment = self.partition.segment(id)?;
        self.profile.subregion(segment.start(), segment.end())
    }

    /// Sum of squared differences between the value series.
    #[must_use]
    pub fn difference(&self, other: &Self) -> f64 {
        self.profile.difference(&other.profile)
    }
}
