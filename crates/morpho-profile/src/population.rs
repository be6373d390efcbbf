//! Population comparison: medians, similarity ranking, composite profiles.
//!
//! A [`Population`] holds any number of [`Profileable`] members. Every
//! statistic is best-effort: a member that cannot produce the requested
//! profile (for example because the landmark is unassigned) is logged and
//! left out, and the statistic is computed over the rest.
//!
//! The per-member step (profile extraction, resampling, comparison) runs
//! on the rayon pool. Results that depend only on the members are cached
//! until a member is added or borrowed mutably.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::cache::StatsCache;
use crate::diagnostics::AggregateDiagnostics;
use crate::fit::fit_segments;
use crate::landmark::Landmark;
use crate::measure::ProfileKind;
use crate::outline::ProfiledOutline;
use crate::partition::SegmentPartition;
use crate::profile::Profile;
use crate::segmented::SegmentedProfile;
use crate::types::{EngineConfig, ProfileError, Result};

/// Anything that can hand out landmark-aligned segmented profiles.
pub trait Profileable {
    /// The profile of `kind` with `landmark` at index 0.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableLandmark`] if the landmark is
    /// not assigned.
    fn segmented_profile(&self, kind: ProfileKind, landmark: &Landmark) -> Result<SegmentedProfile>;

    /// Perimeter used to normalize variability.
    fn perimeter(&self) -> f64;

    /// Replace the segments with a partition expressed relative to
    /// `landmark`.
    ///
    /// # Errors
    ///
    /// Returns an error if the landmark is unassigned or the partition
    /// does not fit.
    fn apply_segments(&mut self, landmark: &Landmark, partition: SegmentPartition) -> Result<()>;

    /// Whether [`apply_segments`](Self::apply_segments) is ignored.
    fn is_locked(&self) -> bool {
        false
    }
}

impl Profileable for ProfiledOutline {
    fn segmented_profile(&self, kind: ProfileKind, landmark: &Landmark) -> Result<SegmentedProfile> {
        self.profile(kind, landmark)
    }

    fn perimeter(&self) -> f64 {
        Self::perimeter(self)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn apply_segments(&mut self, landmark: &Landmark, partition: SegmentPartition) -> Result<()> {
        let zero = self.landmark(landmark)?;
        self.edit_segments(|current| {
            *current = partition.nudged(zero as isize);
            Ok(())
        })
    }

    fn is_locked(&self) -> bool {
        Self::is_locked(self)
    }
}

/// A bare segmented profile with a perimeter, already aligned.
///
/// Useful when profiles come from elsewhere than an outline. It holds a
/// single profile, returned for every kind, and only knows
/// [`Landmark::Reference`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSample {
    profile: SegmentedProfile,
    perimeter: f64,
}

impl ProfileSample {
    /// Wrap a segmented profile.
    #[must_use]
    pub const fn new(profile: SegmentedProfile, perimeter: f64) -> Self {
        Self { profile, perimeter }
    }

    /// Wrap a profile with one all-covering segment.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] for a profile too short to
    /// partition.
    pub fn unsegmented(profile: Profile, perimeter: f64) -> Result<Self> {
        Ok(Self::new(SegmentedProfile::unsegmented(profile, 1)?, perimeter))
    }

    /// The wrapped profile.
    #[must_use]
    pub const fn profile(&self) -> &SegmentedProfile {
        &self.profile
    }
}

impl Profileable for ProfileSample {
    fn segmented_profile(&self, _kind: ProfileKind, landmark: &Landmark) -> Result<SegmentedProfile> {
        if *landmark != Landmark::Reference {
            return Err(ProfileError::UnavailableLandmark(landmark.clone()));
        }
        Ok(self.profile.clone())
    }

    fn perimeter(&self) -> f64 {
        self.perimeter
    }

    fn apply_segments(&mut self, landmark: &Landmark, partition: SegmentPartition) -> Result<()> {
        if *landmark != Landmark::Reference {
            return Err(ProfileError::UnavailableLandmark(landmark.clone()));
        }
        self.profile.set_partition(partition)
    }
}

/// Distance of one member from the population median.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    /// Member index.
    pub index: usize,
    /// Sum of squared differences to the median at the comparison length.
    pub difference: f64,
}

/// Size-normalized spread of one member around the median.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Variability {
    /// Member index.
    pub index: usize,
    /// `sqrt(difference) / perimeter`.
    pub score: f64,
}

/// Everything [`Population::aggregate`] computes.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSummary {
    /// Median profile at the comparison length.
    pub median: Arc<Profile>,
    /// Members in ascending difference order.
    pub ranking: Arc<Vec<Similarity>>,
    /// Variability per member, in member order.
    pub variability: Vec<Variability>,
    /// Timing and counts.
    pub diagnostics: AggregateDiagnostics,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StatKey {
    kind: ProfileKind,
    landmark: Landmark,
    quantile: u64,
}

impl StatKey {
    fn new(kind: ProfileKind, landmark: &Landmark, quantile: f64) -> Self {
        Self {
            kind,
            landmark: landmark.clone(),
            quantile: quantile.to_bits(),
        }
    }
}

/// A collection of individuals compared through their profiles.
#[derive(Debug)]
pub struct Population<T> {
    members: Vec<T>,
    config: EngineConfig,
    profiles: StatsCache<StatKey, Profile>,
    rankings: StatsCache<StatKey, Vec<Similarity>>,
}

impl<T: Profileable + Sync> Population<T> {
    /// An empty population.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidConfig`] for a bad configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::from_members(Vec::new(), config)
    }

    /// A population of the given members.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidConfig`] for a bad configuration.
    pub fn from_members(members: Vec<T>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            members,
            config,
            profiles: StatsCache::new(),
            rankings: StatsCache::new(),
        })
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The members.
    #[must_use]
    pub fn members(&self) -> &[T] {
        &self.members
    }

    /// Add a member, discarding cached statistics.
    pub fn push(&mut self, member: T) {
        self.members.push(member);
        self.invalidate();
    }

    /// Borrow a member mutably, discarding cached statistics.
    pub fn member_mut(&mut self, index: usize) -> Option<&mut T> {
        self.invalidate();
        self.members.get_mut(index)
    }

    /// Discard cached statistics.
    pub fn invalidate(&self) {
        self.profiles.clear();
        self.rankings.clear();
    }

    /// Every member's profile, aligned and resampled to the comparison
    /// length. Members that fail are logged and left out.
    fn aligned_profiles(&self, kind: ProfileKind, landmark: &Landmark) -> Vec<(usize, Profile)> {
        let len = self.config.comparison_length;
        self.members
            .par_iter()
            .enumerate()
            .filter_map(|(index, member)| {
                let profile = member
                    .segmented_profile(kind, landmark)
                    .and_then(|sp| sp.profile().interpolate(len));
                skip_failed(index, profile).map(|p| (index, p))
            })
            .collect()
    }

    /// Per-index quantile across every member's aligned profile.
    ///
    /// Quantiles interpolate linearly between order statistics, so `0.5`
    /// over an even count is the mean of the middle pair.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidFraction`] if `q` is outside
    /// `[0, 1]` and [`ProfileError::EmptyPopulation`] if no member could
    /// be profiled.
    pub fn quantile_profile(
        &self,
        kind: ProfileKind,
        landmark: &Landmark,
        q: f64,
    ) -> Result<Arc<Profile>> {
        if !(0.0..=1.0).contains(&q) {
            return Err(ProfileError::InvalidFraction(q));
        }
        self.profiles
            .get_or_try_insert(&StatKey::new(kind, landmark, q), || {
                let profiles = self.aligned_profiles(kind, landmark);
                if profiles.is_empty() {
                    return Err(ProfileError::EmptyPopulation);
                }
                let len = self.config.comparison_length;
                let values = (0..len)
                    .into_par_iter()
                    .map(|i| {
                        let mut column: Vec<f64> =
                            profiles.iter().map(|(_, p)| p.values()[i]).collect();
                        column.sort_by(f64::total_cmp);
                        quantile(&column, q)
                    })
                    .collect();
                tracing::debug!(%kind, %landmark, q, members = profiles.len(), "computed quantile profile");
                Profile::new(values)
            })
    }

    /// Per-index median across every member's aligned profile.
    ///
    /// # Errors
    ///
    /// As for [`quantile_profile`](Self::quantile_profile).
    pub fn median_profile(&self, kind: ProfileKind, landmark: &Landmark) -> Result<Arc<Profile>> {
        self.quantile_profile(kind, landmark, 0.5)
    }

    /// Members in ascending order of difference to the median, ties by
    /// member index. Members that fail are left out; an empty population
    /// ranks nobody.
    ///
    /// # Errors
    ///
    /// Propagates unexpected failures building the median.
    pub fn rank_by_similarity(
        &self,
        kind: ProfileKind,
        landmark: &Landmark,
    ) -> Result<Arc<Vec<Similarity>>> {
        self.rankings
            .get_or_try_insert(&StatKey::new(kind, landmark, 0.5), || {
                let median = match self.median_profile(kind, landmark) {
                    Ok(median) => median,
                    Err(ProfileError::EmptyPopulation) => return Ok(Vec::new()),
                    Err(e) => return Err(e),
                };
                let mut ranking: Vec<Similarity> = self
                    .aligned_profiles(kind, landmark)
                    .into_par_iter()
                    .map(|(index, profile)| Similarity {
                        index,
                        difference: profile.difference(&median),
                    })
                    .collect();
                ranking.sort_by(|a, b| {
                    a.difference
                        .total_cmp(&b.difference)
                        .then(a.index.cmp(&b.index))
                });
                Ok(ranking)
            })
    }

    /// Index of the member closest to the median, `None` if nobody could
    /// be ranked.
    ///
    /// # Errors
    ///
    /// As for [`rank_by_similarity`](Self::rank_by_similarity).
    pub fn most_similar(&self, kind: ProfileKind, landmark: &Landmark) -> Result<Option<usize>> {
        Ok(self
            .rank_by_similarity(kind, landmark)?
            .first()
            .map(|s| s.index))
    }

    /// `sqrt(difference to median) / perimeter` for every ranked member,
    /// in member order. Members with no usable perimeter are left out.
    ///
    /// # Errors
    ///
    /// As for [`rank_by_similarity`](Self::rank_by_similarity).
    pub fn normalized_variability(
        &self,
        kind: ProfileKind,
        landmark: &Landmark,
    ) -> Result<Vec<Variability>> {
        let ranking = self.rank_by_similarity(kind, landmark)?;
        let mut scores: Vec<Variability> = ranking
            .iter()
            .filter_map(|s| {
                let perimeter = self.members[s.index].perimeter();
                if perimeter.is_finite() && perimeter > 0.0 {
                    Some(Variability {
                        index: s.index,
                        score: s.difference.sqrt() / perimeter,
                    })
                } else {
                    tracing::warn!(member = s.index, perimeter, "skipping member without a usable perimeter");
                    None
                }
            })
            .collect();
        scores.sort_by_key(|v| v.index);
        Ok(scores)
    }

    /// Mean normalized variability, `0.0` when nothing could be scored.
    ///
    /// # Errors
    ///
    /// As for [`rank_by_similarity`](Self::rank_by_similarity).
    pub fn mean_variability(&self, kind: ProfileKind, landmark: &Landmark) -> Result<f64> {
        Ok(mean(
            self.normalized_variability(kind, landmark)?
                .iter()
                .map(|v| v.score),
        ))
    }

    /// [`composite_profile`] for every member against one template.
    /// Members that fail are left out.
    #[must_use]
    pub fn composite_profiles(
        &self,
        kind: ProfileKind,
        landmark: &Landmark,
        template: &SegmentPartition,
    ) -> Vec<(usize, SegmentedProfile)> {
        self.members
            .par_iter()
            .enumerate()
            .filter_map(|(index, member)| {
                let composite = member
                    .segmented_profile(kind, landmark)
                    .and_then(|sp| composite_profile(&sp, template));
                skip_failed(index, composite).map(|c| (index, c))
            })
            .collect()
    }

    /// Fit `template`'s segments onto every member and apply them.
    ///
    /// Fitting runs in parallel; applying is sequential. Locked members
    /// are left alone. Returns how many members were updated.
    pub fn assign_segments(
        &mut self,
        kind: ProfileKind,
        landmark: &Landmark,
        template: &SegmentedProfile,
    ) -> usize {
        let config = self.config.clone();
        let fitted: Vec<(usize, SegmentPartition)> = self
            .members
            .par_iter()
            .enumerate()
            .filter(|(index, member)| {
                if member.is_locked() {
                    tracing::debug!(member = index, "member is locked, not assigning segments");
                }
                !member.is_locked()
            })
            .filter_map(|(index, member)| {
                let partition = member
                    .segmented_profile(kind, landmark)
                    .and_then(|sp| fit_segments(template, sp.profile(), &config));
                skip_failed(index, partition).map(|p| (index, p))
            })
            .collect();

        let mut applied = 0;
        for (index, partition) in fitted {
            let result = self.members[index].apply_segments(landmark, partition);
            if skip_failed(index, result).is_some() {
                applied += 1;
            }
        }
        self.invalidate();
        tracing::debug!(applied, members = self.members.len(), "assigned segments");
        applied
    }

    /// Median, ranking and variability in one pass, with diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::EmptyPopulation`] if no member could be
    /// profiled.
    pub fn aggregate(&self, kind: ProfileKind, landmark: &Landmark) -> Result<PopulationSummary> {
        let start = Instant::now();

        let t0 = Instant::now();
        let median = self.median_profile(kind, landmark)?;
        let median_duration = t0.elapsed();

        let t1 = Instant::now();
        let ranking = self.rank_by_similarity(kind, landmark)?;
        let ranking_duration = t1.elapsed();

        let t2 = Instant::now();
        let variability = self.normalized_variability(kind, landmark)?;
        let variability_duration = t2.elapsed();

        let best = ranking.first().copied();
        let diagnostics = AggregateDiagnostics {
            kind,
            landmark: landmark.to_string(),
            comparison_length: self.config.comparison_length,
            members: self.members.len(),
            ranked: ranking.len(),
            skipped: self.members.len() - ranking.len(),
            most_similar: best.map(|s| s.index),
            best_difference: best.map(|s| s.difference),
            mean_variability: mean(variability.iter().map(|v| v.score)),
            max_variability: variability.iter().map(|v| v.score).fold(0.0, f64::max),
            median_duration,
            ranking_duration,
            variability_duration,
            total_duration: start.elapsed(),
        };

        Ok(PopulationSummary {
            median,
            ranking,
            variability,
            diagnostics,
        })
    }
}

/// Build a profile whose segments match `template` exactly.
///
/// For each template segment, the individual's segment with the same id
/// is stretched to the template segment's length and written at the
/// template segment's position. The result carries the template's
/// partition, so individuals of different raw length can be compared
/// position by position.
///
/// # Errors
///
/// Returns [`ProfileError::LengthMismatch`] if the two partitions do not
/// have the same segment ids.
pub fn composite_profile(
    individual: &SegmentedProfile,
    template: &SegmentPartition,
) -> Result<SegmentedProfile> {
    let mut ours = individual.partition().ids();
    let mut theirs = template.ids();
    ours.sort_unstable();
    theirs.sort_unstable();
    if ours != theirs {
        return Err(ProfileError::LengthMismatch(format!(
            "segment ids differ: {} in the individual, {} in the template",
            ours.len(),
            theirs.len()
        )));
    }

    let total = template.total();
    let mut values = vec![0.0; total];
    for segment in template.segments() {
        let source = individual.segment_values(segment.id())?;
        for (j, v) in stretch(source.values(), segment.len()).into_iter().enumerate() {
            values[(segment.start() + j) % total] = v;
        }
    }
    SegmentedProfile::new(Profile::from_finite(values), template.clone())
}

/// Linear resampling of an open run of values onto `len` points, keeping
/// both end values.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn stretch(values: &[f64], len: usize) -> Vec<f64> {
    let n = values.len();
    if n == len {
        return values.to_vec();
    }
    if n == 1 || len == 1 {
        return vec![values[0]; len];
    }
    let ratio = (n - 1) as f64 / (len - 1) as f64;
    (0..len)
        .map(|i| {
            let position = i as f64 * ratio;
            let lower = (position.floor() as usize).min(n - 1);
            let upper = (lower + 1).min(n - 1);
            let fraction = position - lower as f64;
            (values[upper] - values[lower]).mul_add(fraction, values[lower])
        })
        .collect()
}

/// Quantile of sorted values by linear interpolation, `0.0` if empty.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let position = q * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let fraction = position - lower as f64;
            (sorted[upper] - sorted[lower]).mul_add(fraction, sorted[lower])
        }
    }
}

/// Arithmetic mean, `0.0` for no values.
#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn skip_failed<V>(index: usize, result: Result<V>) -> Option<V> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(member = index, %error, "skipping member");
            None
        }
    }
}
