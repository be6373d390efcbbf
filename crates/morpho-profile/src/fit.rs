//! Fitting a template segmentation onto another profile.
//!
//! The template is first rescaled to the target's length. Each segment
//! start is then tried at every position within the search radius, and
//! the position giving the lowest total difference between template and
//! target segment values is kept. Boundaries are visited once, in ring
//! order, so each move sees the moves before it.

use crate::partition::SegmentPartition;
use crate::profile::Profile;
use crate::ring;
use crate::segment::SegmentId;
use crate::segmented::SegmentedProfile;
use crate::types::{EngineConfig, Result};

/// Place `template`'s segments on `target`.
///
/// The result covers `target` and keeps the template's segment ids and
/// locks. Locked segments and boundaries next to them do not move.
///
/// # Errors
///
/// Returns [`ProfileError::LengthMismatch`](crate::types::ProfileError::LengthMismatch) if the template's segments
/// cannot be rescaled to the target's length.
#[allow(clippy::cast_possible_wrap)]
pub fn fit_segments(
    template: &SegmentedProfile,
    target: &Profile,
    config: &EngineConfig,
) -> Result<SegmentPartition> {
    let scaled = template.interpolated(target.len())?;
    let mut partition = scaled.partition().clone();
    if partition.len() < 2 {
        return Ok(partition);
    }

    let locked = partition.is_locked();
    partition.set_locked(false);
    let references = partition
        .ids()
        .into_iter()
        .map(|id| Ok((id, scaled.segment_values(id)?)))
        .collect::<Result<Vec<_>>>()?;
    let mut best_score = score(&partition, &references, target)?;

    let radius = config.fit_search_radius as isize;
    for id in partition.ids() {
        let start = partition.segment(id)?.start();
        let mut best_start = start;
        for step in -radius..=radius {
            if step == 0 {
                continue;
            }
            let candidate = ring::offset(start, step, target.len());
            let mut trial = partition.clone();
            if trial.adjust_start(id, candidate).is_err() {
                continue;
            }
            let trial_score = score(&trial, &references, target)?;
            if trial_score < best_score {
                best_score = trial_score;
                best_start = candidate;
                partition = trial;
            }
        }
        tracing::trace!(%id, from = start, to = best_start, score = best_score, "fitted boundary");
    }

    partition.set_locked(locked);
    Ok(partition)
}

fn score(
    partition: &SegmentPartition,
    references: &[(SegmentId, Profile)],
    target: &Profile,
) -> Result<f64> {
    references.iter().try_fold(0.0, |total, (id, reference)| {
        let segment = partition.segment(*id)?;
        let values = target.subregion(segment.start(), segment.end())?;
        Ok(total + reference.difference(&values))
    })
}
