//! Segment partitions: ordered rings of segments that tile a profile.
//!
//! A [`SegmentPartition`] holds its segments in ring order in a single
//! `Vec`. Neighbours are positional (`pos ± 1 mod count`), so there are no
//! link fields to keep in sync. Every mutation keeps three invariants:
//!
//! - the segments tile `[0, total)` with no gap and no overlap,
//! - each segment's `end` is its successor's `start`,
//! - every segment covers at least `min_length` indices (a lone segment
//!   covering the whole ring is exempt).
//!
//! Merge and split history is kept beside the segments as plain records
//! keyed by segment id, so that merges can be undone without segments
//! holding references to each other.
//!
//! A locked partition ignores every mutating call and returns `Ok(())`.
//! The pure companions [`nudged`](SegmentPartition::nudged),
//! [`reversed`](SegmentPartition::reversed) and
//! [`interpolated`](SegmentPartition::interpolated) build new views and
//! are unaffected by the lock.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profile::MIN_PROFILE_LENGTH;
use crate::ring;
use crate::segment::{Segment, SegmentId};
use crate::types::{ProfileError, Result};

/// The segments a merged segment replaced, in ring order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    /// The merged segment.
    pub merged: SegmentId,
    /// The segments it replaced.
    pub sources: Vec<Segment>,
}

/// The segment a split replaced and the two parts it became.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRecord {
    /// The segment as it was when split.
    pub original: Segment,
    /// The two replacement segments, in ring order.
    pub parts: [SegmentId; 2],
}

/// Serializable form of a [`SegmentPartition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Profile length the segments cover.
    pub total: usize,
    /// Minimum segment length.
    pub min_length: usize,
    /// Segments in ring order.
    pub segments: Vec<Segment>,
    /// Merge history.
    #[serde(default)]
    pub merges: Vec<MergeRecord>,
    /// Split history.
    #[serde(default)]
    pub splits: Vec<SplitRecord>,
    /// Whether mutations are ignored.
    #[serde(default)]
    pub locked: bool,
}

/// An ordered ring of segments exactly covering a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PartitionState", into = "PartitionState")]
pub struct SegmentPartition {
    total: usize,
    min_length: usize,
    segments: Vec<Segment>,
    merges: BTreeMap<SegmentId, Vec<Segment>>,
    splits: BTreeMap<SegmentId, SplitRecord>,
    locked: bool,
}

macro_rules! skip_if_locked {
    ($self:ident, $operation:literal) => {
        if $self.locked {
            tracing::debug!(operation = $operation, "partition is locked, ignoring");
            return Ok(());
        }
    };
}

impl SegmentPartition {
    /// A partition of one segment covering the whole ring.
    ///
    /// A `min_length` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if `total` is below
    /// [`MIN_PROFILE_LENGTH`].
    pub fn new(total: usize, min_length: usize) -> Result<Self> {
        check_total(total)?;
        Ok(Self {
            total,
            min_length: min_length.max(1),
            segments: vec![Segment::new(SegmentId::DEFAULT, 0, 0, total)?],
            merges: BTreeMap::new(),
            splits: BTreeMap::new(),
            locked: false,
        })
    }

    /// A partition with segment boundaries at `starts`, which must be
    /// strictly increasing. Segments get ids `0..starts.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] for a start outside the ring
    /// and [`ProfileError::SegmentUpdateRejected`] if the boundaries are
    /// unordered or produce a segment below the minimum length.
    pub fn from_starts(total: usize, min_length: usize, starts: &[usize]) -> Result<Self> {
        check_total(total)?;
        if starts.is_empty() {
            return Self::new(total, min_length);
        }
        if starts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ProfileError::SegmentUpdateRejected(
                "segment starts must be strictly increasing".to_string(),
            ));
        }
        let segments = starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts[(i + 1) % starts.len()];
                Segment::new(SegmentId::new(i as u64), start, end, total)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_segments(total, min_length, segments)
    }

    /// A partition from segments already in ring order.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::SegmentUpdateRejected`] if the segments do
    /// not tile the ring, fall below the minimum length, or reuse an id.
    pub fn from_segments(total: usize, min_length: usize, segments: Vec<Segment>) -> Result<Self> {
        check_total(total)?;
        let partition = Self {
            total,
            min_length: min_length.max(1),
            segments,
            merges: BTreeMap::new(),
            splits: BTreeMap::new(),
            locked: false,
        };
        partition.validate()?;
        Ok(partition)
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::SegmentUpdateRejected`] describing the first
    /// violation found.
    pub fn validate(&self) -> Result<()> {
        let count = self.segments.len();
        if count == 0 {
            return Err(rejected("a partition needs at least one segment"));
        }
        for segment in &self.segments {
            if segment.total() != self.total
                || segment.start() >= self.total
                || segment.end() >= self.total
            {
                return Err(rejected(format!(
                    "segment {} does not belong to a ring of {}",
                    segment.id(),
                    self.total
                )));
            }
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if self.segments[i + 1..].iter().any(|s| s.id() == segment.id()) {
                return Err(rejected(format!("segment id {} is used twice", segment.id())));
            }
        }
        if count == 1 {
            let only = &self.segments[0];
            if only.start() != only.end() {
                return Err(rejected("a lone segment must cover the whole ring"));
            }
            return Ok(());
        }
        let mut covered = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            let next = &self.segments[(i + 1) % count];
            if segment.end() != next.start() {
                return Err(rejected(format!(
                    "segment {} ends at {} but {} starts at {}",
                    segment.id(),
                    segment.end(),
                    next.id(),
                    next.start()
                )));
            }
            if segment.start() == segment.end() {
                return Err(rejected(format!("segment {} is empty", segment.id())));
            }
            if segment.len() < self.min_length {
                return Err(rejected(format!(
                    "segment {} has length {}, minimum is {}",
                    segment.id(),
                    segment.len(),
                    self.min_length
                )));
            }
            covered += segment.len();
        }
        if covered != self.total {
            return Err(rejected(format!(
                "segments cover {covered} indices of {}",
                self.total
            )));
        }
        Ok(())
    }

    // --- Queries ---

    /// Length of the profile covered.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Minimum segment length enforced by every mutation.
    #[must_use]
    pub const fn min_length(&self) -> usize {
        self.min_length
    }

    /// Number of segments.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; a partition has at least one segment.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments in ring order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment ids in ring order.
    #[must_use]
    pub fn ids(&self) -> Vec<SegmentId> {
        self.segments.iter().map(Segment::id).collect()
    }

    /// Segment start indices in ring order.
    #[must_use]
    pub fn starts(&self) -> Vec<usize> {
        self.segments.iter().map(Segment::start).collect()
    }

    /// Whether the partition ignores mutations.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock or unlock the partition.
    pub const fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Lock or unlock a single segment against [`update`](Self::update).
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id.
    pub fn set_segment_locked(&mut self, id: SegmentId, locked: bool) -> Result<()> {
        let pos = self.position_of(id)?;
        self.segments[pos].set_locked(locked);
        Ok(())
    }

    /// Whether a segment with this id is present.
    #[must_use]
    pub fn contains_id(&self, id: SegmentId) -> bool {
        self.segments.iter().any(|s| s.id() == id)
    }

    /// Position of a segment in ring order.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id.
    pub fn position_of(&self, id: SegmentId) -> Result<usize> {
        self.segments
            .iter()
            .position(|s| s.id() == id)
            .ok_or(ProfileError::UnavailableSegment(id))
    }

    /// Segment by id.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id.
    pub fn segment(&self, id: SegmentId) -> Result<&Segment> {
        let pos = self.position_of(id)?;
        Ok(&self.segments[pos])
    }

    /// Segment at a ring position.
    #[must_use]
    pub fn segment_at(&self, position: usize) -> Option<&Segment> {
        self.segments.get(position)
    }

    /// The segment following `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id.
    pub fn next_of(&self, id: SegmentId) -> Result<&Segment> {
        let pos = self.position_of(id)?;
        Ok(&self.segments[(pos + 1) % self.segments.len()])
    }

    /// The segment preceding `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id.
    pub fn prev_of(&self, id: SegmentId) -> Result<&Segment> {
        let pos = self.position_of(id)?;
        let count = self.segments.len();
        Ok(&self.segments[(pos + count - 1) % count])
    }

    /// Display name `Seg_<position>`, counted from the segment holding
    /// index 0.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id.
    pub fn name_of(&self, id: SegmentId) -> Result<String> {
        let ordered = self.ordered_from(0)?;
        let position = ordered
            .iter()
            .position(|s| s.id() == id)
            .ok_or(ProfileError::UnavailableSegment(id))?;
        Ok(format!("Seg_{position}"))
    }

    /// The segment covering an index.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `index >= total`.
    pub fn segment_containing(&self, index: usize) -> Result<&Segment> {
        self.segments
            .iter()
            .find(|s| s.contains(index))
            .ok_or(ProfileError::InvalidIndex {
                index,
                len: self.total,
            })
    }

    /// All segments in ring order, beginning with the one covering `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `index >= total`.
    pub fn ordered_from(&self, index: usize) -> Result<Vec<Segment>> {
        let first = self.segment_containing(index)?.id();
        self.segments_from(first)
    }

    /// All segments in ring order, beginning with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id.
    pub fn segments_from(&self, id: SegmentId) -> Result<Vec<Segment>> {
        let pos = self.position_of(id)?;
        let mut ordered = self.segments.clone();
        ordered.rotate_left(pos);
        Ok(ordered)
    }

    /// Segments a merged segment replaced, if it was formed by a merge.
    #[must_use]
    pub fn merge_sources(&self, id: SegmentId) -> Option<&[Segment]> {
        self.merges.get(&id).map(Vec::as_slice)
    }

    /// The record of a split, keyed by the id of the segment that was split.
    #[must_use]
    pub fn split_record(&self, original: SegmentId) -> Option<&SplitRecord> {
        self.splits.get(&original)
    }

    /// An id not used by any segment or history record.
    #[must_use]
    pub fn fresh_id(&self) -> SegmentId {
        let in_segments = self.segments.iter().map(|s| s.id().get());
        let in_merges = self
            .merges
            .iter()
            .flat_map(|(id, sources)| std::iter::once(id.get()).chain(sources.iter().map(|s| s.id().get())));
        let in_splits = self.splits.values().flat_map(|r| {
            [r.original.id().get(), r.parts[0].get(), r.parts[1].get()]
        });
        let max = in_segments.chain(in_merges).chain(in_splits).max().unwrap_or(0);
        SegmentId::new(max + 1)
    }

    // --- Split / merge ---

    /// Whether [`split`](Self::split) would accept `at` for this segment.
    #[must_use]
    pub fn is_splittable(&self, id: SegmentId, at: usize) -> bool {
        let Ok(segment) = self.segment(id) else {
            return false;
        };
        at < self.total
            && at != segment.start()
            && segment.contains(at)
            && ring::span(segment.start(), at, self.total) >= self.min_length
            && ring::span(at, segment.end(), self.total) >= self.min_length
    }

    /// Replace a segment with two covering `[start, at)` and `[at, end)`.
    ///
    /// The split is recorded under the original id so
    /// [`unsplit`](Self::unsplit) can restore it.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id and
    /// [`ProfileError::SegmentUpdateRejected`] if `at` is not strictly
    /// inside the segment, either part would be too short, or a new id is
    /// already in use.
    pub fn split(&mut self, id: SegmentId, at: usize, new_ids: (SegmentId, SegmentId)) -> Result<()> {
        skip_if_locked!(self, "split");
        let pos = self.position_of(id)?;
        let (first_id, second_id) = new_ids;
        if first_id == second_id {
            return Err(rejected("split parts need distinct ids"));
        }
        for new_id in [first_id, second_id] {
            if self.contains_id(new_id) {
                return Err(rejected(format!("segment id {new_id} is already in use")));
            }
        }
        if !self.is_splittable(id, at) {
            return Err(rejected(format!(
                "cannot split segment {id} at {at} with minimum length {}",
                self.min_length
            )));
        }

        let original = self.segments[pos];
        let first = Segment::new(first_id, original.start(), at, self.total)?;
        let second = Segment::new(second_id, at, original.end(), self.total)?;
        self.segments.splice(pos..=pos, [first, second]);
        self.splits.insert(
            id,
            SplitRecord {
                original,
                parts: [first_id, second_id],
            },
        );
        tracing::debug!(%id, at, first = %first_id, second = %second_id, "split segment");
        Ok(())
    }

    /// Restore a segment that was split, if its two parts are still
    /// present and adjacent.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] if there is no split
    /// record for `original` and [`ProfileError::SegmentUpdateRejected`] if
    /// the parts are gone or no longer neighbours.
    pub fn unsplit(&mut self, original: SegmentId) -> Result<()> {
        skip_if_locked!(self, "unsplit");
        let record = self
            .splits
            .get(&original)
            .cloned()
            .ok_or(ProfileError::UnavailableSegment(original))?;
        let [first_id, second_id] = record.parts;
        let first_pos = self.position_of(first_id).map_err(|_| {
            rejected(format!("split part {first_id} of {original} is no longer present"))
        })?;
        if self.next_of(first_id)?.id() != second_id {
            return Err(rejected(format!(
                "split parts of {original} are no longer adjacent"
            )));
        }
        if self.contains_id(original) {
            return Err(rejected(format!("segment id {original} is already in use")));
        }
        let first = self.segments[first_pos];
        let second = *self.segment(second_id)?;
        let restored = record
            .original
            .with_bounds(first.start(), second.end());
        self.replace_pair(first_pos, restored);
        self.splits.remove(&original);
        tracing::debug!(%original, "unsplit segment");
        Ok(())
    }

    /// Join two neighbouring segments into one with id `new_id`.
    ///
    /// The pair may be given in either order. The new segment records both
    /// as merge sources.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id and
    /// [`ProfileError::SegmentUpdateRejected`] if the segments are not
    /// neighbours or `new_id` is in use by another segment.
    pub fn merge(&mut self, a: SegmentId, b: SegmentId, new_id: SegmentId) -> Result<()> {
        skip_if_locked!(self, "merge");
        self.position_of(a)?;
        self.position_of(b)?;
        if a == b {
            return Err(rejected("cannot merge a segment with itself"));
        }
        let (first, second) = if self.next_of(a)?.id() == b {
            (a, b)
        } else if self.next_of(b)?.id() == a {
            (b, a)
        } else {
            return Err(rejected(format!("segments {a} and {b} are not adjacent")));
        };
        if self.contains_id(new_id) {
            return Err(rejected(format!("segment id {new_id} is already in use")));
        }

        let first_pos = self.position_of(first)?;
        let first_seg = self.segments[first_pos];
        let second_seg = *self.segment(second)?;
        let merged = Segment::new(new_id, first_seg.start(), second_seg.end(), self.total)?;
        self.replace_pair(first_pos, merged);
        self.merges.insert(new_id, vec![first_seg, second_seg]);
        tracing::debug!(%first, %second, merged = %new_id, "merged segments");
        Ok(())
    }

    /// Replace a merged segment with the segments it was made from.
    ///
    /// Does nothing if the segment has no merge sources.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnavailableSegment`] for an unknown id and
    /// [`ProfileError::SegmentUpdateRejected`] if the recorded sources no
    /// longer tile the segment or their ids are now in use elsewhere.
    pub fn unmerge(&mut self, id: SegmentId) -> Result<()> {
        skip_if_locked!(self, "unmerge");
        let pos = self.position_of(id)?;
        let Some(sources) = self.merges.get(&id).cloned() else {
            return Ok(());
        };
        let merged = self.segments[pos];
        self.check_sources_tile(&merged, &sources)?;
        if let Some(clash) = sources
            .iter()
            .find(|s| s.id() != id && self.contains_id(s.id()))
        {
            return Err(rejected(format!(
                "merge source id {} is already in use",
                clash.id()
            )));
        }
        let count = sources.len();
        self.segments.splice(pos..=pos, sources);
        self.merges.remove(&id);
        tracing::debug!(%id, restored = count, "unmerged segment");
        Ok(())
    }

    fn check_sources_tile(&self, merged: &Segment, sources: &[Segment]) -> Result<()> {
        let (Some(first), Some(last)) = (sources.first(), sources.last()) else {
            return Err(rejected(format!("segment {} has empty merge sources", merged.id())));
        };
        let chained = sources.windows(2).all(|w| w[0].end() == w[1].start());
        let covered: usize = sources.iter().map(Segment::len).sum();
        let long_enough = sources.iter().all(|s| s.len() >= self.min_length);
        if first.start() != merged.start()
            || last.end() != merged.end()
            || !chained
            || covered != merged.len()
            || !long_enough
        {
            return Err(rejected(format!(
                "merge sources of {} no longer tile it",
                merged.id()
            )));
        }
        Ok(())
    }

    /// Put `replacement` at `pos` and drop the segment after it.
    fn replace_pair(&mut self, pos: usize, replacement: Segment) {
        let count = self.segments.len();
        let next = (pos + 1) % count;
        self.segments[pos] = replacement;
        self.segments.remove(next);
        if self.segments.len() == 1 {
            let only = self.segments[0];
            self.segments[0] = only.with_bounds(only.start(), only.start());
        }
    }

    // --- Boundary moves ---

    /// Move one segment's boundaries, dragging its neighbours' adjoining
    /// ends along.
    ///
    /// The new range may only reach into the immediate neighbours, each of
    /// which must keep the minimum length.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] for an index outside the
    /// ring, [`ProfileError::UnavailableSegment`] for an unknown id, and
    /// [`ProfileError::SegmentUpdateRejected`] if a touched segment is
    /// locked or the change would overlap a non-neighbour or fall below the
    /// minimum length.
    pub fn update(&mut self, id: SegmentId, new_start: usize, new_end: usize) -> Result<()> {
        skip_if_locked!(self, "update");
        for index in [new_start, new_end] {
            if index >= self.total {
                return Err(ProfileError::InvalidIndex {
                    index,
                    len: self.total,
                });
            }
        }
        let pos = self.position_of(id)?;
        let segment = self.segments[pos];
        if segment.start() == new_start && segment.end() == new_end {
            return Ok(());
        }
        if segment.is_locked() {
            return Err(rejected(format!("segment {id} is locked")));
        }

        let count = self.segments.len();
        let n = self.total;
        let min = self.min_length;
        match count {
            1 => {
                if new_start != new_end {
                    return Err(rejected("a lone segment must cover the whole ring"));
                }
                self.segments[0] = segment.with_bounds(new_start, new_start);
            }
            2 => {
                let other_pos = 1 - pos;
                let other = self.segments[other_pos];
                if other.is_locked() {
                    return Err(rejected(format!("segment {} is locked", other.id())));
                }
                let own = ring::distance(new_start, new_end, n);
                if own < min || n - own < min {
                    return Err(rejected(format!(
                        "update of {id} to [{new_start}, {new_end}) leaves a segment below {min}"
                    )));
                }
                self.segments[pos] = segment.with_bounds(new_start, new_end);
                self.segments[other_pos] = other.with_bounds(new_end, new_start);
            }
            _ => {
                let prev_pos = (pos + count - 1) % count;
                let next_pos = (pos + 1) % count;
                let prev = self.segments[prev_pos];
                let next = self.segments[next_pos];
                if prev.is_locked() && new_start != segment.start() {
                    return Err(rejected(format!("segment {} is locked", prev.id())));
                }
                if next.is_locked() && new_end != segment.end() {
                    return Err(rejected(format!("segment {} is locked", next.id())));
                }
                let base = prev.start();
                let window = ring::span(base, next.end(), n);
                let s = ring::distance(base, new_start, n);
                let e = ring::distance(base, new_end, n);
                let fits = s >= min && e > s && e - s >= min && e < window && window - e >= min;
                if !fits {
                    return Err(rejected(format!(
                        "update of {id} to [{new_start}, {new_end}) would overlap a non-adjacent segment or fall below {min}"
                    )));
                }
                self.segments[prev_pos] = prev.with_bounds(prev.start(), new_start);
                self.segments[pos] = segment.with_bounds(new_start, new_end);
                self.segments[next_pos] = next.with_bounds(new_end, next.end());
            }
        }

        if new_start != segment.start() {
            self.reanchor_start(id, new_start);
            let prev_id = self.prev_of(id)?.id();
            self.reanchor_end(prev_id, new_start);
        }
        if new_end != segment.end() {
            self.reanchor_end(id, new_end);
            let next_id = self.next_of(id)?.id();
            self.reanchor_start(next_id, new_end);
        }
        tracing::debug!(%id, new_start, new_end, "updated segment");
        Ok(())
    }

    /// Move only the start of a segment.
    ///
    /// # Errors
    ///
    /// As for [`update`](Self::update).
    pub fn adjust_start(&mut self, id: SegmentId, new_start: usize) -> Result<()> {
        let end = self.segment(id)?.end();
        if self.segments.len() == 1 {
            return self.update(id, new_start, new_start);
        }
        self.update(id, new_start, end)
    }

    /// Move only the end of a segment.
    ///
    /// # Errors
    ///
    /// As for [`update`](Self::update).
    pub fn adjust_end(&mut self, id: SegmentId, new_end: usize) -> Result<()> {
        let start = self.segment(id)?.start();
        if self.segments.len() == 1 {
            return self.update(id, new_end, new_end);
        }
        self.update(id, start, new_end)
    }

    /// Keep the first merge source's start on the merged segment's start.
    fn reanchor_start(&mut self, id: SegmentId, start: usize) {
        let mut current = id;
        while let Some(first) = self.merges.get_mut(&current).and_then(|s| s.first_mut()) {
            *first = first.with_bounds(start, first.end());
            current = first.id();
        }
    }

    /// Keep the last merge source's end on the merged segment's end.
    fn reanchor_end(&mut self, id: SegmentId, end: usize) {
        let mut current = id;
        while let Some(last) = self.merges.get_mut(&current).and_then(|s| s.last_mut()) {
            *last = last.with_bounds(last.start(), end);
            current = last.id();
        }
    }

    /// Shift every boundary by `amount`, wrapping.
    ///
    /// Segment count and lengths are unchanged.
    pub fn nudge(&mut self, amount: isize) {
        if self.locked {
            tracing::debug!(operation = "nudge", "partition is locked, ignoring");
            return;
        }
        *self = self.nudged(amount);
    }

    /// A copy with every boundary shifted by `amount`.
    #[must_use]
    pub fn nudged(&self, amount: isize) -> Self {
        self.map_segments(|s| s.shifted(amount), false)
    }

    /// Invert index order: `[s, e)` becomes `[N-1-e, N-1-s)` and the ring
    /// order of segments is reversed.
    pub fn reverse(&mut self) {
        if self.locked {
            tracing::debug!(operation = "reverse", "partition is locked, ignoring");
            return;
        }
        *self = self.reversed();
    }

    /// A reversed copy.
    #[must_use]
    pub fn reversed(&self) -> Self {
        self.map_segments(Segment::mirrored, true)
    }

    fn map_segments(&self, f: impl Fn(Segment) -> Segment, reverse_order: bool) -> Self {
        let mut segments: Vec<Segment> = self.segments.iter().copied().map(&f).collect();
        let merges = self
            .merges
            .iter()
            .map(|(&id, sources)| {
                let mut moved: Vec<Segment> = sources.iter().copied().map(&f).collect();
                if reverse_order {
                    moved.reverse();
                }
                (id, moved)
            })
            .collect();
        let splits = self
            .splits
            .iter()
            .map(|(&id, record)| {
                let mut parts = record.parts;
                if reverse_order {
                    parts.reverse();
                }
                let original = f(record.original);
                (id, SplitRecord { original, parts })
            })
            .collect();
        if reverse_order {
            segments.reverse();
        }
        Self {
            total: self.total,
            min_length: self.min_length,
            segments,
            merges,
            splits,
            locked: self.locked,
        }
    }

    /// Rescale every boundary onto a ring of `new_total`.
    ///
    /// # Errors
    ///
    /// As for [`interpolated`](Self::interpolated).
    pub fn interpolate(&mut self, new_total: usize) -> Result<()> {
        skip_if_locked!(self, "interpolate");
        *self = self.interpolated(new_total)?;
        Ok(())
    }

    /// A copy rescaled onto a ring of `new_total`.
    ///
    /// Each start becomes `round(start / total * new_total)`. Where two
    /// consecutive starts end up closer than the minimum length, the later
    /// one is pushed forward until the gap is met; if that leaves the
    /// closing segment (last start back round to the first) too short,
    /// earlier boundaries are pulled back. Every adjacent pair, the
    /// closing pair included, is then re-validated. Segment ids and locks
    /// are kept; merge and split history is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if `new_total` is below
    /// [`MIN_PROFILE_LENGTH`] or cannot hold the current number of segments
    /// at the minimum length.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn interpolated(&self, new_total: usize) -> Result<Self> {
        check_total(new_total)?;
        let count = self.segments.len();
        let min = self.min_length;
        let scale = new_total as f64 / self.total as f64;
        let rescale = |index: usize| (index as f64 * scale).round() as usize;

        if count == 1 {
            let start = rescale(self.segments[0].start()) % new_total;
            let only = Segment::new(self.segments[0].id(), start, start, new_total)?;
            return Ok(self.rebuilt(new_total, vec![lock_like(only, &self.segments[0])]));
        }
        if count * min > new_total {
            return Err(ProfileError::LengthMismatch(format!(
                "{count} segments of at least {min} do not fit in {new_total}"
            )));
        }

        // Work in unwrapped coordinates so starts are monotonic.
        let first = self.segments[0].start();
        let mut starts: Vec<usize> = self
            .segments
            .iter()
            .map(|s| rescale(first + ring::distance(first, s.start(), self.total)))
            .collect();

        for i in 1..count {
            if starts[i] < starts[i - 1] + min {
                starts[i] = starts[i - 1] + min;
            }
        }
        let closing = starts[0] + new_total;
        if closing < starts[count - 1] + min {
            let mut limit = closing;
            for i in (1..count).rev() {
                starts[i] = starts[i].min(limit.saturating_sub(min));
                limit = starts[i];
            }
        }

        let all_pairs_hold = (0..count).all(|i| {
            let next = if i + 1 == count { closing } else { starts[i + 1] };
            next >= starts[i] + min
        });
        if !all_pairs_hold {
            return Err(ProfileError::LengthMismatch(format!(
                "interpolating {count} segments to {new_total} broke the minimum length"
            )));
        }

        let segments = (0..count)
            .map(|i| {
                let start = starts[i] % new_total;
                let end = starts[(i + 1) % count] % new_total;
                Segment::new(self.segments[i].id(), start, end, new_total)
                    .map(|s| lock_like(s, &self.segments[i]))
            })
            .collect::<Result<Vec<_>>>()?;

        let rebuilt = self.rebuilt(new_total, segments);
        rebuilt.validate().map_err(|e| {
            ProfileError::LengthMismatch(format!("interpolation to {new_total} failed: {e}"))
        })?;
        Ok(rebuilt)
    }

    fn rebuilt(&self, total: usize, segments: Vec<Segment>) -> Self {
        Self {
            total,
            min_length: self.min_length,
            segments,
            merges: BTreeMap::new(),
            splits: BTreeMap::new(),
            locked: self.locked,
        }
    }

    /// Serializable snapshot of the partition and its history.
    #[must_use]
    pub fn to_state(&self) -> PartitionState {
        PartitionState {
            total: self.total,
            min_length: self.min_length,
            segments: self.segments.clone(),
            merges: self
                .merges
                .iter()
                .map(|(&merged, sources)| MergeRecord {
                    merged,
                    sources: sources.clone(),
                })
                .collect(),
            splits: self.splits.values().cloned().collect(),
            locked: self.locked,
        }
    }
}

impl TryFrom<PartitionState> for SegmentPartition {
    type Error = ProfileError;

    fn try_from(state: PartitionState) -> Result<Self> {
        let mut partition = Self::from_segments(state.total, state.min_length, state.segments)?;
        partition.merges = state
            .merges
            .into_iter()
            .map(|r| (r.merged, r.sources))
            .collect();
        partition.splits = state
            .splits
            .into_iter()
            .map(|r| (r.original.id(), r))
            .collect();
        partition.locked = state.locked;
        Ok(partition)
    }
}

impl From<SegmentPartition> for PartitionState {
    fn from(partition: SegmentPartition) -> Self {
        partition.to_state()
    }
}

fn check_total(total: usize) -> Result<()> {
    if total < MIN_PROFILE_LENGTH {
        return Err(ProfileError::LengthMismatch(format!(
            "a partition needs at least {MIN_PROFILE_LENGTH} indices, got {total}"
        )));
    }
    Ok(())
}

fn rejected(reason: impl Into<String>) -> ProfileError {
    ProfileError::SegmentUpdateRejected(reason.into())
}

const fn lock_like(mut segment: Segment, source: &Segment) -> Segment {
    segment.set_locked(source.is_locked());
    segment
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(raw: u64) -> SegmentId {
        SegmentId::new(raw)
    }

    fn bounds(partition: &SegmentPartition) -> Vec<(usize, usize)> {
        partition
            .segments()
            .iter()
            .map(|s| (s.start(), s.end()))
            .collect()
    }

    /// Every index covered exactly once.
    fn assert_tiles(partition: &SegmentPartition) {
        partition.validate().unwrap();
        let mut hits = vec![0_u32; partition.total()];
        for segment in partition.segments() {
            for k in 0..segment.len() {
                hits[(segment.start() + k) % partition.total()] += 1;
            }
        }
        assert!(hits.iter().all(|&h| h == 1), "coverage: {hits:?}");
    }

    fn three() -> SegmentPartition {
        SegmentPartition::from_starts(100, 5, &[0, 30, 60]).unwrap()
    }

    // --- Construction ---

    #[test]
    fn new_is_one_whole_segment() {
        let p = SegmentPartition::new(100, 5).unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.segments()[0].len(), 100);
        assert_eq!(p.segments()[0].id(), SegmentId::DEFAULT);
        assert_tiles(&p);
    }

    #[test]
    fn new_rejects_tiny_ring() {
        assert!(matches!(
            SegmentPartition::new(2, 1),
            Err(ProfileError::LengthMismatch(_))
        ));
    }

    #[test]
    fn from_starts_validates() {
        assert!(SegmentPartition::from_starts(100, 5, &[0, 3]).is_err());
        assert!(SegmentPartition::from_starts(100, 5, &[50, 10]).is_err());
        assert!(SegmentPartition::from_starts(100, 5, &[0, 100]).is_err());
        assert_tiles(&three());
    }

    #[test]
    fn from_segments_rejects_gap() {
        let segments = vec![
            Segment::new(id(0), 0, 40, 100).unwrap(),
            Segment::new(id(1), 50, 0, 100).unwrap(),
        ];
        assert!(SegmentPartition::from_segments(100, 5, segments).is_err());
    }

    #[test]
    fn from_segments_rejects_duplicate_ids() {
        let segments = vec![
            Segment::new(id(0), 0, 50, 100).unwrap(),
            Segment::new(id(0), 50, 0, 100).unwrap(),
        ];
        assert!(SegmentPartition::from_segments(100, 5, segments).is_err());
    }

    // --- Queries ---

    #[test]
    fn neighbours_wrap() {
        let p = three();
        assert_eq!(p.next_of(id(2)).unwrap().id(), id(0));
        assert_eq!(p.prev_of(id(0)).unwrap().id(), id(2));
        assert!(matches!(
            p.next_of(id(9)),
            Err(ProfileError::UnavailableSegment(_))
        ));
    }

    #[test]
    fn containing_and_ordering() {
        let p = three().nudged(10);
        assert_eq!(p.segment_containing(5).unwrap().id(), id(2));
        let ordered: Vec<SegmentId> = p.ordered_from(0).unwrap().iter().map(Segment::id).collect();
        assert_eq!(ordered, vec![id(2), id(0), id(1)]);
        assert_eq!(p.name_of(id(2)).unwrap(), "Seg_0");
        assert_eq!(p.name_of(id(1)).unwrap(), "Seg_2");
        assert!(p.segment_containing(100).is_err());
    }

    #[test]
    fn fresh_id_skips_history() {
        let mut p = three();
        p.merge(id(0), id(1), id(7)).unwrap();
        assert_eq!(p.fresh_id(), id(8));
    }

    // --- Split ---

    #[test]
    fn split_respects_minimum() {
        let mut p = SegmentPartition::from_starts(100, 5, &[0, 20]).unwrap();
        assert!(!p.is_splittable(id(0), 2));
        assert!(matches!(
            p.split(id(0), 2, (id(5), id(6))),
            Err(ProfileError::SegmentUpdateRejected(_))
        ));
        p.split(id(0), 10, (id(5), id(6))).unwrap();
        assert_eq!(bounds(&p), vec![(0, 10), (10, 20), (20, 0)]);
        assert_tiles(&p);
    }

    #[test]
    fn split_rejects_boundary_and_outside() {
        let mut p = three();
        assert!(!p.is_splittable(id(0), 0));
        assert!(!p.is_splittable(id(0), 45));
        assert!(p.split(id(0), 45, (id(5), id(6))).is_err());
        assert!(p.split(id(0), 15, (id(1), id(6))).is_err());
        assert!(p.split(id(0), 15, (id(6), id(6))).is_err());
    }

    #[test]
    fn split_whole_ring() {
        let mut p = SegmentPartition::new(50, 5).unwrap();
        p.split(SegmentId::DEFAULT, 20, (id(1), id(2))).unwrap();
        assert_eq!(bounds(&p), vec![(0, 20), (20, 0)]);
        assert_tiles(&p);
    }

    #[test]
    fn unsplit_restores_original() {
        let mut p = three();
        let before = p.clone();
        p.split(id(1), 40, (id(5), id(6))).unwrap();
        assert!(p.split_record(id(1)).is_some());
        p.unsplit(id(1)).unwrap();
        assert_eq!(bounds(&p), bounds(&before));
        assert_eq!(p.ids(), before.ids());
        assert!(p.split_record(id(1)).is_none());
    }

    #[test]
    fn unsplit_after_part_merged_away_is_rejected() {
        let mut p = three();
        p.split(id(1), 40, (id(5), id(6))).unwrap();
        p.merge(id(6), id(2), id(8)).unwrap();
        assert!(matches!(
            p.unsplit(id(1)),
            Err(ProfileError::SegmentUpdateRejected(_))
        ));
    }

    // --- Merge / unmerge ---

    #[test]
    fn merge_adjacent_either_order() {
        let mut p = three();
        p.merge(id(1), id(0), id(9)).unwrap();
        assert_eq!(bounds(&p), vec![(0, 60), (60, 0)]);
        let sources: Vec<SegmentId> = p.merge_sources(id(9)).unwrap().iter().map(Segment::id).collect();
        assert_eq!(sources, vec![id(0), id(1)]);
        assert_tiles(&p);
    }

    #[test]
    fn merge_across_wrap() {
        let mut p = three();
        p.merge(id(2), id(0), id(9)).unwrap();
        assert_eq!(bounds(&p), vec![(30, 60), (60, 30)]);
        assert_tiles(&p);
    }

    #[test]
    fn merge_rejects_non_adjacent_and_clashing_id() {
        let mut p = SegmentPartition::from_starts(100, 5, &[0, 25, 50, 75]).unwrap();
        assert!(matches!(
            p.merge(id(0), id(2), id(9)),
            Err(ProfileError::SegmentUpdateRejected(_))
        ));
        assert!(p.merge(id(0), id(1), id(3)).is_err());
        assert!(p.merge(id(0), id(0), id(9)).is_err());
    }

    #[test]
    fn merge_last_pair_gives_whole_ring() {
        let mut p = SegmentPartition::from_starts(100, 5, &[10, 60]).unwrap();
        p.merge(id(0), id(1), id(4)).unwrap();
        assert_eq!(bounds(&p), vec![(10, 10)]);
        assert_tiles(&p);
        p.unmerge(id(4)).unwrap();
        assert_eq!(bounds(&p), vec![(10, 60), (60, 10)]);
    }

    #[test]
    fn unmerge_restores_position() {
        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            let original = three();
            let mut p = original.clone();
            p.merge(id(a), id(b), id(9)).unwrap();
            p.unmerge(id(9)).unwrap();
            let mut got = p.segments().to_vec();
            got.sort_by_key(Segment::start);
            let mut want = original.segments().to_vec();
            want.sort_by_key(Segment::start);
            assert_eq!(got, want);
            assert_tiles(&p);
        }
    }

    #[test]
    fn unmerge_without_sources_is_noop() {
        let mut p = three();
        let before = p.clone();
        p.unmerge(id(1)).unwrap();
        assert_eq!(p, before);
        assert!(p.unmerge(id(42)).is_err());
    }

    #[test]
    fn nested_merges_unwind() {
        let mut p = SegmentPartition::from_starts(100, 5, &[0, 25, 50, 75]).unwrap();
        p.merge(id(0), id(1), id(10)).unwrap();
        p.merge(id(10), id(2), id(11)).unwrap();
        p.unmerge(id(11)).unwrap();
        p.unmerge(id(10)).unwrap();
        assert_eq!(bounds(&p), vec![(0, 25), (25, 50), (50, 75), (75, 0)]);
    }

    #[test]
    fn merge_sources_follow_update() {
        let mut p = SegmentPartition::from_starts(100, 5, &[0, 25, 50, 75]).unwrap();
        p.merge(id(1), id(2), id(10)).unwrap();
        p.adjust_end(id(10), 70).unwrap();
        p.unmerge(id(10)).unwrap();
        assert_eq!(bounds(&p), vec![(0, 25), (25, 50), (50, 70), (70, 0)]);
        assert_tiles(&p);
    }

    #[test]
    fn unmerge_rejected_when_sources_too_short() {
        let mut p = SegmentPartition::from_starts(100, 5, &[0, 25, 50, 75]).unwrap();
        p.merge(id(1), id(2), id(10)).unwrap();
        p.adjust_end(id(10), 52).unwrap();
        assert!(matches!(
            p.unmerge(id(10)),
            Err(ProfileError::SegmentUpdateRejected(_))
        ));
    }

    // --- Update ---

    #[test]
    fn update_moves_neighbours() {
        let mut p = three();
        p.update(id(1), 25, 70).unwrap();
        assert_eq!(bounds(&p), vec![(0, 25), (25, 70), (70, 0)]);
        assert_tiles(&p);
    }

    #[test]
    fn update_rejects_overlap_and_short() {
        let mut p = SegmentPartition::from_starts(100, 5, &[0, 25, 50, 75]).unwrap();
        // start reaches back past the previous segment
        assert!(p.update(id(2), 20, 75).is_err());
        // end reaches past the next segment
        assert!(p.update(id(1), 25, 80).is_err());
        // previous segment would drop below minimum
        assert!(p.update(id(1), 3, 50).is_err());
        // own length below minimum
        assert!(p.update(id(1), 25, 28).is_err());
        assert_eq!(bounds(&p), vec![(0, 25), (25, 50), (50, 75), (75, 0)]);
    }

    #[test]
    fn update_across_wrap() {
        let mut p = three();
        p.update(id(0), 90, 30).unwrap();
        assert_eq!(bounds(&p), vec![(90, 30), (30, 60), (60, 90)]);
        assert_tiles(&p);
    }

    #[test]
    fn update_two_segments() {
        let mut p = SegmentPartition::from_starts(100, 5, &[0, 50]).unwrap();
        p.update(id(0), 10, 80).unwrap();
        assert_eq!(bounds(&p), vec![(10, 80), (80, 10)]);
        assert!(p.update(id(0), 10, 12).is_err());
    }

    #[test]
    fn update_respects_segment_locks() {
        let mut p = three();
        p.set_segment_locked(id(0), true).unwrap();
        assert!(p.update(id(1), 35, 60).is_err());
        assert!(p.update(id(0), 0, 35).is_err());
        p.update(id(1), 30, 65).unwrap();
    }

    #[test]
    fn update_rejects_out_of_range() {
        let mut p = three();
        assert!(matches!(
            p.update(id(1), 30, 100),
            Err(ProfileError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn adjust_helpers() {
        let mut p = three();
        p.adjust_start(id(1), 35).unwrap();
        p.adjust_end(id(1), 65).unwrap();
        assert_eq!(bounds(&p), vec![(0, 35), (35, 65), (65, 0)]);
    }

    #[test]
    fn lone_segment_moves_whole() {
        let mut p = SegmentPartition::new(40, 5).unwrap();
        p.adjust_start(SegmentId::DEFAULT, 7).unwrap();
        assert_eq!(bounds(&p), vec![(7, 7)]);
        assert!(p.update(SegmentId::DEFAULT, 7, 9).is_err());
    }

    // --- Nudge / reverse ---

    #[test]
    fn nudge_shifts_every_boundary() {
        let mut p = three();
        p.nudge(-10);
        assert_eq!(bounds(&p), vec![(90, 20), (20, 50), (50, 90)]);
        assert_tiles(&p);
    }

    #[test]
    fn reverse_mirrors_and_reorders() {
        let mut p = three();
        p.reverse();
        assert_eq!(bounds(&p), vec![(99, 39), (39, 69), (69, 99)]);
        assert_eq!(p.ids(), vec![id(2), id(1), id(0)]);
        assert_tiles(&p);
        p.reverse();
        assert_eq!(p, three());
    }

    #[test]
    fn reverse_keeps_merge_sources_unmergeable() {
        let mut p = three();
        p.merge(id(0), id(1), id(9)).unwrap();
        p.reverse();
        p.unmerge(id(9)).unwrap();
        assert_tiles(&p);
        assert_eq!(p.len(), 3);
    }

    // --- Interpolate ---

    #[test]
    fn interpolate_scales_starts() {
        let mut p = SegmentPartition::from_starts(100, 5, &[0, 50]).unwrap();
        p.interpolate(200).unwrap();
        assert_eq!(p.starts(), vec![0, 100]);
        assert_eq!(p.total(), 200);
        let total: usize = p.segments().iter().map(Segment::len).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn interpolate_pushes_crowded_boundaries() {
        let p = SegmentPartition::from_starts(100, 5, &[0, 10, 20, 30, 90]).unwrap();
        let shrunk = p.interpolated(30).unwrap();
        assert_eq!(shrunk.len(), 5);
        assert_tiles(&shrunk);
        assert!(shrunk.segments().iter().all(|s| s.len() >= 5));
    }

    #[test]
    fn interpolate_repairs_closing_segment() {
        let p = SegmentPartition::from_starts(100, 5, &[0, 40, 80, 94]).unwrap();
        let shrunk = p.interpolated(25).unwrap();
        assert_tiles(&shrunk);
        assert_eq!(shrunk.ids(), p.ids());
    }

    #[test]
    fn interpolate_too_small_fails() {
        let p = three();
        assert!(matches!(
            p.interpolated(14),
            Err(ProfileError::LengthMismatch(_))
        ));
        assert!(matches!(
            p.interpolated(2),
            Err(ProfileError::LengthMismatch(_))
        ));
    }

    #[test]
    fn interpolate_wrapping_partition() {
        let p = three().nudged(95);
        let grown = p.interpolated(300).unwrap();
        assert_tiles(&grown);
        assert_eq!(grown.starts(), vec![285, 75, 165]);
    }

    // --- Locking ---

    #[test]
    fn locked_partition_ignores_mutations() {
        let mut p = three();
        p.set_locked(true);
        let before = p.clone();
        p.split(id(0), 15, (id(5), id(6))).unwrap();
        p.merge(id(0), id(1), id(9)).unwrap();
        p.update(id(1), 35, 60).unwrap();
        p.nudge(5);
        p.reverse();
        p.interpolate(200).unwrap();
        assert_eq!(p, before);
        // views still work
        assert_eq!(p.nudged(5).starts(), vec![5, 35, 65]);
    }

    // --- Serde ---

    #[test]
    fn serde_keeps_history() {
        let mut p = three();
        p.merge(id(0), id(1), id(9)).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let mut back: SegmentPartition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        back.unmerge(id(9)).unwrap();
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn serde_rejects_broken_tiling() {
        let json = r#"{"total":100,"min_length":5,"segments":[
            {"id":0,"start":0,"end":40,"total":100},
            {"id":1,"start":50,"end":0,"total":100}]}"#;
        assert!(serde_json::from_str::<SegmentPartition>(json).is_err());
    }
}
