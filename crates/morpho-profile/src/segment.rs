//! A single named index range within a segment partition.

use serde::{Deserialize, Serialize};

use crate::ring;
use crate::types::{ProfileError, Result};

/// Identifier of a segment. Stable across moves; fresh for merges and
/// splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(u64);

impl SegmentId {
    /// Identifier given to the all-covering segment of a new partition.
    pub const DEFAULT: Self = Self(0);

    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A half-open ring range `[start, end)` over a profile of `total`
/// indices.
///
/// `start == end` covers the whole ring; this only occurs when the
/// segment is alone in its partition. Neighbour links are positional and
/// live in [`SegmentPartition`](crate::partition::SegmentPartition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    id: SegmentId,
    start: usize,
    end: usize,
    total: usize,
    #[serde(default)]
    locked: bool,
}

impl Segment {
    /// Create a segment.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `start` or `end` is not
    /// below `total`.
    pub const fn new(id: SegmentId, start: usize, end: usize, total: usize) -> Result<Self> {
        if start >= total {
            return Err(ProfileError::InvalidIndex { index: start, len: total });
        }
        if end >= total {
            return Err(ProfileError::InvalidIndex { index: end, len: total });
        }
        Ok(Self {
            id,
            start,
            end,
            total,
            locked: false,
        })
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> SegmentId {
        self.id
    }

    /// First index covered.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// One past the last index covered, wrapped.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Index of the last point covered.
    #[must_use]
    pub const fn last(&self) -> usize {
        ring::offset(self.end, -1, self.total)
    }

    /// Length of the ring this segment lives on.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Number of indices covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        ring::span(self.start, self.end, self.total)
    }

    /// Always `false`; a segment covers at least one index.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether `index` falls in this segment.
    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        index < self.total && ring::contains(self.start, self.end, index, self.total)
    }

    /// Whether the range runs across index 0 from a non-zero start.
    #[must_use]
    pub const fn wraps(&self) -> bool {
        self.start != 0 && self.contains(0)
    }

    /// Index halfway along the segment.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn midpoint(&self) -> usize {
        ring::offset(self.start, (self.len() / 2) as isize, self.total)
    }

    /// Index at fractional position `p` in `[0, 1)` along the segment.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidFraction`] if `p` is outside `[0, 1)`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn index_at_fraction(&self, p: f64) -> Result<usize> {
        if !(0.0..1.0).contains(&p) {
            return Err(ProfileError::InvalidFraction(p));
        }
        let step = (p * self.len() as f64).floor() as isize;
        Ok(ring::offset(self.start, step, self.total))
    }

    /// Whether `update` is refused for this segment.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Set the per-segment lock.
    pub const fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub(crate) const fn with_bounds(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Shift both ends by `amount`, wrapping.
    pub(crate) const fn shifted(self, amount: isize) -> Self {
        let start = ring::offset(self.start, amount, self.total);
        let end = ring::offset(self.end, amount, self.total);
        self.with_bounds(start, end)
    }

    /// Mirror for a reversed ring: `[s, e)` becomes `[N-1-e, N-1-s)`.
    pub(crate) const fn mirrored(self) -> Self {
        let start = ring::mirror(self.end, self.total);
        let end = ring::mirror(self.start, self.total);
        self.with_bounds(start, end)
    }
}
