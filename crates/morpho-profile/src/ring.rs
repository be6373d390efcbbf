//! Wrap-around index arithmetic for fixed-length rings.
//!
//! Every boundary, profile, and segment partition in this crate is a
//! ring: index `len - 1` is adjacent to index `0`. Negative and
//! overflowing indices are not errors here; they are folded back into
//! `[0, len)`.

/// Fold any signed index into `[0, len)`.
///
/// Equivalent to `((i % len) + len) % len`. Returns `0` for an empty ring.
///
/// # Examples
///
/// ```
/// use morpho_profile::ring::wrap;
///
/// assert_eq!(wrap(-1, 10), 9);
/// assert_eq!(wrap(23, 10), 3);
/// ```
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub const fn wrap(index: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    index.rem_euclid(len as isize) as usize
}

/// Step `offset` places from an in-range index, wrapping as needed.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn offset(index: usize, offset: isize, len: usize) -> usize {
    wrap(index as isize + offset, len)
}

/// Number of forward steps from `from` to `to` on a ring of `len`.
///
/// Always in `[0, len)`; `distance(i, i, len)` is zero.
#[must_use]
pub const fn distance(from: usize, to: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (to % len + len - from % len) % len
}

/// Number of indices in the half-open ring range `[start, end)`.
///
/// A range whose end equals its start covers the whole ring.
#[must_use]
pub const fn span(start: usize, end: usize, len: usize) -> usize {
    let d = distance(start, end, len);
    if d == 0 { len } else { d }
}

/// Whether `index` lies inside the half-open ring range `[start, end)`.
///
/// A range whose end equals its start contains every index.
#[must_use]
pub const fn contains(start: usize, end: usize, index: usize, len: usize) -> bool {
    distance(start, index, len) < span(start, end, len)
}

/// Mirror an index under ring reversal: `i` becomes `len - 1 - i`.
#[must_use]
pub const fn mirror(index: usize, len: usize) -> usize {
    len - 1 - index % len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_is_idempotent_and_in_range() {
        for n in 3..12_usize {
            for i in -40..40_isize {
                let w = wrap(i, n);
                assert!(w < n);
                #[allow(clippy::cast_possible_wrap)]
                let again = wrap(w as isize, n);
                assert_eq!(again, w);
            }
        }
    }

    #[test]
    fn wrap_negative() {
        assert_eq!(wrap(-1, 5), 4);
        assert_eq!(wrap(-5, 5), 0);
        assert_eq!(wrap(-6, 5), 4);
    }

    #[test]
    fn wrap_empty_ring_is_zero() {
        assert_eq!(wrap(7, 0), 0);
    }

    #[test]
    fn offset_steps_both_ways() {
        assert_eq!(offset(8, 3, 10), 1);
        assert_eq!(offset(1, -3, 10), 8);
    }

    #[test]
    fn distance_forward_only() {
        assert_eq!(distance(2, 5, 10), 3);
        assert_eq!(distance(5, 2, 10), 7);
        assert_eq!(distance(4, 4, 10), 0);
    }

    #[test]
    fn span_of_equal_ends_is_full_ring() {
        assert_eq!(span(3, 3, 10), 10);
        assert_eq!(span(8, 2, 10), 4);
    }

    #[test]
    fn contains_wrapping_range() {
        assert!(contains(8, 2, 9, 10));
        assert!(contains(8, 2, 0, 10));
        assert!(contains(8, 2, 1, 10));
        assert!(!contains(8, 2, 2, 10));
        assert!(!contains(8, 2, 5, 10));
    }

    #[test]
    fn contains_full_ring() {
        for i in 0..10 {
            assert!(contains(4, 4, i, 10));
        }
    }

    #[test]
    fn mirror_is_involution() {
        for i in 0..7 {
            assert_eq!(mirror(mirror(i, 7), 7), i);
        }
        assert_eq!(mirror(0, 7), 6);
    }
}
