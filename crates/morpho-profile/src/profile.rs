//! Scalar measurement series aligned index-for-index with a boundary.
//!
//! A [`Profile`] is a ring of finite `f64` values. It owns no boundary;
//! it is a derived view that can be rebuilt from one at any time.
//!
//! All resampling is linear interpolation over the circular domain. No
//! smoothing is applied unless [`Profile::smooth`] is called explicitly.

use serde::{Deserialize, Serialize};

use crate::ring;
use crate::types::{ProfileError, Result};

/// Shortest length a profile may be interpolated to.
pub const MIN_PROFILE_LENGTH: usize = 3;

/// A ring of finite scalar values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Profile {
    values: Vec<f64>,
}

impl Profile {
    /// Create a profile from raw values.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] for an empty vector and
    /// [`ProfileError::InvalidValue`] if any value is NaN or infinite.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ProfileError::LengthMismatch(
                "a profile needs at least one value".to_string(),
            ));
        }
        if let Some(&bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(ProfileError::InvalidValue(bad));
        }
        Ok(Self { values })
    }

    /// A profile of `len` copies of `value`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Profile::new`].
    pub fn constant(value: f64, len: usize) -> Result<Self> {
        Self::new(vec![value; len])
    }

    /// Internal constructor for values already known to be finite.
    pub(crate) const fn from_finite(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Number of values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false` for a constructed profile.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All values in ring order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consume the profile and return its values.
    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Iterate over the values in ring order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    // --- Element access ---

    /// Value at an index.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `index >= len`.
    pub fn get(&self, index: usize) -> Result<f64> {
        self.values
            .get(index)
            .copied()
            .ok_or(ProfileError::InvalidIndex {
                index,
                len: self.len(),
            })
    }

    /// Value at any signed index, wrapping around the ring.
    #[must_use]
    pub fn get_wrapped(&self, index: isize) -> f64 {
        self.values[ring::wrap(index, self.len())]
    }

    /// Index for a fractional position `p` in `[0, 1)`: `floor(p * len)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidFraction`] if `p` is outside `[0, 1)`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn index_of_fraction(&self, p: f64) -> Result<usize> {
        if !(0.0..1.0).contains(&p) {
            return Err(ProfileError::InvalidFraction(p));
        }
        let index = (p * self.len() as f64).floor() as usize;
        Ok(index.min(self.len() - 1))
    }

    /// Value at a fractional position `p` in `[0, 1)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidFraction`] if `p` is outside `[0, 1)`.
    pub fn get_fraction(&self, p: f64) -> Result<f64> {
        let index = self.index_of_fraction(p)?;
        Ok(self.values[index])
    }

    /// Fractional position of an index: `index / len`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `index >= len`.
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction_of_index(&self, index: usize) -> Result<f64> {
        if index >= self.len() {
            return Err(ProfileError::InvalidIndex {
                index,
                len: self.len(),
            });
        }
        Ok(index as f64 / self.len() as f64)
    }

    /// The `2 * window + 1` values centred on `index`, in ring order.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `index >= len`.
    #[allow(clippy::cast_possible_wrap)]
    pub fn window(&self, index: usize, window: usize) -> Result<Self> {
        if index >= self.len() {
            return Err(ProfileError::InvalidIndex {
                index,
                len: self.len(),
            });
        }
        let centre = index as isize;
        let w = window as isize;
        Ok(Self::from_finite(
            (-w..=w).map(|k| self.get_wrapped(centre + k)).collect(),
        ))
    }

    // --- Extremes ---

    /// Smallest value.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest value.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Index of the first smallest value.
    #[must_use]
    pub fn index_of_min(&self) -> usize {
        self.extreme_index(None, |candidate, best| candidate < best)
            .unwrap_or(0)
    }

    /// Index of the first largest value.
    #[must_use]
    pub fn index_of_max(&self) -> usize {
        self.extreme_index(None, |candidate, best| candidate > best)
            .unwrap_or(0)
    }

    /// Index of the smallest value among positions where `mask` is true.
    ///
    /// Returns `Ok(None)` when the mask selects nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if the mask length differs.
    pub fn index_of_min_masked(&self, mask: &[bool]) -> Result<Option<usize>> {
        self.check_mask(mask)?;
        Ok(self.extreme_index(Some(mask), |candidate, best| candidate < best))
    }

    /// Index of the largest value among positions where `mask` is true.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if the mask length differs.
    pub fn index_of_max_masked(&self, mask: &[bool]) -> Result<Option<usize>> {
        self.check_mask(mask)?;
        Ok(self.extreme_index(Some(mask), |candidate, best| candidate > best))
    }

    fn check_mask(&self, mask: &[bool]) -> Result<()> {
        if mask.len() == self.len() {
            Ok(())
        } else {
            Err(ProfileError::LengthMismatch(format!(
                "mask of length {} for profile of length {}",
                mask.len(),
                self.len()
            )))
        }
    }

    fn extreme_index(&self, mask: Option<&[bool]>, better: impl Fn(f64, f64) -> bool) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in self.values.iter().enumerate() {
            if mask.is_some_and(|m| !m[i]) {
                continue;
            }
            match best {
                Some((_, b)) if !better(v, b) => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| i)
    }

    // --- Ring transforms ---

    /// A copy rotated so that index 0 holds the current value at `k`.
    ///
    /// # Examples
    ///
    /// ```
    /// use morpho_profile::Profile;
    ///
    /// let p = Profile::new(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(p.offset(1).values(), &[2.0, 3.0, 4.0, 1.0]);
    /// assert_eq!(p.offset(-1).values(), &[4.0, 1.0, 2.0, 3.0]);
    /// ```
    #[must_use]
    pub fn offset(&self, k: isize) -> Self {
        let mut values = self.values.clone();
        values.rotate_left(ring::wrap(k, self.len()));
        Self::from_finite(values)
    }

    /// Invert the index order in place.
    pub fn reverse(&mut self) {
        self.values.reverse();
    }

    /// A reversed copy.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut copy = self.clone();
        copy.reverse();
        copy
    }

    /// Linearly resample to `new_len` values over the circular domain.
    ///
    /// Output index `i` samples the old ring at position
    /// `i * len / new_len`, blending the two neighbouring values. The
    /// last output value blends towards index 0, closing the ring.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if `new_len` is below
    /// [`MIN_PROFILE_LENGTH`].
    pub fn interpolate(&self, new_len: usize) -> Result<Self> {
        if new_len < MIN_PROFILE_LENGTH {
            return Err(ProfileError::LengthMismatch(format!(
                "cannot interpolate to {new_len}, minimum is {MIN_PROFILE_LENGTH}"
            )));
        }
        Ok(self.resample(new_len))
    }

    /// Resampling without the minimum length check.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub(crate) fn resample(&self, new_len: usize) -> Self {
        if new_len == self.len() {
            return self.clone();
        }
        let n = self.len();
        let ratio = n as f64 / new_len as f64;
        let values = (0..new_len)
            .map(|i| {
                let position = i as f64 * ratio;
                let lower = (position.floor() as usize).min(n - 1);
                let upper = (lower + 1) % n;
                let fraction = position - lower as f64;
                let a = self.values[lower];
                let b = self.values[upper];
                (b - a).mul_add(fraction, a)
            })
            .collect();
        Self::from_finite(values)
    }

    /// Values from `start` up to but not including `end`, wrapping.
    ///
    /// `start == end` returns the whole ring beginning at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if either end is out of range.
    pub fn subregion(&self, start: usize, end: usize) -> Result<Self> {
        let n = self.len();
        for index in [start, end] {
            if index >= n {
                return Err(ProfileError::InvalidIndex { index, len: n });
            }
        }
        let count = ring::span(start, end, n);
        Ok(Self::from_finite(
            self.values
                .iter()
                .copied()
                .cycle()
                .skip(start)
                .take(count)
                .collect(),
        ))
    }

    /// Symmetric moving average over `2 * window + 1` values.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn smooth(&self, window: usize) -> Self {
        let w = window as isize;
        let divisor = (2 * window + 1) as f64;
        let values = (0..self.len())
            .map(|i| {
                let centre = i as isize;
                (-w..=w).map(|k| self.get_wrapped(centre + k)).sum::<f64>() / divisor
            })
            .collect();
        Self::from_finite(values)
    }

    // --- Extremum detection ---

    /// Mark local minima.
    ///
    /// A point is a minimum when, stepping outward in both directions up to
    /// `window` places, each value is strictly greater than the one before
    /// it. A window of zero is treated as one.
    #[must_use]
    pub fn local_minima(&self, window: usize) -> Vec<bool> {
        self.local_extrema(window, |outer, inner| outer > inner)
    }

    /// Local minima whose value is also below `threshold`.
    #[must_use]
    pub fn local_minima_below(&self, window: usize, threshold: f64) -> Vec<bool> {
        self.local_minima(window)
            .into_iter()
            .zip(&self.values)
            .map(|(is_min, &v)| is_min && v < threshold)
            .collect()
    }

    /// Mark local maxima; the mirror of [`Profile::local_minima`].
    #[must_use]
    pub fn local_maxima(&self, window: usize) -> Vec<bool> {
        self.local_extrema(window, |outer, inner| outer < inner)
    }

    /// Local maxima whose value is also above `threshold`.
    #[must_use]
    pub fn local_maxima_above(&self, window: usize, threshold: f64) -> Vec<bool> {
        self.local_maxima(window)
            .into_iter()
            .zip(&self.values)
            .map(|(is_max, &v)| is_max && v > threshold)
            .collect()
    }

    #[allow(clippy::cast_possible_wrap)]
    fn local_extrema(&self, window: usize, worsens: impl Fn(f64, f64) -> bool) -> Vec<bool> {
        let w = window.max(1) as isize;
        (0..self.len())
            .map(|i| {
                let centre = i as isize;
                (1..=w).all(|k| {
                    let before_inner = self.get_wrapped(centre - k + 1);
                    let after_inner = self.get_wrapped(centre + k - 1);
                    worsens(self.get_wrapped(centre - k), before_inner)
                        && worsens(self.get_wrapped(centre + k), after_inner)
                })
            })
            .collect()
    }

    // --- Comparison ---

    /// Sum of squared differences, interpolating the shorter operand up
    /// to the longer length first.
    ///
    /// # Examples
    ///
    /// ```
    /// use morpho_profile::Profile;
    ///
    /// let a = Profile::constant(5.0, 8).unwrap();
    /// let b = Profile::constant(5.0, 10).unwrap();
    /// assert!(a.difference(&b).abs() < 1e-10);
    /// ```
    #[must_use]
    pub fn difference(&self, other: &Self) -> f64 {
        match self.len().cmp(&other.len()) {
            std::cmp::Ordering::Less => sum_squares(&self.resample(other.len()).values, &other.values),
            std::cmp::Ordering::Greater => {
                sum_squares(&self.values, &other.resample(self.len()).values)
            }
            std::cmp::Ordering::Equal => sum_squares(&self.values, &other.values),
        }
    }

    /// Sum of squared differences after resampling both operands to `len`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if `len` is below
    /// [`MIN_PROFILE_LENGTH`].
    pub fn difference_at_length(&self, other: &Self, len: usize) -> Result<f64> {
        let a = self.interpolate(len)?;
        let b = other.interpolate(len)?;
        Ok(sum_squares(&a.values, &b.values))
    }

    /// The rotation of `self` that best matches `other`.
    ///
    /// Brute force over all `len` offsets: returns `k` minimising
    /// `self.offset(k).difference(other)`, with `other` first resampled to
    /// this profile's length. Ties resolve to the smallest offset.
    #[must_use]
    pub fn sliding_window_offset(&self, other: &Self) -> usize {
        let n = self.len();
        let target = other.resample(n);
        let mut best = (0, f64::INFINITY);
        for k in 0..n {
            let score: f64 = target
                .values
                .iter()
                .enumerate()
                .map(|(j, &t)| {
                    let d = self.values[(j + k) % n] - t;
                    d * d
                })
                .sum();
            if score < best.1 {
                best = (k, score);
            }
        }
        best.0
    }

    // --- Arithmetic ---

    /// Apply a function to every value, rejecting non-finite results.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] if `f` produces NaN or infinity.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Result<Self> {
        Self::new(self.values.iter().map(|&v| f(v)).collect())
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if self.len() != other.len() {
            return Err(ProfileError::LengthMismatch(format!(
                "profiles of length {} and {}",
                self.len(),
                other.len()
            )));
        }
        Self::new(
            self.values
                .iter()
                .zip(&other.values)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        )
    }

    /// Add a constant to every value.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] for a non-finite scalar.
    pub fn add_scalar(&self, value: f64) -> Result<Self> {
        finite(value)?;
        self.map(|v| v + value)
    }

    /// Subtract a constant from every value.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] for a non-finite scalar.
    pub fn subtract_scalar(&self, value: f64) -> Result<Self> {
        finite(value)?;
        self.map(|v| v - value)
    }

    /// Multiply every value by a constant.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] for a non-finite scalar.
    pub fn multiply_scalar(&self, value: f64) -> Result<Self> {
        finite(value)?;
        self.map(|v| v * value)
    }

    /// Divide every value by a constant.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] for a non-finite or zero
    /// divisor.
    pub fn divide_scalar(&self, value: f64) -> Result<Self> {
        finite(value)?;
        if value == 0.0 {
            return Err(ProfileError::InvalidValue(value));
        }
        self.map(|v| v / value)
    }

    /// Element-wise sum.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if lengths differ.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise difference.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if lengths differ.
    pub fn subtract(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Element-wise product.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if lengths differ.
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Element-wise quotient.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::LengthMismatch`] if lengths differ and
    /// [`ProfileError::InvalidValue`] if any quotient is not finite.
    pub fn divide(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a / b)
    }

    /// Absolute value of every element.
    #[must_use]
    pub fn absolute(&self) -> Self {
        Self::from_finite(self.values.iter().map(|v| v.abs()).collect())
    }

    /// Raise every value to a power.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidValue`] if any result is not finite.
    pub fn power(&self, exponent: f64) -> Result<Self> {
        self.map(|v| v.powf(exponent))
    }

    /// Forward difference `v[i] - v[i + 1]`, wrapping at the end.
    #[must_use]
    pub fn derivative(&self) -> Self {
        let n = self.len();
        Self::from_finite(
            (0..n)
                .map(|i| self.values[i] - self.values[(i + 1) % n])
                .collect(),
        )
    }

    /// Sum of successive differences across a window around each point.
    ///
    /// The sum telescopes to `v[i + window] - v[i - window]`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn deltas(&self, window: usize) -> Self {
        let w = window.max(1) as isize;
        Self::from_finite(
            (0..self.len())
                .map(|i| {
                    let centre = i as isize;
                    self.get_wrapped(centre + w) - self.get_wrapped(centre - w)
                })
                .collect(),
        )
    }
}

impl TryFrom<Vec<f64>> for Profile {
    type Error = ProfileError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<Profile> for Vec<f64> {
    fn from(profile: Profile) -> Self {
        profile.values
    }
}

fn finite(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProfileError::InvalidValue(value))
    }
}

fn sum_squares(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
