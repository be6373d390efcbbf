//! Shared types for the morpho profile engine.

use serde::{Deserialize, Serialize};

use crate::landmark::Landmark;
use crate::segment::SegmentId;

/// A 2D point in outline coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Midpoint between this point and another.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Bearing of `other` as seen from this point, in degrees `[0, 360)`.
    ///
    /// Zero points along +x and angles increase towards +y.
    #[must_use]
    pub fn bearing_to(self, other: Self) -> f64 {
        (other.y - self.y)
            .atan2(other.x - self.x)
            .to_degrees()
            .rem_euclid(360.0)
    }

    /// Angle in degrees `[0, 180]` subtended at this point by `a` and `b`.
    ///
    /// Returns `0.0` when either arm has zero length.
    #[must_use]
    pub fn angle_between(self, a: Self, b: Self) -> f64 {
        let (ax, ay) = (a.x - self.x, a.y - self.y);
        let (bx, by) = (b.x - self.x, b.y - self.y);
        let cross = ax.mul_add(by, -(ay * bx));
        let dot = ax.mul_add(bx, ay * by);
        // atan2(0, 0) is 0, covering the degenerate arm.
        cross.atan2(dot).abs().to_degrees()
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(p: geo::Point<f64>) -> Self {
        Self::new(p.x(), p.y())
    }
}

/// Configuration for profile construction, segmentation, and comparison.
///
/// All parameters have defaults exposed as `DEFAULT_*` constants so
/// command-line front ends can reuse them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction of the perimeter used as the angle measurement window.
    pub window_proportion: f64,

    /// Minimum number of indices any segment may cover.
    pub min_segment_length: usize,

    /// Length every profile is resampled to before population comparison.
    pub comparison_length: usize,

    /// How far a boundary may move in either direction while fitting a
    /// template segmentation onto a new profile.
    pub fit_search_radius: usize,
}

impl EngineConfig {
    /// Default angle window proportion.
    pub const DEFAULT_WINDOW_PROPORTION: f64 = 0.05;

    /// Default minimum segment length.
    pub const DEFAULT_MIN_SEGMENT_LENGTH: usize = 5;

    /// Default population comparison length.
    pub const DEFAULT_COMPARISON_LENGTH: usize = 500;

    /// Default segment fitting search radius.
    pub const DEFAULT_FIT_SEARCH_RADIUS: usize = 10;

    /// Check that every field is within its usable range.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<()> {
        if !(self.window_proportion > 0.0 && self.window_proportion < 1.0) {
            return Err(ProfileError::InvalidConfig(format!(
                "window_proportion must be in (0, 1), got {}",
                self.window_proportion
            )));
        }
        if self.min_segment_length == 0 {
            return Err(ProfileError::InvalidConfig(
                "min_segment_length must be at least 1".to_string(),
            ));
        }
        if self.comparison_length < crate::profile::MIN_PROFILE_LENGTH {
            return Err(ProfileError::InvalidConfig(format!(
                "comparison_length must be at least {}, got {}",
                crate::profile::MIN_PROFILE_LENGTH,
                self.comparison_length
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_proportion: Self::DEFAULT_WINDOW_PROPORTION,
            min_segment_length: Self::DEFAULT_MIN_SEGMENT_LENGTH,
            comparison_length: Self::DEFAULT_COMPARISON_LENGTH,
            fit_search_radius: Self::DEFAULT_FIT_SEARCH_RADIUS,
        }
    }
}

/// Errors raised by profile, landmark, and segmentation operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ProfileError {
    /// A landmark was requested that has no assigned index.
    #[error("landmark {0} is not assigned")]
    UnavailableLandmark(Landmark),

    /// A segment was requested that is not in the partition.
    #[error("segment {0} is not present")]
    UnavailableSegment(SegmentId),

    /// An index fell outside `[0, len)`.
    #[error("index {index} is out of bounds for length {len}")]
    InvalidIndex {
        /// The offending index.
        index: usize,
        /// Length of the ring it was applied to.
        len: usize,
    },

    /// A fractional position fell outside `[0, 1)`.
    #[error("fraction {0} is outside [0, 1)")]
    InvalidFraction(f64),

    /// A structural segment change would break coverage or minimum length.
    #[error("segment update rejected: {0}")]
    SegmentUpdateRejected(String),

    /// Lengths or segment identifier sets could not be matched.
    #[error("length mismatch: {0}")]
    LengthMismatch(String),

    /// A value was NaN or infinite.
    #[error("value {0} is not finite")]
    InvalidValue(f64),

    /// Too few points to form a closed outline.
    #[error("a boundary needs at least 3 points, got {0}")]
    DegenerateBoundary(usize),

    /// The landmark is computed from another and cannot be set directly.
    #[error("landmark {0} is derived and cannot be set directly")]
    DerivedLandmark(Landmark),

    /// A population statistic was requested with no usable members.
    #[error("no population members could be aggregated")]
    EmptyPopulation,

    /// Engine configuration is invalid.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for results carrying a [`ProfileError`].
pub type Result<T> = std::result::Result<T, ProfileError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_midpoint() {
        let m = Point::new(0.0, 2.0).midpoint(Point::new(4.0, 0.0));
        assert_eq!(m, Point::new(2.0, 1.0));
    }

    #[test]
    fn bearing_quadrants() {
        let o = Point::new(0.0, 0.0);
        assert!((o.bearing_to(Point::new(1.0, 0.0))).abs() < 1e-10);
        assert!((o.bearing_to(Point::new(0.0, 1.0)) - 90.0).abs() < 1e-10);
        assert!((o.bearing_to(Point::new(-1.0, 0.0)) - 180.0).abs() < 1e-10);
        assert!((o.bearing_to(Point::new(0.0, -1.0)) - 270.0).abs() < 1e-10);
    }

    #[test]
    fn angle_between_right_and_straight() {
        let o = Point::new(0.0, 0.0);
        let right = o.angle_between(Point::new(1.0, 0.0), Point::new(0.0, 1.0));
        assert!((right - 90.0).abs() < 1e-10);
        let straight = o.angle_between(Point::new(1.0, 0.0), Point::new(-1.0, 0.0));
        assert!((straight - 180.0).abs() < 1e-10);
    }

    #[test]
    fn angle_between_degenerate_arm_is_zero() {
        let o = Point::new(1.0, 1.0);
        assert!(o.angle_between(o, Point::new(2.0, 2.0)).abs() < f64::EPSILON);
    }

    // --- EngineConfig tests ---

    #[test]
    fn config_defaults() {
        let config = EngineConfig::default();
        assert!((config.window_proportion - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.min_segment_length, 5);
        assert_eq!(config.comparison_length, 500);
        assert_eq!(config.fit_search_radius, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_bad_window() {
        let config = EngineConfig {
            window_proportion: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ProfileError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_rejects_short_comparison_length() {
        let config = EngineConfig {
            comparison_length: 2,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"min_segment_length": 8}"#).unwrap();
        assert_eq!(config.min_segment_length, 8);
        assert_eq!(config.comparison_length, EngineConfig::DEFAULT_COMPARISON_LENGTH);
    }

    // --- ProfileError tests ---

    #[test]
    fn error_display() {
        let err = ProfileError::InvalidIndex { index: 12, len: 10 };
        assert_eq!(err.to_string(), "index 12 is out of bounds for length 10");
        let err = ProfileError::UnavailableLandmark(Landmark::Orientation);
        assert_eq!(err.to_string(), "landmark orientation is not assigned");
        let err = ProfileError::UnavailableSegment(SegmentId::new(4));
        assert_eq!(err.to_string(), "segment #4 is not present");
    }

    #[test]
    fn error_serde_round_trip() {
        let err = ProfileError::SegmentUpdateRejected("too short".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: ProfileError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
