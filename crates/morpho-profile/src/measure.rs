//! Measurement kinds: derive a [`Profile`] from a [`Boundary`].
//!
//! This module defines the [`ProfileMeasure`] trait for pluggable
//! per-point measurements and the [`ProfileKind`] enum for selecting
//! which one to use at runtime.
//!
//! # Strategy pattern
//!
//! Every kind shares the same [`Profile`] machinery downstream; only the
//! value computed at each boundary point differs. Adding a kind means
//! adding a variant and one match arm, not a new profile type.

use serde::{Deserialize, Serialize};

use crate::boundary::Boundary;
use crate::profile::Profile;

/// Selects which per-point measurement a profile holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Interior angle in degrees between the points one window either
    /// side. Convex regions read below 180, concave regions above.
    #[default]
    Angle,

    /// Distance to the point across the centroid.
    Diameter,

    /// Distance to the centroid.
    Radius,
}

impl ProfileKind {
    /// Every kind, in a stable order.
    pub const ALL: [Self; 3] = [Self::Angle, Self::Diameter, Self::Radius];

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Angle => "angle",
            Self::Diameter => "diameter",
            Self::Radius => "radius",
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for per-point boundary measurements.
///
/// Input: a closed boundary and a window size in points.
/// Output: one value per boundary point, index-aligned.
pub trait ProfileMeasure {
    /// Measure every point of the boundary.
    fn measure(&self, boundary: &Boundary, window: usize) -> Profile;
}

impl ProfileMeasure for ProfileKind {
    fn measure(&self, boundary: &Boundary, window: usize) -> Profile {
        match *self {
            Self::Angle => measure_angle(boundary, window),
            Self::Diameter => measure_diameter(boundary),
            Self::Radius => measure_radius(boundary),
        }
    }
}

/// Angle window for a boundary: `ceil(len * proportion)` clamped to
/// `[1, (len - 1) / 2]`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn window_size(len: usize, proportion: f64) -> usize {
    let raw = (len as f64 * proportion).ceil().max(1.0) as usize;
    raw.clamp(1, ((len.saturating_sub(1)) / 2).max(1))
}

#[allow(clippy::cast_possible_wrap)]
fn measure_angle(boundary: &Boundary, window: usize) -> Profile {
    let w = window.max(1) as isize;
    let values = boundary
        .points()
        .iter()
        .enumerate()
        .map(|(i, &here)| {
            let centre = i as isize;
            let before = boundary.point_wrapped(centre - w);
            let after = boundary.point_wrapped(centre + w);
            let angle = here.angle_between(before, after);
            if boundary.contains(before.midpoint(after)) {
                angle
            } else {
                360.0 - angle
            }
        })
        .collect();
    Profile::from_finite(values)
}

fn measure_diameter(boundary: &Boundary) -> Profile {
    let values = (0..boundary.len())
        .map(|i| {
            let here = boundary.points()[i];
            boundary
                .opposite_index(i)
                .map_or(0.0, |j| here.distance(boundary.points()[j]))
        })
        .collect();
    Profile::from_finite(values)
}

fn measure_radius(boundary: &Boundary) -> Profile {
    let centroid = boundary.centroid();
    Profile::from_finite(
        boundary
            .points()
            .iter()
            .map(|p| p.distance(centroid))
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::boundary::regular_polygon;
    use crate::types::Point;

    fn circle(n: usize) -> Boundary {
        Boundary::new(regular_polygon(Point::new(0.0, 0.0), 10.0, n)).unwrap()
    }

    /// A square with a notch cut into the middle of its bottom edge.
    fn notched() -> Boundary {
        Boundary::new(vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 2.0),
            Point::new(4.0, 0.0),
            Point::new(6.0, 0.0),
            Point::new(6.0, 6.0),
            Point::new(0.0, 6.0),
        ])
        .unwrap()
    }

    #[test]
    fn default_is_angle() {
        assert_eq!(ProfileKind::default(), ProfileKind::Angle);
        assert_eq!(ProfileKind::Diameter.to_string(), "diameter");
    }

    #[test]
    fn kind_serde_names() {
        let json = serde_json::to_string(&ProfileKind::Radius).unwrap();
        assert_eq!(json, "\"radius\"");
    }

    #[test]
    fn window_size_clamps() {
        assert_eq!(window_size(100, 0.05), 5);
        assert_eq!(window_size(10, 0.001), 1);
        assert_eq!(window_size(10, 0.9), 4);
        assert_eq!(window_size(3, 0.5), 1);
    }

    #[test]
    fn radius_of_circle_is_constant() {
        let profile = ProfileKind::Radius.measure(&circle(24), 1);
        assert_eq!(profile.len(), 24);
        for v in profile.iter() {
            assert!((v - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn diameter_of_circle_is_twice_radius() {
        let profile = ProfileKind::Diameter.measure(&circle(24), 1);
        for v in profile.iter() {
            assert!((v - 20.0).abs() < 1e-9);
        }
    }

    #[test]
    fn angle_of_regular_polygon_is_interior_angle() {
        // Interior angle of a regular 12-gon is 150 degrees.
        let profile = ProfileKind::Angle.measure(&circle(12), 1);
        for v in profile.iter() {
            assert!((v - 150.0).abs() < 1e-9);
        }
    }

    #[test]
    fn angle_reflex_at_notch() {
        let profile = ProfileKind::Angle.measure(&notched(), 1);
        // The notch apex points into the shape.
        assert!(profile.get(2).unwrap() > 180.0);
        // Square corners stay convex.
        assert!((profile.get(5).unwrap() - 90.0).abs() < 1e-9);
    }
}
