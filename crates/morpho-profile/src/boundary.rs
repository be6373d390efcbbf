//! Closed outlines as fixed-length rings of points.
//!
//! A [`Boundary`] is stored as a single index-addressed array. Neighbour
//! lookup is wrap arithmetic (`i ± 1 mod N`) rather than a linked ring,
//! so reversal and rotation are whole-array remaps that can never leave
//! the ring half-relinked.

use geo::{Centroid, Contains};
use serde::{Deserialize, Serialize};

use crate::ring;
use crate::types::{Point, ProfileError, Result};

/// Minimum number of points in a closed outline.
pub const MIN_BOUNDARY_POINTS: usize = 3;

/// A closed outline: `points[N-1]` connects back to `points[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Boundary {
    points: Vec<Point>,
    polygon: geo::Polygon<f64>,
    centroid: Point,
    perimeter: f64,
}

impl Boundary {
    /// Build a boundary from an ordered point ring.
    ///
    /// The ring is implicitly closed; do not repeat the first point at
    /// the end.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::DegenerateBoundary`] for fewer than three
    /// points and [`ProfileError::InvalidValue`] for non-finite
    /// coordinates.
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.len() < MIN_BOUNDARY_POINTS {
            return Err(ProfileError::DegenerateBoundary(points.len()));
        }
        if let Some(bad) = points
            .iter()
            .flat_map(|p| [p.x, p.y])
            .find(|v| !v.is_finite())
        {
            return Err(ProfileError::InvalidValue(bad));
        }
        Ok(Self::from_valid_points(points))
    }

    fn from_valid_points(points: Vec<Point>) -> Self {
        let exterior: Vec<geo::Coord<f64>> = points.iter().map(|&p| p.into()).collect();
        let polygon = geo::Polygon::new(geo::LineString::from(exterior), vec![]);
        let centroid = polygon
            .centroid()
            .map_or_else(|| mean_point(&points), Point::from);
        let perimeter = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(a, b)| a.distance(*b))
            .sum();
        Self {
            points,
            polygon,
            centroid,
            perimeter,
        }
    }

    /// Number of points in the ring.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false` for a constructed boundary.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points in ring order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Point at an index.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `index >= len`.
    pub fn point(&self, index: usize) -> Result<Point> {
        self.points
            .get(index)
            .copied()
            .ok_or(ProfileError::InvalidIndex {
                index,
                len: self.len(),
            })
    }

    /// Point at any signed index, wrapping around the ring.
    #[must_use]
    pub fn point_wrapped(&self, index: isize) -> Point {
        self.points[ring::wrap(index, self.len())]
    }

    /// Index of the point following `index`.
    #[must_use]
    pub const fn next_index(&self, index: usize) -> usize {
        ring::offset(index, 1, self.len())
    }

    /// Index of the point preceding `index`.
    #[must_use]
    pub const fn prev_index(&self, index: usize) -> usize {
        ring::offset(index, -1, self.len())
    }

    /// Index of the first point exactly coincident with `point`.
    #[must_use]
    pub fn index_of(&self, point: Point) -> Option<usize> {
        self.points.iter().position(|&p| p == point)
    }

    /// Index of the boundary point nearest to an arbitrary location.
    #[must_use]
    pub fn closest_index(&self, point: Point) -> usize {
        self.points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.distance_squared(point)
                    .total_cmp(&b.distance_squared(point))
            })
            .map_or(0, |(i, _)| i)
    }

    /// Area centroid of the enclosed region.
    #[must_use]
    pub const fn centroid(&self) -> Point {
        self.centroid
    }

    /// Total length of the closed outline.
    #[must_use]
    pub const fn perimeter(&self) -> f64 {
        self.perimeter
    }

    /// Whether a location lies strictly inside the outline.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        let coord: geo::Coord<f64> = point.into();
        self.polygon.contains(&coord)
    }

    /// Index of the point across the centroid from `index`.
    ///
    /// Only points farther from the query point than the query point is
    /// from the centroid are considered; among those, the one whose angle
    /// at the centroid is closest to 180 degrees wins. If nothing passes
    /// the distance filter, the farthest point is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `index >= len`.
    pub fn opposite_index(&self, index: usize) -> Result<usize> {
        let query = self.point(index)?;
        let to_centroid = query.distance(self.centroid);

        let best = self
            .points
            .iter()
            .enumerate()
            .filter(|&(j, p)| j != index && query.distance(*p) > to_centroid)
            .map(|(j, p)| {
                let angle = self.centroid.angle_between(query, *p);
                (j, (180.0 - angle).abs())
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((j, deviation)) = best {
            tracing::trace!(index, opposite = j, deviation, "opposite point found");
            return Ok(j);
        }

        tracing::trace!(index, "no point passed the distance filter, using farthest");
        Ok(self
            .points
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.distance_squared(query)
                    .total_cmp(&b.distance_squared(query))
            })
            .map_or(index, |(j, _)| j))
    }

    /// Index of the point whose bearing from the centroid is closest to
    /// `bearing` degrees.
    #[must_use]
    pub fn nearest_bearing_index(&self, bearing: f64) -> usize {
        let target = bearing.rem_euclid(360.0);
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let diff = (self.centroid.bearing_to(*p) - target).abs();
                (i, diff.min(360.0 - diff))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(i, _)| i)
    }

    /// Invert the ring order. Index `i` moves to `len - 1 - i`.
    pub fn reverse(&mut self) {
        let mut points = std::mem::take(&mut self.points);
        points.reverse();
        *self = Self::from_valid_points(points);
    }

    /// Re-index so that the point at `zero` becomes index 0.
    ///
    /// Every old index `j` maps to `wrap(j - zero)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidIndex`] if `zero >= len`.
    pub fn rotate(&mut self, zero: usize) -> Result<()> {
        if zero >= self.len() {
            return Err(ProfileError::InvalidIndex {
                index: zero,
                len: self.len(),
            });
        }
        let mut points = std::mem::take(&mut self.points);
        points.rotate_left(zero);
        *self = Self::from_valid_points(points);
        Ok(())
    }
}

impl TryFrom<Vec<Point>> for Boundary {
    type Error = ProfileError;

    fn try_from(points: Vec<Point>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<Boundary> for Vec<Point> {
    fn from(boundary: Boundary) -> Self {
        boundary.points
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_point(points: &[Point]) -> Point {
    let n = points.len().max(1) as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Build a regular polygon ring, mainly for tests and demos.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn regular_polygon(center: Point, radius: f64, n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let theta = std::f64::consts::TAU * i as f64 / n as f64;
            Point::new(
                radius.mul_add(theta.cos(), center.x),
                radius.mul_add(theta.sin(), center.y),
            )
        })
        .collect()
}
