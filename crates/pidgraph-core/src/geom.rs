//! Pure value geometry shared by the parser, the instance matcher and the
//! connection detector. No I/O happens here.

use serde::{Deserialize, Serialize};

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Vector = euclid::Vector2D<f64, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn vector(x: f64, y: f64) -> Vector {
    euclid::vec2(x, y)
}

pub fn distance(a: Point, b: Point) -> f64 {
    (b - a).length()
}

pub fn mid_point(a: Point, b: Point) -> Point {
    point((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

pub fn average(points: &[Point]) -> Point {
    if points.is_empty() {
        return point(0.0, 0.0);
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    point(sx / n, sy / n)
}

/// Rotates `p` around `pivot` by `degrees` (counter-clockwise, y-up).
pub fn rotate_about(p: Point, pivot: Point, degrees: f64) -> Point {
    let rad = degrees.to_radians();
    let (sin, cos) = rad.sin_cos();
    let dx = p.x - pivot.x;
    let dy = p.y - pivot.y;
    point(
        pivot.x + dx * cos - dy * sin,
        pivot.y + dx * sin + dy * cos,
    )
}

/// Translates `p` by `translation`, then scales the result about the origin.
pub fn translate_and_scale(p: Point, translation: Vector, scale: f64) -> Point {
    point((p.x + translation.x) * scale, (p.y + translation.y) * scale)
}

/// Angle of the vector `a -> b` in degrees, normalized to `[0, 360)`.
pub fn angle_degrees(a: Point, b: Point) -> f64 {
    normalize_degrees((b.y - a.y).atan2(b.x - a.x).to_degrees())
}

pub fn normalize_degrees(degrees: f64) -> f64 {
    let d = degrees % 360.0;
    if d < 0.0 { d + 360.0 } else { d }
}

/// Smallest absolute difference between two angles in degrees, in `[0, 180]`.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let d = (normalize_degrees(a) - normalize_degrees(b)).abs();
    if d > 180.0 { 360.0 - d } else { d }
}

/// Axis-aligned box with the `{ x, y, width, height }` JSON shape used by
/// view boxes and symbol representations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn min(&self) -> Point {
        point(self.x, self.y)
    }

    pub fn max(&self) -> Point {
        point(self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Point {
        point(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = (self.x + self.width).max(other.x + other.width);
        let max_y = (self.y + self.height).max(other.y + other.height);
        BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x
            && p.x <= self.x + self.width
            && p.y >= self.y
            && p.y <= self.y + self.height
    }

    /// Minimum distance between the two boxes; zero when they overlap.
    pub fn distance_to(&self, other: &BoundingBox) -> f64 {
        let dx = (other.x - (self.x + self.width))
            .max(self.x - (other.x + other.width))
            .max(0.0);
        let dy = (other.y - (self.y + self.height))
            .max(self.y - (other.y + other.height))
            .max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance_to_point(&self, p: Point) -> f64 {
        let dx = (self.x - p.x).max(p.x - (self.x + self.width)).max(0.0);
        let dy = (self.y - p.y).max(p.y - (self.y + self.height)).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Result of [`closest_points_on_segments`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoints {
    pub on_first: Point,
    pub on_second: Point,
    pub distance: f64,
}

pub fn closest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let ab = b - a;
    let len_sq = ab.square_length();
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point(a.x + ab.x * t, a.y + ab.y * t)
}

/// Closest point pair between the segments `a1-a2` and `b1-b2`.
///
/// A true intersection (from solving the 2x2 linear system of the two
/// parametrized lines, with both parameters inside `[0, 1]`) wins with
/// distance zero. Parallel or non-intersecting segments fall back to testing
/// every endpoint against the opposite segment and keeping the closest pair.
pub fn closest_points_on_segments(a1: Point, a2: Point, b1: Point, b2: Point) -> ClosestPoints {
    let d1 = a2 - a1;
    let d2 = b2 - b1;
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() > f64::EPSILON {
        let dx = b1.x - a1.x;
        let dy = b1.y - a1.y;
        let s = (dx * d2.y - dy * d2.x) / denom;
        let t = (dx * d1.y - dy * d1.x) / denom;
        if (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t) {
            let p = point(a1.x + d1.x * s, a1.y + d1.y * s);
            return ClosestPoints {
                on_first: p,
                on_second: p,
                distance: 0.0,
            };
        }
    }

    let candidates = [
        (a1, closest_point_on_segment(a1, b1, b2)),
        (a2, closest_point_on_segment(a2, b1, b2)),
        (closest_point_on_segment(b1, a1, a2), b1),
        (closest_point_on_segment(b2, a1, a2), b2),
    ];
    let mut best = ClosestPoints {
        on_first: candidates[0].0,
        on_second: candidates[0].1,
        distance: distance(candidates[0].0, candidates[0].1),
    };
    for &(on_first, on_second) in &candidates[1..] {
        let d = distance(on_first, on_second);
        if d < best.distance {
            best = ClosestPoints {
                on_first,
                on_second,
                distance: d,
            };
        }
    }
    best
}
