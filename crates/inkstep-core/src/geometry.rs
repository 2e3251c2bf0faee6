//! Geometry helpers shared by the recognizer, generator and renderer.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A captured pointer sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// Position in canvas coordinates.
    pub point: Point,
    /// Milliseconds since the gesture started.
    pub timestamp_ms: f64,
}

impl PathPoint {
    pub fn new(point: Point, timestamp_ms: f64) -> Self {
        Self { point, timestamp_ms }
    }
}

/// Axis-aligned bounding box of a point set.
pub fn bounds_of(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut rect = Rect::from_points(*first, *first);
    for point in &points[1..] {
        rect = rect.union_pt(*point);
    }
    Some(rect)
}

/// Sum of distances between consecutive points.
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Unsigned turning angle (radians) between two segment vectors.
///
/// Degenerate (zero-length) segments do not turn.
pub fn turning_angle(a: Vec2, b: Vec2) -> f64 {
    if a.hypot2() < f64::EPSILON || b.hypot2() < f64::EPSILON {
        return 0.0;
    }
    let cross = a.cross(b);
    let dot = a.dot(b);
    cross.atan2(dot).abs()
}

/// Turning angles at every interior point of a polyline.
pub fn turning_angles(points: &[Point]) -> Vec<f64> {
    points
        .windows(3)
        .map(|w| turning_angle(w[1] - w[0], w[2] - w[1]))
        .collect()
}

/// Mean absolute turning angle along a polyline (0 for fewer than 3 points).
pub fn mean_curvature(points: &[Point]) -> f64 {
    let angles = turning_angles(points);
    if angles.is_empty() {
        return 0.0;
    }
    angles.iter().sum::<f64>() / angles.len() as f64
}

/// Linear interpolation between two points.
pub fn lerp(a: Point, b: Point, t: f64) -> Point {
    a.lerp(b, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_bounds_of_empty() {
        assert!(bounds_of(&[]).is_none());
    }

    #[test]
    fn test_bounds_of_points() {
        let rect = bounds_of(&[
            Point::new(10.0, 5.0),
            Point::new(-2.0, 8.0),
            Point::new(4.0, 30.0),
        ])
        .unwrap();
        assert_eq!(rect, Rect::new(-2.0, 5.0, 10.0, 30.0));
    }

    #[test]
    fn test_polyline_length() {
        let len = polyline_length(&[
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ]);
        assert!((len - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_turning_angle_right_angle() {
        let angle = turning_angle(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0));
        assert!((angle - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_straight_line_has_no_curvature() {
        let points: Vec<Point> = (0..10).map(|i| Point::new(i as f64 * 5.0, 0.0)).collect();
        assert!(mean_curvature(&points) < 1e-9);
    }
}
