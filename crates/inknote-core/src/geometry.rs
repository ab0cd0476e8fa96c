//! Pure geometry kernel: bounding boxes, polygon containment, straight-line
//! detection and stroke path shaping.

use crate::model::SamplePoint;
use kurbo::{BezPath, Point, Rect, Vec2};

/// Minimum rendered segment width regardless of pressure.
pub const MIN_SEGMENT_WIDTH: f64 = 0.5;

/// Axis-aligned bounding box of a sample path. Empty input yields `Rect::ZERO`.
pub fn bbox(points: &[SamplePoint]) -> Rect {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return Rect::ZERO;
    };
    let mut rect = Rect::new(first.x, first.y, first.x, first.y);
    for p in iter {
        rect.x0 = rect.x0.min(p.x);
        rect.y0 = rect.y0.min(p.y);
        rect.x1 = rect.x1.max(p.x);
        rect.y1 = rect.y1.max(p.y);
    }
    rect
}

/// Pressure-scaled segment width: `max(0.5, base * (0.4 + pressure * 1.2))`.
pub fn segment_width(base_width: f64, pressure: f64) -> f64 {
    (base_width * (0.4 + pressure * 1.2)).max(MIN_SEGMENT_WIDTH)
}

/// Even-odd point-in-polygon test via ray casting.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Maximum deviation of the path from the chord between its first and last
/// sample. Used by the straight-line snap.
pub fn max_chord_deviation(points: &[SamplePoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let first = points[0].pos();
    let last = points[points.len() - 1].pos();
    points[1..points.len() - 1]
        .iter()
        .map(|p| point_to_segment_dist(p.pos(), first, last))
        .fold(0.0, f64::max)
}

/// True if the path stays within `tolerance` of its chord.
pub fn is_straight(points: &[SamplePoint], tolerance: f64) -> bool {
    max_chord_deviation(points) < tolerance
}

/// Smooth a sample path with quadratic midpoint curves: each sample becomes
/// the control point of a quad toward the midpoint of the next segment.
/// Fewer than three samples degrade to a straight polyline.
pub fn smoothed_path(points: &[SamplePoint]) -> BezPath {
    let mut path = BezPath::new();
    let Some(first) = points.first() else {
        return path;
    };
    path.move_to(first.pos());
    if points.len() < 3 {
        for p in &points[1..] {
            path.line_to(p.pos());
        }
        return path;
    }
    for w in points.windows(2).skip(1) {
        let ctrl = w[0].pos();
        let mid = Point::new((w[0].x + w[1].x) / 2.0, (w[0].y + w[1].y) / 2.0);
        path.quad_to(ctrl, mid);
    }
    // Finish at the actual last sample.
    path.line_to(points[points.len() - 1].pos());
    path
}

/// Approximate metrics for a multi-line text block: width of the longest
/// line at ~0.6em average advance, line height 1.4 × font size.
pub fn text_block_size(content: &str, font_size: f64) -> (f64, f64) {
    let lines = content.lines().count().max(1);
    let longest = content.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    (longest as f64 * font_size * 0.6, lines as f64 * font_size * 1.4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(coords: &[(f64, f64)]) -> Vec<SamplePoint> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| SamplePoint::new(x, y, 0.5, i as u64 * 16))
            .collect()
    }

    #[test]
    fn test_bbox_exact() {
        let pts = samples(&[(10.0, 40.0), (-5.0, 12.0), (30.0, 3.0)]);
        assert_eq!(bbox(&pts), Rect::new(-5.0, 3.0, 30.0, 40.0));
    }

    #[test]
    fn test_bbox_empty() {
        assert_eq!(bbox(&[]), Rect::ZERO);
    }

    #[test]
    fn test_segment_width_floor() {
        assert_eq!(segment_width(0.1, 0.0), MIN_SEGMENT_WIDTH);
        // base 2.0 at pressure 0.5: 2.0 * (0.4 + 0.6) = 2.0
        assert!((segment_width(2.0, 0.5) - 2.0).abs() < 1e-12);
        // full pressure widens: 2.0 * 1.6 = 3.2
        assert!((segment_width(2.0, 1.0) - 3.2).abs() < 1e-12);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Point::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &square));
        assert!(!point_in_polygon(Point::new(5.0, -1.0), &square));
    }

    #[test]
    fn test_point_in_polygon_concave() {
        // L-shape; the notch is outside.
        let poly = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Point::new(2.0, 8.0), &poly));
        assert!(!point_in_polygon(Point::new(8.0, 8.0), &poly));
    }

    #[test]
    fn test_straightness() {
        let straight = samples(&[(0.0, 0.0), (5.0, 0.1), (10.0, 0.0)]);
        assert!(is_straight(&straight, 1.0));

        let bent = samples(&[(0.0, 0.0), (5.0, 20.0), (10.0, 0.0)]);
        assert!(!is_straight(&bent, 8.0));
        assert!((max_chord_deviation(&bent) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_smoothed_path_endpoints() {
        let pts = samples(&[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0), (30.0, 10.0)]);
        let path = smoothed_path(&pts);
        let elements: Vec<_> = path.elements().to_vec();
        assert!(matches!(elements.first(), Some(kurbo::PathEl::MoveTo(p)) if *p == Point::ZERO));
        assert!(matches!(elements.last(), Some(kurbo::PathEl::LineTo(p)) if *p == Point::new(30.0, 10.0)));
    }

    #[test]
    fn test_text_block_size() {
        let (w, h) = text_block_size("ab\nabcd", 10.0);
        assert!((w - 24.0).abs() < 1e-9);
        assert!((h - 28.0).abs() < 1e-9);
    }
}
