use super::Point2d;
use cgmath::prelude::*;

/// Checks whether `point` lies within `margin` of `target`.
pub fn in_range(point: Point2d, target: Point2d, margin: f64) -> bool {
    point.distance(target) <= margin
}

/// Converts a point into an `[x, y]` array.
pub fn to_array(point: Point2d) -> [f64; 2] {
    [point.x, point.y]
}

/// Creates a point from an `[x, y]` array.
pub fn from_array(coords: [f64; 2]) -> Point2d {
    Point2d::new(coords[0], coords[1])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn in_range_is_inclusive() {
        let origin = Point2d::new(0.0, 0.0);
        assert!(in_range(origin, Point2d::new(1.0, 0.0), 1.0));
        assert!(in_range(origin, Point2d::new(0.6, 0.6), 1.0));
        assert!(!in_range(origin, Point2d::new(0.8, 0.8), 1.0));
        assert!(in_range(origin, origin, 0.0));
    }
}
