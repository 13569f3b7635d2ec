use crate::math::{Point2d, Vector2d};

/// Computes the displacement of length `dist` along the bearing from `from` to `to`.
///
/// The bearing is resolved with `atan2`, so targets in every quadrant, and on the
/// axes between them, give a displacement pointing straight at `to`.
/// Coincident points give a displacement along the positive x-axis.
pub fn bearing_step(from: Point2d, to: Point2d, dist: f64) -> Vector2d {
    let delta = to - from;
    let angle = delta.y.atan2(delta.x);
    Vector2d::new(dist * angle.cos(), dist * angle.sin())
}

/// Moves `from` by `dist` towards `to`.
pub fn move_towards(from: Point2d, to: Point2d, dist: f64) -> Point2d {
    from + bearing_step(from, to, dist)
}
