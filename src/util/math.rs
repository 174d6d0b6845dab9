//! Ground-plane math helpers.
//!
//! Positions are `DVec2` where `.x` is world x and `.y` is world z.
//! A heading of 0 faces −z and positive headings turn toward −x.

use glam::DVec2;

/// Unit vector a boat with `heading` moves along.
pub fn forward_dir(heading: f64) -> DVec2 {
    DVec2::new(-heading.sin(), -heading.cos())
}

/// Heading that faces along `dir`. Zero vectors map to heading 0.
pub fn heading_of(dir: DVec2) -> f64 {
    if dir.length_squared() <= f64::EPSILON {
        return 0.0;
    }
    (-dir.x).atan2(-dir.y)
}

/// Signed minimal rotation from `from` to `to`, in `(-π, π]`.
pub fn shortest_angle(from: f64, to: f64) -> f64 {
    let delta = to - from;
    delta.sin().atan2(delta.cos())
}

/// Left-hand perpendicular of a ground-plane direction.
pub fn lateral(dir: DVec2) -> DVec2 {
    DVec2::new(-dir.y, dir.x)
}
