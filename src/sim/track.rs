//! Course geometry: checkpoint loop, bounds, world colliders and generated layouts

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::collision::CircleCollider;
use crate::config::tuning::{LayoutTuning, RaceTuning};
use crate::util::math::{heading_of, lateral};

/// Ordered, cyclic checkpoint loop shared read-only by a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPath {
    points: Vec<DVec2>,
}

impl CheckpointPath {
    /// Build a loop. Paths with fewer than two points are padded so every
    /// query stays total.
    pub fn new(points: Vec<DVec2>) -> Self {
        let mut points = points;
        match points.len() {
            0 => points = vec![DVec2::ZERO, DVec2::new(0.0, -1.0)],
            1 => points.push(points[0] + DVec2::new(0.0, -1.0)),
            _ => {}
        }
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    /// Checkpoint position, wrapping the index around the loop
    pub fn point(&self, index: usize) -> DVec2 {
        self.points[index % self.points.len()]
    }

    /// Successor index on the loop
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.points.len()
    }

    /// Segment starting at checkpoint `index`, as (start, end)
    pub fn segment(&self, index: usize) -> (DVec2, DVec2) {
        (self.point(index), self.point(index + 1))
    }

    /// Length of the segment starting at checkpoint `index`
    pub fn segment_length(&self, index: usize) -> f64 {
        let (a, b) = self.segment(index);
        a.distance(b)
    }

    /// Unit direction of the segment starting at checkpoint `index`
    pub fn segment_dir(&self, index: usize) -> DVec2 {
        let (a, b) = self.segment(index);
        (b - a).try_normalize().unwrap_or(DVec2::new(0.0, -1.0))
    }

    /// Position at scalar progress `t` (checkpoint units, any magnitude)
    pub fn sample(&self, t: f64) -> DVec2 {
        let n = self.points.len() as f64;
        let wrapped = t.rem_euclid(n);
        let index = wrapped.floor() as usize;
        let frac = wrapped - wrapped.floor();
        let (a, b) = self.segment(index);
        a.lerp(b, frac)
    }

    /// Index and distance of the checkpoint nearest to `pos`
    pub fn closest(&self, pos: DVec2) -> (usize, f64) {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.distance(pos)))
            .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
    }

    /// Fraction of the segment from `index` toward its successor covered by `pos`
    pub fn segment_fraction(&self, index: usize, pos: DVec2) -> f64 {
        let (a, b) = self.segment(index);
        let ab = b - a;
        let len_sq = ab.length_squared();
        if len_sq <= f64::EPSILON {
            return 0.0;
        }
        ((pos - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    }
}

/// Hard rectangle the boats are clamped into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayBounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl PlayBounds {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn clamp(&self, pos: DVec2) -> DVec2 {
        pos.clamp(self.min, self.max)
    }

    pub fn contains(&self, pos: DVec2) -> bool {
        pos.cmpge(self.min).all() && pos.cmple(self.max).all()
    }
}

/// Boost pad: passing over it grants the race boost multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostPad {
    pub center: DVec2,
    pub radius: f64,
}

/// Static description of a course
#[derive(Debug, Clone)]
pub struct Course {
    pub path: CheckpointPath,
    pub bounds: PlayBounds,
    pub world_colliders: Vec<CircleCollider>,
}

impl Course {
    /// The harbour loop: eight checkpoints around a central island.
    /// The start line sits at checkpoint 0, `(0, -20)`.
    pub fn harbour() -> Self {
        let path = CheckpointPath::new(vec![
            DVec2::new(0.0, -20.0),
            DVec2::new(-57.0, -43.0),
            DVec2::new(-80.0, -100.0),
            DVec2::new(-57.0, -157.0),
            DVec2::new(0.0, -180.0),
            DVec2::new(57.0, -157.0),
            DVec2::new(80.0, -100.0),
            DVec2::new(57.0, -43.0),
        ]);

        let world_colliders = vec![
            CircleCollider::new(0.0, -100.0, 30.0, "island"),
            CircleCollider::new(-100.0, -20.0, 8.0, "pier"),
            CircleCollider::new(100.0, -190.0, 9.0, "lighthouse"),
        ];

        Self {
            path,
            bounds: PlayBounds::new(DVec2::new(-130.0, -230.0), DVec2::new(130.0, 30.0)),
            world_colliders,
        }
    }

    /// Heading that faces from the start line toward checkpoint 1
    pub fn start_heading(&self) -> f64 {
        heading_of(self.path.segment_dir(0))
    }

    /// Starting slot `slot` on the grid: slot 0 on the line, then alternating
    /// left/right lanes perpendicular to the first leg.
    pub fn grid_slot(&self, slot: usize, spacing: f64) -> (DVec2, f64) {
        let side = lateral(self.path.segment_dir(0));
        let lane = if slot == 0 {
            0.0
        } else {
            let rank = ((slot + 1) / 2) as f64;
            if slot % 2 == 1 {
                rank
            } else {
                -rank
            }
        };
        let offset = lane * spacing;
        (self.path.point(0) + side * offset, offset)
    }
}

/// Obstacles and pads generated for one run of a course
#[derive(Debug, Clone)]
pub struct Layout {
    pub seed: u64,
    pub obstacles: Vec<CircleCollider>,
    pub boost_pads: Vec<BoostPad>,
}

impl Layout {
    /// Scatter obstacles beside the racing line and pads on it.
    ///
    /// Obstacles keep clear of every checkpoint capture zone, the start grid
    /// and the world colliders, so a layout never blocks a checkpoint.
    pub fn generate(
        course: &Course,
        seed: u64,
        layout: &LayoutTuning,
        race: &RaceTuning,
        pad_radius: f64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let path = &course.path;
        let n = path.len();
        let mut obstacles: Vec<CircleCollider> = Vec::with_capacity(layout.obstacle_count);

        let min_r = layout.obstacle_min_radius.min(layout.obstacle_max_radius);
        let max_r = layout.obstacle_min_radius.max(layout.obstacle_max_radius);
        let min_off = layout.obstacle_min_offset.min(layout.obstacle_max_offset);
        let max_off = layout.obstacle_min_offset.max(layout.obstacle_max_offset);

        // Bounded attempts keep generation total on cramped courses
        let mut attempts = 0;
        while obstacles.len() < layout.obstacle_count && attempts < layout.obstacle_count * 40 {
            attempts += 1;

            let segment = rng.gen_range(0..n);
            let along = rng.gen_range(0.3..0.7);
            let radius = if max_r > min_r {
                rng.gen_range(min_r..max_r)
            } else {
                min_r
            };
            let offset = if max_off > min_off {
                rng.gen_range(min_off..max_off)
            } else {
                min_off
            };
            let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

            let (a, b) = path.segment(segment);
            let center = a.lerp(b, along) + lateral(path.segment_dir(segment)) * offset * side;

            let clear_of_checkpoints = path
                .points()
                .iter()
                .all(|p| p.distance(center) >= race.capture_radius + radius);
            let clear_of_world = course
                .world_colliders
                .iter()
                .chain(obstacles.iter())
                .all(|c| c.center().distance(center) >= c.radius + radius + 2.0);

            if clear_of_checkpoints && clear_of_world && course.bounds.contains(center) {
                obstacles.push(CircleCollider::new(
                    center.x,
                    center.y,
                    radius,
                    format!("obstacle-{}", obstacles.len()),
                ));
            }
        }

        let mut boost_pads = Vec::with_capacity(layout.boost_pad_count);
        for i in 0..layout.boost_pad_count {
            // Spread pads evenly, skipping the first leg off the start grid
            let segment = 1 + (i * (n - 1)) / layout.boost_pad_count.max(1);
            let (a, b) = path.segment(segment % n);
            let jitter = rng.gen_range(-2.0..2.0);
            let center = a.lerp(b, 0.5) + lateral(path.segment_dir(segment % n)) * jitter;
            boost_pads.push(BoostPad {
                center,
                radius: pad_radius,
            });
        }

        Self {
            seed,
            obstacles,
            boost_pads,
        }
    }
}
