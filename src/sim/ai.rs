//! Scripted rivals that follow the checkpoint loop

use glam::DVec2;
use rand::Rng;

use super::boat::{apply_hit_windows, resolve_position, HitKind, KinematicState, StepContext};
use super::collision::{ActorKey, ActorPositionTable, CircleCollider};
use super::track::CheckpointPath;
use super::SimError;
use crate::config::tuning::AiTuning;
use crate::util::math::{heading_of, lateral, shortest_angle};
use crate::util::time::damping;

/// Checkpoint crossed by a follower
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub actor_id: String,
    /// Checkpoints passed since the start, across laps
    pub absolute_checkpoint_count: u32,
    pub lap: u32,
}

/// Result of one follower step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowerOutcome {
    pub hit: Option<HitKind>,
    pub progress: Vec<ProgressEvent>,
}

/// Rival boat advancing along the checkpoint loop
#[derive(Debug)]
pub struct PathFollower {
    key: ActorKey,
    pub state: KinematicState,
    pub radius: f64,
    /// Progress along the loop in checkpoint units
    t: f64,
    /// Constant lateral offset from the racing line
    lane: f64,
    /// Per-boat wobble phase
    phase: f64,
    elapsed: f64,
    /// Set once the final lap is complete; progress is no longer reported
    done: bool,
    tuning: AiTuning,
}

impl PathFollower {
    /// Spawn at the start of the loop in `lane`, with a random wobble phase
    pub fn spawn<R: Rng>(
        actors: &mut ActorPositionTable,
        id: impl Into<String>,
        path: &CheckpointPath,
        lane: f64,
        radius: f64,
        tuning: AiTuning,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        let position = Self::lane_point(path, 0.0, lane);
        let key = actors.spawn(id, position)?;
        Ok(Self {
            key,
            state: KinematicState::at(position, heading_of(path.segment_dir(0))),
            radius,
            t: 0.0,
            lane,
            phase: rng.gen_range(0.0..std::f64::consts::TAU),
            elapsed: 0.0,
            done: false,
            tuning,
        })
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn progress(&self) -> f64 {
        self.t
    }

    pub fn despawn(self, actors: &mut ActorPositionTable) {
        actors.despawn(self.key);
    }

    /// Back to the start line at rest
    pub fn respawn<R: Rng>(&mut self, actors: &mut ActorPositionTable, path: &CheckpointPath, rng: &mut R) {
        let position = Self::lane_point(path, 0.0, self.lane);
        self.state = KinematicState::at(position, heading_of(path.segment_dir(0)));
        self.t = 0.0;
        self.elapsed = 0.0;
        self.done = false;
        self.phase = rng.gen_range(0.0..std::f64::consts::TAU);
        actors.publish(&self.key, position);
    }

    fn lane_point(path: &CheckpointPath, t: f64, lane: f64) -> DVec2 {
        let segment = t.rem_euclid(path.len() as f64).floor() as usize;
        path.sample(t) + lateral(path.segment_dir(segment)) * lane
    }

    /// Sideways nudge away from obstacles ahead on the current segment.
    ///
    /// Obstacles behind, beyond `lookahead` or further than
    /// `lateral_threshold + radius` from the line are ignored.
    pub fn avoidance_offset(
        tuning: &AiTuning,
        target: DVec2,
        forward: DVec2,
        obstacles: &[CircleCollider],
    ) -> f64 {
        let side_axis = lateral(forward);
        let mut offset = 0.0;

        for obstacle in obstacles {
            let rel = obstacle.center() - target;
            let ahead = rel.dot(forward);
            let side = rel.dot(side_axis);

            if ahead <= 0.0 || ahead >= tuning.lookahead {
                continue;
            }
            if side.abs() >= tuning.lateral_threshold + obstacle.radius {
                continue;
            }

            let closeness = 1.0 - ahead / tuning.lookahead;
            // Steer to the side opposite the obstacle; dead ahead goes left
            let away = if side > 0.0 { -1.0 } else { 1.0 };
            offset += away * closeness * obstacle.radius * tuning.avoidance_gain;
        }

        offset.clamp(-tuning.max_avoidance_offset, tuning.max_avoidance_offset)
    }

    /// Advance one tick. `laps` bounds the progress that is reported; past
    /// the finish the follower keeps cruising with progress wrapped.
    pub fn step(
        &mut self,
        ctx: &mut StepContext<'_>,
        path: &CheckpointPath,
        laps: u32,
        dt: f64,
    ) -> FollowerOutcome {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let now = ctx.now;
        let collision = *ctx.collision;
        let mut outcome = FollowerOutcome::default();

        if !ctx.racing {
            ctx.actors.publish(&self.key, self.state.position);
            return outcome;
        }

        self.elapsed += dt;
        let n = path.len() as f64;
        let segment = self.t.rem_euclid(n).floor() as usize;
        let segment_len = path.segment_length(segment).max(1e-6);

        let wobble = 1.0
            + self.tuning.oscillation_amplitude
                * (self.tuning.oscillation_frequency * self.elapsed + self.phase).sin();
        let composite = self.state.race_boost_at(now) * ctx.external_multiplier;
        let speed = self.tuning.cruise_speed * wobble * composite * self.state.slowdown_at(now);

        let before = self.t;
        self.t += speed / segment_len * dt;
        if !self.done {
            self.emit_progress(before, n as u32, laps, &mut outcome);
        }

        let finish_t = n * laps.max(1) as f64;
        if self.t >= finish_t {
            self.t -= finish_t;
            self.done = true;
        }

        // Target on the line, nudged around obstacles and by collision drift
        let segment = self.t.rem_euclid(n).floor() as usize;
        let forward = path.segment_dir(segment);
        let mut target = Self::lane_point(path, self.t, self.lane);
        target += lateral(forward)
            * Self::avoidance_offset(&self.tuning, target, forward, ctx.obstacles);

        self.state
            .decay_deflection(collision.deflection_decay, collision.deflection_epsilon, dt);
        let proposed = target + self.state.deflection;

        let (resolved, kind) = resolve_position(ctx, &self.key, proposed, self.radius);
        if let Some(kind) = kind {
            // Keep the push as drift so it fades instead of snapping back
            self.state.deflection += resolved.position - proposed;
            apply_hit_windows(&mut self.state, kind, &collision, now);
            outcome.hit = Some(kind);
        }

        let position = ctx.bounds.clamp(resolved.position);
        let travelled = position - self.state.position;
        if dt > 0.0 {
            self.state.forward_speed = travelled.length() / dt;
        }
        if travelled.length_squared() > 1e-12 {
            let desired = heading_of(travelled);
            let blend = 1.0 - damping(1.0 - self.tuning.heading_smoothing, dt);
            self.state.heading += shortest_angle(self.state.heading, desired) * blend;
        }

        self.state.position = position;
        ctx.actors.publish(&self.key, position);
        outcome
    }

    fn emit_progress(&self, before: f64, n: u32, laps: u32, outcome: &mut FollowerOutcome) {
        let total = n * laps.max(1);
        let from = before.floor().max(0.0) as u32;
        let to = (self.t.floor().max(0.0) as u32).min(total);

        for count in (from + 1)..=to {
            outcome.progress.push(ProgressEvent {
                actor_id: self.key.id().to_string(),
                absolute_checkpoint_count: count,
                lap: count / n.max(1),
            });
        }
    }
}
