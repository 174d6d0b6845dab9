//! Input-driven boat kinematics

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::collision::{ActorKey, ActorPositionTable, CircleCollider, ColliderRegistry, CollisionResult};
use super::track::PlayBounds;
use crate::config::tuning::{BoatTuning, CollisionTuning};
use crate::util::math::{forward_dir, heading_of, shortest_angle};
use crate::util::time::damping;

/// Control intent for one tick, axes in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlIntent {
    /// Throttle (1.0 = full ahead, -1.0 = full astern)
    pub forward: f64,
    /// Steering (positive turns left)
    pub turn: f64,
    /// Paddle boost held
    pub boost: bool,
}

impl ControlIntent {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Build intent from digital keys. Ahead wins when both ahead and astern
    /// are held; opposite turn keys cancel.
    pub fn from_keys(ahead: bool, astern: bool, left: bool, right: bool, boost: bool) -> Self {
        let forward = if ahead {
            1.0
        } else if astern {
            -1.0
        } else {
            0.0
        };
        let turn = match (left, right) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        };
        Self {
            forward,
            turn,
            boost,
        }
    }

    /// Same intent with NaN dropped and axes clamped to [-1, 1]
    pub fn sanitized(self) -> Self {
        let clean = |v: f64| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            forward: clean(self.forward),
            turn: clean(self.turn),
            boost: self.boost,
        }
    }
}

/// What a boat ran into this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    /// World collider or generated obstacle
    Obstacle,
    /// Another boat
    Actor,
}

/// Motion state owned by exactly one actor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    pub position: DVec2,
    /// Radians; 0 faces −z. Not normalized.
    pub heading: f64,
    pub forward_speed: f64,
    pub turn_rate: f64,
    /// Session time the current slowdown window ends
    pub slowdown_until: f64,
    /// Top speed factor while the slowdown window is open
    pub slowdown_factor: f64,
    /// Post-collision drift that fades over several ticks
    pub deflection: DVec2,
    /// Session time the paddle boost becomes usable again
    pub boost_disabled_until: f64,
    /// Boost pad multiplier and its expiry
    pub race_boost: f64,
    pub race_boost_until: f64,
}

impl KinematicState {
    pub fn at(position: DVec2, heading: f64) -> Self {
        Self {
            position,
            heading,
            forward_speed: 0.0,
            turn_rate: 0.0,
            slowdown_until: 0.0,
            slowdown_factor: 1.0,
            deflection: DVec2::ZERO,
            boost_disabled_until: 0.0,
            race_boost: 1.0,
            race_boost_until: 0.0,
        }
    }

    /// Top speed factor from the slowdown window at `now`
    pub fn slowdown_at(&self, now: f64) -> f64 {
        if now < self.slowdown_until {
            self.slowdown_factor
        } else {
            1.0
        }
    }

    /// Boost pad multiplier at `now`
    pub fn race_boost_at(&self, now: f64) -> f64 {
        if now < self.race_boost_until {
            self.race_boost
        } else {
            1.0
        }
    }

    pub fn grant_race_boost(&mut self, multiplier: f64, now: f64, duration: f64) {
        self.race_boost = multiplier;
        self.race_boost_until = now + duration;
    }

    /// Open a slowdown window. A harsher or longer window already running is kept.
    pub fn slow_down(&mut self, factor: f64, now: f64, duration: f64) {
        let until = now + duration;
        if now < self.slowdown_until {
            self.slowdown_factor = self.slowdown_factor.min(factor);
            self.slowdown_until = self.slowdown_until.max(until);
        } else {
            self.slowdown_factor = factor;
            self.slowdown_until = until;
        }
    }

    /// Decay drift toward zero, snapping tiny values
    pub fn decay_deflection(&mut self, per_tick: f64, epsilon: f64, dt: f64) {
        self.deflection *= damping(per_tick, dt);
        if self.deflection.length() < epsilon {
            self.deflection = DVec2::ZERO;
        }
    }
}

/// Shared world state a boat needs for one step
pub struct StepContext<'a> {
    pub registry: &'a ColliderRegistry,
    pub obstacles: &'a [CircleCollider],
    pub actors: &'a mut ActorPositionTable,
    pub bounds: PlayBounds,
    pub collision: &'a CollisionTuning,
    /// False during the countdown
    pub racing: bool,
    /// External event multiplier (race boost is applied per boat)
    pub external_multiplier: f64,
    /// Session clock (s)
    pub now: f64,
}

/// Result of one step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutcome {
    pub hit: Option<HitKind>,
}

/// Resolve a proposed position against the world, obstacles and other actors.
///
/// Returns the corrected position and what was hit, if anything. When both
/// passes hit, the obstacle wins for the response.
pub(crate) fn resolve_position(
    ctx: &StepContext<'_>,
    key: &ActorKey,
    proposed: DVec2,
    radius: f64,
) -> (CollisionResult, Option<HitKind>) {
    let world = ctx.registry.resolve(proposed, radius, ctx.obstacles);
    let actors = ctx.actors.resolve_against_actors(
        key,
        world.position,
        radius,
        ctx.collision.actor_push_share,
    );

    let kind = if world.hit {
        Some(HitKind::Obstacle)
    } else if actors.hit {
        Some(HitKind::Actor)
    } else {
        None
    };
    let normal = if world.hit { world.normal } else { actors.normal };

    (
        CollisionResult {
            position: actors.position,
            hit: kind.is_some(),
            normal,
        },
        kind,
    )
}

/// Apply the slowdown/boost-lockout response every actor shares
pub(crate) fn apply_hit_windows(
    state: &mut KinematicState,
    kind: HitKind,
    tuning: &CollisionTuning,
    now: f64,
) {
    match kind {
        HitKind::Obstacle => {
            state.slow_down(tuning.obstacle_slowdown, now, tuning.obstacle_slowdown_secs)
        }
        HitKind::Actor => state.slow_down(tuning.actor_slowdown, now, tuning.actor_slowdown_secs),
    }
    state.boost_disabled_until = now + tuning.boost_cooldown_secs;
}

/// A boat steered by control intent
#[derive(Debug)]
pub struct Boat {
    key: ActorKey,
    pub state: KinematicState,
    pub stats: BoatTuning,
}

impl Boat {
    /// Spawn a boat and register its position entry
    pub fn spawn(
        actors: &mut ActorPositionTable,
        id: impl Into<String>,
        position: DVec2,
        heading: f64,
        stats: BoatTuning,
    ) -> Result<Self, super::SimError> {
        let key = actors.spawn(id, position)?;
        Ok(Self {
            key,
            state: KinematicState::at(position, heading),
            stats,
        })
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    /// Remove the boat's position entry
    pub fn despawn(self, actors: &mut ActorPositionTable) {
        actors.despawn(self.key);
    }

    /// Put the boat back on a grid slot at rest
    pub fn respawn(&mut self, actors: &mut ActorPositionTable, position: DVec2, heading: f64) {
        self.state = KinematicState::at(position, heading);
        actors.publish(&self.key, position);
    }

    /// Whether the paddle boost would engage at `now`
    pub fn paddle_available(&self, now: f64) -> bool {
        now >= self.state.boost_disabled_until
    }

    /// Advance one tick
    pub fn step(&mut self, ctx: &mut StepContext<'_>, intent: ControlIntent, dt: f64) -> StepOutcome {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let now = ctx.now;
        let intent = intent.sanitized();
        let stats = self.stats;
        let tuning = *ctx.collision;

        if !ctx.racing {
            // Held on the start line
            self.state.forward_speed = 0.0;
            self.state.turn_rate = 0.0;
            self.state.deflection = DVec2::ZERO;
            ctx.actors.publish(&self.key, self.state.position);
            return StepOutcome::default();
        }

        let paddle = if intent.boost && self.paddle_available(now) {
            stats.paddle_factor
        } else {
            1.0
        };
        let composite = self.state.race_boost_at(now) * ctx.external_multiplier;
        let max_forward = stats.max_forward * composite * paddle * self.state.slowdown_at(now);
        let accel = stats.acceleration * paddle;

        // Throttle or coast
        if intent.forward != 0.0 {
            self.state.forward_speed += accel * intent.forward * dt;
        } else {
            self.state.forward_speed *= damping(stats.forward_friction, dt);
        }
        self.state.forward_speed = self
            .state
            .forward_speed
            .clamp(-stats.max_reverse, max_forward.max(0.0));

        // Steering
        if intent.turn != 0.0 {
            self.state.turn_rate += intent.turn * stats.turn_acceleration * dt;
            self.state.turn_rate = self
                .state
                .turn_rate
                .clamp(-stats.max_turn_rate, stats.max_turn_rate);
        } else {
            self.state.turn_rate *= damping(stats.turn_friction, dt);
        }
        self.state.heading += self.state.turn_rate * dt;

        let proposed = self.state.position
            + forward_dir(self.state.heading) * self.state.forward_speed * dt
            + self.state.deflection * dt;
        self.state
            .decay_deflection(tuning.deflection_decay, tuning.deflection_epsilon, dt);

        let (resolved, kind) = resolve_position(ctx, &self.key, proposed, stats.radius);
        self.state.position = resolved.position;

        if let Some(kind) = kind {
            self.state.forward_speed = (self.state.forward_speed * tuning.bounce_factor)
                .clamp(-tuning.bounce_speed_cap, tuning.bounce_speed_cap);

            let escape = heading_of(resolved.normal);
            self.state.heading += shortest_angle(self.state.heading, escape) * tuning.heading_bias;
            self.state.deflection += resolved.normal * tuning.deflection_impulse;

            apply_hit_windows(&mut self.state, kind, &tuning, now);
        }

        self.state.position = ctx.bounds.clamp(self.state.position);
        ctx.actors.publish(&self.key, self.state.position);

        StepOutcome { hit: kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimTuning;

    const DT: f64 = 1.0 / 60.0;

    struct World {
        registry: ColliderRegistry,
        obstacles: Vec<CircleCollider>,
        actors: ActorPositionTable,
        tuning: SimTuning,
        bounds: PlayBounds,
    }

    impl World {
        fn open_water() -> Self {
            Self {
                registry: ColliderRegistry::default(),
                obstacles: Vec::new(),
                actors: ActorPositionTable::new(),
                tuning: SimTuning::default(),
                bounds: PlayBounds::new(DVec2::splat(-1000.0), DVec2::splat(1000.0)),
            }
        }

        fn run(&mut self, boat: &mut Boat, intent: ControlIntent, secs: f64, racing: bool) -> Vec<StepOutcome> {
            let ticks = (secs / DT).round() as usize;
            let mut outcomes = Vec::with_capacity(ticks);
            let mut now = 0.0;
            for _ in 0..ticks {
                now += DT;
                let mut ctx = StepContext {
                    registry: &self.registry,
                    obstacles: &self.obstacles,
                    actors: &mut self.actors,
                    bounds: self.bounds,
                    collision: &self.tuning.collision,
                    racing,
                    external_multiplier: 1.0,
                    now,
                };
                outcomes.push(boat.step(&mut ctx, intent, DT));
            }
            outcomes
        }
    }

    fn ahead() -> ControlIntent {
        ControlIntent {
            forward: 1.0,
            ..ControlIntent::idle()
        }
    }

    #[test]
    fn both_throttle_keys_resolve_to_ahead() {
        let intent = ControlIntent::from_keys(true, true, true, true, false);
        assert_eq!(intent.forward, 1.0);
        assert_eq!(intent.turn, 0.0);
    }

    #[test]
    fn sanitized_clamps_and_drops_nan() {
        let intent = ControlIntent {
            forward: 4.0,
            turn: f64::NAN,
            boost: true,
        }
        .sanitized();
        assert_eq!(intent.forward, 1.0);
        assert_eq!(intent.turn, 0.0);
    }

    #[test]
    fn frozen_before_race_start() {
        let mut world = World::open_water();
        let start = DVec2::new(0.0, -20.0);
        let mut boat = Boat::spawn(&mut world.actors, "player", start, 0.0, world.tuning.boat).unwrap();
        world.run(&mut boat, ahead(), 2.0, false);
        assert_eq!(boat.state.position, start);
        assert_eq!(boat.state.forward_speed, 0.0);
    }

    #[test]
    fn straight_run_reaches_expected_distance_without_hits() {
        let mut world = World::open_water();
        let start = DVec2::new(0.0, -20.0);
        let mut boat = Boat::spawn(&mut world.actors, "player", start, 0.0, world.tuning.boat).unwrap();

        let outcomes = world.run(&mut boat, ahead(), 10.0, true);

        assert!(outcomes.iter().all(|o| o.hit.is_none()));
        assert!((boat.state.forward_speed - 8.0).abs() < 1e-9);

        // Accelerates at 6 u/s² for 4/3 s, then cruises at 8 u/s
        let ramp = 8.0 / 6.0;
        let expected = 0.5 * 8.0 * ramp + 8.0 * (10.0 - ramp);
        let travelled = start.y - boat.state.position.y;
        assert!(boat.state.position.x.abs() < 1e-9);
        assert!((travelled - expected).abs() < 0.5, "travelled {travelled}");
        assert!(travelled < 80.0);
        assert_eq!(world.actors.get("player"), Some(boat.state.position));
    }

    #[test]
    fn coasting_decays_with_friction() {
        let mut world = World::open_water();
        let mut boat = Boat::spawn(&mut world.actors, "player", DVec2::ZERO, 0.0, world.tuning.boat).unwrap();
        boat.state.forward_speed = 8.0;
        world.run(&mut boat, ControlIntent::idle(), 1.0 / 60.0, true);
        assert!((boat.state.forward_speed - 8.0 * 0.96).abs() < 1e-9);
    }

    #[test]
    fn steering_relaxes_when_released() {
        let mut world = World::open_water();
        let mut boat = Boat::spawn(&mut world.actors, "player", DVec2::ZERO, 0.0, world.tuning.boat).unwrap();
        let left = ControlIntent {
            turn: 1.0,
            ..ControlIntent::idle()
        };
        world.run(&mut boat, left, 1.0, true);
        let spun = boat.state.turn_rate;
        assert!(spun > 0.0 && spun <= world.tuning.boat.max_turn_rate);
        world.run(&mut boat, ControlIntent::idle(), 1.0, true);
        assert!(boat.state.turn_rate < spun * 0.01);
    }

    #[test]
    fn paddle_raises_top_speed() {
        let mut world = World::open_water();
        let mut boat = Boat::spawn(&mut world.actors, "player", DVec2::ZERO, 0.0, world.tuning.boat).unwrap();
        let paddle = ControlIntent {
            forward: 1.0,
            turn: 0.0,
            boost: true,
        };
        world.run(&mut boat, paddle, 5.0, true);
        assert!((boat.state.forward_speed - 8.0 * 1.35).abs() < 1e-9);
    }

    #[test]
    fn buoy_deflects_boat_and_never_lets_it_inside() {
        let mut world = World::open_water();
        world.obstacles.push(CircleCollider::new(0.0, -90.0, 10.0, "buoy"));
        let stats = world.tuning.boat;
        let mut boat = Boat::spawn(&mut world.actors, "player", DVec2::new(0.0, -70.0), 0.0, stats).unwrap();
        boat.state.forward_speed = 8.0;

        let center = DVec2::new(0.0, -90.0);
        let mut hits = 0;
        let mut now = 0.0;
        for _ in 0..600 {
            now += DT;
            let mut ctx = StepContext {
                registry: &world.registry,
                obstacles: &world.obstacles,
                actors: &mut world.actors,
                bounds: world.bounds,
                collision: &world.tuning.collision,
                racing: true,
                external_multiplier: 1.0,
                now,
            };
            if boat.step(&mut ctx, ahead(), DT).hit == Some(HitKind::Obstacle) {
                hits += 1;
            }
            assert!(boat.state.position.distance(center) >= 10.0 + stats.radius - 1e-9);
        }

        assert!(hits > 0);
        // Pushed off the x = 0 line
        assert!(boat.state.position.x.abs() > 1.0);
    }

    #[test]
    fn hit_bounces_and_opens_windows() {
        let mut world = World::open_water();
        world.obstacles.push(CircleCollider::new(0.0, -3.0, 2.0, "pile"));
        let mut boat = Boat::spawn(&mut world.actors, "player", DVec2::ZERO, 0.0, world.tuning.boat).unwrap();
        boat.state.forward_speed = 8.0;

        let outcomes = world.run(&mut boat, ahead(), 1.0 / 60.0, true);
        assert_eq!(outcomes[0].hit, Some(HitKind::Obstacle));
        assert!(boat.state.forward_speed < 0.0);
        assert!(boat.state.forward_speed >= -world.tuning.collision.bounce_speed_cap);
        assert!(boat.state.slowdown_until > 1.0);
        assert!(!boat.paddle_available(0.5));
        assert!(boat.state.deflection.length() > 0.0);
    }

    #[test]
    fn grazing_another_boat_opens_short_window() {
        let mut world = World::open_water();
        let stats = world.tuning.boat;
        let collision = world.tuning.collision;
        let mut boat = Boat::spawn(&mut world.actors, "player", DVec2::ZERO, 0.0, stats).unwrap();
        let _rival = Boat::spawn(&mut world.actors, "rival", DVec2::new(2.0, 0.0), 0.0, stats).unwrap();

        let outcomes = world.run(&mut boat, ControlIntent::idle(), DT, true);

        assert_eq!(outcomes[0].hit, Some(HitKind::Actor));
        // Overlap 1.0, caller corrects its 0.6 share
        assert!((boat.state.position.x + 0.6).abs() < 1e-9);
        assert_eq!(boat.state.slowdown_factor, collision.actor_slowdown);
        assert!((boat.state.slowdown_until - (DT + collision.actor_slowdown_secs)).abs() < 1e-9);
        assert!(!boat.paddle_available(DT + collision.boost_cooldown_secs - 0.1));
        assert!(boat.paddle_available(DT + collision.boost_cooldown_secs));
    }

    #[test]
    fn external_multiplier_scales_top_speed() {
        let mut world = World::open_water();
        let mut boat = Boat::spawn(&mut world.actors, "player", DVec2::ZERO, 0.0, world.tuning.boat).unwrap();
        let mut now = 0.0;
        for _ in 0..600 {
            now += DT;
            let mut ctx = StepContext {
                registry: &world.registry,
                obstacles: &world.obstacles,
                actors: &mut world.actors,
                bounds: world.bounds,
                collision: &world.tuning.collision,
                racing: true,
                external_multiplier: 0.5,
                now,
            };
            boat.step(&mut ctx, ahead(), DT);
        }
        assert!((boat.state.forward_speed - 4.0).abs() < 1e-9);
    }

    #[test]
    fn position_is_clamped_to_bounds() {
        let mut world = World::open_water();
        world.bounds = PlayBounds::new(DVec2::splat(-5.0), DVec2::splat(5.0));
        let mut boat = Boat::spawn(&mut world.actors, "player", DVec2::ZERO, 0.0, world.tuning.boat).unwrap();
        world.run(&mut boat, ahead(), 5.0, true);
        assert_eq!(boat.state.position.y, -5.0);
        assert_eq!(world.actors.get("player"), Some(boat.state.position));
    }

    #[test]
    fn slowdown_keeps_harsher_window() {
        let mut state = KinematicState::at(DVec2::ZERO, 0.0);
        state.slow_down(0.3, 0.0, 1.5);
        state.slow_down(0.6, 0.2, 0.6);
        assert_eq!(state.slowdown_factor, 0.3);
        assert_eq!(state.slowdown_until, 1.5);
        assert_eq!(state.slowdown_at(2.0), 1.0);
    }
}
