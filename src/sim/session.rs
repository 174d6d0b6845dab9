//! One race: course, layout, boats and progress driven by `tick`

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ai::PathFollower;
use super::boat::{Boat, ControlIntent, HitKind, KinematicState, StepContext};
use super::collision::{ActorPositionTable, ColliderRegistry};
use super::events::SimEvent;
use super::external::{EventMultiplier, ExternalEventKind};
use super::race::{PhaseChange, ProgressUpdate, RacePhase, RaceProgress, RaceTracker, Standing};
use super::track::{Course, Layout};
use super::SimError;
use crate::config::SimTuning;

/// Whether a session may be restarted in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Local race against scripted rivals; reset allowed
    Solo,
    /// Networked race; one-shot
    Multiplayer,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Solo => "solo",
            SessionMode::Multiplayer => "multiplayer",
        }
    }
}

/// Options for [`RaceSession::new`]
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: SessionMode,
    pub player_id: String,
    pub rivals: usize,
    /// Seeds obstacle layout and rival wobble
    pub seed: u64,
}

impl SessionOptions {
    pub fn solo(player_id: impl Into<String>, rivals: usize, seed: u64) -> Self {
        Self {
            mode: SessionMode::Solo,
            player_id: player_id.into(),
            rivals,
            seed,
        }
    }

    /// Multiplayer races carry no scripted rivals
    pub fn multiplayer(player_id: impl Into<String>, seed: u64) -> Self {
        Self {
            mode: SessionMode::Multiplayer,
            player_id: player_id.into(),
            rivals: 0,
            seed,
        }
    }
}

/// Who drives an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Player,
    Rival,
    /// Peer boat shown from network updates
    Remote,
}

/// Render-facing snapshot of one actor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorView {
    pub id: String,
    pub role: ActorRole,
    pub position: DVec2,
    pub heading: f64,
    pub speed: f64,
}

impl ActorView {
    fn new(id: &str, role: ActorRole, state: &KinematicState) -> Self {
        Self {
            id: id.to_string(),
            role,
            position: state.position,
            heading: state.heading,
            speed: state.forward_speed,
        }
    }
}

/// A single race on one course
#[derive(Debug)]
pub struct RaceSession {
    mode: SessionMode,
    course: Course,
    tuning: SimTuning,
    registry: ColliderRegistry,
    layout: Layout,
    actors: ActorPositionTable,
    player: Boat,
    rivals: Vec<PathFollower>,
    race: RaceTracker,
    external: EventMultiplier,
    /// Session clock (s); collision windows are measured against it
    clock: f64,
    rng: ChaCha8Rng,
}

impl RaceSession {
    /// Build the course layout and put every boat on the grid
    pub fn new(course: Course, tuning: SimTuning, options: SessionOptions) -> Result<Self, SimError> {
        let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
        let layout = Self::layout_for(&course, &tuning, options.seed);
        let registry = ColliderRegistry::new(course.world_colliders.clone());
        let mut actors = ActorPositionTable::new();
        let mut race = RaceTracker::new(tuning.race, course.path.len());

        let (start, _) = course.grid_slot(0, tuning.layout.grid_spacing);
        let player = Boat::spawn(
            &mut actors,
            options.player_id.clone(),
            start,
            course.start_heading(),
            tuning.boat,
        )?;
        race.register(options.player_id.clone());

        let mut rivals = Vec::with_capacity(options.rivals);
        for slot in 1..=options.rivals {
            let (_, lane) = course.grid_slot(slot, tuning.layout.grid_spacing);
            let id = format!("ai-{slot}");
            let rival = PathFollower::spawn(
                &mut actors,
                id.clone(),
                &course.path,
                lane,
                tuning.boat.radius,
                tuning.ai,
                &mut rng,
            )?;
            race.register(id);
            rivals.push(rival);
        }

        info!(
            player_id = %options.player_id,
            mode = ?options.mode,
            rivals = rivals.len(),
            obstacles = layout.obstacles.len(),
            seed = options.seed,
            "Race session created"
        );

        Ok(Self {
            mode: options.mode,
            course,
            tuning,
            registry,
            layout,
            actors,
            player,
            rivals,
            race,
            external: EventMultiplier::new(),
            clock: 0.0,
            rng,
        })
    }

    fn layout_for(course: &Course, tuning: &SimTuning, seed: u64) -> Layout {
        Layout::generate(
            course,
            seed,
            &tuning.layout,
            &tuning.race,
            tuning.boost.pad_radius,
        )
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn tuning(&self) -> &SimTuning {
        &self.tuning
    }

    pub fn phase(&self) -> RacePhase {
        self.race.phase()
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Seconds since the start signal
    pub fn race_clock(&self) -> f64 {
        self.race.race_clock()
    }

    pub fn player(&self) -> &Boat {
        &self.player
    }

    pub fn player_id(&self) -> &str {
        self.player.id()
    }

    pub fn player_progress(&self) -> Option<&RaceProgress> {
        self.race.progress_of(self.player.id())
    }

    pub fn rivals(&self) -> &[PathFollower] {
        &self.rivals
    }

    pub fn actor_table(&self) -> &ActorPositionTable {
        &self.actors
    }

    pub fn standings(&self) -> Vec<Standing> {
        self.race.standings()
    }

    pub fn external_multiplier(&self) -> f64 {
        self.external.value()
    }

    /// Feed an off-track event into the speed multiplier
    pub fn apply_external_event(&mut self, event: ExternalEventKind) {
        self.external.apply(event);
    }

    /// Player first, then rivals in grid order
    pub fn actors(&self) -> Vec<ActorView> {
        std::iter::once(ActorView::new(
            self.player.id(),
            ActorRole::Player,
            &self.player.state,
        ))
        .chain(
            self.rivals
                .iter()
                .map(|r| ActorView::new(r.id(), ActorRole::Rival, &r.state)),
        )
        .collect()
    }

    /// Advance the whole race by `dt` seconds with the local player's intent
    pub fn tick(&mut self, dt: f64, intent: ControlIntent) -> Vec<SimEvent> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut events = Vec::new();
        let was_finished = matches!(self.race.phase(), RacePhase::Finished);

        self.clock += dt;
        self.external.decay(dt);

        for change in self.race.advance(dt) {
            events.push(match change {
                PhaseChange::CountdownTick(remaining) => SimEvent::CountdownTick { remaining },
                PhaseChange::Started => SimEvent::RaceStarted,
            });
        }

        let racing = self.race.is_racing();
        let laps = self.race.total_laps();
        let boost = self.tuning.boost;
        let boat_radius = self.tuning.boat.radius;
        let now = self.clock;

        let mut ctx = StepContext {
            registry: &self.registry,
            obstacles: &self.layout.obstacles,
            actors: &mut self.actors,
            bounds: self.course.bounds,
            collision: &self.tuning.collision,
            racing,
            external_multiplier: self.external.value(),
            now,
        };

        // Local player
        let outcome = self.player.step(&mut ctx, intent, dt);
        if let Some(kind) = outcome.hit {
            events.push(Self::collision_event(self.player.id(), kind));
        }
        if racing {
            if let Some(pad) =
                Self::collect_boost(&self.layout, &mut self.player.state, boat_radius, &boost, now)
            {
                events.push(SimEvent::BoostCollected {
                    actor_id: self.player.id().to_string(),
                    pad,
                });
            }
        }

        // Scripted rivals
        for rival in self.rivals.iter_mut() {
            let outcome = rival.step(&mut ctx, &self.course.path, laps, dt);
            if let Some(kind) = outcome.hit {
                events.push(Self::collision_event(rival.id(), kind));
            }
            if racing {
                if let Some(pad) =
                    Self::collect_boost(&self.layout, &mut rival.state, rival.radius, &boost, now)
                {
                    events.push(SimEvent::BoostCollected {
                        actor_id: rival.id().to_string(),
                        pad,
                    });
                }
            }
            for progress in outcome.progress {
                let updates = self
                    .race
                    .record_scripted_progress(&progress.actor_id, progress.absolute_checkpoint_count);
                for update in updates {
                    events.extend(Self::progress_events(&progress.actor_id, update));
                }
            }
        }

        if let Some(update) = self.race.validate_checkpoint(
            self.player.id(),
            &self.course.path,
            self.player.state.position,
        ) {
            events.extend(Self::progress_events(self.player.id(), update));
        }

        if !was_finished && matches!(self.race.phase(), RacePhase::Finished) {
            events.push(SimEvent::RaceFinished);
        }

        events
    }

    fn collision_event(actor_id: &str, kind: HitKind) -> SimEvent {
        debug!(actor_id = %actor_id, ?kind, "Collision");
        SimEvent::Collision {
            actor_id: actor_id.to_string(),
            kind,
        }
    }

    /// Grant the race boost when over a pad. Only the first tick on a pad
    /// while unboosted counts as a pickup.
    fn collect_boost(
        layout: &Layout,
        state: &mut KinematicState,
        radius: f64,
        boost: &crate::config::tuning::BoostTuning,
        now: f64,
    ) -> Option<usize> {
        if state.race_boost_at(now) > 1.0 {
            return None;
        }
        let pad = layout
            .boost_pads
            .iter()
            .position(|p| p.center.distance(state.position) < p.radius + radius)?;
        state.grant_race_boost(boost.multiplier, now, boost.duration_secs);
        Some(pad)
    }

    fn progress_events(actor_id: &str, update: ProgressUpdate) -> Vec<SimEvent> {
        match update {
            ProgressUpdate::Checkpoint {
                index,
                lap,
                lap_completed,
            } => {
                let mut events = vec![SimEvent::Checkpoint {
                    actor_id: actor_id.to_string(),
                    index,
                    lap,
                }];
                if lap_completed {
                    events.push(SimEvent::LapCompleted {
                        actor_id: actor_id.to_string(),
                        lap,
                    });
                }
                events
            }
            ProgressUpdate::Finished {
                place,
                finish_time,
                lap,
            } => vec![
                SimEvent::LapCompleted {
                    actor_id: actor_id.to_string(),
                    lap,
                },
                SimEvent::Finished {
                    actor_id: actor_id.to_string(),
                    place,
                    finish_secs: finish_time.as_secs_f64(),
                },
            ],
        }
    }

    /// Straight-line distance from the local boat to the checkpoint it needs next
    pub fn distance_to_next_checkpoint(&self) -> Option<f64> {
        let progress = self.player_progress()?;
        let path = &self.course.path;
        let next = path.point(path.next_index(progress.last_checkpoint_index));
        Some(next.distance(self.player.state.position))
    }

    /// Restart a solo race on a fresh layout
    pub fn reset(&mut self) -> Result<(), SimError> {
        if self.mode != SessionMode::Solo {
            return Err(SimError::ResetNotAllowed);
        }

        let seed: u64 = self.rng.gen();
        self.layout = Self::layout_for(&self.course, &self.tuning, seed);

        let (start, _) = self.course.grid_slot(0, self.tuning.layout.grid_spacing);
        let heading = self.course.start_heading();
        self.player.respawn(&mut self.actors, start, heading);
        for rival in self.rivals.iter_mut() {
            rival.respawn(&mut self.actors, &self.course.path, &mut self.rng);
        }

        self.race.reset();
        self.external.reset();
        self.clock = 0.0;

        info!(seed, obstacles = self.layout.obstacles.len(), "Race session reset");
        Ok(())
    }

    /// Remove every position entry this session owns
    pub fn teardown(self) {
        let Self {
            mut actors,
            player,
            rivals,
            ..
        } = self;
        player.despawn(&mut actors);
        for rival in rivals {
            rival.despawn(&mut actors);
        }
        debug!(remaining = actors.len(), "Race session torn down");
    }
}
