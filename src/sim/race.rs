//! Race phase and per-actor checkpoint/lap bookkeeping

use std::collections::HashMap;
use std::time::Duration;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::track::CheckpointPath;
use crate::config::tuning::RaceTuning;

/// Race phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RacePhase {
    /// Counting down to the start
    Countdown {
        remaining: u32,
        /// Seconds until the next step
        step_timer: f64,
    },
    /// Race clock running
    Racing,
    /// Every tracked actor has finished
    Finished,
}

/// Per-actor progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceProgress {
    pub last_checkpoint_index: usize,
    pub lap: u32,
    /// Fraction of the race completed, 0..=1
    pub progress: f64,
    pub finished: bool,
    pub finish_time: Option<Duration>,
}

impl RaceProgress {
    fn new() -> Self {
        Self {
            last_checkpoint_index: 0,
            lap: 0,
            progress: 0.0,
            finished: false,
            finish_time: None,
        }
    }

    /// Checkpoints passed since the start, across laps
    pub fn absolute_count(&self, checkpoints: usize) -> u32 {
        self.lap * checkpoints as u32 + self.last_checkpoint_index as u32
    }
}

/// Phase change produced by [`RaceTracker::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseChange {
    CountdownTick(u32),
    Started,
}

/// Accepted checkpoint or finish
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    Checkpoint {
        index: usize,
        lap: u32,
        /// The checkpoint closed a lap
        lap_completed: bool,
    },
    Finished {
        place: u32,
        finish_time: Duration,
        lap: u32,
    },
}

/// Standings row
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub actor_id: String,
    pub place: u32,
    pub lap: u32,
    pub progress: f64,
    pub finished: bool,
    pub finish_time: Option<Duration>,
}

/// Race phase machine plus progress for every locally simulated actor
#[derive(Debug, Clone)]
pub struct RaceTracker {
    phase: RacePhase,
    tuning: RaceTuning,
    checkpoints: usize,
    /// Race clock (s), runs from the start signal
    clock: f64,
    progress: HashMap<String, RaceProgress>,
    finish_order: Vec<String>,
}

impl RaceTracker {
    pub fn new(tuning: RaceTuning, checkpoints: usize) -> Self {
        Self {
            phase: Self::initial_phase(&tuning),
            tuning,
            checkpoints: checkpoints.max(1),
            clock: 0.0,
            progress: HashMap::new(),
            finish_order: Vec::new(),
        }
    }

    fn initial_phase(tuning: &RaceTuning) -> RacePhase {
        if tuning.countdown_from == 0 {
            RacePhase::Racing
        } else {
            RacePhase::Countdown {
                remaining: tuning.countdown_from,
                step_timer: tuning.countdown_step_secs,
            }
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn is_racing(&self) -> bool {
        !matches!(self.phase, RacePhase::Countdown { .. })
    }

    /// Seconds since the start signal
    pub fn race_clock(&self) -> f64 {
        self.clock
    }

    pub fn total_laps(&self) -> u32 {
        self.tuning.total_laps
    }

    /// Start tracking an actor from the start line
    pub fn register(&mut self, actor_id: impl Into<String>) {
        self.progress.insert(actor_id.into(), RaceProgress::new());
    }

    pub fn progress_of(&self, actor_id: &str) -> Option<&RaceProgress> {
        self.progress.get(actor_id)
    }

    /// Actor ids in arrival order
    pub fn finish_order(&self) -> &[String] {
        &self.finish_order
    }

    /// Clear all progress and restart the countdown
    pub fn reset(&mut self) {
        self.phase = Self::initial_phase(&self.tuning);
        self.clock = 0.0;
        self.finish_order.clear();
        for progress in self.progress.values_mut() {
            *progress = RaceProgress::new();
        }
    }

    /// Feed real elapsed time. Countdown steps are driven by wall time, not
    /// by tick count.
    pub fn advance(&mut self, dt: f64) -> Vec<PhaseChange> {
        let mut changes = Vec::new();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        match self.phase {
            RacePhase::Countdown {
                mut remaining,
                mut step_timer,
            } => {
                step_timer -= dt;
                while step_timer <= 0.0 && remaining > 0 {
                    remaining -= 1;
                    if remaining > 0 {
                        step_timer += self.tuning.countdown_step_secs.max(1e-3);
                        changes.push(PhaseChange::CountdownTick(remaining));
                    }
                }

                if remaining == 0 {
                    // Leftover time already belongs to the race clock
                    self.phase = RacePhase::Racing;
                    self.clock = (-step_timer).max(0.0);
                    changes.push(PhaseChange::Started);
                    info!("Race started");
                } else {
                    self.phase = RacePhase::Countdown {
                        remaining,
                        step_timer,
                    };
                }
            }
            RacePhase::Racing => {
                self.clock += dt;
            }
            RacePhase::Finished => {}
        }

        changes
    }

    /// Test a boat position against the checkpoint loop.
    ///
    /// Only the nearest checkpoint counts, and only when it is within the
    /// capture radius and is the successor of the last one recorded.
    pub fn validate_checkpoint(
        &mut self,
        actor_id: &str,
        path: &CheckpointPath,
        pos: DVec2,
    ) -> Option<ProgressUpdate> {
        if !matches!(self.phase, RacePhase::Racing) {
            return None;
        }

        let last = self.progress.get(actor_id)?.last_checkpoint_index;
        let (index, distance) = path.closest(pos);

        if let Some(progress) = self.progress.get_mut(actor_id) {
            // Keep the live fraction toward the next checkpoint fresh
            let n = path.len();
            let partial = path.segment_fraction(last, pos);
            let absolute = progress.absolute_count(n) as f64 + partial;
            if !progress.finished {
                progress.progress =
                    (absolute / (n as f64 * self.tuning.total_laps.max(1) as f64)).min(1.0);
            }
        }

        if distance > self.tuning.capture_radius || index != path.next_index(last) {
            return None;
        }

        self.advance_to(actor_id, index)
    }

    /// Record progress reported by a scripted follower as an absolute count.
    /// Counts at or below the current one are ignored.
    pub fn record_scripted_progress(
        &mut self,
        actor_id: &str,
        absolute_count: u32,
    ) -> Vec<ProgressUpdate> {
        let mut updates = Vec::new();
        if !matches!(self.phase, RacePhase::Racing) {
            return updates;
        }

        loop {
            let Some(progress) = self.progress.get(actor_id) else {
                break;
            };
            if progress.finished || progress.absolute_count(self.checkpoints) >= absolute_count {
                break;
            }
            let next = (progress.last_checkpoint_index + 1) % self.checkpoints;
            match self.advance_to(actor_id, next) {
                Some(update) => updates.push(update),
                None => break,
            }
        }

        updates
    }

    /// Move an actor to `index`, which must be its successor checkpoint
    fn advance_to(&mut self, actor_id: &str, index: usize) -> Option<ProgressUpdate> {
        let n = self.checkpoints;
        let total_laps = self.tuning.total_laps.max(1);
        let clock = self.clock;

        let progress = self.progress.get_mut(actor_id)?;
        if progress.finished || index != (progress.last_checkpoint_index + 1) % n {
            return None;
        }

        let lap_completed = index == 0;
        progress.last_checkpoint_index = index;
        if lap_completed {
            progress.lap += 1;
        }
        progress.progress =
            (progress.absolute_count(n) as f64 / (n * total_laps as usize) as f64).min(1.0);

        debug!(
            actor_id = %actor_id,
            checkpoint = index,
            lap = progress.lap,
            "Checkpoint passed"
        );

        if progress.lap < total_laps {
            return Some(ProgressUpdate::Checkpoint {
                index,
                lap: progress.lap,
                lap_completed,
            });
        }

        let finish_time = Duration::from_secs_f64(clock.max(0.0));
        progress.finished = true;
        progress.finish_time = Some(finish_time);
        progress.progress = 1.0;
        let lap = progress.lap;

        self.finish_order.push(actor_id.to_string());
        let place = self.finish_order.len() as u32;

        info!(
            actor_id = %actor_id,
            place,
            finish_secs = finish_time.as_secs_f64(),
            "Actor finished"
        );

        if self.progress.values().all(|p| p.finished) {
            self.phase = RacePhase::Finished;
            info!("All actors finished");
        }

        Some(ProgressUpdate::Finished {
            place,
            finish_time,
            lap,
        })
    }

    /// Finished actors by place, then everyone else by progress
    pub fn standings(&self) -> Vec<Standing> {
        let mut rows: Vec<(&String, &RaceProgress)> = self.progress.iter().collect();
        let place_of = |id: &String| self.finish_order.iter().position(|f| f == id);

        rows.sort_by(|(a_id, a), (b_id, b)| match (place_of(a_id), place_of(b_id)) {
            (Some(pa), Some(pb)) => pa.cmp(&pb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b
                .progress
                .partial_cmp(&a.progress)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_id.cmp(b_id)),
        });

        rows.into_iter()
            .enumerate()
            .map(|(i, (id, p))| Standing {
                actor_id: id.clone(),
                place: i as u32 + 1,
                lap: p.lap,
                progress: p.progress,
                finished: p.finished,
                finish_time: p.finish_time,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn square() -> CheckpointPath {
        CheckpointPath::new(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(0.0, -50.0),
            DVec2::new(50.0, -50.0),
            DVec2::new(50.0, 0.0),
        ])
    }

    fn racing_tracker(laps: u32) -> RaceTracker {
        let tuning = RaceTuning {
            total_laps: laps,
            capture_radius: 5.0,
            ..RaceTuning::default()
        };
        let mut tracker = RaceTracker::new(tuning, 4);
        tracker.register("p");
        tracker.advance(3.0);
        assert!(tracker.is_racing());
        tracker
    }

    fn drive_lap(tracker: &mut RaceTracker, path: &CheckpointPath, id: &str) -> Vec<ProgressUpdate> {
        [1, 2, 3, 0]
            .iter()
            .filter_map(|i| tracker.validate_checkpoint(id, path, path.point(*i)))
            .collect()
    }

    #[test]
    fn countdown_steps_on_wall_time() {
        let mut tracker = RaceTracker::new(RaceTuning::default(), 4);
        assert_eq!(
            tracker.phase(),
            RacePhase::Countdown {
                remaining: 3,
                step_timer: 1.0
            }
        );

        // Many small ticks: one step per second regardless of tick count
        let mut changes = Vec::new();
        for _ in 0..4 {
            changes.extend(tracker.advance(0.25));
        }
        assert_eq!(changes, vec![PhaseChange::CountdownTick(2)]);

        changes.clear();
        for _ in 0..5 {
            changes.extend(tracker.advance(0.5));
        }
        assert_eq!(
            changes,
            vec![PhaseChange::CountdownTick(1), PhaseChange::Started]
        );
        assert!(tracker.is_racing());
        assert!((tracker.race_clock() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn one_long_frame_finishes_countdown() {
        let mut tracker = RaceTracker::new(RaceTuning::default(), 4);
        let changes = tracker.advance(5.0);
        assert_eq!(
            changes,
            vec![
                PhaseChange::CountdownTick(2),
                PhaseChange::CountdownTick(1),
                PhaseChange::Started
            ]
        );
        assert!((tracker.race_clock() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn checkpoints_ignored_during_countdown() {
        let path = square();
        let mut tracker = RaceTracker::new(RaceTuning::default(), 4);
        tracker.register("p");
        assert!(tracker
            .validate_checkpoint("p", &path, path.point(1))
            .is_none());
    }

    #[test]
    fn full_lap_increments_once() {
        let path = square();
        let mut tracker = racing_tracker(3);
        let updates = drive_lap(&mut tracker, &path, "p");
        assert_eq!(updates.len(), 4);
        assert_eq!(
            updates[3],
            ProgressUpdate::Checkpoint {
                index: 0,
                lap: 1,
                lap_completed: true
            }
        );
        assert_eq!(tracker.progress_of("p").unwrap().lap, 1);
    }

    #[test]
    fn skipping_a_checkpoint_is_ignored() {
        let path = square();
        let mut tracker = racing_tracker(3);
        assert!(tracker.validate_checkpoint("p", &path, path.point(2)).is_none());
        assert!(tracker.validate_checkpoint("p", &path, path.point(1)).is_some());
        // Same checkpoint again is not a successor
        assert!(tracker.validate_checkpoint("p", &path, path.point(1)).is_none());
    }

    #[test]
    fn too_far_from_checkpoint_is_ignored() {
        let path = square();
        let mut tracker = racing_tracker(3);
        let near_but_outside = path.point(1) + DVec2::new(6.0, 0.0);
        assert!(tracker
            .validate_checkpoint("p", &path, near_but_outside)
            .is_none());
    }

    #[test]
    fn finish_records_place_and_time_once() {
        let path = square();
        let mut tracker = racing_tracker(1);
        tracker.register("q");
        tracker.advance(12.5);

        let updates = drive_lap(&mut tracker, &path, "p");
        match updates.last() {
            Some(ProgressUpdate::Finished {
                place, finish_time, ..
            }) => {
                assert_eq!(*place, 1);
                assert!((finish_time.as_secs_f64() - 12.5).abs() < 1e-6);
            }
            other => panic!("expected finish, got {other:?}"),
        }

        // Another lap after finishing changes nothing
        let again = drive_lap(&mut tracker, &path, "p");
        assert!(again.is_empty());
        let p = tracker.progress_of("p").unwrap();
        assert_eq!(p.lap, 1);
        assert_eq!(tracker.finish_order(), &["p".to_string()]);
        assert_eq!(tracker.phase(), RacePhase::Racing);

        let q_updates = tracker.record_scripted_progress("q", 4);
        assert!(matches!(
            q_updates.last(),
            Some(ProgressUpdate::Finished { place: 2, .. })
        ));
        assert_eq!(tracker.phase(), RacePhase::Finished);
    }

    #[test]
    fn scripted_progress_is_monotonic() {
        let mut tracker = racing_tracker(3);
        assert_eq!(tracker.record_scripted_progress("p", 2).len(), 2);
        assert!(tracker.record_scripted_progress("p", 1).is_empty());
        assert!(tracker.record_scripted_progress("p", 2).is_empty());
        let updates = tracker.record_scripted_progress("p", 5);
        assert_eq!(updates.len(), 3);
        let p = tracker.progress_of("p").unwrap();
        assert_eq!(p.lap, 1);
        assert_eq!(p.last_checkpoint_index, 1);
    }

    #[test]
    fn standings_put_finishers_first() {
        let mut tracker = racing_tracker(1);
        tracker.register("slow");
        tracker.register("fast");
        tracker.record_scripted_progress("slow", 2);
        tracker.record_scripted_progress("fast", 4);

        let standings = tracker.standings();
        assert_eq!(standings[0].actor_id, "fast");
        assert!(standings[0].finished);
        assert_eq!(standings[1].actor_id, "slow");
        assert_eq!(standings[2].actor_id, "p");
    }

    #[test]
    fn reset_restarts_everything() {
        let mut tracker = racing_tracker(1);
        tracker.record_scripted_progress("p", 4);
        tracker.reset();
        assert!(!tracker.is_racing());
        assert!(tracker.finish_order().is_empty());
        let p = tracker.progress_of("p").unwrap();
        assert_eq!((p.lap, p.last_checkpoint_index, p.finished), (0, 0, false));
    }

    proptest! {
        #[test]
        fn laps_never_decrease_and_track_wraps(
            visits in prop::collection::vec(0usize..4, 0..200),
            jitter in prop::collection::vec((-8.0f64..8.0, -8.0f64..8.0), 200),
        ) {
            let path = square();
            let mut tracker = racing_tracker(1000);
            let mut prev_lap = 0;
            let mut prev_index = 0;

            for (i, visit) in visits.iter().enumerate() {
                let (dx, dz) = jitter[i];
                let pos = path.point(*visit) + DVec2::new(dx, dz);
                tracker.validate_checkpoint("p", &path, pos);

                let p = tracker.progress_of("p").unwrap();
                prop_assert!(p.lap >= prev_lap);
                if p.lap > prev_lap {
                    prop_assert_eq!(p.lap, prev_lap + 1);
                    prop_assert_eq!(prev_index, 3);
                    prop_assert_eq!(p.last_checkpoint_index, 0);
                }
                if p.last_checkpoint_index != prev_index {
                    prop_assert_eq!(p.last_checkpoint_index, (prev_index + 1) % 4);
                }
                prev_lap = p.lap;
                prev_index = p.last_checkpoint_index;
            }
        }
    }
}
