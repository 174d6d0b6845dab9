//! Display-only boats driven by peer updates

use glam::DVec2;
use tracing::debug;

use crate::util::math::shortest_angle;
use crate::ws::protocol::PeerState;

/// Fraction of the remaining gap closed per tick
pub const INTERPOLATION_ALPHA: f64 = 0.15;

/// A sequence number this far behind the last one means the peer's publisher
/// restarted; five seconds of updates at 20 Hz
pub const SEQ_RESTART_GAP: u64 = 100;

/// A peer's boat as the local renderer shows it
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteBoat {
    pub player_id: String,
    pub position: DVec2,
    pub heading: f64,
    target: DVec2,
    target_heading: f64,
    last_seq: u64,
    pub lap: u32,
    pub checkpoint: u32,
    pub finished: bool,
    pub finish_time: Option<f64>,
}

impl RemoteBoat {
    /// First sighting snaps straight to the reported state
    pub fn new(state: &PeerState) -> Self {
        let position = DVec2::new(state.x, state.z);
        Self {
            player_id: state.player_id.clone(),
            position,
            heading: state.heading,
            target: position,
            target_heading: state.heading,
            last_seq: state.seq,
            lap: state.lap,
            checkpoint: state.checkpoint,
            finished: state.finished,
            finish_time: state.finish_time,
        }
    }

    pub fn target(&self) -> DVec2 {
        self.target
    }

    /// Retarget on a newer update. Returns false for stale updates.
    ///
    /// A sequence number more than [`SEQ_RESTART_GAP`] behind is taken as a
    /// restarted publisher and accepted.
    pub fn apply(&mut self, state: &PeerState) -> bool {
        let restarted = state.seq.saturating_add(SEQ_RESTART_GAP) < self.last_seq;
        if restarted {
            debug!(
                player_id = %state.player_id,
                seq = state.seq,
                last_seq = self.last_seq,
                "Peer publisher restarted"
            );
        } else if state.seq != 0 && state.seq <= self.last_seq {
            debug!(
                player_id = %state.player_id,
                seq = state.seq,
                last_seq = self.last_seq,
                "Dropping out-of-sequence peer state"
            );
            return false;
        }
        self.last_seq = state.seq;
        self.target = DVec2::new(state.x, state.z);
        self.target_heading = state.heading;
        self.lap = state.lap;
        self.checkpoint = state.checkpoint;
        // Finishing is terminal on the display side as well
        self.finished |= state.finished;
        if self.finish_time.is_none() {
            self.finish_time = state.finish_time;
        }
        true
    }

    /// One display tick toward the target
    pub fn tick(&mut self) {
        self.position = self.position.lerp(self.target, INTERPOLATION_ALPHA);
        self.heading += shortest_angle(self.heading, self.target_heading) * INTERPOLATION_ALPHA;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn state(seq: u64, x: f64, z: f64, heading: f64) -> PeerState {
        PeerState {
            player_id: "peer".into(),
            seq,
            x,
            z,
            heading,
            lap: 0,
            checkpoint: 0,
            finished: false,
            finish_time: None,
        }
    }

    #[test]
    fn first_message_snaps() {
        let boat = RemoteBoat::new(&state(1, 10.0, -40.0, 0.5));
        assert_eq!(boat.position, DVec2::new(10.0, -40.0));
        assert_eq!(boat.heading, 0.5);
    }

    #[test]
    fn gap_shrinks_geometrically() {
        let mut boat = RemoteBoat::new(&state(1, 0.0, 0.0, 0.0));
        boat.apply(&state(2, 100.0, 0.0, 0.0));

        let mut gap = boat.position.distance(boat.target());
        for _ in 0..30 {
            boat.tick();
            let next = boat.position.distance(boat.target());
            assert!((next / gap - 0.85).abs() < 1e-9);
            gap = next;
        }
    }

    #[test]
    fn heading_takes_the_short_way_round() {
        let mut boat = RemoteBoat::new(&state(1, 0.0, 0.0, PI - 0.1));
        boat.apply(&state(2, 0.0, 0.0, -PI + 0.1));
        boat.tick();
        // Crossing ±π, so the heading grows instead of swinging back
        assert!(boat.heading > PI - 0.1);
        assert!((boat.heading - (PI - 0.1 + 0.2 * INTERPOLATION_ALPHA)).abs() < 1e-9);
    }

    #[test]
    fn stale_updates_are_dropped() {
        let mut boat = RemoteBoat::new(&state(5, 0.0, 0.0, 0.0));
        assert!(!boat.apply(&state(4, 50.0, 0.0, 0.0)));
        assert_eq!(boat.target(), DVec2::ZERO);
        assert!(boat.apply(&state(6, 50.0, 0.0, 0.0)));
    }

    #[test]
    fn restarted_publisher_is_followed_again() {
        let mut boat = RemoteBoat::new(&state(500, 0.0, 0.0, 0.0));
        // Reordered by less than the gap: still stale
        assert!(!boat.apply(&state(450, 5.0, 0.0, 0.0)));

        assert!(boat.apply(&state(1, 20.0, 0.0, 0.0)));
        assert_eq!(boat.target(), DVec2::new(20.0, 0.0));
        assert!(boat.apply(&state(2, 21.0, 0.0, 0.0)));
        assert!(!boat.apply(&state(2, 22.0, 0.0, 0.0)));
    }

    #[test]
    fn finish_is_sticky() {
        let mut boat = RemoteBoat::new(&state(1, 0.0, 0.0, 0.0));
        let mut done = state(2, 0.0, 0.0, 0.0);
        done.finished = true;
        done.finish_time = Some(88.5);
        boat.apply(&done);
        boat.apply(&state(3, 1.0, 0.0, 0.0));
        assert!(boat.finished);
        assert_eq!(boat.finish_time, Some(88.5));
    }
}
