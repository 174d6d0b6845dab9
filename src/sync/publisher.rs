//! Outbound throttle for the local boat's state

use crate::util::time::SYNC_INTERVAL_MILLIS;
use crate::ws::protocol::PeerState;

/// Decides which local states go out on the wire
#[derive(Debug)]
pub struct StatePublisher {
    interval_secs: f64,
    last_sent: Option<f64>,
    finish_sent: bool,
    seq: u64,
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new(SYNC_INTERVAL_MILLIS as f64 / 1000.0)
    }
}

impl StatePublisher {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval_secs: interval_secs.max(0.0),
            last_sent: None,
            finish_sent: false,
            seq: 0,
        }
    }

    /// Offer the state for time `now` (s). Returns it, stamped with the next
    /// sequence number, when it should be sent.
    ///
    /// The first finished state bypasses the throttle.
    pub fn offer(&mut self, now: f64, mut state: PeerState) -> Option<PeerState> {
        let first_finish = state.finished && !self.finish_sent;
        let due = self
            .last_sent
            .map_or(true, |last| now - last >= self.interval_secs);

        if !first_finish && !due {
            return None;
        }

        if first_finish {
            self.finish_sent = true;
        }
        self.last_sent = Some(now);
        self.seq += 1;
        state.seq = self.seq;
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(finished: bool) -> PeerState {
        PeerState {
            player_id: "me".into(),
            seq: 0,
            x: 0.0,
            z: 0.0,
            heading: 0.0,
            lap: 0,
            checkpoint: 0,
            finished,
            finish_time: finished.then_some(61.0),
        }
    }

    #[test]
    fn sends_at_most_every_interval() {
        let mut publisher = StatePublisher::new(0.05);
        let dt = 1.0 / 60.0;
        let sent = (0..60)
            .filter(|i| publisher.offer(*i as f64 * dt, state(false)).is_some())
            .count();
        // One second at 60 Hz with a 50 ms throttle
        assert!((15..=20).contains(&sent), "sent {sent}");
    }

    #[test]
    fn sequence_numbers_increase() {
        let mut publisher = StatePublisher::new(0.05);
        let a = publisher.offer(0.0, state(false)).unwrap();
        let b = publisher.offer(0.1, state(false)).unwrap();
        assert!(b.seq > a.seq);
    }

    #[test]
    fn finish_skips_the_throttle_once() {
        let mut publisher = StatePublisher::new(0.05);
        assert!(publisher.offer(0.0, state(false)).is_some());
        // 10 ms later: throttled, unless it is the finish
        assert!(publisher.offer(0.01, state(false)).is_none());
        let finish = publisher.offer(0.01, state(true)).unwrap();
        assert!(finish.finished);
        // Later finished states are throttled like any other
        assert!(publisher.offer(0.02, state(true)).is_none());
        assert!(publisher.offer(0.07, state(true)).is_some());
    }
}
