//! Single-slot, last-write-wins inbox per remote player

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ws::protocol::PeerState;

/// Written by network tasks, drained by the tick loop. Never blocks for
/// longer than a map insert.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    slots: Arc<Mutex<HashMap<String, PeerState>>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is waiting for this player
    pub fn deliver(&self, state: PeerState) {
        self.slots.lock().insert(state.player_id.clone(), state);
    }

    /// Take every waiting state
    pub fn drain(&self) -> Vec<PeerState> {
        self.slots.lock().drain().map(|(_, state)| state).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: &str, x: f64) -> PeerState {
        PeerState {
            player_id: id.into(),
            seq: 0,
            x,
            z: 0.0,
            heading: 0.0,
            lap: 0,
            checkpoint: 0,
            finished: false,
            finish_time: None,
        }
    }

    #[test]
    fn last_write_wins_per_player() {
        let mailbox = Mailbox::new();
        mailbox.deliver(state("a", 1.0));
        mailbox.deliver(state("a", 2.0));
        mailbox.deliver(state("b", 5.0));

        let mut drained = mailbox.drain();
        drained.sort_by(|l, r| l.player_id.cmp(&r.player_id));
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].x, 2.0);
        assert_eq!(drained[1].x, 5.0);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn clones_share_the_slots() {
        let mailbox = Mailbox::new();
        let writer = mailbox.clone();
        std::thread::spawn(move || writer.deliver(state("net", 3.0)))
            .join()
            .unwrap();
        assert_eq!(mailbox.drain()[0].x, 3.0);
    }
}
