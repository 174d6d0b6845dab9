//! Fire-and-forget transports for peer states

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::mailbox::Mailbox;
use crate::ws::protocol::PeerState;

/// Outbound side of the sync protocol. Delivery is best effort.
pub trait SyncChannel: Send + Sync {
    fn broadcast(&self, state: &PeerState);
}

/// Hands states to a network writer task
impl SyncChannel for mpsc::UnboundedSender<PeerState> {
    fn broadcast(&self, state: &PeerState) {
        if self.send(state.clone()).is_err() {
            debug!(player_id = %state.player_id, "Sync writer gone, dropping state");
        }
    }
}

/// In-process bus: every match id maps to its players' mailboxes
#[derive(Debug, Clone, Default)]
pub struct LocalBus {
    matches: Arc<DashMap<String, DashMap<String, Mailbox>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `match_id` as `player_id`; returns the sending half and the
    /// mailbox other players deliver into
    pub fn join(&self, match_id: impl Into<String>, player_id: impl Into<String>) -> (LocalChannel, Mailbox) {
        let match_id = match_id.into();
        let player_id = player_id.into();
        let mailbox = Mailbox::new();

        self.matches
            .entry(match_id.clone())
            .or_default()
            .insert(player_id.clone(), mailbox.clone());

        let channel = LocalChannel {
            bus: self.clone(),
            match_id,
            player_id,
        };
        (channel, mailbox)
    }

    pub fn peer_count(&self, match_id: &str) -> usize {
        self.matches.get(match_id).map_or(0, |peers| peers.len())
    }

    fn leave(&self, match_id: &str, player_id: &str) {
        if let Some(peers) = self.matches.get(match_id) {
            peers.remove(player_id);
        }
        self.matches.remove_if(match_id, |_, peers| peers.is_empty());
    }
}

/// A player's handle on a [`LocalBus`] match; leaves the match on drop
#[derive(Debug)]
pub struct LocalChannel {
    bus: LocalBus,
    match_id: String,
    player_id: String,
}

impl SyncChannel for LocalChannel {
    fn broadcast(&self, state: &PeerState) {
        if let Some(peers) = self.bus.matches.get(&self.match_id) {
            for peer in peers.iter().filter(|p| p.key() != &self.player_id) {
                peer.value().deliver(state.clone());
            }
        }
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.bus.leave(&self.match_id, &self.player_id);
    }
}
