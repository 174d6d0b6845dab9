//! Room service - pairs racers and owns each room's channels

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{PeerState, RoomEntrant, RoomState, RoomStatus};

use super::rooms::{WaitingRoom, WaitingRooms};

/// Buffered peer states per room before slow sockets start lagging
const PEER_CHANNEL_CAPACITY: usize = 64;

/// Which side of a room a player is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomRole {
    Host,
    Guest,
}

/// Room errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(Uuid),

    #[error("room {0} is full")]
    Full(Uuid),

    #[error("room {0} is closed")]
    Closed(Uuid),

    #[error("player is already in room {0}")]
    AlreadyInRoom(Uuid),
}

/// Channels owned by one room
struct RoomEntry {
    state_tx: watch::Sender<RoomState>,
    peer_tx: broadcast::Sender<PeerState>,
}

/// Matchmaking rooms
#[derive(Clone)]
pub struct RoomService {
    waiting: Arc<Mutex<WaitingRooms>>,
    rooms: Arc<DashMap<Uuid, RoomEntry>>,
}

impl Default for RoomService {
    fn default() -> Self {
        Self::new(WaitingRooms::default())
    }
}

impl RoomService {
    pub fn new(waiting: WaitingRooms) -> Self {
        Self {
            waiting: Arc::new(Mutex::new(waiting)),
            rooms: Arc::new(DashMap::new()),
        }
    }

    /// Open a room and wait for an opponent
    pub fn create_room(&self, host: RoomEntrant) -> RoomState {
        let room = RoomState {
            room_id: Uuid::new_v4(),
            status: RoomStatus::Waiting,
            host,
            guest: None,
            seed: rand::random::<u64>(),
            created_at: unix_millis(),
        };

        let (state_tx, _) = watch::channel(room.clone());
        let (peer_tx, _) = broadcast::channel(PEER_CHANNEL_CAPACITY);
        self.rooms.insert(room.room_id, RoomEntry { state_tx, peer_tx });

        let replaced = self
            .waiting
            .lock()
            .push(WaitingRoom::new(room.room_id, room.host.player_id.clone()));
        for old in replaced {
            self.close(old);
        }

        info!(room_id = %room.room_id, host = %room.host.player_id, "Room created");
        room
    }

    /// Take the guest seat of a waiting room
    pub fn join_room(&self, room_id: Uuid, guest: RoomEntrant) -> Result<RoomState, RoomError> {
        let entry = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        let current = entry.state_tx.borrow().clone();

        if current.has_player(&guest.player_id) {
            return Err(RoomError::AlreadyInRoom(room_id));
        }
        match current.status {
            RoomStatus::Matched => return Err(RoomError::Full(room_id)),
            RoomStatus::Closed => return Err(RoomError::Closed(room_id)),
            RoomStatus::Waiting => {}
        }

        self.waiting.lock().remove(room_id);

        let mut updated = current;
        updated.guest = Some(guest);
        updated.status = RoomStatus::Matched;
        entry.state_tx.send_replace(updated.clone());

        info!(
            room_id = %room_id,
            host = %updated.host.player_id,
            guest = ?updated.guest.as_ref().map(|g| g.player_id.as_str()),
            "Room matched"
        );
        Ok(updated)
    }

    /// Join the oldest waiting room, or open a new one
    pub fn join_or_create(&self, entrant: RoomEntrant) -> (RoomState, RoomRole) {
        loop {
            let candidate = self.waiting.lock().take_oldest_for(&entrant.player_id);
            let Some(candidate) = candidate else {
                return (self.create_room(entrant), RoomRole::Host);
            };

            match self.join_room(candidate.room_id, entrant.clone()) {
                Ok(room) => return (room, RoomRole::Guest),
                // Raced with a close or another joiner; try the next one
                Err(e) => debug!(room_id = %candidate.room_id, error = %e, "Skipping room"),
            }
        }
    }

    /// Receiver that observes every change of the room's state
    pub fn subscribe(&self, room_id: Uuid) -> Option<watch::Receiver<RoomState>> {
        self.rooms.get(&room_id).map(|e| e.state_tx.subscribe())
    }

    pub fn room(&self, room_id: Uuid) -> Option<RoomState> {
        self.rooms.get(&room_id).map(|e| e.state_tx.borrow().clone())
    }

    /// Sending and receiving halves of the room's peer-state relay
    pub fn peer_channel(
        &self,
        room_id: Uuid,
    ) -> Option<(broadcast::Sender<PeerState>, broadcast::Receiver<PeerState>)> {
        self.rooms
            .get(&room_id)
            .map(|e| (e.peer_tx.clone(), e.peer_tx.subscribe()))
    }

    /// A player's socket went away
    pub fn leave(&self, room_id: Uuid, player_id: &str) {
        let Some(room) = self.room(room_id) else {
            return;
        };

        let host_abandoned = room.status == RoomStatus::Waiting && room.host.player_id == player_id;
        let nobody_listening = self
            .rooms
            .get(&room_id)
            .map_or(true, |e| e.peer_tx.receiver_count() == 0);

        if host_abandoned || (room.status == RoomStatus::Matched && nobody_listening) {
            self.waiting.lock().remove(room_id);
            self.close(room_id);
        }
    }

    /// Mark a room closed for its watchers and forget it
    fn close(&self, room_id: Uuid) {
        if let Some((_, entry)) = self.rooms.remove(&room_id) {
            entry.state_tx.send_modify(|room| room.status = RoomStatus::Closed);
            info!(room_id = %room_id, "Room closed");
        }
    }

    /// Rooms still waiting for a guest
    pub fn waiting_count(&self) -> usize {
        self.waiting.lock().len()
    }

    /// Every room not yet closed
    pub fn open_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Matched rooms with at least one socket attached to the relay
    pub fn live_channels(&self) -> usize {
        self.rooms
            .iter()
            .filter(|e| {
                e.state_tx.borrow().status == RoomStatus::Matched && e.peer_tx.receiver_count() > 0
            })
            .count()
    }

    /// Periodically close rooms nobody joined
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(5));

        loop {
            interval.tick().await;

            let expired = self.waiting.lock().drain_expired();
            for room in expired {
                info!(room_id = %room.room_id, host = %room.host_id, "Waiting room expired");
                self.close(room.room_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entrant(id: &str) -> RoomEntrant {
        RoomEntrant {
            player_id: id.into(),
            display_name: id.to_uppercase(),
            cosmetic: Some(format!("{id}-sail")),
        }
    }

    #[test]
    fn first_entrant_hosts_second_joins() {
        let service = RoomService::default();
        let (room, role) = service.join_or_create(entrant("a"));
        assert_eq!(role, RoomRole::Host);
        assert_eq!(room.status, RoomStatus::Waiting);

        let (joined, role) = service.join_or_create(entrant("b"));
        assert_eq!(role, RoomRole::Guest);
        assert_eq!(joined.room_id, room.room_id);
        assert_eq!(joined.status, RoomStatus::Matched);
        assert_eq!(joined.guest.as_ref().unwrap().cosmetic.as_deref(), Some("b-sail"));
        assert_eq!(joined.host.display_name, "A");
        assert_eq!(service.waiting_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_see_the_match() {
        let service = RoomService::default();
        let room = service.create_room(entrant("a"));
        let mut rx = service.subscribe(room.room_id).unwrap();
        assert_eq!(rx.borrow().status, RoomStatus::Waiting);

        service.join_room(room.room_id, entrant("b")).unwrap();
        rx.changed().await.unwrap();
        let seen = rx.borrow().clone();
        assert_eq!(seen.status, RoomStatus::Matched);
        assert_eq!(seen.guest.unwrap().player_id, "b");
    }

    #[test]
    fn join_errors() {
        let service = RoomService::default();
        assert_eq!(
            service.join_room(Uuid::nil(), entrant("x")).unwrap_err(),
            RoomError::NotFound(Uuid::nil())
        );

        let room = service.create_room(entrant("a"));
        assert_eq!(
            service.join_room(room.room_id, entrant("a")).unwrap_err(),
            RoomError::AlreadyInRoom(room.room_id)
        );
        service.join_room(room.room_id, entrant("b")).unwrap();
        assert_eq!(
            service.join_room(room.room_id, entrant("c")).unwrap_err(),
            RoomError::Full(room.room_id)
        );
    }

    #[test]
    fn same_player_does_not_match_own_room() {
        let service = RoomService::default();
        let (first, _) = service.join_or_create(entrant("a"));
        let (second, role) = service.join_or_create(entrant("a"));
        assert_eq!(role, RoomRole::Host);
        assert_ne!(first.room_id, second.room_id);
        // The older room is replaced
        assert!(service.room(first.room_id).is_none());
        assert_eq!(service.open_rooms(), 1);
    }

    #[tokio::test]
    async fn host_leaving_closes_waiting_room() {
        let service = RoomService::default();
        let room = service.create_room(entrant("a"));
        let mut rx = service.subscribe(room.room_id).unwrap();

        service.leave(room.room_id, "a");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status, RoomStatus::Closed);
        assert_eq!(service.open_rooms(), 0);
        let (_, role) = service.join_or_create(entrant("b"));
        assert_eq!(role, RoomRole::Host);
    }

    #[tokio::test]
    async fn peer_channel_relays_between_sockets() {
        let service = RoomService::default();
        let (room, _) = service.join_or_create(entrant("a"));
        service.join_or_create(entrant("b"));

        let (tx, _a_rx) = service.peer_channel(room.room_id).unwrap();
        let (_, mut b_rx) = service.peer_channel(room.room_id).unwrap();
        assert_eq!(service.live_channels(), 1);

        tx.send(PeerState {
            player_id: "a".into(),
            seq: 1,
            x: 1.0,
            z: 2.0,
            heading: 0.0,
            lap: 0,
            checkpoint: 0,
            finished: false,
            finish_time: None,
        })
        .unwrap();
        assert_eq!(b_rx.recv().await.unwrap().player_id, "a");
    }
}
