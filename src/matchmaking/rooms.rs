//! Rooms waiting for a second racer

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A room whose host is waiting for an opponent
#[derive(Debug, Clone)]
pub struct WaitingRoom {
    pub room_id: Uuid,
    pub host_id: String,
    pub opened_at: Instant,
}

impl WaitingRoom {
    pub fn new(room_id: Uuid, host_id: impl Into<String>) -> Self {
        Self {
            room_id,
            host_id: host_id.into(),
            opened_at: Instant::now(),
        }
    }

    /// How long the host has been waiting
    pub fn wait_time(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

/// Waiting rooms, oldest first
pub struct WaitingRooms {
    queue: VecDeque<WaitingRoom>,
    /// Rooms left unmatched this long are closed
    max_wait_time: Duration,
}

impl WaitingRooms {
    pub fn new(max_wait_secs: u64) -> Self {
        Self {
            queue: VecDeque::new(),
            max_wait_time: Duration::from_secs(max_wait_secs),
        }
    }

    /// Open a room; a host only ever waits in one room
    pub fn push(&mut self, room: WaitingRoom) -> Vec<Uuid> {
        let replaced = self.remove_host(&room.host_id);
        self.queue.push_back(room);
        replaced
    }

    fn remove_host(&mut self, host_id: &str) -> Vec<Uuid> {
        let mut removed = Vec::new();
        self.queue.retain(|r| {
            if r.host_id == host_id {
                removed.push(r.room_id);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn remove(&mut self, room_id: Uuid) -> Option<WaitingRoom> {
        let pos = self.queue.iter().position(|r| r.room_id == room_id)?;
        self.queue.remove(pos)
    }

    pub fn contains(&self, room_id: Uuid) -> bool {
        self.queue.iter().any(|r| r.room_id == room_id)
    }

    /// Take the oldest room not hosted by `player_id`
    pub fn take_oldest_for(&mut self, player_id: &str) -> Option<WaitingRoom> {
        let pos = self.queue.iter().position(|r| r.host_id != player_id)?;
        self.queue.remove(pos)
    }

    /// Remove and return rooms that waited too long
    pub fn drain_expired(&mut self) -> Vec<WaitingRoom> {
        let max_wait = self.max_wait_time;
        let mut expired = Vec::new();
        while self
            .queue
            .front()
            .is_some_and(|r| r.wait_time() >= max_wait)
        {
            if let Some(room) = self.queue.pop_front() {
                expired.push(room);
            }
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for WaitingRooms {
    fn default() -> Self {
        Self::new(300) // five minutes to find an opponent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_room_is_taken_first() {
        let mut rooms = WaitingRooms::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        rooms.push(WaitingRoom::new(first, "a"));
        rooms.push(WaitingRoom::new(second, "b"));

        assert_eq!(rooms.take_oldest_for("c").unwrap().room_id, first);
        assert_eq!(rooms.len(), 1);
    }

    #[test]
    fn hosts_do_not_match_themselves() {
        let mut rooms = WaitingRooms::default();
        let own = Uuid::new_v4();
        rooms.push(WaitingRoom::new(own, "a"));
        assert!(rooms.take_oldest_for("a").is_none());
        assert!(rooms.contains(own));
    }

    #[test]
    fn reopening_replaces_the_hosts_old_room() {
        let mut rooms = WaitingRooms::default();
        let old = Uuid::new_v4();
        rooms.push(WaitingRoom::new(old, "a"));
        let replaced = rooms.push(WaitingRoom::new(Uuid::new_v4(), "a"));
        assert_eq!(replaced, vec![old]);
        assert_eq!(rooms.len(), 1);
    }

    #[test]
    fn expired_rooms_drain() {
        let mut rooms = WaitingRooms::new(0);
        rooms.push(WaitingRoom::new(Uuid::new_v4(), "a"));
        assert_eq!(rooms.drain_expired().len(), 1);
        assert!(rooms.is_empty());
    }
}
