//! WebSocket protocol message definitions
//! These are the wire types exchanged between race clients and the relay

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Snapshot of one racer as seen by its peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerState {
    pub player_id: String,
    /// Sender-side sequence number, increasing per message
    #[serde(default)]
    pub seq: u64,
    /// Ground-plane position
    pub x: f64,
    pub z: f64,
    /// Radians; 0 faces −z
    pub heading: f64,
    pub lap: u32,
    /// Last checkpoint index passed
    pub checkpoint: u32,
    pub finished: bool,
    /// Race time in seconds, set once finished
    #[serde(default)]
    pub finish_time: Option<f64>,
}

impl PeerState {
    /// Whether every numeric field is usable
    pub fn is_valid(&self) -> bool {
        !self.player_id.is_empty()
            && self.x.is_finite()
            && self.z.is_finite()
            && self.heading.is_finite()
            && self.finish_time.map_or(true, |t| t.is_finite() && t >= 0.0)
    }
}

/// Decode an inbound peer state, dropping malformed or non-finite messages
pub fn decode_peer_state(text: &str) -> Option<PeerState> {
    match serde_json::from_str::<PeerState>(text) {
        Ok(state) if state.is_valid() => Some(state),
        Ok(state) => {
            debug!(player_id = %state.player_id, "Dropping peer state with bad values");
            None
        }
        Err(e) => {
            debug!(error = %e, "Dropping malformed peer state");
            None
        }
    }
}

/// Someone in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntrant {
    pub player_id: String,
    pub display_name: String,
    /// Boat skin or colour; display only
    #[serde(default)]
    pub cosmetic: Option<String>,
}

/// Room lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Host waiting for a second racer
    Waiting,
    /// Both racers present; the match channel is live
    Matched,
    /// Host left before anyone joined
    Closed,
}

/// Shared view of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub room_id: Uuid,
    pub status: RoomStatus,
    pub host: RoomEntrant,
    pub guest: Option<RoomEntrant>,
    /// Layout seed both racers build their course from
    pub seed: u64,
    /// Unix millis
    pub created_at: u64,
}

impl RoomState {
    pub fn entrants(&self) -> impl Iterator<Item = &RoomEntrant> {
        std::iter::once(&self.host).chain(self.guest.iter())
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.entrants().any(|e| e.player_id == player_id)
    }
}

/// Messages sent from client to relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Own position for the other racers
    PeerState(PeerState),

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from relay to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: String, server_time: u64 },

    /// Room changed (someone joined or left)
    RoomUpdate { room: RoomState },

    /// Another racer's position
    Peer { state: PeerState },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Decode an inbound client frame. Peer states go through the same checks as
/// [`decode_peer_state`].
pub fn decode_client_msg(text: &str) -> Option<ClientMsg> {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(ClientMsg::PeerState(state)) if !state.is_valid() => {
            debug!(player_id = %state.player_id, "Dropping peer state with bad values");
            None
        }
        Ok(msg) => Some(msg),
        Err(e) => {
            debug!(error = %e, "Dropping malformed client message");
            None
        }
    }
}
