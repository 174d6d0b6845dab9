//! Matchmaking rooms for two-boat races

pub mod rooms;
pub mod service;

pub use rooms::{WaitingRoom, WaitingRooms};
pub use service::{RoomError, RoomRole, RoomService};
