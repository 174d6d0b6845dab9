//! Regatta - boat racing simulation core
//!
//! The simulation ([`sim`]) holds 2D ground-plane positions, headings and
//! speeds and advances them once per `tick`. Around it sit the render quality
//! governor ([`perf`]), the multiplayer position sync ([`sync`]) and the
//! pieces of the `regatta-relay` server: matchmaking rooms, the WebSocket
//! relay and result persistence.

pub mod app;
pub mod config;
pub mod http;
pub mod matchmaking;
pub mod perf;
pub mod sim;
pub mod store;
pub mod sync;
pub mod util;
pub mod ws;
