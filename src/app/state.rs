//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::matchmaking::RoomService;
use crate::store::ResultStore;
use crate::util::rate_limit::{create_limiter, Limiter, ROOM_JOIN_RATE_LIMIT};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: RoomService,
    pub results: ResultStore,
    /// Relay-wide cap on room joins
    pub join_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let results = ResultStore::from_config(&config);
        Self::with_store(config, results)
    }

    /// State with an explicit result store
    pub fn with_store(config: Config, results: ResultStore) -> Self {
        Self {
            config: Arc::new(config),
            rooms: RoomService::default(),
            results,
            join_limiter: create_limiter(ROOM_JOIN_RATE_LIMIT),
        }
    }
}
