//! Race results: leaderboard entries and per-match positions

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::memory::MemoryResultStore;
use super::supabase::{StoreError, SupabaseClient};
use crate::config::Config;
use crate::sim::SessionMode;

const LEADERBOARD_TABLE: &str = "leaderboard";
const MATCH_PLAYERS_TABLE: &str = "match_players";

/// Longest accepted display name
pub const MAX_NAME_LEN: usize = 32;
/// Most rows one leaderboard read returns
pub const MAX_LIMIT: usize = 100;

/// Stored leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub player_name: String,
    /// Race time in seconds
    pub time_secs: f64,
    pub laps: u32,
    pub mode: SessionMode,
    pub created_at: DateTime<Utc>,
}

/// Leaderboard row to insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLeaderboardEntry {
    pub player_name: String,
    pub time_secs: f64,
    pub laps: u32,
    pub mode: SessionMode,
}

impl NewLeaderboardEntry {
    /// Reject entries no client should be able to produce
    pub fn validate(&self) -> Result<(), StoreError> {
        let name = self.player_name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(StoreError::Invalid(format!(
                "player name must be 1-{MAX_NAME_LEN} characters"
            )));
        }
        if !self.time_secs.is_finite() || self.time_secs <= 0.0 {
            return Err(StoreError::Invalid("time must be positive".into()));
        }
        if self.laps == 0 {
            return Err(StoreError::Invalid("laps must be at least 1".into()));
        }
        Ok(())
    }
}

/// Latest known position of a racer within a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPositionUpdate {
    pub match_id: String,
    pub player_id: String,
    pub lap: u32,
    pub finished: bool,
    pub finish_time: Option<f64>,
}

#[derive(Serialize)]
struct MatchPositionPatch {
    lap: u32,
    finished: bool,
    finish_time: Option<f64>,
}

/// Ids are spliced into PostgREST filters, so only plain tokens are allowed
fn is_query_safe(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Where race outcomes are persisted
pub trait RaceResultStore: Clone + Send + Sync + 'static {
    fn submit_leaderboard_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> impl Future<Output = Result<LeaderboardEntry, StoreError>> + Send;

    fn update_match_position(
        &self,
        update: MatchPositionUpdate,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fastest entries for `mode`, best first
    fn top_entries(
        &self,
        mode: SessionMode,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LeaderboardEntry>, StoreError>> + Send;
}

/// Results kept in Supabase tables
#[derive(Clone)]
pub struct SupabaseResultStore {
    client: SupabaseClient,
}

impl SupabaseResultStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

impl RaceResultStore for SupabaseResultStore {
    async fn submit_leaderboard_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> Result<LeaderboardEntry, StoreError> {
        entry.validate()?;
        self.client.insert(LEADERBOARD_TABLE, &entry).await
    }

    async fn update_match_position(&self, update: MatchPositionUpdate) -> Result<(), StoreError> {
        for id in [&update.match_id, &update.player_id] {
            if !is_query_safe(id) {
                return Err(StoreError::Invalid(format!("bad id {id:?}")));
            }
        }

        let query = format!(
            "match_id=eq.{}&player_id=eq.{}",
            update.match_id, update.player_id
        );
        let patch = MatchPositionPatch {
            lap: update.lap,
            finished: update.finished,
            finish_time: update.finish_time,
        };
        self.client.update(MATCH_PLAYERS_TABLE, &query, &patch).await
    }

    async fn top_entries(
        &self,
        mode: SessionMode,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let query = format!(
            "mode=eq.{}&order=time_secs.asc&limit={}",
            mode.as_str(),
            limit.clamp(1, MAX_LIMIT)
        );
        self.client.get(LEADERBOARD_TABLE, &query).await
    }
}

/// Store selected from configuration
#[derive(Clone)]
pub enum ResultStore {
    Supabase(SupabaseResultStore),
    Memory(MemoryResultStore),
}

impl ResultStore {
    /// Supabase when credentials are configured, memory otherwise
    pub fn from_config(config: &Config) -> Self {
        match &config.supabase {
            Some(supabase) => {
                ResultStore::Supabase(SupabaseResultStore::new(SupabaseClient::new(supabase)))
            }
            None => ResultStore::Memory(MemoryResultStore::new()),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            ResultStore::Supabase(_) => "supabase",
            ResultStore::Memory(_) => "memory",
        }
    }
}

impl RaceResultStore for ResultStore {
    async fn submit_leaderboard_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> Result<LeaderboardEntry, StoreError> {
        match self {
            ResultStore::Supabase(store) => store.submit_leaderboard_entry(entry).await,
            ResultStore::Memory(store) => store.submit_leaderboard_entry(entry).await,
        }
    }

    async fn update_match_position(&self, update: MatchPositionUpdate) -> Result<(), StoreError> {
        match self {
            ResultStore::Supabase(store) => store.update_match_position(update).await,
            ResultStore::Memory(store) => store.update_match_position(update).await,
        }
    }

    async fn top_entries(
        &self,
        mode: SessionMode,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        match self {
            ResultStore::Supabase(store) => store.top_entries(mode, limit).await,
            ResultStore::Memory(store) => store.top_entries(mode, limit).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, time: f64) -> NewLeaderboardEntry {
        NewLeaderboardEntry {
            player_name: name.into(),
            time_secs: time,
            laps: 3,
            mode: SessionMode::Solo,
        }
    }

    #[test]
    fn validation_rejects_bad_entries() {
        assert!(entry("Skipper", 95.2).validate().is_ok());
        assert!(entry("  ", 95.2).validate().is_err());
        assert!(entry(&"x".repeat(MAX_NAME_LEN + 1), 95.2).validate().is_err());
        assert!(entry("Skipper", 0.0).validate().is_err());
        assert!(entry("Skipper", f64::INFINITY).validate().is_err());
        let mut no_laps = entry("Skipper", 10.0);
        no_laps.laps = 0;
        assert!(no_laps.validate().is_err());
    }

    #[test]
    fn query_ids_are_plain_tokens() {
        assert!(is_query_safe("3f2c9a1e-0b7d-4a8e-9c1f-2d3e4f5a6b7c"));
        assert!(is_query_safe("player_1"));
        assert!(!is_query_safe(""));
        assert!(!is_query_safe("a,b"));
        assert!(!is_query_safe("a=eq.b"));
    }

    #[test]
    fn config_without_supabase_uses_memory() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(ResultStore::from_config(&config).backend(), "memory");
    }

    #[tokio::test]
    async fn supabase_rejects_unsafe_ids_before_any_request() {
        let store = SupabaseResultStore::new(SupabaseClient::new(&crate::config::SupabaseConfig {
            url: "http://127.0.0.1:9".into(),
            service_role_key: "key".into(),
        }));
        let result = store
            .update_match_position(MatchPositionUpdate {
                match_id: "m&finished=eq.true".into(),
                player_id: "p".into(),
                lap: 1,
                finished: false,
                finish_time: None,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }
}
