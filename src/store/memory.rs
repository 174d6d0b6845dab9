//! In-process result store for local runs and tests

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::leaderboard::{
    LeaderboardEntry, MatchPositionUpdate, NewLeaderboardEntry, RaceResultStore, MAX_LIMIT,
};
use super::supabase::StoreError;
use crate::sim::SessionMode;

#[derive(Default)]
struct Inner {
    entries: Vec<LeaderboardEntry>,
    /// Keyed by (match id, player id)
    positions: HashMap<(String, String), MatchPositionUpdate>,
    /// Every write call, successful or not
    writes: usize,
}

/// Results held in memory; clones share the same data
#[derive(Clone, Default)]
pub struct MemoryResultStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write calls seen so far
    pub fn write_count(&self) -> usize {
        self.inner.read().writes
    }

    pub fn position(&self, match_id: &str, player_id: &str) -> Option<MatchPositionUpdate> {
        self.inner
            .read()
            .positions
            .get(&(match_id.to_string(), player_id.to_string()))
            .cloned()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.read().entries.len()
    }
}

impl RaceResultStore for MemoryResultStore {
    async fn submit_leaderboard_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> Result<LeaderboardEntry, StoreError> {
        let mut inner = self.inner.write();
        inner.writes += 1;
        entry.validate()?;

        let stored = LeaderboardEntry {
            id: Uuid::new_v4(),
            player_name: entry.player_name.trim().to_string(),
            time_secs: entry.time_secs,
            laps: entry.laps,
            mode: entry.mode,
            created_at: Utc::now(),
        };
        inner.entries.push(stored.clone());
        Ok(stored)
    }

    async fn update_match_position(&self, update: MatchPositionUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.writes += 1;
        inner
            .positions
            .insert((update.match_id.clone(), update.player_id.clone()), update);
        Ok(())
    }

    async fn top_entries(
        &self,
        mode: SessionMode,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let inner = self.inner.read();
        let mut rows: Vec<LeaderboardEntry> = inner
            .entries
            .iter()
            .filter(|e| e.mode == mode)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.time_secs.total_cmp(&b.time_secs));
        rows.truncate(limit.clamp(1, MAX_LIMIT));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, time: f64, mode: SessionMode) -> NewLeaderboardEntry {
        NewLeaderboardEntry {
            player_name: name.into(),
            time_secs: time,
            laps: 3,
            mode,
        }
    }

    #[tokio::test]
    async fn top_entries_are_fastest_first_per_mode() {
        let store = MemoryResultStore::new();
        store.submit_leaderboard_entry(entry("slow", 120.0, SessionMode::Solo)).await.unwrap();
        store.submit_leaderboard_entry(entry("fast", 90.0, SessionMode::Solo)).await.unwrap();
        store
            .submit_leaderboard_entry(entry("duel", 80.0, SessionMode::Multiplayer))
            .await
            .unwrap();

        let solo = store.top_entries(SessionMode::Solo, 10).await.unwrap();
        let names: Vec<&str> = solo.iter().map(|e| e.player_name.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow"]);

        let one = store.top_entries(SessionMode::Solo, 1).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn invalid_entries_are_counted_but_not_stored() {
        let store = MemoryResultStore::new();
        let result =
            tokio_test::block_on(store.submit_leaderboard_entry(entry("", 10.0, SessionMode::Solo)));
        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn positions_overwrite_per_player() {
        let store = MemoryResultStore::new();
        for lap in 1..=2 {
            store
                .update_match_position(MatchPositionUpdate {
                    match_id: "m".into(),
                    player_id: "p".into(),
                    lap,
                    finished: lap == 2,
                    finish_time: None,
                })
                .await
                .unwrap();
        }
        let position = store.position("m", "p").unwrap();
        assert_eq!(position.lap, 2);
        assert!(position.finished);
    }
}
