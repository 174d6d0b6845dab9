//! Once-only persistence of the local finish

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::sim::SessionMode;
use crate::store::{MatchPositionUpdate, NewLeaderboardEntry, RaceResultStore};

/// Local result to persist
#[derive(Debug, Clone, PartialEq)]
pub struct FinishRecord {
    pub lap: u32,
    pub finish_secs: f64,
}

/// Writes the local finish to the store exactly once
#[derive(Clone)]
pub struct FinishReporter<S> {
    store: S,
    player_id: String,
    display_name: String,
    mode: SessionMode,
    match_id: Option<String>,
    submitted: Arc<AtomicBool>,
}

impl<S: RaceResultStore> FinishReporter<S> {
    pub fn new(
        store: S,
        player_id: impl Into<String>,
        display_name: impl Into<String>,
        mode: SessionMode,
        match_id: Option<String>,
    ) -> Self {
        Self {
            store,
            player_id: player_id.into(),
            display_name: display_name.into(),
            mode,
            match_id,
            submitted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted.load(Ordering::Acquire)
    }

    /// Persist in a background task on the current tokio runtime. Later calls
    /// return `None`; failures are logged and never retried.
    ///
    /// Without a runtime nothing is persisted and the reporter stays armed.
    pub fn report(&self, record: FinishRecord) -> Option<JoinHandle<()>> {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(player_id = %self.player_id, error = %e, "No async runtime, finish not persisted");
                return None;
            }
        };
        if self.submitted.swap(true, Ordering::AcqRel) {
            return None;
        }

        let store = self.store.clone();
        let player_id = self.player_id.clone();
        let display_name = self.display_name.clone();
        let mode = self.mode;
        let match_id = self.match_id.clone();

        Some(runtime.spawn(async move {
            if let Some(match_id) = match_id {
                let update = MatchPositionUpdate {
                    match_id: match_id.clone(),
                    player_id: player_id.clone(),
                    lap: record.lap,
                    finished: true,
                    finish_time: Some(record.finish_secs),
                };
                if let Err(e) = store.update_match_position(update).await {
                    warn!(match_id = %match_id, player_id = %player_id, error = %e, "Failed to store match position");
                }
            }

            let entry = NewLeaderboardEntry {
                player_name: display_name,
                time_secs: record.finish_secs,
                laps: record.lap,
                mode,
            };
            match store.submit_leaderboard_entry(entry).await {
                Ok(stored) => {
                    info!(player_id = %player_id, entry_id = %stored.id, time_secs = stored.time_secs, "Leaderboard entry stored")
                }
                Err(e) => error!(player_id = %player_id, error = %e, "Failed to store leaderboard entry"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryResultStore;

    #[tokio::test]
    async fn persists_exactly_once() {
        let store = MemoryResultStore::new();
        let reporter = FinishReporter::new(
            store.clone(),
            "p1",
            "Skipper",
            SessionMode::Multiplayer,
            Some("match-1".into()),
        );
        let record = FinishRecord {
            lap: 3,
            finish_secs: 72.5,
        };

        let handle = reporter.report(record.clone()).unwrap();
        assert!(reporter.report(record.clone()).is_none());
        assert!(reporter.clone().report(record).is_none());
        handle.await.unwrap();

        assert!(reporter.is_submitted());
        assert_eq!(store.entry_count(), 1);
        // One position update plus one leaderboard insert
        assert_eq!(store.write_count(), 2);
        let position = store.position("match-1", "p1").unwrap();
        assert!(position.finished);
        assert_eq!(position.finish_time, Some(72.5));
    }

    #[tokio::test]
    async fn solo_finish_skips_match_position() {
        let store = MemoryResultStore::new();
        let reporter = FinishReporter::new(store.clone(), "p1", "Skipper", SessionMode::Solo, None);
        reporter
            .report(FinishRecord {
                lap: 3,
                finish_secs: 64.0,
            })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_retried() {
        let store = MemoryResultStore::new();
        // An empty display name is rejected by the store
        let reporter = FinishReporter::new(store.clone(), "p1", "", SessionMode::Solo, None);
        let record = FinishRecord {
            lap: 3,
            finish_secs: 64.0,
        };
        reporter.report(record.clone()).unwrap().await.unwrap();
        assert!(reporter.report(record).is_none());
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn no_runtime_leaves_reporter_armed() {
        let store = MemoryResultStore::new();
        let reporter = FinishReporter::new(store.clone(), "p1", "Skipper", SessionMode::Solo, None);
        let record = FinishRecord {
            lap: 1,
            finish_secs: 40.0,
        };

        assert!(reporter.report(record.clone()).is_none());
        assert!(!reporter.is_submitted());

        // A later report from inside a runtime still goes through
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            reporter.report(record).unwrap().await.unwrap();
        });
        assert!(reporter.is_submitted());
        assert_eq!(store.entry_count(), 1);
    }
}
