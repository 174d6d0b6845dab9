//! Result persistence: Supabase in production, memory otherwise

pub mod leaderboard;
pub mod memory;
pub mod supabase;

pub use leaderboard::{
    LeaderboardEntry, MatchPositionUpdate, NewLeaderboardEntry, RaceResultStore, ResultStore,
    SupabaseResultStore,
};
pub use memory::MemoryResultStore;
pub use supabase::{StoreError, SupabaseClient};
