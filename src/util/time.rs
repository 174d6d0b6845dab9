//! Time utilities for the simulation and the relay

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Reference tick rate that per-tick damping constants are tuned against
pub const REFERENCE_TPS: f64 = 60.0;

/// Minimum interval between two position broadcasts (20 Hz)
pub const SYNC_INTERVAL_MILLIS: u64 = 50;

/// Scale a per-reference-tick damping factor to an arbitrary delta time.
///
/// A friction of 0.96 applied once per 60 Hz tick becomes `0.96^(dt * 60)`,
/// so a 30 Hz host loses the same speed per second as a 60 Hz host.
pub fn damping(per_tick: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        return 1.0;
    }
    per_tick.powf(dt * REFERENCE_TPS)
}
