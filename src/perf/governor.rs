//! Frame-rate driven tier adjustment with hysteresis

use tracing::{debug, info};

use super::tier::{PerformanceTier, SharedTier};

/// Samples per evaluation window
pub const WINDOW_SAMPLES: usize = 45;
/// Windows thrown away while the app warms up
const WARMUP_WINDOWS: u32 = 2;
/// Mean FPS below this drops straight to Low
const CRITICAL_FPS: f64 = 20.0;
/// Mean FPS below this caps the tier at Medium
const POOR_FPS: f64 = 32.0;
/// Mean FPS above this counts as a good window
const GOOD_FPS: f64 = 50.0;
/// Consecutive good windows needed to step up
const GOOD_WINDOWS_TO_IMPROVE: u32 = 4;
/// No further change for this long after one (s)
const COOLDOWN_SECS: f64 = 3.0;

/// Watches frame times and moves the shared tier
#[derive(Debug)]
pub struct QualityGovernor {
    tier: SharedTier,
    samples: Vec<f64>,
    windows_seen: u32,
    good_streak: u32,
    /// Accumulated dt (s)
    clock: f64,
    cooldown_until: f64,
}

impl QualityGovernor {
    pub fn new(tier: SharedTier) -> Self {
        Self {
            tier,
            samples: Vec::with_capacity(WINDOW_SAMPLES),
            windows_seen: 0,
            good_streak: 0,
            clock: 0.0,
            cooldown_until: 0.0,
        }
    }

    pub fn tier(&self) -> PerformanceTier {
        self.tier.get()
    }

    /// Record one frame. Returns the new tier when it changed.
    pub fn tick(&mut self, dt: f64) -> Option<PerformanceTier> {
        if !dt.is_finite() || dt <= 0.0 {
            return None;
        }
        self.clock += dt;
        self.samples.push(1.0 / dt);

        if self.samples.len() < WINDOW_SAMPLES {
            return None;
        }

        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        self.samples.clear();
        self.windows_seen += 1;

        if self.windows_seen <= WARMUP_WINDOWS {
            debug!(mean_fps = mean, "Warmup window discarded");
            return None;
        }

        self.evaluate(mean)
    }

    fn evaluate(&mut self, mean: f64) -> Option<PerformanceTier> {
        let current = self.tier.get();

        let target = if mean < CRITICAL_FPS {
            self.good_streak = 0;
            PerformanceTier::Low
        } else if mean < POOR_FPS {
            self.good_streak = 0;
            current.min(PerformanceTier::Medium)
        } else if mean > GOOD_FPS {
            self.good_streak += 1;
            if self.good_streak >= GOOD_WINDOWS_TO_IMPROVE {
                current.improved()
            } else {
                current
            }
        } else {
            self.good_streak = 0;
            current
        };

        if target == current || self.clock < self.cooldown_until {
            return None;
        }

        self.tier.set(target);
        self.good_streak = 0;
        self.cooldown_until = self.clock + COOLDOWN_SECS;
        info!(from = ?current, to = ?target, mean_fps = mean, "Performance tier changed");
        Some(target)
    }
}
