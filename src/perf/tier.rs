//! Performance tiers and the shared read-mostly cell holding the current one

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Render quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl PerformanceTier {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PerformanceTier::Low,
            1 => PerformanceTier::Medium,
            _ => PerformanceTier::High,
        }
    }

    /// One step better, saturating at High
    pub fn improved(self) -> Self {
        match self {
            PerformanceTier::Low => PerformanceTier::Medium,
            _ => PerformanceTier::High,
        }
    }

    /// One step worse, saturating at Low
    pub fn degraded(self) -> Self {
        match self {
            PerformanceTier::High => PerformanceTier::Medium,
            _ => PerformanceTier::Low,
        }
    }

    pub fn params(self) -> TierParams {
        match self {
            PerformanceTier::High => TierParams {
                tick_skip: 1,
                shadows: true,
                particles: true,
                reflections: true,
                resolution_scale: 1.0,
            },
            PerformanceTier::Medium => TierParams {
                tick_skip: 2,
                shadows: true,
                particles: true,
                reflections: false,
                resolution_scale: 0.85,
            },
            PerformanceTier::Low => TierParams {
                tick_skip: 3,
                shadows: false,
                particles: false,
                reflections: false,
                resolution_scale: 0.65,
            },
        }
    }
}

/// Visual parameters derived from a tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierParams {
    /// Visual-only subsystems update every `tick_skip` ticks
    pub tick_skip: u32,
    pub shadows: bool,
    pub particles: bool,
    pub reflections: bool,
    pub resolution_scale: f64,
}

/// Current tier, written by the governor and read by anything visual
#[derive(Debug, Clone)]
pub struct SharedTier {
    inner: Arc<AtomicU8>,
}

impl SharedTier {
    pub fn new(initial: PerformanceTier) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial as u8)),
        }
    }

    pub fn get(&self) -> PerformanceTier {
        PerformanceTier::from_u8(self.inner.load(Ordering::Relaxed))
    }

    pub fn params(&self) -> TierParams {
        self.get().params()
    }

    pub(crate) fn set(&self, tier: PerformanceTier) {
        self.inner.store(tier as u8, Ordering::Relaxed);
    }
}

/// Tick-skip gate for one visual subsystem
#[derive(Debug, Clone)]
pub struct VisualThrottle {
    tier: SharedTier,
    counter: u32,
}

impl VisualThrottle {
    pub fn new(tier: SharedTier) -> Self {
        Self { tier, counter: 0 }
    }

    /// Returns true on the ticks the subsystem should run
    pub fn should_run(&mut self) -> bool {
        let skip = self.tier.params().tick_skip.max(1);
        self.counter = self.counter.wrapping_add(1);
        self.counter % skip == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_tier_is_visible_to_clones() {
        let tier = SharedTier::new(PerformanceTier::High);
        let reader = tier.clone();
        tier.set(PerformanceTier::Low);
        assert_eq!(reader.get(), PerformanceTier::Low);
        assert!(!reader.params().shadows);
    }

    #[test]
    fn steps_saturate() {
        assert_eq!(PerformanceTier::High.improved(), PerformanceTier::High);
        assert_eq!(PerformanceTier::Low.degraded(), PerformanceTier::Low);
        assert_eq!(PerformanceTier::Medium.improved(), PerformanceTier::High);
    }

    #[test]
    fn throttle_follows_tick_skip() {
        let tier = SharedTier::new(PerformanceTier::Low);
        let mut throttle = VisualThrottle::new(tier.clone());
        let runs = (0..9).filter(|_| throttle.should_run()).count();
        assert_eq!(runs, 3);

        tier.set(PerformanceTier::High);
        let runs = (0..9).filter(|_| throttle.should_run()).count();
        assert_eq!(runs, 9);
    }
}
