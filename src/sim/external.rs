//! Off-track events nudging race speed

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::time::damping;

const MIN_MULTIPLIER: f64 = 0.5;
const MAX_MULTIPLIER: f64 = 2.5;

/// Fraction of the distance to 1.0 kept per reference tick
const DECAY_PER_TICK: f64 = 0.995;

/// Event fed in from outside the race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalEventKind {
    SmallBuy,
    BigBuy,
    SellStreak,
}

impl ExternalEventKind {
    fn nudge(self) -> f64 {
        match self {
            ExternalEventKind::SmallBuy => 0.1,
            ExternalEventKind::BigBuy => 0.4,
            ExternalEventKind::SellStreak => -0.3,
        }
    }
}

/// Speed multiplier in `[0.5, 2.5]` that relaxes back to 1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventMultiplier {
    value: f64,
}

impl Default for EventMultiplier {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

impl EventMultiplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn apply(&mut self, event: ExternalEventKind) {
        self.value = (self.value + event.nudge()).clamp(MIN_MULTIPLIER, MAX_MULTIPLIER);
        debug!(?event, multiplier = self.value, "External event applied");
    }

    pub fn decay(&mut self, dt: f64) {
        let keep = damping(DECAY_PER_TICK, dt);
        self.value = 1.0 + (self.value - 1.0) * keep;
        if (self.value - 1.0).abs() < 1e-4 {
            self.value = 1.0;
        }
    }

    pub fn reset(&mut self) {
        self.value = 1.0;
    }
}
