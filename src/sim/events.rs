//! One-shot pulses for the renderer

use serde::Serialize;

use super::boat::HitKind;

/// Something the renderer may want to flash, play or animate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    CountdownTick { remaining: u32 },
    RaceStarted,
    Checkpoint { actor_id: String, index: usize, lap: u32 },
    LapCompleted { actor_id: String, lap: u32 },
    Collision { actor_id: String, kind: HitKind },
    BoostCollected { actor_id: String, pad: usize },
    Finished { actor_id: String, place: u32, finish_secs: f64 },
    RaceFinished,
}
