//! Race simulation modules

pub mod ai;
pub mod boat;
pub mod collision;
pub mod events;
pub mod external;
pub mod race;
pub mod session;
pub mod track;

pub use ai::{PathFollower, ProgressEvent};
pub use boat::{Boat, ControlIntent, HitKind, KinematicState};
pub use collision::{ActorKey, ActorPositionTable, CircleCollider, ColliderRegistry, CollisionResult};
pub use events::SimEvent;
pub use external::{EventMultiplier, ExternalEventKind};
pub use race::{RacePhase, RaceProgress, RaceTracker};
pub use session::{ActorView, RaceSession, SessionMode};
pub use track::{CheckpointPath, Course, Layout, PlayBounds};

use thiserror::Error;

/// Simulation errors
#[derive(Debug, Error)]
pub enum SimError {
    #[error("actor {0} is already spawned")]
    DuplicateActor(String),

    #[error("reset is only available in solo sessions")]
    ResetNotAllowed,
}
