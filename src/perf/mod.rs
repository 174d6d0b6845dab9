//! Adaptive render quality: device classification, shared tier and the
//! frame-rate governor
//!
//! Nothing in [`crate::sim`] reads the tier; only visual subsystems do.

pub mod governor;
pub mod hardware;
pub mod tier;

pub use governor::QualityGovernor;
pub use hardware::HardwareProfile;
pub use tier::{PerformanceTier, SharedTier, TierParams, VisualThrottle};
