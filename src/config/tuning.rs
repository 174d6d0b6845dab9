//! Simulation tuning - every playtested constant in one place
//!
//! All sections default to the values the game shipped with. A tuning file
//! only needs to name the fields it overrides:
//!
//! ```json
//! { "race": { "total_laps": 2 }, "ai": { "cruise_speed": 6.5 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Complete simulation tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimTuning {
    pub boat: BoatTuning,
    pub collision: CollisionTuning,
    pub race: RaceTuning,
    pub ai: AiTuning,
    pub boost: BoostTuning,
    pub layout: LayoutTuning,
}

impl SimTuning {
    /// Parse tuning overrides from a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Tuning)
    }

    /// Load tuning overrides from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Self::from_json(&text)
    }
}

/// Handling of an input-driven boat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoatTuning {
    /// Top forward speed (units/s) before multipliers
    pub max_forward: f64,
    /// Top reverse speed (units/s)
    pub max_reverse: f64,
    /// Throttle acceleration (units/s²)
    pub acceleration: f64,
    /// Speed kept per 60 Hz tick with no throttle
    pub forward_friction: f64,
    /// Turn acceleration (rad/s²)
    pub turn_acceleration: f64,
    /// Maximum turn rate (rad/s)
    pub max_turn_rate: f64,
    /// Turn rate kept per 60 Hz tick with no steering
    pub turn_friction: f64,
    /// Collision radius
    pub radius: f64,
    /// Acceleration and top speed factor while paddling
    pub paddle_factor: f64,
}

impl Default for BoatTuning {
    fn default() -> Self {
        Self {
            max_forward: 8.0,
            max_reverse: 3.0,
            acceleration: 6.0,
            forward_friction: 0.96,
            turn_acceleration: 4.0,
            max_turn_rate: 1.8,
            turn_friction: 0.9,
            radius: 1.5,
            paddle_factor: 1.35,
        }
    }
}

/// Collision response shared by players and AI followers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionTuning {
    /// Forward speed multiplier on impact (negative bounces backwards)
    pub bounce_factor: f64,
    /// Absolute cap on post-bounce speed
    pub bounce_speed_cap: f64,
    /// Fraction of the angle toward the escape normal applied per hit
    pub heading_bias: f64,
    /// Fraction of an actor-actor overlap the caller corrects on its own tick
    pub actor_push_share: f64,
    /// Top speed multiplier during an obstacle slowdown window
    pub obstacle_slowdown: f64,
    /// Obstacle slowdown window length (s)
    pub obstacle_slowdown_secs: f64,
    /// Top speed multiplier during an actor graze slowdown window
    pub actor_slowdown: f64,
    /// Actor graze slowdown window length (s)
    pub actor_slowdown_secs: f64,
    /// Deflection velocity added along the escape normal (units/s)
    pub deflection_impulse: f64,
    /// Deflection kept per 60 Hz tick
    pub deflection_decay: f64,
    /// Deflection magnitude snapped to zero
    pub deflection_epsilon: f64,
    /// Paddle boost lockout after any hit (s)
    pub boost_cooldown_secs: f64,
}

impl Default for CollisionTuning {
    fn default() -> Self {
        Self {
            bounce_factor: -0.3,
            bounce_speed_cap: 2.5,
            heading_bias: 0.3,
            actor_push_share: 0.6,
            obstacle_slowdown: 0.3,
            obstacle_slowdown_secs: 1.5,
            actor_slowdown: 0.3,
            actor_slowdown_secs: 0.6,
            deflection_impulse: 3.0,
            deflection_decay: 0.92,
            deflection_epsilon: 0.01,
            boost_cooldown_secs: 2.0,
        }
    }
}

/// Race rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceTuning {
    pub total_laps: u32,
    /// Max distance from a checkpoint for it to count
    pub capture_radius: f64,
    /// First countdown value shown
    pub countdown_from: u32,
    /// Real seconds between countdown steps
    pub countdown_step_secs: f64,
}

impl Default for RaceTuning {
    fn default() -> Self {
        Self {
            total_laps: 3,
            capture_radius: 14.0,
            countdown_from: 3,
            countdown_step_secs: 1.0,
        }
    }
}

/// Scripted rival behaviour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Path speed (units/s) before multipliers
    pub cruise_speed: f64,
    /// Relative amplitude of the per-boat speed wobble
    pub oscillation_amplitude: f64,
    /// Wobble angular frequency (rad/s)
    pub oscillation_frequency: f64,
    /// How far ahead obstacles are considered
    pub lookahead: f64,
    /// Lateral distance from the path (plus obstacle radius) that triggers avoidance
    pub lateral_threshold: f64,
    pub avoidance_gain: f64,
    /// Cap on the summed avoidance offset
    pub max_avoidance_offset: f64,
    /// Heading smoothing per 60 Hz tick
    pub heading_smoothing: f64,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            cruise_speed: 7.0,
            oscillation_amplitude: 0.08,
            oscillation_frequency: 0.7,
            lookahead: 25.0,
            lateral_threshold: 6.0,
            avoidance_gain: 0.8,
            max_avoidance_offset: 8.0,
            heading_smoothing: 0.2,
        }
    }
}

/// Boost pads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostTuning {
    pub pad_radius: f64,
    /// Race boost multiplier granted by a pad
    pub multiplier: f64,
    pub duration_secs: f64,
}

impl Default for BoostTuning {
    fn default() -> Self {
        Self {
            pad_radius: 3.0,
            multiplier: 1.5,
            duration_secs: 2.0,
        }
    }
}

/// Procedural obstacle and pad placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutTuning {
    pub obstacle_count: usize,
    pub obstacle_min_radius: f64,
    pub obstacle_max_radius: f64,
    /// Lateral offset range from the racing line
    pub obstacle_min_offset: f64,
    pub obstacle_max_offset: f64,
    pub boost_pad_count: usize,
    /// Lateral spacing between starting lanes
    pub grid_spacing: f64,
}

impl Default for LayoutTuning {
    fn default() -> Self {
        Self {
            obstacle_count: 6,
            obstacle_min_radius: 2.0,
            obstacle_max_radius: 4.0,
            obstacle_min_offset: 3.0,
            obstacle_max_offset: 10.0,
            boost_pad_count: 3,
            grid_spacing: 4.0,
        }
    }
}
