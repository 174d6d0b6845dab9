//! Circle colliders and the shared actor position table

use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::SimError;

/// Normal used when an actor sits exactly on a collider center
const DEGENERATE_NORMAL: DVec2 = DVec2::new(0.0, 1.0);

/// Static or generated circular obstacle on the ground plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleCollider {
    pub x: f64,
    pub z: f64,
    pub radius: f64,
    /// Diagnostic only
    pub label: String,
}

impl CircleCollider {
    /// Create a collider. Non-positive radii are raised to a small minimum.
    pub fn new(x: f64, z: f64, radius: f64, label: impl Into<String>) -> Self {
        Self {
            x,
            z,
            radius: radius.max(1e-3),
            label: label.into(),
        }
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x, self.z)
    }
}

/// Result of resolving one actor against a set of circles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// Corrected actor position
    pub position: DVec2,
    /// Whether any overlap was corrected
    pub hit: bool,
    /// Normal of the last correction, pointing away from the obstacle
    pub normal: DVec2,
}

impl CollisionResult {
    fn clear(position: DVec2) -> Self {
        Self {
            position,
            hit: false,
            normal: DVec2::ZERO,
        }
    }
}

/// Read-only world colliders plus resolution against per-session extras
#[derive(Debug, Clone, Default)]
pub struct ColliderRegistry {
    statics: Vec<CircleCollider>,
}

impl ColliderRegistry {
    pub fn new(statics: Vec<CircleCollider>) -> Self {
        Self { statics }
    }

    /// Push an actor out of every overlapping collider.
    ///
    /// Static colliders are checked first, then `extra` (obstacles), each in
    /// listed order. Every correction places the actor exactly `radius_sum`
    /// from that collider's center. A later correction may re-enter an earlier
    /// collider when colliders are packed tighter than an actor diameter.
    pub fn resolve(
        &self,
        actor_pos: DVec2,
        actor_radius: f64,
        extra: &[CircleCollider],
    ) -> CollisionResult {
        let mut result = CollisionResult::clear(actor_pos);

        for collider in self.statics.iter().chain(extra) {
            let center = collider.center();
            let radius_sum = collider.radius + actor_radius;
            let delta = result.position - center;
            let dist_sq = delta.length_squared();

            if dist_sq >= radius_sum * radius_sum {
                continue;
            }

            let normal = if dist_sq > 0.0 {
                delta / dist_sq.sqrt()
            } else {
                DEGENERATE_NORMAL
            };

            result.position = center + normal * radius_sum;
            result.normal = normal;
            result.hit = true;
        }

        result
    }
}

/// Write capability for one entry of an [`ActorPositionTable`].
///
/// Only the table hands these out and they cannot be cloned, so each entry
/// has exactly one writer.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ActorKey {
    id: String,
}

impl ActorKey {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Latest ground position of every live actor in a session.
///
/// Entries are kept in id order so actor resolution is reproducible.
#[derive(Debug, Default)]
pub struct ActorPositionTable {
    entries: BTreeMap<String, DVec2>,
}

impl ActorPositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an actor and hand back the only key allowed to update it
    pub fn spawn(&mut self, id: impl Into<String>, position: DVec2) -> Result<ActorKey, SimError> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(SimError::DuplicateActor(id));
        }
        self.entries.insert(id.clone(), position);
        Ok(ActorKey { id })
    }

    /// Overwrite the owner's entry
    pub fn publish(&mut self, key: &ActorKey, position: DVec2) {
        self.entries.insert(key.id.clone(), position);
    }

    /// Remove the owner's entry, consuming the key
    pub fn despawn(&mut self, key: ActorKey) {
        self.entries.remove(&key.id);
    }

    pub fn get(&self, id: &str) -> Option<DVec2> {
        self.entries.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push `pos` away from every other actor it overlaps, visiting them in
    /// id order.
    ///
    /// The caller only moves by `push_share` of each overlap; the other actor
    /// applies its own share on its own tick. All actors share `radius`.
    pub fn resolve_against_actors(
        &self,
        me: &ActorKey,
        pos: DVec2,
        radius: f64,
        push_share: f64,
    ) -> CollisionResult {
        let mut result = CollisionResult::clear(pos);
        let min_dist = radius * 2.0;

        for (other_id, other_pos) in self.entries.iter() {
            if *other_id == me.id {
                continue;
            }

            let delta = result.position - *other_pos;
            let dist_sq = delta.length_squared();
            if dist_sq >= min_dist * min_dist {
                continue;
            }

            let dist = dist_sq.sqrt();
            let normal = if dist > 0.0 {
                delta / dist
            } else if me.id < *other_id {
                DEGENERATE_NORMAL
            } else {
                -DEGENERATE_NORMAL
            };

            let overlap = min_dist - dist;
            result.position += normal * overlap * push_share;
            result.normal = normal;
            result.hit = true;
        }

        result
    }
}
