//! Host integration contract.
//!
//! The engine never reaches for globals: the embedding game provides a
//! [`WorldHost`] for actor identity and the simulation clock, and optionally
//! a [`GameEventBus`] for best-effort broadcast to external systems.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an actor participating in relationships.
///
/// The engine treats this as an opaque handle; liveness and display names are
/// resolved through the [`WorldHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Services the embedding game must provide to the engine.
///
/// All methods are synchronous and expected to be cheap; the engine calls
/// them freely during mutation and query paths.
pub trait WorldHost {
    /// Current simulation time in seconds.
    fn game_time_seconds(&self) -> f64;

    /// Whether the actor still exists in the world.
    ///
    /// Relationships whose endpoints stop being alive are treated as invalid
    /// and reaped lazily during decay processing.
    fn is_actor_alive(&self, actor: ActorId) -> bool;

    /// Display name for an actor, used as the save-file lookup key.
    fn actor_name(&self, actor: ActorId) -> Option<String>;

    /// Resolve an actor by display name (used when loading saves).
    fn find_actor_by_name(&self, name: &str) -> Option<ActorId>;
}

/// Best-effort broadcast sink for relationship events.
///
/// The engine forwards state changes and action-triggered event tags here so
/// external systems (dialogue, quests, UI) can react. Absence of a bus is
/// fine; the engine swallows it and carries on.
pub trait GameEventBus {
    fn send_event(
        &mut self,
        tag: &str,
        instigator: ActorId,
        target: ActorId,
        payload: &HashMap<String, String>,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_uniqueness() {
        let a = ActorId::new();
        let b = ActorId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_actor_id_roundtrips_through_serde() {
        let id = ActorId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: ActorId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
