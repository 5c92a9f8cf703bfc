//! Save/load for live relationships.
//!
//! Serializes every live relationship into a versioned container, keyed by
//! actor display names. Loading is tolerant: records whose actors cannot be
//! resolved are skipped and counted, and an older save version is migrated
//! in place before records are applied.

use crate::engine::RelationshipEngine;
use crate::host::ActorId;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Errors from persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
pub const CURRENT_SAVE_VERSION: u32 = 1;

/// One serialized relationship.
///
/// Endpoints are keyed by display name and resolved through
/// [`WorldHost::find_actor_by_name`](crate::host::WorldHost::find_actor_by_name)
/// at load time. Names are not stable identities: collisions or renames
/// between save and load silently bind the record to the wrong actor, which
/// is a known limitation of this format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRelationship {
    pub subject_name: String,
    pub target_name: String,
    #[serde(default)]
    pub dimension_values: HashMap<String, f32>,
    #[serde(default)]
    pub current_state: Option<String>,
    #[serde(default)]
    pub time_in_state: f64,
    #[serde(default)]
    pub active_traits: Vec<String>,
    #[serde(default)]
    pub trait_stack_counts: HashMap<String, u32>,
    #[serde(default)]
    pub action_usage_counts: HashMap<String, u32>,
    #[serde(default)]
    pub action_last_execution_times: HashMap<String, f64>,
    #[serde(default)]
    pub last_update_time: f64,
}

/// Outcome of applying a save to an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Relationships successfully restored.
    pub loaded: usize,
    /// Records skipped because an endpoint actor could not be resolved.
    pub failed: usize,
}

/// Versioned container for all serialized relationships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSave {
    /// Save format version for migration checks.
    pub version: u32,
    /// Unix timestamp (seconds) when the save was created.
    pub saved_at: String,
    /// Game time in seconds when the save was created.
    pub saved_game_time: f64,
    pub relationships: Vec<SavedRelationship>,
}

/// Metadata readable without deserializing every relationship.
#[derive(Debug, Clone)]
pub struct SaveSummary {
    pub version: u32,
    pub saved_at: String,
    pub saved_game_time: f64,
    pub relationship_count: usize,
}

impl RelationshipSave {
    /// Snapshot every live relationship of the engine.
    ///
    /// Relationships with dead or nameless endpoints are skipped.
    pub fn capture(engine: &RelationshipEngine) -> Self {
        let now = engine.host.game_time_seconds();
        let mut records = Vec::new();

        for ((subject, target), rel) in &engine.relationships {
            if !engine.host.is_actor_alive(*subject) || !engine.host.is_actor_alive(*target) {
                continue;
            }
            let (Some(subject_name), Some(target_name)) =
                (engine.host.actor_name(*subject), engine.host.actor_name(*target))
            else {
                warn!("skipping relationship with unnamed endpoint");
                continue;
            };

            records.push(SavedRelationship {
                subject_name,
                target_name,
                dimension_values: rel
                    .dimensions
                    .iter()
                    .map(|(id, value)| (id.clone(), value.value))
                    .collect(),
                current_state: rel.state.current_state.clone(),
                time_in_state: rel.state.time_in_state(now),
                active_traits: rel.traits.iter().map(|t| t.trait_id.clone()).collect(),
                trait_stack_counts: rel
                    .traits
                    .iter()
                    .map(|t| (t.trait_id.clone(), t.stack_count))
                    .collect(),
                action_usage_counts: rel
                    .actions
                    .iter()
                    .map(|(id, instance)| (id.clone(), instance.usage_count))
                    .collect(),
                action_last_execution_times: rel
                    .actions
                    .iter()
                    .map(|(id, instance)| (id.clone(), instance.last_execution_time))
                    .collect(),
                last_update_time: rel.last_update_time,
            });
        }

        debug!("serialized {} relationships", records.len());
        Self {
            version: CURRENT_SAVE_VERSION,
            saved_at: unix_timestamp(),
            saved_game_time: now,
            relationships: records,
        }
    }

    /// Restore relationships into the engine, resolving endpoints by name.
    ///
    /// Missing actors fail their record only; everything else proceeds.
    pub fn apply(mut self, engine: &mut RelationshipEngine) -> LoadReport {
        if self.version != CURRENT_SAVE_VERSION {
            self.migrate();
        }

        let now = engine.host.game_time_seconds();
        let mut report = LoadReport::default();

        for record in &self.relationships {
            let (Some(subject), Some(target)) = (
                engine.host.find_actor_by_name(&record.subject_name),
                engine.host.find_actor_by_name(&record.target_name),
            ) else {
                warn!(
                    "cannot restore relationship: actor not found ({} -> {})",
                    record.subject_name, record.target_name
                );
                report.failed += 1;
                continue;
            };

            if !engine.has_relationship(subject, target) {
                engine.create_relationship(subject, target, None, None);
            }

            for (dimension, value) in &record.dimension_values {
                engine.set_dimension_value(subject, target, dimension, *value);
            }

            if let Some(state) = &record.current_state {
                engine.force_state_change(subject, target, state);
            }

            restore_traits(engine, subject, target, record);

            if let Some(rel) = engine.relationships.get_mut(&(subject, target)) {
                for (action_id, count) in &record.action_usage_counts {
                    let last_execution = record
                        .action_last_execution_times
                        .get(action_id)
                        .copied()
                        .unwrap_or(0.0);
                    rel.actions.insert(
                        action_id.clone(),
                        crate::action::ActionInstance {
                            action_id: action_id.clone(),
                            usage_count: *count,
                            last_execution_time: last_execution,
                        },
                    );
                }
                rel.state.state_entry_time = now - record.time_in_state;
                rel.last_update_time = record.last_update_time;
            }

            report.loaded += 1;
        }

        debug!("loaded {} relationships ({} failed)", report.loaded, report.failed);
        report
    }

    /// Migrate an older save format to the current version.
    ///
    /// Only one format has existed so far, so this just stamps the version.
    pub fn migrate(&mut self) {
        debug!(
            "migrating save from version {} to {}",
            self.version, CURRENT_SAVE_VERSION
        );
        self.version = CURRENT_SAVE_VERSION;
    }

    /// Sanity-check the container, pushing messages into `errors`.
    pub fn validate(&self, errors: &mut Vec<String>) -> bool {
        let mut valid = true;

        if self.version > CURRENT_SAVE_VERSION {
            errors.push(format!(
                "save version {} is newer than current version {}",
                self.version, CURRENT_SAVE_VERSION
            ));
            valid = false;
        }

        for record in &self.relationships {
            if record.subject_name.is_empty() || record.target_name.is_empty() {
                errors.push("relationship record has an empty actor name".to_string());
                valid = false;
            }
        }

        valid
    }

    /// Save to a JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from a JSON file.
    ///
    /// A save newer than this build is rejected; an older one is accepted
    /// and migrated when applied.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = std::fs::read_to_string(path)?;
        let save: Self = serde_json::from_str(&content)?;

        if save.version > CURRENT_SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: CURRENT_SAVE_VERSION,
                found: save.version,
            });
        }

        Ok(save)
    }

    /// Read save metadata without deserializing every relationship.
    pub fn peek_summary(path: impl AsRef<Path>) -> Result<SaveSummary, PersistError> {
        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            saved_at: String,
            saved_game_time: f64,
            relationships: Vec<serde::de::IgnoredAny>,
        }

        let content = std::fs::read_to_string(path)?;
        let partial: Partial = serde_json::from_str(&content)?;

        Ok(SaveSummary {
            version: partial.version,
            saved_at: partial.saved_at,
            saved_game_time: partial.saved_game_time,
            relationship_count: partial.relationships.len(),
        })
    }
}

/// Re-add traits and grow stacks toward the saved counts.
fn restore_traits(
    engine: &mut RelationshipEngine,
    subject: ActorId,
    target: ActorId,
    record: &SavedRelationship,
) {
    for trait_id in &record.active_traits {
        engine.add_trait(subject, target, trait_id);

        let wanted = record.trait_stack_counts.get(trait_id).copied().unwrap_or(1);
        let mut current = engine.trait_stack_count(subject, target, trait_id);
        while current < wanted {
            if !engine.add_trait(subject, target, trait_id) {
                break;
            }
            let next = engine.trait_stack_count(subject, target, trait_id);
            if next == current {
                break; // stack cap reached
            }
            current = next;
        }
    }
}

/// Current wall-clock time as a unix-seconds string.
fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RelationshipEngine;
    use crate::testing::{sample_database, MockHost};

    fn engine_with_host() -> (RelationshipEngine, MockHost, ActorId, ActorId) {
        let host = MockHost::new();
        let npc = host.spawn_actor("Mira");
        let player = host.spawn_actor("Player");
        let engine =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host.clone()), 9);
        (engine, host, npc, player)
    }

    #[test]
    fn test_capture_and_apply_roundtrip() {
        let (mut engine, host, npc, player) = engine_with_host();
        engine.create_relationship(npc, player, Some("profile.villager"), None);
        engine.set_dimension_value(npc, player, "dimension.affinity", 42.0);
        engine.add_trait(npc, player, "trait.forgiving");

        let save = RelationshipSave::capture(&engine);
        assert_eq!(save.version, CURRENT_SAVE_VERSION);
        assert_eq!(save.relationships.len(), 1);

        // Restore into a fresh engine over the same world.
        let mut restored =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host.clone()), 9);
        let report = save.apply(&mut restored);

        assert_eq!(report, LoadReport { loaded: 1, failed: 0 });
        assert_eq!(restored.dimension_value(npc, player, "dimension.affinity"), 42.0);
        assert!(restored.has_trait(npc, player, "trait.forgiving"));
    }

    #[test]
    fn test_stack_counts_restore() {
        let (mut engine, host, npc, player) = engine_with_host();
        engine.create_relationship(npc, player, None, None);
        for _ in 0..3 {
            engine.add_trait(npc, player, "trait.wary");
        }

        let save = RelationshipSave::capture(&engine);
        let mut restored =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host.clone()), 9);
        save.apply(&mut restored);

        assert_eq!(restored.trait_stack_count(npc, player, "trait.wary"), 3);
    }

    #[test]
    fn test_missing_actor_is_tolerated() {
        let (mut engine, host, npc, player) = engine_with_host();
        let ghost = host.spawn_actor("Ghost");
        engine.create_relationship(npc, player, None, None);
        engine.create_relationship(npc, ghost, None, None);

        let save = RelationshipSave::capture(&engine);
        host.destroy_actor(ghost);

        let mut restored =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host.clone()), 9);
        let report = save.apply(&mut restored);

        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed, 1);
        assert!(restored.has_relationship(npc, player));
    }

    #[test]
    fn test_old_version_migrates_on_apply() {
        let (mut engine, host, npc, player) = engine_with_host();
        engine.create_relationship(npc, player, None, None);

        let mut save = RelationshipSave::capture(&engine);
        save.version = 0;

        let mut restored =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host.clone()), 9);
        let report = save.apply(&mut restored);
        assert_eq!(report.loaded, 1);
    }

    #[test]
    fn test_validate_rejects_newer_version() {
        let save = RelationshipSave {
            version: CURRENT_SAVE_VERSION + 1,
            saved_at: "0".to_string(),
            saved_game_time: 0.0,
            relationships: Vec::new(),
        };
        let mut errors = Vec::new();
        assert!(!save.validate(&mut errors));
    }

    #[test]
    fn test_save_load_json_and_peek() {
        let (mut engine, _host, npc, player) = engine_with_host();
        engine.create_relationship(npc, player, None, None);

        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("relationships.json");

        let save = RelationshipSave::capture(&engine);
        save.save_json(&path).expect("save should succeed");

        let summary = RelationshipSave::peek_summary(&path).expect("peek should succeed");
        assert_eq!(summary.version, CURRENT_SAVE_VERSION);
        assert_eq!(summary.relationship_count, 1);

        let loaded = RelationshipSave::load_json(&path).expect("load should succeed");
        assert_eq!(loaded.relationships.len(), 1);
    }

    #[test]
    fn test_load_json_rejects_newer_version() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("future.json");

        let save = RelationshipSave {
            version: CURRENT_SAVE_VERSION + 1,
            saved_at: "0".to_string(),
            saved_game_time: 0.0,
            relationships: Vec::new(),
        };
        save.save_json(&path).expect("save should succeed");

        match RelationshipSave::load_json(&path) {
            Err(PersistError::VersionMismatch { found, .. }) => {
                assert_eq!(found, CURRENT_SAVE_VERSION + 1);
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }
}
