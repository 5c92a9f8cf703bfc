//! The definition database.
//!
//! Holds every designer-authored definition (dimensions, states, traits,
//! rules, actions, profiles) indexed by identifier for O(1) lookup. All
//! definitions are loaded eagerly at build time and immutable afterwards;
//! rebuilding the database is an offline/authoring-time operation, never
//! something done concurrently with live queries.

use crate::action::ActionDef;
use crate::dimension::DimensionDef;
use crate::profile::ProfileDef;
use crate::rule::RuleDef;
use crate::state::StateDef;
use crate::traits::TraitDef;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw definition lists as authored, before indexing.
///
/// This is the on-disk/config shape: load it from JSON (or build it in code)
/// and hand it to [`Database::build`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSource {
    #[serde(default)]
    pub dimensions: Vec<DimensionDef>,
    #[serde(default)]
    pub states: Vec<StateDef>,
    #[serde(default)]
    pub traits: Vec<TraitDef>,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub profiles: Vec<ProfileDef>,
    /// Profile used when callers do not specify one.
    #[serde(default)]
    pub default_profile: Option<String>,
}

impl DatabaseSource {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Indexed, immutable definition store.
#[derive(Debug, Clone, Default)]
pub struct Database {
    dimensions: HashMap<String, DimensionDef>,
    states: HashMap<String, StateDef>,
    traits: HashMap<String, TraitDef>,
    rules: HashMap<String, RuleDef>,
    actions: HashMap<String, ActionDef>,
    profiles: HashMap<String, ProfileDef>,
    default_profile: Option<String>,
}

fn build_index<T>(items: Vec<T>, kind: &str, id_of: impl Fn(&T) -> &str) -> HashMap<String, T> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        let id = id_of(&item).to_string();
        if id.is_empty() {
            warn!("skipping {kind} definition with an empty identifier");
            continue;
        }
        if map.insert(id.clone(), item).is_some() {
            warn!("duplicate {kind} identifier '{id}': last definition wins");
        }
    }
    map
}

impl Database {
    /// Index every definition by identifier.
    ///
    /// Duplicates are logged (last loaded wins) and definitions with empty
    /// identifiers are skipped with a warning; indexing itself never fails.
    /// Use [`Database::validate`] for configuration errors.
    pub fn build(source: DatabaseSource) -> Self {
        let database = Self {
            dimensions: build_index(source.dimensions, "dimension", |d| &d.id),
            states: build_index(source.states, "state", |s| &s.id),
            traits: build_index(source.traits, "trait", |t| &t.id),
            rules: build_index(source.rules, "rule", |r| &r.id),
            actions: build_index(source.actions, "action", |a| &a.id),
            profiles: build_index(source.profiles, "profile", |p| &p.id),
            default_profile: source.default_profile,
        };
        debug!(
            "database indexed: {} dimensions, {} states, {} traits, {} rules, {} actions, {} profiles",
            database.dimensions.len(),
            database.states.len(),
            database.traits.len(),
            database.rules.len(),
            database.actions.len(),
            database.profiles.len()
        );
        database
    }

    pub fn find_dimension(&self, id: &str) -> Option<&DimensionDef> {
        self.dimensions.get(id)
    }

    pub fn find_state(&self, id: &str) -> Option<&StateDef> {
        self.states.get(id)
    }

    pub fn find_trait(&self, id: &str) -> Option<&TraitDef> {
        self.traits.get(id)
    }

    pub fn find_rule(&self, id: &str) -> Option<&RuleDef> {
        self.rules.get(id)
    }

    pub fn find_action(&self, id: &str) -> Option<&ActionDef> {
        self.actions.get(id)
    }

    pub fn find_profile(&self, id: &str) -> Option<&ProfileDef> {
        self.profiles.get(id)
    }

    /// The configured default profile, if it resolves.
    pub fn default_profile(&self) -> Option<&ProfileDef> {
        self.default_profile
            .as_deref()
            .and_then(|id| self.profiles.get(id))
    }

    /// The state flagged `is_default`, smallest id winning on (misconfigured)
    /// ties so the choice stays deterministic.
    pub fn default_state(&self) -> Option<&StateDef> {
        self.states
            .values()
            .filter(|s| s.is_default)
            .min_by(|a, b| a.id.cmp(&b.id))
    }

    pub fn all_dimensions(&self) -> impl Iterator<Item = &DimensionDef> {
        self.dimensions.values()
    }

    pub fn all_states(&self) -> impl Iterator<Item = &StateDef> {
        self.states.values()
    }

    /// Run every definition's validator and the database-level checks,
    /// aggregating all messages without short-circuiting.
    pub fn validate(&self) -> (bool, Vec<String>) {
        let mut errors = Vec::new();
        let mut valid = true;

        for dimension in self.dimensions.values() {
            valid &= dimension.validate(&mut errors);
        }
        for state in self.states.values() {
            valid &= state.validate(&mut errors);
        }
        for trait_def in self.traits.values() {
            valid &= trait_def.validate(&mut errors);
        }
        for rule in self.rules.values() {
            valid &= rule.validate(&mut errors);
        }
        for action in self.actions.values() {
            valid &= action.validate(&mut errors);
        }
        for profile in self.profiles.values() {
            valid &= profile.validate(&mut errors);
        }

        match &self.default_profile {
            Some(id) if self.profiles.contains_key(id) => {}
            Some(id) => {
                errors.push(format!("default profile '{id}' is not in the database"));
                valid = false;
            }
            None => {
                errors.push("no default profile configured".to_string());
                valid = false;
            }
        }

        (valid, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimension(id: &str, default_value: f32) -> DimensionDef {
        DimensionDef {
            id: id.to_string(),
            display_name: String::new(),
            min_value: -100.0,
            max_value: 100.0,
            default_value,
            decay: None,
        }
    }

    fn profile(id: &str) -> ProfileDef {
        ProfileDef {
            id: id.to_string(),
            display_name: String::new(),
            initial_dimension_values: HashMap::new(),
            initial_state: None,
            initial_traits: Vec::new(),
            decay_rate_overrides: HashMap::new(),
            dimension_modifiers: HashMap::new(),
            can_be_subject: true,
            can_be_target: true,
        }
    }

    #[test]
    fn test_duplicate_identifier_last_wins() {
        let db = Database::build(DatabaseSource {
            dimensions: vec![dimension("dimension.trust", 1.0), dimension("dimension.trust", 2.0)],
            ..Default::default()
        });
        let found = db.find_dimension("dimension.trust").unwrap();
        assert_eq!(found.default_value, 2.0);
    }

    #[test]
    fn test_empty_identifier_skipped() {
        let db = Database::build(DatabaseSource {
            dimensions: vec![dimension("", 1.0), dimension("dimension.trust", 0.0)],
            ..Default::default()
        });
        assert_eq!(db.all_dimensions().count(), 1);
    }

    #[test]
    fn test_lookups_return_none_for_unknown() {
        let db = Database::build(DatabaseSource::default());
        assert!(db.find_dimension("dimension.trust").is_none());
        assert!(db.find_state("state.friend").is_none());
        assert!(db.find_trait("trait.loyal").is_none());
        assert!(db.find_rule("rule.any").is_none());
        assert!(db.find_action("action.talk").is_none());
        assert!(db.find_profile("profile.villager").is_none());
    }

    #[test]
    fn test_default_state_picks_flagged() {
        let stranger = StateDef {
            id: "state.stranger".to_string(),
            display_name: String::new(),
            is_default: true,
            transitions: Vec::new(),
            available_actions: Vec::new(),
            auto_granted_traits: Vec::new(),
            dimension_modifiers: HashMap::new(),
        };
        let friend = StateDef {
            id: "state.friend".to_string(),
            is_default: false,
            ..stranger.clone()
        };

        let db = Database::build(DatabaseSource {
            states: vec![friend, stranger],
            ..Default::default()
        });
        assert_eq!(db.default_state().unwrap().id, "state.stranger");
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut bad_dimension = dimension("dimension.bad", 0.0);
        bad_dimension.min_value = 10.0;
        bad_dimension.max_value = -10.0;

        let db = Database::build(DatabaseSource {
            dimensions: vec![bad_dimension],
            default_profile: Some("profile.missing".to_string()),
            ..Default::default()
        });

        let (valid, errors) = db.validate();
        assert!(!valid);
        // Both the dimension error and the default-profile error surface.
        assert!(errors.len() >= 2);
    }

    #[test]
    fn test_validate_passes_with_default_profile() {
        let db = Database::build(DatabaseSource {
            dimensions: vec![dimension("dimension.trust", 0.0)],
            profiles: vec![profile("profile.villager")],
            default_profile: Some("profile.villager".to_string()),
            ..Default::default()
        });
        let (valid, errors) = db.validate();
        assert!(valid, "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_source_loads_from_json() {
        let json = r#"{
            "dimensions": [
                {"id": "dimension.trust", "min_value": 0.0, "max_value": 100.0}
            ],
            "default_profile": "profile.villager"
        }"#;
        let source = DatabaseSource::from_json_str(json).unwrap();
        let db = Database::build(source);
        assert!(db.find_dimension("dimension.trust").is_some());
    }
}
