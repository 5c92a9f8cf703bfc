//! Actor archetype profiles.
//!
//! A profile is the template a relationship is seeded from: initial dimension
//! overrides, initial state and traits, decay-rate overrides, and flags for
//! whether an actor with this profile may initiate or receive relationships.

use crate::database::Database;
use crate::dimension::DimensionValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// Static definition of an actor archetype profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDef {
    /// Unique identifier (e.g. `"profile.villager"`).
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Initial values overriding dimension defaults.
    #[serde(default)]
    pub initial_dimension_values: HashMap<String, f32>,
    /// Starting state (falls back to the database default state).
    #[serde(default)]
    pub initial_state: Option<String>,
    /// Traits granted at creation (no conflict/requirement checks apply).
    #[serde(default)]
    pub initial_traits: Vec<String>,
    /// Per-dimension decay rate overrides (per hour).
    #[serde(default)]
    pub decay_rate_overrides: HashMap<String, f32>,
    /// Global per-dimension modifiers, exposed for host queries.
    #[serde(default)]
    pub dimension_modifiers: HashMap<String, f32>,
    /// May an actor with this profile initiate relationships?
    #[serde(default = "default_true")]
    pub can_be_subject: bool,
    /// May an actor with this profile receive relationships?
    #[serde(default = "default_true")]
    pub can_be_target: bool,
}

impl ProfileDef {
    /// Initial value for a dimension: profile override, else dimension
    /// default, else 0.
    pub fn initial_dimension_value(&self, dimension_id: &str, database: &Database) -> f32 {
        if let Some(value) = self.initial_dimension_values.get(dimension_id) {
            return *value;
        }
        database
            .find_dimension(dimension_id)
            .map(|d| d.default_value)
            .unwrap_or(0.0)
    }

    /// Effective decay rate for a dimension: override, else dimension rate.
    pub fn decay_rate(&self, dimension_id: &str, database: &Database) -> f32 {
        if let Some(rate) = self.decay_rate_overrides.get(dimension_id) {
            return *rate;
        }
        database
            .find_dimension(dimension_id)
            .and_then(|d| d.decay.as_ref())
            .map(|d| d.rate_per_hour)
            .unwrap_or(0.0)
    }

    pub fn has_initial_trait(&self, trait_id: &str) -> bool {
        self.initial_traits.iter().any(|t| t == trait_id)
    }

    /// Seed every database dimension (clamped), plus any profile-only keys.
    ///
    /// Profile-only keys have no definition and therefore no bounds to clamp
    /// against; they are seeded as authored.
    pub fn create_initial_dimensions(
        &self,
        database: &Database,
        now: f64,
    ) -> HashMap<String, DimensionValue> {
        let mut dimensions = HashMap::new();

        for def in database.all_dimensions() {
            let initial = self
                .initial_dimension_values
                .get(&def.id)
                .copied()
                .unwrap_or(def.default_value);
            dimensions.insert(def.id.clone(), DimensionValue::new(def.clamp_value(initial), now));
        }

        for (id, value) in &self.initial_dimension_values {
            dimensions
                .entry(id.clone())
                .or_insert_with(|| DimensionValue::new(*value, now));
        }

        dimensions
    }

    pub fn validate(&self, errors: &mut Vec<String>) -> bool {
        let mut valid = true;

        if self.id.is_empty() {
            errors.push("profile has an empty identifier".to_string());
            valid = false;
        }

        for dimension in self.initial_dimension_values.keys() {
            if dimension.is_empty() {
                errors.push(format!(
                    "profile '{}': initial value has an empty dimension",
                    self.id
                ));
                valid = false;
            }
        }

        for (dimension, rate) in &self.decay_rate_overrides {
            if dimension.is_empty() {
                errors.push(format!(
                    "profile '{}': decay override has an empty dimension",
                    self.id
                ));
                valid = false;
            }
            if *rate < 0.0 {
                errors.push(format!(
                    "profile '{}': decay rate override cannot be negative",
                    self.id
                ));
                valid = false;
            }
        }

        if !self.can_be_subject && !self.can_be_target {
            errors.push(format!(
                "profile '{}': must allow the actor to be subject or target",
                self.id
            ));
            valid = false;
        }

        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseSource;
    use crate::dimension::{DecaySettings, DimensionDef};

    fn database() -> Database {
        Database::build(DatabaseSource {
            dimensions: vec![
                DimensionDef {
                    id: "dimension.trust".to_string(),
                    display_name: String::new(),
                    min_value: 0.0,
                    max_value: 100.0,
                    default_value: 10.0,
                    decay: Some(DecaySettings {
                        target: 0.0,
                        rate_per_hour: 2.0,
                        curve: None,
                    }),
                },
                DimensionDef {
                    id: "dimension.fear".to_string(),
                    display_name: String::new(),
                    min_value: 0.0,
                    max_value: 100.0,
                    default_value: 0.0,
                    decay: None,
                },
            ],
            ..Default::default()
        })
    }

    fn profile() -> ProfileDef {
        ProfileDef {
            id: "profile.villager".to_string(),
            display_name: String::new(),
            initial_dimension_values: HashMap::from([
                ("dimension.trust".to_string(), 250.0),
                ("dimension.custom".to_string(), 7.0),
            ]),
            initial_state: Some("state.stranger".to_string()),
            initial_traits: vec!["trait.friendly".to_string()],
            decay_rate_overrides: HashMap::from([("dimension.trust".to_string(), 5.0)]),
            dimension_modifiers: HashMap::new(),
            can_be_subject: true,
            can_be_target: true,
        }
    }

    #[test]
    fn test_initial_value_prefers_override() {
        let db = database();
        let p = profile();
        assert_eq!(p.initial_dimension_value("dimension.trust", &db), 250.0);
        assert_eq!(p.initial_dimension_value("dimension.fear", &db), 0.0);
        assert_eq!(p.initial_dimension_value("dimension.unknown", &db), 0.0);
    }

    #[test]
    fn test_decay_rate_override() {
        let db = database();
        let p = profile();
        assert_eq!(p.decay_rate("dimension.trust", &db), 5.0);
        assert_eq!(p.decay_rate("dimension.fear", &db), 0.0);
    }

    #[test]
    fn test_create_initial_dimensions_clamps_known_keys() {
        let db = database();
        let p = profile();
        let dims = p.create_initial_dimensions(&db, 12.0);

        // Override of 250 clamps to the dimension's max of 100.
        assert_eq!(dims["dimension.trust"].value, 100.0);
        assert_eq!(dims["dimension.fear"].value, 0.0);
        // Profile-only key has no definition, seeded as authored.
        assert_eq!(dims["dimension.custom"].value, 7.0);
        assert_eq!(dims["dimension.trust"].last_modified_time, 12.0);
    }

    #[test]
    fn test_validate_rejects_unusable_profile() {
        let mut p = profile();
        p.can_be_subject = false;
        p.can_be_target = false;
        let mut errors = Vec::new();
        assert!(!p.validate(&mut errors));
    }
}
