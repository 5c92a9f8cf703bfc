//! Designer-defined relationship actions.
//!
//! An action (Talk, Gift, Insult, ...) carries probabilistic effects,
//! dimension costs, rule gates, a cooldown, and an optional use cap. The
//! engine re-validates every gate immediately before execution.

use crate::database::Database;
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A dimension change applied when the action succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEffect {
    /// Dimension to change.
    pub dimension: String,
    pub base_value: f32,
    /// Uniform variance as a fraction of `base_value` (0-1).
    #[serde(default)]
    pub random_variance: f32,
    /// Chance the effect applies at all (0-1, 1.0 = always).
    #[serde(default = "default_probability")]
    pub success_probability: f32,
}

fn default_probability() -> f32 {
    1.0
}

impl ActionEffect {
    pub fn roll_success<R: Rng>(&self, rng: &mut R) -> bool {
        rng.gen::<f32>() <= self.success_probability
    }

    /// Final value with variance applied: `base ± base * variance`.
    pub fn final_value<R: Rng>(&self, rng: &mut R) -> f32 {
        let mut value = self.base_value;
        let spread = (self.base_value * self.random_variance).abs();
        if spread > 0.0 {
            value += rng.gen_range(-spread..=spread);
        }
        value
    }
}

/// A requirement (and optional consumption) on a dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCost {
    pub dimension: String,
    /// Value the dimension must be at or above.
    #[serde(default)]
    pub minimum_value: f32,
    /// Amount consumed on execution (0 = pure requirement).
    #[serde(default)]
    pub consumed_value: f32,
}

/// Static definition of an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    /// Unique identifier (e.g. `"action.gift"`).
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub effects: Vec<ActionEffect>,
    #[serde(default)]
    pub costs: Vec<ActionCost>,
    /// Rules that must all pass for the action to be executable.
    #[serde(default)]
    pub required_rules: Vec<String>,
    /// Seconds between executions (0 = none).
    #[serde(default)]
    pub cooldown: f32,
    /// Lifetime use cap per relationship (0 = unlimited).
    #[serde(default)]
    pub max_uses: u32,
    /// Event tags broadcast when the action executes.
    #[serde(default)]
    pub triggered_events: Vec<String>,
}

impl ActionDef {
    /// Check costs and rule gates against a dimension snapshot.
    ///
    /// Cooldown and max-use checks live with the per-relationship
    /// [`ActionInstance`] and are applied by the engine.
    pub fn can_execute(&self, values: &HashMap<String, f32>, database: &Database) -> bool {
        for cost in &self.costs {
            match values.get(&cost.dimension) {
                Some(value) if *value >= cost.minimum_value => {}
                _ => return false,
            }
        }

        for rule_id in &self.required_rules {
            match database.find_rule(rule_id) {
                Some(rule) => {
                    if !rule.evaluate(values) {
                        return false;
                    }
                }
                None => {
                    warn!("action '{}': required rule not found: {rule_id}", self.id);
                    return false;
                }
            }
        }

        true
    }

    /// Dimensions referenced by effects and costs, deduplicated in order.
    pub fn referenced_dimensions(&self) -> Vec<String> {
        let mut dimensions = Vec::new();
        let mut push = |id: &str| {
            if !id.is_empty() && !dimensions.iter().any(|d| d == id) {
                dimensions.push(id.to_string());
            }
        };
        for effect in &self.effects {
            push(&effect.dimension);
        }
        for cost in &self.costs {
            push(&cost.dimension);
        }
        dimensions
    }

    pub fn validate(&self, errors: &mut Vec<String>) -> bool {
        let mut valid = true;

        if self.id.is_empty() {
            errors.push("action has an empty identifier".to_string());
            valid = false;
        }

        for effect in &self.effects {
            if effect.dimension.is_empty() {
                errors.push(format!("action '{}': effect has an empty dimension", self.id));
                valid = false;
            }
            if !(0.0..=1.0).contains(&effect.random_variance) {
                errors.push(format!(
                    "action '{}': random_variance must be between 0 and 1",
                    self.id
                ));
                valid = false;
            }
            if !(0.0..=1.0).contains(&effect.success_probability) {
                errors.push(format!(
                    "action '{}': success_probability must be between 0 and 1",
                    self.id
                ));
                valid = false;
            }
        }

        for cost in &self.costs {
            if cost.dimension.is_empty() {
                errors.push(format!("action '{}': cost has an empty dimension", self.id));
                valid = false;
            }
            if cost.consumed_value < 0.0 {
                errors.push(format!(
                    "action '{}': consumed_value cannot be negative",
                    self.id
                ));
                valid = false;
            }
        }

        if self.cooldown < 0.0 {
            errors.push(format!("action '{}': cooldown cannot be negative", self.id));
            valid = false;
        }

        valid
    }
}

/// Per-relationship usage tracking for one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionInstance {
    pub action_id: String,
    pub usage_count: u32,
    /// Game time in seconds of the last execution.
    pub last_execution_time: f64,
}

impl ActionInstance {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            usage_count: 0,
            last_execution_time: 0.0,
        }
    }

    pub fn is_on_cooldown(&self, now: f64, cooldown: f32) -> bool {
        if cooldown <= 0.0 {
            return false;
        }
        (now - self.last_execution_time) < cooldown as f64
    }

    pub fn is_max_uses_reached(&self, max_uses: u32) -> bool {
        max_uses > 0 && self.usage_count >= max_uses
    }

    pub fn record_execution(&mut self, now: f64) {
        self.usage_count += 1;
        self.last_execution_time = now;
    }
}
