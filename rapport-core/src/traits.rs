//! Behavioral traits attached to relationships.
//!
//! Traits alter how dimension changes are applied (Forgiving halves negative
//! swings, Suspicious slows trust gain) and can react to event tags with
//! probabilistic dimension changes on a per-instance cooldown.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A dimension modifier contributed by a trait.
///
/// Applied as `(value * multiplicative) + additive`, once per stack level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitDimensionModifier {
    /// Dimension whose changes are modified.
    pub dimension: String,
    #[serde(default)]
    pub additive: f32,
    #[serde(default = "default_multiplier")]
    pub multiplicative: f32,
    /// Restrict to specific actions (empty = applies to every change).
    #[serde(default)]
    pub action_filter: Vec<String>,
}

fn default_multiplier() -> f32 {
    1.0
}

impl TraitDimensionModifier {
    /// Whether this modifier applies to a change caused by `action`.
    ///
    /// Changes with no action context only match unfiltered modifiers.
    pub fn applies_to_action(&self, action: Option<&str>) -> bool {
        if self.action_filter.is_empty() {
            return true;
        }
        match action {
            Some(id) => self.action_filter.iter().any(|a| a == id),
            None => false,
        }
    }

    pub fn apply(&self, value: f32) -> f32 {
        (value * self.multiplicative) + self.additive
    }
}

/// Reactive behavior: when an event tag fires on the relationship, roll the
/// probability and apply the dimension deltas, then start the cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitEventResponse {
    /// Event tag this response reacts to.
    pub event: String,
    #[serde(default)]
    pub dimension_changes: HashMap<String, f32>,
    /// Chance the response fires (0-1, 1.0 = always).
    #[serde(default = "default_probability")]
    pub probability: f32,
    /// Seconds before this trait instance can respond to the event again.
    #[serde(default)]
    pub cooldown: f32,
}

fn default_probability() -> f32 {
    1.0
}

/// Static definition of a trait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitDef {
    /// Unique identifier (e.g. `"trait.forgiving"`).
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Whether multiple stacks of this trait can accumulate.
    #[serde(default)]
    pub stackable: bool,
    /// Stack cap, relevant only when `stackable`.
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    #[serde(default)]
    pub dimension_modifiers: Vec<TraitDimensionModifier>,
    #[serde(default)]
    pub event_responses: Vec<TraitEventResponse>,
    /// Traits that cannot coexist with this one.
    #[serde(default)]
    pub conflicting_traits: Vec<String>,
    /// Traits that must already be present for this one to be added.
    #[serde(default)]
    pub required_traits: Vec<String>,
}

fn default_max_stacks() -> u32 {
    1
}

impl TraitDef {
    /// First event response matching the tag, if any.
    pub fn event_response(&self, event: &str) -> Option<&TraitEventResponse> {
        self.event_responses.iter().find(|r| r.event == event)
    }

    pub fn conflicts_with(&self, other_trait_id: &str) -> bool {
        self.conflicting_traits.iter().any(|t| t == other_trait_id)
    }

    /// Run every matching modifier over `base_value`, once per stack level.
    pub fn apply_modifiers(
        &self,
        dimension: &str,
        action: Option<&str>,
        base_value: f32,
        stack_count: u32,
    ) -> f32 {
        let mut value = base_value;
        for modifier in &self.dimension_modifiers {
            if modifier.dimension == dimension && modifier.applies_to_action(action) {
                for _ in 0..stack_count {
                    value = modifier.apply(value);
                }
            }
        }
        value
    }

    pub fn validate(&self, errors: &mut Vec<String>) -> bool {
        let mut valid = true;

        if self.id.is_empty() {
            errors.push("trait has an empty identifier".to_string());
            valid = false;
        }

        if self.stackable && self.max_stacks < 1 {
            errors.push(format!(
                "trait '{}': max_stacks must be at least 1 when stackable",
                self.id
            ));
            valid = false;
        }

        for modifier in &self.dimension_modifiers {
            if modifier.dimension.is_empty() {
                errors.push(format!(
                    "trait '{}': dimension modifier has an empty dimension",
                    self.id
                ));
                valid = false;
            }
            if modifier.multiplicative < 0.0 {
                errors.push(format!(
                    "trait '{}': multiplicative modifier cannot be negative",
                    self.id
                ));
                valid = false;
            }
        }

        for response in &self.event_responses {
            if response.event.is_empty() {
                errors.push(format!("trait '{}': event response has an empty event", self.id));
                valid = false;
            }
            if !(0.0..=1.0).contains(&response.probability) {
                errors.push(format!(
                    "trait '{}': response probability must be between 0 and 1",
                    self.id
                ));
                valid = false;
            }
            if response.cooldown < 0.0 {
                errors.push(format!(
                    "trait '{}': response cooldown cannot be negative",
                    self.id
                ));
                valid = false;
            }
        }

        if self.conflicting_traits.iter().any(|t| t == &self.id) {
            errors.push(format!("trait '{}': cannot conflict with itself", self.id));
            valid = false;
        }
        if self.required_traits.iter().any(|t| t == &self.id) {
            errors.push(format!("trait '{}': cannot require itself", self.id));
            valid = false;
        }

        valid
    }
}

/// Live trait instance on one relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitInstance {
    pub trait_id: String,
    pub stack_count: u32,
    /// Game time in seconds when the trait was acquired.
    pub acquired_time: f64,
    /// Event tag -> game time when the cooldown expires.
    #[serde(default)]
    pub event_cooldowns: HashMap<String, f64>,
}

impl TraitInstance {
    pub fn new(trait_id: impl Into<String>, now: f64) -> Self {
        Self {
            trait_id: trait_id.into(),
            stack_count: 1,
            acquired_time: now,
            event_cooldowns: HashMap::new(),
        }
    }

    /// Increment the stack, saturating at the definition's cap.
    pub fn add_stack(&mut self, definition: &TraitDef) {
        if definition.stackable && self.stack_count < definition.max_stacks {
            self.stack_count += 1;
        }
    }

    pub fn is_event_on_cooldown(&self, event: &str, now: f64) -> bool {
        match self.event_cooldowns.get(event) {
            Some(available_at) => now < *available_at,
            None => false,
        }
    }

    pub fn set_event_cooldown(&mut self, event: &str, cooldown: f32, now: f64) {
        self.event_cooldowns
            .insert(event.to_string(), now + cooldown as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forgiving() -> TraitDef {
        TraitDef {
            id: "trait.forgiving".to_string(),
            display_name: "Forgiving".to_string(),
            stackable: false,
            max_stacks: 1,
            dimension_modifiers: vec![TraitDimensionModifier {
                dimension: "dimension.affinity".to_string(),
                additive: 0.0,
                multiplicative: 0.5,
                action_filter: Vec::new(),
            }],
            event_responses: vec![TraitEventResponse {
                event: "event.gift_received".to_string(),
                dimension_changes: HashMap::from([("dimension.affinity".to_string(), 5.0)]),
                probability: 1.0,
                cooldown: 60.0,
            }],
            conflicting_traits: vec!["trait.vengeful".to_string()],
            required_traits: Vec::new(),
        }
    }

    #[test]
    fn test_modifier_halves_changes() {
        let def = forgiving();
        assert_eq!(
            def.apply_modifiers("dimension.affinity", None, -20.0, 1),
            -10.0
        );
        assert_eq!(def.apply_modifiers("dimension.trust", None, -20.0, 1), -20.0);
    }

    #[test]
    fn test_modifier_applies_once_per_stack() {
        let mut def = forgiving();
        def.stackable = true;
        def.max_stacks = 3;
        assert_eq!(
            def.apply_modifiers("dimension.affinity", None, -40.0, 2),
            -10.0
        );
    }

    #[test]
    fn test_action_filter() {
        let mut def = forgiving();
        def.dimension_modifiers[0].action_filter = vec!["action.insult".to_string()];

        assert_eq!(
            def.apply_modifiers("dimension.affinity", Some("action.insult"), -20.0, 1),
            -10.0
        );
        // Other actions and action-less changes pass through untouched.
        assert_eq!(
            def.apply_modifiers("dimension.affinity", Some("action.chat"), -20.0, 1),
            -20.0
        );
        assert_eq!(def.apply_modifiers("dimension.affinity", None, -20.0, 1), -20.0);
    }

    #[test]
    fn test_stack_saturates_at_cap() {
        let mut def = forgiving();
        def.stackable = true;
        def.max_stacks = 3;

        let mut instance = TraitInstance::new(&def.id, 0.0);
        for _ in 0..5 {
            instance.add_stack(&def);
        }
        assert_eq!(instance.stack_count, 3);
    }

    #[test]
    fn test_non_stackable_never_grows() {
        let def = forgiving();
        let mut instance = TraitInstance::new(&def.id, 0.0);
        instance.add_stack(&def);
        assert_eq!(instance.stack_count, 1);
    }

    #[test]
    fn test_event_cooldown() {
        let mut instance = TraitInstance::new("trait.forgiving", 0.0);
        assert!(!instance.is_event_on_cooldown("event.gift_received", 0.0));

        instance.set_event_cooldown("event.gift_received", 60.0, 100.0);
        assert!(instance.is_event_on_cooldown("event.gift_received", 120.0));
        assert!(!instance.is_event_on_cooldown("event.gift_received", 160.0));
    }

    #[test]
    fn test_event_response_lookup() {
        let def = forgiving();
        assert!(def.event_response("event.gift_received").is_some());
        assert!(def.event_response("event.insulted").is_none());
    }

    #[test]
    fn test_validate_self_conflict() {
        let mut def = forgiving();
        def.conflicting_traits.push(def.id.clone());
        let mut errors = Vec::new();
        assert!(!def.validate(&mut errors));
    }

    #[test]
    fn test_validate_bad_probability() {
        let mut def = forgiving();
        def.event_responses[0].probability = 1.5;
        let mut errors = Vec::new();
        assert!(!def.validate(&mut errors));
    }
}
