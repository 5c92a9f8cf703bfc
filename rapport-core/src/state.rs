//! Relationship states and transitions.
//!
//! A state is a discrete relationship stage (Stranger, Friend, Enemy, ...)
//! owning its outbound transitions. Transitions are gated by rules, ordered
//! by priority, and may require a hysteresis dwell time before firing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A transition from one state to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// State to transition into.
    pub target_state: String,
    /// Rules that must all pass (AND logic).
    #[serde(default)]
    pub required_rules: Vec<String>,
    /// Higher priority transitions are evaluated first.
    #[serde(default)]
    pub priority: i32,
    /// Seconds the rules must hold continuously before the transition fires.
    #[serde(default)]
    pub hysteresis_delay: f32,
}

/// Static definition of a relationship state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDef {
    /// Unique identifier (e.g. `"state.friend"`).
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Initial state when no profile specifies one.
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
    /// Actions offered while in this state.
    #[serde(default)]
    pub available_actions: Vec<String>,
    /// Traits associated with this state, exposed for host queries.
    #[serde(default)]
    pub auto_granted_traits: Vec<String>,
    /// Multiplicative dimension modifiers while in this state
    /// (e.g. `0.1` = +10% to every change of that dimension).
    #[serde(default)]
    pub dimension_modifiers: HashMap<String, f32>,
}

impl StateDef {
    /// Transitions in descending priority order; ties keep authored order.
    pub fn sorted_transitions(&self) -> Vec<&StateTransition> {
        let mut sorted: Vec<&StateTransition> = self.transitions.iter().collect();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
        sorted
    }

    pub fn is_action_available(&self, action_id: &str) -> bool {
        self.available_actions.iter().any(|a| a == action_id)
    }

    /// Modifier for a dimension, `0.0` when none is configured.
    pub fn dimension_modifier(&self, dimension_id: &str) -> f32 {
        self.dimension_modifiers
            .get(dimension_id)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn validate(&self, errors: &mut Vec<String>) -> bool {
        let mut valid = true;

        if self.id.is_empty() {
            errors.push("state has an empty identifier".to_string());
            valid = false;
        }

        for transition in &self.transitions {
            if transition.target_state.is_empty() {
                errors.push(format!(
                    "state '{}': transition has an empty target state",
                    self.id
                ));
                valid = false;
                continue;
            }

            // Self-transitions are allowed but worth flagging.
            if transition.target_state == self.id {
                errors.push(format!("state '{}': self-transition detected", self.id));
            }

            if transition.hysteresis_delay < 0.0 {
                errors.push(format!(
                    "state '{}': hysteresis delay cannot be negative",
                    self.id
                ));
                valid = false;
            }
        }

        for dimension in self.dimension_modifiers.keys() {
            if dimension.is_empty() {
                errors.push(format!(
                    "state '{}': dimension modifier has an empty dimension",
                    self.id
                ));
                valid = false;
            }
        }

        valid
    }
}

/// Live state of one relationship, with hysteresis bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateInstance {
    /// Current state id, `None` until a state has been entered.
    #[serde(default)]
    pub current_state: Option<String>,
    /// Game time in seconds when the current state was entered.
    #[serde(default)]
    pub state_entry_time: f64,
    /// Pending transition target -> seconds of qualifying dwell accumulated.
    #[serde(default)]
    pub pending_transitions: HashMap<String, f32>,
    /// Game time of the last transition evaluation (hysteresis time base).
    #[serde(default)]
    pub last_evaluation_time: f64,
}

impl StateInstance {
    /// Enter a state: resets entry time and clears all pending timers.
    pub fn set_state(&mut self, new_state: impl Into<String>, now: f64) {
        self.current_state = Some(new_state.into());
        self.state_entry_time = now;
        self.pending_transitions.clear();
        self.last_evaluation_time = now;
    }

    /// Begin tracking a qualifying transition, or add elapsed time to it.
    ///
    /// The timer starts at zero on the first qualifying evaluation; dwell
    /// time before the rules held is never credited.
    pub fn accumulate_pending(&mut self, target_state: &str, delta_seconds: f32) {
        match self.pending_transitions.get_mut(target_state) {
            Some(elapsed) => *elapsed += delta_seconds,
            None => {
                self.pending_transitions.insert(target_state.to_string(), 0.0);
            }
        }
    }

    pub fn clear_pending_transition(&mut self, target_state: &str) {
        self.pending_transitions.remove(target_state);
    }

    /// Whether the accumulated dwell satisfies the hysteresis delay.
    pub fn is_transition_ready(&self, target_state: &str, hysteresis_delay: f32) -> bool {
        match self.pending_transitions.get(target_state) {
            Some(elapsed) => *elapsed >= hysteresis_delay,
            None => hysteresis_delay <= 0.0,
        }
    }

    pub fn time_in_state(&self, now: f64) -> f64 {
        (now - self.state_entry_time).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_transitions() -> StateDef {
        StateDef {
            id: "state.stranger".to_string(),
            display_name: String::new(),
            is_default: true,
            transitions: vec![
                StateTransition {
                    target_state: "state.friend".to_string(),
                    required_rules: vec!["rule.trust_high".to_string()],
                    priority: 1,
                    hysteresis_delay: 0.0,
                },
                StateTransition {
                    target_state: "state.enemy".to_string(),
                    required_rules: vec!["rule.affinity_low".to_string()],
                    priority: 5,
                    hysteresis_delay: 0.0,
                },
            ],
            available_actions: vec!["action.chat".to_string()],
            auto_granted_traits: Vec::new(),
            dimension_modifiers: HashMap::from([("dimension.trust".to_string(), 0.25)]),
        }
    }

    #[test]
    fn test_sorted_transitions_descending_priority() {
        let state = state_with_transitions();
        let sorted = state.sorted_transitions();
        assert_eq!(sorted[0].target_state, "state.enemy");
        assert_eq!(sorted[1].target_state, "state.friend");
    }

    #[test]
    fn test_sorted_transitions_ties_keep_authored_order() {
        let mut state = state_with_transitions();
        for t in &mut state.transitions {
            t.priority = 0;
        }
        let sorted = state.sorted_transitions();
        assert_eq!(sorted[0].target_state, "state.friend");
        assert_eq!(sorted[1].target_state, "state.enemy");
    }

    #[test]
    fn test_dimension_modifier_lookup() {
        let state = state_with_transitions();
        assert_eq!(state.dimension_modifier("dimension.trust"), 0.25);
        assert_eq!(state.dimension_modifier("dimension.other"), 0.0);
    }

    #[test]
    fn test_action_availability() {
        let state = state_with_transitions();
        assert!(state.is_action_available("action.chat"));
        assert!(!state.is_action_available("action.gift"));
    }

    #[test]
    fn test_self_transition_is_warning_not_error() {
        let mut state = state_with_transitions();
        state.transitions.push(StateTransition {
            target_state: "state.stranger".to_string(),
            required_rules: Vec::new(),
            priority: 0,
            hysteresis_delay: 0.0,
        });
        let mut errors = Vec::new();
        assert!(state.validate(&mut errors));
        assert!(errors.iter().any(|e| e.contains("self-transition")));
    }

    #[test]
    fn test_negative_hysteresis_fails_validation() {
        let mut state = state_with_transitions();
        state.transitions[0].hysteresis_delay = -1.0;
        let mut errors = Vec::new();
        assert!(!state.validate(&mut errors));
    }

    #[test]
    fn test_set_state_clears_pending() {
        let mut instance = StateInstance::default();
        instance.set_state("state.stranger", 10.0);
        instance.accumulate_pending("state.friend", 0.0);
        instance.accumulate_pending("state.friend", 3.0);
        assert!(!instance.pending_transitions.is_empty());

        instance.set_state("state.friend", 20.0);
        assert!(instance.pending_transitions.is_empty());
        assert_eq!(instance.state_entry_time, 20.0);
        assert_eq!(instance.time_in_state(35.0), 15.0);
    }

    #[test]
    fn test_hysteresis_accumulation_starts_at_zero() {
        let mut instance = StateInstance::default();
        instance.set_state("state.stranger", 0.0);

        // First qualifying evaluation only begins tracking.
        instance.accumulate_pending("state.friend", 100.0);
        assert!(!instance.is_transition_ready("state.friend", 5.0));

        instance.accumulate_pending("state.friend", 3.0);
        assert!(!instance.is_transition_ready("state.friend", 5.0));

        instance.accumulate_pending("state.friend", 2.0);
        assert!(instance.is_transition_ready("state.friend", 5.0));
    }

    #[test]
    fn test_clear_pending_resets_dwell() {
        let mut instance = StateInstance::default();
        instance.set_state("state.stranger", 0.0);
        instance.accumulate_pending("state.friend", 0.0);
        instance.accumulate_pending("state.friend", 4.0);
        instance.clear_pending_transition("state.friend");
        instance.accumulate_pending("state.friend", 4.0);
        assert!(!instance.is_transition_ready("state.friend", 5.0));
    }
}
