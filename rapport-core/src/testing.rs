//! Testing utilities for the relationship engine.
//!
//! This module provides tools for integration testing:
//! - `MockHost` for scripting the world clock and actor registry
//! - `sample_database()` as a small but complete definition fixture
//! - `RecordingObserver` for capturing notifications
//! - Assertion helpers for verifying relationship state

use crate::action::{ActionCost, ActionDef, ActionEffect};
use crate::database::{Database, DatabaseSource};
use crate::dimension::{DecaySettings, DimensionDef};
use crate::engine::RelationshipEngine;
use crate::events::RelationshipObserver;
use crate::host::{ActorId, WorldHost};
use crate::profile::ProfileDef;
use crate::rule::{Comparison, Condition, RuleDef};
use crate::state::{StateDef, StateTransition};
use crate::traits::{TraitDef, TraitDimensionModifier, TraitEventResponse};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// ============================================================================
// MockHost
// ============================================================================

#[derive(Default)]
struct MockHostState {
    time_seconds: f64,
    actors: HashMap<ActorId, MockActor>,
}

struct MockActor {
    name: String,
    alive: bool,
}

/// A scriptable [`WorldHost`] with a manually advanced clock.
///
/// Clones share state, so tests can keep a handle while the engine owns a
/// boxed copy: `RelationshipEngine::new(db, Box::new(host.clone()))`.
#[derive(Clone, Default)]
pub struct MockHost {
    inner: Rc<RefCell<MockHostState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named, living actor and return its id.
    pub fn spawn_actor(&self, name: &str) -> ActorId {
        let id = ActorId::new();
        self.inner.borrow_mut().actors.insert(
            id,
            MockActor {
                name: name.to_string(),
                alive: true,
            },
        );
        id
    }

    /// Mark an actor dead; it stops resolving by name.
    pub fn destroy_actor(&self, actor: ActorId) {
        if let Some(entry) = self.inner.borrow_mut().actors.get_mut(&actor) {
            entry.alive = false;
        }
    }

    pub fn advance_time(&self, seconds: f64) {
        self.inner.borrow_mut().time_seconds += seconds;
    }

    pub fn set_time(&self, seconds: f64) {
        self.inner.borrow_mut().time_seconds = seconds;
    }

    pub fn time(&self) -> f64 {
        self.inner.borrow().time_seconds
    }
}

impl WorldHost for MockHost {
    fn game_time_seconds(&self) -> f64 {
        self.inner.borrow().time_seconds
    }

    fn is_actor_alive(&self, actor: ActorId) -> bool {
        self.inner
            .borrow()
            .actors
            .get(&actor)
            .map(|a| a.alive)
            .unwrap_or(false)
    }

    fn actor_name(&self, actor: ActorId) -> Option<String> {
        self.inner.borrow().actors.get(&actor).map(|a| a.name.clone())
    }

    fn find_actor_by_name(&self, name: &str) -> Option<ActorId> {
        self.inner
            .borrow()
            .actors
            .iter()
            .find(|(_, actor)| actor.alive && actor.name == name)
            .map(|(id, _)| *id)
    }
}

// ============================================================================
// RecordingObserver
// ============================================================================

/// A notification captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    DimensionChanged {
        subject: ActorId,
        target: ActorId,
        dimension: String,
        new_value: f32,
    },
    StateTransitioned {
        subject: ActorId,
        target: ActorId,
        old_state: Option<String>,
        new_state: String,
    },
    TraitAdded {
        subject: ActorId,
        target: ActorId,
        trait_id: String,
    },
    TraitRemoved {
        subject: ActorId,
        target: ActorId,
        trait_id: String,
    },
    ActionExecuted {
        subject: ActorId,
        target: ActorId,
        action_id: String,
    },
}

/// Observer that appends every notification to a shared log.
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<ObservedEvent>>>,
}

impl RecordingObserver {
    /// Returns the observer and the shared log the test should keep.
    pub fn new() -> (Self, Rc<RefCell<Vec<ObservedEvent>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: events.clone(),
            },
            events,
        )
    }
}

impl RelationshipObserver for RecordingObserver {
    fn on_dimension_changed(
        &mut self,
        subject: ActorId,
        target: ActorId,
        dimension: &str,
        new_value: f32,
    ) {
        self.events.borrow_mut().push(ObservedEvent::DimensionChanged {
            subject,
            target,
            dimension: dimension.to_string(),
            new_value,
        });
    }

    fn on_state_transitioned(
        &mut self,
        subject: ActorId,
        target: ActorId,
        old_state: Option<&str>,
        new_state: &str,
    ) {
        self.events.borrow_mut().push(ObservedEvent::StateTransitioned {
            subject,
            target,
            old_state: old_state.map(|s| s.to_string()),
            new_state: new_state.to_string(),
        });
    }

    fn on_trait_added(&mut self, subject: ActorId, target: ActorId, trait_id: &str) {
        self.events.borrow_mut().push(ObservedEvent::TraitAdded {
            subject,
            target,
            trait_id: trait_id.to_string(),
        });
    }

    fn on_trait_removed(&mut self, subject: ActorId, target: ActorId, trait_id: &str) {
        self.events.borrow_mut().push(ObservedEvent::TraitRemoved {
            subject,
            target,
            trait_id: trait_id.to_string(),
        });
    }

    fn on_action_executed(&mut self, subject: ActorId, target: ActorId, action_id: &str) {
        self.events.borrow_mut().push(ObservedEvent::ActionExecuted {
            subject,
            target,
            action_id: action_id.to_string(),
        });
    }
}

// ============================================================================
// Fixture database
// ============================================================================

fn dimension(id: &str, min: f32, max: f32, decay: Option<DecaySettings>) -> DimensionDef {
    DimensionDef {
        id: id.to_string(),
        display_name: String::new(),
        min_value: min,
        max_value: max,
        default_value: 0.0,
        decay,
    }
}

fn rule(id: &str, dimension: &str, comparison: Comparison, against: f32) -> RuleDef {
    RuleDef {
        id: id.to_string(),
        display_name: String::new(),
        conditions: vec![Condition {
            dimension: dimension.to_string(),
            comparison,
            compare_value: against,
            compare_dimension: None,
        }],
        formula: None,
    }
}

fn transition(target: &str, rules: &[&str], priority: i32) -> StateTransition {
    StateTransition {
        target_state: target.to_string(),
        required_rules: rules.iter().map(|r| r.to_string()).collect(),
        priority,
        hysteresis_delay: 0.0,
    }
}

/// A small but complete database: three dimensions, a stranger/friend/enemy
/// state machine, four traits, and four actions.
pub fn sample_database() -> Database {
    let dimensions = vec![
        dimension("dimension.trust", 0.0, 100.0, None),
        dimension(
            "dimension.affinity",
            -100.0,
            100.0,
            Some(DecaySettings {
                target: 0.0,
                rate_per_hour: 1.0,
                curve: None,
            }),
        ),
        dimension("dimension.fear", 0.0, 100.0, None),
    ];

    let rules = vec![
        rule("rule.trust_high", "dimension.trust", Comparison::GreaterOrEqual, 50.0),
        rule("rule.trust_low", "dimension.trust", Comparison::Less, 10.0),
        rule("rule.affinity_low", "dimension.affinity", Comparison::LessOrEqual, -50.0),
        rule("rule.affinity_recovered", "dimension.affinity", Comparison::Greater, -10.0),
    ];

    let states = vec![
        StateDef {
            id: "state.stranger".to_string(),
            display_name: "Stranger".to_string(),
            is_default: true,
            transitions: vec![
                transition("state.enemy", &["rule.affinity_low"], 20),
                transition("state.friend", &["rule.trust_high"], 10),
            ],
            available_actions: vec!["action.chat".to_string(), "action.favor".to_string()],
            auto_granted_traits: Vec::new(),
            dimension_modifiers: HashMap::new(),
        },
        StateDef {
            id: "state.friend".to_string(),
            display_name: "Friend".to_string(),
            is_default: false,
            transitions: vec![transition("state.stranger", &["rule.trust_low"], 0)],
            available_actions: vec![
                "action.chat".to_string(),
                "action.gift".to_string(),
                "action.favor".to_string(),
            ],
            auto_granted_traits: Vec::new(),
            dimension_modifiers: HashMap::from([("dimension.trust".to_string(), 0.1)]),
        },
        StateDef {
            id: "state.enemy".to_string(),
            display_name: "Enemy".to_string(),
            is_default: false,
            transitions: vec![transition("state.stranger", &["rule.affinity_recovered"], 0)],
            available_actions: vec!["action.insult".to_string()],
            auto_granted_traits: Vec::new(),
            dimension_modifiers: HashMap::new(),
        },
    ];

    let traits = vec![
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
                cooldown: 3600.0,
            }],
            conflicting_traits: Vec::new(),
            required_traits: Vec::new(),
        },
        TraitDef {
            id: "trait.suspicious".to_string(),
            display_name: "Suspicious".to_string(),
            stackable: false,
            max_stacks: 1,
            dimension_modifiers: vec![TraitDimensionModifier {
                dimension: "dimension.trust".to_string(),
                additive: 0.0,
                multiplicative: 0.5,
                action_filter: Vec::new(),
            }],
            event_responses: Vec::new(),
            conflicting_traits: vec!["trait.forgiving".to_string()],
            required_traits: Vec::new(),
        },
        TraitDef {
            id: "trait.grateful".to_string(),
            display_name: "Grateful".to_string(),
            stackable: false,
            max_stacks: 1,
            dimension_modifiers: Vec::new(),
            event_responses: Vec::new(),
            conflicting_traits: Vec::new(),
            required_traits: vec!["trait.forgiving".to_string()],
        },
        TraitDef {
            id: "trait.wary".to_string(),
            display_name: "Wary".to_string(),
            stackable: true,
            max_stacks: 3,
            dimension_modifiers: vec![TraitDimensionModifier {
                dimension: "dimension.trust".to_string(),
                additive: 0.0,
                multiplicative: 0.9,
                action_filter: Vec::new(),
            }],
            event_responses: Vec::new(),
            conflicting_traits: Vec::new(),
            required_traits: Vec::new(),
        },
    ];

    let actions = vec![
        ActionDef {
            id: "action.chat".to_string(),
            display_name: "Chat".to_string(),
            effects: vec![ActionEffect {
                dimension: "dimension.trust".to_string(),
                base_value: 5.0,
                random_variance: 0.0,
                success_probability: 1.0,
            }],
            costs: Vec::new(),
            required_rules: Vec::new(),
            cooldown: 0.0,
            max_uses: 0,
            triggered_events: Vec::new(),
        },
        ActionDef {
            id: "action.gift".to_string(),
            display_name: "Gift".to_string(),
            effects: vec![ActionEffect {
                dimension: "dimension.affinity".to_string(),
                base_value: 10.0,
                random_variance: 0.0,
                success_probability: 1.0,
            }],
            costs: Vec::new(),
            required_rules: Vec::new(),
            cooldown: 0.0,
            max_uses: 0,
            triggered_events: vec!["event.gift_received".to_string()],
        },
        ActionDef {
            id: "action.favor".to_string(),
            display_name: "Ask a Favor".to_string(),
            effects: vec![ActionEffect {
                dimension: "dimension.affinity".to_string(),
                base_value: 15.0,
                random_variance: 0.0,
                success_probability: 1.0,
            }],
            costs: vec![ActionCost {
                dimension: "dimension.trust".to_string(),
                minimum_value: 20.0,
                consumed_value: 10.0,
            }],
            required_rules: Vec::new(),
            cooldown: 120.0,
            max_uses: 3,
            triggered_events: Vec::new(),
        },
        ActionDef {
            id: "action.insult".to_string(),
            display_name: "Insult".to_string(),
            effects: vec![ActionEffect {
                dimension: "dimension.affinity".to_string(),
                base_value: -20.0,
                random_variance: 0.0,
                success_probability: 1.0,
            }],
            costs: Vec::new(),
            required_rules: Vec::new(),
            cooldown: 0.0,
            max_uses: 0,
            triggered_events: Vec::new(),
        },
    ];

    let profiles = vec![ProfileDef {
        id: "profile.villager".to_string(),
        display_name: "Villager".to_string(),
        initial_dimension_values: HashMap::new(),
        initial_state: Some("state.stranger".to_string()),
        initial_traits: Vec::new(),
        decay_rate_overrides: HashMap::new(),
        dimension_modifiers: HashMap::new(),
        can_be_subject: true,
        can_be_target: true,
    }];

    Database::build(DatabaseSource {
        dimensions,
        states,
        traits,
        rules,
        actions,
        profiles,
        default_profile: Some("profile.villager".to_string()),
    })
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert a dimension is at the expected value (within a small tolerance).
#[track_caller]
pub fn assert_dimension(
    engine: &RelationshipEngine,
    subject: ActorId,
    target: ActorId,
    dimension: &str,
    expected: f32,
) {
    let actual = engine.dimension_value(subject, target, dimension);
    assert!(
        (actual - expected).abs() < 1.0e-3,
        "expected {dimension} to be {expected}, got {actual}"
    );
}

/// Assert the relationship is in the expected state.
#[track_caller]
pub fn assert_state(
    engine: &RelationshipEngine,
    subject: ActorId,
    target: ActorId,
    expected: &str,
) {
    let actual = engine.current_state(subject, target);
    assert_eq!(
        actual.as_deref(),
        Some(expected),
        "expected state {expected}, got {actual:?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_database_validates() {
        let (valid, errors) = sample_database().validate();
        assert!(valid, "fixture database should validate: {errors:?}");
    }

    #[test]
    fn test_mock_host_lifecycle() {
        let host = MockHost::new();
        let actor = host.spawn_actor("Mira");

        assert!(host.is_actor_alive(actor));
        assert_eq!(host.actor_name(actor).as_deref(), Some("Mira"));
        assert_eq!(host.find_actor_by_name("Mira"), Some(actor));

        host.destroy_actor(actor);
        assert!(!host.is_actor_alive(actor));
        assert_eq!(host.find_actor_by_name("Mira"), None);
    }

    #[test]
    fn test_mock_host_clock() {
        let host = MockHost::new();
        host.set_time(100.0);
        host.advance_time(50.0);
        assert_eq!(host.game_time_seconds(), 150.0);
    }
}
