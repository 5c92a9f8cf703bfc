//! The relationship engine.
//!
//! Owns the live table of per-(subject, target) relationships and runs every
//! mutation through the definition database: dimension changes are filtered
//! through trait and state modifiers, state transitions are re-evaluated
//! after each change, actions apply costs and probabilistic effects, and a
//! periodic decay pass ages dimensions toward their configured targets.
//!
//! All operations are synchronous calls from one logical thread. Mutators
//! return `bool` and log on failure rather than panicking; state is left
//! untouched when a precondition fails.

use crate::action::ActionInstance;
use crate::database::Database;
use crate::dimension::DimensionValue;
use crate::events::{
    ObserverHandle, ObserverRegistry, RelationshipObserver, EVENT_ACTION_EXECUTED,
    EVENT_DIMENSION_CHANGED, EVENT_STATE_TRANSITIONED, EVENT_TRAIT_ADDED, EVENT_TRAIT_REMOVED,
};
use crate::host::{ActorId, GameEventBus, WorldHost};
use crate::nearly_equal;
use crate::state::StateInstance;
use crate::traits::{TraitEventResponse, TraitInstance};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Live relationship record for one ordered (subject, target) pair.
///
/// Relationships are asymmetric: A→B is independent of B→A. The record holds
/// no ownership over its endpoints; once either actor stops being alive the
/// record is invalid and is reaped during decay processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub subject: ActorId,
    pub target: ActorId,
    pub dimensions: HashMap<String, DimensionValue>,
    pub state: StateInstance,
    pub traits: Vec<TraitInstance>,
    pub actions: HashMap<String, ActionInstance>,
    /// Profile id the relationship was created with, if any.
    pub profile: Option<String>,
    /// Game time of the last decay pass over this record.
    pub last_update_time: f64,
}

impl Relationship {
    /// Current value of a dimension, `0.0` when absent.
    pub fn dimension_value(&self, dimension_id: &str) -> f32 {
        self.dimensions
            .get(dimension_id)
            .map(|v| v.value)
            .unwrap_or(0.0)
    }

    pub fn find_trait(&self, trait_id: &str) -> Option<&TraitInstance> {
        self.traits.iter().find(|t| t.trait_id == trait_id)
    }

    pub fn has_trait(&self, trait_id: &str) -> bool {
        self.find_trait(trait_id).is_some()
    }

    fn dimension_snapshot(&self) -> HashMap<String, f32> {
        self.dimensions
            .iter()
            .map(|(id, value)| (id.clone(), value.value))
            .collect()
    }
}

/// The relationship rules engine.
///
/// Constructed by the host with an already-built [`Database`] and a
/// [`WorldHost`]; there is no ambient global instance. The engine owns the
/// live relationship table exclusively; queries copy data out.
pub struct RelationshipEngine {
    pub(crate) database: Database,
    pub(crate) host: Box<dyn WorldHost>,
    pub(crate) relationships: HashMap<(ActorId, ActorId), Relationship>,
    event_bus: Option<Box<dyn GameEventBus>>,
    observers: ObserverRegistry,
    rng: StdRng,
}

impl RelationshipEngine {
    pub fn new(database: Database, host: Box<dyn WorldHost>) -> Self {
        Self::with_rng(database, host, StdRng::from_entropy())
    }

    /// Deterministic construction for tests and replays.
    pub fn with_rng_seed(database: Database, host: Box<dyn WorldHost>, seed: u64) -> Self {
        Self::with_rng(database, host, StdRng::seed_from_u64(seed))
    }

    fn with_rng(database: Database, host: Box<dyn WorldHost>, rng: StdRng) -> Self {
        Self {
            database,
            host,
            relationships: HashMap::new(),
            event_bus: None,
            observers: ObserverRegistry::default(),
            rng,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Attach a best-effort external event bus.
    pub fn set_event_bus(&mut self, bus: Box<dyn GameEventBus>) {
        self.event_bus = Some(bus);
    }

    pub fn clear_event_bus(&mut self) {
        self.event_bus = None;
    }

    pub fn register_observer(&mut self, observer: Box<dyn RelationshipObserver>) -> ObserverHandle {
        self.observers.register(observer)
    }

    pub fn unregister_observer(&mut self, handle: ObserverHandle) -> bool {
        self.observers.unregister(handle)
    }

    // ==================== Relationship management ====================

    /// Create a relationship, seeding dimensions, state, and traits from the
    /// given (or default) profile. Idempotent: an existing relationship is
    /// left untouched and reported as success.
    pub fn create_relationship(
        &mut self,
        subject: ActorId,
        target: ActorId,
        subject_profile: Option<&str>,
        target_profile: Option<&str>,
    ) -> bool {
        if subject == target {
            warn!("cannot create a relationship from an actor to itself");
            return false;
        }
        if !self.host.is_actor_alive(subject) || !self.host.is_actor_alive(target) {
            warn!("cannot create relationship: an endpoint actor is not alive");
            return false;
        }
        if self.relationships.contains_key(&(subject, target)) {
            debug!("relationship already exists: {subject} -> {target}");
            return true;
        }

        let profile = match subject_profile {
            Some(id) => match self.database.find_profile(id) {
                Some(found) => Some(found),
                None => {
                    warn!("unknown profile '{id}', falling back to the database default");
                    self.database.default_profile()
                }
            },
            None => self.database.default_profile(),
        };

        if let Some(p) = profile {
            if !p.can_be_subject {
                warn!("profile '{}' does not allow initiating relationships", p.id);
                return false;
            }
        }
        if let Some(id) = target_profile {
            match self.database.find_profile(id) {
                Some(p) if !p.can_be_target => {
                    warn!("profile '{}' does not allow receiving relationships", p.id);
                    return false;
                }
                Some(_) => {}
                None => warn!("unknown target profile '{id}'"),
            }
        }

        let now = self.host.game_time_seconds();

        let dimensions = match profile {
            Some(p) => p.create_initial_dimensions(&self.database, now),
            None => self
                .database
                .all_dimensions()
                .map(|d| {
                    (
                        d.id.clone(),
                        DimensionValue::new(d.clamp_value(d.default_value), now),
                    )
                })
                .collect(),
        };

        let initial_state = profile
            .and_then(|p| p.initial_state.clone())
            .or_else(|| self.database.default_state().map(|s| s.id.clone()));

        let mut state = StateInstance::default();
        if let Some(state_id) = &initial_state {
            state.set_state(state_id.clone(), now);
        }

        // Initial traits skip conflict/requirement checks; those apply only
        // to runtime add_trait calls.
        let traits: Vec<TraitInstance> = profile
            .map(|p| {
                p.initial_traits
                    .iter()
                    .map(|t| TraitInstance::new(t.clone(), now))
                    .collect()
            })
            .unwrap_or_default();

        let profile_id = profile.map(|p| p.id.clone());
        self.relationships.insert(
            (subject, target),
            Relationship {
                subject,
                target,
                dimensions,
                state,
                traits,
                actions: HashMap::new(),
                profile: profile_id,
                last_update_time: now,
            },
        );

        debug!("created relationship {subject} -> {target}");
        true
    }

    pub fn remove_relationship(&mut self, subject: ActorId, target: ActorId) -> bool {
        self.relationships.remove(&(subject, target)).is_some()
    }

    pub fn has_relationship(&self, subject: ActorId, target: ActorId) -> bool {
        self.relationships.contains_key(&(subject, target))
    }

    /// Copy of the relationship record, if one exists.
    pub fn relationship_data(&self, subject: ActorId, target: ActorId) -> Option<Relationship> {
        self.relationships.get(&(subject, target)).cloned()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn clear_all_relationships(&mut self) {
        self.relationships.clear();
        warn!("all relationships cleared");
    }

    // ==================== Dimension operations ====================

    /// Current dimension value, `0.0` when the relationship or dimension is
    /// absent.
    pub fn dimension_value(&self, subject: ActorId, target: ActorId, dimension: &str) -> f32 {
        self.relationships
            .get(&(subject, target))
            .map(|rel| rel.dimension_value(dimension))
            .unwrap_or(0.0)
    }

    /// Set a dimension to an absolute value (clamped to its bounds).
    ///
    /// Emits a dimension-changed notification and re-evaluates state
    /// transitions only when the stored value actually changed.
    pub fn set_dimension_value(
        &mut self,
        subject: ActorId,
        target: ActorId,
        dimension: &str,
        new_value: f32,
    ) -> bool {
        let now = self.host.game_time_seconds();
        let key = (subject, target);

        let (changed, stored) = {
            let Some(def) = self.database.find_dimension(dimension) else {
                warn!("dimension not found: {dimension}");
                return false;
            };
            let Some(rel) = self.relationships.get_mut(&key) else {
                return false;
            };

            let clamped = def.clamp_value(new_value);
            match rel.dimensions.get_mut(dimension) {
                Some(value) => {
                    let old = value.value;
                    value.value = clamped;
                    value.last_modified_time = now;
                    let changed = !nearly_equal(old, clamped);
                    if changed {
                        value.accumulated_change += (clamped - old).abs();
                    }
                    (changed, clamped)
                }
                None => {
                    rel.dimensions
                        .insert(dimension.to_string(), DimensionValue::new(clamped, now));
                    (true, clamped)
                }
            }
        };

        if changed {
            self.notify_dimension_changed(subject, target, dimension, stored);
            self.evaluate_state_transitions(subject, target);
        }
        true
    }

    /// Apply a relative change, filtered through trait modifiers (once per
    /// stack, honoring action filters) and the current state's multiplier.
    pub fn modify_dimension_value(
        &mut self,
        subject: ActorId,
        target: ActorId,
        dimension: &str,
        delta: f32,
    ) -> bool {
        self.modify_dimension_internal(subject, target, dimension, delta, None)
    }

    /// Best-effort batch modify: continues past individual failures and
    /// reports success only if every change succeeded.
    pub fn modify_dimension_values(
        &mut self,
        subject: ActorId,
        target: ActorId,
        deltas: &HashMap<String, f32>,
    ) -> bool {
        self.modify_dimension_values_internal(subject, target, deltas, None)
    }

    fn modify_dimension_internal(
        &mut self,
        subject: ActorId,
        target: ActorId,
        dimension: &str,
        delta: f32,
        action: Option<&str>,
    ) -> bool {
        let key = (subject, target);
        let Some(rel) = self.relationships.get(&key) else {
            return false;
        };

        let mut modified_delta = delta;
        for instance in &rel.traits {
            if let Some(def) = self.database.find_trait(&instance.trait_id) {
                modified_delta =
                    def.apply_modifiers(dimension, action, modified_delta, instance.stack_count);
            }
        }
        if let Some(state_id) = &rel.state.current_state {
            if let Some(state_def) = self.database.find_state(state_id) {
                modified_delta *= 1.0 + state_def.dimension_modifier(dimension);
            }
        }

        let current = rel.dimension_value(dimension);
        self.set_dimension_value(subject, target, dimension, current + modified_delta)
    }

    fn modify_dimension_values_internal(
        &mut self,
        subject: ActorId,
        target: ActorId,
        deltas: &HashMap<String, f32>,
        action: Option<&str>,
    ) -> bool {
        let mut success = true;
        for (dimension, delta) in deltas {
            if !self.modify_dimension_internal(subject, target, dimension, *delta, action) {
                success = false;
            }
        }
        success
    }

    // ==================== State operations ====================

    pub fn current_state(&self, subject: ActorId, target: ActorId) -> Option<String> {
        self.relationships
            .get(&(subject, target))
            .and_then(|rel| rel.state.current_state.clone())
    }

    /// Set the state directly, bypassing transition rules. Resets the entry
    /// time and clears pending hysteresis timers; notifies only when the
    /// state actually changed.
    pub fn force_state_change(
        &mut self,
        subject: ActorId,
        target: ActorId,
        new_state: &str,
    ) -> bool {
        let now = self.host.game_time_seconds();
        let old_state = {
            let Some(rel) = self.relationships.get_mut(&(subject, target)) else {
                return false;
            };
            let old = rel.state.current_state.clone();
            rel.state.set_state(new_state, now);
            old
        };

        if old_state.as_deref() != Some(new_state) {
            self.notify_state_transitioned(subject, target, old_state.as_deref(), new_state);
        }
        true
    }

    /// Re-evaluate the current state's transitions against live dimension
    /// values. Invoked automatically after every dimension change.
    ///
    /// Transitions are walked in descending priority order. The first
    /// transition whose rules all pass fires immediately when it has no
    /// hysteresis; otherwise qualifying dwell time accumulates until the
    /// delay is met. Failing rules reset that target's pending timer.
    pub fn evaluate_state_transitions(&mut self, subject: ActorId, target: ActorId) {
        let now = self.host.game_time_seconds();
        let key = (subject, target);

        let (current_state_id, snapshot, elapsed) = {
            let Some(rel) = self.relationships.get_mut(&key) else {
                return;
            };
            let Some(state_id) = rel.state.current_state.clone() else {
                return;
            };
            let elapsed = (now - rel.state.last_evaluation_time).max(0.0) as f32;
            rel.state.last_evaluation_time = now;
            (state_id, rel.dimension_snapshot(), elapsed)
        };

        let Some(state_def) = self.database.find_state(&current_state_id) else {
            return;
        };

        let mut fire: Option<String> = None;
        {
            let Some(rel) = self.relationships.get_mut(&key) else {
                return;
            };
            for transition in state_def.sorted_transitions() {
                let rules_pass = transition.required_rules.iter().all(|rule_id| {
                    match self.database.find_rule(rule_id) {
                        Some(rule) => rule.evaluate(&snapshot),
                        None => {
                            warn!("transition rule not found: {rule_id}");
                            false
                        }
                    }
                });

                if !rules_pass {
                    rel.state.clear_pending_transition(&transition.target_state);
                    continue;
                }

                if transition.hysteresis_delay <= 0.0 {
                    fire = Some(transition.target_state.clone());
                    break;
                }

                rel.state
                    .accumulate_pending(&transition.target_state, elapsed);
                if rel
                    .state
                    .is_transition_ready(&transition.target_state, transition.hysteresis_delay)
                {
                    fire = Some(transition.target_state.clone());
                    break;
                }
                // Still dwelling: leave pending and keep evaluating lower
                // priority transitions.
            }
        }

        if let Some(new_state) = fire {
            self.force_state_change(subject, target, &new_state);
        }
    }

    // ==================== Trait operations ====================

    /// Add a trait, enforcing conflicts and requirements. Re-adding a
    /// stackable trait increments its stack (saturating at the cap);
    /// re-adding a non-stackable trait fails.
    pub fn add_trait(&mut self, subject: ActorId, target: ActorId, trait_id: &str) -> bool {
        let now = self.host.game_time_seconds();
        let key = (subject, target);

        let added_new = {
            let Some(def) = self.database.find_trait(trait_id) else {
                warn!("trait not found: {trait_id}");
                return false;
            };
            let Some(rel) = self.relationships.get_mut(&key) else {
                return false;
            };

            for conflict in &def.conflicting_traits {
                if rel.has_trait(conflict) {
                    warn!("cannot add trait '{trait_id}': conflicts with '{conflict}'");
                    return false;
                }
            }
            for required in &def.required_traits {
                if !rel.has_trait(required) {
                    warn!("cannot add trait '{trait_id}': missing required trait '{required}'");
                    return false;
                }
            }

            if let Some(instance) = rel.traits.iter_mut().find(|i| i.trait_id == trait_id) {
                if !def.stackable {
                    debug!("trait '{trait_id}' already present and not stackable");
                    return false;
                }
                instance.add_stack(def);
                false
            } else {
                rel.traits.push(TraitInstance::new(trait_id, now));
                true
            }
        };

        if added_new {
            self.notify_trait_added(subject, target, trait_id);
        }
        true
    }

    /// Remove all instances of a trait. Fails when none matched.
    pub fn remove_trait(&mut self, subject: ActorId, target: ActorId, trait_id: &str) -> bool {
        let removed = {
            let Some(rel) = self.relationships.get_mut(&(subject, target)) else {
                return false;
            };
            let before = rel.traits.len();
            rel.traits.retain(|i| i.trait_id != trait_id);
            rel.traits.len() != before
        };

        if removed {
            self.notify_trait_removed(subject, target, trait_id);
        }
        removed
    }

    pub fn has_trait(&self, subject: ActorId, target: ActorId, trait_id: &str) -> bool {
        self.relationships
            .get(&(subject, target))
            .map(|rel| rel.has_trait(trait_id))
            .unwrap_or(false)
    }

    pub fn trait_stack_count(&self, subject: ActorId, target: ActorId, trait_id: &str) -> u32 {
        self.relationships
            .get(&(subject, target))
            .and_then(|rel| rel.find_trait(trait_id))
            .map(|instance| instance.stack_count)
            .unwrap_or(0)
    }

    // ==================== Action execution ====================

    /// Whether the action's costs, rules, cooldown, and use cap all allow
    /// execution right now.
    pub fn can_execute_action(&self, subject: ActorId, target: ActorId, action_id: &str) -> bool {
        let Some(rel) = self.relationships.get(&(subject, target)) else {
            return false;
        };
        let Some(action) = self.database.find_action(action_id) else {
            return false;
        };

        if !action.can_execute(&rel.dimension_snapshot(), &self.database) {
            return false;
        }

        if let Some(instance) = rel.actions.get(action_id) {
            let now = self.host.game_time_seconds();
            if instance.is_on_cooldown(now, action.cooldown) {
                return false;
            }
            if instance.is_max_uses_reached(action.max_uses) {
                return false;
            }
        }

        true
    }

    /// Execute an action: consume costs, roll and apply effects, record
    /// usage, fire trait event responses, and broadcast the triggered tags.
    ///
    /// All-or-nothing gating happens up front via [`Self::can_execute_action`];
    /// once underway, individual effects only "fail" probabilistically.
    pub fn execute_action(&mut self, subject: ActorId, target: ActorId, action_id: &str) -> bool {
        if !self.can_execute_action(subject, target, action_id) {
            debug!("action '{action_id}' cannot execute: {subject} -> {target}");
            return false;
        }
        let Some(action) = self.database.find_action(action_id).cloned() else {
            return false;
        };

        let key = (subject, target);
        let now = self.host.game_time_seconds();

        for cost in &action.costs {
            if cost.consumed_value > 0.0 {
                self.modify_dimension_internal(
                    subject,
                    target,
                    &cost.dimension,
                    -cost.consumed_value,
                    Some(action_id),
                );
            }
        }

        for effect in &action.effects {
            if effect.roll_success(&mut self.rng) {
                let value = effect.final_value(&mut self.rng);
                self.modify_dimension_internal(
                    subject,
                    target,
                    &effect.dimension,
                    value,
                    Some(action_id),
                );
            }
        }

        if let Some(rel) = self.relationships.get_mut(&key) {
            rel.actions
                .entry(action_id.to_string())
                .or_insert_with(|| ActionInstance::new(action_id))
                .record_execution(now);
        }

        for event in &action.triggered_events {
            self.process_trait_event_responses(subject, target, event, action_id, now);
            self.send_game_event(event, subject, target, &HashMap::new());
        }

        self.notify_action_executed(subject, target, action_id);
        debug!("executed action '{action_id}': {subject} -> {target}");
        true
    }

    /// Actions offered by the current state, filtered by executability.
    pub fn available_actions(&self, subject: ActorId, target: ActorId) -> Vec<String> {
        let Some(rel) = self.relationships.get(&(subject, target)) else {
            return Vec::new();
        };
        let Some(state_id) = &rel.state.current_state else {
            return Vec::new();
        };
        let Some(state_def) = self.database.find_state(state_id) else {
            return Vec::new();
        };

        state_def
            .available_actions
            .iter()
            .filter(|action_id| self.can_execute_action(subject, target, action_id.as_str()))
            .cloned()
            .collect()
    }

    fn process_trait_event_responses(
        &mut self,
        subject: ActorId,
        target: ActorId,
        event: &str,
        action_id: &str,
        now: f64,
    ) {
        let key = (subject, target);
        let responses: Vec<(usize, TraitEventResponse)> = {
            let Some(rel) = self.relationships.get(&key) else {
                return;
            };
            rel.traits
                .iter()
                .enumerate()
                .filter_map(|(index, instance)| {
                    if instance.is_event_on_cooldown(event, now) {
                        return None;
                    }
                    let def = self.database.find_trait(&instance.trait_id)?;
                    def.event_response(event).map(|r| (index, r.clone()))
                })
                .collect()
        };

        for (index, response) in responses {
            if self.rng.gen::<f32>() > response.probability {
                continue;
            }
            self.modify_dimension_values_internal(
                subject,
                target,
                &response.dimension_changes,
                Some(action_id),
            );
            if let Some(rel) = self.relationships.get_mut(&key) {
                if let Some(instance) = rel.traits.get_mut(index) {
                    instance.set_event_cooldown(event, response.cooldown, now);
                }
            }
        }
    }

    // ==================== Queries ====================

    pub fn relationships_as_subject(&self, subject: ActorId) -> Vec<Relationship> {
        self.relationships
            .values()
            .filter(|rel| rel.subject == subject)
            .cloned()
            .collect()
    }

    pub fn relationships_as_target(&self, target: ActorId) -> Vec<Relationship> {
        self.relationships
            .values()
            .filter(|rel| rel.target == target)
            .cloned()
            .collect()
    }

    pub fn find_relationships_by_state(&self, subject: ActorId, state_id: &str) -> Vec<Relationship> {
        self.relationships
            .values()
            .filter(|rel| {
                rel.subject == subject && rel.state.current_state.as_deref() == Some(state_id)
            })
            .cloned()
            .collect()
    }

    pub fn find_relationships_by_dimension_range(
        &self,
        subject: ActorId,
        dimension: &str,
        min_value: f32,
        max_value: f32,
    ) -> Vec<Relationship> {
        self.relationships
            .values()
            .filter(|rel| {
                if rel.subject != subject {
                    return false;
                }
                let value = rel.dimension_value(dimension);
                value >= min_value && value <= max_value
            })
            .cloned()
            .collect()
    }

    // ==================== Decay ====================

    /// Age every decaying dimension of every live relationship by
    /// `delta_hours`, then reap relationships whose endpoints are gone.
    ///
    /// Driven by the host at a coarse cadence (e.g. once per in-game hour),
    /// never per frame.
    pub fn process_decay(&mut self, delta_hours: f32) {
        if delta_hours <= 0.0 {
            return;
        }

        let now = self.host.game_time_seconds();
        let host = &*self.host;
        let database = &self.database;

        for ((subject, target), rel) in self.relationships.iter_mut() {
            if !host.is_actor_alive(*subject) || !host.is_actor_alive(*target) {
                continue;
            }

            let profile = rel.profile.as_deref().and_then(|id| database.find_profile(id));
            for (dimension_id, value) in rel.dimensions.iter_mut() {
                let Some(def) = database.find_dimension(dimension_id) else {
                    continue;
                };
                if def.decay.is_none() {
                    continue;
                }
                let rate_override =
                    profile.and_then(|p| p.decay_rate_overrides.get(dimension_id).copied());
                value.apply_decay(def, rate_override, delta_hours, now);
            }
            rel.last_update_time = now;
        }

        self.purge_invalid_relationships();
    }

    /// Single-pair variant of [`Self::process_decay`].
    pub fn process_relationship_decay(
        &mut self,
        subject: ActorId,
        target: ActorId,
        delta_hours: f32,
    ) {
        if delta_hours <= 0.0 {
            return;
        }
        let now = self.host.game_time_seconds();
        let database = &self.database;

        let Some(rel) = self.relationships.get_mut(&(subject, target)) else {
            return;
        };
        let profile = rel.profile.as_deref().and_then(|id| database.find_profile(id));
        for (dimension_id, value) in rel.dimensions.iter_mut() {
            let Some(def) = database.find_dimension(dimension_id) else {
                continue;
            };
            if def.decay.is_none() {
                continue;
            }
            let rate_override =
                profile.and_then(|p| p.decay_rate_overrides.get(dimension_id).copied());
            value.apply_decay(def, rate_override, delta_hours, now);
        }
        rel.last_update_time = now;
    }

    /// Drop every relationship with a dead endpoint. Returns the number
    /// removed.
    pub fn purge_invalid_relationships(&mut self) -> usize {
        let host = &*self.host;
        let before = self.relationships.len();
        self.relationships
            .retain(|(subject, target), _| host.is_actor_alive(*subject) && host.is_actor_alive(*target));
        let removed = before - self.relationships.len();
        if removed > 0 {
            debug!("removed {removed} relationships with dead endpoints");
        }
        removed
    }

    // ==================== Notification plumbing ====================

    fn notify_dimension_changed(
        &mut self,
        subject: ActorId,
        target: ActorId,
        dimension: &str,
        new_value: f32,
    ) {
        self.observers
            .dimension_changed(subject, target, dimension, new_value);
        let payload = HashMap::from([
            ("dimension".to_string(), dimension.to_string()),
            ("value".to_string(), new_value.to_string()),
        ]);
        self.send_game_event(EVENT_DIMENSION_CHANGED, subject, target, &payload);
    }

    fn notify_state_transitioned(
        &mut self,
        subject: ActorId,
        target: ActorId,
        old_state: Option<&str>,
        new_state: &str,
    ) {
        self.observers
            .state_transitioned(subject, target, old_state, new_state);
        let mut payload = HashMap::new();
        if let Some(old) = old_state {
            payload.insert("old_state".to_string(), old.to_string());
        }
        payload.insert("new_state".to_string(), new_state.to_string());
        self.send_game_event(EVENT_STATE_TRANSITIONED, subject, target, &payload);
    }

    fn notify_trait_added(&mut self, subject: ActorId, target: ActorId, trait_id: &str) {
        self.observers.trait_added(subject, target, trait_id);
        let payload = HashMap::from([("trait".to_string(), trait_id.to_string())]);
        self.send_game_event(EVENT_TRAIT_ADDED, subject, target, &payload);
    }

    fn notify_trait_removed(&mut self, subject: ActorId, target: ActorId, trait_id: &str) {
        self.observers.trait_removed(subject, target, trait_id);
        let payload = HashMap::from([("trait".to_string(), trait_id.to_string())]);
        self.send_game_event(EVENT_TRAIT_REMOVED, subject, target, &payload);
    }

    fn notify_action_executed(&mut self, subject: ActorId, target: ActorId, action_id: &str) {
        self.observers.action_executed(subject, target, action_id);
        let payload = HashMap::from([("action".to_string(), action_id.to_string())]);
        self.send_game_event(EVENT_ACTION_EXECUTED, subject, target, &payload);
    }

    fn send_game_event(
        &mut self,
        tag: &str,
        subject: ActorId,
        target: ActorId,
        payload: &HashMap<String, String>,
    ) {
        if let Some(bus) = self.event_bus.as_mut() {
            bus.send_event(tag, subject, target, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_database, MockHost};

    fn engine_with_pair() -> (RelationshipEngine, ActorId, ActorId) {
        let host = MockHost::new();
        let npc = host.spawn_actor("Mira");
        let player = host.spawn_actor("Player");
        let mut engine =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host), 42);
        assert!(engine.create_relationship(npc, player, Some("profile.villager"), None));
        (engine, npc, player)
    }

    #[test]
    fn test_create_rejects_self_pair() {
        let host = MockHost::new();
        let actor = host.spawn_actor("Mira");
        let mut engine = RelationshipEngine::new(sample_database(), Box::new(host));
        assert!(!engine.create_relationship(actor, actor, None, None));
    }

    #[test]
    fn test_create_rejects_dead_endpoint() {
        let host = MockHost::new();
        let npc = host.spawn_actor("Mira");
        let player = host.spawn_actor("Player");
        host.destroy_actor(player);
        let mut engine = RelationshipEngine::new(sample_database(), Box::new(host));
        assert!(!engine.create_relationship(npc, player, None, None));
    }

    #[test]
    fn test_creation_is_idempotent() {
        let (mut engine, npc, player) = engine_with_pair();
        engine.set_dimension_value(npc, player, "dimension.affinity", 25.0);

        // Second creation succeeds without touching the existing record.
        assert!(engine.create_relationship(npc, player, Some("profile.villager"), None));
        assert_eq!(engine.dimension_value(npc, player, "dimension.affinity"), 25.0);
        assert_eq!(engine.relationship_count(), 1);
    }

    #[test]
    fn test_dimension_values_stay_clamped() {
        let (mut engine, npc, player) = engine_with_pair();
        engine.set_dimension_value(npc, player, "dimension.affinity", 5000.0);
        assert_eq!(engine.dimension_value(npc, player, "dimension.affinity"), 100.0);
        engine.modify_dimension_value(npc, player, "dimension.affinity", -100000.0);
        assert_eq!(engine.dimension_value(npc, player, "dimension.affinity"), -100.0);
    }

    #[test]
    fn test_unknown_dimension_fails() {
        let (mut engine, npc, player) = engine_with_pair();
        assert!(!engine.set_dimension_value(npc, player, "dimension.bogus", 1.0));
    }

    #[test]
    fn test_trait_conflict_and_requirement_checks() {
        let (mut engine, npc, player) = engine_with_pair();
        assert!(engine.add_trait(npc, player, "trait.forgiving"));
        // Suspicious conflicts with forgiving.
        assert!(!engine.add_trait(npc, player, "trait.suspicious"));
        // Grateful requires forgiving, which is present.
        assert!(engine.add_trait(npc, player, "trait.grateful"));

        assert!(engine.remove_trait(npc, player, "trait.forgiving"));
        assert!(!engine.remove_trait(npc, player, "trait.forgiving"));
    }

    #[test]
    fn test_stacking_caps_at_max() {
        let (mut engine, npc, player) = engine_with_pair();
        for _ in 0..4 {
            assert!(engine.add_trait(npc, player, "trait.wary"));
        }
        assert_eq!(engine.trait_stack_count(npc, player, "trait.wary"), 3);
    }

    #[test]
    fn test_non_stackable_duplicate_fails() {
        let (mut engine, npc, player) = engine_with_pair();
        assert!(engine.add_trait(npc, player, "trait.forgiving"));
        assert!(!engine.add_trait(npc, player, "trait.forgiving"));
    }

    #[test]
    fn test_purge_reaps_dead_endpoints() {
        let host = MockHost::new();
        let npc = host.spawn_actor("Mira");
        let player = host.spawn_actor("Player");
        let mut engine =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host.clone()), 1);
        engine.create_relationship(npc, player, None, None);

        host.destroy_actor(player);
        assert_eq!(engine.purge_invalid_relationships(), 1);
        assert!(!engine.has_relationship(npc, player));
    }

    #[test]
    fn test_decay_sweeps_dead_endpoints() {
        let host = MockHost::new();
        let npc = host.spawn_actor("Mira");
        let player = host.spawn_actor("Player");
        let mut engine =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host.clone()), 1);
        engine.create_relationship(npc, player, None, None);

        host.destroy_actor(player);
        engine.process_decay(1.0);
        assert_eq!(engine.relationship_count(), 0);
    }

    #[test]
    fn test_queries_filter_by_endpoint() {
        let host = MockHost::new();
        let npc = host.spawn_actor("Mira");
        let other = host.spawn_actor("Brom");
        let player = host.spawn_actor("Player");
        let mut engine =
            RelationshipEngine::with_rng_seed(sample_database(), Box::new(host), 1);
        engine.create_relationship(npc, player, None, None);
        engine.create_relationship(other, player, None, None);
        engine.create_relationship(player, npc, None, None);

        assert_eq!(engine.relationships_as_subject(npc).len(), 1);
        assert_eq!(engine.relationships_as_target(player).len(), 2);
        assert_eq!(
            engine
                .find_relationships_by_state(npc, "state.stranger")
                .len(),
            1
        );
    }

    #[test]
    fn test_find_by_dimension_range() {
        let (mut engine, npc, player) = engine_with_pair();
        engine.set_dimension_value(npc, player, "dimension.affinity", 30.0);
        assert_eq!(
            engine
                .find_relationships_by_dimension_range(npc, "dimension.affinity", 20.0, 40.0)
                .len(),
            1
        );
        assert!(engine
            .find_relationships_by_dimension_range(npc, "dimension.affinity", 50.0, 90.0)
            .is_empty());
    }
}
