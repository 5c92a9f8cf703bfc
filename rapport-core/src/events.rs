//! Change notifications.
//!
//! Hosts register [`RelationshipObserver`]s on the engine to hear about
//! dimension changes, state transitions, trait changes, and executed actions.
//! The same moments are mirrored onto the optional
//! [`GameEventBus`](crate::host::GameEventBus) under the `relationship.event.*`
//! tags below.

use crate::host::ActorId;

/// Event tag broadcast when a dimension value changes.
pub const EVENT_DIMENSION_CHANGED: &str = "relationship.event.dimension_changed";
/// Event tag broadcast when a relationship changes state.
pub const EVENT_STATE_TRANSITIONED: &str = "relationship.event.state_transitioned";
/// Event tag broadcast when a trait is added.
pub const EVENT_TRAIT_ADDED: &str = "relationship.event.trait_added";
/// Event tag broadcast when a trait is removed.
pub const EVENT_TRAIT_REMOVED: &str = "relationship.event.trait_removed";
/// Event tag broadcast when an action executes.
pub const EVENT_ACTION_EXECUTED: &str = "relationship.event.action_executed";

/// Callbacks for relationship changes. Every method defaults to a no-op, so
/// observers implement only what they care about.
pub trait RelationshipObserver {
    fn on_dimension_changed(
        &mut self,
        _subject: ActorId,
        _target: ActorId,
        _dimension: &str,
        _new_value: f32,
    ) {
    }

    fn on_state_transitioned(
        &mut self,
        _subject: ActorId,
        _target: ActorId,
        _old_state: Option<&str>,
        _new_state: &str,
    ) {
    }

    fn on_trait_added(&mut self, _subject: ActorId, _target: ActorId, _trait_id: &str) {}

    fn on_trait_removed(&mut self, _subject: ActorId, _target: ActorId, _trait_id: &str) {}

    fn on_action_executed(&mut self, _subject: ActorId, _target: ActorId, _action_id: &str) {}
}

/// Handle returned by observer registration, used to unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// Registered observers plus broadcast plumbing.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Vec<(ObserverHandle, Box<dyn RelationshipObserver>)>,
    next_handle: u64,
}

impl ObserverRegistry {
    pub fn register(&mut self, observer: Box<dyn RelationshipObserver>) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle);
        self.next_handle += 1;
        self.observers.push((handle, observer));
        handle
    }

    pub fn unregister(&mut self, handle: ObserverHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(h, _)| *h != handle);
        self.observers.len() != before
    }

    pub fn dimension_changed(
        &mut self,
        subject: ActorId,
        target: ActorId,
        dimension: &str,
        new_value: f32,
    ) {
        for (_, observer) in &mut self.observers {
            observer.on_dimension_changed(subject, target, dimension, new_value);
        }
    }

    pub fn state_transitioned(
        &mut self,
        subject: ActorId,
        target: ActorId,
        old_state: Option<&str>,
        new_state: &str,
    ) {
        for (_, observer) in &mut self.observers {
            observer.on_state_transitioned(subject, target, old_state, new_state);
        }
    }

    pub fn trait_added(&mut self, subject: ActorId, target: ActorId, trait_id: &str) {
        for (_, observer) in &mut self.observers {
            observer.on_trait_added(subject, target, trait_id);
        }
    }

    pub fn trait_removed(&mut self, subject: ActorId, target: ActorId, trait_id: &str) {
        for (_, observer) in &mut self.observers {
            observer.on_trait_removed(subject, target, trait_id);
        }
    }

    pub fn action_executed(&mut self, subject: ActorId, target: ActorId, action_id: &str) {
        for (_, observer) in &mut self.observers {
            observer.on_action_executed(subject, target, action_id);
        }
    }
}
