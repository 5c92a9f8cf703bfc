//! Relationship rules engine for narrative games.
//!
//! This crate provides:
//! - A definition database of dimensions, states, traits, rules, actions,
//!   and profiles, indexed by identifier
//! - A small formula interpreter for designer-authored rule expressions
//! - The [`RelationshipEngine`]: per-pair dimension tracking with trait and
//!   state modifiers, priority-ordered state transitions with hysteresis,
//!   action execution with costs and probabilistic effects, and periodic
//!   decay
//! - Versioned save/load of all live relationships
//!
//! The engine is synchronous and single-threaded by design: the host game
//! loop owns one engine per world and drives it directly, supplying time and
//! actor identity through the [`WorldHost`] trait.
//!
//! # Quick Start
//!
//! ```ignore
//! use rapport_core::{Database, DatabaseSource, RelationshipEngine};
//!
//! let source = DatabaseSource::from_json_str(&std::fs::read_to_string("defs.json")?)?;
//! let mut engine = RelationshipEngine::new(Database::build(source), Box::new(my_host));
//!
//! engine.create_relationship(npc, player, Some("profile.villager"), None);
//! engine.modify_dimension_value(npc, player, "dimension.affinity", 25.0);
//!
//! // Once per in-game hour:
//! engine.process_decay(1.0);
//! ```

pub mod action;
pub mod database;
pub mod dimension;
pub mod engine;
pub mod events;
pub mod formula;
pub mod host;
pub mod persist;
pub mod profile;
pub mod rule;
pub mod state;
pub mod testing;
pub mod traits;

// Primary public API
pub use action::{ActionCost, ActionDef, ActionEffect, ActionInstance};
pub use database::{Database, DatabaseSource};
pub use dimension::{CurveKey, DecaySettings, DimensionDef, DimensionValue, ResponseCurve};
pub use engine::{Relationship, RelationshipEngine};
pub use events::{ObserverHandle, RelationshipObserver};
pub use formula::{Formula, FormulaError};
pub use host::{ActorId, GameEventBus, WorldHost};
pub use persist::{
    LoadReport, PersistError, RelationshipSave, SaveSummary, SavedRelationship,
    CURRENT_SAVE_VERSION,
};
pub use profile::ProfileDef;
pub use rule::{Comparison, Condition, FormulaCheck, RuleDef};
pub use state::{StateDef, StateInstance, StateTransition};
pub use traits::{TraitDef, TraitDimensionModifier, TraitEventResponse, TraitInstance};

/// Tolerance for float comparisons in rules and change detection.
pub(crate) const VALUE_EPSILON: f32 = 1.0e-4;

/// Epsilon-tolerant float equality.
pub(crate) fn nearly_equal(a: f32, b: f32) -> bool {
    (a - b).abs() <= VALUE_EPSILON
}
