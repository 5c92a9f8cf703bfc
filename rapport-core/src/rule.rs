//! Rules: boolean predicates over dimension values.
//!
//! A rule is a conjunction of [`Condition`]s, optionally combined with a
//! [`Formula`] whose result is compared against a literal. Rules gate state
//! transitions and action availability.

use crate::formula::Formula;
use crate::nearly_equal;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comparison operators for conditions and formula checks.
///
/// Equality comparisons are epsilon-tolerant to absorb float drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Comparison {
    Equal,
    NotEqual,
    #[default]
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    pub fn evaluate(self, actual: f32, against: f32) -> bool {
        match self {
            Comparison::Equal => nearly_equal(actual, against),
            Comparison::NotEqual => !nearly_equal(actual, against),
            Comparison::Greater => actual > against,
            Comparison::GreaterOrEqual => actual >= against || nearly_equal(actual, against),
            Comparison::Less => actual < against,
            Comparison::LessOrEqual => actual <= against || nearly_equal(actual, against),
        }
    }
}

/// A single condition: one dimension compared against a literal or another
/// dimension's live value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Dimension whose value is tested.
    pub dimension: String,
    #[serde(default)]
    pub comparison: Comparison,
    /// Literal to compare against (ignored when `compare_dimension` resolves).
    #[serde(default)]
    pub compare_value: f32,
    /// Compare against another dimension's value instead of the literal.
    #[serde(default)]
    pub compare_dimension: Option<String>,
}

impl Condition {
    /// Evaluate against a snapshot of dimension values.
    ///
    /// A missing tested dimension fails the condition; a missing compare
    /// dimension falls back to the literal.
    pub fn evaluate(&self, values: &HashMap<String, f32>) -> bool {
        let actual = match values.get(&self.dimension) {
            Some(v) => *v,
            None => {
                warn!("rule condition references unknown dimension: {}", self.dimension);
                return false;
            }
        };

        let against = self
            .compare_dimension
            .as_ref()
            .and_then(|d| values.get(d).copied())
            .unwrap_or(self.compare_value);

        self.comparison.evaluate(actual, against)
    }
}

/// Optional formula clause of a rule: evaluate the expression, then compare
/// the result against a literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaCheck {
    pub formula: Formula,
    #[serde(default)]
    pub comparison: Comparison,
    #[serde(default)]
    pub compare_value: f32,
}

/// Static definition of a rule.
///
/// Evaluates true iff every condition passes AND (there is no formula OR the
/// formula comparison passes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    /// Unique identifier (e.g. `"rule.trust_high"`).
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub formula: Option<FormulaCheck>,
}

impl RuleDef {
    pub fn evaluate(&self, values: &HashMap<String, f32>) -> bool {
        for condition in &self.conditions {
            if !condition.evaluate(values) {
                return false;
            }
        }

        if let Some(check) = &self.formula {
            let result = check.formula.evaluate(values);
            return check.comparison.evaluate(result, check.compare_value);
        }

        true
    }

    /// All dimensions this rule reads, deduplicated in encounter order.
    pub fn referenced_dimensions(&self) -> Vec<String> {
        let mut dimensions = Vec::new();
        let mut push = |id: &str| {
            if !id.is_empty() && !dimensions.iter().any(|d| d == id) {
                dimensions.push(id.to_string());
            }
        };

        for condition in &self.conditions {
            push(&condition.dimension);
            if let Some(compare) = &condition.compare_dimension {
                push(compare);
            }
        }
        if let Some(check) = &self.formula {
            for var in check.formula.referenced_variables() {
                push(&var);
            }
        }

        dimensions
    }

    pub fn validate(&self, errors: &mut Vec<String>) -> bool {
        let mut valid = true;

        if self.id.is_empty() {
            errors.push("rule has an empty identifier".to_string());
            valid = false;
        }

        for condition in &self.conditions {
            if condition.dimension.is_empty() {
                errors.push(format!("rule '{}': condition has an empty dimension", self.id));
                valid = false;
            }
        }

        // Formula syntax is checked at parse time; an existing Formula is
        // always balanced, so there is nothing further to verify here.

        valid
    }
}
