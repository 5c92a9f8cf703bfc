//! Relationship dimensions: named, bounded numeric axes.
//!
//! A dimension (Trust, Affinity, Fear, ...) has `[min, max]` bounds, a
//! default value, and optional decay toward a target value over game hours.

use crate::nearly_equal;
use serde::{Deserialize, Serialize};

/// A single key on a [`ResponseCurve`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurveKey {
    pub input: f32,
    pub output: f32,
}

/// Piecewise-linear curve mapping a dimension value to a multiplier.
///
/// Keys must be sorted by `input`. Evaluation clamps to the first/last key
/// outside the covered range; an empty curve evaluates to `1.0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseCurve {
    pub keys: Vec<CurveKey>,
}

impl ResponseCurve {
    pub fn evaluate(&self, x: f32) -> f32 {
        let first = match self.keys.first() {
            Some(k) => k,
            None => return 1.0,
        };
        if x <= first.input {
            return first.output;
        }
        // keys is non-empty here
        let last = self.keys[self.keys.len() - 1];
        if x >= last.input {
            return last.output;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if x >= a.input && x <= b.input {
                let span = b.input - a.input;
                if span <= f32::EPSILON {
                    return a.output;
                }
                let t = (x - a.input) / span;
                return a.output + (b.output - a.output) * t;
            }
        }
        last.output
    }
}

/// Decay configuration for a dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecaySettings {
    /// Value the dimension drifts toward (usually 0 or the default).
    pub target: f32,
    /// Linear decay rate per game hour.
    pub rate_per_hour: f32,
    /// Optional non-linear scaling: current value -> decay multiplier.
    #[serde(default)]
    pub curve: Option<ResponseCurve>,
}

/// Static definition of a relationship dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionDef {
    /// Unique identifier (e.g. `"dimension.trust"`).
    pub id: String,
    /// Display name for UI and logs.
    #[serde(default)]
    pub display_name: String,
    pub min_value: f32,
    pub max_value: f32,
    #[serde(default)]
    pub default_value: f32,
    /// Automatic decay toward a target, if enabled.
    #[serde(default)]
    pub decay: Option<DecaySettings>,
}

impl DimensionDef {
    /// Clamp a value to this dimension's bounds.
    pub fn clamp_value(&self, value: f32) -> f32 {
        value.clamp(self.min_value, self.max_value)
    }

    /// Normalize a value into `0..=1`, or `0.5` for a degenerate range.
    pub fn normalize_value(&self, value: f32) -> f32 {
        let range = self.range();
        if range > f32::EPSILON {
            (value - self.min_value) / range
        } else {
            0.5
        }
    }

    pub fn range(&self) -> f32 {
        self.max_value - self.min_value
    }

    /// Decay amount for `delta_hours` using the configured rate.
    ///
    /// Zero when decay is disabled or `delta_hours <= 0`. The magnitude is
    /// capped so decay never overshoots the target.
    pub fn calculate_decay(&self, current: f32, delta_hours: f32) -> f32 {
        let rate = match &self.decay {
            Some(d) => d.rate_per_hour,
            None => return 0.0,
        };
        self.calculate_decay_with_rate(current, delta_hours, rate)
    }

    /// Decay amount with an explicit rate (profile overrides go through here).
    pub fn calculate_decay_with_rate(
        &self,
        current: f32,
        delta_hours: f32,
        rate_per_hour: f32,
    ) -> f32 {
        let decay = match &self.decay {
            Some(d) => d,
            None => return 0.0,
        };
        if delta_hours <= 0.0 {
            return 0.0;
        }

        let distance = decay.target - current;
        if nearly_equal(distance, 0.0) {
            return 0.0;
        }

        let mut amount = rate_per_hour * delta_hours * distance.signum();
        if let Some(curve) = &decay.curve {
            amount *= curve.evaluate(current);
        }

        // Never overshoot the target.
        if amount.abs() > distance.abs() {
            amount = distance;
        }
        amount
    }

    /// Apply decay and clamp to bounds.
    pub fn apply_decay(&self, current: f32, delta_hours: f32) -> f32 {
        self.clamp_value(current + self.calculate_decay(current, delta_hours))
    }

    /// Apply decay with an explicit rate and clamp to bounds.
    pub fn apply_decay_with_rate(&self, current: f32, delta_hours: f32, rate_per_hour: f32) -> f32 {
        self.clamp_value(current + self.calculate_decay_with_rate(current, delta_hours, rate_per_hour))
    }

    /// Validate configuration, pushing messages into `errors`.
    pub fn validate(&self, errors: &mut Vec<String>) -> bool {
        let mut valid = true;

        if self.id.is_empty() {
            errors.push("dimension has an empty identifier".to_string());
            valid = false;
        }

        if self.min_value >= self.max_value {
            errors.push(format!(
                "dimension '{}': min_value ({}) must be less than max_value ({})",
                self.id, self.min_value, self.max_value
            ));
            valid = false;
        }

        if self.default_value < self.min_value || self.default_value > self.max_value {
            errors.push(format!(
                "dimension '{}': default_value ({}) is outside [{}, {}]",
                self.id, self.default_value, self.min_value, self.max_value
            ));
            valid = false;
        }

        if let Some(decay) = &self.decay {
            if decay.target < self.min_value || decay.target > self.max_value {
                errors.push(format!(
                    "dimension '{}': decay target ({}) is outside [{}, {}]",
                    self.id, decay.target, self.min_value, self.max_value
                ));
                valid = false;
            }
            if decay.rate_per_hour < 0.0 {
                errors.push(format!(
                    "dimension '{}': decay rate cannot be negative",
                    self.id
                ));
                valid = false;
            }
        }

        valid
    }
}

/// Live value of a dimension within one relationship.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionValue {
    pub value: f32,
    /// Game time in seconds when the value last changed.
    pub last_modified_time: f64,
    /// Total absolute change accumulated over the relationship's lifetime.
    pub accumulated_change: f32,
}

impl DimensionValue {
    pub fn new(value: f32, now: f64) -> Self {
        Self {
            value,
            last_modified_time: now,
            accumulated_change: 0.0,
        }
    }

    /// Apply decay in place, stamping the modification time only on change.
    pub fn apply_decay(
        &mut self,
        dimension: &DimensionDef,
        rate_override: Option<f32>,
        delta_hours: f32,
        now: f64,
    ) {
        let old = self.value;
        self.value = match rate_override {
            Some(rate) => dimension.apply_decay_with_rate(old, delta_hours, rate),
            None => dimension.apply_decay(old, delta_hours),
        };
        if !nearly_equal(old, self.value) {
            self.last_modified_time = now;
        }
    }
}
