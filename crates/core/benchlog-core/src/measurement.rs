//! A single named benchmark result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::InvalidReason;
use crate::extra::format_stat;

/// Configuration parameters recorded by the benchmark tool, in recorded order.
pub type Params = Map<String, Value>;

/// One `key=value` stat line of a measurement's `extra` block.
///
/// The literal text of the value is kept next to the parsed number so the
/// line is written back exactly as the producer wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatLine {
    pub key: String,
    pub value: f64,
    literal: String,
}

impl StatLine {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            literal: format_stat(value),
        }
    }

    pub(crate) fn with_literal(key: String, value: f64, literal: String) -> Self {
        Self {
            key,
            value,
            literal,
        }
    }

    /// The value as it appears in the persisted `extra` text.
    pub fn literal(&self) -> &str {
        &self.literal
    }
}

/// A line of the `extra` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtraField {
    /// A numeric auxiliary stat such as `gctime`, `memory` or `allocs`.
    Stat(StatLine),
    /// Free text the adapter could not type. Kept for round-trip only.
    Note(String),
    /// Where the `params=` line stood. The object itself lives in
    /// [`Measurement::params`].
    Params,
}

/// A named numeric benchmark result with unit and auxiliary stats.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Series key within the suite. Must be non-empty.
    pub name: String,
    /// Primary value; must be finite.
    pub value: f64,
    pub unit: String,
    /// The `extra` block in its original line order.
    pub extra: Vec<ExtraField>,
    /// The JSON object of the `params=` line, empty when absent.
    pub params: Params,
}

impl Measurement {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            extra: Vec::new(),
            params: Params::new(),
        }
    }

    pub fn with_stat(mut self, key: impl Into<String>, value: f64) -> Self {
        self.extra.push(ExtraField::Stat(StatLine::new(key, value)));
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Looks up a numeric stat by key. The first occurrence wins.
    pub fn stat(&self, key: &str) -> Option<f64> {
        self.extra.iter().find_map(|field| match field {
            ExtraField::Stat(line) if line.key == key => Some(line.value),
            _ => None,
        })
    }

    /// All finite numeric stats keyed by name, as stored in series points.
    pub fn stats(&self) -> BTreeMap<String, f64> {
        let mut stats = BTreeMap::new();
        for field in &self.extra {
            if let ExtraField::Stat(line) = field
                && line.value.is_finite()
            {
                stats.entry(line.key.clone()).or_insert(line.value);
            }
        }
        stats
    }

    /// Reads a numeric parameter, e.g. a tolerance recorded by the tool.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }

    /// Checks the invariants required before the measurement joins a series.
    pub fn validate(&self) -> Result<(), InvalidReason> {
        if self.name.is_empty() {
            return Err(InvalidReason::EmptyName);
        }
        if !self.value.is_finite() {
            return Err(InvalidReason::NonFiniteValue);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_lookup_and_params() {
        let m = Measurement::new("parse/small", 100.0, "ns")
            .with_stat("memory", 2048.0)
            .with_stat("allocs", 12.0)
            .with_param("time_tolerance", 0.05);

        assert_eq!(m.stat("memory"), Some(2048.0));
        assert_eq!(m.stat("gctime"), None);
        assert_eq!(m.param_f64("time_tolerance"), Some(0.05));
        assert_eq!(m.stats().len(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(Measurement::new("a", 1.0, "ns").validate().is_ok());
        assert_eq!(
            Measurement::new("", 1.0, "ns").validate(),
            Err(InvalidReason::EmptyName)
        );
        assert_eq!(
            Measurement::new("a", f64::NAN, "ns").validate(),
            Err(InvalidReason::NonFiniteValue)
        );
        assert_eq!(
            Measurement::new("a", f64::INFINITY, "ns").validate(),
            Err(InvalidReason::NonFiniteValue)
        );
    }
}
