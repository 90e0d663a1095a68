//! Tolerance configuration for regression detection.
//!
//! The configuration is a plain value handed to
//! [`RegressionDetector::new`](crate::RegressionDetector::new); nothing is
//! read from global state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which way a metric gets worse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Time, memory, allocations.
    #[default]
    LargerIsWorse,
    /// Throughput and similar rates.
    SmallerIsWorse,
}

impl Direction {
    /// Turns a signed change into an adverse change: positive means worse.
    pub fn adverse(self, delta: f64) -> f64 {
        match self {
            Direction::LargerIsWorse => delta,
            Direction::SmallerIsWorse => -delta,
        }
    }
}

/// Per-series settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesPolicy {
    pub direction: Direction,
    /// Absolute threshold used when the baseline is zero.
    pub absolute_threshold: Option<f64>,
}

/// Errors loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Tolerances keyed by stat dimension, plus per-series overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Allowed relative change of the primary value (0.05 = 5%).
    pub value_tolerance: f64,
    /// Allowed relative change of the `memory` stat. `None` skips it.
    pub memory_tolerance: Option<f64>,
    /// Allowed relative change of further stats, e.g. `allocs`.
    pub stat_tolerances: BTreeMap<String, f64>,
    /// Primary-value tolerance per series name or `prefix*` pattern.
    pub time_tolerance_overrides: BTreeMap<String, f64>,
    /// Fallback for a zero baseline when the series sets none.
    pub absolute_threshold: Option<f64>,
    pub default_direction: Direction,
    /// Direction and thresholds per series name or `prefix*` pattern.
    pub series: BTreeMap<String, SeriesPolicy>,
    /// Honour `time_tolerance`/`memory_tolerance` recorded in a
    /// measurement's params.
    pub use_recorded_tolerances: bool,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            value_tolerance: 0.05,
            memory_tolerance: Some(0.01),
            stat_tolerances: BTreeMap::new(),
            time_tolerance_overrides: BTreeMap::new(),
            absolute_threshold: None,
            default_direction: Direction::LargerIsWorse,
            series: BTreeMap::new(),
            use_recorded_tolerances: false,
        }
    }
}

impl ToleranceConfig {
    /// Loads a configuration file: `.toml` as TOML, anything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            _ => Self::from_json(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Rejects negative or non-finite tolerances and thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("value_tolerance", self.value_tolerance)?;
        if let Some(tolerance) = self.memory_tolerance {
            check("memory_tolerance", tolerance)?;
        }
        if let Some(threshold) = self.absolute_threshold {
            check("absolute_threshold", threshold)?;
        }
        for (key, tolerance) in &self.stat_tolerances {
            check(&format!("stat_tolerances.{key}"), *tolerance)?;
        }
        for (name, tolerance) in &self.time_tolerance_overrides {
            check(&format!("time_tolerance_overrides.{name}"), *tolerance)?;
        }
        for (name, policy) in &self.series {
            if let Some(threshold) = policy.absolute_threshold {
                check(&format!("series.{name}.absolute_threshold"), threshold)?;
            }
        }
        Ok(())
    }

    /// The configured policy for a series, if any.
    pub fn policy_for(&self, name: &str) -> Option<&SeriesPolicy> {
        lookup(&self.series, name)
    }

    pub fn direction_for(&self, name: &str) -> Direction {
        self.policy_for(name)
            .map_or(self.default_direction, |policy| policy.direction)
    }

    pub fn absolute_threshold_for(&self, name: &str) -> Option<f64> {
        self.policy_for(name)
            .and_then(|policy| policy.absolute_threshold)
            .or(self.absolute_threshold)
    }

    pub fn time_tolerance_override(&self, name: &str) -> Option<f64> {
        lookup(&self.time_tolerance_overrides, name).copied()
    }

    /// Whether anything in the configuration names this series explicitly.
    pub fn is_configured(&self, name: &str) -> bool {
        self.policy_for(name).is_some() || self.time_tolerance_override(name).is_some()
    }
}

fn check(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} must be a finite, non-negative number (got {value})"
        )))
    }
}

/// Exact key first, then the longest `prefix*` pattern that matches.
fn lookup<'a, T>(map: &'a BTreeMap<String, T>, name: &str) -> Option<&'a T> {
    if let Some(value) = map.get(name) {
        return Some(value);
    }

    map.iter()
        .filter_map(|(pattern, value)| {
            let prefix = pattern.strip_suffix('*')?;
            name.starts_with(prefix).then_some((prefix.len(), value))
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, value)| value)
}
