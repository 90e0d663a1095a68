//! Persisted layout of a benchmark history.
//!
//! ```text
//! {
//!   "lastUpdate": 1758795939211,
//!   "repoUrl": "https://github.com/...",
//!   "entries": {
//!     "<suite>": [ { "commit": {...}, "date": ..., "tool": "...", "benches": [...] } ]
//!   }
//! }
//! ```
//!
//! The same document is also stored as a browser script,
//! `window.BENCHMARK_DATA = {...}`, which [`HistoryDocument::from_data_js`]
//! and [`HistoryDocument::to_data_js`] handle.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::entry::{Commit, Entry};
use crate::error::InvalidReason;
use crate::extra::{format_extra, parse_extra};
use crate::measurement::Measurement;

/// Prefix of the script form of the document.
pub const DATA_JS_PREFIX: &str = "window.BENCHMARK_DATA = ";

/// Errors raised while reading the persisted layout.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("malformed history JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entry has no commit id")]
    MissingCommitId,

    #[error("invalid commit timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("suite '{suite}' records commit {commit_id} more than once")]
    DuplicateCommit { suite: String, commit_id: String },

    #[error("bench '{name}' in commit {commit_id} has a non-finite value")]
    NonFiniteValue { commit_id: String, name: String },

    #[error("bench '{name}' in commit {commit_id}: {reason}")]
    InvalidBench {
        commit_id: String,
        name: String,
        reason: InvalidReason,
    },
}

/// The whole persisted history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDocument {
    pub last_update: i64,
    pub repo_url: String,
    /// Entries grouped by suite, in first-seen suite order.
    pub entries: IndexMap<String, Vec<RawEntry>>,
}

/// An entry as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub commit: Commit,
    /// Recorded-at time, Unix milliseconds.
    pub date: i64,
    pub tool: String,
    pub benches: Vec<RawBench>,
}

/// A bench as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBench {
    pub name: String,
    /// Kept untyped so a missing or non-numeric value is isolated to this
    /// bench instead of failing the whole document.
    pub value: Value,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl RawBench {
    /// Converts into a typed measurement. Values that are not numbers become
    /// NaN, which the store later rejects as an invalid measurement.
    pub fn into_measurement(self) -> Measurement {
        let value = match &self.value {
            Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
            Value::String(text) => text.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        };

        let mut measurement = Measurement::new(self.name, value, self.unit);
        if let Some(extra) = self.extra.as_deref() {
            let (fields, params) = parse_extra(extra);
            measurement.extra = fields;
            measurement.params = params;
        }
        measurement
    }

    pub fn from_measurement(measurement: &Measurement) -> Self {
        Self {
            name: measurement.name.clone(),
            value: number_value(measurement.value),
            unit: measurement.unit.clone(),
            extra: format_extra(&measurement.extra, &measurement.params),
        }
    }
}

/// Integral values are written without a fractional part, as producers do.
fn number_value(value: f64) -> Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Builds an [`Entry`] from its persisted form.
pub fn parse_entry(suite: &str, raw: RawEntry) -> Result<Entry, FormatError> {
    let measurements: Vec<Measurement> = raw
        .benches
        .into_iter()
        .map(RawBench::into_measurement)
        .collect();

    Ok(Entry::new(suite, raw.tool, raw.commit, raw.date)?.with_measurements(measurements))
}

/// Inverse of [`parse_entry`].
pub fn to_raw_entry(entry: &Entry) -> RawEntry {
    RawEntry {
        commit: entry.commit().clone(),
        date: entry.recorded_at(),
        tool: entry.tool().to_string(),
        benches: entry
            .measurements()
            .iter()
            .map(RawBench::from_measurement)
            .collect(),
    }
}

impl HistoryDocument {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            last_update: 0,
            repo_url: repo_url.into(),
            entries: IndexMap::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, FormatError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Pretty JSON with two-space indentation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reads either the script form or bare JSON.
    pub fn from_data_js(text: &str) -> Result<Self, FormatError> {
        let trimmed = text.trim_start();
        let json = match trimmed.strip_prefix(DATA_JS_PREFIX.trim_end()) {
            Some(rest) => rest.trim().trim_end_matches(';'),
            None => trimmed,
        };
        Self::from_json(json)
    }

    pub fn to_data_js(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{DATA_JS_PREFIX}{}", self.to_json()?))
    }

    /// Parses every entry of every suite, in persisted order.
    pub fn parse_entries(&self) -> Result<Vec<Entry>, FormatError> {
        let mut parsed = Vec::new();
        for (suite, entries) in &self.entries {
            for raw in entries {
                parsed.push(parse_entry(suite, raw.clone())?);
            }
        }
        Ok(parsed)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"window.BENCHMARK_DATA = {
  "lastUpdate": 1758795939211,
  "repoUrl": "https://github.com/JuliaDynamics/CriticalTransitions.jl",
  "entries": {
    "Benchmark Results": [
      {
        "commit": {
          "author": {
            "email": "dev@example.org",
            "name": "Dev",
            "username": "dev"
          },
          "committer": {
            "email": "noreply@github.com",
            "name": "GitHub",
            "username": "web-flow"
          },
          "distinct": true,
          "id": "80ecdfa7e06758b42fdfb45aafc27cc04f96459f",
          "message": "docs: overhaul (#178)",
          "timestamp": "2025-08-06T12:21:56+02:00",
          "tree_id": "49a3c4da2bfcd92669a4e8229083ad7391ccdff0",
          "url": "https://github.com/JuliaDynamics/CriticalTransitions.jl/commit/80ecdfa7e06758b42fdfb45aafc27cc04f96459f"
        },
        "date": 1754476057422,
        "tool": "julia",
        "benches": [
          {
            "name": "Large deviation/String method/Kerr parametric resonator",
            "value": 90124715,
            "unit": "ns",
            "extra": "gctime=11905503\nmemory=220494096\nallocs=410240\nparams={\"gctrial\":true,\"time_tolerance\":0.05,\"evals_set\":false,\"samples\":10000,\"evals\":1,\"gcsample\":false,\"seconds\":10,\"overhead\":0,\"memory_tolerance\":0.01}"
          },
          {
            "name": "Large deviation/Simple geometric minimal action/KPO",
            "value": 714891421.5,
            "unit": "ns"
          }
        ]
      }
    ]
  }
}"#;

    #[test]
    fn test_data_js_round_trip_is_exact() {
        let doc = HistoryDocument::from_data_js(SAMPLE).unwrap();
        assert_eq!(doc.last_update, 1758795939211);
        assert_eq!(doc.entry_count(), 1);

        let entries = doc.parse_entries().unwrap();
        let mut rebuilt = HistoryDocument::new(doc.repo_url.clone());
        rebuilt.last_update = doc.last_update;
        rebuilt.entries.insert(
            "Benchmark Results".to_string(),
            entries.iter().map(to_raw_entry).collect(),
        );

        assert_eq!(rebuilt, doc);
        assert_eq!(rebuilt.to_data_js().unwrap(), SAMPLE);
    }

    #[test]
    fn test_parse_entry_extracts_measurements() {
        let doc = HistoryDocument::from_data_js(SAMPLE).unwrap();
        let entry = &doc.parse_entries().unwrap()[0];

        assert_eq!(entry.suite(), "Benchmark Results");
        assert_eq!(entry.tool(), "julia");
        assert_eq!(entry.commit_id(), "80ecdfa7e06758b42fdfb45aafc27cc04f96459f");
        assert_eq!(entry.author_name(), "Dev");
        assert_eq!(entry.recorded_at(), 1754476057422);

        let m = &entry.measurements()[0];
        assert_eq!(m.value, 90124715.0);
        assert_eq!(m.stat("memory"), Some(220494096.0));
        assert_eq!(m.param_f64("time_tolerance"), Some(0.05));
        assert!(entry.measurements()[1].extra.is_empty());
    }

    #[test]
    fn test_bare_json_is_accepted() {
        let json = SAMPLE.strip_prefix(DATA_JS_PREFIX).unwrap();
        let doc = HistoryDocument::from_data_js(json).unwrap();
        assert_eq!(doc.entry_count(), 1);
    }

    #[test]
    fn test_non_numeric_value_becomes_nan() {
        let bench: RawBench =
            serde_json::from_str(r#"{"name":"x","value":null,"unit":"ns"}"#).unwrap();
        assert!(bench.into_measurement().value.is_nan());
    }

    #[test]
    fn test_garbage_is_a_json_error() {
        assert!(matches!(
            HistoryDocument::from_data_js("window.BENCHMARK_DATA = {oops"),
            Err(FormatError::Json(_))
        ));
    }
}
