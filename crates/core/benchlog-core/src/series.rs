//! Per-benchmark series derived from the entry log.
//!
//! The index is a materialized view: [`SeriesIndex::rebuild`] over an entry
//! log and incremental [`SeriesIndex::apply`] calls over the same log always
//! produce equal indexes, because rebuild is nothing more than apply in log
//! order.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// One point of a series: the value a benchmark reported in one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Position of the contributing entry in its suite's log.
    pub entry_index: usize,
    /// Commit of the contributing entry.
    pub commit_id: String,
    pub value: f64,
    /// Unit as reported by that entry. It may differ between points.
    pub unit: String,
    /// Numeric stats of the measurement, keyed by stat name.
    pub extra: BTreeMap<String, f64>,
}

/// Ordered history of one benchmark name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    points: Vec<SeriesPoint>,
}

impl Series {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// The established unit: the unit of the most recent point.
    pub fn unit(&self) -> Option<&str> {
        self.latest().map(|point| point.unit.as_str())
    }

    /// The point contributed by the given entry, if any.
    pub fn point_at(&self, entry_index: usize) -> Option<&SeriesPoint> {
        self.points
            .binary_search_by_key(&entry_index, |point| point.entry_index)
            .ok()
            .map(|pos| &self.points[pos])
    }

    /// The baseline for `entry_index`: the last point recorded before it.
    pub fn baseline_before(&self, entry_index: usize) -> Option<&SeriesPoint> {
        let pos = self
            .points
            .partition_point(|point| point.entry_index < entry_index);
        pos.checked_sub(1).map(|prev| &self.points[prev])
    }

    /// Plain values, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.value).collect()
    }
}

/// A unit that differs from the one its series had established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitChange {
    pub name: String,
    pub previous: String,
    pub current: String,
}

/// What applying one entry did to the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDelta {
    pub appended: Vec<String>,
    pub created: Vec<String>,
    pub unit_changes: Vec<UnitChange>,
}

/// Maps benchmark name to its series. Names absent from an entry simply
/// get no point for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesIndex {
    series: BTreeMap<String, Series>,
}

impl SeriesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the index from an entry log.
    pub fn rebuild(entries: &[Entry]) -> Self {
        let mut index = Self::new();
        for (entry_index, entry) in entries.iter().enumerate() {
            index.apply(entry_index, entry);
        }
        index
    }

    /// Extends every series the entry reports on.
    ///
    /// The entry must already be validated and must be the next one in the
    /// log.
    pub fn apply(&mut self, entry_index: usize, entry: &Entry) -> IndexDelta {
        let mut delta = IndexDelta::default();

        for measurement in entry.measurements() {
            if !self.series.contains_key(&measurement.name) {
                delta.created.push(measurement.name.clone());
            }
            let series = self
                .series
                .entry(measurement.name.clone())
                .or_insert_with(|| Series::new(measurement.name.clone()));

            if let Some(previous) = series.unit()
                && previous != measurement.unit
            {
                delta.unit_changes.push(UnitChange {
                    name: measurement.name.clone(),
                    previous: previous.to_string(),
                    current: measurement.unit.clone(),
                });
            }

            series.points.push(SeriesPoint {
                entry_index,
                commit_id: entry.commit_id().to_string(),
                value: measurement.value,
                unit: measurement.unit.clone(),
                extra: measurement.stats(),
            });
            delta.appended.push(measurement.name.clone());
            debug!(
                "series '{}' += {} {} (entry {})",
                measurement.name, measurement.value, measurement.unit, entry_index
            );
        }

        delta
    }

    /// Undoes [`apply`](Self::apply) for the most recently applied entry.
    pub fn revert(&mut self, entry_index: usize, entry: &Entry) {
        for measurement in entry.measurements() {
            let Some(series) = self.series.get_mut(&measurement.name) else {
                continue;
            };
            if series
                .latest()
                .is_some_and(|point| point.entry_index == entry_index)
            {
                series.points.pop();
            }
            if series.is_empty() {
                self.series.remove(&measurement.name);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Canonical serialized form, used to compare indexes byte for byte.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
