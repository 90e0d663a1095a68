//! One commit's benchmark run.

use std::collections::HashSet;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{InvalidReason, MeasurementIssue};
use crate::format::FormatError;
use crate::measurement::Measurement;

/// Author or committer of a commit.
///
/// Field order follows the persisted layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            username: None,
        }
    }
}

/// Commit provenance of an entry, kept exactly as the producer reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub author: Person,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
    pub id: String,
    #[serde(default)]
    pub message: String,
    /// ISO-8601 commit time, verbatim.
    pub timestamp: String,
    #[serde(default)]
    pub tree_id: String,
    #[serde(default)]
    pub url: String,
}

impl Commit {
    pub fn new(id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: Person) -> Self {
        self.author = author;
        self
    }

    pub fn with_tree(mut self, tree_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.tree_id = tree_id.into();
        self.url = url.into();
        self
    }

    /// Parses the commit timestamp into Unix milliseconds.
    pub fn timestamp_unix_ms(&self) -> Result<i64, FormatError> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|time| time.timestamp_millis())
            .map_err(|source| FormatError::Timestamp {
                value: self.timestamp.clone(),
                source,
            })
    }
}

/// A commit's complete benchmark run.
///
/// Entries are immutable once appended. Their order in the store is the
/// order of `recorded_at`/append, never commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    suite: String,
    tool: String,
    commit: Commit,
    timestamp_unix_ms: i64,
    recorded_at: i64,
    measurements: Vec<Measurement>,
}

impl Entry {
    /// Creates an entry without measurements.
    ///
    /// Fails when the commit id is empty or the commit timestamp is not
    /// RFC 3339.
    pub fn new(
        suite: impl Into<String>,
        tool: impl Into<String>,
        commit: Commit,
        recorded_at: i64,
    ) -> Result<Self, FormatError> {
        if commit.id.is_empty() {
            return Err(FormatError::MissingCommitId);
        }
        let timestamp_unix_ms = commit.timestamp_unix_ms()?;

        Ok(Self {
            suite: suite.into(),
            tool: tool.into(),
            commit,
            timestamp_unix_ms,
            recorded_at,
            measurements: Vec::new(),
        })
    }

    /// Appends one measurement.
    pub fn with_measurement(mut self, measurement: Measurement) -> Self {
        self.measurements.push(measurement);
        self
    }

    pub fn with_measurements(mut self, measurements: impl IntoIterator<Item = Measurement>) -> Self {
        self.measurements.extend(measurements);
        self
    }

    /// Grouping key of the persisted layout.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn commit(&self) -> &Commit {
        &self.commit
    }

    /// Identity of the entry within its suite.
    pub fn commit_id(&self) -> &str {
        &self.commit.id
    }

    pub fn author_name(&self) -> &str {
        &self.commit.author.name
    }

    pub fn author_email(&self) -> &str {
        &self.commit.author.email
    }

    /// Git tree of the commit; empty when unknown.
    pub fn tree_id(&self) -> &str {
        &self.commit.tree_id
    }

    /// Link to the commit on the hosting service.
    pub fn source_url(&self) -> &str {
        &self.commit.url
    }

    /// Commit time in milliseconds since the epoch.
    pub fn timestamp_unix_ms(&self) -> i64 {
        self.timestamp_unix_ms
    }

    /// When the entry was recorded, in milliseconds since the epoch. This
    /// is the value persisted as `date`.
    pub fn recorded_at(&self) -> i64 {
        self.recorded_at
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// The measurement called `name`, if any.
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.name == name)
    }

    /// Drops every measurement that may not join a series and reports why.
    ///
    /// A repeated name keeps its first occurrence.
    pub(crate) fn partition_valid(mut self) -> (Self, Vec<MeasurementIssue>) {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        self.measurements.retain(|m| {
            let verdict = m.validate().and_then(|()| {
                if seen.insert(m.name.clone()) {
                    Ok(())
                } else {
                    Err(InvalidReason::DuplicateName)
                }
            });
            match verdict {
                Ok(()) => true,
                Err(reason) => {
                    issues.push(MeasurementIssue::new(m.name.clone(), reason));
                    false
                }
            }
        });

        (self, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_requires_commit_id() {
        let result = Entry::new("suite", "julia", Commit::new("", "2025-08-06T12:21:56+02:00"), 1);
        assert!(matches!(result, Err(FormatError::MissingCommitId)));
    }

    #[test]
    fn test_entry_parses_commit_time() {
        let entry = Entry::new(
            "suite",
            "julia",
            Commit::new("c1", "2025-08-06T12:21:56+02:00"),
            1754476057422,
        )
        .unwrap();

        assert_eq!(entry.timestamp_unix_ms(), 1754475716000);
        assert_eq!(entry.recorded_at(), 1754476057422);
    }

    #[test]
    fn test_entry_rejects_bad_timestamp() {
        let result = Entry::new("suite", "julia", Commit::new("c1", "yesterday"), 1);
        assert!(matches!(result, Err(FormatError::Timestamp { .. })));
    }

    #[test]
    fn test_partition_valid_isolates_bad_measurements() {
        let entry = Entry::new("s", "t", Commit::new("c1", "2025-01-01T00:00:00Z"), 1)
            .unwrap()
            .with_measurement(Measurement::new("ok", 1.0, "ns"))
            .with_measurement(Measurement::new("nan", f64::NAN, "ns"))
            .with_measurement(Measurement::new("", 2.0, "ns"))
            .with_measurement(Measurement::new("ok", 3.0, "ns"));

        let (entry, issues) = entry.partition_valid();

        assert_eq!(entry.measurements().len(), 1);
        assert_eq!(entry.measurements()[0].value, 1.0);
        let reasons: Vec<InvalidReason> = issues.iter().map(|i| i.reason).collect();
        assert_eq!(
            reasons,
            vec![
                InvalidReason::NonFiniteValue,
                InvalidReason::EmptyName,
                InvalidReason::DuplicateName
            ]
        );
    }
}
