//! Error types for the history store.
//!
//! Store-level failures are returned as [`HistoryError`]. Problems with a
//! single measurement never abort an append; they are collected as
//! [`MeasurementIssue`] values on the append result instead.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::FormatError;
use crate::persist::PersistError;

/// Why a measurement was refused by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidReason {
    /// The measurement has an empty name.
    EmptyName,
    /// The value is NaN or infinite.
    NonFiniteValue,
    /// Another measurement of the same entry already uses this name.
    DuplicateName,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::EmptyName => write!(f, "name is empty"),
            InvalidReason::NonFiniteValue => write!(f, "value is not finite"),
            InvalidReason::DuplicateName => write!(f, "name repeats within the entry"),
        }
    }
}

/// A measurement isolated from an otherwise successful append.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("invalid measurement '{name}': {reason}")]
pub struct MeasurementIssue {
    pub name: String,
    pub reason: InvalidReason,
}

impl MeasurementIssue {
    pub fn new(name: impl Into<String>, reason: InvalidReason) -> Self {
        Self {
            name: name.into(),
            reason,
        }
    }
}

/// Errors returned by [`HistoryStore`](crate::HistoryStore) operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The commit is already recorded in this suite. Nothing was changed.
    #[error("commit {commit_id} is already recorded in suite '{suite}'")]
    DuplicateCommit { suite: String, commit_id: String },

    #[error("suite '{0}' not found")]
    SuiteNotFound(String),

    #[error("series '{name}' not found in suite '{suite}'")]
    SeriesNotFound { suite: String, name: String },

    /// The entry itself cannot be stored (as opposed to one of its measurements).
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// The log or index is inconsistent. Writes stay blocked until the index
    /// is rebuilt.
    #[error("corrupt history: {0}")]
    CorruptHistory(String),

    /// The durable write failed and the in-memory change was rolled back.
    #[error("persistence failed, change rolled back: {0}")]
    Persistence(#[from] PersistError),
}

impl From<FormatError> for HistoryError {
    fn from(err: FormatError) -> Self {
        HistoryError::CorruptHistory(err.to_string())
    }
}

/// Result alias used across the store.
pub type HistoryResult<T> = Result<T, HistoryError>;
