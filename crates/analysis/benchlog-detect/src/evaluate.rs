//! Evaluation of stored entries against their series baselines.

use benchlog_core::{
    AppendResult, HistoryError, HistoryResult, HistoryStore, Measurement, MeasurementIssue,
    SeriesPoint, SuiteHistory, UnitChange,
};
use log::{debug, warn};
use serde::Serialize;

use crate::detector::{MeasurementVerdict, RegressionDetector, Verdict};

/// Verdicts for every measurement of one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryEvaluation {
    pub suite: String,
    pub commit_id: String,
    pub entry_index: usize,
    pub verdicts: Vec<MeasurementVerdict>,
    /// Measurements that were left out of the entry on append.
    pub rejected: Vec<MeasurementIssue>,
    pub unit_changes: Vec<UnitChange>,
}

impl EntryEvaluation {
    /// The worst verdict of the entry; `Baseline` when nothing was compared.
    pub fn verdict(&self) -> Verdict {
        self.verdicts
            .iter()
            .fold(Verdict::Baseline, |acc, verdict| acc.worst(verdict.verdict))
    }

    pub fn regressions(&self) -> impl Iterator<Item = &MeasurementVerdict> {
        self.verdicts.iter().filter(|v| v.verdict.is_alert())
    }

    pub fn has_regressions(&self) -> bool {
        self.regressions().next().is_some()
    }

    pub fn get(&self, name: &str) -> Option<&MeasurementVerdict> {
        self.verdicts.iter().find(|v| v.name == name)
    }
}

impl RegressionDetector {
    /// Evaluates the entry at `entry_index` of `suite`.
    ///
    /// Runs under one read lock so the entry and its baselines come from the
    /// same snapshot.
    pub fn evaluate_entry(
        &self,
        store: &HistoryStore,
        suite: &str,
        entry_index: usize,
    ) -> HistoryResult<EntryEvaluation> {
        store
            .with_suite(suite, |history| self.evaluate_in(history, suite, entry_index))
            .ok_or_else(|| HistoryError::SuiteNotFound(suite.to_string()))?
    }

    /// Evaluates the entry just appended, carrying over what the append
    /// rejected and the unit changes it caused.
    pub fn evaluate_append(
        &self,
        store: &HistoryStore,
        appended: &AppendResult,
    ) -> HistoryResult<EntryEvaluation> {
        let suite = appended.suite.as_str();
        let mut evaluation = store
            .with_suite(suite, |history| {
                let entry_index = history.position_of(&appended.commit_id).ok_or_else(|| {
                    HistoryError::InvalidEntry(format!(
                        "commit {} is not part of suite {suite}",
                        appended.commit_id
                    ))
                })?;
                self.evaluate_in(history, suite, entry_index)
            })
            .ok_or_else(|| HistoryError::SuiteNotFound(suite.to_string()))??;

        evaluation.rejected = appended.rejected.clone();
        evaluation.unit_changes = appended.unit_changes.clone();
        Ok(evaluation)
    }

    /// Re-evaluates every entry of `suite` in order, e.g. after a
    /// tolerance change.
    pub fn replay(&self, store: &HistoryStore, suite: &str) -> HistoryResult<Vec<EntryEvaluation>> {
        store
            .with_suite(suite, |history| {
                (0..history.len())
                    .map(|entry_index| self.evaluate_in(history, suite, entry_index))
                    .collect::<HistoryResult<Vec<_>>>()
            })
            .ok_or_else(|| HistoryError::SuiteNotFound(suite.to_string()))?
    }

    fn evaluate_in(
        &self,
        history: &SuiteHistory,
        suite: &str,
        entry_index: usize,
    ) -> HistoryResult<EntryEvaluation> {
        let entry = history.entry(entry_index).ok_or_else(|| {
            HistoryError::InvalidEntry(format!("{suite} has no entry {entry_index}"))
        })?;

        let mut verdicts = Vec::with_capacity(entry.measurements().len());
        for measurement in entry.measurements() {
            let baseline = history.baseline(&measurement.name, entry_index);
            let verdict = self.judge(suite, entry.commit_id(), measurement, baseline)?;
            if verdict.verdict.is_alert() {
                warn!(
                    "{suite}@{}: '{}' regressed against {}",
                    entry.commit_id(),
                    measurement.name,
                    verdict.baseline_commit.as_deref().unwrap_or("-")
                );
            }
            verdicts.push(verdict);
        }
        debug!(
            "{suite}@{}: evaluated {} measurements",
            entry.commit_id(),
            verdicts.len()
        );

        Ok(EntryEvaluation {
            suite: suite.to_string(),
            commit_id: entry.commit_id().to_string(),
            entry_index,
            verdicts,
            rejected: Vec::new(),
            unit_changes: Vec::new(),
        })
    }

    /// A measurement the detector refuses could only have reached the store
    /// by bypassing validation, so the history is reported as corrupt.
    fn judge(
        &self,
        suite: &str,
        commit_id: &str,
        measurement: &Measurement,
        baseline: Option<&SeriesPoint>,
    ) -> HistoryResult<MeasurementVerdict> {
        self.evaluate(measurement, baseline)
            .map_err(|err| HistoryError::CorruptHistory(format!("{suite}@{commit_id}: {err}")))
    }
}
