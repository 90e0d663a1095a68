//! Append-only history store.
//!
//! The store owns one entry log per suite plus the series index derived from
//! it. All writers take the state write lock, so appends are serialized and
//! readers observe either the state before an append or after it, never a
//! partially indexed entry.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{info, warn};
use parking_lot::RwLock;

use crate::entry::Entry;
use crate::error::{HistoryError, HistoryResult, InvalidReason, MeasurementIssue};
use crate::format::{FormatError, HistoryDocument, to_raw_entry};
use crate::persist::{HistorySink, NullSink};
use crate::series::{Series, SeriesIndex, SeriesPoint, UnitChange};

/// The entry log of one suite and its series index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteHistory {
    entries: Vec<Entry>,
    index: SeriesIndex,
}

impl SuiteHistory {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, entry_index: usize) -> Option<&Entry> {
        self.entries.get(entry_index)
    }

    pub fn index(&self) -> &SeriesIndex {
        &self.index
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.index.get(name)
    }

    /// The last point of `name` recorded before `entry_index`.
    pub fn baseline(&self, name: &str, entry_index: usize) -> Option<&SeriesPoint> {
        self.index
            .get(name)
            .and_then(|series| series.baseline_before(entry_index))
    }

    pub fn position_of(&self, commit_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.commit_id() == commit_id)
    }

    pub fn contains_commit(&self, commit_id: &str) -> bool {
        self.position_of(commit_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of a successful [`HistoryStore::append`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppendResult {
    pub suite: String,
    pub commit_id: String,
    pub entry_index: usize,
    /// Series that received a point, in measurement order.
    pub appended: Vec<String>,
    /// Series created by this entry.
    pub new_series: Vec<String>,
    pub unit_changes: Vec<UnitChange>,
    /// Measurements left out of the entry.
    pub rejected: Vec<MeasurementIssue>,
}

impl AppendResult {
    /// True when at least one series changed its unit.
    pub fn unit_changed(&self) -> bool {
        !self.unit_changes.is_empty()
    }
}

#[derive(Debug, Default)]
struct StoreState {
    repo_url: String,
    last_update: i64,
    suites: IndexMap<String, SuiteHistory>,
    halted: Option<String>,
}

impl StoreState {
    fn ensure_writable(&self) -> HistoryResult<()> {
        match &self.halted {
            Some(reason) => Err(HistoryError::CorruptHistory(reason.clone())),
            None => Ok(()),
        }
    }

    fn document(&self) -> HistoryDocument {
        let mut document = HistoryDocument::new(self.repo_url.clone());
        document.last_update = self.last_update;
        for (suite, history) in &self.suites {
            document
                .entries
                .insert(suite.clone(), history.entries.iter().map(to_raw_entry).collect());
        }
        document
    }

    /// Suites whose incremental index differs from a rebuild of their log.
    fn diverged_suites(&self) -> Vec<String> {
        self.suites
            .iter()
            .filter(|(_, history)| {
                SeriesIndex::rebuild(&history.entries).fingerprint() != history.index.fingerprint()
            })
            .map(|(suite, _)| suite.clone())
            .collect()
    }
}

/// Durable, ordered, append-only log of benchmark entries.
pub struct HistoryStore {
    state: RwLock<StoreState>,
    sink: Arc<dyn HistorySink>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("HistoryStore")
            .field("repo_url", &state.repo_url)
            .field("suites", &state.suites.len())
            .field("halted", &state.halted)
            .finish()
    }
}

impl HistoryStore {
    /// An empty store that does not persist anything.
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self::with_sink(repo_url, Arc::new(NullSink))
    }

    pub fn with_sink(repo_url: impl Into<String>, sink: Arc<dyn HistorySink>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                repo_url: repo_url.into(),
                ..Default::default()
            }),
            sink,
        }
    }

    /// Loads a persisted document.
    ///
    /// The document is trusted only as far as it parses. Malformed entries,
    /// a commit repeated within a suite, and any bench that `append` would
    /// have rejected (empty or repeated name, non-finite value) make the
    /// whole load fail with [`HistoryError::CorruptHistory`].
    pub fn from_document(
        document: HistoryDocument,
        sink: Arc<dyn HistorySink>,
    ) -> HistoryResult<Self> {
        let mut suites = IndexMap::new();

        for entry in document.parse_entries()? {
            let history: &mut SuiteHistory = suites.entry(entry.suite().to_string()).or_default();
            if history.contains_commit(entry.commit_id()) {
                return Err(FormatError::DuplicateCommit {
                    suite: entry.suite().to_string(),
                    commit_id: entry.commit_id().to_string(),
                }
                .into());
            }
            let (entry, issues) = entry.partition_valid();
            if let Some(issue) = issues.into_iter().next() {
                let commit_id = entry.commit_id().to_string();
                let name = issue.name;
                return Err(match issue.reason {
                    InvalidReason::NonFiniteValue => FormatError::NonFiniteValue { commit_id, name },
                    reason => FormatError::InvalidBench {
                        commit_id,
                        name,
                        reason,
                    },
                }
                .into());
            }
            history.entries.push(entry);
        }

        for history in suites.values_mut() {
            history.index = SeriesIndex::rebuild(&history.entries);
        }

        info!(
            "loaded {} entries in {} suites for {}",
            document.entry_count(),
            suites.len(),
            document.repo_url
        );

        Ok(Self {
            state: RwLock::new(StoreState {
                repo_url: document.repo_url,
                last_update: document.last_update,
                suites,
                halted: None,
            }),
            sink,
        })
    }

    /// Appends one entry.
    ///
    /// Duplicate commits are refused without side effects. Invalid
    /// measurements are dropped from the stored entry and reported on the
    /// result; the rest of the entry is still appended. The append commits
    /// only once the sink has persisted it, otherwise it is rolled back.
    pub fn append(&self, entry: Entry) -> HistoryResult<AppendResult> {
        if entry.suite().is_empty() {
            return Err(HistoryError::InvalidEntry("suite name is empty".to_string()));
        }

        let mut state = self.state.write();
        state.ensure_writable()?;

        let suite = entry.suite().to_string();
        let commit_id = entry.commit_id().to_string();
        if state
            .suites
            .get(&suite)
            .is_some_and(|history| history.contains_commit(&commit_id))
        {
            return Err(HistoryError::DuplicateCommit { suite, commit_id });
        }

        let (entry, rejected) = entry.partition_valid();
        for issue in &rejected {
            warn!("{suite}@{commit_id}: {issue}");
        }

        let previous_update = state.last_update;
        let created_suite = !state.suites.contains_key(&suite);
        let history = state.suites.entry(suite.clone()).or_default();
        let entry_index = history.entries.len();
        let delta = history.index.apply(entry_index, &entry);
        let recorded_at = entry.recorded_at();
        history.entries.push(entry);
        state.last_update = recorded_at;

        if let Err(err) = self.sink.persist(&state.document()) {
            warn!("{suite}@{commit_id}: persistence failed, rolling back: {err}");
            state.last_update = previous_update;
            if created_suite {
                state.suites.shift_remove(&suite);
            } else if let Some(history) = state.suites.get_mut(&suite)
                && let Some(entry) = history.entries.pop()
            {
                history.index.revert(entry_index, &entry);
            }
            return Err(err.into());
        }

        for change in &delta.unit_changes {
            warn!(
                "{suite}: series '{}' changed unit from {} to {}",
                change.name, change.previous, change.current
            );
        }
        info!(
            "{suite}: appended {commit_id} as entry {entry_index} ({} series, {} new, {} rejected)",
            delta.appended.len(),
            delta.created.len(),
            rejected.len()
        );

        Ok(AppendResult {
            suite,
            commit_id,
            entry_index,
            appended: delta.appended,
            new_series: delta.created,
            unit_changes: delta.unit_changes,
            rejected,
        })
    }

    /// A copy of one series.
    pub fn series(&self, suite: &str, name: &str) -> HistoryResult<Series> {
        let state = self.state.read();
        let history = state
            .suites
            .get(suite)
            .ok_or_else(|| HistoryError::SuiteNotFound(suite.to_string()))?;
        history
            .series(name)
            .cloned()
            .ok_or_else(|| HistoryError::SeriesNotFound {
                suite: suite.to_string(),
                name: name.to_string(),
            })
    }

    /// Runs `f` against a consistent view of one suite.
    pub fn with_suite<R>(&self, suite: &str, f: impl FnOnce(&SuiteHistory) -> R) -> Option<R> {
        let state = self.state.read();
        state.suites.get(suite).map(f)
    }

    pub fn entry(&self, suite: &str, entry_index: usize) -> Option<Entry> {
        self.with_suite(suite, |history| history.entry(entry_index).cloned())
            .flatten()
    }

    pub fn suites(&self) -> Vec<String> {
        self.state.read().suites.keys().cloned().collect()
    }

    /// Number of entries in a suite (0 if the suite is unknown).
    pub fn len(&self, suite: &str) -> usize {
        self.with_suite(suite, SuiteHistory::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().suites.values().all(SuiteHistory::is_empty)
    }

    pub fn repo_url(&self) -> String {
        self.state.read().repo_url.clone()
    }

    /// Recorded-at time of the most recent append.
    pub fn last_update(&self) -> i64 {
        self.state.read().last_update
    }

    /// Why writes are blocked, if they are.
    pub fn halted(&self) -> Option<String> {
        self.state.read().halted.clone()
    }

    /// The persisted form of the current state.
    pub fn to_document(&self) -> HistoryDocument {
        self.state.read().document()
    }

    /// Compares every suite's index against a rebuild from its log.
    ///
    /// A divergence halts the store: appends fail with
    /// [`HistoryError::CorruptHistory`] until [`rebuild_index`](Self::rebuild_index)
    /// runs.
    pub fn verify_index(&self) -> HistoryResult<()> {
        let mut state = self.state.write();
        let diverged = state.diverged_suites();
        if diverged.is_empty() {
            return Ok(());
        }

        let reason = format!("series index diverges from entry log in: {}", diverged.join(", "));
        warn!("{reason}; ingestion halted");
        state.halted = Some(reason.clone());
        Err(HistoryError::CorruptHistory(reason))
    }

    /// Recomputes every series index from the entry logs and lifts a halt.
    ///
    /// Returns the suites whose index actually changed.
    pub fn rebuild_index(&self) -> Vec<String> {
        let mut state = self.state.write();
        let mut changed = Vec::new();

        for (suite, history) in state.suites.iter_mut() {
            let rebuilt = SeriesIndex::rebuild(&history.entries);
            if rebuilt != history.index {
                changed.push(suite.clone());
                history.index = rebuilt;
            }
        }
        if state.halted.take().is_some() {
            info!("index rebuilt, ingestion resumed");
        }
        info!("rebuilt index of {} suites ({} changed)", state.suites.len(), changed.len());
        changed
    }

    /// Keeps only the newest `keep_latest` entries of a suite.
    ///
    /// Pruned entries leave every series they contributed to and entry
    /// indices are re-based. Returns the number of entries removed.
    pub fn prune(&self, suite: &str, keep_latest: usize) -> HistoryResult<usize> {
        let mut state = self.state.write();
        state.ensure_writable()?;

        let history = state
            .suites
            .get_mut(suite)
            .ok_or_else(|| HistoryError::SuiteNotFound(suite.to_string()))?;
        let excess = history.entries.len().saturating_sub(keep_latest);
        if excess == 0 {
            return Ok(0);
        }

        let previous = history.clone();
        history.entries.drain(..excess);
        history.index = SeriesIndex::rebuild(&history.entries);

        if let Err(err) = self.sink.persist(&state.document()) {
            warn!("{suite}: persistence failed, restoring pruned entries: {err}");
            if let Some(history) = state.suites.get_mut(suite) {
                *history = previous;
            }
            return Err(err.into());
        }

        info!("{suite}: pruned {excess} entries, keeping {keep_latest}");
        Ok(excess)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_index_for_test(&self, suite: &str) {
        let mut state = self.state.write();
        if let Some(history) = state.suites.get_mut(suite) {
            history.index = SeriesIndex::new();
        }
    }
}
