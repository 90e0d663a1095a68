//! `benchlog ingest`: append one CI run

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use benchlog_core::{Commit, Entry, HistoryError, HistoryStore, RawBench};
use benchlog_detect::AlertReporter;
use clap::Args;
use log::{info, warn};

use super::{DetectOptions, open_store};

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON array of `{name, value, unit, extra}` benchmark results
    #[arg(short, long)]
    pub benches: PathBuf,

    /// JSON commit object (`id`, `timestamp`, `author`, ...)
    #[arg(short, long)]
    pub commit: PathBuf,

    /// Grouping key of the run in the history
    #[arg(short, long, default_value = "Benchmark Results")]
    pub suite: String,

    /// Tool that produced the results
    #[arg(short, long, default_value = "customSmallerIsBetter")]
    pub tool: String,

    /// Repository URL recorded in a new history
    #[arg(long)]
    pub repo_url: Option<String>,

    /// Keep at most this many entries of the suite after appending
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Exit with status 1 when any measurement regressed
    #[arg(long)]
    pub fail_on_alert: bool,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub detect: DetectOptions,
}

pub fn run(data: &Path, args: IngestArgs) -> Result<ExitCode> {
    let detector = args.detect.detector()?;
    let store = open_store(data, args.repo_url.as_deref())?;
    let entry = read_entry(&args, chrono::Utc::now().timestamp_millis())?;

    let appended = match store.append(entry) {
        Ok(appended) => appended,
        Err(HistoryError::DuplicateCommit { suite, commit_id }) => {
            warn!("{commit_id} is already recorded in '{suite}', nothing to do");
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => return Err(err).context("appending entry"),
    };
    let evaluation = detector.evaluate_append(&store, &appended)?;

    let report = AlertReporter::new(args.detect.format).render(&evaluation)?;
    match &args.output {
        Some(path) => std::fs::write(path, report)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => print!("{report}"),
    }

    // The append is already committed; retention is best effort.
    if let Some(max_items) = args.max_items {
        apply_retention(&store, &appended.suite, max_items);
    }

    if args.fail_on_alert && evaluation.has_regressions() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

/// Prunes `suite` to `max_items` entries, returning how many were removed.
/// A failure is logged and leaves the history as it was.
fn apply_retention(store: &HistoryStore, suite: &str, max_items: usize) -> usize {
    match store.prune(suite, max_items) {
        Ok(removed) => {
            if removed > 0 {
                info!("dropped {removed} old entries from '{suite}'");
            }
            removed
        }
        Err(err) => {
            warn!("could not prune '{suite}' to {max_items} entries: {err}");
            0
        }
    }
}

fn read_entry(args: &IngestArgs, recorded_at: i64) -> Result<Entry> {
    let benches = std::fs::read_to_string(&args.benches)
        .with_context(|| format!("reading {}", args.benches.display()))?;
    let commit = std::fs::read_to_string(&args.commit)
        .with_context(|| format!("reading {}", args.commit.display()))?;
    build_entry(&args.suite, &args.tool, &commit, &benches, recorded_at)
}

/// Builds an entry from the commit and benchmark JSON documents.
pub fn build_entry(
    suite: &str,
    tool: &str,
    commit: &str,
    benches: &str,
    recorded_at: i64,
) -> Result<Entry> {
    let commit: Commit = serde_json::from_str(commit).context("parsing commit JSON")?;
    let benches: Vec<RawBench> = serde_json::from_str(benches).context("parsing benchmark JSON")?;

    let entry = Entry::new(suite, tool, commit, recorded_at)?
        .with_measurements(benches.into_iter().map(RawBench::into_measurement));
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use benchlog_core::{Measurement, MemorySink};

    use super::*;

    const COMMIT: &str = r#"{
        "author": {"email": "dev@example.org", "name": "Dev"},
        "id": "75ae6e1",
        "message": "Speed up parser",
        "timestamp": "2025-08-06T12:21:56+02:00",
        "tree_id": "0a1b2c",
        "url": "https://example.org/repo/commit/75ae6e1"
    }"#;

    #[test]
    fn test_build_entry() {
        let benches = r#"[
            {"name": "parse/small", "value": 100, "unit": "ns",
             "extra": "gctime=0\nmemory=64\nallocs=2\nparams={\"samples\":100}"},
            {"name": "parse/large", "value": 500.5, "unit": "ns"}
        ]"#;

        let entry = build_entry("Benchmark Results", "julia", COMMIT, benches, 42).unwrap();
        assert_eq!(entry.commit_id(), "75ae6e1");
        assert_eq!(entry.author_name(), "Dev");
        assert_eq!(entry.recorded_at(), 42);
        assert_eq!(entry.measurements().len(), 2);
        assert_eq!(entry.measurement("parse/small").unwrap().stat("memory"), Some(64.0));
    }

    #[test]
    fn test_retention_failure_keeps_committed_entries() {
        let sink = Arc::new(MemorySink::new());
        let store = HistoryStore::with_sink("repo", sink.clone());
        for (i, commit) in ["c1", "c2", "c3"].iter().enumerate() {
            let commit = Commit::new(*commit, "2025-08-06T12:21:56+02:00");
            let entry = Entry::new("Benchmark Results", "julia", commit, i as i64)
                .unwrap()
                .with_measurement(Measurement::new("a", 1.0, "ns"));
            store.append(entry).unwrap();
        }

        sink.set_failing(true);
        assert_eq!(apply_retention(&store, "Benchmark Results", 1), 0);
        assert_eq!(store.len("Benchmark Results"), 3);

        sink.set_failing(false);
        assert_eq!(apply_retention(&store, "Benchmark Results", 1), 2);
        assert_eq!(store.len("Benchmark Results"), 1);
    }

    #[test]
    fn test_build_entry_rejects_bad_commit() {
        let commit = r#"{"author": {"email": "", "name": ""}, "id": "", "timestamp": "2025-08-06T12:21:56+02:00"}"#;
        assert!(build_entry("s", "t", commit, "[]", 0).is_err());
        assert!(build_entry("s", "t", COMMIT, "{}", 0).is_err());
    }
}
