//! End-to-end detection over a history store.

use std::sync::Arc;

use benchlog_core::{Commit, Entry, HistoryStore, InvalidReason, Measurement, MemorySink};
use benchlog_detect::{
    AlertReporter, DetectWarning, RegressionDetector, ReportFormat, ToleranceConfig, Verdict,
};

const SUITE: &str = "Benchmark Results";

fn entry(commit: &str, recorded_at: i64, measurements: Vec<Measurement>) -> Entry {
    Entry::new(
        SUITE,
        "julia",
        Commit::new(commit, "2025-08-06T12:21:56+02:00"),
        recorded_at,
    )
    .unwrap()
    .with_measurements(measurements)
}

fn detector() -> RegressionDetector {
    RegressionDetector::new(ToleranceConfig::default())
}

#[test]
fn test_sparse_series_scenario() {
    let store = HistoryStore::new("https://example.org/repo");
    let detector = detector();

    let a = store
        .append(entry("c1", 1000, vec![Measurement::new("parse/small", 100.0, "ns")]))
        .unwrap();
    let a = detector.evaluate_append(&store, &a).unwrap();
    assert_eq!(a.get("parse/small").unwrap().verdict, Verdict::Baseline);
    assert_eq!(a.verdict(), Verdict::Baseline);

    let b = store
        .append(entry("c2", 2000, vec![Measurement::new("parse/small", 120.0, "ns")]))
        .unwrap();
    let b = detector.evaluate_append(&store, &b).unwrap();
    let small = b.get("parse/small").unwrap();
    assert_eq!(small.verdict, Verdict::Regressed);
    assert_eq!(small.baseline_commit.as_deref(), Some("c1"));
    let delta = small.value_outcome().unwrap().relative_delta.unwrap();
    assert!((delta - 0.20).abs() < 1e-12);
    assert!(b.has_regressions());

    let c = store
        .append(entry("c3", 3000, vec![Measurement::new("parse/large", 500.0, "ns")]))
        .unwrap();
    let c = detector.evaluate_append(&store, &c).unwrap();
    assert_eq!(c.get("parse/large").unwrap().verdict, Verdict::Baseline);
    assert!(c.get("parse/small").is_none());
    assert_eq!(store.series(SUITE, "parse/small").unwrap().len(), 2);
    assert_eq!(store.series(SUITE, "parse/large").unwrap().len(), 1);
}

#[test]
fn test_partial_entry_isolation() {
    let store = HistoryStore::new("repo");
    let detector = detector();
    store
        .append(entry("c1", 1, vec![Measurement::new("good", 10.0, "ns")]))
        .unwrap();

    let appended = store
        .append(entry(
            "c2",
            2,
            vec![
                Measurement::new("bad", f64::NAN, "ns"),
                Measurement::new("good", 10.2, "ns"),
            ],
        ))
        .unwrap();
    let evaluation = detector.evaluate_append(&store, &appended).unwrap();

    assert_eq!(evaluation.verdicts.len(), 1);
    assert_eq!(evaluation.get("good").unwrap().verdict, Verdict::Stable);
    assert_eq!(evaluation.rejected.len(), 1);
    assert_eq!(evaluation.rejected[0].name, "bad");
    assert_eq!(evaluation.rejected[0].reason, InvalidReason::NonFiniteValue);

    let report = AlertReporter::new(ReportFormat::Text).render(&evaluation).unwrap();
    assert!(report.contains("rejected"));
}

#[test]
fn test_unchanged_value_appends_stable_point() {
    let store = HistoryStore::new("repo");
    let detector = detector();
    for (i, commit) in ["c1", "c2", "c3"].iter().enumerate() {
        let result = store
            .append(entry(commit, i as i64, vec![Measurement::new("frozen", 34109467.0, "ns")]))
            .unwrap();
        let evaluation = detector.evaluate_append(&store, &result).unwrap();
        let expected = if i == 0 { Verdict::Baseline } else { Verdict::Stable };
        assert_eq!(evaluation.verdict(), expected);
    }
    assert_eq!(store.series(SUITE, "frozen").unwrap().len(), 3);
}

#[test]
fn test_unit_change_surfaces_on_evaluation() {
    let store = HistoryStore::new("repo");
    store
        .append(entry("c1", 1, vec![Measurement::new("a", 100.0, "ns")]))
        .unwrap();
    let appended = store
        .append(entry("c2", 2, vec![Measurement::new("a", 0.1, "us")]))
        .unwrap();

    let evaluation = detector().evaluate_append(&store, &appended).unwrap();
    assert_eq!(evaluation.unit_changes.len(), 1);
    let verdict = evaluation.get("a").unwrap();
    assert_eq!(verdict.verdict, Verdict::Indeterminate);
    assert_eq!(
        verdict.warnings,
        vec![DetectWarning::UnitChanged {
            previous: "ns".to_string(),
            current: "us".to_string(),
        }]
    );
}

#[test]
fn test_replay_reproduces_ingestion_verdicts() {
    let sink = Arc::new(MemorySink::new());
    let store = HistoryStore::with_sink("repo", sink.clone());
    let detector = detector();

    let values = [100.0, 120.0, 119.0, 90.0, 91.0];
    let mut at_ingestion = Vec::new();
    for (i, value) in values.iter().enumerate() {
        let appended = store
            .append(entry(
                &format!("c{i}"),
                i as i64,
                vec![
                    Measurement::new("parse/small", *value, "ns").with_stat("memory", 64.0),
                    Measurement::new("eval", 7.0, "ns"),
                ],
            ))
            .unwrap();
        at_ingestion.push(detector.evaluate_append(&store, &appended).unwrap());
    }

    let replayed = detector.replay(&store, SUITE).unwrap();
    assert_eq!(replayed, at_ingestion);
    assert_eq!(
        replayed.iter().map(|e| e.verdict()).collect::<Vec<_>>(),
        vec![
            Verdict::Baseline,
            Verdict::Regressed,
            Verdict::Stable,
            Verdict::Improved,
            Verdict::Stable,
        ]
    );

    // A reloaded store replays to the same verdicts.
    let reloaded = HistoryStore::from_document(sink.last_document().unwrap(), sink).unwrap();
    assert_eq!(detector.replay(&reloaded, SUITE).unwrap(), replayed);
}

#[test]
fn test_replay_follows_config_change() {
    let store = HistoryStore::new("repo");
    for (i, value) in [100.0, 108.0].iter().enumerate() {
        store
            .append(entry(&format!("c{i}"), i as i64, vec![Measurement::new("a", *value, "ns")]))
            .unwrap();
    }

    let strict = detector().replay(&store, SUITE).unwrap();
    let lenient = RegressionDetector::new(ToleranceConfig {
        value_tolerance: 0.10,
        ..Default::default()
    })
    .replay(&store, SUITE)
    .unwrap();

    assert_eq!(strict[1].verdict(), Verdict::Regressed);
    assert_eq!(lenient[1].verdict(), Verdict::Stable);
}

#[test]
fn test_unknown_suite() {
    let store = HistoryStore::new("repo");
    assert!(detector().replay(&store, "missing").is_err());
    assert!(detector().evaluate_entry(&store, "missing", 0).is_err());
}
