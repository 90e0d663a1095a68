//! History store integration tests: file persistence and concurrent readers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use benchlog_core::{
    Commit, DataFileSink, Entry, HistoryDocument, HistoryError, HistoryStore, Measurement,
    NullSink,
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

#[test]
fn test_file_sink_persists_every_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.js");
    let sink = Arc::new(DataFileSink::new(&path));
    let store = HistoryStore::with_sink("https://example.org/repo", sink.clone());

    store
        .append(entry("c1", 1000, vec![Measurement::new("parse/small", 100.0, "ns")]))
        .unwrap();
    store
        .append(entry("c2", 2000, vec![Measurement::new("parse/small", 120.0, "ns")]))
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("window.BENCHMARK_DATA = {"));

    let document = sink.load().unwrap().unwrap();
    assert_eq!(document.last_update, 2000);
    assert_eq!(document, store.to_document());

    let reloaded = HistoryStore::from_document(document, sink).unwrap();
    assert_eq!(reloaded.series(SUITE, "parse/small").unwrap().values(), vec![100.0, 120.0]);
}

#[test]
fn test_missing_file_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let sink = DataFileSink::new(dir.path().join("absent.json"));
    assert!(sink.load().unwrap().is_none());
}

#[test]
fn test_corrupt_document_is_rejected() {
    let mut document = HistoryDocument::new("repo");
    let store = HistoryStore::new("repo");
    store
        .append(entry("c1", 1, vec![Measurement::new("a", 1.0, "ns")]))
        .unwrap();
    let raw = store.to_document().entries[SUITE][0].clone();
    document
        .entries
        .insert(SUITE.to_string(), vec![raw.clone(), raw]);

    let result = HistoryStore::from_document(document, Arc::new(NullSink));
    assert!(matches!(result, Err(HistoryError::CorruptHistory(_))));
}

#[test]
fn test_readers_never_observe_torn_appends() {
    let store = HistoryStore::new("repo");
    store
        .append(entry(
            "c0",
            0,
            vec![Measurement::new("x", 0.0, "ns"), Measurement::new("y", 0.0, "ns")],
        ))
        .unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let (x, y, entries) = store
                        .with_suite(SUITE, |history| {
                            (
                                history.series("x").map_or(0, |s| s.len()),
                                history.series("y").map_or(0, |s| s.len()),
                                history.len(),
                            )
                        })
                        .unwrap();
                    assert_eq!(x, y);
                    assert_eq!(x, entries);
                }
            });
        }

        for i in 1..200 {
            store
                .append(entry(
                    &format!("c{i}"),
                    i,
                    vec![
                        Measurement::new("x", i as f64, "ns"),
                        Measurement::new("y", i as f64, "ns"),
                    ],
                ))
                .unwrap();
        }
        done.store(true, Ordering::Release);
    });

    assert_eq!(store.len(SUITE), 200);
}
