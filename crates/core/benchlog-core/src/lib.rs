//! Benchmark history store
//!
//! Keeps the durable, append-only history of benchmark runs produced by CI:
//! - [`Measurement`]: one named result with unit, auxiliary stats and params
//! - [`Entry`]: one commit's run, with commit provenance
//! - [`SeriesIndex`]: benchmark name to ordered points, tolerant of names
//!   that come and go across entries
//! - [`HistoryStore`]: the entry log per suite plus its index, with
//!   single-writer appends, rollback on failed persistence and index
//!   verification/rebuild
//! - [`HistoryDocument`]: the persisted `data.js` layout

pub mod entry;
pub mod error;
pub mod extra;
pub mod format;
pub mod measurement;
pub mod persist;
pub mod series;
pub mod store;

pub use entry::{Commit, Entry, Person};
pub use error::{HistoryError, HistoryResult, InvalidReason, MeasurementIssue};
pub use extra::{format_extra, parse_extra};
pub use format::{
    DATA_JS_PREFIX, FormatError, HistoryDocument, RawBench, RawEntry, parse_entry, to_raw_entry,
};
pub use measurement::{ExtraField, Measurement, Params, StatLine};
pub use persist::{
    DataFileSink, FileLayout, HistorySink, LoadError, MemorySink, NullSink, PersistError,
};
pub use series::{IndexDelta, Series, SeriesIndex, SeriesPoint, UnitChange};
pub use store::{AppendResult, HistoryStore, SuiteHistory};

/// Serializes the whole store into its persisted layout, grouped by suite.
pub fn serialize_history(store: &HistoryStore) -> HistoryDocument {
    store.to_document()
}
