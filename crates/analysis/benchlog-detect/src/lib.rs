//! Regression detection for benchmark history
//!
//! Compares each measurement of an entry against the last earlier point of
//! its series in a [`benchlog_core::HistoryStore`]:
//! - [`ToleranceConfig`]: tolerances, directions and thresholds, passed in
//!   as a value
//! - [`RegressionDetector`]: the pure per-measurement verdict, plus
//!   entry-level evaluation and replay over a store
//! - [`AlertReporter`]: text, JSON and Markdown renderings of a verdict

pub mod config;
pub mod detector;
pub mod evaluate;
pub mod report;

pub use config::{ConfigError, Direction, SeriesPolicy, ToleranceConfig};
pub use detector::{
    DetectError, DetectWarning, Dimension, DimensionOutcome, MeasurementVerdict,
    RegressionDetector, Verdict,
};
pub use evaluate::EntryEvaluation;
pub use report::{AlertReporter, ReportFormat};
