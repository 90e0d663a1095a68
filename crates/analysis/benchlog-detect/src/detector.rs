//! Regression detection against a series baseline.
//!
//! The baseline of a measurement is the most recent earlier point of its
//! series. Each configured dimension (the primary value, `memory`, further
//! stats) is compared by relative delta; a zero baseline falls back to an
//! absolute threshold. The verdict is a pure function of the measurement,
//! the baseline and the configuration.

use std::fmt;

use benchlog_core::{Measurement, SeriesPoint};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Direction, ToleranceConfig};

const MEMORY_STAT: &str = "memory";
const TIME_TOLERANCE_PARAM: &str = "time_tolerance";
const MEMORY_TOLERANCE_PARAM: &str = "memory_tolerance";

/// Classification of a measurement relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// First point of the series; nothing to compare against.
    Baseline,
    Stable,
    Improved,
    Regressed,
    /// The comparison is undefined, e.g. a zero baseline without an
    /// absolute threshold.
    Indeterminate,
}

impl Verdict {
    fn rank(self) -> u8 {
        match self {
            Verdict::Baseline => 0,
            Verdict::Stable => 1,
            Verdict::Indeterminate => 2,
            Verdict::Improved => 3,
            Verdict::Regressed => 4,
        }
    }

    /// The more severe of two verdicts.
    pub fn worst(self, other: Verdict) -> Verdict {
        if other.rank() > self.rank() { other } else { self }
    }

    /// Only a regression raises an alert.
    pub fn is_alert(self) -> bool {
        self == Verdict::Regressed
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::Baseline => "baseline",
            Verdict::Stable => "stable",
            Verdict::Improved => "improved",
            Verdict::Regressed => "regressed",
            Verdict::Indeterminate => "indeterminate",
        };
        f.write_str(text)
    }
}

/// What is being compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// The measurement's primary value.
    Value,
    /// A numeric stat from the measurement's `extra` block.
    Stat(String),
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Value => f.write_str("value"),
            Dimension::Stat(key) => f.write_str(key),
        }
    }
}

/// Comparison of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionOutcome {
    pub dimension: Dimension,
    /// Value of the evaluated measurement.
    pub current: f64,
    /// Value of the baseline point.
    pub baseline: f64,
    /// `(current - baseline) / |baseline|`, so the sign always follows the
    /// direction of change; `None` when the baseline is zero.
    pub relative_delta: Option<f64>,
    /// Allowed relative change before the dimension counts as moved.
    pub tolerance: f64,
    /// Allowed absolute change, used when the baseline is zero.
    pub absolute_threshold: Option<f64>,
    /// Whether an increase or a decrease is the regression.
    pub direction: Direction,
    pub verdict: Verdict,
}

impl DimensionOutcome {
    /// `current / baseline`, when defined.
    pub fn ratio(&self) -> Option<f64> {
        (self.baseline != 0.0).then(|| self.current / self.baseline)
    }
}

/// Non-fatal conditions noticed while evaluating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DetectWarning {
    /// A newly observed series has no configuration; global defaults apply.
    SchemaDrift { name: String },
    /// The unit differs from the baseline's, so values are not compared.
    UnitChanged { previous: String, current: String },
}

impl fmt::Display for DetectWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectWarning::SchemaDrift { name } => {
                write!(f, "no tolerance configured for new series '{name}', using defaults")
            }
            DetectWarning::UnitChanged { previous, current } => {
                write!(f, "unit changed from {previous} to {current}")
            }
        }
    }
}

/// Verdict for one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementVerdict {
    pub name: String,
    pub unit: String,
    /// Worst verdict over all dimensions.
    pub verdict: Verdict,
    /// Commit the measurement was compared against; `None` for a baseline.
    pub baseline_commit: Option<String>,
    pub dimensions: Vec<DimensionOutcome>,
    pub warnings: Vec<DetectWarning>,
}

impl MeasurementVerdict {
    pub fn dimension(&self, dimension: &Dimension) -> Option<&DimensionOutcome> {
        self.dimensions.iter().find(|d| &d.dimension == dimension)
    }

    /// The primary value comparison, absent for a baseline verdict.
    pub fn value_outcome(&self) -> Option<&DimensionOutcome> {
        self.dimension(&Dimension::Value)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error("invalid measurement '{name}': value {value} is not finite")]
    InvalidMeasurement { name: String, value: f64 },
}

/// Tolerance-based regression detector.
#[derive(Debug, Clone)]
pub struct RegressionDetector {
    config: ToleranceConfig,
}

impl RegressionDetector {
    /// Creates a detector. The configuration is taken as given; callers
    /// that read it from a file go through [`ToleranceConfig::from_file`],
    /// which validates it.
    pub fn new(config: ToleranceConfig) -> Self {
        Self { config }
    }

    /// The tolerances in effect.
    pub fn config(&self) -> &ToleranceConfig {
        &self.config
    }

    /// Classifies `measurement` against the last earlier point of its series.
    pub fn evaluate(
        &self,
        measurement: &Measurement,
        baseline: Option<&SeriesPoint>,
    ) -> Result<MeasurementVerdict, DetectError> {
        if !measurement.value.is_finite() {
            return Err(DetectError::InvalidMeasurement {
                name: measurement.name.clone(),
                value: measurement.value,
            });
        }

        let mut verdict = MeasurementVerdict {
            name: measurement.name.clone(),
            unit: measurement.unit.clone(),
            verdict: Verdict::Baseline,
            baseline_commit: baseline.map(|point| point.commit_id.clone()),
            dimensions: Vec::new(),
            warnings: Vec::new(),
        };

        let Some(baseline) = baseline else {
            if !self.config.is_configured(&measurement.name) {
                warn!(
                    "series '{}' has no tolerance configuration, using defaults",
                    measurement.name
                );
                verdict.warnings.push(DetectWarning::SchemaDrift {
                    name: measurement.name.clone(),
                });
            }
            return Ok(verdict);
        };

        if baseline.unit != measurement.unit {
            verdict.warnings.push(DetectWarning::UnitChanged {
                previous: baseline.unit.clone(),
                current: measurement.unit.clone(),
            });
            verdict.verdict = Verdict::Indeterminate;
            return Ok(verdict);
        }

        let name = measurement.name.as_str();
        verdict.dimensions.push(compare(
            Dimension::Value,
            measurement.value,
            baseline.value,
            self.value_tolerance(measurement),
            self.config.absolute_threshold_for(name),
            self.config.direction_for(name),
        ));

        if let Some(tolerance) = self.memory_tolerance(measurement)
            && let Some(outcome) = compare_stat(MEMORY_STAT, measurement, baseline, tolerance)
        {
            verdict.dimensions.push(outcome);
        }

        for (key, tolerance) in &self.config.stat_tolerances {
            if key == MEMORY_STAT {
                continue;
            }
            if let Some(outcome) = compare_stat(key, measurement, baseline, *tolerance) {
                verdict.dimensions.push(outcome);
            }
        }

        verdict.verdict = verdict
            .dimensions
            .iter()
            .fold(Verdict::Stable, |acc, outcome| acc.worst(outcome.verdict));
        Ok(verdict)
    }

    /// Per-name override, then the tool's recorded tolerance (if enabled),
    /// then the global value tolerance.
    fn value_tolerance(&self, measurement: &Measurement) -> f64 {
        self.config
            .time_tolerance_override(&measurement.name)
            .or_else(|| self.recorded(measurement, TIME_TOLERANCE_PARAM))
            .unwrap_or(self.config.value_tolerance)
    }

    fn memory_tolerance(&self, measurement: &Measurement) -> Option<f64> {
        self.recorded(measurement, MEMORY_TOLERANCE_PARAM)
            .or(self.config.memory_tolerance)
    }

    fn recorded(&self, measurement: &Measurement, param: &str) -> Option<f64> {
        if !self.config.use_recorded_tolerances {
            return None;
        }
        measurement
            .param_f64(param)
            .filter(|tolerance| tolerance.is_finite() && *tolerance >= 0.0)
    }
}

/// Auxiliary stats are compared only when both sides carry them, and are
/// always larger-is-worse.
fn compare_stat(
    key: &str,
    measurement: &Measurement,
    baseline: &SeriesPoint,
    tolerance: f64,
) -> Option<DimensionOutcome> {
    let current = measurement.stat(key).filter(|value| value.is_finite())?;
    let previous = *baseline.extra.get(key)?;
    Some(compare(
        Dimension::Stat(key.to_string()),
        current,
        previous,
        tolerance,
        None,
        Direction::LargerIsWorse,
    ))
}

/// Compares one dimension. Exceeding a tolerance is strict: a delta exactly
/// at the tolerance is stable.
fn compare(
    dimension: Dimension,
    current: f64,
    baseline: f64,
    tolerance: f64,
    absolute_threshold: Option<f64>,
    direction: Direction,
) -> DimensionOutcome {
    let (relative_delta, verdict) = if baseline != 0.0 {
        let delta = (current - baseline) / baseline.abs();
        (Some(delta), classify(direction.adverse(delta), tolerance))
    } else if current == baseline {
        (None, Verdict::Stable)
    } else {
        let verdict = match absolute_threshold {
            Some(threshold) => classify(direction.adverse(current - baseline), threshold),
            None => Verdict::Indeterminate,
        };
        (None, verdict)
    };

    DimensionOutcome {
        dimension,
        current,
        baseline,
        relative_delta,
        tolerance,
        absolute_threshold,
        direction,
        verdict,
    }
}

fn classify(adverse: f64, limit: f64) -> Verdict {
    if adverse > limit {
        Verdict::Regressed
    } else if adverse < -limit {
        Verdict::Improved
    } else {
        Verdict::Stable
    }
}
