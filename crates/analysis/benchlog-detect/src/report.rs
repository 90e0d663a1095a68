//! Alert report rendering

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::detector::{Dimension, DimensionOutcome, MeasurementVerdict, Verdict};
use crate::evaluate::EntryEvaluation;

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            other => Err(format!("unknown report format '{other}'")),
        }
    }
}

/// Renders evaluations for humans or machines. Describes verdicts only.
#[derive(Debug, Clone, Default)]
pub struct AlertReporter {
    format: ReportFormat,
}

impl AlertReporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Renders one entry evaluation.
    pub fn render(&self, evaluation: &EntryEvaluation) -> Result<String, serde_json::Error> {
        match self.format {
            ReportFormat::Text => Ok(self.render_text(evaluation)),
            ReportFormat::Json => serde_json::to_string_pretty(evaluation),
            ReportFormat::Markdown => Ok(self.render_markdown(evaluation)),
        }
    }

    /// Renders several evaluations, e.g. a replay.
    pub fn render_all(&self, evaluations: &[EntryEvaluation]) -> Result<String, serde_json::Error> {
        if self.format == ReportFormat::Json {
            return serde_json::to_string_pretty(evaluations);
        }
        let mut parts = Vec::with_capacity(evaluations.len());
        for evaluation in evaluations {
            parts.push(self.render(evaluation)?);
        }
        Ok(parts.join("\n"))
    }

    fn render_text(&self, evaluation: &EntryEvaluation) -> String {
        let mut report = String::new();
        let _ = writeln!(
            report,
            "{} @ {} (entry {}): {}",
            evaluation.suite,
            evaluation.commit_id,
            evaluation.entry_index,
            evaluation.verdict()
        );

        for verdict in &evaluation.verdicts {
            let _ = write!(report, "  {:<13} {}", verdict.verdict.to_string(), verdict.name);
            if let Some(outcome) = verdict.value_outcome() {
                let _ = write!(
                    report,
                    ": {} -> {} {}",
                    format_number(outcome.baseline),
                    format_number(outcome.current),
                    verdict.unit
                );
                if let Some(delta) = outcome.relative_delta {
                    let _ = write!(report, " ({:+.2}%)", delta * 100.0);
                }
            } else {
                let _ = write!(report, " [{}]", verdict.unit);
            }
            report.push('\n');

            for outcome in verdict.dimensions.iter().skip(1) {
                if outcome.verdict != Verdict::Stable {
                    let _ = writeln!(
                        report,
                        "                {}: {} -> {} ({})",
                        outcome.dimension,
                        format_number(outcome.baseline),
                        format_number(outcome.current),
                        outcome.verdict
                    );
                }
            }
            for warning in &verdict.warnings {
                let _ = writeln!(report, "                warning: {warning}");
            }
        }

        for issue in &evaluation.rejected {
            let _ = writeln!(report, "  rejected      {issue}");
        }
        for change in &evaluation.unit_changes {
            let _ = writeln!(
                report,
                "  unit change   {}: {} -> {}",
                change.name, change.previous, change.current
            );
        }
        report
    }

    fn render_markdown(&self, evaluation: &EntryEvaluation) -> String {
        let mut report = String::new();
        let regressions: Vec<&MeasurementVerdict> = evaluation.regressions().collect();

        if regressions.is_empty() {
            let _ = writeln!(
                report,
                "# {}\n\nNo regression for commit `{}` ({} measurements, verdict: {}).",
                evaluation.suite,
                evaluation.commit_id,
                evaluation.verdicts.len(),
                evaluation.verdict()
            );
        } else {
            let _ = writeln!(report, "# :warning: Performance Alert :warning:\n");
            let _ = writeln!(
                report,
                "Possible performance regression in **{}** for commit `{}`.\n",
                evaluation.suite, evaluation.commit_id
            );
            let _ = writeln!(report, "| Benchmark | Dimension | Previous | Current | Ratio |");
            let _ = writeln!(report, "|---|---|---|---|---|");
            for verdict in regressions {
                for outcome in verdict
                    .dimensions
                    .iter()
                    .filter(|outcome| outcome.verdict == Verdict::Regressed)
                {
                    let _ = writeln!(
                        report,
                        "| `{}` | {} | {} | {} | {} |",
                        verdict.name,
                        outcome.dimension,
                        with_unit(outcome.baseline, &verdict.unit, outcome),
                        with_unit(outcome.current, &verdict.unit, outcome),
                        outcome
                            .ratio()
                            .map_or_else(|| "-".to_string(), |ratio| format!("{ratio:.2}"))
                    );
                }
            }
        }

        if !evaluation.rejected.is_empty() {
            let _ = writeln!(report, "\nRejected measurements:\n");
            for issue in &evaluation.rejected {
                let _ = writeln!(report, "- `{}`: {}", issue.name, issue.reason);
            }
        }
        report
    }
}

/// Only the primary value carries the measurement's unit.
fn with_unit(value: f64, unit: &str, outcome: &DimensionOutcome) -> String {
    match outcome.dimension {
        Dimension::Value => format!("{} {unit}", format_number(value)),
        Dimension::Stat(_) => format_number(value),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}
