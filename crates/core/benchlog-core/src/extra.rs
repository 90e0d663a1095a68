//! Adapter for the `extra` text of a persisted bench.
//!
//! The persisted format packs auxiliary stats into one string: lines of
//! `key=value`, followed by a `params=` line holding a JSON object of the
//! tool's configuration, e.g.
//!
//! ```text
//! gctime=11905503
//! memory=220494096
//! allocs=410240
//! params={"gctrial":true,"time_tolerance":0.05,"samples":10000}
//! ```
//!
//! This module is the only place that knows about that layout. Everything
//! else works with [`ExtraField`] and [`Params`].

use serde_json::Value;

use crate::measurement::{ExtraField, Params, StatLine};

const PARAMS_PREFIX: &str = "params=";

/// Splits an `extra` string into typed stat lines and the params object.
///
/// Lines that are neither a numeric `key=value` pair nor the first
/// `params=` object are kept verbatim as [`ExtraField::Note`]. The position
/// of the params line is kept as [`ExtraField::Params`].
pub fn parse_extra(raw: &str) -> (Vec<ExtraField>, Params) {
    let mut fields = Vec::new();
    let mut params: Option<Params> = None;

    for line in raw.split('\n') {
        if params.is_none()
            && let Some(json) = line.strip_prefix(PARAMS_PREFIX)
            && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(json)
        {
            params = Some(map);
            fields.push(ExtraField::Params);
            continue;
        }

        fields.push(parse_line(line));
    }

    (fields, params.unwrap_or_default())
}

fn parse_line(line: &str) -> ExtraField {
    if let Some((key, literal)) = line.split_once('=')
        && !key.is_empty()
        && let Ok(value) = literal.trim().parse::<f64>()
    {
        return ExtraField::Stat(StatLine::with_literal(
            key.to_string(),
            value,
            literal.to_string(),
        ));
    }
    ExtraField::Note(line.to_string())
}

/// Writes stat lines and params back into the persisted `extra` string.
///
/// Returns `None` when there is nothing to write, so the field can be
/// omitted. The params line goes where it was read, or last for
/// measurements built in code.
pub fn format_extra(fields: &[ExtraField], params: &Params) -> Option<String> {
    if fields.is_empty() && params.is_empty() {
        return None;
    }

    let params_line = || format!("{PARAMS_PREFIX}{}", Value::Object(params.clone()));
    let mut lines: Vec<String> = fields
        .iter()
        .map(|field| match field {
            ExtraField::Stat(line) => format!("{}={}", line.key, line.literal()),
            ExtraField::Note(text) => text.clone(),
            ExtraField::Params => params_line(),
        })
        .collect();

    let placed = fields.iter().any(|field| matches!(field, ExtraField::Params));
    if !placed && !params.is_empty() {
        lines.push(params_line());
    }

    Some(lines.join("\n"))
}

/// Canonical text for a stat value created in code rather than parsed.
pub(crate) fn format_stat(value: f64) -> String {
    format!("{value}")
}
