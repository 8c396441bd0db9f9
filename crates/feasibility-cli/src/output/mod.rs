pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Result fields holding per-row detail, in the order formatters look
/// for them.
pub(crate) const ROW_KEYS: [&str; 6] = [
    "entries",
    "slices",
    "periods",
    "breakdowns",
    "outcomes",
    "facilities",
];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Unwrap the `result` field of a computation envelope.
pub(crate) fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// First detail array found in a result object.
pub(crate) fn detail_rows(result: &Value) -> Option<(&'static str, &Vec<Value>)> {
    let map = result.as_object()?;
    ROW_KEYS
        .iter()
        .find_map(|key| match map.get(*key) {
            Some(Value::Array(rows)) if !rows.is_empty() => Some((*key, rows)),
            _ => None,
        })
}

pub(crate) fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
