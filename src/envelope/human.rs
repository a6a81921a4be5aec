//! Text rendering for the human and plain output modes.

use crate::taxonomy::ContractError;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::{Map, Value};

/// Human rendering: tables for lists of records, aligned `key  value` lines for records.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            format!("{}\n", record_table(items))
        }
        Value::Array(items) => items.iter().map(|item| format!("{}\n", cell(item))).collect(),
        Value::Object(map) => record_lines(map),
        other => format!("{}\n", cell(other)),
    }
}

/// Plain rendering: bare values, one per line, no decoration.
pub fn render_plain(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(|item| format!("{}\n", cell(item))).collect(),
        other => format!("{}\n", cell(other)),
    }
}

pub fn render_error(error: &ContractError) -> String {
    let mut out = format!(
        "Error [{}] {}: {}\n",
        error.code,
        error.category(),
        error.message
    );
    if let Some(field) = &error.field {
        out.push_str(&format!("  field: {}\n", field));
    }
    if let Some(suggestion) = &error.suggestion {
        out.push_str(&format!("  hint: {}\n", suggestion.message));
        if let Some(command) = &suggestion.command {
            out.push_str(&format!("  try: {}\n", command));
        }
    }
    if error.retryable {
        out.push_str("  (retryable)\n");
    }
    if let Some(details) = &error.details {
        out.push_str(&format!("  details: {}\n", details));
    }
    out
}

fn record_table(records: &[Value]) -> Table {
    let mut columns: Vec<&str> = Vec::new();
    for record in records.iter().filter_map(Value::as_object) {
        for key in record.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(columns.clone());
    for record in records.iter().filter_map(Value::as_object) {
        table.add_row(
            columns
                .iter()
                .map(|column| record.get(*column).map(cell).unwrap_or_default())
                .collect::<Vec<String>>(),
        );
    }
    table
}

fn record_lines(map: &Map<String, Value>) -> String {
    let width = map.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    map.iter()
        .map(|(key, value)| format!("{:width$}  {}\n", key, cell(value), width = width))
        .collect()
}

/// Strings bare, everything else as compact JSON.
fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
