//! Formats tool results into short console trace lines.
//!
//! Each of the known SQL tools gets a compact summary; any other shape
//! falls back to a truncated generic rendering. Rendering is display
//! only and never alters what gets fed back to the model.

use serde::Deserialize;
use serde_json::Value;
use sqlpilot_runtime::ToolPayload;

const MAX_TABLES_SHOWN: usize = 5;
const MAX_COLUMNS_SHOWN: usize = 3;
const MAX_GENERIC_CHARS: usize = 100;

/// One row of the `list_tables` result.
#[derive(Debug, Deserialize)]
struct TableEntry {
    #[serde(default = "default_schema")]
    schema: String,
    #[serde(default = "default_name")]
    table: String,
}

fn default_schema() -> String {
    "dbo".to_string()
}

fn default_name() -> String {
    "unknown".to_string()
}

/// The `describe_table` result.
#[derive(Debug, Deserialize)]
struct TableDescription {
    #[serde(default = "default_name")]
    table_name: String,
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    type_name: String,
    #[serde(default)]
    nullable: bool,
}

/// The `execute_sql` result. `kind` is "select" for reads and the
/// lowercased statement keyword for writes.
#[derive(Debug, Deserialize)]
struct SqlResult {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    row_count: u64,
    #[serde(default)]
    rows: Vec<serde_json::Map<String, Value>>,
    message: Option<String>,
    rows_affected: Option<i64>,
}

/// Render one tool call's outcome as indented console lines.
pub fn render_result(name: &str, payload: &ToolPayload) -> Vec<String> {
    match payload {
        ToolPayload::Error(message) => vec![format!("  Error: {message}")],
        ToolPayload::Success(value) => match name {
            "list_tables" => render_tables(value),
            "describe_table" => render_description(value),
            "execute_sql" => render_sql(value),
            _ => vec![generic_line(value)],
        },
    }
}

fn render_tables(value: &Value) -> Vec<String> {
    let tables: Vec<TableEntry> = match serde_json::from_value(value.clone()) {
        Ok(tables) => tables,
        Err(_) => return vec![generic_line(value)],
    };

    let mut lines = vec![format!("  → Found {} tables:", tables.len())];
    for entry in tables.iter().take(MAX_TABLES_SHOWN) {
        lines.push(format!("    • {}.{}", entry.schema, entry.table));
    }
    if tables.len() > MAX_TABLES_SHOWN {
        lines.push(format!(
            "    ... and {} more tables",
            tables.len() - MAX_TABLES_SHOWN
        ));
    }
    lines
}

fn render_description(value: &Value) -> Vec<String> {
    let table: TableDescription = match serde_json::from_value(value.clone()) {
        Ok(table) => table,
        Err(_) => return vec![generic_line(value)],
    };

    let mut lines = vec![format!(
        "  → Table '{}' has {} columns:",
        table.table_name,
        table.columns.len()
    )];
    for column in table.columns.iter().take(MAX_COLUMNS_SHOWN) {
        let nullable = if column.nullable { "NULL" } else { "NOT NULL" };
        lines.push(format!(
            "    • {} ({}) {}",
            column.name, column.type_name, nullable
        ));
    }
    if table.columns.len() > MAX_COLUMNS_SHOWN {
        lines.push(format!(
            "    ... and {} more columns",
            table.columns.len() - MAX_COLUMNS_SHOWN
        ));
    }
    lines
}

fn render_sql(value: &Value) -> Vec<String> {
    let result: SqlResult = match serde_json::from_value(value.clone()) {
        Ok(result) => result,
        Err(_) => return vec![generic_line(value)],
    };

    if result.kind.as_deref() == Some("select") {
        let mut lines = vec![format!("  → Query returned {} rows", result.row_count)];
        if result.row_count > 0 {
            if let Some(first) = result.rows.first() {
                let columns: Vec<&str> = first.keys().map(String::as_str).collect();
                lines.push(format!("    Sample data: [{}]", columns.join(", ")));
                for (key, val) in first.iter().take(MAX_COLUMNS_SHOWN) {
                    lines.push(format!("      {}: {}", key, scalar_text(val)));
                }
            }
        }
        lines
    } else {
        let mut lines = vec![format!(
            "  → {}",
            result.message.as_deref().unwrap_or("Query executed")
        )];
        if let Some(rows_affected) = result.rows_affected {
            lines.push(format!("    Rows affected: {rows_affected}"));
        }
        lines
    }
}

/// Strings print bare, everything else as compact JSON.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn generic_line(value: &Value) -> String {
    format!(
        "  → Result: {}",
        truncate(&scalar_text(value), MAX_GENERIC_CHARS)
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
