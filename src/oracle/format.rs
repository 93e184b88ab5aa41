//! Plain-text rendering of query results for the agent's observations.

use crate::models::QueryResult;
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// MySQL-CLI style table. Numbers are right-aligned.
pub fn format_as_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return "Empty set".to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.name.width()).collect();
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.width());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = separator.clone();
    for (col, w) in result.columns.iter().zip(&widths) {
        output.push_str(&format!("| {} ", pad(&col.name, *w, false)));
    }
    output.push_str("|\n");
    output.push_str(&separator);

    for (row, raw) in cells.iter().zip(&result.rows) {
        for ((cell, value), w) in row.iter().zip(raw).zip(&widths) {
            let right = matches!(value, JsonValue::Number(_));
            output.push_str(&format!("| {} ", pad(cell, *w, right)));
        }
        output.push_str("|\n");
    }
    output.push_str(&separator);

    let row_text = if result.row_count() == 1 { "row" } else { "rows" };
    output.push_str(&format!("{} {} in set", result.row_count(), row_text));
    if result.truncated {
        output.push_str(" (truncated)");
    }
    output
}

/// Pad by display width; `format!` width counts chars, not columns.
fn pad(text: &str, width: usize, right: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}

/// Rows as tab-separated lines under a header, used for sample rows.
pub fn format_as_tsv(result: &QueryResult) -> String {
    let mut output = result.column_names().join("\t");
    for row in &result.rows {
        output.push('\n');
        let line: Vec<String> = row.iter().map(format_value).collect();
        output.push_str(&line.join("\t"));
    }
    output
}
