//! Plain-text rendering of API responses.
//!
//! Everything reads through [`field_or`] so missing or null fields render as `N/A`
//! instead of aborting the command.

use htb_api::models::{self, MISSING, MessageResponse, field_or};
use miette::{IntoDiagnostic, Result};
use serde_json::Value;

/// One table column: header, padded width, and the `/`-separated field path.
pub struct Column {
    pub header: &'static str,
    pub width: usize,
    pub path: &'static str,
}

impl Column {
    pub const fn new(header: &'static str, width: usize, path: &'static str) -> Self {
        Self {
            header,
            width,
            path,
        }
    }
}

/// Pretty-print the raw response. Used by every `--json` short-circuit.
pub fn print_json(value: &Value) -> Result<()> {
    print!("{}", render_json(value)?);
    Ok(())
}

pub fn render_json(value: &Value) -> Result<String> {
    let mut out = serde_json::to_string_pretty(value).into_diagnostic()?;
    out.push('\n');
    Ok(out)
}

/// Render a detail response whose payload sits under `key`.
///
/// With `json` set the body is returned untouched, whatever its shape. Otherwise a
/// missing or null payload is reported as an empty `what`.
pub fn render_detail(
    value: &Value,
    json: bool,
    key: &str,
    what: &str,
    fields: &[(&str, &str)],
) -> Result<String> {
    if json {
        return render_json(value);
    }
    let payload = models::require_object(value, key, what)?;
    Ok(render_fields(payload, fields))
}

pub fn print_table(columns: &[Column], rows: &[Value], empty: &str) {
    if rows.is_empty() {
        println!("{empty}");
        return;
    }
    print!("{}", render_table(columns, rows));
}

/// Render rows as fixed-width columns; the last column is left unpadded.
pub fn render_table(columns: &[Column], rows: &[Value]) -> String {
    let mut out = String::new();
    let total: usize = columns.iter().map(|c| c.width + 1).sum();

    let headers: Vec<String> = columns.iter().map(|c| c.header.to_string()).collect();
    push_row(&mut out, columns, &headers);
    out.push_str(&"-".repeat(total.max(20)));
    out.push('\n');

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| field_or(row, c.path, MISSING))
            .collect();
        push_row(&mut out, columns, &cells);
    }
    out
}

fn push_row(out: &mut String, columns: &[Column], cells: &[String]) {
    let last = columns.len().saturating_sub(1);
    for (i, (column, cell)) in columns.iter().zip(cells).enumerate() {
        if i == last {
            out.push_str(cell);
        } else {
            let cell = truncate(cell, column.width);
            out.push_str(&format!("{:<width$} ", cell, width = column.width));
        }
    }
    out.push('\n');
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

pub fn print_fields(value: &Value, fields: &[(&str, &str)]) {
    print!("{}", render_fields(value, fields));
}

/// Render `Label: value` lines with the values aligned.
pub fn render_fields(value: &Value, fields: &[(&str, &str)]) -> String {
    let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    let mut out = String::new();
    for (label, path) in fields {
        let label = format!("{label}:");
        out.push_str(&format!(
            "{:<width$} {}\n",
            label,
            field_or(value, path, MISSING),
            width = width
        ));
    }
    out
}

/// Print the `message` of a `{message, success}` response.
pub fn print_message(value: &Value) {
    let response: MessageResponse =
        models::decode(value.clone(), "message").unwrap_or_default();
    println!("{}", response.message_or_default());
}

/// The array under `pointer` (e.g. `/info/activity`), or nothing.
pub fn items_at<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
