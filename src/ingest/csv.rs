//! CSV parsing and column type inference for uploads.
//!
//! The parser handles a header row, comma delimiters and RFC-4180 quoting
//! (doubled quotes, quoted newlines). Blank lines are skipped and short rows
//! are padded. Type inference mirrors what a dataframe reader would pick for
//! each column.

use crate::error::{DashboardError, DbResult};
use serde::Serialize;

/// Storage type chosen for an uploaded column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Boolean,
    Text,
}

impl ColumnType {
    /// SQLite declared type. Booleans are stored as 0/1 integers.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// A typed cell ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Parsed CSV contents: a header plus rectangular rows of raw strings.
///
/// Short rows are padded with empty cells; `widths` keeps each row's original
/// field count so padding can be told apart from an explicit empty field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
}

impl CsvTable {
    /// Parse CSV text. The first non-blank record is the header.
    pub fn parse(text: &str) -> DbResult<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut records = parse_records(text)?.into_iter();

        let header = records
            .next()
            .ok_or_else(|| DashboardError::invalid_input("CSV file is empty"))?;
        let headers = dedup_headers(header);

        let mut rows = Vec::new();
        let mut widths = Vec::new();
        for (idx, mut record) in records.enumerate() {
            let width = record.len();
            if width > headers.len() {
                return Err(DashboardError::invalid_input(format!(
                    "CSV row {} has {} fields, expected {}",
                    idx + 2,
                    width,
                    headers.len()
                )));
            }
            record.resize(headers.len(), String::new());
            rows.push(record);
            widths.push(width);
        }

        Ok(Self {
            headers,
            rows,
            widths,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Infer one storage type per column.
    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.headers.len())
            .map(|idx| infer_column(self.rows.iter().map(|row| row[idx].as_str())))
            .collect()
    }

    /// Convert every row to bindable values according to `types`.
    /// Padding cells of short rows are always NULL.
    pub fn typed_rows(&self, types: &[ColumnType]) -> Vec<Vec<CellValue>> {
        self.rows
            .iter()
            .zip(&self.widths)
            .map(|(row, &width)| {
                row.iter()
                    .zip(types)
                    .enumerate()
                    .map(|(idx, (cell, ty))| {
                        if idx < width {
                            convert_cell(cell, *ty)
                        } else {
                            CellValue::Null
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

fn parse_records(text: &str) -> DbResult<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // A quoted empty field still counts as content for blank-line detection.
    let mut field_started = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !field_started => {
                in_quotes = true;
                field_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                finish_record(&mut records, &mut record, &mut field, field_started);
                field_started = false;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(DashboardError::invalid_input(
            "CSV ends inside a quoted field",
        ));
    }
    finish_record(&mut records, &mut record, &mut field, field_started);
    Ok(records)
}

fn finish_record(
    records: &mut Vec<Vec<String>>,
    record: &mut Vec<String>,
    field: &mut String,
    field_started: bool,
) {
    if record.is_empty() && field.is_empty() && !field_started {
        return;
    }
    record.push(std::mem::take(field));
    records.push(std::mem::take(record));
}

/// Blank names become `Unnamed: N`; repeats get `.1`, `.2`, ... suffixes.
fn dedup_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, name) in raw.into_iter().enumerate() {
        let name = name.trim().to_string();
        let base = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while seen.iter().any(|s| s.eq_ignore_ascii_case(&candidate)) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}

fn parse_int(cell: &str) -> Option<i64> {
    cell.trim().parse::<i64>().ok()
}

fn parse_real(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_bool(cell: &str) -> Option<bool> {
    let cell = cell.trim();
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

fn infer_column<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
    let mut cells = cells.peekable();
    if cells.peek().is_none() {
        return ColumnType::Text;
    }

    if cells.clone().all(|c| parse_int(c).is_some()) {
        ColumnType::Integer
    } else if cells.clone().all(|c| parse_bool(c).is_some()) {
        ColumnType::Boolean
    } else if cells.all(|c| is_blank(c) || parse_real(c).is_some()) {
        ColumnType::Real
    } else {
        ColumnType::Text
    }
}

fn convert_cell(cell: &str, ty: ColumnType) -> CellValue {
    match ty {
        ColumnType::Text => CellValue::Text(cell.to_string()),
        _ if is_blank(cell) => CellValue::Null,
        ColumnType::Integer => parse_int(cell).map_or(CellValue::Null, CellValue::Integer),
        ColumnType::Real => parse_real(cell).map_or(CellValue::Null, CellValue::Real),
        ColumnType::Boolean => {
            parse_bool(cell).map_or(CellValue::Null, |b| CellValue::Integer(i64::from(b)))
        }
    }
}
