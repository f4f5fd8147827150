//! Sheet grids and their two layouts.
//!
//! # Responsibility
//! - Load a sheet from its JSON export (an array of rows of
//!   `null | bool | number | string` cells).
//! - Turn the generic four-header-row layout and the enum column layout into
//!   typed rows keyed by DB column name.
//!
//! # Invariants
//! - Fully blank rows are dropped before any header row is located.
//! - Null tokens (`-1`, blanks, `nan`, `none`, `null`, `na`, `n/a`, `nat`,
//!   optionally in angle brackets) become SQL NULL.
//! - Row numbers in messages are 1-based positions in the original grid.

use super::{ImportError, ImportResult};
use crate::model::enums::{code_for_position, EnumType};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use serde::Deserialize;
use std::path::Path;

/// Header rows preceding data in the generic layout.
pub const GENERIC_HEADER_ROWS: usize = 4;
const FLAG_ROW: usize = 1;
const TYPE_ROW: usize = 2;
const NAME_ROW: usize = 3;

static NULL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^<?(nan|none|null|na|n/a|nat)>?$").expect("valid null token regex")
});
static INT_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(big|small|tiny)?int(eger)?\b").expect("valid int type regex"));
static FLOAT_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(float|double|decimal|numeric|real)\b").expect("valid float type regex")
});
static BOOL_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^bool(ean)?\b").expect("valid bool type regex"));

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    fn is_null_token(&self) -> bool {
        match self {
            Self::Int(value) => *value == -1,
            Self::Float(value) => *value == -1.0,
            Self::Text(text) => {
                let text = text.trim();
                text.is_empty() || text == "-1" || NULL_TOKEN_RE.is_match(text)
            }
            Self::Bool(_) => false,
        }
    }

    fn to_text(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => format_float(*value),
            Self::Text(text) => text.trim().to_string(),
        }
    }

    fn to_number(&self) -> Option<f64> {
        match self {
            Self::Bool(value) => Some(f64::from(u8::from(*value))),
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(text) => text.trim().replace(',', "").parse::<f64>().ok(),
        }
    }
}

/// Whole floats print without a fractional part, as spreadsheets show them.
pub(crate) fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Declared column type from the third header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Int,
    Float,
    Bool,
    Text,
}

impl DeclaredType {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if INT_TYPE_RE.is_match(value) {
            Self::Int
        } else if FLOAT_TYPE_RE.is_match(value) {
            Self::Float
        } else if BOOL_TYPE_RE.is_match(value) {
            Self::Bool
        } else {
            Self::Text
        }
    }

    /// Converts one cell; numeric kinds reject text that is not a number.
    fn convert(self, cell: &CellValue) -> Result<Value, String> {
        if cell.is_null_token() {
            return Ok(Value::Null);
        }
        match self {
            Self::Int => cell
                .to_number()
                .map(|number| Value::Integer(number.round() as i64))
                .ok_or_else(|| format!("`{}` is not a number", cell.to_text())),
            Self::Float => cell
                .to_number()
                .map(Value::Real)
                .ok_or_else(|| format!("`{}` is not a number", cell.to_text())),
            Self::Bool => match cell {
                CellValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                    "true" | "y" | "yes" => Ok(Value::Integer(1)),
                    "false" | "n" | "no" => Ok(Value::Integer(0)),
                    _ => cell
                        .to_number()
                        .map(|number| Value::Integer(number.round() as i64))
                        .ok_or_else(|| format!("`{}` is not a boolean", text.trim())),
                },
                _ => Ok(cell
                    .to_number()
                    .map_or(Value::Null, |number| Value::Integer(number.round() as i64))),
            },
            Self::Text => Ok(Value::Text(cell.to_text())),
        }
    }
}

/// A named grid of cells, one inner vector per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Option<CellValue>>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Option<CellValue>>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn from_json_str(name: impl Into<String>, json: &str) -> ImportResult<Self> {
        let name = name.into();
        let rows = serde_json::from_str(json).map_err(|source| ImportError::Json {
            sheet: name.clone(),
            source,
        })?;
        Ok(Self { name, rows })
    }

    /// Loads a JSON sheet; the file name becomes the sheet name.
    pub fn from_json_file(path: impl AsRef<Path>) -> ImportResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_json_str(name, &json)
    }

    /// Non-blank rows paired with their 1-based grid position.
    fn content_rows(&self) -> Vec<(usize, &[Option<CellValue>])> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.iter()
                    .any(|cell| cell.as_ref().is_some_and(|cell| !cell.is_blank()))
            })
            .map(|(index, row)| (index + 1, row.as_slice()))
            .collect()
    }

    fn layout_error(&self, message: impl Into<String>) -> ImportError {
        ImportError::InvalidLayout {
            sheet: self.name.clone(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetColumn {
    pub name: String,
    pub declared: DeclaredType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// 1-based row number in the original grid.
    pub line: usize,
    pub values: Vec<Value>,
}

/// Typed rows of one sheet, ready for validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedSheet {
    pub columns: Vec<SheetColumn>,
    pub rows: Vec<ParsedRow>,
    /// Cells that could not be converted to their declared type.
    pub cell_errors: Vec<String>,
    /// Rows dropped because `Release` was neither 0 nor 1.
    pub skipped_rows: usize,
}

impl ParsedSheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }
}

fn cell_at(row: &[Option<CellValue>], index: usize) -> Option<&CellValue> {
    row.get(index).and_then(Option::as_ref)
}

fn is_use_flag(cell: Option<&CellValue>) -> bool {
    match cell {
        Some(CellValue::Bool(flag)) => *flag,
        Some(CellValue::Int(flag)) => *flag == 1,
        Some(CellValue::Float(flag)) => *flag == 1.0,
        Some(CellValue::Text(flag)) => flag.trim() == "1",
        None => false,
    }
}

/// Parses the generic layout: description, use flag, type and column-name
/// rows, then data.
pub fn parse_generic(sheet: &Sheet) -> ImportResult<ParsedSheet> {
    let rows = sheet.content_rows();
    if rows.len() <= GENERIC_HEADER_ROWS {
        return Err(sheet.layout_error(format!(
            "expected {GENERIC_HEADER_ROWS} header rows and at least one data row, found {} rows",
            rows.len()
        )));
    }

    let flags = rows[FLAG_ROW].1;
    let types = rows[TYPE_ROW].1;
    let names = rows[NAME_ROW].1;
    let width = rows.iter().map(|(_, row)| row.len()).max().unwrap_or(0);

    let mut used = Vec::new();
    let mut columns: Vec<SheetColumn> = Vec::new();
    for index in 0..width {
        if !is_use_flag(cell_at(flags, index)) {
            continue;
        }
        let Some(name) = cell_at(names, index)
            .map(CellValue::to_text)
            .filter(|name| !name.is_empty())
        else {
            continue;
        };
        if columns
            .iter()
            .any(|column| column.name.eq_ignore_ascii_case(&name))
        {
            return Err(sheet.layout_error(format!("column `{name}` appears twice")));
        }
        let declared = cell_at(types, index)
            .map(|cell| DeclaredType::parse(&cell.to_text()))
            .unwrap_or(DeclaredType::Text);
        used.push(index);
        columns.push(SheetColumn { name, declared });
    }
    if columns.is_empty() {
        return Err(sheet.layout_error("no column is flagged for use"));
    }

    let mut parsed = ParsedSheet {
        columns,
        ..ParsedSheet::default()
    };
    for &(line, row) in &rows[GENERIC_HEADER_ROWS..] {
        let mut values = Vec::with_capacity(used.len());
        for (column, &index) in parsed.columns.iter().zip(&used) {
            let value = match cell_at(row, index) {
                None => Value::Null,
                Some(cell) => column.declared.convert(cell).unwrap_or_else(|message| {
                    parsed
                        .cell_errors
                        .push(format!("row {line}, column {}: {message}", column.name));
                    Value::Null
                }),
            };
            values.push(value);
        }
        parsed.rows.push(ParsedRow { line, values });
    }

    if let Some(release) = parsed.column_index("Release") {
        let before = parsed.rows.len();
        parsed
            .rows
            .retain(|row| matches!(row.values[release], Value::Integer(0 | 1)));
        parsed.skipped_rows = before - parsed.rows.len();
    }

    Ok(parsed)
}

/// Parses the enum layout: one enum type per column, values below.
///
/// Produces `Enum_Type`, `Code` and `Name` columns; codes step by ten in
/// column order.
pub fn parse_enum(sheet: &Sheet) -> ImportResult<ParsedSheet> {
    let rows = sheet.content_rows();
    if rows.len() < 2 {
        return Err(sheet.layout_error(format!(
            "expected a header row and at least one value row, found {} rows",
            rows.len()
        )));
    }

    let header = rows[0].1;
    let mut parsed = ParsedSheet {
        columns: vec![
            SheetColumn {
                name: "Enum_Type".to_string(),
                declared: DeclaredType::Text,
            },
            SheetColumn {
                name: "Code".to_string(),
                declared: DeclaredType::Int,
            },
            SheetColumn {
                name: "Name".to_string(),
                declared: DeclaredType::Text,
            },
        ],
        ..ParsedSheet::default()
    };

    for (index, cell) in header.iter().enumerate() {
        let Some(title) = cell
            .as_ref()
            .map(CellValue::to_text)
            .filter(|title| !title.is_empty())
        else {
            continue;
        };
        if title.to_ascii_uppercase().starts_with("ID") {
            continue;
        }
        let enum_type = EnumType::parse(&title).as_str().to_string();

        let names = rows[1..].iter().filter_map(|&(line, row)| {
            cell_at(row, index)
                .filter(|cell| !cell.is_null_token())
                .map(|cell| (line, cell.to_text()))
        });
        for (position, (line, name)) in names.enumerate() {
            parsed.rows.push(ParsedRow {
                line,
                values: vec![
                    Value::Text(enum_type.clone()),
                    Value::Integer(code_for_position(position)),
                    Value::Text(name),
                ],
            });
        }
    }

    if parsed.rows.is_empty() {
        return Err(sheet.layout_error("no enum values found"));
    }
    Ok(parsed)
}
