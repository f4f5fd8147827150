//! Sheet validation and table replacement.
//!
//! # Invariants
//! - A sheet is written only when every row validates; otherwise nothing is
//!   touched.
//! - Writes run in one immediate transaction with deferred foreign keys, so
//!   rows may arrive in any order within a sheet.
//! - Rows keep their identity: sheet rows are upserted by primary key and only
//!   keys absent from the sheet are deleted, which keeps cascades from firing
//!   on rows that survive the import.

use super::sheet::ParsedSheet;
use super::table::{key_columns, table_columns, SheetLayout, TableColumn, TableSpec};
use super::{ImportError, ImportResult};
use crate::model::{PackageRef, StepTarget};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Validated rows in table column names, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedSheet {
    pub table: &'static str,
    pub columns: Vec<String>,
    pub keys: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub skipped_columns: Vec<String>,
    /// Clear the table before inserting instead of upserting.
    pub replace_all: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WriteCounts {
    pub written: usize,
    pub deleted: usize,
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

fn json_value(value: &Value) -> JsonValue {
    match value {
        Value::Integer(number) => JsonValue::from(*number),
        Value::Real(number) => JsonValue::from(*number),
        Value::Text(text) => JsonValue::from(text.as_str()),
        Value::Null | Value::Blob(_) => JsonValue::Null,
    }
}

struct RowView<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl RowView<'_> {
    fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|index| &self.values[index])
    }

    fn integer(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(Value::Integer(number)) => Some(*number),
            _ => None,
        }
    }

    fn text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            Some(Value::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Maps sheet columns onto the table and validates every row.
pub(crate) fn prepare(
    conn: &Connection,
    spec: &TableSpec,
    parsed: ParsedSheet,
) -> ImportResult<PreparedSheet> {
    let table_cols = table_columns(conn, spec.table)?;
    let keys: Vec<String> = key_columns(&table_cols)
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut mapping: Vec<(usize, &TableColumn)> = Vec::new();
    let mut skipped_columns = Vec::new();
    for (index, column) in parsed.columns.iter().enumerate() {
        match table_cols
            .iter()
            .find(|candidate| candidate.name.eq_ignore_ascii_case(&column.name))
        {
            Some(target) => mapping.push((index, target)),
            None => skipped_columns.push(column.name.clone()),
        }
    }
    let columns: Vec<String> = mapping
        .iter()
        .map(|(_, column)| column.name.clone())
        .collect();

    let mut errors = parsed.cell_errors;
    for required in spec.required.iter().copied().chain(keys.iter().map(String::as_str)) {
        let present = columns.iter().any(|name| name == required);
        let message = format!("missing required column `{required}`");
        if !present && !errors.contains(&message) {
            errors.push(message);
        }
    }
    if parsed.rows.is_empty() {
        errors.push("sheet has no data rows".to_string());
    }
    if !errors.is_empty() {
        return Err(validation(spec, errors));
    }

    let key_indexes: Vec<usize> = keys
        .iter()
        .filter_map(|key| columns.iter().position(|name| name == key))
        .collect();
    let package_type_index = columns.iter().position(|name| name == "Package_Type");

    let mut seen_keys: HashMap<Vec<String>, usize> = HashMap::new();
    let mut rows = Vec::with_capacity(parsed.rows.len());
    for row in parsed.rows {
        let line = row.line;
        let mut values = Vec::with_capacity(mapping.len());
        for &(index, column) in &mapping {
            let raw = row.values[index].clone();
            match column.affinity.coerce(raw) {
                Ok(value) => values.push(value),
                Err(message) => {
                    errors.push(format!("row {line}, column {}: {message}", column.name));
                    values.push(Value::Null);
                }
            }
        }

        let key: Vec<String> = key_indexes
            .iter()
            .map(|&index| display_value(&values[index]))
            .collect();
        if key_indexes
            .iter()
            .any(|&index| values[index] == Value::Null)
        {
            errors.push(format!("row {line}: key ({}) must not be empty", keys.join(", ")));
        } else if let Some(first) = seen_keys.insert(key.clone(), line) {
            errors.push(format!(
                "row {line}: duplicate key ({}) = ({}), first seen on row {first}",
                keys.join(", "),
                key.join(", ")
            ));
        }

        let view = RowView {
            columns: &columns,
            values: &values,
        };
        let mut package_label = None;
        if spec.has_package() {
            match check_package(&view, spec.requires_package()) {
                Ok(package) => package_label = package.map(|package| package.package_type().label()),
                Err(message) => errors.push(format!("row {line}: {message}")),
            }
        }
        if spec.table == "Procedure_Sequence" && !has_single_step_target(&view) {
            errors.push(format!(
                "row {line}: a sequence step needs exactly one of Element_ID, Bundle_ID, Custom_ID"
            ));
        }

        if let (Some(index), Some(label)) = (package_type_index, package_label) {
            values[index] = Value::Text(label.to_string());
        }
        rows.push(values);
    }

    if !errors.is_empty() {
        return Err(validation(spec, errors));
    }

    Ok(PreparedSheet {
        table: spec.table,
        columns,
        keys,
        rows,
        skipped_columns,
        replace_all: spec.layout == SheetLayout::Enum,
    })
}

fn validation(spec: &TableSpec, errors: Vec<String>) -> ImportError {
    ImportError::Validation {
        table: spec.table,
        errors,
    }
}

fn check_package(view: &RowView<'_>, required: bool) -> Result<Option<PackageRef>, String> {
    let package = PackageRef::from_columns(
        view.text("Package_Type"),
        view.integer("Element_ID"),
        view.integer("Bundle_ID"),
        view.integer("Custom_ID"),
        view.integer("Sequence_ID"),
    )
    .map_err(|err| err.to_string())?;
    if package.is_none() && required {
        return Err("Package_Type and its id column are required".to_string());
    }
    Ok(package)
}

fn has_single_step_target(view: &RowView<'_>) -> bool {
    StepTarget::from_columns(
        view.integer("Element_ID"),
        view.integer("Bundle_ID"),
        view.integer("Custom_ID"),
    )
    .is_some()
}

fn upsert_sql(sheet: &PreparedSheet) -> String {
    let placeholders = vec!["?"; sheet.columns.len()].join(", ");
    let updates: Vec<String> = sheet
        .columns
        .iter()
        .filter(|column| !sheet.keys.contains(column))
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {table} ({columns}) VALUES ({placeholders})
         ON CONFLICT ({keys}) {conflict};",
        table = sheet.table,
        columns = sheet.columns.join(", "),
        keys = sheet.keys.join(", "),
    )
}

fn delete_missing_sql(sheet: &PreparedSheet) -> String {
    let extracts: Vec<String> = (0..sheet.keys.len())
        .map(|index| format!("json_extract(value, '$[{index}]')"))
        .collect();
    let target = if sheet.keys.len() == 1 {
        sheet.keys[0].clone()
    } else {
        format!("({})", sheet.keys.join(", "))
    };
    format!(
        "DELETE FROM {table} WHERE {target} NOT IN (SELECT {extracts} FROM json_each(?1));",
        table = sheet.table,
        extracts = extracts.join(", "),
    )
}

fn key_list(sheet: &PreparedSheet) -> JsonValue {
    let indexes: Vec<usize> = sheet
        .keys
        .iter()
        .filter_map(|key| sheet.columns.iter().position(|column| column == key))
        .collect();
    JsonValue::Array(
        sheet
            .rows
            .iter()
            .map(|row| JsonValue::Array(indexes.iter().map(|&index| json_value(&row[index])).collect()))
            .collect(),
    )
}

/// Makes the table hold exactly the sheet's rows.
pub(crate) fn write(conn: &Connection, sheet: &PreparedSheet) -> ImportResult<WriteCounts> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;

    let deleted = if sheet.replace_all {
        tx.execute(&format!("DELETE FROM {};", sheet.table), [])?
    } else {
        tx.execute(&delete_missing_sql(sheet), [key_list(sheet)])?
    };

    let mut written = 0;
    {
        let mut stmt = tx.prepare(&upsert_sql(sheet))?;
        for row in &sheet.rows {
            written += stmt.execute(params_from_iter(row.iter()))?;
        }
    }

    tx.commit()?;
    Ok(WriteCounts { written, deleted })
}
