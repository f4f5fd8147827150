//! Import targets: which file feeds which table, and how.
//!
//! Column affinities and keys are read from the live schema with
//! `PRAGMA table_info`, so sheets are checked against what SQLite will
//! actually store.

use super::ImportResult;
use super::sheet::format_float;
use rusqlite::types::Value;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetLayout {
    Generic,
    Enum,
}

/// One importable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub table: &'static str,
    /// Case-insensitive file name fragment selecting this table.
    pub file_token: &'static str,
    pub layout: SheetLayout,
    pub required: &'static [&'static str],
}

impl TableSpec {
    const fn generic(
        table: &'static str,
        file_token: &'static str,
        required: &'static [&'static str],
    ) -> Self {
        Self {
            table,
            file_token,
            layout: SheetLayout::Generic,
            required,
        }
    }

    /// Tables whose rows carry a `Package_Type` reference.
    pub fn has_package(&self) -> bool {
        matches!(self.table, "Product_Standard" | "Product_Event" | "Membership")
    }

    /// Products must sell something; memberships may not.
    pub fn requires_package(&self) -> bool {
        matches!(self.table, "Product_Standard" | "Product_Event")
    }
}

/// Import targets in dependency order; the first matching token wins.
pub const TABLE_SPECS: &[TableSpec] = &[
    TableSpec {
        table: "Enum",
        file_token: "enum",
        layout: SheetLayout::Enum,
        required: &["Enum_Type", "Code", "Name"],
    },
    TableSpec::generic("Global", "global", &["ID"]),
    TableSpec::generic("Consumables", "consumables", &["ID", "Name", "Release"]),
    TableSpec::generic("Procedure_Class", "procedure_class", &["GroupID", "ID"]),
    TableSpec::generic("Procedure_Element", "procedure_element", &["ID", "Name", "Release"]),
    TableSpec::generic(
        "Procedure_Bundle",
        "procedure_bundle",
        &["ID", "GroupID", "Name", "Element_ID"],
    ),
    TableSpec::generic(
        "Procedure_Custom",
        "procedure_custom",
        &["ID", "GroupID", "Release", "Name", "Element_ID"],
    ),
    TableSpec::generic(
        "Procedure_Sequence",
        "procedure_sequence",
        &["ID", "GroupID", "Step_Num"],
    ),
    TableSpec::generic(
        "Procedure_Info",
        "procedure_info",
        &["ID", "Procedure_ID", "Procedure_Name"],
    ),
    TableSpec::generic("Info_Standard", "info_standard", &["ID"]),
    TableSpec::generic("Info_Event", "info_event", &["ID"]),
    TableSpec::generic(
        "Info_Membership",
        "info_membership",
        &["ID", "Release", "Membership_Name"],
    ),
    TableSpec::generic("Product_Standard", "product_standard", &["ID", "Package_Type"]),
    TableSpec::generic("Product_Event", "product_event", &["ID", "Package_Type"]),
    TableSpec::generic(
        "Membership",
        "membership",
        &["ID", "Release", "Membership_Info_ID", "Payment_Amount"],
    ),
];

pub fn spec_for_file(file_name: &str) -> Option<&'static TableSpec> {
    let file_name = file_name.to_ascii_lowercase();
    TABLE_SPECS
        .iter()
        .find(|spec| file_name.contains(spec.file_token))
}

/// Position of a table in import order; unknown tables sort last.
pub fn import_rank(table: &str) -> usize {
    TABLE_SPECS
        .iter()
        .position(|spec| spec.table == table)
        .unwrap_or(TABLE_SPECS.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    fn from_declared(declared: &str) -> Self {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("INT") {
            Self::Integer
        } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB") {
            Self::Real
        } else {
            Self::Text
        }
    }

    /// Coerces a parsed value so SQLite stores it with this affinity.
    pub fn coerce(self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Integer, Value::Integer(number)) => Ok(Value::Integer(number)),
            (Self::Integer, Value::Real(number)) => Ok(Value::Integer(number.round() as i64)),
            (Self::Integer, Value::Text(text)) => parse_number(&text)
                .map(|number| Value::Integer(number.round() as i64))
                .ok_or_else(|| format!("`{text}` is not a number")),
            (Self::Real, Value::Integer(number)) => Ok(Value::Real(number as f64)),
            (Self::Real, Value::Real(number)) => Ok(Value::Real(number)),
            (Self::Real, Value::Text(text)) => parse_number(&text)
                .map(Value::Real)
                .ok_or_else(|| format!("`{text}` is not a number")),
            (Self::Text, Value::Integer(number)) => Ok(Value::Text(number.to_string())),
            (Self::Text, Value::Real(number)) => Ok(Value::Text(format_float(number))),
            (Self::Text, Value::Text(text)) => Ok(Value::Text(text)),
            (_, Value::Blob(_)) => Err("binary values are not supported".to_string()),
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().replace(',', "").parse::<f64>().ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub affinity: Affinity,
    /// 1-based position in the primary key, 0 when not a key column.
    pub key_position: usize,
}

/// Columns of `table` in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> ImportResult<Vec<TableColumn>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let columns = stmt
        .query_map([], |row| {
            let declared: String = row.get("type")?;
            let key_position: i64 = row.get("pk")?;
            Ok(TableColumn {
                name: row.get("name")?,
                affinity: Affinity::from_declared(&declared),
                key_position: key_position as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Primary key column names in key order.
pub fn key_columns(columns: &[TableColumn]) -> Vec<&str> {
    let mut keys: Vec<&TableColumn> = columns
        .iter()
        .filter(|column| column.key_position > 0)
        .collect();
    keys.sort_by_key(|column| column.key_position);
    keys.into_iter().map(|column| column.name.as_str()).collect()
}
