//! Catalog schema readiness checks.
//!
//! Repositories borrow connections they did not open. Before issuing SQL they
//! confirm the connection is migrated and carries the columns they rely on.

use super::migrations::latest_version;
use super::{DbError, DbResult};
use rusqlite::Connection;

/// Every table created by the catalog migrations, in dependency order.
pub const CATALOG_TABLES: &[&str] = &[
    "Enum",
    "Global",
    "Consumables",
    "Procedure_Class",
    "Procedure_Element",
    "Procedure_Bundle",
    "Procedure_Custom",
    "Procedure_Sequence",
    "Procedure_Info",
    "Info_Standard",
    "Info_Event",
    "Info_Membership",
    "Product_Standard",
    "Product_Event",
    "Membership",
];

const KEY_COLUMNS: &[(&str, &[&str])] = &[
    ("Enum", &["Enum_Type", "Code", "Name"]),
    ("Global", &["ID", "Doc_Price_Minute", "Aesthetician_Price_Minute"]),
    ("Procedure_Element", &["ID", "Release", "Name", "Procedure_Cost"]),
    ("Procedure_Sequence", &["GroupID", "Step_Num", "Element_ID", "Bundle_ID", "Custom_ID"]),
    ("Product_Standard", &["Package_Type", "Standard_Info_ID", "Sell_Price"]),
    ("Product_Event", &["Package_Type", "Event_Info_ID", "Sell_Price"]),
    ("Membership", &["Membership_Info_ID", "Package_Type"]),
];

/// Fails unless `conn` is migrated to the latest catalog schema.
pub fn ensure_catalog_ready(conn: &Connection) -> DbResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(DbError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in CATALOG_TABLES {
        if !table_exists(conn, table)? {
            return Err(DbError::MissingTable(table));
        }
    }

    for &(table, columns) in KEY_COLUMNS {
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(DbError::MissingColumn { table, column });
            }
        }
    }

    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
