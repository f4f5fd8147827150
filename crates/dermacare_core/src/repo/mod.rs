//! Repository contracts and SQLite implementations for the catalog tables.
//!
//! # Responsibility
//! - Define data access contracts per catalog area.
//! - Isolate SQLite details from pricing and service orchestration.
//!
//! # Invariants
//! - Write paths call the model's `validate()` before SQL mutations.
//! - Read paths reject invalid persisted state (bad `Release` flags, broken
//!   package columns) instead of masking it.
//! - Repositories are built with `try_new`, which refuses unmigrated
//!   connections.

use crate::db::DbError;
use crate::model::{CatalogItem, PackageRefError, ValidationError};
use rusqlite::Row;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod enum_repo;
pub mod item_repo;
pub mod procedure_repo;
pub mod product_repo;
pub mod reference_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(CatalogItem),
    /// Create was called for a key that is already taken.
    AlreadyExists(CatalogItem),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(item) => write!(f, "catalog item not found: {item}"),
            Self::AlreadyExists(item) => write!(f, "catalog item already exists: {item}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::AlreadyExists(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<PackageRefError> for RepoError {
    fn from(value: PackageRefError) -> Self {
        Self::Validation(ValidationError::Package(value))
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn parse_release(row: &Row<'_>, table: &str) -> RepoResult<bool> {
    match row.get::<_, i64>("Release")? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid Release value `{other}` in {table}.Release"
        ))),
    }
}

/// Next free `ID` (or `GroupID`) in `table`, starting at 1.
pub(crate) fn next_id(conn: &rusqlite::Connection, table: &str, column: &str) -> RepoResult<i64> {
    let next: i64 = conn.query_row(
        &format!("SELECT COALESCE(MAX({column}), 0) + 1 FROM {table};"),
        [],
        |row| row.get(0),
    )?;
    Ok(next)
}
