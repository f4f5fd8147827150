//! Enum lookup repository.

use super::{RepoError, RepoResult};
use crate::db::ensure_catalog_ready;
use crate::model::{EnumCode, EnumType};
use rusqlite::{params, Connection, Row};

pub trait EnumRepository {
    /// Codes ordered by type then code; `None` lists every type.
    fn list_codes(&self, enum_type: Option<&EnumType>) -> RepoResult<Vec<EnumCode>>;
    fn get_code(&self, enum_type: &EnumType, code: i64) -> RepoResult<Option<EnumCode>>;
    /// Resolves a display name back to its code.
    fn resolve_name(&self, enum_type: &EnumType, name: &str) -> RepoResult<Option<i64>>;
    fn upsert_code(&self, code: &EnumCode) -> RepoResult<()>;
    fn list_types(&self) -> RepoResult<Vec<EnumType>>;
}

pub struct SqliteEnumRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEnumRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EnumRepository for SqliteEnumRepository<'_> {
    fn list_codes(&self, enum_type: Option<&EnumType>) -> RepoResult<Vec<EnumCode>> {
        let mut stmt = self.conn.prepare(
            "SELECT Enum_Type, Code, Name
             FROM Enum
             WHERE ?1 IS NULL OR Enum_Type = ?1
             ORDER BY Enum_Type ASC, Code ASC;",
        )?;
        let rows = stmt.query_map([enum_type.map(EnumType::as_str)], parse_enum_row)?;
        let codes = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    fn get_code(&self, enum_type: &EnumType, code: i64) -> RepoResult<Option<EnumCode>> {
        let mut stmt = self.conn.prepare(
            "SELECT Enum_Type, Code, Name
             FROM Enum
             WHERE Enum_Type = ?1 AND Code = ?2;",
        )?;
        let mut rows = stmt.query(params![enum_type.as_str(), code])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_enum_row(row)?)),
            None => Ok(None),
        }
    }

    fn resolve_name(&self, enum_type: &EnumType, name: &str) -> RepoResult<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT Code FROM Enum WHERE Enum_Type = ?1 AND Name = ?2;")?;
        let mut rows = stmt.query(params![enum_type.as_str(), name.trim()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn upsert_code(&self, code: &EnumCode) -> RepoResult<()> {
        if code.name.trim().is_empty() {
            return Err(RepoError::Validation(
                crate::model::ValidationError::EmptyField("Name"),
            ));
        }
        self.conn.execute(
            "INSERT INTO Enum (Enum_Type, Code, Name)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (Enum_Type, Code) DO UPDATE SET Name = excluded.Name;",
            params![code.enum_type.as_str(), code.code, code.name.trim()],
        )?;
        Ok(())
    }

    fn list_types(&self) -> RepoResult<Vec<EnumType>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT Enum_Type FROM Enum ORDER BY Enum_Type ASC;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut types = Vec::new();
        for name in rows {
            types.push(EnumType::parse(&name?));
        }
        Ok(types)
    }
}

fn parse_enum_row(row: &Row<'_>) -> rusqlite::Result<EnumCode> {
    let enum_type: String = row.get("Enum_Type")?;
    Ok(EnumCode {
        enum_type: EnumType::parse(&enum_type),
        code: row.get("Code")?,
        name: row.get("Name")?,
    })
}
