//! Global rates, consumables and descriptive info rows.
//!
//! # Responsibility
//! - CRUD for the rows procedures and products point at but do not own.
//!
//! # Invariants
//! - `Global` holds exactly one row (`ID = 1`), seeded by migration.

use super::{bool_to_int, parse_release, RepoError, RepoResult};
use crate::db::ensure_catalog_ready;
use crate::model::{Consumable, GlobalSettings, InfoKind, InfoRecord, ProcedureInfo};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub const GLOBAL_SETTINGS_ID: i64 = 1;

const CONSUMABLE_SELECT_SQL: &str = "SELECT
    ID, Release, Name, Description, Unit_Type, I_Value, F_Value,
    Price, Unit_Price, VAT, Taxable_Type, Covered_Type
FROM Consumables";

pub trait ReferenceRepository {
    fn global_settings(&self) -> RepoResult<GlobalSettings>;
    fn update_global_settings(&self, settings: &GlobalSettings) -> RepoResult<()>;

    fn get_consumable(&self, id: i64) -> RepoResult<Option<Consumable>>;
    fn list_consumables(&self, active_only: bool) -> RepoResult<Vec<Consumable>>;
    /// Inserts or replaces the consumable keyed by `ID`.
    fn upsert_consumable(&self, consumable: &Consumable) -> RepoResult<()>;

    fn get_procedure_info(&self, id: i64) -> RepoResult<Option<ProcedureInfo>>;
    fn upsert_procedure_info(&self, info: &ProcedureInfo) -> RepoResult<()>;

    fn get_info(&self, kind: InfoKind, id: i64) -> RepoResult<Option<InfoRecord>>;
    fn list_info(&self, kind: InfoKind) -> RepoResult<Vec<InfoRecord>>;
    fn upsert_info(&self, info: &InfoRecord) -> RepoResult<()>;
}

pub struct SqliteReferenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReferenceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ReferenceRepository for SqliteReferenceRepository<'_> {
    fn global_settings(&self) -> RepoResult<GlobalSettings> {
        let settings = self
            .conn
            .query_row(
                "SELECT ID, Doc_Price_Minute, Aesthetician_Price_Minute
                 FROM Global
                 WHERE ID = ?1;",
                [GLOBAL_SETTINGS_ID],
                |row| {
                    Ok(GlobalSettings {
                        id: row.get(0)?,
                        doc_price_minute: row.get(1)?,
                        aesthetician_price_minute: row.get(2)?,
                    })
                },
            )
            .optional()?;
        settings.ok_or_else(|| {
            RepoError::InvalidData("Global settings row is missing".to_string())
        })
    }

    fn update_global_settings(&self, settings: &GlobalSettings) -> RepoResult<()> {
        settings.validate()?;
        self.conn.execute(
            "INSERT INTO Global (ID, Doc_Price_Minute, Aesthetician_Price_Minute)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (ID) DO UPDATE SET
                Doc_Price_Minute = excluded.Doc_Price_Minute,
                Aesthetician_Price_Minute = excluded.Aesthetician_Price_Minute;",
            params![
                GLOBAL_SETTINGS_ID,
                settings.doc_price_minute,
                settings.aesthetician_price_minute
            ],
        )?;
        Ok(())
    }

    fn get_consumable(&self, id: i64) -> RepoResult<Option<Consumable>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CONSUMABLE_SELECT_SQL} WHERE ID = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_consumable_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_consumables(&self, active_only: bool) -> RepoResult<Vec<Consumable>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONSUMABLE_SELECT_SQL} WHERE (?1 = 0 OR Release = 1) ORDER BY ID ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut consumables = Vec::new();
        while let Some(row) = rows.next()? {
            consumables.push(parse_consumable_row(row)?);
        }
        Ok(consumables)
    }

    fn upsert_consumable(&self, consumable: &Consumable) -> RepoResult<()> {
        consumable.validate()?;
        self.conn.execute(
            "INSERT INTO Consumables (
                ID, Release, Name, Description, Unit_Type, I_Value, F_Value,
                Price, Unit_Price, VAT, Taxable_Type, Covered_Type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (ID) DO UPDATE SET
                Release = excluded.Release,
                Name = excluded.Name,
                Description = excluded.Description,
                Unit_Type = excluded.Unit_Type,
                I_Value = excluded.I_Value,
                F_Value = excluded.F_Value,
                Price = excluded.Price,
                Unit_Price = excluded.Unit_Price,
                VAT = excluded.VAT,
                Taxable_Type = excluded.Taxable_Type,
                Covered_Type = excluded.Covered_Type;",
            params![
                consumable.id,
                bool_to_int(consumable.release),
                consumable.name.trim(),
                consumable.description.as_deref(),
                consumable.unit_type.as_deref(),
                consumable.i_value,
                consumable.f_value,
                consumable.price,
                consumable.unit_price,
                consumable.vat,
                consumable.taxable_type.as_deref(),
                consumable.covered_type.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get_procedure_info(&self, id: i64) -> RepoResult<Option<ProcedureInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT ID, Release, Procedure_ID, Procedure_Name, Procedure_Description, Precautions
             FROM Procedure_Info
             WHERE ID = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(ProcedureInfo {
            id: row.get("ID")?,
            release: parse_release(row, "Procedure_Info")?,
            procedure_id: row.get("Procedure_ID")?,
            procedure_name: row.get("Procedure_Name")?,
            procedure_description: row.get("Procedure_Description")?,
            precautions: row.get("Precautions")?,
        }))
    }

    fn upsert_procedure_info(&self, info: &ProcedureInfo) -> RepoResult<()> {
        info.validate()?;
        self.conn.execute(
            "INSERT INTO Procedure_Info (
                ID, Release, Procedure_ID, Procedure_Name, Procedure_Description, Precautions
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (ID) DO UPDATE SET
                Release = excluded.Release,
                Procedure_ID = excluded.Procedure_ID,
                Procedure_Name = excluded.Procedure_Name,
                Procedure_Description = excluded.Procedure_Description,
                Precautions = excluded.Precautions;",
            params![
                info.id,
                bool_to_int(info.release),
                info.procedure_id,
                info.procedure_name.as_deref(),
                info.procedure_description.as_deref(),
                info.precautions.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get_info(&self, kind: InfoKind, id: i64) -> RepoResult<Option<InfoRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE ID = ?1;", info_select_sql(kind)))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_info_row(row, kind)?)),
            None => Ok(None),
        }
    }

    fn list_info(&self, kind: InfoKind) -> RepoResult<Vec<InfoRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY ID ASC;", info_select_sql(kind)))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_info_row(row, kind)?);
        }
        Ok(records)
    }

    fn upsert_info(&self, info: &InfoRecord) -> RepoResult<()> {
        info.validate()?;
        let table = info.kind.table();
        let name = info.kind.name_column();
        let description = info.kind.description_column();
        self.conn.execute(
            &format!(
                "INSERT INTO {table} (ID, Release, {name}, {description}, Precautions)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (ID) DO UPDATE SET
                    Release = excluded.Release,
                    {name} = excluded.{name},
                    {description} = excluded.{description},
                    Precautions = excluded.Precautions;"
            ),
            params![
                info.id,
                bool_to_int(info.release),
                info.name.as_deref(),
                info.description.as_deref(),
                info.precautions.as_deref(),
            ],
        )?;
        Ok(())
    }
}

fn info_select_sql(kind: InfoKind) -> String {
    format!(
        "SELECT ID, Release, {} AS Name, {} AS Description, Precautions FROM {}",
        kind.name_column(),
        kind.description_column(),
        kind.table()
    )
}

fn parse_info_row(row: &Row<'_>, kind: InfoKind) -> RepoResult<InfoRecord> {
    Ok(InfoRecord {
        kind,
        id: row.get("ID")?,
        release: parse_release(row, kind.table())?,
        name: row.get("Name")?,
        description: row.get("Description")?,
        precautions: row.get("Precautions")?,
    })
}

fn parse_consumable_row(row: &Row<'_>) -> RepoResult<Consumable> {
    let consumable = Consumable {
        id: row.get("ID")?,
        release: parse_release(row, "Consumables")?,
        name: row.get("Name")?,
        description: row.get("Description")?,
        unit_type: row.get("Unit_Type")?,
        i_value: row.get("I_Value")?,
        f_value: row.get("F_Value")?,
        price: row.get("Price")?,
        unit_price: row.get("Unit_Price")?,
        vat: row.get("VAT")?,
        taxable_type: row.get("Taxable_Type")?,
        covered_type: row.get("Covered_Type")?,
    };
    Ok(consumable)
}
