//! Bulk import of catalog sheets.
//!
//! # Responsibility
//! - Select the target table from a sheet's file name, parse its layout,
//!   validate it against the live schema and replace the table contents.
//! - Run a batch of sheets in dependency order and report per sheet.
//!
//! # Invariants
//! - A failing sheet leaves its table untouched; later sheets still run.
//! - The pricing cascade, when requested, runs once after all sheets.

use crate::db::DbError;
use crate::pricing::{recalculate_all, CascadeReport, PricingError};
use log::{error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub mod sheet;
pub mod table;
mod writer;

pub use sheet::{parse_enum, parse_generic, CellValue, DeclaredType, ParsedSheet, Sheet};
pub use table::{spec_for_file, SheetLayout, TableSpec, TABLE_SPECS};

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug)]
pub enum ImportError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        sheet: String,
        source: serde_json::Error,
    },
    UnsupportedFile(String),
    InvalidLayout {
        sheet: String,
        message: String,
    },
    /// Row and column problems; nothing was written.
    Validation {
        table: &'static str,
        errors: Vec<String>,
    },
    Db(DbError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read `{}`: {source}", path.display()),
            Self::Json { sheet, source } => write!(f, "sheet `{sheet}` is not valid JSON: {source}"),
            Self::UnsupportedFile(name) => {
                write!(f, "file `{name}` does not match any catalog table")
            }
            Self::InvalidLayout { sheet, message } => {
                write!(f, "sheet `{sheet}` has an invalid layout: {message}")
            }
            Self::Validation { table, errors } => {
                write!(f, "{} validation error(s) for table {table}", errors.len())
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ImportError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Run the full pricing cascade after the batch.
    pub recalculate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetImportReport {
    pub success: bool,
    pub table_name: Option<String>,
    pub filename: String,
    pub total_rows: usize,
    pub inserted_count: usize,
    pub deleted_count: usize,
    pub skipped_rows: usize,
    pub skipped_columns: Vec<String>,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl SheetImportReport {
    fn failure(filename: &str, table: Option<&str>, err: &ImportError) -> Self {
        let errors = match err {
            ImportError::Validation { errors, .. } => errors.clone(),
            other => vec![other.to_string()],
        };
        Self {
            success: false,
            table_name: table.map(str::to_string),
            filename: filename.to_string(),
            total_rows: 0,
            inserted_count: 0,
            deleted_count: 0,
            skipped_rows: 0,
            skipped_columns: Vec::new(),
            error_count: errors.len(),
            errors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchImportReport {
    pub status: BatchStatus,
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub results: Vec<SheetImportReport>,
    pub errors: Vec<String>,
    pub cascade: Option<CascadeReport>,
}

/// Imports one sheet into the table its name selects.
pub fn import_sheet(conn: &Connection, sheet: &Sheet) -> ImportResult<SheetImportReport> {
    let spec = spec_for_file(&sheet.name)
        .ok_or_else(|| ImportError::UnsupportedFile(sheet.name.clone()))?;
    let started_at = Instant::now();
    info!(
        "event=sheet_import module=import status=start table={} file={}",
        spec.table, sheet.name
    );

    let result = parse_and_write(conn, spec, sheet);
    match &result {
        Ok(report) => info!(
            "event=sheet_import module=import status=ok table={} rows={} written={} deleted={} duration_ms={}",
            spec.table,
            report.total_rows,
            report.inserted_count,
            report.deleted_count,
            started_at.elapsed().as_millis()
        ),
        Err(ImportError::Validation { errors, .. }) => warn!(
            "event=sheet_import module=import status=rejected table={} errors={}",
            spec.table,
            errors.len()
        ),
        Err(err) => error!(
            "event=sheet_import module=import status=error table={} error={err}",
            spec.table
        ),
    }
    result
}

fn parse_and_write(
    conn: &Connection,
    spec: &'static TableSpec,
    sheet: &Sheet,
) -> ImportResult<SheetImportReport> {
    let parsed = match spec.layout {
        SheetLayout::Generic => parse_generic(sheet)?,
        SheetLayout::Enum => parse_enum(sheet)?,
    };
    let skipped_rows = parsed.skipped_rows;
    let prepared = writer::prepare(conn, spec, parsed)?;
    let counts = writer::write(conn, &prepared)?;

    Ok(SheetImportReport {
        success: true,
        table_name: Some(spec.table.to_string()),
        filename: sheet.name.clone(),
        total_rows: prepared.rows.len(),
        inserted_count: counts.written,
        deleted_count: counts.deleted,
        skipped_rows,
        skipped_columns: prepared.skipped_columns,
        error_count: 0,
        errors: Vec::new(),
    })
}

/// Imports sheets in dependency order, continuing past failures.
pub fn import_sheets(conn: &Connection, sheets: &[Sheet], options: ImportOptions) -> BatchImportReport {
    finish_batch(conn, run_sheets(conn, sheets), options)
}

fn run_sheets(conn: &Connection, sheets: &[Sheet]) -> Vec<SheetImportReport> {
    let mut ordered: Vec<&Sheet> = sheets.iter().collect();
    ordered.sort_by_key(|sheet| {
        spec_for_file(&sheet.name).map_or(TABLE_SPECS.len(), |spec| table::import_rank(spec.table))
    });

    ordered
        .into_iter()
        .map(|sheet| {
            import_sheet(conn, sheet).unwrap_or_else(|err| {
                let table = spec_for_file(&sheet.name).map(|spec| spec.table);
                SheetImportReport::failure(&sheet.name, table, &err)
            })
        })
        .collect()
}

/// Loads JSON sheets from disk and imports them as one batch.
///
/// Files that cannot be read are reported as failed sheets.
pub fn import_files<P: AsRef<Path>>(
    conn: &Connection,
    paths: &[P],
    options: ImportOptions,
) -> BatchImportReport {
    let mut sheets = Vec::new();
    let mut load_failures = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match Sheet::from_json_file(path) {
            Ok(sheet) => sheets.push(sheet),
            Err(err) => {
                let filename = path
                    .file_name()
                    .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
                let table = spec_for_file(&filename).map(|spec| spec.table);
                load_failures.push(SheetImportReport::failure(&filename, table, &err));
            }
        }
    }

    let mut results = run_sheets(conn, &sheets);
    results.extend(load_failures);
    finish_batch(conn, results, options)
}

fn finish_batch(
    conn: &Connection,
    results: Vec<SheetImportReport>,
    options: ImportOptions,
) -> BatchImportReport {
    let successful_files = results.iter().filter(|result| result.success).count();
    let failed_files = results.len() - successful_files;
    let mut errors: Vec<String> = results
        .iter()
        .filter(|result| !result.success)
        .flat_map(|result| {
            result
                .errors
                .iter()
                .map(move |message| format!("{}: {message}", result.filename))
        })
        .collect();

    let mut cascade = None;
    if options.recalculate && successful_files > 0 {
        match recalculate_all(conn) {
            Ok(report) => cascade = Some(report),
            Err(err) => errors.push(format!("pricing cascade failed: {}", describe(&err))),
        }
    }

    let status = if failed_files == 0 {
        BatchStatus::Success
    } else if successful_files == 0 {
        BatchStatus::Failed
    } else {
        BatchStatus::Partial
    };
    BatchImportReport {
        status,
        total_files: results.len(),
        successful_files,
        failed_files,
        results,
        errors,
        cascade,
    }
}

fn describe(err: &PricingError) -> String {
    match err.source() {
        Some(source) => format!("{err} ({source})"),
        None => err.to_string(),
    }
}
