//! Core catalog logic for DermaCare.
//! This crate is the single source of truth for catalog invariants and pricing.

pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod pricing;
pub mod query;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use import::{
    import_files, import_sheet, import_sheets, BatchImportReport, ImportError, ImportOptions,
    ImportResult, Sheet, SheetImportReport,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{CatalogItem, PackageRef, PackageType, ProductKind};
pub use pricing::{recalculate_all, CascadeReport, PricingError};
pub use query::{Page, PageRequest, Pagination, QueryError, QueryResult};
pub use repo::{RepoError, RepoResult};
pub use service::{CatalogService, DeletionService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Schema version this build migrates databases to.
pub fn schema_version() -> u32 {
    db::migrations::latest_version()
}
