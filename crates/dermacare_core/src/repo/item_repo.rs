//! Item-level operations shared by every catalog table.
//!
//! # Responsibility
//! - Existence checks, `Release` toggles and hard deletes keyed by
//!   [`CatalogItem`].
//! - Reverse lookups: which rows point at an item.
//!
//! # Invariants
//! - Product and membership rows referencing an item are reported as
//!   critical; procedure-internal references are not.
//! - Package references are matched on both `Package_Type` and the id column,
//!   so a bundle group never collides with an element of the same id.
//! - Deleting a priced item reprices the catalog in the same transaction, so
//!   no stored cost keeps counting rows that are gone.

use super::{bool_to_int, RepoError, RepoResult};
use crate::db::ensure_catalog_ready;
use crate::model::{CatalogItem, PackageType, ProductKind};
use crate::pricing::{recalculate_all_in_tx, PricingError};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

/// A row that points at the checked item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReference {
    pub table: &'static str,
    pub id: i64,
    pub column: &'static str,
    pub critical: bool,
}

pub trait ItemRepository {
    fn exists(&self, item: CatalogItem) -> RepoResult<bool>;
    /// Sets `Release` on every row of the item; `NotFound` if none exist.
    fn set_release(&self, item: CatalogItem, active: bool) -> RepoResult<usize>;
    fn find_references(&self, item: CatalogItem) -> RepoResult<Vec<ItemReference>>;
    /// Deletes the item's rows. Referrers not covered by a foreign key are
    /// deactivated instead of being left pointing at nothing, and stored
    /// costs are recomputed when the item was priced.
    fn delete(&self, item: CatalogItem) -> RepoResult<usize>;
}

pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_ready(conn)?;
        Ok(Self { conn })
    }
}

struct ReferenceQuery {
    table: &'static str,
    column: &'static str,
    /// Required `Package_Type` when `column` is a package id column.
    package_type: Option<PackageType>,
    critical: bool,
    /// No foreign key covers the column, so a forced delete leaves it dangling.
    unenforced: bool,
}

impl ReferenceQuery {
    const fn plain(table: &'static str, column: &'static str) -> Self {
        Self {
            table,
            column,
            package_type: None,
            critical: false,
            unenforced: false,
        }
    }

    /// Sequence steps pointing at a bundle or custom group id.
    const fn group_step(column: &'static str) -> Self {
        Self {
            table: "Procedure_Sequence",
            column,
            package_type: None,
            critical: false,
            unenforced: true,
        }
    }

    const fn sellable(table: &'static str, column: &'static str) -> Self {
        Self {
            table,
            column,
            package_type: None,
            critical: true,
            unenforced: false,
        }
    }

    fn package(table: &'static str, package_type: PackageType) -> Self {
        Self {
            table,
            column: package_type.id_column(),
            package_type: Some(package_type),
            critical: true,
            unenforced: true,
        }
    }

    fn select_sql(&self) -> String {
        match self.package_type {
            Some(_) => format!(
                "SELECT ID FROM {} WHERE Package_Type = ?2 AND {} = ?1 ORDER BY ID ASC;",
                self.table, self.column
            ),
            None => format!(
                "SELECT ID FROM {} WHERE {} = ?1 ORDER BY ID ASC;",
                self.table, self.column
            ),
        }
    }
}

fn sellable_package_queries(package_type: PackageType) -> Vec<ReferenceQuery> {
    vec![
        ReferenceQuery::package(ProductKind::Standard.table(), package_type),
        ReferenceQuery::package(ProductKind::Event.table(), package_type),
        ReferenceQuery::package("Membership", package_type),
    ]
}

fn reference_queries(item: CatalogItem) -> Vec<ReferenceQuery> {
    match item {
        CatalogItem::Element(_) => {
            let mut queries = vec![
                ReferenceQuery::plain("Procedure_Bundle", "Element_ID"),
                ReferenceQuery::plain("Procedure_Custom", "Element_ID"),
                ReferenceQuery::plain("Procedure_Sequence", "Element_ID"),
            ];
            queries.extend(sellable_package_queries(PackageType::Element));
            queries
        }
        CatalogItem::BundleGroup(_) => {
            let mut queries = vec![ReferenceQuery::group_step("Bundle_ID")];
            queries.extend(sellable_package_queries(PackageType::Bundle));
            queries
        }
        CatalogItem::CustomGroup(_) => {
            let mut queries = vec![ReferenceQuery::group_step("Custom_ID")];
            queries.extend(sellable_package_queries(PackageType::Custom));
            queries
        }
        CatalogItem::SequenceGroup(_) => sellable_package_queries(PackageType::Sequence),
        CatalogItem::Consumable(_) => {
            vec![ReferenceQuery::plain("Procedure_Element", "Consum_1_ID")]
        }
        CatalogItem::StandardInfo(_) => vec![ReferenceQuery::sellable(
            ProductKind::Standard.table(),
            ProductKind::Standard.info_column(),
        )],
        CatalogItem::EventInfo(_) => vec![ReferenceQuery::sellable(
            ProductKind::Event.table(),
            ProductKind::Event.info_column(),
        )],
        CatalogItem::MembershipInfo(_) => {
            vec![ReferenceQuery::sellable("Membership", "Membership_Info_ID")]
        }
        CatalogItem::ProcedureInfo(_)
        | CatalogItem::StandardProduct(_)
        | CatalogItem::EventProduct(_)
        | CatalogItem::Membership(_) => Vec::new(),
    }
}

/// References paired with whether a forced delete must deactivate them.
fn collect_references(
    conn: &Connection,
    item: CatalogItem,
) -> RepoResult<Vec<(ItemReference, bool)>> {
    let mut references = Vec::new();
    for query in reference_queries(item) {
        let mut stmt = conn.prepare(&query.select_sql())?;
        let ids = match query.package_type {
            Some(package_type) => stmt
                .query_map(rusqlite::params![item.id(), package_type.label()], |row| {
                    row.get::<_, i64>(0)
                })?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([item.id()], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?,
        };
        references.extend(ids.into_iter().map(|id| {
            let reference = ItemReference {
                table: query.table,
                id,
                column: query.column,
                critical: query.critical,
            };
            (reference, query.unenforced)
        }));
    }
    Ok(references)
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn exists(&self, item: CatalogItem) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
                item.table(),
                item.key_column()
            ),
            [item.id()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn set_release(&self, item: CatalogItem, active: bool) -> RepoResult<usize> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET Release = ?1 WHERE {} = ?2;",
                item.table(),
                item.key_column()
            ),
            [bool_to_int(active), item.id()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(item));
        }
        Ok(changed)
    }

    fn find_references(&self, item: CatalogItem) -> RepoResult<Vec<ItemReference>> {
        let references = collect_references(self.conn, item)?;
        Ok(references.into_iter().map(|(reference, _)| reference).collect())
    }

    fn delete(&self, item: CatalogItem) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        for (reference, _) in collect_references(&tx, item)?
            .into_iter()
            .filter(|(_, unenforced)| *unenforced)
        {
            tx.execute(
                &format!("UPDATE {} SET Release = 0 WHERE ID = ?1;", reference.table),
                [reference.id],
            )?;
        }

        let deleted = tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1;",
                item.table(),
                item.key_column()
            ),
            [item.id()],
        )?;
        if deleted == 0 {
            return Err(RepoError::NotFound(item));
        }
        if item.affects_costs() {
            recalculate_all_in_tx(&tx).map_err(|err| match err {
                PricingError::Repo(err) => err,
                PricingError::Db(err) => RepoError::Db(err),
            })?;
        }

        tx.commit()?;
        Ok(deleted)
    }
}
