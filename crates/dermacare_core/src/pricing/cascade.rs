//! Cost cascades across dependent catalog tables.
//!
//! # Responsibility
//! - Recompute stored costs after rates, consumables or elements change.
//!
//! # Invariants
//! - Order is fixed: consumables, elements, bundle and custom items,
//!   sequence steps, then products.
//! - Each cascade runs in one immediate transaction; a failure leaves every
//!   stored cost untouched. The `*_in_tx` variants join the caller's
//!   transaction instead, so a write and its repricing commit together.
//! - Only active (`Release = 1`) rows are recomputed, and only active rows
//!   contribute to sums.
//! - Each sequence step stores its own cost; a sequence's cost is the sum of
//!   its steps.

use super::{apply_consumable_pricing, element_cost, margin, PricingResult};
use crate::model::{Consumable, PackageRef, PackageType, ProductKind};
use crate::repo::procedure_repo::{parse_element_row, ELEMENT_SELECT_SQL};
use crate::repo::reference_repo::{ReferenceRepository, SqliteReferenceRepository};
use crate::repo::product_repo::{ProductRepository, SqliteProductRepository};
use log::{error, info};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::time::Instant;

/// Rows updated per table by one cascade run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub consumables: usize,
    pub elements: usize,
    pub bundle_items: usize,
    pub custom_items: usize,
    pub sequence_steps: usize,
    pub standard_products: usize,
    pub event_products: usize,
}

impl CascadeReport {
    pub fn total(&self) -> usize {
        self.consumables
            + self.elements
            + self.bundle_items
            + self.custom_items
            + self.sequence_steps
            + self.standard_products
            + self.event_products
    }
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    All,
    Consumable(i64),
    Element(i64),
}

impl Scope {
    fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Consumable(_) => "consumable",
            Self::Element(_) => "element",
        }
    }
}

/// Recomputes every stored cost in the catalog.
pub fn recalculate_all(conn: &Connection) -> PricingResult<CascadeReport> {
    run_cascade(Scope::All, || cascade_in_transaction(conn, Scope::All))
}

pub fn recalculate_all_in_tx(tx: &Transaction<'_>) -> PricingResult<CascadeReport> {
    run_cascade(Scope::All, || cascade_in(tx, Scope::All))
}

/// Recomputes a consumable's unit price and everything priced from it.
pub fn recalculate_for_consumable(conn: &Connection, consumable_id: i64) -> PricingResult<CascadeReport> {
    let scope = Scope::Consumable(consumable_id);
    run_cascade(scope, || cascade_in_transaction(conn, scope))
}

/// Recomputes an element's cost and every group and product containing it.
pub fn recalculate_for_element(conn: &Connection, element_id: i64) -> PricingResult<CascadeReport> {
    let scope = Scope::Element(element_id);
    run_cascade(scope, || cascade_in_transaction(conn, scope))
}

pub fn recalculate_for_element_in_tx(
    tx: &Transaction<'_>,
    element_id: i64,
) -> PricingResult<CascadeReport> {
    let scope = Scope::Element(element_id);
    run_cascade(scope, || cascade_in(tx, scope))
}

/// Current cost of a package, summing active rows only.
pub fn package_cost(conn: &Connection, package: PackageRef) -> PricingResult<i64> {
    let sql = match package.package_type() {
        PackageType::Element => {
            "SELECT COALESCE(MAX(Procedure_Cost), 0) FROM Procedure_Element
             WHERE ID = ?1 AND Release = 1;"
        }
        PackageType::Bundle => {
            "SELECT COALESCE(SUM(Element_Cost), 0) FROM Procedure_Bundle
             WHERE GroupID = ?1 AND Release = 1;"
        }
        PackageType::Custom => {
            "SELECT COALESCE(SUM(Element_Cost), 0) FROM Procedure_Custom
             WHERE GroupID = ?1 AND Release = 1;"
        }
        PackageType::Sequence => {
            "SELECT COALESCE(SUM(Procedure_Cost), 0) FROM Procedure_Sequence
             WHERE GroupID = ?1 AND Release = 1;"
        }
    };
    let cost: i64 = conn.query_row(sql, [package.target_id()], |row| row.get(0))?;
    Ok(cost)
}

fn run_cascade(
    scope: Scope,
    cascade: impl FnOnce() -> PricingResult<CascadeReport>,
) -> PricingResult<CascadeReport> {
    let started_at = Instant::now();
    info!(
        "event=pricing_cascade module=pricing status=start scope={}",
        scope.label()
    );

    let result = cascade();

    match &result {
        Ok(report) => info!(
            "event=pricing_cascade module=pricing status=ok scope={} duration_ms={} updated={}",
            scope.label(),
            started_at.elapsed().as_millis(),
            report.total()
        ),
        Err(err) => error!(
            "event=pricing_cascade module=pricing status=error scope={} duration_ms={} error={err}",
            scope.label(),
            started_at.elapsed().as_millis()
        ),
    }
    result
}

fn cascade_in_transaction(conn: &Connection, scope: Scope) -> PricingResult<CascadeReport> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let report = cascade_in(&tx, scope)?;
    tx.commit()?;
    Ok(report)
}

fn cascade_in(conn: &Connection, scope: Scope) -> PricingResult<CascadeReport> {
    let mut report = CascadeReport {
        consumables: update_consumables(conn, scope)?,
        ..CascadeReport::default()
    };

    let element_ids = update_elements(conn, scope)?;
    report.elements = element_ids.len();

    let affected = match scope {
        Scope::All => None,
        Scope::Consumable(_) | Scope::Element(_) => Some(JsonValue::from(element_ids)),
    };

    report.bundle_items = update_group_item_costs(conn, "Procedure_Bundle", affected.as_ref())?;
    report.custom_items = update_group_item_costs(conn, "Procedure_Custom", affected.as_ref())?;
    report.sequence_steps = update_sequence_steps(conn, affected.as_ref())?;

    let packages = match &affected {
        None => None,
        Some(ids) => Some(affected_packages(conn, ids)?),
    };
    report.standard_products = update_products(conn, ProductKind::Standard, packages.as_ref())?;
    report.event_products = update_products(conn, ProductKind::Event, packages.as_ref())?;

    Ok(report)
}

fn update_consumables(conn: &Connection, scope: Scope) -> PricingResult<usize> {
    let repo = SqliteReferenceRepository::try_new(conn)?;
    let consumables: Vec<Consumable> = match scope {
        Scope::All => repo.list_consumables(true)?,
        Scope::Consumable(id) => repo
            .get_consumable(id)?
            .filter(|consumable| consumable.release)
            .into_iter()
            .collect(),
        Scope::Element(_) => Vec::new(),
    };

    for mut consumable in consumables.iter().cloned() {
        apply_consumable_pricing(&mut consumable);
        conn.execute(
            "UPDATE Consumables SET Unit_Price = ?1, VAT = ?2 WHERE ID = ?3;",
            params![consumable.unit_price, consumable.vat, consumable.id],
        )?;
    }
    Ok(consumables.len())
}

/// Returns the ids of the elements whose cost was rewritten.
fn update_elements(conn: &Connection, scope: Scope) -> PricingResult<Vec<i64>> {
    let references = SqliteReferenceRepository::try_new(conn)?;
    let global = references.global_settings()?;

    let (filter, bind) = match scope {
        Scope::All => ("", None),
        Scope::Consumable(id) => ("AND Consum_1_ID = ?1", Some(id)),
        Scope::Element(id) => ("AND ID = ?1", Some(id)),
    };
    let mut stmt = conn.prepare(&format!(
        "{ELEMENT_SELECT_SQL} WHERE Release = 1 {filter} ORDER BY ID ASC;"
    ))?;
    let mut rows = match bind {
        Some(id) => stmt.query([id])?,
        None => stmt.query([])?,
    };

    let mut elements = Vec::new();
    while let Some(row) = rows.next()? {
        elements.push(parse_element_row(row)?);
    }
    drop(rows);

    let mut updated = Vec::with_capacity(elements.len());
    for element in elements {
        let consumable = match element.consum_1_id {
            Some(id) => references.get_consumable(id)?.filter(|consumable| consumable.release),
            None => None,
        };
        let cost = element_cost(&element, &global, consumable.as_ref());
        conn.execute(
            "UPDATE Procedure_Element SET Procedure_Cost = ?1 WHERE ID = ?2;",
            params![cost, element.id],
        )?;
        updated.push(element.id);
    }
    Ok(updated)
}

/// Copies element costs into bundle or custom rows.
fn update_group_item_costs(
    conn: &Connection,
    table: &'static str,
    element_ids: Option<&JsonValue>,
) -> PricingResult<usize> {
    let restrict = if element_ids.is_some() {
        "AND Element_ID IN (SELECT value FROM json_each(?1))"
    } else {
        ""
    };
    let sql = format!(
        "UPDATE {table}
         SET Element_Cost = (
             SELECT e.Procedure_Cost FROM Procedure_Element e WHERE e.ID = {table}.Element_ID
         )
         WHERE Release = 1
           AND EXISTS (
             SELECT 1 FROM Procedure_Element e
             WHERE e.ID = {table}.Element_ID AND e.Release = 1
           )
           {restrict};"
    );
    let changed = match element_ids {
        Some(ids) => conn.execute(&sql, [ids])?,
        None => conn.execute(&sql, [])?,
    };
    Ok(changed)
}

fn update_sequence_steps(conn: &Connection, element_ids: Option<&JsonValue>) -> PricingResult<usize> {
    let restrict = if element_ids.is_some() {
        "AND (
            Element_ID IN (SELECT value FROM json_each(?1))
            OR Bundle_ID IN (
                SELECT GroupID FROM Procedure_Bundle
                WHERE Element_ID IN (SELECT value FROM json_each(?1))
            )
            OR Custom_ID IN (
                SELECT GroupID FROM Procedure_Custom
                WHERE Element_ID IN (SELECT value FROM json_each(?1))
            )
        )"
    } else {
        ""
    };
    let sql = format!(
        "UPDATE Procedure_Sequence
         SET Procedure_Cost = CASE
             WHEN Element_ID IS NOT NULL THEN COALESCE((
                 SELECT e.Procedure_Cost FROM Procedure_Element e
                 WHERE e.ID = Procedure_Sequence.Element_ID AND e.Release = 1
             ), 0)
             WHEN Bundle_ID IS NOT NULL THEN COALESCE((
                 SELECT SUM(b.Element_Cost) FROM Procedure_Bundle b
                 WHERE b.GroupID = Procedure_Sequence.Bundle_ID AND b.Release = 1
             ), 0)
             ELSE COALESCE((
                 SELECT SUM(c.Element_Cost) FROM Procedure_Custom c
                 WHERE c.GroupID = Procedure_Sequence.Custom_ID AND c.Release = 1
             ), 0)
         END
         WHERE Release = 1 {restrict};"
    );
    let changed = match element_ids {
        Some(ids) => conn.execute(&sql, [ids])?,
        None => conn.execute(&sql, [])?,
    };
    Ok(changed)
}

/// Packages whose cost depends on any of `element_ids`.
fn affected_packages(conn: &Connection, element_ids: &JsonValue) -> PricingResult<HashSet<PackageRef>> {
    let mut packages = HashSet::new();
    let queries: [(PackageType, &str); 4] = [
        (
            PackageType::Element,
            "SELECT value FROM json_each(?1);",
        ),
        (
            PackageType::Bundle,
            "SELECT DISTINCT GroupID FROM Procedure_Bundle
             WHERE Element_ID IN (SELECT value FROM json_each(?1));",
        ),
        (
            PackageType::Custom,
            "SELECT DISTINCT GroupID FROM Procedure_Custom
             WHERE Element_ID IN (SELECT value FROM json_each(?1));",
        ),
        (
            PackageType::Sequence,
            "SELECT DISTINCT GroupID FROM Procedure_Sequence
             WHERE Element_ID IN (SELECT value FROM json_each(?1))
                OR Bundle_ID IN (
                    SELECT GroupID FROM Procedure_Bundle
                    WHERE Element_ID IN (SELECT value FROM json_each(?1))
                )
                OR Custom_ID IN (
                    SELECT GroupID FROM Procedure_Custom
                    WHERE Element_ID IN (SELECT value FROM json_each(?1))
                );",
        ),
    ];

    for (package_type, sql) in queries {
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([element_ids], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        packages.extend(ids.into_iter().map(|id| PackageRef::new(package_type, id)));
    }
    Ok(packages)
}

fn update_products(
    conn: &Connection,
    kind: ProductKind,
    packages: Option<&HashSet<PackageRef>>,
) -> PricingResult<usize> {
    let repo = SqliteProductRepository::try_new(conn)?;
    let mut updated = 0;
    for product in repo.list_products(kind, true)? {
        if packages.is_some_and(|packages| !packages.contains(&product.package)) {
            continue;
        }
        let cost = package_cost(conn, product.package)?;
        let (margin_value, margin_rate) = match product.sell_price {
            Some(sell_price) => {
                let computed = margin(sell_price, cost);
                (Some(computed.margin), Some(computed.margin_rate))
            }
            None => (product.margin, product.margin_rate),
        };
        conn.execute(
            &format!(
                "UPDATE {} SET Procedure_Cost = ?1, Margin = ?2, Margin_Rate = ?3 WHERE ID = ?4;",
                kind.table()
            ),
            params![cost, margin_value, margin_rate, product.id],
        )?;
        updated += 1;
    }
    Ok(updated)
}
