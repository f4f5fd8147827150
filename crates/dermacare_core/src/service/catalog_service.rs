//! Catalog write use-cases.
//!
//! # Responsibility
//! - Create and update procedures, products and memberships with their
//!   derived costs filled in.
//! - Keep dependent costs current after rate, element and release changes.
//!
//! # Invariants
//! - `Procedure_Cost`, `Element_Cost`, margins and discounted event prices
//!   are computed here; caller-supplied values are overwritten.
//! - An id (or group id) of `0` asks for the next free one.
//! - Group writes go through the repository's replace path, so a group is
//!   created whole or not at all.
//! - A write that reprices the catalog shares one transaction with its
//!   cascade; if repricing fails the write is rolled back too.

use super::{ServiceError, ServiceResult};
use crate::model::{
    BundleItem, CatalogItem, CustomItem, GlobalSettings, Membership, PackageRef,
    ProcedureElement, Product, ProductKind, SequenceStep, StepTarget,
};
use crate::pricing::cascade::package_cost;
use crate::pricing::{
    apply_consumable_pricing, discounted_price, element_cost, margin, recalculate_all_in_tx,
    recalculate_for_element_in_tx, CascadeReport,
};
use crate::repo::item_repo::{ItemRepository, SqliteItemRepository};
use crate::repo::procedure_repo::{ProcedureRepository, SqliteProcedureRepository};
use crate::repo::product_repo::{ProductRepository, SqliteProductRepository};
use crate::repo::reference_repo::{ReferenceRepository, SqliteReferenceRepository};
use crate::repo::{next_id, RepoError};
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementUpdate {
    pub element: ProcedureElement,
    pub cascade: CascadeReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseChange {
    pub item: CatalogItem,
    pub active: bool,
    pub rows: usize,
    /// Set when the toggle changed which rows contribute to stored costs.
    pub cascade: Option<CascadeReport>,
}

/// Write facade over the SQLite repositories and the pricing cascades.
pub struct CatalogService<'conn> {
    conn: &'conn Connection,
    procedures: SqliteProcedureRepository<'conn>,
    products: SqliteProductRepository<'conn>,
    references: SqliteReferenceRepository<'conn>,
    items: SqliteItemRepository<'conn>,
}

impl<'conn> CatalogService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        Ok(Self {
            conn,
            procedures: SqliteProcedureRepository::try_new(conn)?,
            products: SqliteProductRepository::try_new(conn)?,
            references: SqliteReferenceRepository::try_new(conn)?,
            items: SqliteItemRepository::try_new(conn)?,
        })
    }

    pub fn create_element(&self, mut element: ProcedureElement) -> ServiceResult<ProcedureElement> {
        if element.id == 0 {
            element.id = next_id(self.conn, "Procedure_Element", "ID")?;
        }
        let item = CatalogItem::Element(element.id);
        self.ensure_absent(item)?;

        element.procedure_cost = Some(self.element_cost(&element)?);
        self.procedures.upsert_element(&element)?;
        log_write("create_element", item);
        self.read_element(element.id, "created element not found in read-back")
    }

    /// Rewrites an element and pushes its new cost to every dependent row.
    pub fn update_element(&self, mut element: ProcedureElement) -> ServiceResult<ElementUpdate> {
        let item = CatalogItem::Element(element.id);
        self.ensure_present(item)?;

        element.procedure_cost = Some(self.element_cost(&element)?);
        let tx = self.begin()?;
        self.procedures.upsert_element(&element)?;
        // An inactive element drops out of scoped cascades, so sums need a full pass.
        let cascade = if element.release {
            recalculate_for_element_in_tx(&tx, element.id)?
        } else {
            recalculate_all_in_tx(&tx)?
        };
        tx.commit()?;
        log_write("update_element", item);

        Ok(ElementUpdate {
            element: self.read_element(element.id, "updated element not found in read-back")?,
            cascade,
        })
    }

    pub fn create_bundle(&self, mut items: Vec<BundleItem>) -> ServiceResult<Vec<BundleItem>> {
        let mut group_id = BundleItem::validate_group(&items).map_err(RepoError::from)?;
        if group_id == 0 {
            group_id = next_id(self.conn, "Procedure_Bundle", "GroupID")?;
            items.iter_mut().for_each(|item| item.group_id = group_id);
        }
        let group = CatalogItem::BundleGroup(group_id);
        self.ensure_absent(group)?;

        self.assign_ids("Procedure_Bundle", items.iter_mut().map(|item| &mut item.id))?;
        for item in &mut items {
            item.element_cost = self.group_element_cost(group, item.element_id)?;
        }
        self.procedures.replace_bundle(&items)?;
        log_write("create_bundle", group);
        Ok(self.procedures.get_bundle(group_id)?)
    }

    pub fn create_custom(&self, mut items: Vec<CustomItem>) -> ServiceResult<Vec<CustomItem>> {
        let mut group_id = CustomItem::validate_group(&items).map_err(RepoError::from)?;
        if group_id == 0 {
            group_id = next_id(self.conn, "Procedure_Custom", "GroupID")?;
            items.iter_mut().for_each(|item| item.group_id = group_id);
        }
        let group = CatalogItem::CustomGroup(group_id);
        self.ensure_absent(group)?;

        self.assign_ids("Procedure_Custom", items.iter_mut().map(|item| &mut item.id))?;
        for item in &mut items {
            item.element_cost = self.group_element_cost(group, item.element_id)?;
        }
        self.procedures.replace_custom(&items)?;
        log_write("create_custom", group);
        Ok(self.procedures.get_custom(group_id)?)
    }

    /// Creates a sequence; each step's cost is the current cost of its target.
    pub fn create_sequence(&self, mut steps: Vec<SequenceStep>) -> ServiceResult<Vec<SequenceStep>> {
        let mut group_id = SequenceStep::validate_group(&steps).map_err(RepoError::from)?;
        if group_id == 0 {
            group_id = next_id(self.conn, "Procedure_Sequence", "GroupID")?;
            steps.iter_mut().for_each(|step| step.group_id = group_id);
        }
        let group = CatalogItem::SequenceGroup(group_id);
        self.ensure_absent(group)?;

        self.assign_ids("Procedure_Sequence", steps.iter_mut().map(|step| &mut step.id))?;
        for step in &mut steps {
            let target = step_package(step.target);
            self.ensure_referenced(group, CatalogItem::package_target(target))?;
            step.procedure_cost = Some(package_cost(self.conn, target)?);
        }
        self.procedures.replace_sequence(&steps)?;
        log_write("create_sequence", group);
        Ok(self.procedures.get_sequence(group_id)?)
    }

    /// Creates a product priced from its package.
    ///
    /// An event product given `Original_Price` and `Discount_Rate` but no
    /// `Sell_Price` is sold at the discounted price.
    pub fn create_product(&self, mut product: Product) -> ServiceResult<Product> {
        if product.id == 0 {
            product.id = next_id(self.conn, product.kind.table(), "ID")?;
        }
        let item = CatalogItem::product(product.kind, product.id);
        self.ensure_absent(item)?;
        self.ensure_referenced(item, CatalogItem::package_target(product.package))?;
        if let Some(info_id) = product.info_id {
            self.ensure_referenced(item, CatalogItem::info(product.kind.info_kind(), info_id))?;
        }

        if product.kind == ProductKind::Event && product.sell_price.is_none() {
            if let (Some(original), Some(rate)) = (product.original_price, product.discount_rate) {
                product.sell_price = Some(discounted_price(original, rate));
            }
        }
        let cost = package_cost(self.conn, product.package)?;
        product.procedure_cost = Some(cost);
        if let Some(sell_price) = product.sell_price {
            let computed = margin(sell_price, cost);
            product.margin = Some(computed.margin);
            product.margin_rate = Some(computed.margin_rate);
        }

        self.products.upsert_product(&product)?;
        log_write("create_product", item);
        self.products
            .get_product(product.kind, product.id)?
            .ok_or(ServiceError::InconsistentState(
                "created product not found in read-back",
            ))
    }

    pub fn create_membership(&self, mut membership: Membership) -> ServiceResult<Membership> {
        if membership.id == 0 {
            membership.id = next_id(self.conn, "Membership", "ID")?;
        }
        let item = CatalogItem::Membership(membership.id);
        self.ensure_absent(item)?;
        if let Some(package) = membership.package {
            self.ensure_referenced(item, CatalogItem::package_target(package))?;
        }
        if let Some(info_id) = membership.info_id {
            self.ensure_referenced(item, CatalogItem::MembershipInfo(info_id))?;
        }

        self.products.upsert_membership(&membership)?;
        log_write("create_membership", item);
        self.products
            .get_membership(membership.id)?
            .ok_or(ServiceError::InconsistentState(
                "created membership not found in read-back",
            ))
    }

    /// Stores new labor rates and reprices the whole catalog.
    pub fn update_global_settings(&self, settings: &GlobalSettings) -> ServiceResult<CascadeReport> {
        let tx = self.begin()?;
        self.references.update_global_settings(settings)?;
        let cascade = recalculate_all_in_tx(&tx)?;
        tx.commit()?;
        info!(
            "event=catalog_write module=service status=ok action=update_global_settings doc_rate={} aesthetician_rate={}",
            settings.doc_price_minute, settings.aesthetician_price_minute
        );
        Ok(cascade)
    }

    /// Activates or deactivates every row of `item`.
    pub fn set_release(&self, item: CatalogItem, active: bool) -> ServiceResult<ReleaseChange> {
        let tx = self.begin()?;
        let rows = self.items.set_release(item, active)?;
        let cascade = if item.affects_costs() {
            Some(recalculate_all_in_tx(&tx)?)
        } else {
            None
        };
        tx.commit()?;
        info!(
            "event=catalog_release module=service status=ok item={item} active={active} rows={rows}"
        );
        Ok(ReleaseChange {
            item,
            active,
            rows,
            cascade,
        })
    }

    /// Writes made through the repositories before `commit` join this
    /// transaction, since they share the connection.
    fn begin(&self) -> ServiceResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    fn element_cost(&self, element: &ProcedureElement) -> ServiceResult<i64> {
        let global = self.references.global_settings()?;
        let consumable = match element.consum_1_id {
            Some(id) => {
                let mut consumable = self.references.get_consumable(id)?.ok_or(
                    ServiceError::MissingReference {
                        item: CatalogItem::Element(element.id),
                        missing: CatalogItem::Consumable(id),
                    },
                )?;
                apply_consumable_pricing(&mut consumable);
                Some(consumable).filter(|consumable| consumable.release)
            }
            None => None,
        };
        Ok(element_cost(element, &global, consumable.as_ref()))
    }

    fn group_element_cost(&self, group: CatalogItem, element_id: i64) -> ServiceResult<Option<i64>> {
        let element = self
            .procedures
            .get_element(element_id)?
            .ok_or(ServiceError::MissingReference {
                item: group,
                missing: CatalogItem::Element(element_id),
            })?;
        Ok(element.procedure_cost)
    }

    fn read_element(&self, id: i64, context: &'static str) -> ServiceResult<ProcedureElement> {
        self.procedures
            .get_element(id)?
            .ok_or(ServiceError::InconsistentState(context))
    }

    /// Fills zero ids with fresh ones above both the table and the batch.
    fn assign_ids<'a>(
        &self,
        table: &str,
        ids: impl Iterator<Item = &'a mut i64>,
    ) -> ServiceResult<()> {
        let ids: Vec<&mut i64> = ids.collect();
        let batch_max = ids.iter().map(|id| **id).max().unwrap_or(0);
        let mut next = next_id(self.conn, table, "ID")?.max(batch_max + 1);
        for id in ids {
            if *id == 0 {
                *id = next;
                next += 1;
            }
        }
        Ok(())
    }

    fn ensure_absent(&self, item: CatalogItem) -> ServiceResult<()> {
        if self.items.exists(item)? {
            return Err(ServiceError::AlreadyExists(item));
        }
        Ok(())
    }

    fn ensure_present(&self, item: CatalogItem) -> ServiceResult<()> {
        if !self.items.exists(item)? {
            return Err(ServiceError::NotFound(item));
        }
        Ok(())
    }

    fn ensure_referenced(&self, item: CatalogItem, target: CatalogItem) -> ServiceResult<()> {
        if !self.items.exists(target)? {
            return Err(ServiceError::MissingReference {
                item,
                missing: target,
            });
        }
        Ok(())
    }
}

fn log_write(action: &str, item: CatalogItem) {
    info!("event=catalog_write module=service status=ok action={action} item={item}");
}

fn step_package(target: StepTarget) -> PackageRef {
    match target {
        StepTarget::Element(id) => PackageRef::Element(id),
        StepTarget::Bundle(id) => PackageRef::Bundle(id),
        StepTarget::Custom(id) => PackageRef::Custom(id),
    }
}

#[cfg(test)]
mod tests {
    use super::step_package;
    use crate::model::{PackageRef, StepTarget};

    #[test]
    fn step_targets_map_to_packages() {
        assert_eq!(step_package(StepTarget::Bundle(4)), PackageRef::Bundle(4));
        assert_eq!(step_package(StepTarget::Element(1)), PackageRef::Element(1));
    }
}
