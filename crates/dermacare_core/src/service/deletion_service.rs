//! Reference-checked deletion.
//!
//! # Invariants
//! - `delete` without `force` only succeeds when nothing references the item.
//! - A forced delete deactivates referrers that no foreign key cleans up.

use super::{ServiceError, ServiceResult};
use crate::model::CatalogItem;
use crate::repo::item_repo::{ItemReference, ItemRepository};
use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn assess(total: usize, critical: usize) -> Self {
        if critical > 0 {
            Self::High
        } else if total > 0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionCheck {
    pub item: CatalogItem,
    pub references: Vec<ItemReference>,
    pub total_references: usize,
    /// References from products and memberships.
    pub critical_references: usize,
    pub risk_level: RiskLevel,
    pub can_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub item: CatalogItem,
    pub deleted_rows: usize,
    pub forced: bool,
    pub check: DeletionCheck,
}

pub struct DeletionService<R: ItemRepository> {
    repo: R,
}

impl<R: ItemRepository> DeletionService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists what still points at `item` and how risky deleting it is.
    pub fn check(&self, item: CatalogItem) -> ServiceResult<DeletionCheck> {
        if !self.repo.exists(item)? {
            return Err(ServiceError::NotFound(item));
        }
        let references = self.repo.find_references(item)?;
        let total_references = references.len();
        let critical_references = references
            .iter()
            .filter(|reference| reference.critical)
            .count();
        Ok(DeletionCheck {
            item,
            references,
            total_references,
            critical_references,
            risk_level: RiskLevel::assess(total_references, critical_references),
            can_delete: total_references == 0,
        })
    }

    pub fn delete(&self, item: CatalogItem, force: bool) -> ServiceResult<DeletionOutcome> {
        let check = self.check(item)?;
        if !check.can_delete && !force {
            warn!(
                "event=catalog_delete module=service status=blocked item={item} references={} risk={:?}",
                check.total_references, check.risk_level
            );
            return Err(ServiceError::DeleteBlocked {
                item,
                references: check.total_references,
            });
        }

        let deleted_rows = self.repo.delete(item)?;
        info!(
            "event=catalog_delete module=service status=ok item={item} rows={deleted_rows} forced={} references={}",
            !check.can_delete, check.total_references
        );
        Ok(DeletionOutcome {
            item,
            deleted_rows,
            forced: !check.can_delete,
            check,
        })
    }
}
