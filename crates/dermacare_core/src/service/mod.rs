//! Catalog use-case services.
//!
//! # Responsibility
//! - Orchestrate repository writes and pricing into use-case level APIs.
//! - Guard deletions with reference checks.
//!
//! # Invariants
//! - Stored costs are derived, never taken from the caller.
//! - Every referenced row must exist before a write that points at it.

use crate::model::CatalogItem;
use crate::pricing::PricingError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog_service;
pub mod deletion_service;

pub use catalog_service::{CatalogService, ElementUpdate, ReleaseChange};
pub use deletion_service::{DeletionCheck, DeletionOutcome, DeletionService, RiskLevel};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    NotFound(CatalogItem),
    AlreadyExists(CatalogItem),
    /// `item` points at `missing`, which does not exist.
    MissingReference {
        item: CatalogItem,
        missing: CatalogItem,
    },
    /// Deletion refused because other rows still reference the item.
    DeleteBlocked {
        item: CatalogItem,
        references: usize,
    },
    Repo(RepoError),
    Pricing(PricingError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(item) => write!(f, "catalog item not found: {item}"),
            Self::AlreadyExists(item) => write!(f, "catalog item already exists: {item}"),
            Self::MissingReference { item, missing } => {
                write!(f, "{item} references missing {missing}")
            }
            Self::DeleteBlocked { item, references } => write!(
                f,
                "cannot delete {item}: {references} reference(s) remain; use force to override"
            ),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Pricing(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent catalog state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Pricing(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(item) => Self::NotFound(item),
            RepoError::AlreadyExists(item) => Self::AlreadyExists(item),
            other => Self::Repo(other),
        }
    }
}

impl From<PricingError> for ServiceError {
    fn from(value: PricingError) -> Self {
        Self::Pricing(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
