//! Typed catalog rows.
//!
//! # Responsibility
//! - Mirror the catalog tables as plain Rust structs.
//! - Own the write-time validation rules shared by the service and import
//!   paths.
//!
//! # Invariants
//! - `validate()` runs before any repository write.
//! - Package references are modeled by [`package::PackageRef`], never by raw
//!   id columns.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog;
pub mod enums;
pub mod item;
pub mod package;
pub mod product;

pub use catalog::{
    BundleItem, Consumable, CustomItem, GlobalSettings, InfoKind, InfoRecord, ProcedureClass,
    ProcedureElement, ProcedureInfo, SequenceStep, StepTarget,
};
pub use enums::{EnumCode, EnumType};
pub use item::CatalogItem;
pub use package::{PackageColumns, PackageRef, PackageRefError, PackageType};
pub use product::{Membership, Product, ProductKind};

/// Label of `Position_Type` that bills at the doctor rate.
pub const POSITION_DOCTOR: &str = "의사";
/// Label of `Taxable_Type` that carries VAT.
pub const TAXABLE: &str = "과세";

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField(&'static str),
    /// NaN or infinite input in a numeric column.
    NotFinite(&'static str),
    Negative {
        field: &'static str,
        value: f64,
    },
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Rows passed as one group carry different `GroupID`s.
    MixedGroup {
        expected: i64,
        found: i64,
    },
    EmptyGroup(i64),
    DuplicateStep {
        group_id: i64,
        step_num: i64,
    },
    Package(PackageRefError),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::NotFinite(field) => write!(f, "{field} must be a finite number"),
            Self::Negative { field, value } => write!(f, "{field} must be >= 0, got {value}"),
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} must be within {min}..={max}, got {value}"),
            Self::MixedGroup { expected, found } => {
                write!(f, "group rows mix GroupID {expected} and {found}")
            }
            Self::EmptyGroup(group_id) => write!(f, "group {group_id} has no rows"),
            Self::DuplicateStep { group_id, step_num } => {
                write!(f, "sequence {group_id} repeats Step_Num {step_num}")
            }
            Self::Package(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Package(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PackageRefError> for ValidationError {
    fn from(value: PackageRefError) -> Self {
        Self::Package(value)
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub(crate) fn require_text(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

/// Optional text may be absent, but not present and blank.
pub(crate) fn require_optional_text(field: &'static str, value: Option<&str>) -> ValidationResult {
    match value {
        Some(value) => require_text(field, value),
        None => Ok(()),
    }
}

pub(crate) fn require_non_negative(field: &'static str, value: Option<f64>) -> ValidationResult {
    match value {
        Some(value) if !value.is_finite() => Err(ValidationError::NotFinite(field)),
        Some(value) if value < 0.0 => Err(ValidationError::Negative { field, value }),
        _ => Ok(()),
    }
}

pub(crate) fn require_non_negative_int(field: &'static str, value: Option<i64>) -> ValidationResult {
    require_non_negative(field, value.map(|value| value as f64))
}

/// Discount and margin rates are percentages.
pub(crate) fn require_rate(field: &'static str, value: Option<f64>) -> ValidationResult {
    match value {
        Some(value) if !(0.0..=100.0).contains(&value) => Err(ValidationError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: 100.0,
        }),
        _ => Ok(()),
    }
}
