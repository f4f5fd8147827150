//! Package discriminator shared by products and memberships.
//!
//! # Responsibility
//! - Name the four procedure shapes a sellable row can point at.
//! - Convert between the `Package_Type` + four-id-column storage layout and
//!   a single typed reference.
//!
//! # Invariants
//! - A `PackageRef` always names exactly one shape and one target id.
//! - Storage columns produced by `columns()` have exactly one non-null id,
//!   in the column matching `package_type()`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Procedure shape referenced by a product or membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    /// A single `Procedure_Element` row.
    Element,
    /// A `Procedure_Bundle` group.
    Bundle,
    /// A `Procedure_Custom` group.
    Custom,
    /// A `Procedure_Sequence` group.
    Sequence,
}

impl PackageType {
    pub const ALL: [PackageType; 4] = [
        PackageType::Element,
        PackageType::Bundle,
        PackageType::Custom,
        PackageType::Sequence,
    ];

    /// Stored `Package_Type` label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Element => "단일시술",
            Self::Bundle => "번들",
            Self::Custom => "커스텀",
            Self::Sequence => "시퀀스",
        }
    }

    /// Name of the id column this shape fills.
    pub fn id_column(self) -> &'static str {
        match self {
            Self::Element => "Element_ID",
            Self::Bundle => "Bundle_ID",
            Self::Custom => "Custom_ID",
            Self::Sequence => "Sequence_ID",
        }
    }

    /// Parses a stored label or an english alias (`element`, `bundle`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        match trimmed {
            "단일시술" => return Some(Self::Element),
            "번들" => return Some(Self::Bundle),
            "커스텀" => return Some(Self::Custom),
            "시퀀스" => return Some(Self::Sequence),
            _ => {}
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "element" | "single" => Some(Self::Element),
            "bundle" => Some(Self::Bundle),
            "custom" => Some(Self::Custom),
            "sequence" => Some(Self::Sequence),
            _ => None,
        }
    }
}

impl Display for PackageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Typed reference to the package a product or membership sells.
///
/// Element targets are `Procedure_Element.ID`; the other shapes target a
/// `GroupID`, which is why storage cannot back this with a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "package_type", content = "id", rename_all = "snake_case")]
pub enum PackageRef {
    Element(i64),
    Bundle(i64),
    Custom(i64),
    Sequence(i64),
}

/// Storage layout of a [`PackageRef`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageColumns {
    pub package_type: Option<String>,
    pub element_id: Option<i64>,
    pub bundle_id: Option<i64>,
    pub custom_id: Option<i64>,
    pub sequence_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageRefError {
    UnknownType(String),
    /// The column selected by the discriminator is empty.
    MissingTarget(PackageType),
    /// A column other than the selected one holds a value.
    ConflictingColumn {
        package_type: PackageType,
        column: &'static str,
    },
    /// Id columns are filled but no discriminator was given.
    MissingType,
}

impl Display for PackageRefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(value) => write!(f, "unknown Package_Type `{value}`"),
            Self::MissingTarget(kind) => {
                write!(f, "Package_Type `{kind}` requires {}", kind.id_column())
            }
            Self::ConflictingColumn {
                package_type,
                column,
            } => write!(
                f,
                "Package_Type `{package_type}` must not set {column}"
            ),
            Self::MissingType => write!(f, "package id columns set without Package_Type"),
        }
    }
}

impl Error for PackageRefError {}

impl PackageRef {
    pub fn new(package_type: PackageType, target_id: i64) -> Self {
        match package_type {
            PackageType::Element => Self::Element(target_id),
            PackageType::Bundle => Self::Bundle(target_id),
            PackageType::Custom => Self::Custom(target_id),
            PackageType::Sequence => Self::Sequence(target_id),
        }
    }

    pub fn package_type(self) -> PackageType {
        match self {
            Self::Element(_) => PackageType::Element,
            Self::Bundle(_) => PackageType::Bundle,
            Self::Custom(_) => PackageType::Custom,
            Self::Sequence(_) => PackageType::Sequence,
        }
    }

    pub fn target_id(self) -> i64 {
        match self {
            Self::Element(id) | Self::Bundle(id) | Self::Custom(id) | Self::Sequence(id) => id,
        }
    }

    /// Builds a reference from the stored discriminator and id columns.
    ///
    /// Returns `Ok(None)` when every column is empty, which only memberships
    /// allow. Callers that require a package map `None` to
    /// `PackageRefError::MissingType`.
    pub fn from_columns(
        package_type: Option<&str>,
        element_id: Option<i64>,
        bundle_id: Option<i64>,
        custom_id: Option<i64>,
        sequence_id: Option<i64>,
    ) -> Result<Option<Self>, PackageRefError> {
        let ids = [element_id, bundle_id, custom_id, sequence_id];

        let Some(label) = package_type.map(str::trim).filter(|label| !label.is_empty()) else {
            if ids.iter().any(Option::is_some) {
                return Err(PackageRefError::MissingType);
            }
            return Ok(None);
        };

        let kind =
            PackageType::parse(label).ok_or_else(|| PackageRefError::UnknownType(label.into()))?;

        let mut target = None;
        for (candidate, id) in PackageType::ALL.into_iter().zip(ids) {
            match (candidate == kind, id) {
                (true, Some(id)) => target = Some(id),
                (false, Some(_)) => {
                    return Err(PackageRefError::ConflictingColumn {
                        package_type: kind,
                        column: candidate.id_column(),
                    })
                }
                (_, None) => {}
            }
        }

        let target = target.ok_or(PackageRefError::MissingTarget(kind))?;
        Ok(Some(Self::new(kind, target)))
    }

    /// Storage layout with exactly one id column filled.
    pub fn columns(self) -> PackageColumns {
        let mut columns = PackageColumns {
            package_type: Some(self.package_type().label().to_string()),
            ..PackageColumns::default()
        };
        let id = Some(self.target_id());
        match self {
            Self::Element(_) => columns.element_id = id,
            Self::Bundle(_) => columns.bundle_id = id,
            Self::Custom(_) => columns.custom_id = id,
            Self::Sequence(_) => columns.sequence_id = id,
        }
        columns
    }
}

impl Display for PackageRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.package_type(), self.target_id())
    }
}

#[cfg(test)]
mod tests {
    use super::{PackageRef, PackageRefError, PackageType};

    #[test]
    fn parse_accepts_labels_and_aliases() {
        assert_eq!(PackageType::parse("번들"), Some(PackageType::Bundle));
        assert_eq!(PackageType::parse(" Sequence "), Some(PackageType::Sequence));
        assert_eq!(PackageType::parse("ELEMENT"), Some(PackageType::Element));
        assert_eq!(PackageType::parse("패키지"), None);
    }

    #[test]
    fn columns_fill_only_the_selected_id() {
        let columns = PackageRef::Custom(7).columns();
        assert_eq!(columns.package_type.as_deref(), Some("커스텀"));
        assert_eq!(columns.custom_id, Some(7));
        assert_eq!(columns.element_id, None);
        assert_eq!(columns.bundle_id, None);
        assert_eq!(columns.sequence_id, None);
    }

    #[test]
    fn from_columns_rejects_extra_id() {
        let err = PackageRef::from_columns(Some("번들"), Some(1), Some(2), None, None).unwrap_err();
        assert_eq!(
            err,
            PackageRefError::ConflictingColumn {
                package_type: PackageType::Bundle,
                column: "Element_ID",
            }
        );
    }

    #[test]
    fn from_columns_treats_all_empty_as_no_package() {
        assert_eq!(
            PackageRef::from_columns(None, None, None, None, None).unwrap(),
            None
        );
        assert_eq!(
            PackageRef::from_columns(None, None, None, Some(3), None).unwrap_err(),
            PackageRefError::MissingType
        );
    }
}
