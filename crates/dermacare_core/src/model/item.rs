//! Addressable catalog items for release toggles and deletion checks.

use super::catalog::InfoKind;
use super::package::PackageRef;
use super::product::ProductKind;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "item", content = "id", rename_all = "snake_case")]
pub enum CatalogItem {
    Element(i64),
    BundleGroup(i64),
    CustomGroup(i64),
    SequenceGroup(i64),
    Consumable(i64),
    ProcedureInfo(i64),
    StandardInfo(i64),
    EventInfo(i64),
    MembershipInfo(i64),
    StandardProduct(i64),
    EventProduct(i64),
    Membership(i64),
}

impl CatalogItem {
    pub fn id(self) -> i64 {
        match self {
            Self::Element(id)
            | Self::BundleGroup(id)
            | Self::CustomGroup(id)
            | Self::SequenceGroup(id)
            | Self::Consumable(id)
            | Self::ProcedureInfo(id)
            | Self::StandardInfo(id)
            | Self::EventInfo(id)
            | Self::MembershipInfo(id)
            | Self::StandardProduct(id)
            | Self::EventProduct(id)
            | Self::Membership(id) => id,
        }
    }

    /// Whether the item's rows feed a stored cost somewhere, so toggling or
    /// removing them calls for repricing.
    pub fn affects_costs(self) -> bool {
        matches!(
            self,
            Self::Consumable(_)
                | Self::Element(_)
                | Self::BundleGroup(_)
                | Self::CustomGroup(_)
                | Self::SequenceGroup(_)
        )
    }

    /// Table holding the item's rows.
    pub fn table(self) -> &'static str {
        match self {
            Self::Element(_) => "Procedure_Element",
            Self::BundleGroup(_) => "Procedure_Bundle",
            Self::CustomGroup(_) => "Procedure_Custom",
            Self::SequenceGroup(_) => "Procedure_Sequence",
            Self::Consumable(_) => "Consumables",
            Self::ProcedureInfo(_) => "Procedure_Info",
            Self::StandardInfo(_) => InfoKind::Standard.table(),
            Self::EventInfo(_) => InfoKind::Event.table(),
            Self::MembershipInfo(_) => InfoKind::Membership.table(),
            Self::StandardProduct(_) => ProductKind::Standard.table(),
            Self::EventProduct(_) => ProductKind::Event.table(),
            Self::Membership(_) => "Membership",
        }
    }

    /// Column the id is matched against; groups match on `GroupID`.
    pub fn key_column(self) -> &'static str {
        match self {
            Self::BundleGroup(_) | Self::CustomGroup(_) | Self::SequenceGroup(_) => "GroupID",
            _ => "ID",
        }
    }

    pub fn info(kind: InfoKind, id: i64) -> Self {
        match kind {
            InfoKind::Standard => Self::StandardInfo(id),
            InfoKind::Event => Self::EventInfo(id),
            InfoKind::Membership => Self::MembershipInfo(id),
        }
    }

    pub fn product(kind: ProductKind, id: i64) -> Self {
        match kind {
            ProductKind::Standard => Self::StandardProduct(id),
            ProductKind::Event => Self::EventProduct(id),
        }
    }

    /// The item a package reference points at.
    pub fn package_target(package: PackageRef) -> Self {
        match package {
            PackageRef::Element(id) => Self::Element(id),
            PackageRef::Bundle(id) => Self::BundleGroup(id),
            PackageRef::Custom(id) => Self::CustomGroup(id),
            PackageRef::Sequence(id) => Self::SequenceGroup(id),
        }
    }

    /// Parses CLI-style names such as `element`, `bundle`, `standard_info`.
    pub fn parse(kind: &str, id: i64) -> Option<Self> {
        let item = match kind.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "element" => Self::Element(id),
            "bundle" => Self::BundleGroup(id),
            "custom" => Self::CustomGroup(id),
            "sequence" => Self::SequenceGroup(id),
            "consumable" | "consumables" => Self::Consumable(id),
            "procedure_info" => Self::ProcedureInfo(id),
            "standard_info" | "info_standard" => Self::StandardInfo(id),
            "event_info" | "info_event" => Self::EventInfo(id),
            "membership_info" | "info_membership" => Self::MembershipInfo(id),
            "standard" | "standard_product" | "product_standard" => Self::StandardProduct(id),
            "event" | "event_product" | "product_event" => Self::EventProduct(id),
            "membership" => Self::Membership(id),
            _ => return None,
        };
        Some(item)
    }
}

impl Display for CatalogItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}={}", self.table(), self.key_column(), self.id())
    }
}
