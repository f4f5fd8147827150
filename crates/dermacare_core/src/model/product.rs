//! Sellable rows: standard products, event products and memberships.

use super::catalog::InfoKind;
use super::package::PackageRef;
use super::{require_non_negative_int, require_rate, ValidationResult};
use serde::{Deserialize, Serialize};

/// Selects `Product_Standard` or `Product_Event`.
///
/// Both tables share one layout; only the info foreign key and the sale
/// window columns are named differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Standard,
    Event,
}

impl ProductKind {
    pub const ALL: [ProductKind; 2] = [ProductKind::Standard, ProductKind::Event];

    pub fn table(self) -> &'static str {
        match self {
            Self::Standard => "Product_Standard",
            Self::Event => "Product_Event",
        }
    }

    pub fn info_table(self) -> &'static str {
        match self {
            Self::Standard => "Info_Standard",
            Self::Event => "Info_Event",
        }
    }

    pub fn info_kind(self) -> InfoKind {
        match self {
            Self::Standard => InfoKind::Standard,
            Self::Event => InfoKind::Event,
        }
    }

    pub fn info_column(self) -> &'static str {
        match self {
            Self::Standard => "Standard_Info_ID",
            Self::Event => "Event_Info_ID",
        }
    }

    pub fn info_name_column(self) -> &'static str {
        match self {
            Self::Standard => "Product_Standard_Name",
            Self::Event => "Event_Name",
        }
    }

    pub fn info_description_column(self) -> &'static str {
        match self {
            Self::Standard => "Product_Standard_Description",
            Self::Event => "Event_Description",
        }
    }

    pub fn start_date_column(self) -> &'static str {
        match self {
            Self::Standard => "Standard_Start_Date",
            Self::Event => "Event_Start_Date",
        }
    }

    pub fn end_date_column(self) -> &'static str {
        match self {
            Self::Standard => "Standard_End_Date",
            Self::Event => "Event_End_Date",
        }
    }

    /// `"standard"` or `"event"`, as reported in query results.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Event => "event",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub kind: ProductKind,
    pub id: i64,
    pub release: bool,
    pub package: PackageRef,
    pub info_id: Option<i64>,
    pub procedure_cost: Option<i64>,
    pub sell_price: Option<i64>,
    pub discount_rate: Option<f64>,
    pub original_price: Option<i64>,
    pub margin: Option<i64>,
    pub margin_rate: Option<f64>,
    /// ISO-8601 date of the sale window start.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Days a purchase stays usable.
    pub validity_period: Option<i64>,
    pub vat: Option<i64>,
    pub covered_type: Option<String>,
    pub taxable_type: Option<String>,
}

impl Product {
    pub fn new(kind: ProductKind, id: i64, package: PackageRef) -> Self {
        Self {
            kind,
            id,
            release: true,
            package,
            info_id: None,
            procedure_cost: None,
            sell_price: None,
            discount_rate: None,
            original_price: None,
            margin: None,
            margin_rate: None,
            start_date: None,
            end_date: None,
            validity_period: None,
            vat: None,
            covered_type: None,
            taxable_type: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_negative_int("Sell_Price", self.sell_price)?;
        require_non_negative_int("Original_Price", self.original_price)?;
        require_non_negative_int("Validity_Period", self.validity_period)?;
        require_rate("Discount_Rate", self.discount_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub release: bool,
    pub info_id: Option<i64>,
    pub payment_amount: Option<i64>,
    pub bonus_point: Option<i64>,
    pub credit: Option<i64>,
    pub discount_rate: Option<f64>,
    /// Memberships may be sold without a package.
    pub package: Option<PackageRef>,
    pub validity_period: Option<i64>,
    pub release_start_date: Option<String>,
    pub release_end_date: Option<String>,
}

impl Membership {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            release: true,
            info_id: None,
            payment_amount: None,
            bonus_point: None,
            credit: None,
            discount_rate: None,
            package: None,
            validity_period: None,
            release_start_date: None,
            release_end_date: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_negative_int("Payment_Amount", self.payment_amount)?;
        require_non_negative_int("Bonus_Point", self.bonus_point)?;
        require_non_negative_int("Credit", self.credit)?;
        require_rate("Discount_Rate", self.discount_rate)
    }
}
