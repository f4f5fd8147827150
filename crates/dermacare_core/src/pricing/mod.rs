//! Cost, VAT and margin rules.
//!
//! # Responsibility
//! - Pure pricing formulas over model rows.
//! - Cascades that push recomputed costs through dependent tables
//!   ([`cascade`]).
//!
//! # Invariants
//! - Costs are whole currency units; fractional results are truncated toward
//!   zero.
//! - A missing or zero divisor yields a zero unit price, never an error.
//! - `Margin_Rate` is a percentage rounded to two decimals.

use crate::db::DbError;
use crate::model::catalog::UNSET;
use crate::model::{Consumable, GlobalSettings, ProcedureElement, POSITION_DOCTOR, TAXABLE};
use crate::repo::RepoError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cascade;

pub use cascade::{
    recalculate_all, recalculate_all_in_tx, recalculate_for_consumable, recalculate_for_element,
    recalculate_for_element_in_tx, CascadeReport,
};

pub type PricingResult<T> = Result<T, PricingError>;

#[derive(Debug)]
pub enum PricingError {
    Repo(RepoError),
    Db(DbError),
}

impl Display for PricingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PricingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<RepoError> for PricingError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for PricingError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PricingError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Price of one usable unit of a consumable.
///
/// Divides by `i_value` unless it is absent or `-1`, then by `f_value`.
pub fn unit_price(price: Option<i64>, i_value: Option<i64>, f_value: Option<f64>) -> i64 {
    let divisor = match i_value {
        Some(value) if value != UNSET => Some(value as f64),
        _ => f_value,
    };
    match (price, divisor) {
        (Some(price), Some(divisor)) if divisor != 0.0 => (price as f64 / divisor).trunc() as i64,
        _ => 0,
    }
}

/// VAT included in `unit_price`: one eleventh for taxable items.
pub fn vat(unit_price: i64, taxable_type: Option<&str>) -> i64 {
    if taxable_type.map(str::trim) == Some(TAXABLE) {
        unit_price / 11
    } else {
        0
    }
}

/// Recomputes `Unit_Price` and `VAT` on a consumable.
pub fn apply_consumable_pricing(consumable: &mut Consumable) {
    let unit = unit_price(consumable.price, consumable.i_value, consumable.f_value);
    consumable.unit_price = Some(unit);
    consumable.vat = Some(vat(unit, consumable.taxable_type.as_deref()));
}

/// Cost of performing an element once (or once per plan when planned).
///
/// `consumable` must be the element's active `Consum_1_ID` row, if any.
pub fn element_cost(
    element: &ProcedureElement,
    global: &GlobalSettings,
    consumable: Option<&Consumable>,
) -> i64 {
    let rate = if element.position_type.as_deref().map(str::trim) == Some(POSITION_DOCTOR) {
        global.doc_price_minute
    } else {
        global.aesthetician_price_minute
    };
    let labor = rate * element.cost_time.unwrap_or(0.0);

    let consumable_cost = match consumable {
        Some(consumable) if element.consum_1_id.is_some() => {
            // Unset, `-1` and `0` all bill a single unit.
            let count = element.consum_1_count.filter(|count| *count > 0).unwrap_or(1);
            consumable.unit_price.unwrap_or(0) as f64 * count as f64
        }
        _ => 0.0,
    };

    let mut total = labor + consumable_cost;
    if element.is_plan() {
        total *= element.plan_count.unwrap_or(1) as f64;
    }
    total.trunc() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub margin: i64,
    /// Percent of the sell price; `0.0` when the sell price is not positive.
    pub margin_rate: f64,
}

pub fn margin(sell_price: i64, procedure_cost: i64) -> Margin {
    let margin = sell_price - procedure_cost;
    let margin_rate = if sell_price > 0 {
        round2(margin as f64 / sell_price as f64 * 100.0)
    } else {
        0.0
    };
    Margin {
        margin,
        margin_rate,
    }
}

/// Sell price after a percentage discount, truncated.
pub fn discounted_price(original_price: i64, discount_rate: f64) -> i64 {
    (original_price as f64 * (1.0 - discount_rate / 100.0)).trunc() as i64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{discounted_price, element_cost, margin, unit_price, vat};
    use crate::model::catalog::UNSET;
    use crate::model::{Consumable, GlobalSettings, ProcedureElement};

    fn global() -> GlobalSettings {
        GlobalSettings {
            id: 1,
            doc_price_minute: 1000.0,
            aesthetician_price_minute: 300.0,
        }
    }

    #[test]
    fn unit_price_prefers_integral_units() {
        assert_eq!(unit_price(Some(10_000), Some(3), Some(2.0)), 3_333);
        assert_eq!(unit_price(Some(10_000), Some(-1), Some(2.5)), 4_000);
        assert_eq!(unit_price(Some(10_000), None, Some(0.0)), 0);
        assert_eq!(unit_price(None, Some(5), None), 0);
    }

    #[test]
    fn vat_applies_only_to_taxable_items() {
        assert_eq!(vat(11_000, Some("과세")), 1_000);
        assert_eq!(vat(11_000, Some("면세")), 0);
        assert_eq!(vat(11_000, None), 0);
    }

    #[test]
    fn element_cost_uses_position_rate_consumable_and_plan() {
        let mut consumable = Consumable::new(1, "filler");
        consumable.unit_price = Some(500);

        let mut element = ProcedureElement::new(10, "laser");
        element.position_type = Some("의사".to_string());
        element.cost_time = Some(10.0);
        element.consum_1_id = Some(1);
        element.consum_1_count = Some(2);
        assert_eq!(element_cost(&element, &global(), Some(&consumable)), 11_000);

        element.position_type = Some("관리사".to_string());
        element.plan_state = Some(1);
        element.plan_count = Some(3);
        assert_eq!(element_cost(&element, &global(), Some(&consumable)), 12_000);

        assert_eq!(element_cost(&element, &global(), None), 9_000);
    }

    #[test]
    fn zero_or_unset_consumable_count_bills_one_unit() {
        let mut consumable = Consumable::new(1, "filler");
        consumable.unit_price = Some(500);

        let mut element = ProcedureElement::new(10, "injection");
        element.position_type = Some("의사".to_string());
        element.cost_time = Some(1.0);
        element.consum_1_id = Some(1);
        for count in [None, Some(0), Some(UNSET)] {
            element.consum_1_count = count;
            assert_eq!(element_cost(&element, &global(), Some(&consumable)), 1_500, "{count:?}");
        }
    }

    #[test]
    fn margin_rate_is_rounded_percentage() {
        let result = margin(30_000, 10_000);
        assert_eq!(result.margin, 20_000);
        assert_eq!(result.margin_rate, 66.67);
        assert_eq!(margin(0, 500).margin_rate, 0.0);
    }

    #[test]
    fn discounted_price_truncates() {
        assert_eq!(discounted_price(99_999, 10.0), 89_999);
    }
}
