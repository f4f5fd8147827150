//! Procedure, consumable and descriptive rows.
//!
//! # Invariants
//! - Bundle, custom and sequence rows are only meaningful as a group sharing
//!   one `group_id`; group validators check that before writes.
//! - A sequence step targets exactly one element, bundle group or custom group.

use super::{
    require_non_negative, require_non_negative_int, require_optional_text, require_text,
    ValidationError, ValidationResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Sheet marker for "not applicable" in integral count columns.
pub const UNSET: i64 = -1;

/// Clinic-wide labor rates, stored as the single `Global` row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub id: i64,
    pub doc_price_minute: f64,
    pub aesthetician_price_minute: f64,
}

impl GlobalSettings {
    pub fn validate(&self) -> ValidationResult {
        require_non_negative("Doc_Price_Minute", Some(self.doc_price_minute))?;
        require_non_negative(
            "Aesthetician_Price_Minute",
            Some(self.aesthetician_price_minute),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumable {
    pub id: i64,
    pub release: bool,
    pub name: String,
    pub description: Option<String>,
    pub unit_type: Option<String>,
    /// Integral units per purchase (e.g. 10 vials).
    pub i_value: Option<i64>,
    /// Fractional units per purchase, used when `i_value` is absent.
    pub f_value: Option<f64>,
    pub price: Option<i64>,
    pub unit_price: Option<i64>,
    pub vat: Option<i64>,
    pub taxable_type: Option<String>,
    pub covered_type: Option<String>,
}

impl Consumable {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            release: true,
            name: name.into(),
            description: None,
            unit_type: None,
            i_value: None,
            f_value: None,
            price: None,
            unit_price: None,
            vat: None,
            taxable_type: None,
            covered_type: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("Name", &self.name)?;
        require_non_negative_int("Price", self.price)?;
        require_non_negative_int("I_Value", self.i_value.filter(|value| *value != UNSET))?;
        require_non_negative("F_Value", self.f_value)
    }
}

/// Classification hierarchy row, keyed by `(group_id, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureClass {
    pub group_id: i64,
    pub id: i64,
    pub release: bool,
    pub class_major: Option<String>,
    pub class_sub: Option<String>,
    pub class_detail: Option<String>,
    pub class_type: Option<String>,
}

impl ProcedureClass {
    pub fn validate(&self) -> ValidationResult {
        require_non_negative_int("GroupID", Some(self.group_id))?;
        require_non_negative_int("ID", Some(self.id))?;
        require_optional_text("Class_Major", self.class_major.as_deref())?;
        require_optional_text("Class_Sub", self.class_sub.as_deref())?;
        require_optional_text("Class_Detail", self.class_detail.as_deref())?;
        require_optional_text("Class_Type", self.class_type.as_deref())
    }
}

/// Atomic treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureElement {
    pub id: i64,
    pub release: bool,
    pub class_major: Option<String>,
    pub class_sub: Option<String>,
    pub class_detail: Option<String>,
    pub class_type: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub position_type: Option<String>,
    /// Minutes of staff time.
    pub cost_time: Option<f64>,
    pub plan_state: Option<i64>,
    pub plan_count: Option<i64>,
    pub plan_interval: Option<i64>,
    pub consum_1_id: Option<i64>,
    pub consum_1_count: Option<i64>,
    pub procedure_level: Option<String>,
    pub procedure_cost: Option<i64>,
    pub price: Option<i64>,
}

impl ProcedureElement {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            release: true,
            class_major: None,
            class_sub: None,
            class_detail: None,
            class_type: None,
            name: name.into(),
            description: None,
            position_type: None,
            cost_time: None,
            plan_state: None,
            plan_count: None,
            plan_interval: None,
            consum_1_id: None,
            consum_1_count: None,
            procedure_level: None,
            procedure_cost: None,
            price: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("Name", &self.name)?;
        require_non_negative("Cost_Time", self.cost_time)?;
        require_non_negative_int("Plan_Count", self.plan_count)?;
        require_non_negative_int("Plan_Interval", self.plan_interval)?;
        require_non_negative_int("Consum_1_Count", self.consum_1_count.filter(|count| *count != UNSET))?;
        require_non_negative_int("Price", self.price)
    }

    /// A set `Plan_State` means the element is sold as a multi-visit plan.
    pub fn is_plan(&self) -> bool {
        self.plan_state.is_some_and(|state| state != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleItem {
    pub id: i64,
    pub group_id: i64,
    pub release: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    pub element_id: i64,
    pub element_cost: Option<i64>,
    pub price_ratio: Option<f64>,
}

impl BundleItem {
    pub fn new(id: i64, group_id: i64, element_id: i64) -> Self {
        Self {
            id,
            group_id,
            release: true,
            name: None,
            description: None,
            element_id,
            element_cost: None,
            price_ratio: None,
        }
    }

    /// Validates one bundle group and returns its `GroupID`.
    pub fn validate_group(items: &[BundleItem]) -> Result<i64, ValidationError> {
        validate_group_rows(items.iter().map(|item| (item.group_id, item.price_ratio)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomItem {
    pub id: i64,
    pub group_id: i64,
    pub release: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    pub element_id: i64,
    /// How many elements the customer picks from the group.
    pub custom_count: Option<i64>,
    /// Maximum times this element can be picked.
    pub element_limit: Option<i64>,
    pub element_cost: Option<i64>,
    pub price_ratio: Option<f64>,
}

impl CustomItem {
    pub fn new(id: i64, group_id: i64, element_id: i64) -> Self {
        Self {
            id,
            group_id,
            release: true,
            name: None,
            description: None,
            element_id,
            custom_count: None,
            element_limit: None,
            element_cost: None,
            price_ratio: None,
        }
    }

    pub fn validate_group(items: &[CustomItem]) -> Result<i64, ValidationError> {
        for item in items {
            require_non_negative_int("Custom_Count", item.custom_count)?;
            require_non_negative_int("Element_Limit", item.element_limit)?;
        }
        validate_group_rows(items.iter().map(|item| (item.group_id, item.price_ratio)))
    }
}

/// What a sequence step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StepTarget {
    Element(i64),
    /// A bundle `GroupID`.
    Bundle(i64),
    /// A custom `GroupID`.
    Custom(i64),
}

impl StepTarget {
    /// Returns `None` unless exactly one column is set.
    pub fn from_columns(
        element_id: Option<i64>,
        bundle_id: Option<i64>,
        custom_id: Option<i64>,
    ) -> Option<Self> {
        match (element_id, bundle_id, custom_id) {
            (Some(id), None, None) => Some(Self::Element(id)),
            (None, Some(id), None) => Some(Self::Bundle(id)),
            (None, None, Some(id)) => Some(Self::Custom(id)),
            _ => None,
        }
    }

    /// `(Element_ID, Bundle_ID, Custom_ID)`.
    pub fn columns(self) -> (Option<i64>, Option<i64>, Option<i64>) {
        match self {
            Self::Element(id) => (Some(id), None, None),
            Self::Bundle(id) => (None, Some(id), None),
            Self::Custom(id) => (None, None, Some(id)),
        }
    }

    pub fn kind_label(self) -> &'static str {
        match self {
            Self::Element(_) => "element",
            Self::Bundle(_) => "bundle",
            Self::Custom(_) => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub id: i64,
    pub group_id: i64,
    pub release: bool,
    pub step_num: i64,
    pub target: StepTarget,
    /// Days to wait before the next step.
    pub sequence_interval: Option<i64>,
    pub procedure_cost: Option<i64>,
    pub price_ratio: Option<f64>,
}

impl SequenceStep {
    pub fn new(id: i64, group_id: i64, step_num: i64, target: StepTarget) -> Self {
        Self {
            id,
            group_id,
            release: true,
            step_num,
            target,
            sequence_interval: None,
            procedure_cost: None,
            price_ratio: None,
        }
    }

    pub fn validate_group(steps: &[SequenceStep]) -> Result<i64, ValidationError> {
        let group_id = validate_group_rows(steps.iter().map(|step| (step.group_id, step.price_ratio)))?;
        let mut seen = HashSet::new();
        for step in steps {
            require_non_negative_int("Step_Num", Some(step.step_num))?;
            require_non_negative_int("Sequence_Interval", step.sequence_interval)?;
            if !seen.insert(step.step_num) {
                return Err(ValidationError::DuplicateStep {
                    group_id,
                    step_num: step.step_num,
                });
            }
        }
        Ok(group_id)
    }
}

/// Descriptive metadata for a logical procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureInfo {
    pub id: i64,
    pub release: bool,
    pub procedure_id: Option<i64>,
    pub procedure_name: Option<String>,
    pub procedure_description: Option<String>,
    pub precautions: Option<String>,
}

impl ProcedureInfo {
    pub fn validate(&self) -> ValidationResult {
        require_non_negative_int("ID", Some(self.id))?;
        require_non_negative_int("Procedure_ID", self.procedure_id)?;
        require_optional_text("Procedure_Name", self.procedure_name.as_deref())
    }
}

/// Which `Info_*` table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoKind {
    Standard,
    Event,
    Membership,
}

impl InfoKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Standard => "Info_Standard",
            Self::Event => "Info_Event",
            Self::Membership => "Info_Membership",
        }
    }

    pub fn name_column(self) -> &'static str {
        match self {
            Self::Standard => "Product_Standard_Name",
            Self::Event => "Event_Name",
            Self::Membership => "Membership_Name",
        }
    }

    pub fn description_column(self) -> &'static str {
        match self {
            Self::Standard => "Product_Standard_Description",
            Self::Event => "Event_Description",
            Self::Membership => "Membership_Description",
        }
    }
}

/// Name, description and precautions shown for a sellable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRecord {
    pub kind: InfoKind,
    pub id: i64,
    pub release: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    pub precautions: Option<String>,
}

impl InfoRecord {
    pub fn new(kind: InfoKind, id: i64, name: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            release: true,
            name: Some(name.into()),
            description: None,
            precautions: None,
        }
    }

    /// Names are optional, but a given name must not be blank.
    pub fn validate(&self) -> ValidationResult {
        require_non_negative_int("ID", Some(self.id))?;
        require_optional_text(self.kind.name_column(), self.name.as_deref())
    }
}

fn validate_group_rows(
    rows: impl Iterator<Item = (i64, Option<f64>)>,
) -> Result<i64, ValidationError> {
    let mut group = None;
    for (group_id, price_ratio) in rows {
        require_non_negative("Price_Ratio", price_ratio)?;
        match group {
            None => group = Some(group_id),
            Some(expected) if expected != group_id => {
                return Err(ValidationError::MixedGroup {
                    expected,
                    found: group_id,
                })
            }
            Some(_) => {}
        }
    }
    group.ok_or(ValidationError::EmptyGroup(0))
}

#[cfg(test)]
mod tests {
    use super::{
        BundleItem, Consumable, InfoKind, InfoRecord, ProcedureClass, ProcedureElement,
        ProcedureInfo, SequenceStep, StepTarget,
    };
    use crate::model::ValidationError;

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut element = ProcedureElement::new(1, "laser");
        element.cost_time = Some(f64::NAN);
        assert_eq!(
            element.validate(),
            Err(ValidationError::NotFinite("Cost_Time"))
        );
        element.cost_time = Some(f64::INFINITY);
        assert_eq!(
            element.validate(),
            Err(ValidationError::NotFinite("Cost_Time"))
        );

        let mut consumable = Consumable::new(1, "gauze");
        consumable.f_value = Some(f64::NAN);
        assert_eq!(
            consumable.validate(),
            Err(ValidationError::NotFinite("F_Value"))
        );
    }

    #[test]
    fn descriptive_rows_reject_blank_given_text() {
        let mut info = InfoRecord::new(InfoKind::Event, 1, "   ");
        assert_eq!(
            info.validate(),
            Err(ValidationError::EmptyField("Event_Name"))
        );
        info.name = None;
        assert_eq!(info.validate(), Ok(()));

        let procedure = ProcedureInfo {
            id: 1,
            release: true,
            procedure_id: Some(-3),
            procedure_name: None,
            procedure_description: None,
            precautions: None,
        };
        assert!(matches!(
            procedure.validate(),
            Err(ValidationError::Negative {
                field: "Procedure_ID",
                ..
            })
        ));

        let class = ProcedureClass {
            group_id: 1,
            id: 1,
            release: true,
            class_major: Some("주사".to_string()),
            class_sub: Some(String::new()),
            class_detail: None,
            class_type: None,
        };
        assert_eq!(class.validate(), Err(ValidationError::EmptyField("Class_Sub")));
    }

    #[test]
    fn step_target_requires_exactly_one_column() {
        assert_eq!(
            StepTarget::from_columns(None, Some(4), None),
            Some(StepTarget::Bundle(4))
        );
        assert_eq!(StepTarget::from_columns(Some(1), Some(4), None), None);
        assert_eq!(StepTarget::from_columns(None, None, None), None);
    }

    #[test]
    fn bundle_group_rejects_mixed_group_ids() {
        let items = vec![BundleItem::new(1, 10, 100), BundleItem::new(2, 11, 101)];
        assert_eq!(
            BundleItem::validate_group(&items).unwrap_err(),
            ValidationError::MixedGroup {
                expected: 10,
                found: 11
            }
        );
    }

    #[test]
    fn sequence_group_rejects_repeated_step_numbers() {
        let steps = vec![
            SequenceStep::new(1, 5, 1, StepTarget::Element(100)),
            SequenceStep::new(2, 5, 1, StepTarget::Bundle(10)),
        ];
        assert!(matches!(
            SequenceStep::validate_group(&steps),
            Err(ValidationError::DuplicateStep {
                group_id: 5,
                step_num: 1
            })
        ));
    }
}
