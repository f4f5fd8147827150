//! Generic enum lookup codes.
//!
//! The `Enum` table simulates several enumerated types with one
//! `(Enum_Type, Code)` keyed table. Well-known axes get a variant; axes that
//! only appear in an imported enum sheet are kept verbatim.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Code gap between consecutive values of one enum type.
pub const ENUM_CODE_STEP: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EnumType {
    ClassMajor,
    ClassSub,
    ClassDetail,
    ClassType,
    PositionType,
    UnitType,
    PackageType,
    ProcedureLevel,
    TaxableType,
    CoveredType,
    Custom(String),
}

impl EnumType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClassMajor => "ClassMajor",
            Self::ClassSub => "ClassSub",
            Self::ClassDetail => "ClassDetail",
            Self::ClassType => "ClassType",
            Self::PositionType => "PositionType",
            Self::UnitType => "UnitType",
            Self::PackageType => "PackageType",
            Self::ProcedureLevel => "ProcedureLevel",
            Self::TaxableType => "TaxableType",
            Self::CoveredType => "CoveredType",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Accepts `PositionType`, `position_type` and `Position_Type`.
    pub fn parse(value: &str) -> Self {
        let folded: String = value
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != ' ')
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "classmajor" => Self::ClassMajor,
            "classsub" => Self::ClassSub,
            "classdetail" => Self::ClassDetail,
            "classtype" => Self::ClassType,
            "positiontype" => Self::PositionType,
            "unittype" => Self::UnitType,
            "packagetype" => Self::PackageType,
            "procedurelevel" => Self::ProcedureLevel,
            "taxabletype" => Self::TaxableType,
            "coveredtype" => Self::CoveredType,
            _ => Self::Custom(value.trim().to_string()),
        }
    }
}

impl Display for EnumType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EnumType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<EnumType> for String {
    fn from(value: EnumType) -> Self {
        value.as_str().to_string()
    }
}

/// One row of the `Enum` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumCode {
    pub enum_type: EnumType,
    pub code: i64,
    pub name: String,
}

/// Code assigned to the value at `index` (zero-based) of an enum column.
pub fn code_for_position(index: usize) -> i64 {
    (index as i64 + 1) * ENUM_CODE_STEP
}
