//! Product listing and product detail.
//!
//! # Invariants
//! - Listings order each kind by window start date, newest first, with
//!   undated products last and ties broken by `ID`.
//! - `class_types` keeps first-seen order and at most
//!   [`MAX_CLASS_TYPES`] entries.

use super::{Page, PageRequest, ProductScope, QueryError, QueryResult};
use crate::model::{
    PackageRef, PackageType, Product, ProductKind, ProcedureElement, StepTarget,
};
use crate::repo::procedure_repo::{
    parse_element_row, ProcedureRepository, SqliteProcedureRepository, ELEMENT_SELECT_SQL,
};
use crate::repo::product_repo::{ProductRepository, SqliteProductRepository};
use crate::repo::reference_repo::{ReferenceRepository, SqliteReferenceRepository};
use rusqlite::Connection;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

pub const MAX_CLASS_TYPES: usize = 3;

const EVENT_DESCRIPTION_PLACEHOLDER: &str = "이벤트 상품 설명이 없습니다.";
const PRECAUTIONS_PLACEHOLDER: &str = "주의사항이 없습니다.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Product_Type")]
    pub product_type: &'static str,
    #[serde(rename = "Package_Type")]
    pub package_type: &'static str,
    #[serde(rename = "Release")]
    pub release: bool,
    #[serde(rename = "Sell_Price")]
    pub sell_price: Option<i64>,
    #[serde(rename = "Original_Price")]
    pub original_price: Option<i64>,
    #[serde(rename = "Discount_Rate")]
    pub discount_rate: Option<f64>,
    #[serde(rename = "Product_Name")]
    pub product_name: String,
    pub class_types: Vec<String>,
    #[serde(skip)]
    pub(crate) kind: ProductKind,
    #[serde(skip)]
    pub(crate) start_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementDetail {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Class_Major")]
    pub class_major: Option<String>,
    #[serde(rename = "Class_Sub")]
    pub class_sub: Option<String>,
    #[serde(rename = "Class_Detail")]
    pub class_detail: Option<String>,
    #[serde(rename = "Class_Type")]
    pub class_type: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Cost_Time")]
    pub cost_time: Option<f64>,
    #[serde(rename = "Plan_State")]
    pub plan_state: Option<i64>,
    #[serde(rename = "Plan_Count")]
    pub plan_count: Option<i64>,
    #[serde(rename = "Plan_Interval")]
    pub plan_interval: Option<i64>,
    #[serde(rename = "Procedure_Cost")]
    pub procedure_cost: Option<i64>,
    #[serde(rename = "Price")]
    pub price: Option<i64>,
}

impl From<&ProcedureElement> for ElementDetail {
    fn from(element: &ProcedureElement) -> Self {
        Self {
            id: element.id,
            class_major: element.class_major.clone(),
            class_sub: element.class_sub.clone(),
            class_detail: element.class_detail.clone(),
            class_type: element.class_type.clone(),
            name: element.name.clone(),
            cost_time: element.cost_time,
            plan_state: element.plan_state,
            plan_count: element.plan_count,
            plan_interval: element.plan_interval,
            procedure_cost: element.procedure_cost,
            price: element.price,
        }
    }
}

/// One row of a bundle or custom group with its element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupItemDetail {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Element_ID")]
    pub element_id: i64,
    #[serde(rename = "Element_Cost")]
    pub element_cost: Option<i64>,
    #[serde(rename = "Custom_Count", skip_serializing_if = "Option::is_none")]
    pub custom_count: Option<i64>,
    #[serde(rename = "Element_Limit", skip_serializing_if = "Option::is_none")]
    pub element_limit: Option<i64>,
    #[serde(rename = "Element_Info")]
    pub element: ElementDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceStepDetail {
    #[serde(rename = "Step_Num")]
    pub step_num: i64,
    pub target: StepTarget,
    #[serde(rename = "Procedure_Cost")]
    pub procedure_cost: Option<i64>,
    pub elements: Vec<GroupItemDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageDetail {
    Element {
        element: ElementDetail,
    },
    Bundle {
        bundle_name: Option<String>,
        items: Vec<GroupItemDetail>,
    },
    Custom {
        custom_name: Option<String>,
        items: Vec<GroupItemDetail>,
    },
    Sequence {
        steps: Vec<SequenceStepDetail>,
        /// Revisit interval taken from the first step.
        sequence_interval: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetail {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Product_Type")]
    pub product_type: &'static str,
    #[serde(rename = "Release")]
    pub release: bool,
    #[serde(rename = "Package_Type")]
    pub package_type: &'static str,
    #[serde(rename = "Sell_Price")]
    pub sell_price: Option<i64>,
    #[serde(rename = "Original_Price")]
    pub original_price: Option<i64>,
    #[serde(rename = "Discount_Rate")]
    pub discount_rate: Option<f64>,
    #[serde(rename = "Procedure_Cost")]
    pub procedure_cost: Option<i64>,
    #[serde(rename = "Margin")]
    pub margin: Option<i64>,
    #[serde(rename = "Margin_Rate")]
    pub margin_rate: Option<f64>,
    #[serde(rename = "Validity_Period")]
    pub validity_period: Option<i64>,
    #[serde(rename = "VAT")]
    pub vat: Option<i64>,
    #[serde(rename = "Covered_Type")]
    pub covered_type: Option<String>,
    #[serde(rename = "Taxable_Type")]
    pub taxable_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(rename = "Product_Name")]
    pub product_name: Option<String>,
    #[serde(rename = "Product_Description")]
    pub product_description: Option<String>,
    #[serde(rename = "Precautions")]
    pub precautions: Option<String>,
    pub package: PackageDetail,
}

/// Lists products of `scope`, standard before event.
pub fn list_products(
    conn: &Connection,
    scope: ProductScope,
    request: PageRequest,
) -> QueryResult<Page<ProductSummary>> {
    let summaries = load_summaries(conn, scope)?;
    Ok(Page::slice(summaries, request))
}

/// Every product of `scope` as a summary, each kind in listing order.
pub(crate) fn load_summaries(
    conn: &Connection,
    scope: ProductScope,
) -> QueryResult<Vec<ProductSummary>> {
    let repo = SqliteProductRepository::try_new(conn)?;
    let mut summaries = Vec::new();
    for &kind in scope.kinds() {
        let mut products = repo.list_products(kind, false)?;
        products.sort_by(|left, right| {
            newest_first(&left.start_date, &right.start_date).then(left.id.cmp(&right.id))
        });
        summaries.extend(summarize_products(conn, kind, products)?);
    }
    Ok(summaries)
}

/// Summaries of `products`, all of one `kind`, in the given order.
pub(crate) fn summarize_products(
    conn: &Connection,
    kind: ProductKind,
    products: Vec<Product>,
) -> QueryResult<Vec<ProductSummary>> {
    let names = info_names(conn, kind)?;
    let mut summaries = Vec::with_capacity(products.len());
    for product in products {
        let class_types = class_types(conn, product.package)?;
        summaries.push(summarize(product, &names, class_types));
    }
    Ok(summaries)
}

fn newest_first(left: &Option<String>, right: &Option<String>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => right.cmp(left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn summarize(
    product: Product,
    names: &HashMap<i64, String>,
    class_types: Vec<String>,
) -> ProductSummary {
    let product_name = product
        .info_id
        .and_then(|info_id| names.get(&info_id).cloned())
        .unwrap_or_else(|| fallback_name(product.kind, product.id));
    ProductSummary {
        id: product.id,
        product_type: product.kind.as_str(),
        package_type: product.package.package_type().label(),
        release: product.release,
        sell_price: product.sell_price,
        original_price: product.original_price,
        discount_rate: product.discount_rate,
        product_name,
        class_types,
        kind: product.kind,
        start_date: product.start_date,
    }
}

fn fallback_name(kind: ProductKind, id: i64) -> String {
    match kind {
        ProductKind::Standard => format!("시술 {id}"),
        ProductKind::Event => format!("이벤트 {id}"),
    }
}

/// Non-blank info names keyed by info `ID`.
fn info_names(conn: &Connection, kind: ProductKind) -> QueryResult<HashMap<i64, String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT ID, {name} FROM {table} WHERE TRIM(COALESCE({name}, '')) <> '';",
        name = kind.info_name_column(),
        table = kind.info_table(),
    ))?;
    let names = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(names)
}

fn class_types(conn: &Connection, package: PackageRef) -> QueryResult<Vec<String>> {
    let mut types: Vec<String> = Vec::new();
    for element in package_elements(conn, package)? {
        let Some(class_type) = element.class_type else {
            continue;
        };
        if !types.contains(&class_type) {
            types.push(class_type);
        }
        if types.len() == MAX_CLASS_TYPES {
            break;
        }
    }
    Ok(types)
}

/// Element ids reachable from a package, in display order, duplicates kept.
///
/// Sequence steps expand bundle and custom steps into their items.
pub(crate) fn package_element_ids(conn: &Connection, package: PackageRef) -> QueryResult<Vec<i64>> {
    let sql = match package.package_type() {
        PackageType::Element => "SELECT ID FROM Procedure_Element WHERE ID = ?1;",
        PackageType::Bundle => {
            "SELECT Element_ID FROM Procedure_Bundle WHERE GroupID = ?1 ORDER BY ID ASC;"
        }
        PackageType::Custom => {
            "SELECT Element_ID FROM Procedure_Custom WHERE GroupID = ?1 ORDER BY ID ASC;"
        }
        PackageType::Sequence => {
            "SELECT COALESCE(s.Element_ID, b.Element_ID, c.Element_ID) AS Element_ID
             FROM Procedure_Sequence s
             LEFT JOIN Procedure_Bundle b ON b.GroupID = s.Bundle_ID
             LEFT JOIN Procedure_Custom c ON c.GroupID = s.Custom_ID
             WHERE s.GroupID = ?1
               AND COALESCE(s.Element_ID, b.Element_ID, c.Element_ID) IS NOT NULL
             ORDER BY s.Step_Num ASC, s.ID ASC, b.ID ASC, c.ID ASC;"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([package.target_id()], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Elements reachable from a package, in display order.
pub(crate) fn package_elements(
    conn: &Connection,
    package: PackageRef,
) -> QueryResult<Vec<ProcedureElement>> {
    let ids = package_element_ids(conn, package)?;
    let elements = load_elements(conn, &ids)?;
    Ok(ids
        .iter()
        .filter_map(|id| elements.get(id).cloned())
        .collect())
}

fn load_elements(conn: &Connection, ids: &[i64]) -> QueryResult<HashMap<i64, ProcedureElement>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut stmt = conn.prepare(&format!(
        "{ELEMENT_SELECT_SQL} WHERE ID IN (SELECT value FROM json_each(?1));"
    ))?;
    let mut rows = stmt.query([serde_json::Value::from(ids.to_vec())])?;
    let mut elements = HashMap::new();
    while let Some(row) = rows.next()? {
        let element = parse_element_row(row)?;
        elements.insert(element.id, element);
    }
    Ok(elements)
}

/// Full product view with its package expanded down to elements.
pub fn product_detail(conn: &Connection, kind: ProductKind, id: i64) -> QueryResult<ProductDetail> {
    let product = SqliteProductRepository::try_new(conn)?
        .get_product(kind, id)?
        .ok_or_else(|| QueryError::NotFound(format!("{} {id}", kind.table())))?;

    let info = match product.info_id {
        Some(info_id) => SqliteReferenceRepository::try_new(conn)?.get_info(kind.info_kind(), info_id)?,
        None => None,
    };
    let (product_name, product_description, precautions) = match (kind, info) {
        (_, Some(info)) => (info.name, info.description, info.precautions),
        (ProductKind::Event, None) => (
            Some(format!("이벤트 상품 {id}")),
            Some(EVENT_DESCRIPTION_PLACEHOLDER.to_string()),
            Some(PRECAUTIONS_PLACEHOLDER.to_string()),
        ),
        (ProductKind::Standard, None) => (None, None, None),
    };

    let package = package_detail(conn, product.package)?;

    Ok(ProductDetail {
        id: product.id,
        product_type: kind.as_str(),
        release: product.release,
        package_type: product.package.package_type().label(),
        sell_price: product.sell_price,
        original_price: product.original_price,
        discount_rate: product.discount_rate,
        procedure_cost: product.procedure_cost,
        margin: product.margin,
        margin_rate: product.margin_rate,
        validity_period: product.validity_period,
        vat: product.vat,
        covered_type: product.covered_type,
        taxable_type: product.taxable_type,
        start_date: product.start_date,
        end_date: product.end_date,
        product_name,
        product_description,
        precautions,
        package,
    })
}

fn package_detail(conn: &Connection, package: PackageRef) -> QueryResult<PackageDetail> {
    let repo = SqliteProcedureRepository::try_new(conn)?;
    match package {
        PackageRef::Element(element_id) => Ok(PackageDetail::Element {
            element: ElementDetail::from(&require_element(&repo, element_id)?),
        }),
        PackageRef::Bundle(group_id) => {
            let (name, items) = bundle_items(&repo, group_id)?;
            Ok(PackageDetail::Bundle {
                bundle_name: name,
                items,
            })
        }
        PackageRef::Custom(group_id) => {
            let (name, items) = custom_items(&repo, group_id)?;
            Ok(PackageDetail::Custom {
                custom_name: name,
                items,
            })
        }
        PackageRef::Sequence(group_id) => {
            let steps = repo.get_sequence(group_id)?;
            if steps.is_empty() {
                return Err(QueryError::NotFound(format!("sequence group {group_id}")));
            }
            let sequence_interval = steps.first().and_then(|step| step.sequence_interval);
            let mut details = Vec::with_capacity(steps.len());
            for step in steps {
                let elements = match step.target {
                    StepTarget::Element(element_id) => {
                        let element = require_element(&repo, element_id)?;
                        vec![GroupItemDetail {
                            id: step.id,
                            element_id,
                            element_cost: element.procedure_cost,
                            custom_count: None,
                            element_limit: None,
                            element: ElementDetail::from(&element),
                        }]
                    }
                    StepTarget::Bundle(bundle_id) => bundle_items(&repo, bundle_id)?.1,
                    StepTarget::Custom(custom_id) => custom_items(&repo, custom_id)?.1,
                };
                details.push(SequenceStepDetail {
                    step_num: step.step_num,
                    target: step.target,
                    procedure_cost: step.procedure_cost,
                    elements,
                });
            }
            Ok(PackageDetail::Sequence {
                steps: details,
                sequence_interval,
            })
        }
    }
}

fn require_element(
    repo: &SqliteProcedureRepository<'_>,
    element_id: i64,
) -> QueryResult<ProcedureElement> {
    repo.get_element(element_id)?
        .ok_or_else(|| QueryError::NotFound(format!("Procedure_Element {element_id}")))
}

fn bundle_items(
    repo: &SqliteProcedureRepository<'_>,
    group_id: i64,
) -> QueryResult<(Option<String>, Vec<GroupItemDetail>)> {
    let items = repo.get_bundle(group_id)?;
    if items.is_empty() {
        return Err(QueryError::NotFound(format!("bundle group {group_id}")));
    }
    let name = items.first().and_then(|item| item.name.clone());
    let mut details = Vec::with_capacity(items.len());
    for item in items {
        let element = require_element(repo, item.element_id)?;
        details.push(GroupItemDetail {
            id: item.id,
            element_id: item.element_id,
            element_cost: item.element_cost,
            custom_count: None,
            element_limit: None,
            element: ElementDetail::from(&element),
        });
    }
    Ok((name, details))
}

fn custom_items(
    repo: &SqliteProcedureRepository<'_>,
    group_id: i64,
) -> QueryResult<(Option<String>, Vec<GroupItemDetail>)> {
    let items = repo.get_custom(group_id)?;
    if items.is_empty() {
        return Err(QueryError::NotFound(format!("custom group {group_id}")));
    }
    let name = items.first().and_then(|item| item.name.clone());
    let mut details = Vec::with_capacity(items.len());
    for item in items {
        let element = require_element(repo, item.element_id)?;
        details.push(GroupItemDetail {
            id: item.id,
            element_id: item.element_id,
            element_cost: item.element_cost,
            custom_count: item.custom_count,
            element_limit: item.element_limit,
            element: ElementDetail::from(&element),
        });
    }
    Ok((name, details))
}
