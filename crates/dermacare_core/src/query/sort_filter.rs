//! Sorted and class-filtered product listings.

use super::products::{load_summaries, package_elements, summarize_products, ProductSummary};
use super::{Page, PageRequest, ProductScope, QueryError, QueryResult};
use crate::model::{ProcedureElement, ProductKind};
use crate::repo::product_repo::{ProductRepository, SqliteProductRepository};
use rusqlite::Connection;
use serde::Deserialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Name,
    Date,
    Type,
    Discount,
}

impl SortField {
    pub fn parse(value: &str) -> QueryResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(Self::Price),
            "name" => Ok(Self::Name),
            "date" => Ok(Self::Date),
            "type" => Ok(Self::Type),
            "discount" => Ok(Self::Discount),
            _ => Err(QueryError::InvalidArgument {
                name: "sort_by",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> QueryResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(QueryError::InvalidArgument {
                name: "order",
                value: value.to_string(),
            }),
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Orders present values by `order` and puts missing values last either way.
fn nulls_last<T: PartialOrd>(left: Option<T>, right: Option<T>, order: SortOrder) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => {
            order.apply(left.partial_cmp(&right).unwrap_or(Ordering::Equal))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn kind_rank(kind: ProductKind) -> u8 {
    match kind {
        ProductKind::Standard => 0,
        ProductKind::Event => 1,
    }
}

fn compare(left: &ProductSummary, right: &ProductSummary, field: SortField, order: SortOrder) -> Ordering {
    let by_field = match field {
        SortField::Price => nulls_last(left.sell_price, right.sell_price, order),
        SortField::Name => nulls_last(
            Some(left.product_name.as_str()),
            Some(right.product_name.as_str()),
            order,
        ),
        SortField::Date => nulls_last(left.start_date.as_deref(), right.start_date.as_deref(), order),
        SortField::Type => nulls_last(Some(left.package_type), Some(right.package_type), order),
        SortField::Discount => nulls_last(left.discount_rate, right.discount_rate, order),
    };
    kind_rank(left.kind)
        .cmp(&kind_rank(right.kind))
        .then(by_field)
        .then(left.id.cmp(&right.id))
}

/// Products of `scope` ordered by one field, standard products first.
pub fn sort_products(
    conn: &Connection,
    field: SortField,
    order: SortOrder,
    scope: ProductScope,
    request: PageRequest,
) -> QueryResult<Page<ProductSummary>> {
    let mut summaries = load_summaries(conn, scope)?;
    summaries.sort_by(|left, right| compare(left, right, field, order));
    Ok(Page::slice(summaries, request))
}

/// Exact-match classification criteria; blank values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClassFilter {
    pub class_major: Option<String>,
    pub class_sub: Option<String>,
    pub class_detail: Option<String>,
    pub class_type: Option<String>,
}

impl ClassFilter {
    fn criteria(&self) -> [Option<&str>; 4] {
        [
            non_blank(&self.class_major),
            non_blank(&self.class_sub),
            non_blank(&self.class_detail),
            non_blank(&self.class_type),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.criteria().iter().all(Option::is_none)
    }

    /// True when the element satisfies every given criterion.
    pub fn matches(&self, element: &ProcedureElement) -> bool {
        self.criteria()
            .into_iter()
            .zip(class_values(element))
            .all(|(wanted, actual)| match wanted {
                Some(wanted) => actual.map(str::trim) == Some(wanted),
                None => true,
            })
    }
}

fn class_values(element: &ProcedureElement) -> [Option<&str>; 4] {
    [
        element.class_major.as_deref(),
        element.class_sub.as_deref(),
        element.class_detail.as_deref(),
        element.class_type.as_deref(),
    ]
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Products whose package reaches an element matching `filter`.
pub fn filter_products(
    conn: &Connection,
    filter: &ClassFilter,
    scope: ProductScope,
    request: PageRequest,
) -> QueryResult<Page<ProductSummary>> {
    if filter.is_empty() {
        return Err(QueryError::MissingCriteria);
    }

    let repo = SqliteProductRepository::try_new(conn)?;
    let mut matched = Vec::new();
    for &kind in scope.kinds() {
        let mut products = Vec::new();
        for product in repo.list_products(kind, false)? {
            let elements = package_elements(conn, product.package)?;
            if elements.iter().any(|element| filter.matches(element)) {
                products.push(product);
            }
        }
        matched.extend(summarize_products(conn, kind, products)?);
    }
    Ok(Page::slice(matched, request))
}

#[cfg(test)]
mod tests {
    use super::{nulls_last, ClassFilter, SortField, SortOrder};
    use crate::model::ProcedureElement;
    use std::cmp::Ordering;

    #[test]
    fn nulls_sort_last_in_both_directions() {
        assert_eq!(nulls_last(Some(1), None, SortOrder::Asc), Ordering::Less);
        assert_eq!(nulls_last(Some(1), None, SortOrder::Desc), Ordering::Less);
        assert_eq!(nulls_last(Some(1), Some(2), SortOrder::Desc), Ordering::Greater);
    }

    #[test]
    fn class_filter_requires_all_given_criteria() {
        let mut element = ProcedureElement::new(1, "toning");
        element.class_major = Some("레이저".to_string());
        element.class_type = Some("미백".to_string());

        let filter = ClassFilter {
            class_major: Some("레이저".to_string()),
            class_type: Some(" 미백 ".to_string()),
            ..ClassFilter::default()
        };
        assert!(filter.matches(&element));

        let strict = ClassFilter {
            class_sub: Some("피코".to_string()),
            ..filter.clone()
        };
        assert!(!strict.matches(&element));
    }

    #[test]
    fn blank_criteria_do_not_count() {
        let filter = ClassFilter {
            class_major: Some("  ".to_string()),
            ..ClassFilter::default()
        };
        assert!(filter.is_empty());
        assert_eq!(SortField::parse("DISCOUNT").unwrap(), SortField::Discount);
        assert!(SortOrder::parse("up").is_err());
    }
}
