//! Procedure search used when picking what a product sells.
//!
//! # Invariants
//! - Only active rows are searched and counted.
//! - Bundle and custom groups appear once, represented by their first
//!   matching row.
//! - Hits are ordered element, bundle, custom, sequence, then by id.

use super::{like_contains, Page, PageRequest, QueryError, QueryResult};
use crate::model::{ProcedureElement, StepTarget};
use crate::repo::procedure_repo::{
    parse_element_row, ProcedureRepository, SqliteProcedureRepository, ELEMENT_SELECT_SQL,
};
use log::debug;
use rusqlite::Connection;
use serde::Serialize;

const LIKE: &str = r"LIKE ?1 ESCAPE '\'";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcedureScope {
    #[default]
    All,
    Element,
    Bundle,
    Custom,
    Sequence,
}

impl ProcedureScope {
    pub fn parse(value: &str) -> QueryResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "element" => Ok(Self::Element),
            "bundle" => Ok(Self::Bundle),
            "custom" => Ok(Self::Custom),
            "sequence" => Ok(Self::Sequence),
            _ => Err(QueryError::InvalidArgument {
                name: "procedure_type",
                value: value.to_string(),
            }),
        }
    }

    fn includes(self, other: ProcedureScope) -> bool {
        self == Self::All || self == other
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchStep {
    pub step_num: i64,
    pub target: StepTarget,
    pub sequence_interval: Option<i64>,
    pub procedure_cost: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureHit {
    #[serde(rename = "type")]
    pub procedure_type: &'static str,
    /// Element `ID`, or the `GroupID` of a bundle, custom or sequence.
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub procedure_cost: i64,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<SearchStep>,
}

impl ProcedureHit {
    fn new(procedure_type: &'static str, id: i64, name: String, category: String) -> Self {
        Self {
            procedure_type,
            id,
            name,
            description: None,
            procedure_cost: 0,
            category,
            class_type: None,
            element_count: None,
            custom_count: None,
            element_limit: None,
            price_ratio: None,
            step_count: None,
            steps: Vec::new(),
        }
    }
}

/// Searches active procedures for `text`.
///
/// A page past the last page is rejected when there are hits.
pub fn search_procedures(
    conn: &Connection,
    text: &str,
    scope: ProcedureScope,
    request: PageRequest,
) -> QueryResult<Page<ProcedureHit>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(QueryError::EmptyQuery);
    }
    let pattern = like_contains(text);

    let mut hits = Vec::new();
    if scope.includes(ProcedureScope::Element) {
        hits.extend(search_elements(conn, &pattern)?);
    }
    if scope.includes(ProcedureScope::Bundle) {
        hits.extend(search_groups(conn, &pattern, GroupTable::Bundle)?);
    }
    if scope.includes(ProcedureScope::Custom) {
        hits.extend(search_groups(conn, &pattern, GroupTable::Custom)?);
    }
    if scope.includes(ProcedureScope::Sequence) {
        hits.extend(search_sequences(conn, &pattern)?);
    }

    debug!(
        "event=procedure_search module=query status=ok hits={} scope={scope:?}",
        hits.len()
    );
    Page::slice_strict(hits, request)
}

fn element_predicate(alias: &str) -> String {
    ["Name", "Class_Major", "Class_Sub", "Class_Detail", "Class_Type", "Description"]
        .iter()
        .map(|column| format!("{alias}{column} {LIKE}"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn category(element: &ProcedureElement) -> String {
    [&element.class_major, &element.class_sub, &element.class_detail]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" > ")
}

fn search_elements(conn: &Connection, pattern: &str) -> QueryResult<Vec<ProcedureHit>> {
    let mut stmt = conn.prepare(&format!(
        "{ELEMENT_SELECT_SQL} WHERE Release = 1 AND ({}) ORDER BY ID ASC;",
        element_predicate("")
    ))?;
    let mut rows = stmt.query([pattern])?;
    let mut hits = Vec::new();
    while let Some(row) = rows.next()? {
        let element = parse_element_row(row)?;
        let mut hit = ProcedureHit::new("element", element.id, element.name.clone(), category(&element));
        hit.description = element.description;
        hit.procedure_cost = element.procedure_cost.unwrap_or(0);
        hit.class_type = element.class_type;
        hits.push(hit);
    }
    Ok(hits)
}

#[derive(Clone, Copy)]
enum GroupTable {
    Bundle,
    Custom,
}

impl GroupTable {
    fn table(self) -> &'static str {
        match self {
            Self::Bundle => "Procedure_Bundle",
            Self::Custom => "Procedure_Custom",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Custom => "custom",
        }
    }

    fn category(self) -> &'static str {
        match self {
            Self::Bundle => "번들",
            Self::Custom => "커스텀",
        }
    }

    fn extra_columns(self) -> &'static str {
        match self {
            Self::Bundle => "NULL AS Custom_Count, NULL AS Element_Limit",
            Self::Custom => "g.Custom_Count, g.Element_Limit",
        }
    }
}

fn search_groups(
    conn: &Connection,
    pattern: &str,
    group: GroupTable,
) -> QueryResult<Vec<ProcedureHit>> {
    let sql = format!(
        "SELECT
            g.GroupID, g.Name, g.Description, g.Price_Ratio, {extra},
            (SELECT COALESCE(SUM(a.Element_Cost), 0) FROM {table} a
              WHERE a.GroupID = g.GroupID AND a.Release = 1) AS Total_Cost,
            (SELECT COUNT(*) FROM {table} a
              WHERE a.GroupID = g.GroupID AND a.Release = 1) AS Element_Count
         FROM {table} g
         WHERE g.ID = (
            SELECT MIN(m.ID) FROM {table} m
            WHERE m.GroupID = g.GroupID AND m.Release = 1
              AND (m.Name {LIKE} OR m.Description {LIKE})
         )
         ORDER BY g.GroupID ASC;",
        extra = group.extra_columns(),
        table = group.table(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([pattern])?;
    let mut hits = Vec::new();
    while let Some(row) = rows.next()? {
        let group_id: i64 = row.get("GroupID")?;
        let name: Option<String> = row.get("Name")?;
        let mut hit = ProcedureHit::new(
            group.label(),
            group_id,
            name.unwrap_or_default(),
            group.category().to_string(),
        );
        hit.description = row.get("Description")?;
        hit.price_ratio = row.get("Price_Ratio")?;
        hit.custom_count = row.get("Custom_Count")?;
        hit.element_limit = row.get("Element_Limit")?;
        hit.procedure_cost = row.get("Total_Cost")?;
        hit.element_count = Some(row.get::<_, i64>("Element_Count")? as usize);
        hits.push(hit);
    }
    Ok(hits)
}

fn search_sequences(conn: &Connection, pattern: &str) -> QueryResult<Vec<ProcedureHit>> {
    let sql = format!(
        "SELECT DISTINCT s.GroupID
         FROM Procedure_Sequence s
         WHERE s.Release = 1 AND (
            EXISTS (SELECT 1 FROM Procedure_Element e
                    WHERE e.ID = s.Element_ID AND e.Release = 1 AND ({element}))
            OR EXISTS (SELECT 1 FROM Procedure_Bundle b
                       WHERE b.GroupID = s.Bundle_ID AND b.Release = 1 AND b.Name {LIKE})
            OR EXISTS (SELECT 1 FROM Procedure_Custom c
                       WHERE c.GroupID = s.Custom_ID AND c.Release = 1 AND c.Name {LIKE})
         )
         ORDER BY s.GroupID ASC;",
        element = element_predicate("e."),
    );
    let mut stmt = conn.prepare(&sql)?;
    let group_ids = stmt
        .query_map([pattern], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let repo = SqliteProcedureRepository::try_new(conn)?;
    let mut hits = Vec::with_capacity(group_ids.len());
    for group_id in group_ids {
        let steps: Vec<SearchStep> = repo
            .get_sequence(group_id)?
            .into_iter()
            .filter(|step| step.release)
            .map(|step| SearchStep {
                step_num: step.step_num,
                target: step.target,
                sequence_interval: step.sequence_interval,
                procedure_cost: step.procedure_cost,
            })
            .collect();
        let mut hit = ProcedureHit::new(
            "sequence",
            group_id,
            format!("시퀀스 {group_id}"),
            "시퀀스".to_string(),
        );
        hit.description = Some(format!("총 {}개 Step으로 구성된 시퀀스", steps.len()));
        hit.procedure_cost = steps.iter().filter_map(|step| step.procedure_cost).sum();
        hit.step_count = Some(steps.len());
        hit.steps = steps;
        hits.push(hit);
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::{category, element_predicate, ProcedureScope};
    use crate::model::ProcedureElement;

    #[test]
    fn scope_parse_accepts_known_types() {
        assert_eq!(ProcedureScope::parse(" Bundle ").unwrap(), ProcedureScope::Bundle);
        assert!(ProcedureScope::parse("package").is_err());
        assert!(ProcedureScope::All.includes(ProcedureScope::Sequence));
        assert!(!ProcedureScope::Element.includes(ProcedureScope::Custom));
    }

    #[test]
    fn category_skips_missing_levels() {
        let mut element = ProcedureElement::new(1, "toning");
        element.class_major = Some("레이저".to_string());
        element.class_detail = Some("토닝".to_string());
        assert_eq!(category(&element), "레이저 > 토닝");
    }

    #[test]
    fn element_predicate_prefixes_alias() {
        let predicate = element_predicate("e.");
        assert!(predicate.starts_with("e.Name LIKE ?1"));
        assert!(predicate.contains("OR e.Description LIKE ?1"));
    }
}
