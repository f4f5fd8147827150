mod common;

use common::seeded_catalog;
use dermacare_core::pricing::recalculate_all;
use dermacare_core::query::{search_procedures, PageRequest, ProcedureScope, QueryError};

#[test]
fn search_spans_elements_groups_and_sequences() {
    let conn = seeded_catalog();
    recalculate_all(&conn).unwrap();

    let page = search_procedures(&conn, "보톡스", ProcedureScope::All, PageRequest::default()).unwrap();
    let hits: Vec<(&str, i64)> = page
        .items
        .iter()
        .map(|hit| (hit.procedure_type, hit.id))
        .collect();
    assert_eq!(hits, vec![("element", 1), ("bundle", 1), ("sequence", 1)]);

    let element = &page.items[0];
    assert_eq!(element.category, "주사 > 보톡스 > 사각턱");
    assert_eq!(element.class_type.as_deref(), Some("보톡스"));
    assert_eq!(element.procedure_cost, 32_000);

    let bundle = &page.items[1];
    assert_eq!(bundle.name, "보톡스 토닝 패키지");
    assert_eq!(bundle.element_count, Some(2));
    assert_eq!(bundle.procedure_cost, 82_000);

    let sequence = &page.items[2];
    assert_eq!(sequence.name, "시퀀스 1");
    assert_eq!(sequence.step_count, Some(2));
    assert_eq!(sequence.procedure_cost, 132_000);
    assert_eq!(sequence.steps[0].sequence_interval, Some(14));
}

#[test]
fn search_skips_inactive_rows() {
    let conn = seeded_catalog();

    let page = search_procedures(&conn, "레이저", ProcedureScope::Element, PageRequest::default())
        .unwrap();
    let ids: Vec<i64> = page.items.iter().map(|hit| hit.id).collect();
    assert_eq!(ids, vec![2]);

    let none = search_procedures(&conn, "제모", ProcedureScope::All, PageRequest::default()).unwrap();
    assert!(none.items.is_empty());
    assert_eq!(none.pagination.total_pages, 0);
}

#[test]
fn group_hit_uses_first_active_matching_row() {
    let conn = seeded_catalog();
    conn.execute("UPDATE Procedure_Bundle SET Release = 0 WHERE ID = 1;", [])
        .unwrap();

    let page = search_procedures(&conn, "토닝 패키지", ProcedureScope::Bundle, PageRequest::default())
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].description, None);
    assert_eq!(page.items[0].element_count, Some(1));
}

#[test]
fn custom_hits_carry_selection_limits() {
    let conn = seeded_catalog();
    recalculate_all(&conn).unwrap();

    let page = search_procedures(&conn, "자유", ProcedureScope::Custom, PageRequest::default()).unwrap();
    assert_eq!(page.items.len(), 1);
    let hit = &page.items[0];
    assert_eq!(hit.category, "커스텀");
    assert_eq!(hit.custom_count, Some(2));
    assert_eq!(hit.element_limit, Some(1));
    assert_eq!(hit.procedure_cost, 72_000);
}

#[test]
fn like_wildcards_match_literally() {
    let conn = seeded_catalog();
    let page = search_procedures(&conn, "%", ProcedureScope::All, PageRequest::default()).unwrap();
    assert!(page.items.is_empty());
}

#[test]
fn blank_query_and_page_past_end_are_rejected() {
    let conn = seeded_catalog();

    assert!(matches!(
        search_procedures(&conn, "   ", ProcedureScope::All, PageRequest::default()),
        Err(QueryError::EmptyQuery)
    ));
    assert!(matches!(
        search_procedures(&conn, "보톡스", ProcedureScope::All, PageRequest::new(2, 3).unwrap()),
        Err(QueryError::InvalidPage {
            page: 2,
            total_pages: 1
        })
    ));
}
