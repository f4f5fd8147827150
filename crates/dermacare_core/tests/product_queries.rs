mod common;

use common::seeded_catalog;
use dermacare_core::model::{ProductKind, StepTarget};
use dermacare_core::pricing::recalculate_all;
use dermacare_core::query::{
    filter_products, list_products, product_detail, sort_products, ClassFilter, PackageDetail,
    PageRequest, ProductScope, ProductSummary, QueryError, SortField, SortOrder,
};

fn keys(items: &[ProductSummary]) -> Vec<(&'static str, i64)> {
    items.iter().map(|item| (item.product_type, item.id)).collect()
}

#[test]
fn listing_puts_standard_first_and_newest_first() {
    let conn = seeded_catalog();

    let page = list_products(&conn, ProductScope::All, PageRequest::default()).unwrap();
    assert_eq!(
        keys(&page.items),
        vec![
            ("standard", 2),
            ("standard", 1),
            ("standard", 3),
            ("event", 2),
            ("event", 1),
        ]
    );
    assert_eq!(page.pagination.total_count, 5);
    assert_eq!(page.pagination.total_pages, 1);

    let names: Vec<&str> = page
        .items
        .iter()
        .map(|item| item.product_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["시술 2", "사각턱 보톡스 상품", "시술 3", "이벤트 2", "여름 이벤트"]
    );

    assert_eq!(page.items[0].package_type, "번들");
    assert_eq!(page.items[0].class_types, vec!["보톡스", "레이저"]);
    assert_eq!(page.items[2].class_types, vec!["레이저", "보톡스"]);
    assert_eq!(page.items[4].class_types, vec!["보톡스", "필러"]);
    assert_eq!(page.items[4].discount_rate, Some(10.0));
}

#[test]
fn listing_pages_and_scopes() {
    let conn = seeded_catalog();

    let page = list_products(&conn, ProductScope::All, PageRequest::new(2, 2).unwrap()).unwrap();
    assert_eq!(keys(&page.items), vec![("standard", 3), ("event", 2)]);
    assert_eq!(page.pagination.total_pages, 3);

    let past_end = list_products(&conn, ProductScope::All, PageRequest::new(9, 2).unwrap()).unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.pagination.total_count, 5);

    let events = list_products(&conn, ProductScope::Event, PageRequest::default()).unwrap();
    assert_eq!(keys(&events.items), vec![("event", 2), ("event", 1)]);
}

#[test]
fn listing_includes_inactive_products() {
    let conn = seeded_catalog();
    conn.execute("UPDATE Product_Standard SET Release = 0 WHERE ID = 1;", [])
        .unwrap();

    let page = list_products(&conn, ProductScope::Standard, PageRequest::default()).unwrap();
    assert_eq!(page.items.len(), 3);
    assert!(!page.items[1].release);
}

#[test]
fn detail_expands_sequence_steps() {
    let conn = seeded_catalog();
    recalculate_all(&conn).unwrap();

    let detail = product_detail(&conn, ProductKind::Standard, 3).unwrap();
    assert_eq!(detail.package_type, "시퀀스");
    assert_eq!(detail.procedure_cost, Some(132_000));
    assert_eq!(detail.margin, Some(68_000));
    assert_eq!(detail.product_name, None);

    let PackageDetail::Sequence {
        steps,
        sequence_interval,
    } = detail.package
    else {
        panic!("expected a sequence package");
    };
    assert_eq!(sequence_interval, Some(14));
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].target, StepTarget::Element(2));
    assert_eq!(steps[0].procedure_cost, Some(50_000));
    assert_eq!(steps[1].target, StepTarget::Bundle(1));
    let element_ids: Vec<i64> = steps[1].elements.iter().map(|item| item.element_id).collect();
    assert_eq!(element_ids, vec![1, 2]);
    assert_eq!(steps[1].elements[0].element.name, "사각턱 보톡스");
}

#[test]
fn detail_uses_info_or_event_placeholders() {
    let conn = seeded_catalog();

    let standard = product_detail(&conn, ProductKind::Standard, 1).unwrap();
    assert_eq!(standard.product_name.as_deref(), Some("사각턱 보톡스 상품"));
    assert_eq!(standard.precautions.as_deref(), Some("시술 후 마사지 금지"));
    assert_eq!(standard.start_date.as_deref(), Some("2024-01-01"));
    assert!(matches!(standard.package, PackageDetail::Element { ref element } if element.id == 1));

    let event = product_detail(&conn, ProductKind::Event, 2).unwrap();
    assert_eq!(event.product_name.as_deref(), Some("이벤트 상품 2"));
    assert!(event.product_description.is_some());
    assert!(event.precautions.is_some());

    let custom = product_detail(&conn, ProductKind::Event, 1).unwrap();
    let PackageDetail::Custom { custom_name, items } = custom.package else {
        panic!("expected a custom package");
    };
    assert_eq!(custom_name.as_deref(), Some("자유 선택 주사"));
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].custom_count, Some(2));
    assert_eq!(items[1].element.class_type.as_deref(), Some("필러"));

    let bundle = product_detail(&conn, ProductKind::Standard, 2).unwrap();
    assert!(matches!(
        bundle.package,
        PackageDetail::Bundle { ref bundle_name, ref items }
            if bundle_name.as_deref() == Some("보톡스 토닝 패키지") && items.len() == 2
    ));
}

#[test]
fn detail_of_missing_product_is_not_found() {
    let conn = seeded_catalog();
    assert!(matches!(
        product_detail(&conn, ProductKind::Event, 42),
        Err(QueryError::NotFound(_))
    ));
}

#[test]
fn sort_keeps_standard_first_and_nulls_last() {
    let conn = seeded_catalog();

    let by_price = sort_products(
        &conn,
        SortField::Price,
        SortOrder::Desc,
        ProductScope::All,
        PageRequest::default(),
    )
    .unwrap();
    assert_eq!(
        keys(&by_price.items),
        vec![
            ("standard", 3),
            ("standard", 2),
            ("standard", 1),
            ("event", 1),
            ("event", 2),
        ]
    );

    let by_date = sort_products(
        &conn,
        SortField::Date,
        SortOrder::Asc,
        ProductScope::Standard,
        PageRequest::default(),
    )
    .unwrap();
    assert_eq!(
        keys(&by_date.items),
        vec![("standard", 1), ("standard", 2), ("standard", 3)]
    );

    let by_discount = sort_products(
        &conn,
        SortField::Discount,
        SortOrder::Desc,
        ProductScope::Event,
        PageRequest::default(),
    )
    .unwrap();
    assert_eq!(keys(&by_discount.items), vec![("event", 1), ("event", 2)]);

    let by_name = sort_products(
        &conn,
        SortField::Name,
        SortOrder::Asc,
        ProductScope::Standard,
        PageRequest::default(),
    )
    .unwrap();
    assert_eq!(by_name.items[0].product_name, "사각턱 보톡스 상품");
}

#[test]
fn filter_matches_any_element_of_the_package() {
    let conn = seeded_catalog();

    let botox = ClassFilter {
        class_type: Some("보톡스".to_string()),
        ..ClassFilter::default()
    };
    let page = filter_products(&conn, &botox, ProductScope::All, PageRequest::default()).unwrap();
    assert_eq!(
        keys(&page.items),
        vec![
            ("standard", 1),
            ("standard", 2),
            ("standard", 3),
            ("event", 1),
        ]
    );

    let filler = ClassFilter {
        class_major: Some(" 주사 ".to_string()),
        class_sub: Some("필러".to_string()),
        ..ClassFilter::default()
    };
    let page = filter_products(&conn, &filler, ProductScope::All, PageRequest::default()).unwrap();
    assert_eq!(keys(&page.items), vec![("event", 1), ("event", 2)]);

    let nothing = ClassFilter {
        class_detail: Some("없는 부위".to_string()),
        ..ClassFilter::default()
    };
    let page = filter_products(&conn, &nothing, ProductScope::All, PageRequest::default()).unwrap();
    assert!(page.items.is_empty());
}

#[test]
fn filter_without_criteria_is_rejected() {
    let conn = seeded_catalog();
    let blank = ClassFilter {
        class_major: Some("   ".to_string()),
        ..ClassFilter::default()
    };
    assert!(matches!(
        filter_products(&conn, &blank, ProductScope::All, PageRequest::default()),
        Err(QueryError::MissingCriteria)
    ));
}
