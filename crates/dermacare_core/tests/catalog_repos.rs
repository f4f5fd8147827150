mod common;

use common::{count, seeded_catalog};
use dermacare_core::model::{
    Consumable, EnumCode, EnumType, InfoKind, InfoRecord, PackageRef, ProcedureInfo, ProductKind,
    StepTarget, ValidationError,
};
use dermacare_core::repo::enum_repo::{EnumRepository, SqliteEnumRepository};
use dermacare_core::repo::procedure_repo::{ProcedureRepository, SqliteProcedureRepository};
use dermacare_core::repo::product_repo::{ProductRepository, SqliteProductRepository};
use dermacare_core::repo::reference_repo::{ReferenceRepository, SqliteReferenceRepository};
use dermacare_core::{DbError, RepoError};
use rusqlite::Connection;

#[test]
fn repositories_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteProcedureRepository::try_new(&conn),
        Err(RepoError::Db(DbError::UninitializedConnection { .. }))
    ));
    assert!(SqliteEnumRepository::try_new(&conn).is_err());
}

#[test]
fn enum_codes_resolve_both_ways() {
    let conn = seeded_catalog();
    let repo = SqliteEnumRepository::try_new(&conn).unwrap();

    let positions: Vec<(i64, String)> = repo
        .list_codes(Some(&EnumType::PositionType))
        .unwrap()
        .into_iter()
        .map(|code| (code.code, code.name))
        .collect();
    assert_eq!(
        positions,
        vec![(10, "의사".to_string()), (20, "관리사".to_string())]
    );
    assert_eq!(repo.list_codes(None).unwrap().len(), 20);

    let custom = repo.get_code(&EnumType::PackageType, 30).unwrap().unwrap();
    assert_eq!(custom.name, "커스텀");
    assert_eq!(repo.get_code(&EnumType::PackageType, 35).unwrap(), None);
    assert_eq!(
        repo.resolve_name(&EnumType::TaxableType, " 면세 ").unwrap(),
        Some(20)
    );
}

#[test]
fn enum_codes_accept_unknown_axes() {
    let conn = seeded_catalog();
    let repo = SqliteEnumRepository::try_new(&conn).unwrap();

    repo.upsert_code(&EnumCode {
        enum_type: EnumType::parse("Skin_Type"),
        code: 10,
        name: "건성".to_string(),
    })
    .unwrap();
    repo.upsert_code(&EnumCode {
        enum_type: EnumType::Custom("Skin_Type".to_string()),
        code: 10,
        name: "지성".to_string(),
    })
    .unwrap();

    let types = repo.list_types().unwrap();
    assert!(types.contains(&EnumType::Custom("Skin_Type".to_string())));
    assert!(types.contains(&EnumType::UnitType));
    assert_eq!(
        repo.resolve_name(&EnumType::Custom("Skin_Type".to_string()), "지성")
            .unwrap(),
        Some(10)
    );

    let blank = EnumCode {
        enum_type: EnumType::UnitType,
        code: 60,
        name: "  ".to_string(),
    };
    assert!(matches!(
        repo.upsert_code(&blank),
        Err(RepoError::Validation(ValidationError::EmptyField("Name")))
    ));
}

#[test]
fn consumables_and_rates_round_trip() {
    let conn = seeded_catalog();
    let repo = SqliteReferenceRepository::try_new(&conn).unwrap();

    let global = repo.global_settings().unwrap();
    assert_eq!(global.doc_price_minute, 1_000.0);
    assert_eq!(global.aesthetician_price_minute, 500.0);

    let mut gauze = Consumable::new(3, " 거즈 ");
    gauze.i_value = Some(100);
    gauze.price = Some(5_000);
    repo.upsert_consumable(&gauze).unwrap();
    assert_eq!(repo.get_consumable(3).unwrap().unwrap().name, "거즈");

    let mut syringe = repo.get_consumable(2).unwrap().unwrap();
    assert_eq!(syringe.i_value, Some(-1));
    syringe.release = false;
    repo.upsert_consumable(&syringe).unwrap();

    let active: Vec<i64> = repo
        .list_consumables(true)
        .unwrap()
        .iter()
        .map(|consumable| consumable.id)
        .collect();
    assert_eq!(active, vec![1, 3]);
    assert_eq!(repo.list_consumables(false).unwrap().len(), 3);
    assert_eq!(repo.get_consumable(9).unwrap(), None);

    gauze.price = Some(-1);
    assert!(matches!(
        repo.upsert_consumable(&gauze),
        Err(RepoError::Validation(ValidationError::Negative { field: "Price", .. }))
    ));
}

#[test]
fn info_records_map_to_their_tables() {
    let conn = seeded_catalog();
    let repo = SqliteReferenceRepository::try_new(&conn).unwrap();

    let mut promo = InfoRecord::new(InfoKind::Standard, 2, "토닝 패키지 상품");
    promo.precautions = Some("시술 당일 세안 금지".to_string());
    repo.upsert_info(&promo).unwrap();

    let ids: Vec<i64> = repo
        .list_info(InfoKind::Standard)
        .unwrap()
        .iter()
        .map(|info| info.id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(repo.get_info(InfoKind::Standard, 2).unwrap(), Some(promo));

    let event = repo.get_info(InfoKind::Event, 1).unwrap().unwrap();
    assert_eq!(event.name.as_deref(), Some("여름 이벤트"));
    assert_eq!(event.description.as_deref(), Some("여름 한정"));
    assert_eq!(repo.get_info(InfoKind::Membership, 2).unwrap(), None);

    let procedure = ProcedureInfo {
        id: 1,
        release: true,
        procedure_id: Some(1),
        procedure_name: Some("사각턱 보톡스".to_string()),
        procedure_description: None,
        precautions: Some("음주 금지".to_string()),
    };
    repo.upsert_procedure_info(&procedure).unwrap();
    assert_eq!(repo.get_procedure_info(1).unwrap(), Some(procedure));
    assert_eq!(count(&conn, "Procedure_Info"), 1);
}

#[test]
fn info_writes_are_validated() {
    let conn = seeded_catalog();
    let repo = SqliteReferenceRepository::try_new(&conn).unwrap();

    let blank = InfoRecord::new(InfoKind::Membership, 5, " ");
    assert!(matches!(
        repo.upsert_info(&blank),
        Err(RepoError::Validation(ValidationError::EmptyField("Membership_Name")))
    ));
    assert_eq!(repo.get_info(InfoKind::Membership, 5).unwrap(), None);

    let procedure = ProcedureInfo {
        id: 2,
        release: true,
        procedure_id: Some(-1),
        procedure_name: Some("토닝".to_string()),
        procedure_description: None,
        precautions: None,
    };
    assert!(repo.upsert_procedure_info(&procedure).is_err());
    assert_eq!(count(&conn, "Procedure_Info"), 0);
}

#[test]
fn procedure_reads_follow_display_order() {
    let conn = seeded_catalog();
    conn.execute_batch(
        "INSERT INTO Procedure_Class (GroupID, ID, Release, Class_Major, Class_Sub) VALUES
            (2, 1, 1, '레이저', '토닝'),
            (1, 2, 1, '주사', '필러'),
            (1, 1, 1, '주사', '보톡스');",
    )
    .unwrap();
    let repo = SqliteProcedureRepository::try_new(&conn).unwrap();

    let active: Vec<i64> = repo
        .list_elements(true)
        .unwrap()
        .iter()
        .map(|element| element.id)
        .collect();
    assert_eq!(active, vec![1, 2, 3]);
    assert_eq!(repo.list_elements(false).unwrap().len(), 4);

    let element = repo.get_element(1).unwrap().unwrap();
    assert_eq!(element.consum_1_count, Some(2));
    assert_eq!(element.class_detail.as_deref(), Some("사각턱"));

    let classes: Vec<(i64, i64)> = repo
        .list_classes(None)
        .unwrap()
        .iter()
        .map(|class| (class.group_id, class.id))
        .collect();
    assert_eq!(classes, vec![(1, 1), (1, 2), (2, 1)]);
    assert_eq!(repo.list_classes(Some(2)).unwrap()[0].class_sub.as_deref(), Some("토닝"));

    let targets: Vec<StepTarget> = repo
        .get_sequence(1)
        .unwrap()
        .iter()
        .map(|step| step.target)
        .collect();
    assert_eq!(targets, vec![StepTarget::Element(2), StepTarget::Bundle(1)]);
    assert!(repo.get_bundle(7).unwrap().is_empty());
}

#[test]
fn products_are_found_by_package() {
    let conn = seeded_catalog();
    let repo = SqliteProductRepository::try_new(&conn).unwrap();

    let by_element: Vec<i64> = repo
        .list_by_package(ProductKind::Standard, PackageRef::Element(1))
        .unwrap()
        .iter()
        .map(|product| product.id)
        .collect();
    assert_eq!(by_element, vec![1]);

    let by_bundle = repo
        .list_by_package(ProductKind::Standard, PackageRef::Bundle(1))
        .unwrap();
    assert_eq!(by_bundle.len(), 1);
    assert_eq!(by_bundle[0].package, PackageRef::Bundle(1));
    assert!(repo
        .list_by_package(ProductKind::Event, PackageRef::Bundle(1))
        .unwrap()
        .is_empty());

    conn.execute("UPDATE Product_Event SET Release = 0 WHERE ID = 2;", [])
        .unwrap();
    let active = repo.list_products(ProductKind::Event, true).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].package, PackageRef::Custom(1));
    assert_eq!(active[0].start_date.as_deref(), Some("2024-06-01"));
    assert_eq!(repo.list_products(ProductKind::Event, false).unwrap().len(), 2);

    let memberships = repo.list_memberships(false).unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].package, None);
    assert_eq!(memberships[0].payment_amount, Some(1_000_000));
}
