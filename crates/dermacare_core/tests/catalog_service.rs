mod common;

use common::{scalar_i64, seeded_catalog};
use dermacare_core::model::{
    BundleItem, CatalogItem, CustomItem, GlobalSettings, Membership, PackageRef,
    ProcedureElement, Product, ProductKind, SequenceStep, StepTarget, ValidationError,
};
use dermacare_core::pricing::recalculate_all;
use dermacare_core::repo::procedure_repo::{ProcedureRepository, SqliteProcedureRepository};
use dermacare_core::repo::reference_repo::{ReferenceRepository, SqliteReferenceRepository};
use dermacare_core::{CatalogService, RepoError, ServiceError};
use rusqlite::Connection;

fn priced_catalog() -> Connection {
    let conn = seeded_catalog();
    recalculate_all(&conn).unwrap();
    conn
}

fn doctor_element(id: i64, minutes: f64) -> ProcedureElement {
    let mut element = ProcedureElement::new(id, "리프팅");
    element.position_type = Some("의사".to_string());
    element.cost_time = Some(minutes);
    element.class_type = Some("리프팅".to_string());
    element
}

#[test]
fn create_element_assigns_id_and_cost() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    let mut element = doctor_element(0, 12.0);
    element.consum_1_id = Some(1);
    element.procedure_cost = Some(1);

    let created = service.create_element(element).unwrap();
    assert_eq!(created.id, 5);
    assert_eq!(created.procedure_cost, Some(23_000));
}

#[test]
fn create_element_rejects_taken_id_and_missing_consumable() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    assert!(matches!(
        service.create_element(doctor_element(1, 5.0)),
        Err(ServiceError::AlreadyExists(CatalogItem::Element(1)))
    ));

    let mut element = doctor_element(0, 5.0);
    element.consum_1_id = Some(9);
    assert!(matches!(
        service.create_element(element),
        Err(ServiceError::MissingReference {
            missing: CatalogItem::Consumable(9),
            ..
        })
    ));

    let invalid = doctor_element(0, -1.0);
    assert!(matches!(
        service.create_element(invalid),
        Err(ServiceError::Repo(RepoError::Validation(ValidationError::Negative { .. })))
    ));
}

#[test]
fn update_element_cascades_to_dependents() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    let mut element = SqliteProcedureRepository::try_new(&conn)
        .unwrap()
        .get_element(3)
        .unwrap()
        .unwrap();
    element.cost_time = Some(30.0);

    let update = service.update_element(element).unwrap();
    assert_eq!(update.element.procedure_cost, Some(55_000));
    assert_eq!(update.cascade.custom_items, 1);
    assert_eq!(update.cascade.event_products, 2);
    assert_eq!(
        scalar_i64(&conn, "SELECT Procedure_Cost FROM Product_Event WHERE ID = 2;"),
        Some(55_000)
    );

    assert!(matches!(
        service.update_element(doctor_element(77, 1.0)),
        Err(ServiceError::NotFound(CatalogItem::Element(77)))
    ));
}

#[test]
fn groups_copy_current_element_costs() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    let bundle = service
        .create_bundle(vec![BundleItem::new(0, 0, 3), BundleItem::new(0, 0, 2)])
        .unwrap();
    let rows: Vec<(i64, i64, Option<i64>)> = bundle
        .iter()
        .map(|item| (item.id, item.group_id, item.element_cost))
        .collect();
    assert_eq!(rows, vec![(3, 2, Some(40_000)), (4, 2, Some(50_000))]);

    let mut pick = CustomItem::new(0, 0, 2);
    pick.custom_count = Some(1);
    let custom = service.create_custom(vec![pick]).unwrap();
    assert_eq!(custom[0].group_id, 2);
    assert_eq!(custom[0].element_cost, Some(50_000));

    let sequence = service
        .create_sequence(vec![
            SequenceStep::new(0, 0, 1, StepTarget::Custom(1)),
            SequenceStep::new(0, 0, 2, StepTarget::Bundle(2)),
        ])
        .unwrap();
    let costs: Vec<(i64, Option<i64>)> = sequence
        .iter()
        .map(|step| (step.step_num, step.procedure_cost))
        .collect();
    assert_eq!(costs, vec![(1, Some(72_000)), (2, Some(90_000))]);
    assert!(sequence.iter().all(|step| step.group_id == 2));
}

#[test]
fn group_writes_check_references_and_shape() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    assert!(matches!(
        service.create_bundle(vec![BundleItem::new(0, 5, 42)]),
        Err(ServiceError::MissingReference {
            item: CatalogItem::BundleGroup(5),
            missing: CatalogItem::Element(42),
        })
    ));
    assert!(matches!(
        service.create_bundle(vec![BundleItem::new(0, 1, 1)]),
        Err(ServiceError::AlreadyExists(CatalogItem::BundleGroup(1)))
    ));
    assert!(matches!(
        service.create_custom(vec![CustomItem::new(0, 3, 1), CustomItem::new(0, 4, 2)]),
        Err(ServiceError::Repo(RepoError::Validation(
            ValidationError::MixedGroup { expected: 3, found: 4 }
        )))
    ));
    assert!(matches!(
        service.create_sequence(vec![
            SequenceStep::new(0, 7, 1, StepTarget::Element(1)),
            SequenceStep::new(0, 7, 1, StepTarget::Element(2)),
        ]),
        Err(ServiceError::Repo(RepoError::Validation(
            ValidationError::DuplicateStep { group_id: 7, step_num: 1 }
        )))
    ));
    assert!(matches!(
        service.create_sequence(vec![SequenceStep::new(0, 7, 1, StepTarget::Bundle(9))]),
        Err(ServiceError::MissingReference {
            missing: CatalogItem::BundleGroup(9),
            ..
        })
    ));
}

#[test]
fn event_product_is_sold_at_discounted_price() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    let mut product = Product::new(ProductKind::Event, 0, PackageRef::Element(2));
    product.original_price = Some(100_000);
    product.discount_rate = Some(20.0);
    product.info_id = Some(1);

    let created = service.create_product(product).unwrap();
    assert_eq!(created.id, 3);
    assert_eq!(created.sell_price, Some(80_000));
    assert_eq!(created.procedure_cost, Some(50_000));
    assert_eq!(created.margin, Some(30_000));
    assert_eq!(created.margin_rate, Some(37.5));
}

#[test]
fn standard_product_requires_existing_package_and_info() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    let mut missing_info = Product::new(ProductKind::Standard, 0, PackageRef::Bundle(1));
    missing_info.info_id = Some(9);
    assert!(matches!(
        service.create_product(missing_info),
        Err(ServiceError::MissingReference {
            missing: CatalogItem::StandardInfo(9),
            ..
        })
    ));

    let missing_package = Product::new(ProductKind::Standard, 0, PackageRef::Sequence(4));
    assert!(matches!(
        service.create_product(missing_package),
        Err(ServiceError::MissingReference {
            missing: CatalogItem::SequenceGroup(4),
            ..
        })
    ));

    let mut unpriced = Product::new(ProductKind::Standard, 10, PackageRef::Custom(1));
    unpriced.start_date = Some("2025-01-01".to_string());
    let created = service.create_product(unpriced).unwrap();
    assert_eq!(created.procedure_cost, Some(72_000));
    assert_eq!(created.margin, None);
}

#[test]
fn membership_package_is_optional_but_checked() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    let mut membership = Membership::new(0);
    membership.info_id = Some(1);
    membership.package = Some(PackageRef::Sequence(1));
    membership.payment_amount = Some(500_000);
    let created = service.create_membership(membership).unwrap();
    assert_eq!(created.id, 2);
    assert_eq!(created.package, Some(PackageRef::Sequence(1)));

    let bare = service.create_membership(Membership::new(0)).unwrap();
    assert_eq!(bare.package, None);

    let mut dangling = Membership::new(0);
    dangling.package = Some(PackageRef::Custom(8));
    assert!(matches!(
        service.create_membership(dangling),
        Err(ServiceError::MissingReference { .. })
    ));
}

#[test]
fn new_rates_reprice_the_catalog() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    let report = service
        .update_global_settings(&GlobalSettings {
            id: 1,
            doc_price_minute: 2_000.0,
            aesthetician_price_minute: 500.0,
        })
        .unwrap();
    assert_eq!(report.elements, 3);
    assert_eq!(
        scalar_i64(&conn, "SELECT Procedure_Cost FROM Procedure_Element WHERE ID = 1;"),
        Some(42_000)
    );

    let negative = GlobalSettings {
        id: 1,
        doc_price_minute: -1.0,
        aesthetician_price_minute: 0.0,
    };
    assert!(service.update_global_settings(&negative).is_err());
}

#[test]
fn release_toggle_reprices_only_when_costs_depend_on_it() {
    let conn = priced_catalog();
    let service = CatalogService::try_new(&conn).unwrap();

    let change = service.set_release(CatalogItem::Consumable(1), false).unwrap();
    assert_eq!(change.rows, 1);
    assert!(change.cascade.is_some());
    assert_eq!(
        scalar_i64(&conn, "SELECT Procedure_Cost FROM Procedure_Element WHERE ID = 1;"),
        Some(10_000)
    );

    let bundle = service.set_release(CatalogItem::BundleGroup(1), false).unwrap();
    assert_eq!(bundle.rows, 2);
    assert_eq!(
        scalar_i64(&conn, "SELECT Procedure_Cost FROM Product_Standard WHERE ID = 2;"),
        Some(0)
    );

    let product = service
        .set_release(CatalogItem::StandardProduct(1), false)
        .unwrap();
    assert!(product.cascade.is_none());

    assert!(matches!(
        service.set_release(CatalogItem::EventProduct(9), true),
        Err(ServiceError::NotFound(CatalogItem::EventProduct(9)))
    ));
}

fn lock_table(conn: &Connection, table: &str) {
    conn.execute_batch(&format!(
        "CREATE TRIGGER lock_{table} BEFORE UPDATE ON {table}
         BEGIN SELECT RAISE(ABORT, '{table} is locked'); END;"
    ))
    .unwrap();
}

#[test]
fn failed_cascade_rolls_back_the_element_update() {
    let conn = priced_catalog();
    lock_table(&conn, "Procedure_Custom");
    let service = CatalogService::try_new(&conn).unwrap();
    let repo = SqliteProcedureRepository::try_new(&conn).unwrap();

    let before = repo.get_element(3).unwrap().unwrap();
    let mut changed = before.clone();
    changed.cost_time = Some(30.0);
    changed.name = "changed".to_string();

    assert!(matches!(
        service.update_element(changed),
        Err(ServiceError::Pricing(_))
    ));
    assert_eq!(repo.get_element(3).unwrap().unwrap(), before);
    assert_eq!(
        scalar_i64(&conn, "SELECT Procedure_Cost FROM Product_Event WHERE ID = 2;"),
        Some(40_000)
    );
    assert!(conn.is_autocommit());
}

#[test]
fn failed_cascade_keeps_old_rates_and_release_flags() {
    let conn = priced_catalog();
    lock_table(&conn, "Procedure_Element");
    let service = CatalogService::try_new(&conn).unwrap();

    let doubled = GlobalSettings {
        id: 1,
        doc_price_minute: 2_000.0,
        aesthetician_price_minute: 500.0,
    };
    assert!(service.update_global_settings(&doubled).is_err());
    let stored = SqliteReferenceRepository::try_new(&conn)
        .unwrap()
        .global_settings()
        .unwrap();
    assert_eq!(stored.doc_price_minute, 1_000.0);

    assert!(service.set_release(CatalogItem::Consumable(1), false).is_err());
    assert_eq!(
        scalar_i64(&conn, "SELECT Release FROM Consumables WHERE ID = 1;"),
        Some(1)
    );
    assert!(conn.is_autocommit());
}
