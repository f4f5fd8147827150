mod common;

use common::{count, scalar_i64, seeded_catalog};
use dermacare_core::model::CatalogItem;
use dermacare_core::pricing::recalculate_all;
use dermacare_core::repo::item_repo::SqliteItemRepository;
use dermacare_core::service::{DeletionService, RiskLevel};
use dermacare_core::ServiceError;

#[test]
fn check_lists_referrers_and_risk() {
    let conn = seeded_catalog();
    let service = DeletionService::new(SqliteItemRepository::try_new(&conn).unwrap());

    let check = service.check(CatalogItem::Element(1)).unwrap();
    let referrers: Vec<(&str, i64, bool)> = check
        .references
        .iter()
        .map(|reference| (reference.table, reference.id, reference.critical))
        .collect();
    assert_eq!(
        referrers,
        vec![
            ("Procedure_Bundle", 1, false),
            ("Procedure_Custom", 1, false),
            ("Product_Standard", 1, true),
        ]
    );
    assert_eq!(check.total_references, 3);
    assert_eq!(check.critical_references, 1);
    assert_eq!(check.risk_level, RiskLevel::High);
    assert!(!check.can_delete);

    let consumable = service.check(CatalogItem::Consumable(2)).unwrap();
    assert_eq!(consumable.risk_level, RiskLevel::Medium);

    let unused = service.check(CatalogItem::Element(4)).unwrap();
    assert_eq!(unused.risk_level, RiskLevel::Low);
    assert!(unused.can_delete);
}

#[test]
fn package_references_match_on_package_type() {
    let conn = seeded_catalog();
    let service = DeletionService::new(SqliteItemRepository::try_new(&conn).unwrap());

    // Element 1 and bundle group 1 share an id; only the bundle product counts.
    let bundle = service.check(CatalogItem::BundleGroup(1)).unwrap();
    let referrers: Vec<(&str, i64)> = bundle
        .references
        .iter()
        .map(|reference| (reference.table, reference.id))
        .collect();
    assert_eq!(
        referrers,
        vec![("Procedure_Sequence", 2), ("Product_Standard", 2)]
    );
}

#[test]
fn referenced_item_needs_force() {
    let conn = seeded_catalog();
    let service = DeletionService::new(SqliteItemRepository::try_new(&conn).unwrap());

    let err = service.delete(CatalogItem::Element(1), false).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::DeleteBlocked {
            item: CatalogItem::Element(1),
            references: 3
        }
    ));
    assert_eq!(count(&conn, "Procedure_Element"), 4);

    let outcome = service.delete(CatalogItem::Element(1), true).unwrap();
    assert!(outcome.forced);
    assert_eq!(outcome.deleted_rows, 1);
    assert_eq!(count(&conn, "Procedure_Element"), 3);
    assert_eq!(count(&conn, "Procedure_Bundle"), 1);
    assert_eq!(count(&conn, "Procedure_Custom"), 1);
    assert_eq!(
        scalar_i64(&conn, "SELECT Release FROM Product_Standard WHERE ID = 1;"),
        Some(0)
    );
}

#[test]
fn forced_group_delete_deactivates_dangling_referrers() {
    let conn = seeded_catalog();
    let service = DeletionService::new(SqliteItemRepository::try_new(&conn).unwrap());

    let outcome = service.delete(CatalogItem::BundleGroup(1), true).unwrap();
    assert_eq!(outcome.deleted_rows, 2);
    assert_eq!(outcome.check.total_references, 2);

    assert_eq!(count(&conn, "Procedure_Bundle"), 0);
    assert_eq!(
        scalar_i64(&conn, "SELECT Release FROM Procedure_Sequence WHERE ID = 2;"),
        Some(0)
    );
    assert_eq!(
        scalar_i64(&conn, "SELECT Release FROM Procedure_Sequence WHERE ID = 1;"),
        Some(1)
    );
    assert_eq!(
        scalar_i64(&conn, "SELECT Release FROM Product_Standard WHERE ID = 2;"),
        Some(0)
    );
}

#[test]
fn unreferenced_item_deletes_without_force() {
    let conn = seeded_catalog();
    let service = DeletionService::new(SqliteItemRepository::try_new(&conn).unwrap());

    let outcome = service.delete(CatalogItem::Element(4), false).unwrap();
    assert!(!outcome.forced);
    assert_eq!(outcome.deleted_rows, 1);

    let outcome = service.delete(CatalogItem::StandardProduct(3), false).unwrap();
    assert_eq!(outcome.deleted_rows, 1);
    assert_eq!(count(&conn, "Product_Standard"), 2);
}

#[test]
fn forced_info_delete_clears_product_link() {
    let conn = seeded_catalog();
    let service = DeletionService::new(SqliteItemRepository::try_new(&conn).unwrap());

    let check = service.check(CatalogItem::MembershipInfo(1)).unwrap();
    assert_eq!(check.risk_level, RiskLevel::High);

    service.delete(CatalogItem::StandardInfo(1), true).unwrap();
    assert_eq!(
        scalar_i64(&conn, "SELECT Standard_Info_ID FROM Product_Standard WHERE ID = 1;"),
        None
    );
    assert_eq!(
        scalar_i64(&conn, "SELECT Release FROM Product_Standard WHERE ID = 1;"),
        Some(1)
    );
}

#[test]
fn missing_item_is_not_found() {
    let conn = seeded_catalog();
    let service = DeletionService::new(SqliteItemRepository::try_new(&conn).unwrap());

    assert!(matches!(
        service.check(CatalogItem::SequenceGroup(9)),
        Err(ServiceError::NotFound(CatalogItem::SequenceGroup(9)))
    ));
    assert!(matches!(
        service.delete(CatalogItem::EventProduct(9), true),
        Err(ServiceError::NotFound(CatalogItem::EventProduct(9)))
    ));
}

#[test]
fn forced_delete_reprices_groups_that_lost_the_element() {
    let conn = seeded_catalog();
    recalculate_all(&conn).unwrap();
    let service = DeletionService::new(SqliteItemRepository::try_new(&conn).unwrap());

    service.delete(CatalogItem::Element(1), true).unwrap();

    // Bundle 1 and custom 1 each keep one element.
    assert_eq!(
        scalar_i64(&conn, "SELECT Procedure_Cost FROM Product_Standard WHERE ID = 2;"),
        Some(50_000)
    );
    assert_eq!(
        scalar_i64(&conn, "SELECT Procedure_Cost FROM Product_Standard WHERE ID = 3;"),
        Some(100_000)
    );
    assert_eq!(
        scalar_i64(&conn, "SELECT Procedure_Cost FROM Product_Event WHERE ID = 1;"),
        Some(40_000)
    );
}
