//! Warehouse partitions and transfers: conservation of the product
//! total, over-allocation guards, and the soft-delete path.

mod common;

use common::*;
use toko_core::MovementType;
use toko_db::repository::warehouse::{WarehouseDeletion, WarehouseInput};
use toko_db::DbError;

async fn warehouse(db: &toko_db::Database, name: &str) -> toko_core::Warehouse {
    db.warehouses()
        .create(WarehouseInput {
            name: name.to_string(),
            location: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn transfers_conserve_the_product_total() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 50).await;
    let gudang_a = warehouse(&db, "Gudang Utama").await;
    let gudang_b = warehouse(&db, "Gudang Cabang").await;

    db.warehouses()
        .place_stock(&gudang_a.id, &product.id, "Pcs", 50, None)
        .await
        .unwrap();

    let outcome = db
        .warehouses()
        .transfer(&product.id, &gudang_a.id, &gudang_b.id, "Renceng", 3, None)
        .await
        .unwrap();

    assert_eq!(outcome.out_movement.movement_type, MovementType::TransferOut);
    assert_eq!(outcome.out_movement.qty_change, -30);
    assert_eq!(outcome.out_movement.stock_before, 50);
    assert_eq!(outcome.out_movement.stock_after, 20);
    assert_eq!(outcome.in_movement.movement_type, MovementType::TransferIn);
    assert_eq!(outcome.in_movement.stock_before, 0);
    assert_eq!(outcome.in_movement.stock_after, 30);

    // The product total never moved
    let product_row = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product_row.stock, 50);

    let partitions = db.warehouses().stock_of_product(&product.id).await.unwrap();
    let total_placed: i64 = partitions.iter().map(|p| p.stock).sum();
    assert_eq!(total_placed, 50);

    // Per-warehouse rows do not disturb the product-level chain
    assert!(db.ledger().chain_is_contiguous(&product.id).await.unwrap());
}

#[tokio::test]
async fn transfers_reject_overdraw_and_self_transfer() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 50).await;
    let gudang_a = warehouse(&db, "Gudang Utama").await;
    let gudang_b = warehouse(&db, "Gudang Cabang").await;

    db.warehouses()
        .place_stock(&gudang_a.id, &product.id, "Pcs", 10, None)
        .await
        .unwrap();

    let err = db
        .warehouses()
        .transfer(&product.id, &gudang_a.id, &gudang_b.id, "Pcs", 11, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    let err = db
        .warehouses()
        .transfer(&product.id, &gudang_a.id, &gudang_a.id, "Pcs", 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    // An empty source has nothing to give
    let err = db
        .warehouses()
        .transfer(&product.id, &gudang_b.id, &gudang_a.id, "Pcs", 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));
}

#[tokio::test]
async fn placement_cannot_exceed_the_product_total() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 10).await;
    let gudang_a = warehouse(&db, "Gudang Utama").await;
    let gudang_b = warehouse(&db, "Gudang Cabang").await;

    db.warehouses()
        .place_stock(&gudang_a.id, &product.id, "Pcs", 8, None)
        .await
        .unwrap();

    let err = db
        .warehouses()
        .place_stock(&gudang_b.id, &product.id, "Pcs", 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));
}

#[tokio::test]
async fn deleting_a_stocked_warehouse_deactivates_it_until_drained() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 20).await;
    let gudang_a = warehouse(&db, "Gudang Utama").await;
    let gudang_b = warehouse(&db, "Gudang Cabang").await;

    db.warehouses()
        .place_stock(&gudang_a.id, &product.id, "Pcs", 20, None)
        .await
        .unwrap();

    let outcome = db.warehouses().delete(&gudang_a.id).await.unwrap();
    assert_eq!(outcome, WarehouseDeletion::Deactivated);

    // Hidden from listings, closed to inbound transfers
    let names: Vec<String> = db
        .warehouses()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.name)
        .collect();
    assert_eq!(names, vec!["Gudang Cabang".to_string()]);

    let err = db
        .warehouses()
        .transfer(&product.id, &gudang_b.id, &gudang_a.id, "Pcs", 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    // Draining it out is still allowed, after which it deletes for real
    db.warehouses()
        .transfer(&product.id, &gudang_a.id, &gudang_b.id, "Pcs", 20, None)
        .await
        .unwrap();

    let outcome = db.warehouses().delete(&gudang_a.id).await.unwrap();
    assert_eq!(outcome, WarehouseDeletion::Removed);
    assert!(db.warehouses().get_by_id(&gudang_a.id).await.unwrap().is_none());
}

#[tokio::test]
async fn at_most_one_default_warehouse() {
    let db = test_db().await;
    let gudang_a = warehouse(&db, "Gudang Utama").await;
    let gudang_b = warehouse(&db, "Gudang Cabang").await;

    db.warehouses().set_default(&gudang_a.id).await.unwrap();
    db.warehouses().set_default(&gudang_b.id).await.unwrap();

    let a = db.warehouses().get_by_id(&gudang_a.id).await.unwrap().unwrap();
    let b = db.warehouses().get_by_id(&gudang_b.id).await.unwrap().unwrap();
    assert!(!a.is_default);
    assert!(b.is_default);
}
