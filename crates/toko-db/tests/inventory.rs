//! Catalog and ledger behavior: opening stock, unit conversion on
//! manual additions, adjustments, and the deletion guard.

mod common;

use common::*;
use toko_core::{CoreError, MovementType};
use toko_db::repository::product::ProductUpdate;
use toko_db::DbError;

#[tokio::test]
async fn opening_stock_is_booked_through_the_ledger() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 8).await;

    assert_eq!(product.stock, 8);

    let history = db.ledger().history_for_product(&product.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].movement_type, MovementType::In);
    assert_eq!(history[0].stock_before, 0);
    assert_eq!(history[0].stock_after, 8);
    assert_eq!(history[0].qty_change, 8);

    assert!(db.ledger().chain_is_contiguous(&product.id).await.unwrap());
}

#[tokio::test]
async fn add_stock_converts_named_units_to_base() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 8).await;

    // 2 Renceng of 10 on top of 8 loose pieces
    let movement = db
        .products()
        .add_stock(&product.id, "Renceng", 2, None)
        .await
        .unwrap();

    assert_eq!(movement.qty_change, 20);
    assert_eq!(movement.unit_name, "Renceng");
    assert_eq!(movement.unit_qty, 2);
    assert_eq!(movement.stock_after, 28);

    let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 28);
}

#[tokio::test]
async fn add_stock_rejects_an_undefined_unit() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 8).await;

    let err = db
        .products()
        .add_stock(&product.id, "Lusin", 1, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Core(CoreError::UnknownUnit { ref unit, .. }) if unit == "Lusin"
    ));

    let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 8);
}

#[tokio::test]
async fn adjustment_books_the_signed_difference() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 30).await;

    let movement = db
        .products()
        .adjust_stock(&product.id, 28, Some("Stock opname"))
        .await
        .unwrap();

    assert_eq!(movement.movement_type, MovementType::Adjustment);
    assert_eq!(movement.qty_change, -2);
    assert_eq!(movement.stock_after, 28);

    // Counting the same figure again changes nothing and says so
    let err = db
        .products()
        .adjust_stock(&product.id, 28, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    assert!(db.ledger().chain_is_contiguous(&product.id).await.unwrap());
}

#[tokio::test]
async fn products_with_ledger_history_cannot_be_deleted() {
    let db = test_db().await;

    let with_history = seed_product(&db, "KOPI-001", 8).await;
    let err = db.products().delete(&with_history.id).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    // A product that never moved deletes cleanly
    let untouched = seed_product(&db, "KOPI-002", 0).await;
    db.products().delete(&untouched.id).await.unwrap();
    assert!(db.products().get_by_id(&untouched.id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_touches_master_data_but_never_stock() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 8).await;

    let updated = db
        .products()
        .update(
            &product.id,
            ProductUpdate {
                name: Some("Kopi Sachet Premium".to_string()),
                brand: Some(Some("Cap Luwak".to_string())),
                category: None,
                min_stock: Some(10),
                notes: Some(Some("Laku keras menjelang lebaran".to_string())),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Kopi Sachet Premium");
    assert_eq!(updated.brand.as_deref(), Some("Cap Luwak"));
    assert_eq!(updated.notes.as_deref(), Some("Laku keras menjelang lebaran"));
    assert_eq!(updated.min_stock, 10);
    assert_eq!(updated.stock, 8);
}

#[tokio::test]
async fn po_suggestions_flag_products_at_or_below_their_threshold() {
    let db = test_db().await;

    // min_stock is 5 in the fixture
    let low = seed_product(&db, "KOPI-LOW", 3).await;
    let _healthy = seed_product(&db, "KOPI-OK", 40).await;

    let suggestions = db.products().po_suggestions().await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].product.id, low.id);
    assert!(suggestions[0].default_distributor_id.is_none());
}

#[tokio::test]
async fn stock_card_resolves_document_numbers() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 0).await;
    let distributor = seed_distributor(&db, "PT Sinar Jaya").await;

    let po = receive_karton_po(&db, &product.id, &distributor.id, 2).await;

    let card = db.ledger().stock_card(&product.id).await.unwrap();
    assert_eq!(card.len(), 1);
    assert_eq!(card[0].movement.qty_change, 40);
    assert_eq!(
        card[0].reference_number.as_deref(),
        Some(po.order.po_number.as_str())
    );
}
