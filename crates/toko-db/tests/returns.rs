//! Return workflows: the sales-return approval machine with its
//! password gate and quantity caps, and the immediate purchase return.

mod common;

use common::*;
use toko_core::{
    CoreError, CustomerType, Money, MovementType, ReturnActor, ReturnStatus, SaleType, UserRole,
};
use toko_db::repository::retur::{NewPurchaseReturn, NewReturnItem, NewSalesReturn};
use toko_db::repository::sale::{NewSale, NewSaleItem};
use toko_db::DbError;

async fn credit_sale_of_six(db: &toko_db::Database, product_id: &str, customer_id: &str) -> String {
    db.sales()
        .process(NewSale {
            customer_id: Some(customer_id.to_string()),
            sale_type: SaleType::Bon,
            discount: None,
            paid: Money::zero(),
            note: None,
            items: vec![NewSaleItem {
                product_id: product_id.to_string(),
                unit_name: "Pcs".to_string(),
                quantity: 6,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap()
        .sale
        .id
}

fn return_item(product_id: &str, quantity: i64) -> NewReturnItem {
    NewReturnItem {
        product_id: product_id.to_string(),
        unit_name: "Pcs".to_string(),
        quantity,
    }
}

#[tokio::test]
async fn admin_filed_returns_apply_immediately() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 20).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;
    let admin = seed_user(&db, "admin", UserRole::Admin, "admin-pass").await;

    let sale_id = credit_sale_of_six(&db, &product.id, &customer.id).await;

    let retur = db
        .returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id,
                reason: Some("Kemasan rusak".to_string()),
                items: vec![return_item(&product.id, 2)],
            },
            ReturnActor::Admin {
                user_id: admin.id.clone(),
            },
            &PlainVerifier,
        )
        .await
        .unwrap();

    assert_eq!(retur.retur.status, ReturnStatus::Approved);
    assert_eq!(retur.retur.resolved_by.as_deref(), Some(admin.id.as_str()));
    assert!(retur.retur.return_number.starts_with("RTN-"));
    assert_eq!(retur.retur.total, Money::new(3_000));

    // Stock came back and debt went down by the return total
    let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 16);

    let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
    assert_eq!(customer.debt, Money::new(3_000));

    assert!(db.ledger().chain_is_contiguous(&product.id).await.unwrap());
}

#[tokio::test]
async fn return_cap_counts_pending_and_approved_quantities() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 20).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;
    let kasir = seed_user(&db, "kasir", UserRole::Kasir, "kasir-pass").await;

    let sale_id = credit_sale_of_six(&db, &product.id, &customer.id).await;

    // 5 of the 6 sold go PENDING
    db.returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id: sale_id.clone(),
                reason: None,
                items: vec![return_item(&product.id, 5)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id.clone(),
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap();

    // 4 more would exceed the 6 sold
    let err = db
        .returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id: sale_id.clone(),
                reason: None,
                items: vec![return_item(&product.id, 4)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id.clone(),
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Core(CoreError::ReturnCapExceeded { remaining: 1, .. })
    ));

    // The last remaining piece still fits
    db.returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id,
                reason: None,
                items: vec![return_item(&product.id, 1)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id,
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_returns_free_their_quantities() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 20).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;
    let kasir = seed_user(&db, "kasir", UserRole::Kasir, "kasir-pass").await;
    let manager = seed_user(&db, "manager", UserRole::Manager, "manager-pass").await;

    let sale_id = credit_sale_of_six(&db, &product.id, &customer.id).await;

    let pending = db
        .returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id: sale_id.clone(),
                reason: None,
                items: vec![return_item(&product.id, 5)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id.clone(),
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap();

    let rejected = db
        .returns()
        .reject_sales_return(&pending.retur.id, &manager.id, Some("Barang sudah dipakai"))
        .await
        .unwrap();
    assert_eq!(rejected.retur.status, ReturnStatus::Rejected);
    assert_eq!(
        rejected.retur.rejected_reason.as_deref(),
        Some("Barang sudah dipakai")
    );

    // Rejection applied no stock effects
    let product_row = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product_row.stock, 14);

    // The full 6 are claimable again
    db.returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id,
                reason: None,
                items: vec![return_item(&product.id, 6)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id,
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn cashier_password_gate_checks_active_approver_credentials() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 20).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;
    let kasir = seed_user(&db, "kasir", UserRole::Kasir, "kasir-pass").await;
    let manager = seed_user(&db, "manager", UserRole::Manager, "rahasia").await;

    let sale_id = credit_sale_of_six(&db, &product.id, &customer.id).await;

    // Wrong password: rejected outright, nothing written
    let err = db
        .returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id: sale_id.clone(),
                reason: None,
                items: vec![return_item(&product.id, 2)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id.clone(),
                admin_password: Some("salah".to_string()),
            },
            &PlainVerifier,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Unauthorized { .. }));
    assert!(db.returns().list_sales_returns(None).await.unwrap().is_empty());

    // The manager's password approves on the spot, credited to them
    let approved = db
        .returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id,
                reason: None,
                items: vec![return_item(&product.id, 2)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id,
                admin_password: Some("rahasia".to_string()),
            },
            &PlainVerifier,
        )
        .await
        .unwrap();

    assert_eq!(approved.retur.status, ReturnStatus::Approved);
    assert_eq!(approved.retur.resolved_by.as_deref(), Some(manager.id.as_str()));
}

#[tokio::test]
async fn approval_applies_effects_exactly_once() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 20).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;
    let kasir = seed_user(&db, "kasir", UserRole::Kasir, "kasir-pass").await;
    let manager = seed_user(&db, "manager", UserRole::Manager, "manager-pass").await;

    let sale_id = credit_sale_of_six(&db, &product.id, &customer.id).await;

    let pending = db
        .returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id,
                reason: None,
                items: vec![return_item(&product.id, 3)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id.clone(),
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap();

    // A cashier holds no approval authority
    let err = db
        .returns()
        .approve_sales_return(&pending.retur.id, &kasir.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Unauthorized { .. }));

    let approved = db
        .returns()
        .approve_sales_return(&pending.retur.id, &manager.id)
        .await
        .unwrap();
    assert_eq!(approved.retur.status, ReturnStatus::Approved);

    let product_row = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product_row.stock, 17);
    let customer_row = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
    assert_eq!(customer_row.debt, Money::new(4_500));

    // Approving again must not double the effects
    let err = db
        .returns()
        .approve_sales_return(&pending.retur.id, &manager.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    let product_row = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product_row.stock, 17);
}

#[tokio::test]
async fn purchase_returns_require_a_completed_order_from_that_distributor() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 0).await;
    let distributor = seed_distributor(&db, "PT Sinar Jaya").await;
    let admin = seed_user(&db, "admin", UserRole::Admin, "admin-pass").await;

    let pending = db
        .purchase_orders()
        .create(toko_db::repository::purchase_order::NewPurchaseOrder {
            distributor_id: distributor.id.clone(),
            note: None,
            items: vec![toko_db::repository::purchase_order::NewPoItem {
                product_id: product.id.clone(),
                unit_name: "Karton".to_string(),
                quantity: 2,
                unit_cost: Money::new(20_000),
            }],
        })
        .await
        .unwrap();

    let err = db
        .returns()
        .file_purchase_return(NewPurchaseReturn {
            purchase_order: pending.order.id.clone(),
            reason: None,
            created_by: admin.id.clone(),
            items: vec![NewReturnItem {
                product_id: product.id.clone(),
                unit_name: "Karton".to_string(),
                quantity: 1,
            }],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Conflict { .. }));
}

#[tokio::test]
async fn purchase_returns_apply_immediately() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 0).await;
    let distributor = seed_distributor(&db, "PT Sinar Jaya").await;
    let admin = seed_user(&db, "admin", UserRole::Admin, "admin-pass").await;

    let po = receive_karton_po(&db, &product.id, &distributor.id, 2).await;

    let retur = db
        .returns()
        .file_purchase_return(NewPurchaseReturn {
            purchase_order: po.order.po_number.clone(),
            reason: Some("Mendekati kedaluwarsa".to_string()),
            created_by: admin.id.clone(),
            items: vec![NewReturnItem {
                product_id: product.id.clone(),
                unit_name: "Karton".to_string(),
                quantity: 1,
            }],
        })
        .await
        .unwrap();

    assert!(retur.retur.return_number.starts_with("RTB-"));
    assert_eq!(retur.retur.total, Money::new(20_000));

    // Goods left stock and the binding partition in the same stroke
    let product_row = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product_row.stock, 20);
    let bindings = db.suppliers().bindings_for_product(&product.id).await.unwrap();
    assert_eq!(bindings[0].stock, 20);

    // The supplier now owes the store
    let distributor_row = db.suppliers().get_by_id(&distributor.id).await.unwrap().unwrap();
    assert_eq!(distributor_row.debt, Money::new(20_000));

    let history = db.ledger().history_for_product(&product.id, 10).await.unwrap();
    assert_eq!(history[0].movement_type, MovementType::ReturnPurchase);
    assert_eq!(history[0].qty_change, -20);
    assert!(db.ledger().chain_is_contiguous(&product.id).await.unwrap());
}

#[tokio::test]
async fn purchase_return_caps_and_stock_guard() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 0).await;
    let distributor = seed_distributor(&db, "PT Sinar Jaya").await;
    let admin = seed_user(&db, "admin", UserRole::Admin, "admin-pass").await;

    let po = receive_karton_po(&db, &product.id, &distributor.id, 2).await;

    // More than the 2 Karton received
    let err = db
        .returns()
        .file_purchase_return(NewPurchaseReturn {
            purchase_order: po.order.id.clone(),
            reason: None,
            created_by: admin.id.clone(),
            items: vec![NewReturnItem {
                product_id: product.id.clone(),
                unit_name: "Karton".to_string(),
                quantity: 3,
            }],
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Core(CoreError::ReturnCapExceeded { .. })
    ));

    // Sell the goods out, then try to send them back
    db.sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: None,
            paid: Money::new(100_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Karton".to_string(),
                quantity: 2,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap();

    let err = db
        .returns()
        .file_purchase_return(NewPurchaseReturn {
            purchase_order: po.order.id.clone(),
            reason: None,
            created_by: admin.id.clone(),
            items: vec![NewReturnItem {
                product_id: product.id.clone(),
                unit_name: "Karton".to_string(),
                quantity: 1,
            }],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InsufficientStock { .. }));
}

#[tokio::test]
async fn approval_floors_the_customer_debt_at_zero() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 20).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;
    let kasir = seed_user(&db, "kasir", UserRole::Kasir, "kasir-pass").await;
    let manager = seed_user(&db, "manager", UserRole::Manager, "manager-pass").await;

    let sale_id = credit_sale_of_six(&db, &product.id, &customer.id).await;

    // 9_000 owed, 7_000 paid back before the return comes in
    db.customers()
        .pay_debt(&customer.id, Money::new(7_000))
        .await
        .unwrap();

    let pending = db
        .returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id,
                reason: None,
                items: vec![return_item(&product.id, 3)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id.clone(),
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap();

    db.returns()
        .approve_sales_return(&pending.retur.id, &manager.id)
        .await
        .unwrap();

    // The 4_500 return total exceeds the 2_000 still owed
    let customer_row = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
    assert_eq!(customer_row.debt, Money::zero());

    let product_row = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product_row.stock, 17);
}

#[tokio::test]
async fn return_cap_spans_repeated_lines_of_the_same_unit() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 20).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;
    let kasir = seed_user(&db, "kasir", UserRole::Kasir, "kasir-pass").await;

    // The same (product, unit) rung up twice on one receipt
    let sale = db
        .sales()
        .process(NewSale {
            customer_id: Some(customer.id.clone()),
            sale_type: SaleType::Bon,
            discount: None,
            paid: Money::zero(),
            note: None,
            items: vec![
                NewSaleItem {
                    product_id: product.id.clone(),
                    unit_name: "Pcs".to_string(),
                    quantity: 3,
                    unit_price: None,
                    discount: None,
                },
                NewSaleItem {
                    product_id: product.id.clone(),
                    unit_name: "Pcs".to_string(),
                    quantity: 3,
                    unit_price: None,
                    discount: None,
                },
            ],
        })
        .await
        .unwrap();

    // 5 fits inside the combined 6 even though each line holds only 3
    db.returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id: sale.sale.id.clone(),
                reason: None,
                items: vec![return_item(&product.id, 5)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id.clone(),
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap();

    let err = db
        .returns()
        .file_sales_return(
            NewSalesReturn {
                sale_id: sale.sale.id.clone(),
                reason: None,
                items: vec![return_item(&product.id, 2)],
            },
            ReturnActor::Cashier {
                user_id: kasir.id,
                admin_password: None,
            },
            &PlainVerifier,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Core(CoreError::ReturnCapExceeded { remaining: 1, .. })
    ));
}
