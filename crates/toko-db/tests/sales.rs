//! Sale processing: stock checks with unit conversion, invoice
//! numbering, cash handling, and credit sale debt bookkeeping.

mod common;

use common::*;
use toko_core::{CoreError, CustomerType, Money, SaleType};
use toko_db::repository::sale::{NewSale, NewSaleItem};
use toko_db::DbError;

#[tokio::test]
async fn cash_sale_decrements_stock_and_computes_change() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;

    let sale = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: None,
            paid: Money::new(30_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Renceng".to_string(),
                quantity: 2,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap();

    // 2 Renceng at 14_000
    assert_eq!(sale.sale.total, Money::new(28_000));
    assert_eq!(sale.sale.change_amount, Money::new(2_000));
    assert!(sale.sale.invoice_number.starts_with("INV-"));
    assert_eq!(sale.items.len(), 1);
    assert_eq!(sale.items[0].conversion, 10);

    let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 8);
    assert!(db.ledger().chain_is_contiguous(&product.id).await.unwrap());
}

#[tokio::test]
async fn insufficient_stock_reports_the_maximum_sellable_quantity() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 45).await;

    // 3 Karton of 20 need 60 base units against 45 on hand
    let err = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: None,
            paid: Money::new(100_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Karton".to_string(),
                quantity: 3,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap_err();

    match err {
        DbError::InsufficientStock {
            available,
            max_fulfillable,
            ..
        } => {
            assert_eq!(available, 45);
            assert_eq!(max_fulfillable, 2);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Nothing moved
    let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 45);
    assert!(db.sales().list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn underpayment_rolls_the_sale_back() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;

    let err = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: None,
            paid: Money::new(1_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Pcs".to_string(),
                quantity: 4,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Conflict { .. }));

    let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 28);
}

#[tokio::test]
async fn credit_sales_need_a_registered_non_walk_in_customer() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;

    // Anonymous credit: no account to book the receivable onto
    let err = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Bon,
            discount: None,
            paid: Money::zero(),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Pcs".to_string(),
                quantity: 1,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    // Walk-in customer type is barred from credit
    let walk_in = seed_customer(&db, "Pembeli Umum", CustomerType::Umum).await;
    let err = db
        .sales()
        .process(NewSale {
            customer_id: Some(walk_in.id.clone()),
            sale_type: SaleType::Bon,
            discount: None,
            paid: Money::zero(),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Pcs".to_string(),
                quantity: 1,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::CreditNotAllowed { .. })));
}

#[tokio::test]
async fn credit_sale_books_the_total_as_customer_debt() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;

    let sale = db
        .sales()
        .process(NewSale {
            customer_id: Some(customer.id.clone()),
            sale_type: SaleType::Bon,
            discount: None,
            paid: Money::zero(),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Pcs".to_string(),
                quantity: 4,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap();

    assert_eq!(sale.sale.total, Money::new(6_000));
    assert_eq!(sale.sale.change_amount, Money::zero());

    let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
    assert_eq!(customer.debt, Money::new(6_000));
}

#[tokio::test]
async fn debt_payments_cap_at_the_outstanding_amount() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;
    let customer = seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;

    db.sales()
        .process(NewSale {
            customer_id: Some(customer.id.clone()),
            sale_type: SaleType::Bon,
            discount: None,
            paid: Money::zero(),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Pcs".to_string(),
                quantity: 4,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap();

    // Overpaying 10_000 against 6_000 owed settles to exactly zero
    let customer = db
        .customers()
        .pay_debt(&customer.id, Money::new(10_000))
        .await
        .unwrap();
    assert_eq!(customer.debt, Money::zero());
}

#[tokio::test]
async fn sales_resolve_by_invoice_number() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;

    let sale = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: None,
            paid: Money::new(3_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Pcs".to_string(),
                quantity: 2,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap();

    let found = db
        .sales()
        .get_by_invoice(&sale.sale.invoice_number)
        .await
        .unwrap()
        .expect("invoice lookup");
    assert_eq!(found.sale.id, sale.sale.id);
}

#[tokio::test]
async fn discounts_come_off_before_change_is_computed() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;

    let sale = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: Some(Money::new(2_000)),
            paid: Money::new(30_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Renceng".to_string(),
                quantity: 2,
                unit_price: None,
                discount: Some(Money::new(1_000)),
            }],
        })
        .await
        .unwrap();

    // 2 Renceng at 14_000 gross 28_000, line discount 1_000
    assert_eq!(sale.items[0].discount, Money::new(1_000));
    assert_eq!(sale.items[0].line_total, Money::new(27_000));
    assert_eq!(sale.sale.subtotal, Money::new(27_000));
    assert_eq!(sale.sale.discount, Money::new(2_000));
    assert_eq!(sale.sale.total, Money::new(25_000));
    assert_eq!(sale.sale.change_amount, Money::new(5_000));
}

#[tokio::test]
async fn caller_supplied_price_overrides_the_unit_table() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;

    let sale = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: None,
            paid: Money::new(30_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Renceng".to_string(),
                quantity: 2,
                unit_price: Some(Money::new(13_000)),
                discount: None,
            }],
        })
        .await
        .unwrap();

    assert_eq!(sale.items[0].unit_price, Money::new(13_000));
    assert_eq!(sale.sale.total, Money::new(26_000));
    assert_eq!(sale.sale.change_amount, Money::new(4_000));
}

#[tokio::test]
async fn a_discount_larger_than_the_sale_is_refused() {
    let db = test_db().await;
    let product = seed_product(&db, "KOPI-001", 28).await;

    // Line discount over the line amount
    let err = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: None,
            paid: Money::new(30_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Pcs".to_string(),
                quantity: 2,
                unit_price: None,
                discount: Some(Money::new(4_000)),
            }],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    // Order discount over the subtotal
    let err = db
        .sales()
        .process(NewSale {
            customer_id: None,
            sale_type: SaleType::Lunas,
            discount: Some(Money::new(5_000)),
            paid: Money::new(30_000),
            note: None,
            items: vec![NewSaleItem {
                product_id: product.id.clone(),
                unit_name: "Pcs".to_string(),
                quantity: 2,
                unit_price: None,
                discount: None,
            }],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));

    // Neither attempt moved any stock
    let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 28);
}
