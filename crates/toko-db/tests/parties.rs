//! Distributor and customer master data: names are unique
//! case-insensitively so import and manual entry resolve to one party.

mod common;

use common::*;
use toko_core::CustomerType;
use toko_db::repository::customer::CustomerInput;
use toko_db::repository::supplier::DistributorInput;
use toko_db::DbError;

#[tokio::test]
async fn duplicate_distributor_names_are_refused() {
    let db = test_db().await;
    seed_distributor(&db, "PT Sumber Rejeki").await;

    let err = db
        .suppliers()
        .create(DistributorInput {
            name: "PT Sumber Rejeki".to_string(),
            phone: None,
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    // A different casing is still the same supplier
    let err = db
        .suppliers()
        .create(DistributorInput {
            name: "pt sumber rejeki".to_string(),
            phone: None,
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    assert_eq!(db.suppliers().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_customer_names_are_refused() {
    let db = test_db().await;
    seed_customer(&db, "Bu Siti", CustomerType::Tetap).await;

    let err = db
        .customers()
        .create(CustomerInput {
            name: "bu siti".to_string(),
            customer_type: CustomerType::Tetap,
            phone: None,
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    assert_eq!(db.customers().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn renaming_onto_an_existing_party_is_refused() {
    let db = test_db().await;
    let first = seed_distributor(&db, "PT Sinar Jaya").await;
    seed_distributor(&db, "PT Sumber Rejeki").await;

    let err = db
        .suppliers()
        .update(
            &first.id,
            DistributorInput {
                name: "PT Sumber Rejeki".to_string(),
                phone: None,
                address: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    // Keeping its own name with new contact details is fine
    let updated = db
        .suppliers()
        .update(
            &first.id,
            DistributorInput {
                name: "PT Sinar Jaya".to_string(),
                phone: Some("081234567891".to_string()),
                address: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.phone.as_deref(), Some("081234567891"));
}
