//! Shared fixtures for the integration tests.
//!
//! Every test runs against its own in-memory database so tests never
//! see each other's rows. The seeded product is the usual sachet
//! coffee: base unit Pcs, Renceng of 10, Karton of 20.

#![allow(dead_code)]

use toko_core::{CredentialVerifier, Customer, CustomerType, Distributor, Money, Product, User, UserRole};
use toko_db::repository::customer::CustomerInput;
use toko_db::repository::product::{NewProduct, NewUnit};
use toko_db::repository::purchase_order::{NewPoItem, NewPurchaseOrder, PurchaseOrderWithItems};
use toko_db::repository::supplier::DistributorInput;
use toko_db::repository::user::NewUser;
use toko_db::{Database, DbConfig};

pub async fn test_db() -> Database {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

/// Compares the candidate against the stored hash directly, so test
/// users can store their password in the hash column. Keeps the
/// approval tests fast and independent of bcrypt cost.
pub struct PlainVerifier;

impl CredentialVerifier for PlainVerifier {
    fn verify(&self, candidate: &str, hash: &str) -> bool {
        candidate == hash
    }
}

pub fn kopi_units() -> Vec<NewUnit> {
    vec![
        NewUnit {
            name: "Pcs".to_string(),
            conversion: 1,
            price: Money::new(1_500),
        },
        NewUnit {
            name: "Renceng".to_string(),
            conversion: 10,
            price: Money::new(14_000),
        },
        NewUnit {
            name: "Karton".to_string(),
            conversion: 20,
            price: Money::new(26_000),
        },
    ]
}

pub async fn seed_product(db: &Database, sku: &str, initial_stock: i64) -> Product {
    db.products()
        .create(NewProduct {
            sku: sku.to_string(),
            name: format!("Kopi {}", sku),
            brand: None,
            category: Some("Minuman".to_string()),
            min_stock: 5,
            notes: None,
            units: kopi_units(),
            initial_stock,
        })
        .await
        .expect("seed product")
}

pub async fn seed_distributor(db: &Database, name: &str) -> Distributor {
    db.suppliers()
        .create(DistributorInput {
            name: name.to_string(),
            phone: Some("081234567890".to_string()),
            address: None,
        })
        .await
        .expect("seed distributor")
}

pub async fn seed_customer(db: &Database, name: &str, customer_type: CustomerType) -> Customer {
    db.customers()
        .create(CustomerInput {
            name: name.to_string(),
            customer_type,
            phone: None,
            address: None,
        })
        .await
        .expect("seed customer")
}

pub async fn seed_user(db: &Database, username: &str, role: UserRole, password: &str) -> User {
    db.users()
        .create(NewUser {
            username: username.to_string(),
            name: username.to_string(),
            role,
            password_hash: password.to_string(),
        })
        .await
        .expect("seed user")
}

/// Creates and receives a purchase order for `quantity` Karton of the
/// product, leaving the product with `quantity * 20` base units from
/// the given distributor.
pub async fn receive_karton_po(
    db: &Database,
    product_id: &str,
    distributor_id: &str,
    quantity: i64,
) -> PurchaseOrderWithItems {
    let po = db
        .purchase_orders()
        .create(NewPurchaseOrder {
            distributor_id: distributor_id.to_string(),
            note: None,
            items: vec![NewPoItem {
                product_id: product_id.to_string(),
                unit_name: "Karton".to_string(),
                quantity,
                unit_cost: Money::new(20_000),
            }],
        })
        .await
        .expect("create purchase order");

    db.purchase_orders()
        .receive(&po.order.id)
        .await
        .expect("receive purchase order")
}
