//! # Repository Module
//!
//! Database repository implementations for Toko POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │                                                                 │
//! │       │  db.purchase_orders().receive("po-id")                          │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  PurchaseOrderRepository                                               │
//! │  ├── opens ONE transaction                                             │
//! │  ├── ledger::apply_movement(&mut tx, ...) per line                     │
//! │  └── commits or rolls back as a whole                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every write that touches stock goes through ledger::apply_movement    │
//! │  inside the caller's transaction, so the history chain and the stock   │
//! │  projection can never diverge.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD, add-stock, stock card, import
//! - [`supplier::SupplierRepository`] - Distributors and supplier bindings
//! - [`customer::CustomerRepository`] - Customers and debt payments
//! - [`user::UserRepository`] - Store users
//! - [`barcode::BarcodeRepository`] - Barcode management and generation
//! - [`purchase_order::PurchaseOrderRepository`] - PO lifecycle and receive
//! - [`sale::SaleRepository`] - Sale processing
//! - [`retur::ReturnRepository`] - Sales and purchase returns
//! - [`warehouse::WarehouseRepository`] - Warehouses and transfers
//! - [`ledger::LedgerRepository`] - Stock ledger read side
//! - [`outbox::NotificationOutboxRepository`] - Notification queue

pub mod barcode;
pub mod customer;
pub mod ledger;
pub mod outbox;
pub mod product;
pub mod purchase_order;
pub mod retur;
pub mod sale;
pub mod supplier;
pub mod user;
pub mod warehouse;
