//! # toko-db: Database Layer for Toko POS
//!
//! SQLite persistence for the store: catalog, stock ledger, purchase
//! orders, sales, returns, debt bookkeeping, warehouses, and the
//! notification outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Toko POS Data Flow                              │
//! │                                                                         │
//! │  Caller (app command, import job, delivery worker)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      toko-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo      │    │ 001_initial_ │  │   │
//! │  │   │ Connection    │    │ ReturnRepo    │    │ schema.sql   │  │   │
//! │  │   │ Management    │    │ ledger::...   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure business rules (money, units, validation, document numbers)
//! live in `toko_core`; this crate owns transactions and SQL. The one
//! rule that holds the system together: every stock change goes through
//! [`repository::ledger::apply_movement`] inside the transaction of the
//! operation that caused it.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, sale, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toko_db::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/toko.db");
//! let db = Database::new(config).await?;
//!
//! let kopi = db.products().get_by_sku("KOPI-001").await?;
//! let card = db.ledger().stock_card(&kopi.unwrap().id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::barcode::BarcodeRepository;
pub use repository::customer::CustomerRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::outbox::NotificationOutboxRepository;
pub use repository::product::ProductRepository;
pub use repository::purchase_order::PurchaseOrderRepository;
pub use repository::retur::ReturnRepository;
pub use repository::sale::SaleRepository;
pub use repository::supplier::SupplierRepository;
pub use repository::user::UserRepository;
pub use repository::warehouse::WarehouseRepository;
