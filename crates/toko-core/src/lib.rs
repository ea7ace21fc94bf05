//! # toko-core: Pure Business Logic for Toko POS
//!
//! This crate is the **heart** of Toko POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Toko POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  HTTP layer (out of tree)                       │   │
//! │  │    Catalog UI ──► Register UI ──► Returns UI ──► Reports       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ toko-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  barcode  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  EAN-13   │  │   rules   │  │   │
//! │  │   │  Ledger   │  │  (i64)    │  │  doc nums │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    toko-db (Ledger Engine)                      │   │
//! │  │        SQLite transactions, migrations, repositories            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Unit, StockMovement, Sale, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`barcode`] - EAN-13 math and document number formatting
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Base Units**: All stock quantities are i64 base units; unit
//!    conversion happens exactly once, at the edge of each operation
//! 4. **Integer Money**: All monetary values are whole rupiah (i64)
//! 5. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use toko_core::money::Money;
//! use toko_core::barcode::is_valid_ean13;
//!
//! let price = Money::new(14_000);
//! let line = price * 2;
//! assert_eq!(line.amount(), 28_000);
//!
//! assert!(is_valid_ean13("4006381333931"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod barcode;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use toko_core::Money` instead of
// `use toko_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity on a single document line.
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., typing 10000 instead of 10).
/// The cap is in the entered unit, not base units.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// How many times barcode generation retries on a uniqueness collision
/// before giving up.
pub const BARCODE_GENERATION_ATTEMPTS: u32 = 100;

/// How many times invoice number generation retries on a collision
/// within one transaction.
pub const INVOICE_GENERATION_ATTEMPTS: u32 = 10;
