//! # Error Types
//!
//! Domain-specific error types for toko-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  toko-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  toko-db errors (separate crate)                                       │
//! │  └── DbError          - Database / ledger operation failures           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, quantities)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Insufficient stock to fulfil a request, reported in BASE units.
    ///
    /// ## When This Occurs
    /// - A sale line requests more than the product holds
    /// - A purchase return would push the product total negative
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 3 Karton (conversion 20)
    ///      │
    ///      ▼
    /// Need 60 base units, stock holds 45
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "KOPI-SCH", available: 45, requested: 60,
    ///                     max_sellable: 2 }
    ///      │
    ///      ▼
    /// UI shows: "Only 2 Karton of KOPI-SCH can be sold"
    /// ```
    ///
    /// `max_sellable` is `available / conversion` (floor division), the
    /// largest whole quantity of the REQUESTED unit that would succeed.
    #[error("Insufficient stock for {sku}: available {available} base units, requested {requested} (max {max_sellable} in requested unit)")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
        max_sellable: i64,
    },

    /// A unit name is not registered for the product.
    ///
    /// ## When This Occurs
    /// - A sale, return, or receive line names a unit the product
    ///   does not define
    ///
    /// Every movement converts through the unit table; an unknown unit
    /// makes the conversion undefined, so the whole operation fails.
    #[error("Unit '{unit}' is not defined for product {sku}")]
    UnknownUnit { sku: String, unit: String },

    /// A return quantity exceeds the remaining returnable amount.
    ///
    /// The cap is the originally transacted quantity for that
    /// product + unit pair, minus quantities already claimed by prior
    /// non-rejected returns.
    #[error("Return quantity {requested} exceeds remaining returnable {remaining} for product {product_id}")]
    ReturnCapExceeded {
        product_id: String,
        requested: i64,
        remaining: i64,
    },

    /// Entity is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Receiving a purchase order that is already COMPLETED
    /// - Approving a return that is not PENDING
    /// - Cancelling a non-PENDING purchase order
    #[error("{entity} {id} is {current_status}, cannot {operation}")]
    InvalidStatus {
        entity: &'static str,
        id: String,
        current_status: String,
        operation: &'static str,
    },

    /// Credit sale (BON) attempted for a walk-in (UMUM) customer.
    ///
    /// Walk-in customers carry no account, so there is nowhere to book
    /// the receivable.
    #[error("Credit sale not allowed for walk-in customer {customer_id}")]
    CreditNotAllowed { customer_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed barcode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate SKU, duplicate unit name).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            sku: "KOPI-SCH".to_string(),
            available: 45,
            requested: 60,
            max_sellable: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for KOPI-SCH: available 45 base units, requested 60 (max 2 in requested unit)"
        );
    }

    #[test]
    fn test_unknown_unit_message() {
        let err = CoreError::UnknownUnit {
            sku: "KOPI-SCH".to_string(),
            unit: "Lusin".to_string(),
        };
        assert_eq!(err.to_string(), "Unit 'Lusin' is not defined for product KOPI-SCH");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::Duplicate {
            field: "unit".to_string(),
            value: "Pcs".to_string(),
        };
        assert_eq!(err.to_string(), "unit 'Pcs' already exists");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
