//! # Validation Module
//!
//! Input validation utilities for Toko POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (HTTP layer, import file parser)                      │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  ├── Conversion factors, unit sets, quantities                         │
//! │  └── Runs before any transaction is opened                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE / CHECK constraints                             │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use toko_core::validation::{validate_sku, validate_conversion};
//!
//! validate_sku("KOPI-SCH").unwrap();
//! validate_conversion(20).unwrap();
//! ```

use crate::error::ValidationError;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use toko_core::validation::validate_sku;
///
/// assert!(validate_sku("KOPI-SCH").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an entity display name (product, customer, distributor,
/// warehouse).
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a unit name ("Pcs", "Renceng", "Karton").
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 30 characters
pub fn validate_unit_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "unit name".to_string(),
        });
    }

    if name.len() > 30 {
        return Err(ValidationError::TooLong {
            field: "unit name".to_string(),
            max: 30,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (sale line, PO line, return line).
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit conversion factor.
///
/// ## Rules
/// - Must be at least 1 (the base unit itself has conversion 1)
///
/// A conversion of 0 would make every quantity in that unit vanish; a
/// negative conversion would turn sales into receipts.
pub fn validate_conversion(conversion: i64) -> ValidationResult<()> {
    if conversion < 1 {
        return Err(ValidationError::OutOfRange {
            field: "conversion".to_string(),
            min: 1,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a price or cost amount.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (promotional items)
pub fn validate_price(amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a debt payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_payment_amount(amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Set Validators
// =============================================================================

/// Validates the unit set of a product: (name, conversion) pairs.
///
/// ## Rules
/// - At least one unit
/// - Exactly one unit with conversion 1 (the base unit)
/// - Unit names unique within the product (case-insensitive)
/// - Every conversion valid per `validate_conversion`
pub fn validate_unit_set(units: &[(String, i64)]) -> ValidationResult<()> {
    if units.is_empty() {
        return Err(ValidationError::Required {
            field: "units".to_string(),
        });
    }

    let mut base_count = 0;
    let mut seen: Vec<String> = Vec::with_capacity(units.len());

    for (name, conversion) in units {
        validate_unit_name(name)?;
        validate_conversion(*conversion)?;

        if *conversion == 1 {
            base_count += 1;
        }

        let lowered = name.trim().to_lowercase();
        if seen.contains(&lowered) {
            return Err(ValidationError::Duplicate {
                field: "unit".to_string(),
                value: name.trim().to_string(),
            });
        }
        seen.push(lowered);
    }

    if base_count != 1 {
        return Err(ValidationError::InvalidFormat {
            field: "units".to_string(),
            reason: "exactly one unit must have conversion 1".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use toko_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("KOPI-SCH").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Kopi Sachet 20g").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(100_000).is_err());
    }

    #[test]
    fn test_validate_conversion() {
        assert!(validate_conversion(1).is_ok());
        assert!(validate_conversion(20).is_ok());
        assert!(validate_conversion(0).is_err());
        assert!(validate_conversion(-5).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0).is_ok());
        assert!(validate_price(14_000).is_ok());
        assert!(validate_price(-100).is_err());
    }

    #[test]
    fn test_validate_unit_set() {
        let valid = vec![
            ("Pcs".to_string(), 1),
            ("Renceng".to_string(), 10),
            ("Karton".to_string(), 20),
        ];
        assert!(validate_unit_set(&valid).is_ok());

        // No base unit
        let no_base = vec![("Karton".to_string(), 20)];
        assert!(validate_unit_set(&no_base).is_err());

        // Two base units
        let two_base = vec![("Pcs".to_string(), 1), ("Biji".to_string(), 1)];
        assert!(validate_unit_set(&two_base).is_err());

        // Duplicate name, case-insensitive
        let dup = vec![("Pcs".to_string(), 1), ("pcs".to_string(), 10)];
        assert!(validate_unit_set(&dup).is_err());

        // Empty set
        assert!(validate_unit_set(&[]).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
