//! # Barcode & Document Numbers
//!
//! EAN-13 barcode math and business document number formatting.
//!
//! ## EAN-13 Check Digit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Code:      8  9  9  1  2  3  4  5  6  7  8  9  ?                      │
//! │  Position:  0  1  2  3  4  5  6  7  8  9 10 11                         │
//! │  Weight:    1  3  1  3  1  3  1  3  1  3  1  3                         │
//! │                                                                         │
//! │  sum   = Σ digit × weight                                               │
//! │  check = (10 - sum % 10) % 10                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Document Numbers
//! | Document        | Format              | Example             |
//! |-----------------|---------------------|---------------------|
//! | Sale invoice    | INV-YYYYMMDD-NNNN   | INV-20260823-0421   |
//! | Sales return    | RTN-YYYYMMDD-NNNN   | RTN-20260823-0007   |
//! | Purchase return | RTB-YYYYMMDD-NNNN   | RTB-20260823-0003   |
//! | Purchase order  | PO-XXXXXXXX         | PO-3FA85F64         |
//!
//! The PO number is derived from the last 8 characters of the order's
//! UUID, uppercased, so it can be resolved back to the row without a
//! separate counter.

use chrono::{DateTime, Utc};

// =============================================================================
// EAN-13
// =============================================================================

/// Computes the EAN-13 check digit for 12 payload digits.
///
/// Digits at even positions weigh 1, odd positions weigh 3.
pub fn ean13_check_digit(digits: &[u8; 12]) -> u8 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let weight = if i % 2 == 0 { 1 } else { 3 };
            d as u32 * weight
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Checks whether a string is a structurally valid EAN-13 code:
/// 13 ASCII digits with a correct check digit.
pub fn is_valid_ean13(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let mut payload = [0u8; 12];
    for (i, b) in bytes[..12].iter().enumerate() {
        payload[i] = b - b'0';
    }

    ean13_check_digit(&payload) == bytes[12] - b'0'
}

/// Builds a complete EAN-13 code from a numeric seed.
///
/// The seed is reduced to 12 decimal digits and the check digit is
/// appended. Deterministic for a given seed; the caller supplies fresh
/// randomness (a UUID) and retries on a uniqueness collision.
pub fn ean13_from_seed(seed: u128) -> String {
    let payload_value = seed % 1_000_000_000_000u128;
    let payload_str = format!("{:012}", payload_value);

    let mut payload = [0u8; 12];
    for (i, b) in payload_str.bytes().enumerate() {
        payload[i] = b - b'0';
    }

    let check = ean13_check_digit(&payload);
    format!("{}{}", payload_str, check)
}

// =============================================================================
// Document Numbers
// =============================================================================

/// Formats a sale invoice number: `INV-YYYYMMDD-NNNN`.
///
/// `sequence` wraps into four digits; callers retry with a new sequence
/// on a uniqueness collision.
pub fn format_invoice_number(at: DateTime<Utc>, sequence: u32) -> String {
    format!("INV-{}-{:04}", at.format("%Y%m%d"), sequence % 10_000)
}

/// Formats a sales return number: `RTN-YYYYMMDD-NNNN`.
pub fn format_sales_return_number(at: DateTime<Utc>, sequence: u32) -> String {
    format!("RTN-{}-{:04}", at.format("%Y%m%d"), sequence % 10_000)
}

/// Formats a purchase return number: `RTB-YYYYMMDD-NNNN`.
pub fn format_purchase_return_number(at: DateTime<Utc>, sequence: u32) -> String {
    format!("RTB-{}-{:04}", at.format("%Y%m%d"), sequence % 10_000)
}

/// Derives the display number of a purchase order from its UUID:
/// `PO-` + last 8 characters, uppercased.
pub fn po_display_number(po_id: &str) -> String {
    let suffix: String = po_id
        .chars()
        .rev()
        .take(8)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("PO-{}", suffix.to_uppercase())
}

/// Whether a purchase order id matches a display number ("PO-3FA85F64"
/// or just the bare suffix). Case-insensitive.
pub fn po_id_matches_display(po_id: &str, display: &str) -> bool {
    let needle = display
        .trim()
        .strip_prefix("PO-")
        .or_else(|| display.trim().strip_prefix("po-"))
        .unwrap_or_else(|| display.trim())
        .to_uppercase();

    if needle.len() != 8 {
        return false;
    }

    po_display_number(po_id).ends_with(&needle)
}

// =============================================================================
// Unit Tests
// =============================================================================
