//! # Domain Types
//!
//! Core domain types used throughout Toko POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Unit       │   │ SupplierBinding │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  product_id     │   │  product_id     │       │
//! │  │  sku (business) │   │  name "Karton"  │   │  distributor_id │       │
//! │  │  stock (BASE)   │   │  conversion 20  │   │  stock (BASE)   │       │
//! │  └─────────────────┘   │  price          │   │  is_default     │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StockMovement  │   │  PurchaseOrder  │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  qty_change     │   │  PENDING        │   │  invoice_number │       │
//! │  │  stock_before   │   │     │ receive   │   │  LUNAS / BON    │       │
//! │  │  stock_after    │   │     ▼           │   │  snapshot items │       │
//! │  │  reference      │   │  COMPLETED      │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Base Unit Rule
//! `Product::stock` is ALWAYS in base units (conversion 1). Every other
//! quantity in the system is declared together with a unit name and is
//! converted through that unit's `conversion` factor before touching stock.
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, invoice_number, po_number, etc.) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product & Units
// =============================================================================

/// A product in the catalog.
///
/// `stock` is the authoritative on-hand total in BASE units. Supplier
/// bindings and warehouse stock items partition this same total and are
/// updated in the same transaction as any movement that names them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Optional brand label.
    pub brand: Option<String>,

    /// Optional category label for grouping.
    pub category: Option<String>,

    /// On-hand stock in BASE units.
    pub stock: i64,

    /// Reorder threshold in base units. Stock at or below this level
    /// puts the product on the purchase-order suggestion list.
    pub min_stock: i64,

    /// Free-form remarks.
    pub notes: Option<String>,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A sellable unit of a product.
///
/// Every product carries at least one unit with `conversion == 1` (the
/// base unit). Larger pack sizes carry their own price and a conversion
/// factor back to base units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Unit {
    pub id: String,
    pub product_id: String,

    /// Unit name, unique per product ("Pcs", "Renceng", "Karton").
    pub name: String,

    /// How many base units one of this unit contains. Always >= 1.
    pub conversion: i64,

    /// Selling price for one of this unit.
    pub price: Money,

    pub created_at: DateTime<Utc>,
}

impl Unit {
    /// Whether this is the base unit (conversion factor 1).
    #[inline]
    pub fn is_base(&self) -> bool {
        self.conversion == 1
    }

    /// Converts a quantity of this unit into base units.
    #[inline]
    pub fn to_base(&self, qty: i64) -> i64 {
        qty * self.conversion
    }

    /// Largest whole quantity of this unit fulfillable from `stock`
    /// base units (floor division).
    #[inline]
    pub fn max_fulfillable(&self, stock: i64) -> i64 {
        stock / self.conversion
    }
}

/// A product-distributor supply relationship.
///
/// Tracks the portion of the product's stock that was received from this
/// distributor, so purchase returns can be routed back to the supplier
/// that delivered the goods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SupplierBinding {
    pub id: String,
    pub product_id: String,
    pub distributor_id: String,

    /// Portion of the product total attributed to this supplier, in
    /// base units.
    pub stock: i64,

    /// Preferred supplier for purchase-order suggestions.
    pub is_default: bool,

    pub created_at: DateTime<Utc>,
}

/// A scannable barcode mapped to a product and (optionally) a specific
/// unit and supplier binding.
///
/// Barcodes are globally unique across the whole table, not per product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Barcode {
    pub id: String,

    /// The scanned code itself (typically EAN-13), globally unique.
    pub barcode: String,

    pub product_id: String,

    /// Unit this code resolves to at the register. None means base unit.
    pub unit_id: Option<String>,

    /// Supplier binding the code was registered under, if any.
    pub binding_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Warehouses
// =============================================================================

/// A physical storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub location: Option<String>,

    /// At most one warehouse is the default at a time.
    pub is_default: bool,

    /// Soft-deleted warehouses stay in place until drained.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

/// Per-warehouse stock for a product, in base units.
///
/// The sum of a product's stock items never exceeds `Product::stock`;
/// transfers move quantity between rows and leave the total unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockItem {
    pub id: String,
    pub warehouse_id: String,
    pub product_id: String,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Classification of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Stock received (purchase order, manual add).
    In,
    /// Stock sold.
    Out,
    /// Manual correction after a physical count.
    Adjustment,
    /// Stock returned by a customer (approved sales return).
    ReturnSale,
    /// Stock sent back to a supplier.
    ReturnPurchase,
    /// Stock arriving at a warehouse from a transfer.
    TransferIn,
    /// Stock leaving a warehouse in a transfer.
    TransferOut,
}

impl MovementType {
    /// Whether this movement adds stock (positive qty_change).
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            MovementType::In | MovementType::ReturnSale | MovementType::TransferIn
        )
    }
}

/// The document a stock movement originated from.
///
/// Stored in the ledger as a (reference_type, reference_id) column pair;
/// this sum type keeps the pairing honest in Rust code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementRef {
    /// A received purchase order.
    PurchaseOrder(String),
    /// A sale.
    Sale(String),
    /// An approved sales return.
    SalesReturn(String),
    /// A purchase return.
    PurchaseReturn(String),
    /// A warehouse transfer (no document id of its own).
    Transfer,
}

impl MovementRef {
    /// The reference_type column value.
    pub fn kind(&self) -> &'static str {
        match self {
            MovementRef::PurchaseOrder(_) => "PO",
            MovementRef::Sale(_) => "TRANSACTION",
            MovementRef::SalesReturn(_) => "RETUR_PENJUALAN",
            MovementRef::PurchaseReturn(_) => "RETUR_PEMBELIAN",
            MovementRef::Transfer => "TRANSFER",
        }
    }

    /// The reference_id column value, when the document has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            MovementRef::PurchaseOrder(id)
            | MovementRef::Sale(id)
            | MovementRef::SalesReturn(id)
            | MovementRef::PurchaseReturn(id) => Some(id),
            MovementRef::Transfer => None,
        }
    }

    /// Reconstructs a reference from its column pair. Returns None for
    /// an unrecognized type or a typed reference missing its id.
    pub fn from_columns(reference_type: &str, reference_id: Option<&str>) -> Option<Self> {
        match (reference_type, reference_id) {
            ("PO", Some(id)) => Some(MovementRef::PurchaseOrder(id.to_string())),
            ("TRANSACTION", Some(id)) => Some(MovementRef::Sale(id.to_string())),
            ("RETUR_PENJUALAN", Some(id)) => Some(MovementRef::SalesReturn(id.to_string())),
            ("RETUR_PEMBELIAN", Some(id)) => Some(MovementRef::PurchaseReturn(id.to_string())),
            ("TRANSFER", _) => Some(MovementRef::Transfer),
            _ => None,
        }
    }
}

/// One append-only row in the stock ledger.
///
/// ## Chain Invariant
/// For consecutive movements of the same product (same warehouse scope):
/// `stock_after == stock_before + qty_change`, and the next row's
/// `stock_before` equals this row's `stock_after`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,

    /// Signed change in BASE units. Positive for inbound movements.
    pub qty_change: i64,

    /// Stock level before this movement, in base units.
    pub stock_before: i64,

    /// Stock level after this movement, in base units.
    pub stock_after: i64,

    /// The unit the operator worked in, for display ("2 Karton").
    pub unit_name: String,

    /// Quantity in `unit_name` units as entered by the operator.
    pub unit_qty: i64,

    pub note: Option<String>,

    /// Originating document type column ("PO", "TRANSACTION", ...).
    pub reference_type: Option<String>,

    /// Originating document id column.
    pub reference_id: Option<String>,

    /// Set only for TRANSFER_IN / TRANSFER_OUT rows, whose before/after
    /// are per-warehouse rather than the product total.
    pub warehouse_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// The originating document, when the columns form a known pair.
    pub fn reference(&self) -> Option<MovementRef> {
        self.reference_type
            .as_deref()
            .and_then(|t| MovementRef::from_columns(t, self.reference_id.as_deref()))
    }
}

// =============================================================================
// Purchase Orders
// =============================================================================

/// The status of a purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoStatus {
    /// Created, goods not yet received. The only cancellable state.
    Pending,
    /// Goods received and booked into stock. Terminal.
    Completed,
}

impl Default for PoStatus {
    fn default() -> Self {
        PoStatus::Pending
    }
}

/// An order placed with a distributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: String,

    /// Business number shown on documents ("PO-3FA85F64").
    pub po_number: String,

    pub distributor_id: String,
    pub status: PoStatus,
    pub total: Money,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// When the goods were received (status moved to COMPLETED).
    pub received_at: Option<DateTime<Utc>>,
}

/// A line on a purchase order.
/// Unit name and conversion are frozen at order time (snapshot pattern).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,

    /// Unit name at order time (frozen).
    pub unit_name: String,

    /// Conversion factor at order time (frozen).
    pub conversion: i64,

    /// Quantity ordered, in `unit_name` units.
    pub quantity: i64,

    /// Cost per `unit_name` unit at order time (frozen).
    pub unit_cost: Money,

    /// unit_cost × quantity.
    pub line_total: Money,
}

impl PurchaseOrderItem {
    /// Base units this line adds to stock when received.
    #[inline]
    pub fn base_quantity(&self) -> i64 {
        self.quantity * self.conversion
    }
}

// =============================================================================
// Sales
// =============================================================================

/// Payment classification of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleType {
    /// Paid in full at the register.
    Lunas,
    /// On credit. Books the total onto the customer's debt. Requires a
    /// registered (non-UMUM) customer.
    Bon,
}

/// A completed sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,

    /// Business number ("INV-20260823-0421"), unique.
    pub invoice_number: String,

    /// None for anonymous walk-in sales.
    pub customer_id: Option<String>,

    pub sale_type: SaleType,

    /// Sum of line totals before the order-level discount.
    pub subtotal: Money,

    /// Order-level discount off the subtotal.
    pub discount: Money,

    /// subtotal - discount.
    pub total: Money,

    /// Amount tendered by the customer.
    pub paid: Money,

    /// Change returned (paid - total, zero for BON).
    pub change_amount: Money,

    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,

    /// Product name at time of sale (frozen).
    pub name_snapshot: String,

    /// Unit name at time of sale (frozen).
    pub unit_name: String,

    /// Conversion factor at time of sale (frozen).
    pub conversion: i64,

    /// Quantity sold, in `unit_name` units.
    pub quantity: i64,

    /// Price per `unit_name` unit at time of sale (frozen).
    pub unit_price: Money,

    /// Discount off this line.
    pub discount: Money,

    /// unit_price × quantity - discount.
    pub line_total: Money,
}

impl SaleItem {
    /// Base units this line removes from stock.
    #[inline]
    pub fn base_quantity(&self) -> i64 {
        self.quantity * self.conversion
    }
}

// =============================================================================
// Parties
// =============================================================================

/// Customer account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    /// Walk-in. No account; credit sales are barred.
    Umum,
    /// Regular registered customer.
    Tetap,
    /// Wholesale customer.
    Grosir,
}

impl CustomerType {
    /// Whether this customer class may buy on credit.
    #[inline]
    pub fn can_take_credit(&self) -> bool {
        !matches!(self, CustomerType::Umum)
    }
}

/// A customer with an optional running debt balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub customer_type: CustomerType,
    pub phone: Option<String>,
    pub address: Option<String>,

    /// Outstanding receivable. Never negative.
    pub debt: Money,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A supplier the store orders from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Distributor {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,

    /// What the distributor owes the store (purchase returns awaiting
    /// settlement). Never negative.
    pub debt: Money,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Returns
// =============================================================================

/// Approval state of a sales return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    /// Awaiting manager approval. No stock or debt effect yet.
    Pending,
    /// Approved. Stock restored, customer debt reduced. Terminal.
    Approved,
    /// Rejected. Frees its quantities for future returns. Terminal.
    Rejected,
}

/// A customer return against a sale, subject to approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesReturn {
    pub id: String,

    /// Business number ("RTN-20260823-0007").
    pub return_number: String,

    pub sale_id: String,
    pub customer_id: Option<String>,
    pub status: ReturnStatus,
    pub total: Money,

    /// Why the filer is returning the goods.
    pub reason: Option<String>,

    /// Why the resolver refused. Set only on the REJECTED transition.
    pub rejected_reason: Option<String>,

    /// User who filed the return.
    pub created_by: String,

    /// User who approved or rejected it.
    pub resolved_by: Option<String>,

    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A line on a sales return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesReturnItem {
    pub id: String,
    pub sales_return_id: String,
    pub product_id: String,
    pub unit_name: String,
    pub conversion: i64,

    /// Quantity returned, in `unit_name` units.
    pub quantity: i64,

    /// Per-unit refund value (frozen from the original sale line).
    pub unit_price: Money,

    pub line_total: Money,
}

impl SalesReturnItem {
    /// Base units this line restores to stock when approved.
    #[inline]
    pub fn base_quantity(&self) -> i64 {
        self.quantity * self.conversion
    }
}

/// A return of goods to a distributor against a completed purchase
/// order. Applies immediately, no approval machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseReturn {
    pub id: String,

    /// Business number ("RTB-20260823-0003").
    pub return_number: String,

    pub purchase_order_id: String,
    pub distributor_id: String,
    pub total: Money,
    pub reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A line on a purchase return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseReturnItem {
    pub id: String,
    pub purchase_return_id: String,
    pub product_id: String,
    pub unit_name: String,
    pub conversion: i64,
    pub quantity: i64,
    pub unit_cost: Money,
    pub line_total: Money,
}

impl PurchaseReturnItem {
    /// Base units this line removes from stock.
    #[inline]
    pub fn base_quantity(&self) -> i64 {
        self.quantity * self.conversion
    }
}

// =============================================================================
// Users & Authorization
// =============================================================================

/// Role of a store user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Manager,
    /// Cashier. Needs a manager credential to apply a sales return
    /// immediately; otherwise the return queues as PENDING.
    Kasir,
}

impl UserRole {
    /// Whether this role may approve sales returns on its own.
    #[inline]
    pub fn can_approve_returns(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }
}

/// A store user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: UserRole,

    /// Opaque credential hash. Never serialized out.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Verifies a plaintext credential against a stored hash.
///
/// Lives in toko-core so the return-approval rules stay testable without
/// a real hashing backend; toko-db supplies the bcrypt implementation.
pub trait CredentialVerifier {
    fn verify(&self, candidate: &str, hash: &str) -> bool;
}

/// Who is filing a sales return, and with what authority.
#[derive(Debug, Clone)]
pub enum ReturnActor {
    /// Applies immediately, self-approved.
    Admin { user_id: String },
    /// Applies immediately, self-approved.
    Manager { user_id: String },
    /// Without a password the return queues as PENDING. With a password
    /// it is checked against active admin/manager credentials: a match
    /// applies the return immediately, a mismatch is rejected outright.
    Cashier {
        user_id: String,
        admin_password: Option<String>,
    },
}

impl ReturnActor {
    /// The filing user's id.
    pub fn user_id(&self) -> &str {
        match self {
            ReturnActor::Admin { user_id }
            | ReturnActor::Manager { user_id }
            | ReturnActor::Cashier { user_id, .. } => user_id,
        }
    }
}

// =============================================================================
// Notification Outbox
// =============================================================================

/// Delivery channel for queued notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    Email,
    Whatsapp,
}

/// An entry in the notification outbox queue.
///
/// Outbox pattern: the row is written in the same transaction as the
/// business change it announces (low-stock alert, debt reminder), then
/// delivered by a worker with retry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct NotificationOutboxEntry {
    pub id: String,
    pub channel: NotificationChannel,

    /// Email address or phone number, per channel.
    pub recipient: String,

    pub subject: Option<String>,

    /// Message body or structured payload as JSON.
    pub payload: String,

    /// Number of delivery attempts so far.
    pub attempts: i64,

    /// Last error message if delivery failed.
    pub last_error: Option<String>,

    /// Earliest time the worker may retry, per the backoff schedule.
    pub next_attempt_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    /// When delivery was last attempted.
    pub attempted_at: Option<DateTime<Utc>>,

    /// When successfully delivered.
    pub sent_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, conversion: i64) -> Unit {
        Unit {
            id: "u1".to_string(),
            product_id: "p1".to_string(),
            name: name.to_string(),
            conversion,
            price: Money::new(14_000),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unit_conversion() {
        let karton = unit("Karton", 20);
        assert!(!karton.is_base());
        assert_eq!(karton.to_base(2), 40);

        let pcs = unit("Pcs", 1);
        assert!(pcs.is_base());
        assert_eq!(pcs.to_base(7), 7);
    }

    #[test]
    fn test_max_fulfillable_floors() {
        let renceng = unit("Renceng", 10);
        assert_eq!(renceng.max_fulfillable(45), 4);
        assert_eq!(renceng.max_fulfillable(9), 0);
        assert_eq!(renceng.max_fulfillable(10), 1);
    }

    #[test]
    fn test_movement_ref_columns_round_trip() {
        let r = MovementRef::PurchaseOrder("abc".to_string());
        assert_eq!(r.kind(), "PO");
        assert_eq!(r.id(), Some("abc"));
        assert_eq!(MovementRef::from_columns("PO", Some("abc")), Some(r));

        assert_eq!(MovementRef::Transfer.id(), None);
        assert_eq!(
            MovementRef::from_columns("TRANSFER", None),
            Some(MovementRef::Transfer)
        );

        assert_eq!(MovementRef::from_columns("UNKNOWN", Some("x")), None);
        assert_eq!(MovementRef::from_columns("PO", None), None);
    }

    #[test]
    fn test_movement_type_direction() {
        assert!(MovementType::In.is_inbound());
        assert!(MovementType::ReturnSale.is_inbound());
        assert!(!MovementType::Out.is_inbound());
        assert!(!MovementType::ReturnPurchase.is_inbound());
    }

    #[test]
    fn test_customer_credit_rules() {
        assert!(!CustomerType::Umum.can_take_credit());
        assert!(CustomerType::Tetap.can_take_credit());
        assert!(CustomerType::Grosir.can_take_credit());
    }

    #[test]
    fn test_role_approval_rules() {
        assert!(UserRole::Admin.can_approve_returns());
        assert!(UserRole::Manager.can_approve_returns());
        assert!(!UserRole::Kasir.can_approve_returns());
    }

    #[test]
    fn test_status_enums_serialize_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&MovementType::ReturnPurchase).unwrap(),
            "\"RETURN_PURCHASE\""
        );
        assert_eq!(
            serde_json::to_string(&SaleType::Bon).unwrap(),
            "\"BON\""
        );
        assert_eq!(
            serde_json::from_str::<ReturnStatus>("\"PENDING\"").unwrap(),
            ReturnStatus::Pending
        );
        assert_eq!(
            serde_json::to_string(&NotificationChannel::Whatsapp).unwrap(),
            "\"WHATSAPP\""
        );
    }

    #[test]
    fn test_po_item_base_quantity() {
        let item = PurchaseOrderItem {
            id: "i1".to_string(),
            purchase_order_id: "po1".to_string(),
            product_id: "p1".to_string(),
            unit_name: "Karton".to_string(),
            conversion: 20,
            quantity: 2,
            unit_cost: Money::new(180_000),
            line_total: Money::new(360_000),
        };
        assert_eq!(item.base_quantity(), 40);
    }
}
