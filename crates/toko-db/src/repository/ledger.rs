//! # Stock Ledger
//!
//! The append-only stock history and the single write path for stock.
//!
//! ## The One Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EVERY stock change goes through apply_movement, INSIDE the            │
//! │  transaction of the operation that caused it.                          │
//! │                                                                         │
//! │  receive PO ──┐                                                        │
//! │  sale ────────┤                                                        │
//! │  return ──────┼──► apply_movement(&mut tx, ...)                        │
//! │  add stock ───┤        │                                               │
//! │  adjustment ──┘        ├── read products.stock      (before)           │
//! │                        ├── check result >= 0                           │
//! │                        ├── UPDATE products.stock    (after)            │
//! │                        └── INSERT stock_history row (before/after)     │
//! │                                                                         │
//! │  Chain invariant: after == before + qty_change, and the next row's     │
//! │  before equals this row's after. Holding the write transaction across  │
//! │  both statements is what makes the chain gapless.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Warehouse transfers use [`apply_warehouse_movement`] instead: their
//! before/after figures are per-warehouse and the product total does not
//! change.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toko_core::{MovementRef, MovementType, StockMovement};

// =============================================================================
// Movement Input
// =============================================================================

/// Input for one ledger movement.
#[derive(Debug, Clone)]
pub struct MovementInput<'a> {
    pub product_id: &'a str,

    pub movement_type: MovementType,

    /// Signed change in BASE units. Positive adds stock.
    pub base_delta: i64,

    /// Unit the operator worked in, for the history row.
    pub unit_name: &'a str,

    /// Quantity in `unit_name` units as entered.
    pub unit_qty: i64,

    pub note: Option<&'a str>,

    pub reference: Option<MovementRef>,
}

// =============================================================================
// Write Path
// =============================================================================

/// Applies one stock movement inside the caller's transaction.
///
/// Reads the current product stock, rejects any movement that would
/// take it negative, updates the projection, and appends the history
/// row. The caller holds the transaction, so either everything it did
/// lands together or none of it does.
///
/// ## Errors
/// - `NotFound` if the product does not exist
/// - `Conflict` if the movement would drive stock negative (callers
///   that know the requested unit produce the friendlier
///   `InsufficientStock` before getting here)
pub async fn apply_movement(
    tx: &mut SqliteConnection,
    input: MovementInput<'_>,
) -> DbResult<StockMovement> {
    let stock_before: i64 = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
        .bind(input.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Product", input.product_id))?;

    let stock_after = stock_before + input.base_delta;
    if stock_after < 0 {
        return Err(DbError::conflict(format!(
            "movement of {} base units would take product {} below zero (current {})",
            input.base_delta, input.product_id, stock_before
        )));
    }

    let now = Utc::now();

    sqlx::query("UPDATE products SET stock = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(stock_after)
        .bind(now)
        .bind(input.product_id)
        .execute(&mut *tx)
        .await?;

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: input.product_id.to_string(),
        movement_type: input.movement_type,
        qty_change: input.base_delta,
        stock_before,
        stock_after,
        unit_name: input.unit_name.to_string(),
        unit_qty: input.unit_qty,
        note: input.note.map(str::to_string),
        reference_type: input.reference.as_ref().map(|r| r.kind().to_string()),
        reference_id: input
            .reference
            .as_ref()
            .and_then(|r| r.id().map(str::to_string)),
        warehouse_id: None,
        created_at: now,
    };

    insert_history_row(tx, &movement).await?;

    debug!(
        product_id = %movement.product_id,
        movement_type = ?movement.movement_type,
        qty_change = movement.qty_change,
        stock_after = movement.stock_after,
        "Applied stock movement"
    );

    Ok(movement)
}

/// Applies a per-warehouse movement inside the caller's transaction.
///
/// Updates the warehouse's stock_items row (creating it for inbound
/// movements) and appends a history row whose before/after are the
/// WAREHOUSE level, not the product total. The product total is
/// untouched; transfers conserve it by construction.
pub async fn apply_warehouse_movement(
    tx: &mut SqliteConnection,
    warehouse_id: &str,
    input: MovementInput<'_>,
) -> DbResult<StockMovement> {
    let existing: Option<(String, i64)> = sqlx::query_as(
        "SELECT id, stock FROM stock_items WHERE warehouse_id = ?1 AND product_id = ?2",
    )
    .bind(warehouse_id)
    .bind(input.product_id)
    .fetch_optional(&mut *tx)
    .await?;

    let now = Utc::now();
    let (stock_before, stock_after) = match existing {
        Some((item_id, before)) => {
            let after = before + input.base_delta;
            if after < 0 {
                return Err(DbError::conflict(format!(
                    "warehouse {} holds {} base units of product {}, cannot remove {}",
                    warehouse_id, before, input.product_id, -input.base_delta
                )));
            }
            sqlx::query("UPDATE stock_items SET stock = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(after)
                .bind(now)
                .bind(&item_id)
                .execute(&mut *tx)
                .await?;
            (before, after)
        }
        None => {
            if input.base_delta < 0 {
                return Err(DbError::conflict(format!(
                    "warehouse {} holds no stock of product {}",
                    warehouse_id, input.product_id
                )));
            }
            sqlx::query(
                r#"
                INSERT INTO stock_items (id, warehouse_id, product_id, stock, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(warehouse_id)
            .bind(input.product_id)
            .bind(input.base_delta)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            (0, input.base_delta)
        }
    };

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: input.product_id.to_string(),
        movement_type: input.movement_type,
        qty_change: input.base_delta,
        stock_before,
        stock_after,
        unit_name: input.unit_name.to_string(),
        unit_qty: input.unit_qty,
        note: input.note.map(str::to_string),
        reference_type: input.reference.as_ref().map(|r| r.kind().to_string()),
        reference_id: input
            .reference
            .as_ref()
            .and_then(|r| r.id().map(str::to_string)),
        warehouse_id: Some(warehouse_id.to_string()),
        created_at: now,
    };

    insert_history_row(tx, &movement).await?;

    debug!(
        product_id = %movement.product_id,
        warehouse_id = %warehouse_id,
        qty_change = movement.qty_change,
        "Applied warehouse stock movement"
    );

    Ok(movement)
}

async fn insert_history_row(tx: &mut SqliteConnection, m: &StockMovement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_history (
            id, product_id, movement_type, qty_change, stock_before, stock_after,
            unit_name, unit_qty, note, reference_type, reference_id, warehouse_id,
            created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&m.id)
    .bind(&m.product_id)
    .bind(m.movement_type)
    .bind(m.qty_change)
    .bind(m.stock_before)
    .bind(m.stock_after)
    .bind(&m.unit_name)
    .bind(m.unit_qty)
    .bind(&m.note)
    .bind(&m.reference_type)
    .bind(&m.reference_id)
    .bind(&m.warehouse_id)
    .bind(m.created_at)
    .execute(&mut *tx)
    .await?;
    Ok(())
}

// =============================================================================
// Read Side
// =============================================================================

/// One stock card line: a movement plus the business number of the
/// document it came from, resolved for display.
#[derive(Debug, Clone)]
pub struct StockCardEntry {
    pub movement: StockMovement,

    /// "INV-20260823-0421", "PO-3FA85F64", "RTN-...", when resolvable.
    pub reference_number: Option<String>,
}

/// Read-side queries over the stock ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Lists movements for a product, newest first.
    pub async fn history_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, qty_change, stock_before,
                   stock_after, unit_name, unit_qty, note, reference_type,
                   reference_id, warehouse_id, created_at
            FROM stock_history
            WHERE product_id = ?1
            ORDER BY rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Lists movements originating from one document.
    pub async fn history_for_reference(&self, reference: &MovementRef) -> DbResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, qty_change, stock_before,
                   stock_after, unit_name, unit_qty, note, reference_type,
                   reference_id, warehouse_id, created_at
            FROM stock_history
            WHERE reference_type = ?1
              AND (?2 IS NULL OR reference_id = ?2)
            ORDER BY rowid ASC
            "#,
        )
        .bind(reference.kind())
        .bind(reference.id())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Builds the stock card for a product: full history, oldest first,
    /// with each movement's originating document number resolved.
    pub async fn stock_card(&self, product_id: &str) -> DbResult<Vec<StockCardEntry>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, qty_change, stock_before,
                   stock_after, unit_name, unit_qty, note, reference_type,
                   reference_id, warehouse_id, created_at
            FROM stock_history
            WHERE product_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(movements.len());
        for movement in movements {
            let reference_number = match movement.reference() {
                Some(MovementRef::PurchaseOrder(id)) => {
                    sqlx::query_scalar::<_, String>(
                        "SELECT po_number FROM purchase_orders WHERE id = ?1",
                    )
                    .bind(&id)
                    .fetch_optional(&self.pool)
                    .await?
                }
                Some(MovementRef::Sale(id)) => {
                    sqlx::query_scalar::<_, String>(
                        "SELECT invoice_number FROM sales WHERE id = ?1",
                    )
                    .bind(&id)
                    .fetch_optional(&self.pool)
                    .await?
                }
                Some(MovementRef::SalesReturn(id)) => {
                    sqlx::query_scalar::<_, String>(
                        "SELECT return_number FROM sales_returns WHERE id = ?1",
                    )
                    .bind(&id)
                    .fetch_optional(&self.pool)
                    .await?
                }
                Some(MovementRef::PurchaseReturn(id)) => {
                    sqlx::query_scalar::<_, String>(
                        "SELECT return_number FROM purchase_returns WHERE id = ?1",
                    )
                    .bind(&id)
                    .fetch_optional(&self.pool)
                    .await?
                }
                Some(MovementRef::Transfer) | None => None,
            };

            entries.push(StockCardEntry {
                movement,
                reference_number,
            });
        }

        Ok(entries)
    }

    /// Checks the chain invariant for a product's PRODUCT-LEVEL history
    /// (transfer rows are per-warehouse and excluded).
    ///
    /// Returns true when every row satisfies
    /// `stock_after == stock_before + qty_change` and each row's
    /// `stock_before` equals the previous row's `stock_after`.
    pub async fn chain_is_contiguous(&self, product_id: &str) -> DbResult<bool> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, qty_change, stock_before,
                   stock_after, unit_name, unit_qty, note, reference_type,
                   reference_id, warehouse_id, created_at
            FROM stock_history
            WHERE product_id = ?1 AND warehouse_id IS NULL
            ORDER BY rowid ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        let mut previous_after: Option<i64> = None;
        for row in &rows {
            if row.stock_after != row.stock_before + row.qty_change {
                return Ok(false);
            }
            if let Some(prev) = previous_after {
                if row.stock_before != prev {
                    return Ok(false);
                }
            }
            previous_after = Some(row.stock_after);
        }

        Ok(true)
    }
}
