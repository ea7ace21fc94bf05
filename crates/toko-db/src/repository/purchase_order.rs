//! # Purchase Order Repository
//!
//! Purchase order lifecycle: create, receive, cancel.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create ──► PENDING ──── receive ────► COMPLETED (terminal)           │
//! │                 │                                                       │
//! │                 └──────── cancel ─────► (deleted)                       │
//! │                                                                         │
//! │  receive, in ONE transaction:                                           │
//! │    for each line:                                                       │
//! │      • +quantity × conversion base units through the ledger (IN, PO)   │
//! │      • find-or-create the supplier binding, grow its partition         │
//! │    then status → COMPLETED, received_at stamped                        │
//! │                                                                         │
//! │  Receiving a COMPLETED order is a Conflict: re-running receive must    │
//! │  never double the stock.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unit names and conversion factors are frozen onto the lines at create
//! time, so a later catalog edit cannot change what a receive books.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{self, MovementInput};
use crate::repository::product::find_unit;
use crate::repository::supplier::{find_or_create_binding, shift_binding_stock};
use toko_core::barcode::po_display_number;
use toko_core::validation::validate_quantity;
use toko_core::{
    Money, MovementRef, MovementType, PoStatus, PurchaseOrder, PurchaseOrderItem,
};

// =============================================================================
// Input Types
// =============================================================================

/// A line for purchase order creation.
#[derive(Debug, Clone)]
pub struct NewPoItem {
    pub product_id: String,

    /// Must name a unit defined for the product; its conversion is
    /// frozen onto the line.
    pub unit_name: String,

    pub quantity: i64,
    pub unit_cost: Money,
}

/// Input for creating a purchase order.
#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub distributor_id: String,
    pub note: Option<String>,
    pub items: Vec<NewPoItem>,
}

/// A purchase order together with its lines.
#[derive(Debug, Clone)]
pub struct PurchaseOrderWithItems {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

/// A barcode to register for one of the order's lines while receiving.
/// Codes already registered anywhere are skipped; the receive itself
/// still succeeds.
#[derive(Debug, Clone)]
pub struct BarcodeAssignment {
    pub product_id: String,
    pub unit_name: String,
    pub barcode: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for purchase order operations.
#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    pool: SqlitePool,
}

impl PurchaseOrderRepository {
    /// Creates a new PurchaseOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseOrderRepository { pool }
    }

    /// Creates a PENDING purchase order.
    ///
    /// Every line's unit is resolved against the product's unit table
    /// and frozen; a line naming an undefined unit fails the whole
    /// create with nothing written.
    pub async fn create(&self, input: NewPurchaseOrder) -> DbResult<PurchaseOrderWithItems> {
        if input.items.is_empty() {
            return Err(DbError::conflict("purchase order needs at least one line"));
        }
        for item in &input.items {
            validate_quantity(item.quantity)?;
        }

        let mut tx = self.pool.begin().await?;

        let distributor_exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM distributors WHERE id = ?1")
                .bind(&input.distributor_id)
                .fetch_optional(&mut *tx)
                .await?;
        if distributor_exists.is_none() {
            return Err(DbError::not_found("Distributor", &input.distributor_id));
        }

        let id = Uuid::new_v4().to_string();
        let po_number = po_display_number(&id);
        let now = Utc::now();

        let mut total = Money::zero();
        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let unit = find_unit(&mut tx, &item.product_id, &item.unit_name).await?;
            let line_total = item.unit_cost * item.quantity;
            total += line_total;

            lines.push(PurchaseOrderItem {
                id: Uuid::new_v4().to_string(),
                purchase_order_id: id.clone(),
                product_id: item.product_id.clone(),
                unit_name: unit.name.clone(),
                conversion: unit.conversion,
                quantity: item.quantity,
                unit_cost: item.unit_cost,
                line_total,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (id, po_number, distributor_id, status, total, note,
                                         created_at, updated_at, received_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, NULL)
            "#,
        )
        .bind(&id)
        .bind(&po_number)
        .bind(&input.distributor_id)
        .bind(PoStatus::Pending)
        .bind(total)
        .bind(&input.note)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_items (id, purchase_order_id, product_id, unit_name,
                                                  conversion, quantity, unit_cost, line_total)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&line.id)
            .bind(&line.purchase_order_id)
            .bind(&line.product_id)
            .bind(&line.unit_name)
            .bind(line.conversion)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(po_id = %id, po_number = %po_number, total = %total, "Created purchase order");

        let order = self
            .get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("PurchaseOrder", id))?;
        Ok(order)
    }

    /// Gets a purchase order with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PurchaseOrderWithItems>> {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT id, po_number, distributor_id, status, total, note,
                   created_at, updated_at, received_at
            FROM purchase_orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(order) = order else {
            return Ok(None);
        };

        let items = self.items_of(&order.id).await?;
        Ok(Some(PurchaseOrderWithItems { order, items }))
    }

    /// Resolves a purchase order by its display number ("PO-3FA85F64",
    /// case-insensitive, bare suffix accepted).
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<PurchaseOrderWithItems>> {
        let trimmed = number.trim().to_uppercase();
        let normalized = if trimmed.starts_with("PO-") {
            trimmed
        } else {
            format!("PO-{}", trimmed)
        };

        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM purchase_orders WHERE po_number = ?1")
                .bind(&normalized)
                .fetch_optional(&self.pool)
                .await?;

        match id {
            Some(id) => self.get_by_id(&id).await,
            None => Ok(None),
        }
    }

    /// Lists purchase orders, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<PoStatus>) -> DbResult<Vec<PurchaseOrder>> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT id, po_number, distributor_id, status, total, note,
                   created_at, updated_at, received_at
            FROM purchase_orders
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Receives a PENDING purchase order: books every line into stock
    /// and the supplier binding, then completes the order. One
    /// transaction; a failure on any line leaves nothing changed.
    pub async fn receive(&self, id: &str) -> DbResult<PurchaseOrderWithItems> {
        self.receive_with_barcodes(id, &[]).await
    }

    /// [`receive`](Self::receive) plus supplier barcode registration:
    /// each assignment matching a line is registered against that
    /// line's unit and binding, unless the code is already in use.
    pub async fn receive_with_barcodes(
        &self,
        id: &str,
        barcode_assignments: &[BarcodeAssignment],
    ) -> DbResult<PurchaseOrderWithItems> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT id, po_number, distributor_id, status, total, note,
                   created_at, updated_at, received_at
            FROM purchase_orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("PurchaseOrder", id))?;

        if order.status != PoStatus::Pending {
            return Err(DbError::conflict(format!(
                "purchase order {} is {:?}, cannot receive",
                order.po_number, order.status
            )));
        }

        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            r#"
            SELECT id, purchase_order_id, product_id, unit_name, conversion,
                   quantity, unit_cost, line_total
            FROM purchase_order_items
            WHERE purchase_order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            let base_qty = item.base_quantity();

            ledger::apply_movement(
                &mut tx,
                MovementInput {
                    product_id: &item.product_id,
                    movement_type: MovementType::In,
                    base_delta: base_qty,
                    unit_name: &item.unit_name,
                    unit_qty: item.quantity,
                    note: Some(&format!("Received {}", order.po_number)),
                    reference: Some(MovementRef::PurchaseOrder(order.id.clone())),
                },
            )
            .await?;

            let binding_id =
                find_or_create_binding(&mut tx, &item.product_id, &order.distributor_id).await?;
            shift_binding_stock(&mut tx, &binding_id, base_qty).await?;

            for assignment in barcode_assignments
                .iter()
                .filter(|a| a.product_id == item.product_id && a.unit_name == item.unit_name)
            {
                let code = assignment.barcode.trim();

                let taken: Option<String> =
                    sqlx::query_scalar("SELECT id FROM barcodes WHERE barcode = ?1")
                        .bind(code)
                        .fetch_optional(&mut *tx)
                        .await?;
                if taken.is_some() {
                    warn!(barcode = %code, product_id = %item.product_id, "Barcode already registered, skipping");
                    continue;
                }

                let unit_id: Option<String> = sqlx::query_scalar(
                    "SELECT id FROM units WHERE product_id = ?1 AND name = ?2",
                )
                .bind(&item.product_id)
                .bind(&item.unit_name)
                .fetch_optional(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO barcodes (id, barcode, product_id, unit_id, binding_id, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(code)
                .bind(&item.product_id)
                .bind(&unit_id)
                .bind(&binding_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            }

            debug!(
                product_id = %item.product_id,
                base_qty,
                "Booked purchase order line"
            );
        }

        let now = Utc::now();
        // Status guard in the WHERE clause closes the race with a
        // concurrent receive of the same order
        let updated = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = ?1, received_at = ?2, updated_at = ?2
            WHERE id = ?3 AND status = ?4
            "#,
        )
        .bind(PoStatus::Completed)
        .bind(now)
        .bind(id)
        .bind(PoStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "purchase order {} was received concurrently",
                order.po_number
            )));
        }

        tx.commit().await?;

        info!(po_id = %id, po_number = %order.po_number, "Received purchase order");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("PurchaseOrder", id))
    }

    /// Cancels a PENDING purchase order by deleting it (lines cascade).
    /// A COMPLETED order is part of the ledger's history and stays.
    pub async fn cancel(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM purchase_orders WHERE id = ?1 AND status = ?2")
            .bind(id)
            .bind(PoStatus::Pending)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Distinguish "missing" from "already completed"
            let exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM purchase_orders WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;

            return match exists {
                Some(_) => Err(DbError::conflict(format!(
                    "purchase order {} is not PENDING and cannot be cancelled",
                    id
                ))),
                None => Err(DbError::not_found("PurchaseOrder", id)),
            };
        }

        info!(po_id = %id, "Cancelled purchase order");
        Ok(())
    }

    /// Lists the lines of a purchase order.
    pub async fn items_of(&self, po_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            r#"
            SELECT id, purchase_order_id, product_id, unit_name, conversion,
                   quantity, unit_cost, line_total
            FROM purchase_order_items
            WHERE purchase_order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(po_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
