//! # Warehouse Repository
//!
//! Warehouses, their per-warehouse stock partitions, and transfers.
//!
//! ## Transfer
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ONE TRANSACTION                                                        │
//! │                                                                         │
//! │   source warehouse          destination warehouse                       │
//! │   ┌───────────────┐         ┌───────────────┐                          │
//! │   │ stock: 50     │  -base  │ stock: 10     │  +base                   │
//! │   │      → 30     │ ──────► │      → 30     │                          │
//! │   └───────────────┘         └───────────────┘                          │
//! │     TRANSFER_OUT row          TRANSFER_IN row                           │
//! │                                                                         │
//! │  products.stock never moves: the total is conserved by pairing the     │
//! │  two per-warehouse movements inside one transaction.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting a warehouse that still holds stock deactivates it instead.
//! A deactivated warehouse is hidden from listings and refuses inbound
//! transfers, but can still be drained.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{self, MovementInput};
use crate::repository::product::find_unit;
use toko_core::validation::{validate_name, validate_quantity};
use toko_core::{MovementRef, MovementType, StockItem, StockMovement, Warehouse};

/// Input for creating or updating a warehouse.
#[derive(Debug, Clone)]
pub struct WarehouseInput {
    pub name: String,
    pub location: Option<String>,
}

/// How a delete request was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarehouseDeletion {
    /// The warehouse was empty and its row is gone.
    Removed,

    /// The warehouse still held stock and was deactivated instead.
    Deactivated,
}

/// The outcome of a transfer: the paired out and in movements.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub out_movement: StockMovement,
    pub in_movement: StockMovement,
}

/// Repository for warehouse operations.
#[derive(Debug, Clone)]
pub struct WarehouseRepository {
    pool: SqlitePool,
}

impl WarehouseRepository {
    /// Creates a new WarehouseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WarehouseRepository { pool }
    }

    /// Creates a warehouse. Names are unique.
    pub async fn create(&self, input: WarehouseInput) -> DbResult<Warehouse> {
        validate_name(&input.name)?;

        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO warehouses (id, name, location, is_default, is_active, created_at)
            VALUES (?1, ?2, ?3, 0, 1, ?4)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(&input.location)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(warehouse_id = %id, name = %input.name.trim(), "Created warehouse");
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Warehouse", id))
    }

    /// Gets a warehouse by id, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            r#"
            SELECT id, name, location, is_default, is_active, created_at
            FROM warehouses
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(warehouse)
    }

    /// Lists active warehouses by name.
    pub async fn list(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            r#"
            SELECT id, name, location, is_default, is_active, created_at
            FROM warehouses
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(warehouses)
    }

    /// Renames or relocates a warehouse.
    pub async fn update(&self, id: &str, input: WarehouseInput) -> DbResult<Warehouse> {
        validate_name(&input.name)?;

        let result = sqlx::query("UPDATE warehouses SET name = ?1, location = ?2 WHERE id = ?3")
            .bind(input.name.trim())
            .bind(&input.location)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Warehouse", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Warehouse", id))
    }

    /// Marks one active warehouse as the default, clearing the flag on
    /// the others. One transaction.
    pub async fn set_default(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let is_active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM warehouses WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        match is_active {
            None => return Err(DbError::not_found("Warehouse", id)),
            Some(false) => {
                return Err(DbError::conflict(format!(
                    "warehouse {} is deactivated and cannot be the default",
                    id
                )))
            }
            Some(true) => {}
        }

        sqlx::query("UPDATE warehouses SET is_default = 0")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE warehouses SET is_default = 1 WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a warehouse. An empty warehouse is removed outright; one
    /// that still holds stock is deactivated and keeps its partitions
    /// until they are transferred out.
    pub async fn delete(&self, id: &str) -> DbResult<WarehouseDeletion> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM warehouses WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Warehouse", id));
        }

        let held: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(stock), 0) FROM stock_items WHERE warehouse_id = ?1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let outcome = if held > 0 {
            sqlx::query("UPDATE warehouses SET is_active = 0, is_default = 0 WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            WarehouseDeletion::Deactivated
        } else {
            sqlx::query("DELETE FROM stock_items WHERE warehouse_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM warehouses WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            WarehouseDeletion::Removed
        };

        tx.commit().await?;

        info!(warehouse_id = %id, outcome = ?outcome, "Deleted warehouse");
        Ok(outcome)
    }

    /// Lists the stock partitions held in one warehouse.
    pub async fn stock_in_warehouse(&self, warehouse_id: &str) -> DbResult<Vec<StockItem>> {
        let items = sqlx::query_as::<_, StockItem>(
            r#"
            SELECT id, warehouse_id, product_id, stock, updated_at
            FROM stock_items
            WHERE warehouse_id = ?1
            ORDER BY product_id
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists where a product is held, across all warehouses.
    pub async fn stock_of_product(&self, product_id: &str) -> DbResult<Vec<StockItem>> {
        let items = sqlx::query_as::<_, StockItem>(
            r#"
            SELECT id, warehouse_id, product_id, stock, updated_at
            FROM stock_items
            WHERE product_id = ?1
            ORDER BY warehouse_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Assigns existing product stock to a warehouse partition, booking
    /// an IN movement tagged with the warehouse. The product total is
    /// untouched; the sum of a product's partitions can never exceed it.
    pub async fn place_stock(
        &self,
        warehouse_id: &str,
        product_id: &str,
        unit_name: &str,
        quantity: i64,
        note: Option<&str>,
    ) -> DbResult<StockMovement> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        self.require_active(&mut tx, warehouse_id).await?;
        let unit = find_unit(&mut tx, product_id, unit_name).await?;
        let base_qty = unit.to_base(quantity);

        let total: i64 = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))?;
        let placed: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(stock), 0) FROM stock_items WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        if placed + base_qty > total {
            return Err(DbError::conflict(format!(
                "placing {} base units would over-allocate product {} ({} of {} already placed)",
                base_qty, product_id, placed, total
            )));
        }

        let movement = ledger::apply_warehouse_movement(
            &mut tx,
            warehouse_id,
            MovementInput {
                product_id,
                movement_type: MovementType::In,
                base_delta: base_qty,
                unit_name: &unit.name,
                unit_qty: quantity,
                note: Some(note.unwrap_or("Stock placed in warehouse")),
                reference: None,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(movement)
    }

    /// Moves stock between two warehouses in one transaction.
    ///
    /// The source must already hold enough; the destination partition
    /// is created on first use. Both movements land in the history as
    /// TRANSFER_OUT and TRANSFER_IN with per-warehouse before/after
    /// figures. The product total does not change.
    pub async fn transfer(
        &self,
        product_id: &str,
        from_warehouse_id: &str,
        to_warehouse_id: &str,
        unit_name: &str,
        quantity: i64,
        note: Option<&str>,
    ) -> DbResult<TransferOutcome> {
        validate_quantity(quantity)?;
        if from_warehouse_id == to_warehouse_id {
            return Err(DbError::conflict(
                "source and destination warehouse are the same",
            ));
        }

        let mut tx = self.pool.begin().await?;

        // The source may be deactivated (draining is how it empties out)
        // but the destination must be live
        let source: Option<String> = sqlx::query_scalar("SELECT id FROM warehouses WHERE id = ?1")
            .bind(from_warehouse_id)
            .fetch_optional(&mut *tx)
            .await?;
        if source.is_none() {
            return Err(DbError::not_found("Warehouse", from_warehouse_id));
        }
        self.require_active(&mut tx, to_warehouse_id).await?;

        let unit = find_unit(&mut tx, product_id, unit_name).await?;
        let base_qty = unit.to_base(quantity);

        let out_movement = ledger::apply_warehouse_movement(
            &mut tx,
            from_warehouse_id,
            MovementInput {
                product_id,
                movement_type: MovementType::TransferOut,
                base_delta: -base_qty,
                unit_name: &unit.name,
                unit_qty: quantity,
                note,
                reference: Some(MovementRef::Transfer),
            },
        )
        .await?;

        let in_movement = ledger::apply_warehouse_movement(
            &mut tx,
            to_warehouse_id,
            MovementInput {
                product_id,
                movement_type: MovementType::TransferIn,
                base_delta: base_qty,
                unit_name: &unit.name,
                unit_qty: quantity,
                note,
                reference: Some(MovementRef::Transfer),
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            from = %from_warehouse_id,
            to = %to_warehouse_id,
            base_qty,
            "Transferred stock between warehouses"
        );

        Ok(TransferOutcome {
            out_movement,
            in_movement,
        })
    }

    async fn require_active(
        &self,
        tx: &mut sqlx::SqliteConnection,
        warehouse_id: &str,
    ) -> DbResult<()> {
        let is_active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM warehouses WHERE id = ?1")
                .bind(warehouse_id)
                .fetch_optional(&mut *tx)
                .await?;

        match is_active {
            None => Err(DbError::not_found("Warehouse", warehouse_id)),
            Some(false) => Err(DbError::conflict(format!(
                "warehouse {} is deactivated",
                warehouse_id
            ))),
            Some(true) => Ok(()),
        }
    }
}
