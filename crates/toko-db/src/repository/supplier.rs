//! # Supplier Repository
//!
//! Distributors and product-distributor supply bindings.
//!
//! ## Supplier Bindings
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products ◄──── supplier_bindings ────► distributors                   │
//! │                                                                         │
//! │  One row per (product, distributor) pair, holding the portion of       │
//! │  the product total received from that supplier. Purchase orders        │
//! │  find-or-create the binding on receive; purchase returns draw the      │
//! │  goods back out of it.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Distributor `debt` is what the supplier owes the store: purchase
//! returns increase it, settlements from the supplier decrease it, and
//! it never goes below zero.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toko_core::validation::{validate_name, validate_payment_amount};
use toko_core::{Distributor, Money, SupplierBinding};

/// Input for creating or updating a distributor.
#[derive(Debug, Clone)]
pub struct DistributorInput {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Repository for distributor and supplier-binding operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    /// Creates a new SupplierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    // =========================================================================
    // Distributor CRUD
    // =========================================================================

    /// Creates a distributor. Names are unique case-insensitively.
    pub async fn create(&self, input: DistributorInput) -> DbResult<Distributor> {
        validate_name(&input.name)?;

        // The name column collates NOCASE, so this comparison is
        // case-insensitive. The UNIQUE constraint backstops races.
        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM distributors WHERE name = ?1")
                .bind(input.name.trim())
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(DbError::duplicate("name", input.name.trim()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO distributors (id, name, phone, address, debt, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(&input.address)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(distributor_id = %id, "Created distributor");
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Distributor", id))
    }

    /// Gets a distributor by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Distributor>> {
        let distributor = sqlx::query_as::<_, Distributor>(
            r#"
            SELECT id, name, phone, address, debt, created_at, updated_at
            FROM distributors
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(distributor)
    }

    /// Lists distributors sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Distributor>> {
        let distributors = sqlx::query_as::<_, Distributor>(
            r#"
            SELECT id, name, phone, address, debt, created_at, updated_at
            FROM distributors
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(distributors)
    }

    /// Updates a distributor's contact details. The new name must not
    /// collide with another distributor's.
    pub async fn update(&self, id: &str, input: DistributorInput) -> DbResult<Distributor> {
        validate_name(&input.name)?;

        let taken: Option<String> =
            sqlx::query_scalar("SELECT id FROM distributors WHERE name = ?1 AND id != ?2")
                .bind(input.name.trim())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        if taken.is_some() {
            return Err(DbError::duplicate("name", input.name.trim()));
        }

        let result = sqlx::query(
            r#"
            UPDATE distributors
            SET name = ?1, phone = ?2, address = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(&input.address)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Distributor", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Distributor", id))
    }

    /// Deletes a distributor. Refused while purchase orders reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let po_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM purchase_orders WHERE distributor_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if po_count > 0 {
            return Err(DbError::conflict(format!(
                "distributor {} has {} purchase orders and cannot be deleted",
                id, po_count
            )));
        }

        let result = sqlx::query("DELETE FROM distributors WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Distributor", id));
        }

        info!(distributor_id = %id, "Deleted distributor");
        Ok(())
    }

    // =========================================================================
    // Debt
    // =========================================================================

    /// Records a settlement from the distributor. The applied amount is
    /// capped at the outstanding debt; paying more than owed settles the
    /// debt to exactly zero.
    ///
    /// Returns the distributor after the payment.
    pub async fn settle_debt(&self, id: &str, amount: Money) -> DbResult<Distributor> {
        validate_payment_amount(amount.amount())?;

        let mut tx = self.pool.begin().await?;

        let current: Money = sqlx::query_scalar("SELECT debt FROM distributors WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Distributor", id))?;

        let remaining = current.saturating_sub_floor(amount);

        sqlx::query("UPDATE distributors SET debt = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(remaining)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            distributor_id = %id,
            paid = %amount,
            remaining = %remaining,
            "Settled distributor debt"
        );

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Distributor", id))
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    /// Lists a product's supplier bindings.
    pub async fn bindings_for_product(&self, product_id: &str) -> DbResult<Vec<SupplierBinding>> {
        let bindings = sqlx::query_as::<_, SupplierBinding>(
            r#"
            SELECT id, product_id, distributor_id, stock, is_default, created_at
            FROM supplier_bindings
            WHERE product_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bindings)
    }

    /// Marks one binding as the product's default supplier, clearing
    /// the flag on its siblings. One transaction.
    pub async fn set_default_binding(&self, binding_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let product_id: String =
            sqlx::query_scalar("SELECT product_id FROM supplier_bindings WHERE id = ?1")
                .bind(binding_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("SupplierBinding", binding_id))?;

        sqlx::query("UPDATE supplier_bindings SET is_default = 0 WHERE product_id = ?1")
            .bind(&product_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE supplier_bindings SET is_default = 1 WHERE id = ?1")
            .bind(binding_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Finds or creates the binding for a (product, distributor) pair
/// inside the caller's transaction, returning its id.
pub(crate) async fn find_or_create_binding(
    tx: &mut SqliteConnection,
    product_id: &str,
    distributor_id: &str,
) -> DbResult<String> {
    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM supplier_bindings WHERE product_id = ?1 AND distributor_id = ?2",
    )
    .bind(product_id)
    .bind(distributor_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO supplier_bindings (id, product_id, distributor_id, stock, is_default, created_at)
        VALUES (?1, ?2, ?3, 0, 0, ?4)
        "#,
    )
    .bind(&id)
    .bind(product_id)
    .bind(distributor_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    debug!(
        binding_id = %id,
        product_id = %product_id,
        distributor_id = %distributor_id,
        "Created supplier binding"
    );
    Ok(id)
}

/// Moves the binding's stock partition by a signed delta inside the
/// caller's transaction. Clamped at zero on the way down: goods can be
/// returned against a supplier even when earlier sales already consumed
/// the partition bookkeeping.
pub(crate) async fn shift_binding_stock(
    tx: &mut SqliteConnection,
    binding_id: &str,
    delta: i64,
) -> DbResult<()> {
    let current: i64 = sqlx::query_scalar("SELECT stock FROM supplier_bindings WHERE id = ?1")
        .bind(binding_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("SupplierBinding", binding_id))?;

    let updated = (current + delta).max(0);

    sqlx::query("UPDATE supplier_bindings SET stock = ?1 WHERE id = ?2")
        .bind(updated)
        .bind(binding_id)
        .execute(&mut *tx)
        .await?;

    Ok(())
}
