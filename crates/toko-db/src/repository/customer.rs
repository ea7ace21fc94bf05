//! # Customer Repository
//!
//! Customer accounts and debt bookkeeping.
//!
//! ## Debt Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BON sale            →  debt += sale total                             │
//! │  Approved return     →  debt = max(0, debt - return total)             │
//! │  Payment             →  debt = max(0, debt - amount)                   │
//! │                                                                         │
//! │  Debt is never negative: the store does not model store credit.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toko_core::validation::{validate_name, validate_payment_amount};
use toko_core::{Customer, CustomerType, Money};

/// Input for creating or updating a customer.
#[derive(Debug, Clone)]
pub struct CustomerInput {
    pub name: String,
    pub customer_type: CustomerType,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Repository for customer operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a customer. Names are unique case-insensitively.
    pub async fn create(&self, input: CustomerInput) -> DbResult<Customer> {
        validate_name(&input.name)?;

        // The name column collates NOCASE, so this comparison is
        // case-insensitive. The UNIQUE constraint backstops races.
        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM customers WHERE name = ?1")
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
            INSERT INTO customers (id, name, customer_type, phone, address, debt, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(input.customer_type)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(customer_id = %id, "Created customer");
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Gets a customer by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, customer_type, phone, address, debt, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Lists customers sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, customer_type, phone, address, debt, created_at, updated_at
            FROM customers
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Lists customers carrying outstanding debt, largest first.
    pub async fn list_debtors(&self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, customer_type, phone, address, debt, created_at, updated_at
            FROM customers
            WHERE debt > 0
            ORDER BY debt DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Updates a customer's master data. The new name must not collide
    /// with another customer's.
    pub async fn update(&self, id: &str, input: CustomerInput) -> DbResult<Customer> {
        validate_name(&input.name)?;

        let taken: Option<String> =
            sqlx::query_scalar("SELECT id FROM customers WHERE name = ?1 AND id != ?2")
                .bind(input.name.trim())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        if taken.is_some() {
            return Err(DbError::duplicate("name", input.name.trim()));
        }

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = ?1, customer_type = ?2, phone = ?3, address = ?4, updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(input.name.trim())
        .bind(input.customer_type)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Deletes a customer. Refused while the customer owes money or
    /// has sales on record.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let customer = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        if customer.debt.is_positive() {
            return Err(DbError::conflict(format!(
                "customer {} still owes {}",
                id, customer.debt
            )));
        }

        let sale_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE customer_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if sale_count > 0 {
            return Err(DbError::conflict(format!(
                "customer {} has {} sales on record and cannot be deleted",
                id, sale_count
            )));
        }

        sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(customer_id = %id, "Deleted customer");
        Ok(())
    }

    /// Records a debt payment. The applied amount is capped at the
    /// outstanding debt; overpayment settles the debt to exactly zero.
    ///
    /// Returns the customer after the payment.
    pub async fn pay_debt(&self, id: &str, amount: Money) -> DbResult<Customer> {
        validate_payment_amount(amount.amount())?;

        let mut tx = self.pool.begin().await?;

        let current: Money = sqlx::query_scalar("SELECT debt FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        let remaining = current.saturating_sub_floor(amount);

        sqlx::query("UPDATE customers SET debt = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(remaining)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            customer_id = %id,
            paid = %amount,
            remaining = %remaining,
            "Recorded customer debt payment"
        );

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }
}
