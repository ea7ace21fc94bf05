//! # Sale Repository
//!
//! Sale processing against the stock ledger.
//!
//! ## Processing a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ONE TRANSACTION                                                        │
//! │                                                                         │
//! │  1. Validate the payment type against the customer                     │
//! │     (BON needs a registered, non-UMUM customer)                        │
//! │                                                                         │
//! │  2. Per line: resolve unit, price the line (caller override or the     │
//! │     unit table), apply line discounts, check stock in base units       │
//! │       stock 45, selling 3 Karton (conversion 20) → need 60             │
//! │       → InsufficientStock { available: 45, max_fulfillable: 2 }        │
//! │                                                                         │
//! │  3. Insert the sale with a fresh invoice number                        │
//! │     (INV-YYYYMMDD-NNNN, regenerated on a UNIQUE collision)             │
//! │                                                                         │
//! │  4. Per line: snapshot onto sale_items, OUT movement via the ledger    │
//! │                                                                         │
//! │  5. BON: customer.debt += total                                        │
//! │                                                                         │
//! │  Any failure rolls the whole thing back: no sale rows without          │
//! │  movements, no movements without a sale.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{self, MovementInput};
use crate::repository::product::find_unit;
use toko_core::barcode::format_invoice_number;
use toko_core::validation::validate_quantity;
use toko_core::{
    Money, MovementRef, MovementType, Sale, SaleItem, SaleType, INVOICE_GENERATION_ATTEMPTS,
};

// =============================================================================
// Input Types
// =============================================================================

/// A line for sale processing. Money fields are accepted from the
/// caller and derived when absent; whatever applies is snapshotted
/// onto the sale item.
#[derive(Debug, Clone)]
pub struct NewSaleItem {
    pub product_id: String,
    pub unit_name: String,
    pub quantity: i64,

    /// Price per unit. The unit table price applies when absent.
    pub unit_price: Option<Money>,

    /// Discount off this line. Zero when absent, never more than the
    /// undiscounted line amount.
    pub discount: Option<Money>,
}

/// Input for processing a sale.
#[derive(Debug, Clone)]
pub struct NewSale {
    /// None for anonymous walk-in sales (LUNAS only).
    pub customer_id: Option<String>,
    pub sale_type: SaleType,

    /// Order-level discount off the subtotal. Zero when absent.
    pub discount: Option<Money>,

    /// Amount tendered. Must cover the total for LUNAS.
    pub paid: Money,

    pub note: Option<String>,
    pub items: Vec<NewSaleItem>,
}

/// A sale together with its lines.
#[derive(Debug, Clone)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Processes a sale in one transaction.
    pub async fn process(&self, input: NewSale) -> DbResult<SaleWithItems> {
        if input.items.is_empty() {
            return Err(DbError::conflict("sale needs at least one line"));
        }
        for item in &input.items {
            validate_quantity(item.quantity)?;
        }

        let mut tx = self.pool.begin().await?;

        // BON needs an account to book the receivable onto
        let customer = match &input.customer_id {
            Some(id) => Some(
                sqlx::query_as::<_, toko_core::Customer>(
                    r#"
                    SELECT id, name, customer_type, phone, address, debt, created_at, updated_at
                    FROM customers
                    WHERE id = ?1
                    "#,
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Customer", id))?,
            ),
            None => None,
        };

        if input.sale_type == SaleType::Bon {
            match &customer {
                None => {
                    return Err(DbError::conflict(
                        "credit sale requires a registered customer",
                    ))
                }
                Some(c) if !c.customer_type.can_take_credit() => {
                    return Err(toko_core::CoreError::CreditNotAllowed {
                        customer_id: c.id.clone(),
                    }
                    .into())
                }
                Some(_) => {}
            }
        }

        // Price and stock-check every line before writing anything
        let sale_id = Uuid::new_v4().to_string();
        let mut subtotal = Money::zero();
        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let unit = find_unit(&mut tx, &item.product_id, &item.unit_name).await?;

            let (sku, name, stock): (String, String, i64) =
                sqlx::query_as("SELECT sku, name, stock FROM products WHERE id = ?1")
                    .bind(&item.product_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", &item.product_id))?;

            let base_qty = unit.to_base(item.quantity);
            if base_qty > stock {
                return Err(DbError::InsufficientStock {
                    sku,
                    available: stock,
                    max_fulfillable: unit.max_fulfillable(stock),
                });
            }

            let unit_price = item.unit_price.unwrap_or(unit.price);
            let discount = item.discount.unwrap_or_else(Money::zero);
            let gross = unit_price * item.quantity;
            if discount < Money::zero() || discount > gross {
                return Err(DbError::conflict(format!(
                    "line discount {} exceeds line amount {}",
                    discount, gross
                )));
            }
            let line_total = gross - discount;
            subtotal += line_total;

            lines.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: item.product_id.clone(),
                name_snapshot: name,
                unit_name: unit.name.clone(),
                conversion: unit.conversion,
                quantity: item.quantity,
                unit_price,
                discount,
                line_total,
            });
        }

        let discount = input.discount.unwrap_or_else(Money::zero);
        if discount < Money::zero() || discount > subtotal {
            return Err(DbError::conflict(format!(
                "order discount {} exceeds subtotal {}",
                discount, subtotal
            )));
        }
        let total = subtotal - discount;

        let change = match input.sale_type {
            SaleType::Lunas => {
                if input.paid < total {
                    return Err(DbError::conflict(format!(
                        "payment {} does not cover total {}",
                        input.paid, total
                    )));
                }
                input.paid - total
            }
            // BON books the total as debt; no change is due
            SaleType::Bon => Money::zero(),
        };

        let now = Utc::now();

        // Insert with a fresh invoice number, regenerating on collision.
        // SQLite aborts only the statement, not the transaction, so the
        // retry can stay inside the same tx.
        let mut inserted = false;
        for attempt in 0..INVOICE_GENERATION_ATTEMPTS {
            let sequence = (now.timestamp_millis() % 10_000) as u32 + attempt;
            let invoice_number = format_invoice_number(now, sequence);

            let result = sqlx::query(
                r#"
                INSERT INTO sales (id, invoice_number, customer_id, sale_type, subtotal,
                                   discount, total, paid, change_amount, note, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&sale_id)
            .bind(&invoice_number)
            .bind(&input.customer_id)
            .bind(input.sale_type)
            .bind(subtotal)
            .bind(discount)
            .bind(total)
            .bind(input.paid)
            .bind(change)
            .bind(&input.note)
            .bind(now)
            .execute(&mut *tx)
            .await;

            match result.map_err(DbError::from) {
                Ok(_) => {
                    inserted = true;
                    break;
                }
                Err(e) if e.is_unique_violation() => {
                    debug!(attempt, invoice_number = %invoice_number, "Invoice number collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        if !inserted {
            return Err(DbError::GenerationExhausted {
                what: "invoice number",
                attempts: INVOICE_GENERATION_ATTEMPTS,
            });
        }

        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO sale_items (id, sale_id, product_id, name_snapshot, unit_name,
                                        conversion, quantity, unit_price, discount, line_total)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&line.id)
            .bind(&line.sale_id)
            .bind(&line.product_id)
            .bind(&line.name_snapshot)
            .bind(&line.unit_name)
            .bind(line.conversion)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.discount)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;

            ledger::apply_movement(
                &mut tx,
                MovementInput {
                    product_id: &line.product_id,
                    movement_type: MovementType::Out,
                    base_delta: -line.base_quantity(),
                    unit_name: &line.unit_name,
                    unit_qty: line.quantity,
                    note: None,
                    reference: Some(MovementRef::Sale(sale_id.clone())),
                },
            )
            .await?;
        }

        if input.sale_type == SaleType::Bon {
            // Customer presence was established above
            let customer_id = input.customer_id.as_deref().unwrap_or_default();
            sqlx::query("UPDATE customers SET debt = debt + ?1, updated_at = ?2 WHERE id = ?3")
                .bind(total)
                .bind(now)
                .bind(customer_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(sale_id = %sale_id, total = %total, sale_type = ?input.sale_type, "Processed sale");
        self.get_by_id(&sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))
    }

    /// Gets a sale with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleWithItems>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, invoice_number, customer_id, sale_type, subtotal, discount,
                   total, paid, change_amount, note, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(sale) = sale else {
            return Ok(None);
        };

        let items = self.items_of(&sale.id).await?;
        Ok(Some(SaleWithItems { sale, items }))
    }

    /// Gets a sale by its invoice number.
    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<SaleWithItems>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM sales WHERE invoice_number = ?1")
                .bind(invoice_number.trim())
                .fetch_optional(&self.pool)
                .await?;

        match id {
            Some(id) => self.get_by_id(&id).await,
            None => Ok(None),
        }
    }

    /// Lists recent sales, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, invoice_number, customer_id, sale_type, subtotal, discount,
                   total, paid, change_amount, note, created_at
            FROM sales
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists the lines of a sale.
    pub async fn items_of(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, name_snapshot, unit_name, conversion,
                   quantity, unit_price, discount, line_total
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
