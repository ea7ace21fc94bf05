//! # Returns Repository
//!
//! Sales returns (approval-gated) and purchase returns (immediate).
//!
//! ## Sales Return Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  file(actor)                                                            │
//! │      │                                                                  │
//! │      ├── Admin / Manager ───────────────► APPROVED, effects applied    │
//! │      │                                                                  │
//! │      ├── Cashier, no password ──────────► PENDING, no effects          │
//! │      │        │                                                         │
//! │      │        ├── approve(manager) ─────► APPROVED, effects applied    │
//! │      │        └── reject(manager)  ─────► REJECTED, quantities freed   │
//! │      │                                                                  │
//! │      └── Cashier + password                                             │
//! │               ├── matches an active admin/manager ► APPROVED           │
//! │               └── matches nobody ──────────────────► Unauthorized      │
//! │                                                                         │
//! │  Effects (one transaction with the status change):                      │
//! │    • RETURN_SALE movement per line, stock restored                     │
//! │    • customer.debt = max(0, debt - return total)                       │
//! │                                                                         │
//! │  Cap per (product, unit): originally sold quantity minus quantities    │
//! │  on prior PENDING or APPROVED returns. REJECTED frees its share.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Purchase returns skip the approval machine: goods leave stock and the
//! distributor's debt to the store grows in the same transaction. The
//! cap is the received quantity on the COMPLETED purchase order minus
//! prior purchase returns against it.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{self, MovementInput};
use crate::repository::supplier::{find_or_create_binding, shift_binding_stock};
use toko_core::barcode::{format_purchase_return_number, format_sales_return_number};
use toko_core::validation::validate_quantity;
use toko_core::{
    CoreError, CredentialVerifier, Money, MovementRef, MovementType, PoStatus, PurchaseOrderItem,
    PurchaseReturn, PurchaseReturnItem, ReturnActor, ReturnStatus, SaleItem, SalesReturn,
    SalesReturnItem, User, INVOICE_GENERATION_ATTEMPTS,
};

// =============================================================================
// Input Types
// =============================================================================

/// A line for either kind of return.
#[derive(Debug, Clone)]
pub struct NewReturnItem {
    pub product_id: String,
    pub unit_name: String,
    pub quantity: i64,
}

/// Input for filing a sales return.
#[derive(Debug, Clone)]
pub struct NewSalesReturn {
    pub sale_id: String,
    pub reason: Option<String>,
    pub items: Vec<NewReturnItem>,
}

/// Input for filing a purchase return.
#[derive(Debug, Clone)]
pub struct NewPurchaseReturn {
    /// Purchase order id or display number ("PO-3FA85F64").
    pub purchase_order: String,
    pub reason: Option<String>,
    pub created_by: String,
    pub items: Vec<NewReturnItem>,
}

/// A sales return together with its lines.
#[derive(Debug, Clone)]
pub struct SalesReturnWithItems {
    pub retur: SalesReturn,
    pub items: Vec<SalesReturnItem>,
}

/// A purchase return together with its lines.
#[derive(Debug, Clone)]
pub struct PurchaseReturnWithItems {
    pub retur: PurchaseReturn,
    pub items: Vec<PurchaseReturnItem>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sales and purchase returns.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    // =========================================================================
    // Sales Returns
    // =========================================================================

    /// Files a sales return. Depending on the actor it lands as
    /// PENDING (no effects yet) or APPROVED (stock restored and debt
    /// reduced in the same transaction).
    pub async fn file_sales_return(
        &self,
        input: NewSalesReturn,
        actor: ReturnActor,
        verifier: &dyn CredentialVerifier,
    ) -> DbResult<SalesReturnWithItems> {
        if input.items.is_empty() {
            return Err(DbError::conflict("return needs at least one line"));
        }
        for item in &input.items {
            validate_quantity(item.quantity)?;
        }

        let mut tx = self.pool.begin().await?;

        let (sale_customer_id,): (Option<String>,) =
            sqlx::query_as("SELECT customer_id FROM sales WHERE id = ?1")
                .bind(&input.sale_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Sale", &input.sale_id))?;

        let sale_items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, name_snapshot, unit_name, conversion,
                   quantity, unit_price, discount, line_total
            FROM sale_items
            WHERE sale_id = ?1
            "#,
        )
        .bind(&input.sale_id)
        .fetch_all(&mut *tx)
        .await?;

        // Build lines against the original sale, enforcing the cap
        let return_id = Uuid::new_v4().to_string();
        let mut total = Money::zero();
        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            // A sale may carry several lines for the same (product, unit);
            // the cap covers their combined quantity
            let matching: Vec<&SaleItem> = sale_items
                .iter()
                .filter(|s| s.product_id == item.product_id && s.unit_name == item.unit_name)
                .collect();
            let sold = *matching.first().ok_or_else(|| {
                DbError::conflict(format!(
                    "sale {} has no line for product {} in unit {}",
                    input.sale_id, item.product_id, item.unit_name
                ))
            })?;
            let sold_quantity: i64 = matching.iter().map(|s| s.quantity).sum();

            let already_claimed: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(i.quantity), 0)
                FROM sales_return_items i
                JOIN sales_returns r ON r.id = i.sales_return_id
                WHERE r.sale_id = ?1 AND r.status != 'REJECTED'
                  AND i.product_id = ?2 AND i.unit_name = ?3
                "#,
            )
            .bind(&input.sale_id)
            .bind(&item.product_id)
            .bind(&item.unit_name)
            .fetch_one(&mut *tx)
            .await?;

            let remaining = sold_quantity - already_claimed;
            if item.quantity > remaining {
                return Err(CoreError::ReturnCapExceeded {
                    product_id: item.product_id.clone(),
                    requested: item.quantity,
                    remaining: remaining.max(0),
                }
                .into());
            }

            let line_total = sold.unit_price * item.quantity;
            total += line_total;

            lines.push(SalesReturnItem {
                id: Uuid::new_v4().to_string(),
                sales_return_id: return_id.clone(),
                product_id: item.product_id.clone(),
                unit_name: sold.unit_name.clone(),
                conversion: sold.conversion,
                quantity: item.quantity,
                unit_price: sold.unit_price,
                line_total,
            });
        }

        // Decide the landing status from the actor's authority
        let (status, resolved_by) = match &actor {
            ReturnActor::Admin { user_id } | ReturnActor::Manager { user_id } => {
                require_active_approver(&mut tx, user_id).await?;
                (ReturnStatus::Approved, Some(user_id.clone()))
            }
            ReturnActor::Cashier {
                admin_password: None,
                ..
            } => (ReturnStatus::Pending, None),
            ReturnActor::Cashier {
                admin_password: Some(password),
                ..
            } => {
                let approvers = sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, name, role, password_hash, is_active, created_at
                    FROM users
                    WHERE is_active = 1 AND role IN ('ADMIN', 'MANAGER')
                    "#,
                )
                .fetch_all(&mut *tx)
                .await?;

                let matched = approvers
                    .iter()
                    .find(|u| verifier.verify(password, &u.password_hash));

                match matched {
                    Some(approver) => (ReturnStatus::Approved, Some(approver.id.clone())),
                    None => {
                        return Err(DbError::unauthorized(
                            "password does not match any active admin or manager",
                        ))
                    }
                }
            }
        };

        let now = Utc::now();
        let resolved_at = resolved_by.as_ref().map(|_| now);

        // Insert with a fresh return number, regenerating on collision
        let mut inserted = false;
        for attempt in 0..INVOICE_GENERATION_ATTEMPTS {
            let sequence = (now.timestamp_millis() % 10_000) as u32 + attempt;
            let return_number = format_sales_return_number(now, sequence);

            let result = sqlx::query(
                r#"
                INSERT INTO sales_returns (id, return_number, sale_id, customer_id, status,
                                           total, reason, created_by, resolved_by, resolved_at,
                                           created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&return_id)
            .bind(&return_number)
            .bind(&input.sale_id)
            .bind(&sale_customer_id)
            .bind(status)
            .bind(total)
            .bind(&input.reason)
            .bind(actor.user_id())
            .bind(&resolved_by)
            .bind(resolved_at)
            .bind(now)
            .execute(&mut *tx)
            .await;

            match result.map_err(DbError::from) {
                Ok(_) => {
                    inserted = true;
                    break;
                }
                Err(e) if e.is_unique_violation() => {
                    debug!(attempt, "Return number collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        if !inserted {
            return Err(DbError::GenerationExhausted {
                what: "return number",
                attempts: INVOICE_GENERATION_ATTEMPTS,
            });
        }

        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO sales_return_items (id, sales_return_id, product_id, unit_name,
                                                conversion, quantity, unit_price, line_total)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&line.id)
            .bind(&line.sales_return_id)
            .bind(&line.product_id)
            .bind(&line.unit_name)
            .bind(line.conversion)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        if status == ReturnStatus::Approved {
            apply_sales_return_effects(&mut tx, &return_id, &lines, total, &sale_customer_id)
                .await?;
        }

        tx.commit().await?;

        info!(
            return_id = %return_id,
            status = ?status,
            total = %total,
            "Filed sales return"
        );
        self.get_sales_return(&return_id)
            .await?
            .ok_or_else(|| DbError::not_found("SalesReturn", return_id))
    }

    /// Approves a PENDING sales return, applying its stock and debt
    /// effects in the same transaction as the status change.
    pub async fn approve_sales_return(
        &self,
        return_id: &str,
        approver_id: &str,
    ) -> DbResult<SalesReturnWithItems> {
        let mut tx = self.pool.begin().await?;

        require_active_approver(&mut tx, approver_id).await?;

        let retur = fetch_sales_return(&mut tx, return_id).await?;
        if retur.status != ReturnStatus::Pending {
            return Err(DbError::conflict(format!(
                "sales return {} is {:?}, only PENDING returns can be approved",
                retur.return_number, retur.status
            )));
        }

        let lines = sqlx::query_as::<_, SalesReturnItem>(
            r#"
            SELECT id, sales_return_id, product_id, unit_name, conversion,
                   quantity, unit_price, line_total
            FROM sales_return_items
            WHERE sales_return_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(return_id)
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        let updated = sqlx::query(
            r#"
            UPDATE sales_returns
            SET status = ?1, resolved_by = ?2, resolved_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(ReturnStatus::Approved)
        .bind(approver_id)
        .bind(now)
        .bind(return_id)
        .bind(ReturnStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "sales return {} was resolved concurrently",
                retur.return_number
            )));
        }

        apply_sales_return_effects(&mut tx, return_id, &lines, retur.total, &retur.customer_id)
            .await?;

        tx.commit().await?;

        info!(return_id = %return_id, approver_id = %approver_id, "Approved sales return");
        self.get_sales_return(return_id)
            .await?
            .ok_or_else(|| DbError::not_found("SalesReturn", return_id))
    }

    /// Rejects a PENDING sales return, recording why. Its quantities no
    /// longer count against the sale's return cap.
    pub async fn reject_sales_return(
        &self,
        return_id: &str,
        approver_id: &str,
        reason: Option<&str>,
    ) -> DbResult<SalesReturnWithItems> {
        let mut tx = self.pool.begin().await?;

        require_active_approver(&mut tx, approver_id).await?;

        let retur = fetch_sales_return(&mut tx, return_id).await?;
        if retur.status != ReturnStatus::Pending {
            return Err(DbError::conflict(format!(
                "sales return {} is {:?}, only PENDING returns can be rejected",
                retur.return_number, retur.status
            )));
        }

        let updated = sqlx::query(
            r#"
            UPDATE sales_returns
            SET status = ?1, resolved_by = ?2, resolved_at = ?3, rejected_reason = ?4
            WHERE id = ?5 AND status = ?6
            "#,
        )
        .bind(ReturnStatus::Rejected)
        .bind(approver_id)
        .bind(Utc::now())
        .bind(reason)
        .bind(return_id)
        .bind(ReturnStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "sales return {} was resolved concurrently",
                retur.return_number
            )));
        }

        tx.commit().await?;

        info!(return_id = %return_id, approver_id = %approver_id, "Rejected sales return");
        self.get_sales_return(return_id)
            .await?
            .ok_or_else(|| DbError::not_found("SalesReturn", return_id))
    }

    /// Gets a sales return with its lines.
    pub async fn get_sales_return(&self, id: &str) -> DbResult<Option<SalesReturnWithItems>> {
        let retur = sqlx::query_as::<_, SalesReturn>(
            r#"
            SELECT id, return_number, sale_id, customer_id, status, total, reason,
                   rejected_reason, created_by, resolved_by, resolved_at, created_at
            FROM sales_returns
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(retur) = retur else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, SalesReturnItem>(
            r#"
            SELECT id, sales_return_id, product_id, unit_name, conversion,
                   quantity, unit_price, line_total
            FROM sales_return_items
            WHERE sales_return_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(SalesReturnWithItems { retur, items }))
    }

    /// Lists sales returns, newest first, optionally filtered by status.
    pub async fn list_sales_returns(
        &self,
        status: Option<ReturnStatus>,
    ) -> DbResult<Vec<SalesReturn>> {
        let returns = sqlx::query_as::<_, SalesReturn>(
            r#"
            SELECT id, return_number, sale_id, customer_id, status, total, reason,
                   rejected_reason, created_by, resolved_by, resolved_at, created_at
            FROM sales_returns
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(returns)
    }

    // =========================================================================
    // Purchase Returns
    // =========================================================================

    /// Files a purchase return against a COMPLETED purchase order.
    /// Applies immediately: goods leave stock, the supplier's binding
    /// partition shrinks, and the distributor's debt to the store grows.
    /// One transaction.
    pub async fn file_purchase_return(
        &self,
        input: NewPurchaseReturn,
    ) -> DbResult<PurchaseReturnWithItems> {
        if input.items.is_empty() {
            return Err(DbError::conflict("return needs at least one line"));
        }
        for item in &input.items {
            validate_quantity(item.quantity)?;
        }

        let mut tx = self.pool.begin().await?;

        // Accept either the UUID or the display number
        let po: (String, String, String, PoStatus) = {
            let by_id = sqlx::query_as(
                "SELECT id, po_number, distributor_id, status FROM purchase_orders WHERE id = ?1",
            )
            .bind(input.purchase_order.trim())
            .fetch_optional(&mut *tx)
            .await?;

            match by_id {
                Some(row) => row,
                None => {
                    let trimmed = input.purchase_order.trim().to_uppercase();
                    let normalized = if trimmed.starts_with("PO-") {
                        trimmed
                    } else {
                        format!("PO-{}", trimmed)
                    };
                    sqlx::query_as(
                        "SELECT id, po_number, distributor_id, status FROM purchase_orders WHERE po_number = ?1",
                    )
                    .bind(&normalized)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| DbError::not_found("PurchaseOrder", &input.purchase_order))?
                }
            }
        };
        let (po_id, po_number, distributor_id, po_status) = po;

        if po_status != PoStatus::Completed {
            return Err(DbError::conflict(format!(
                "purchase order {} is {:?}, only COMPLETED orders accept returns",
                po_number, po_status
            )));
        }

        let po_items = sqlx::query_as::<_, PurchaseOrderItem>(
            r#"
            SELECT id, purchase_order_id, product_id, unit_name, conversion,
                   quantity, unit_cost, line_total
            FROM purchase_order_items
            WHERE purchase_order_id = ?1
            "#,
        )
        .bind(&po_id)
        .fetch_all(&mut *tx)
        .await?;

        let return_id = Uuid::new_v4().to_string();
        let mut total = Money::zero();
        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let received = po_items
                .iter()
                .find(|p| p.product_id == item.product_id && p.unit_name == item.unit_name)
                .ok_or_else(|| {
                    DbError::conflict(format!(
                        "purchase order {} has no line for product {} in unit {}",
                        po_number, item.product_id, item.unit_name
                    ))
                })?;

            let already_returned: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(i.quantity), 0)
                FROM purchase_return_items i
                JOIN purchase_returns r ON r.id = i.purchase_return_id
                WHERE r.purchase_order_id = ?1
                  AND i.product_id = ?2 AND i.unit_name = ?3
                "#,
            )
            .bind(&po_id)
            .bind(&item.product_id)
            .bind(&item.unit_name)
            .fetch_one(&mut *tx)
            .await?;

            let remaining = received.quantity - already_returned;
            if item.quantity > remaining {
                return Err(CoreError::ReturnCapExceeded {
                    product_id: item.product_id.clone(),
                    requested: item.quantity,
                    remaining: remaining.max(0),
                }
                .into());
            }

            // The goods must still be on hand to send back
            let (sku, stock): (String, i64) =
                sqlx::query_as("SELECT sku, stock FROM products WHERE id = ?1")
                    .bind(&item.product_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", &item.product_id))?;

            let base_qty = item.quantity * received.conversion;
            if base_qty > stock {
                return Err(DbError::InsufficientStock {
                    sku,
                    available: stock,
                    max_fulfillable: stock / received.conversion,
                });
            }

            let line_total = received.unit_cost * item.quantity;
            total += line_total;

            lines.push(PurchaseReturnItem {
                id: Uuid::new_v4().to_string(),
                purchase_return_id: return_id.clone(),
                product_id: item.product_id.clone(),
                unit_name: received.unit_name.clone(),
                conversion: received.conversion,
                quantity: item.quantity,
                unit_cost: received.unit_cost,
                line_total,
            });
        }

        let now = Utc::now();
        let mut inserted = false;
        for attempt in 0..INVOICE_GENERATION_ATTEMPTS {
            let sequence = (now.timestamp_millis() % 10_000) as u32 + attempt;
            let return_number = format_purchase_return_number(now, sequence);

            let result = sqlx::query(
                r#"
                INSERT INTO purchase_returns (id, return_number, purchase_order_id,
                                              distributor_id, total, reason, created_by,
                                              created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&return_id)
            .bind(&return_number)
            .bind(&po_id)
            .bind(&distributor_id)
            .bind(total)
            .bind(&input.reason)
            .bind(&input.created_by)
            .bind(now)
            .execute(&mut *tx)
            .await;

            match result.map_err(DbError::from) {
                Ok(_) => {
                    inserted = true;
                    break;
                }
                Err(e) if e.is_unique_violation() => {
                    debug!(attempt, "Return number collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        if !inserted {
            return Err(DbError::GenerationExhausted {
                what: "return number",
                attempts: INVOICE_GENERATION_ATTEMPTS,
            });
        }

        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO purchase_return_items (id, purchase_return_id, product_id,
                                                   unit_name, conversion, quantity,
                                                   unit_cost, line_total)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&line.id)
            .bind(&line.purchase_return_id)
            .bind(&line.product_id)
            .bind(&line.unit_name)
            .bind(line.conversion)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;

            let base_qty = line.base_quantity();
            ledger::apply_movement(
                &mut tx,
                MovementInput {
                    product_id: &line.product_id,
                    movement_type: MovementType::ReturnPurchase,
                    base_delta: -base_qty,
                    unit_name: &line.unit_name,
                    unit_qty: line.quantity,
                    note: Some(&format!("Returned to supplier against {}", po_number)),
                    reference: Some(MovementRef::PurchaseReturn(return_id.clone())),
                },
            )
            .await?;

            let binding_id =
                find_or_create_binding(&mut tx, &line.product_id, &distributor_id).await?;
            shift_binding_stock(&mut tx, &binding_id, -base_qty).await?;
        }

        sqlx::query("UPDATE distributors SET debt = debt + ?1, updated_at = ?2 WHERE id = ?3")
            .bind(total)
            .bind(now)
            .bind(&distributor_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(return_id = %return_id, po_number = %po_number, total = %total, "Filed purchase return");
        self.get_purchase_return(&return_id)
            .await?
            .ok_or_else(|| DbError::not_found("PurchaseReturn", return_id))
    }

    /// Gets a purchase return with its lines.
    pub async fn get_purchase_return(&self, id: &str) -> DbResult<Option<PurchaseReturnWithItems>> {
        let retur = sqlx::query_as::<_, PurchaseReturn>(
            r#"
            SELECT id, return_number, purchase_order_id, distributor_id, total,
                   reason, created_by, created_at
            FROM purchase_returns
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(retur) = retur else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, PurchaseReturnItem>(
            r#"
            SELECT id, purchase_return_id, product_id, unit_name, conversion,
                   quantity, unit_cost, line_total
            FROM purchase_return_items
            WHERE purchase_return_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PurchaseReturnWithItems { retur, items }))
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Restores stock and reduces the customer's debt for an approved
/// sales return, inside the caller's transaction.
async fn apply_sales_return_effects(
    tx: &mut SqliteConnection,
    return_id: &str,
    lines: &[SalesReturnItem],
    total: Money,
    customer_id: &Option<String>,
) -> DbResult<()> {
    for line in lines {
        ledger::apply_movement(
            tx,
            MovementInput {
                product_id: &line.product_id,
                movement_type: MovementType::ReturnSale,
                base_delta: line.base_quantity(),
                unit_name: &line.unit_name,
                unit_qty: line.quantity,
                note: None,
                reference: Some(MovementRef::SalesReturn(return_id.to_string())),
            },
        )
        .await?;
    }

    if let Some(customer_id) = customer_id {
        let current: Money = sqlx::query_scalar("SELECT debt FROM customers WHERE id = ?1")
            .bind(customer_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", customer_id))?;

        // Floored at zero: the return cannot put the store in debt
        let remaining = current.saturating_sub_floor(total);

        sqlx::query("UPDATE customers SET debt = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(remaining)
            .bind(Utc::now())
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;
    }

    Ok(())
}

/// Fetches a sales return inside a transaction.
async fn fetch_sales_return(tx: &mut SqliteConnection, id: &str) -> DbResult<SalesReturn> {
    sqlx::query_as::<_, SalesReturn>(
        r#"
        SELECT id, return_number, sale_id, customer_id, status, total, reason,
               rejected_reason, created_by, resolved_by, resolved_at, created_at
        FROM sales_returns
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| DbError::not_found("SalesReturn", id))
}

/// Verifies that the user exists, is active, and holds approval
/// authority.
async fn require_active_approver(tx: &mut SqliteConnection, user_id: &str) -> DbResult<()> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, name, role, password_hash, is_active, created_at
        FROM users
        WHERE id = ?1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| DbError::not_found("User", user_id))?;

    if !user.is_active {
        return Err(DbError::unauthorized(format!(
            "user {} is deactivated",
            user.username
        )));
    }
    if !user.role.can_approve_returns() {
        return Err(DbError::unauthorized(format!(
            "role {:?} cannot approve returns",
            user.role
        )));
    }

    Ok(())
}
