//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Key Operations
//! - CRUD with the multi-unit set rule (exactly one base unit)
//! - Manual stock additions and adjustments through the ledger
//! - Purchase-order suggestions (stock at or below min_stock)
//! - Bulk import with a per-run distributor cache
//!
//! ## Unit Conversion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product "Kopi Sachet", stock = 8 base units                           │
//! │                                                                         │
//! │  Units:  Pcs      conversion 1    ← base unit                          │
//! │          Renceng  conversion 10                                        │
//! │          Karton   conversion 20                                        │
//! │                                                                         │
//! │  add_stock(2, "Renceng")  →  +20 base units  →  stock = 28             │
//! │                                                                         │
//! │  The ledger row records both views:                                    │
//! │    unit_qty = 2, unit_name = "Renceng", qty_change = +20               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{self, MovementInput};
use toko_core::validation::{
    validate_name, validate_quantity, validate_sku, validate_unit_set,
};
use toko_core::{CoreError, Money, MovementType, Product, StockMovement, Unit};

// =============================================================================
// Input Types
// =============================================================================

/// A unit definition for product creation.
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub name: String,
    pub conversion: i64,
    pub price: Money,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub min_stock: i64,
    pub notes: Option<String>,

    /// Unit set. Exactly one entry must have conversion 1.
    pub units: Vec<NewUnit>,

    /// Opening stock in BASE units. Booked as an IN movement so the
    /// ledger starts contiguous from zero.
    pub initial_stock: i64,
}

/// Input for updating product master data. Stock is never updated here;
/// it only moves through the ledger.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub brand: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub min_stock: Option<i64>,
    pub notes: Option<Option<String>>,
}

/// One row of a bulk import file.
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub min_stock: i64,
    pub units: Vec<NewUnit>,
    pub initial_stock: i64,

    /// Supplier name as written in the file. Found or created once per
    /// run through the import context.
    pub distributor_name: Option<String>,

    /// Barcode to register for the base unit. Skipped with a warning if
    /// the code already exists.
    pub barcode: Option<String>,
}

/// Outcome of a bulk import run.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub created: usize,

    /// (sku, reason) for rows that were not imported.
    pub skipped: Vec<(String, String)>,
}

/// Per-run state for a bulk import.
///
/// Caches distributor name → id lookups so a thousand-row file does not
/// hit the distributors table a thousand times. Scoped to one run: a
/// distributor renamed between runs is picked up by the next run, which
/// a process-wide cache would miss.
#[derive(Debug, Default)]
struct ImportContext {
    distributor_ids: HashMap<String, String>,
}

/// A product that should be reordered, with its preferred supplier.
#[derive(Debug, Clone)]
pub struct PoSuggestion {
    pub product: Product,
    pub default_distributor_id: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product catalog operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
/// let product = repo.get_by_sku("KOPI-SCH").await?;
/// repo.add_stock(&product.id, "Renceng", 2, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Creates a product with its unit set, and books opening stock as
    /// an IN movement. One transaction.
    pub async fn create(&self, input: NewProduct) -> DbResult<Product> {
        validate_sku(&input.sku)?;
        validate_name(&input.name)?;
        let unit_pairs: Vec<(String, i64)> = input
            .units
            .iter()
            .map(|u| (u.name.clone(), u.conversion))
            .collect();
        validate_unit_set(&unit_pairs)?;
        if input.initial_stock < 0 {
            return Err(DbError::conflict("initial stock cannot be negative"));
        }

        let mut tx = self.pool.begin().await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let sku = input.sku.trim().to_string();

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, brand, category, stock, min_stock, notes,
                                  created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(&sku)
        .bind(input.name.trim())
        .bind(&input.brand)
        .bind(&input.category)
        .bind(input.min_stock)
        .bind(&input.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for unit in &input.units {
            sqlx::query(
                r#"
                INSERT INTO units (id, product_id, name, conversion, price, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(unit.name.trim())
            .bind(unit.conversion)
            .bind(unit.price)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        if input.initial_stock > 0 {
            let base_unit = input
                .units
                .iter()
                .find(|u| u.conversion == 1)
                .map(|u| u.name.trim().to_string())
                .unwrap_or_else(|| "Pcs".to_string());

            ledger::apply_movement(
                &mut tx,
                MovementInput {
                    product_id: &id,
                    movement_type: MovementType::In,
                    base_delta: input.initial_stock,
                    unit_name: &base_unit,
                    unit_qty: input.initial_stock,
                    note: Some("Initial stock"),
                    reference: None,
                },
            )
            .await?;
        }

        tx.commit().await?;

        info!(product_id = %id, sku = %sku, "Created product");
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by its UUID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, brand, category, stock, min_stock, notes,
                   created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, brand, category, stock, min_stock, notes,
                   created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Searches products by name or SKU substring, sorted by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = limit, "Searching products");

        let pattern = format!("%{}%", query);
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, brand, category, stock, min_stock, notes,
                   created_at, updated_at
            FROM products
            WHERE name LIKE ?1 OR sku LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists the unit set of a product, base unit first.
    pub async fn units_of(&self, product_id: &str) -> DbResult<Vec<Unit>> {
        let units = sqlx::query_as::<_, Unit>(
            r#"
            SELECT id, product_id, name, conversion, price, created_at
            FROM units
            WHERE product_id = ?1
            ORDER BY conversion ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    /// Updates product master data. Stock is untouchable here.
    pub async fn update(&self, id: &str, update: ProductUpdate) -> DbResult<Product> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        let name = match update.name {
            Some(n) => {
                validate_name(&n)?;
                n.trim().to_string()
            }
            None => existing.name,
        };
        let brand = update.brand.unwrap_or(existing.brand);
        let category = update.category.unwrap_or(existing.category);
        let min_stock = update.min_stock.unwrap_or(existing.min_stock);
        let notes = update.notes.unwrap_or(existing.notes);

        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = ?1, brand = ?2, category = ?3, min_stock = ?4, notes = ?5, updated_at = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&name)
        .bind(&brand)
        .bind(&category)
        .bind(min_stock)
        .bind(&notes)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes a product.
    ///
    /// Refused once the product has ledger history, supplier bindings,
    /// or registered barcodes: the history is the audit trail and the
    /// other records would be orphaned.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let guards: [(&str, &str); 3] = [
            ("stock_history", "ledger movements"),
            ("supplier_bindings", "supplier bindings"),
            ("barcodes", "barcodes"),
        ];
        for (table, what) in guards {
            let count: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE product_id = ?1", table))
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?;

            if count > 0 {
                return Err(DbError::conflict(format!(
                    "product {} has {} {} and cannot be deleted",
                    id, count, what
                )));
            }
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(product_id = %id, "Deleted product");
        Ok(())
    }

    // =========================================================================
    // Stock Operations
    // =========================================================================

    /// Adds stock manually (goods found during a count, opening stock
    /// for an existing product). Booked as an IN movement.
    pub async fn add_stock(
        &self,
        product_id: &str,
        unit_name: &str,
        quantity: i64,
        note: Option<&str>,
    ) -> DbResult<StockMovement> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let unit = find_unit(&mut tx, product_id, unit_name).await?;

        let movement = ledger::apply_movement(
            &mut tx,
            MovementInput {
                product_id,
                movement_type: MovementType::In,
                base_delta: unit.to_base(quantity),
                unit_name: &unit.name,
                unit_qty: quantity,
                note: Some(note.unwrap_or("Manual stock addition")),
                reference: None,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(movement)
    }

    /// Sets the product total to a counted figure, booking the signed
    /// difference as an ADJUSTMENT movement. A count equal to the
    /// current total is a no-op error.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        counted_total: i64,
        note: Option<&str>,
    ) -> DbResult<StockMovement> {
        if counted_total < 0 {
            return Err(DbError::conflict("counted total cannot be negative"));
        }

        let mut tx = self.pool.begin().await?;

        let current: i64 = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))?;

        let delta = counted_total - current;
        if delta == 0 {
            return Err(DbError::conflict(
                "counted total equals current stock, nothing to adjust",
            ));
        }

        let base_unit_name: String =
            sqlx::query_scalar("SELECT name FROM units WHERE product_id = ?1 AND conversion = 1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?
                .unwrap_or_else(|| "Pcs".to_string());

        let movement = ledger::apply_movement(
            &mut tx,
            MovementInput {
                product_id,
                movement_type: MovementType::Adjustment,
                base_delta: delta,
                unit_name: &base_unit_name,
                unit_qty: delta,
                note: Some(note.unwrap_or("Stock adjustment")),
                reference: None,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(movement)
    }

    // =========================================================================
    // Purchase Order Suggestions
    // =========================================================================

    /// Lists products whose stock is at or below their reorder
    /// threshold, each with its default supplier when one is set.
    pub async fn po_suggestions(&self) -> DbResult<Vec<PoSuggestion>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, brand, category, stock, min_stock, notes,
                   created_at, updated_at
            FROM products
            WHERE stock <= min_stock AND min_stock > 0
            ORDER BY stock ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut suggestions = Vec::with_capacity(products.len());
        for product in products {
            let default_distributor_id: Option<String> = sqlx::query_scalar(
                r#"
                SELECT distributor_id FROM supplier_bindings
                WHERE product_id = ?1 AND is_default = 1
                LIMIT 1
                "#,
            )
            .bind(&product.id)
            .fetch_optional(&self.pool)
            .await?;

            suggestions.push(PoSuggestion {
                product,
                default_distributor_id,
            });
        }

        Ok(suggestions)
    }

    // =========================================================================
    // Bulk Import
    // =========================================================================

    /// Imports a batch of products.
    ///
    /// Each row runs in its own transaction: a bad row is skipped and
    /// reported without poisoning the rest of the file. Distributor
    /// lookups are cached for the duration of the run only.
    pub async fn import(&self, rows: Vec<ImportRow>) -> DbResult<ImportReport> {
        let mut ctx = ImportContext::default();
        let mut report = ImportReport::default();

        for row in rows {
            let sku = row.sku.clone();
            match self.import_row(&mut ctx, row).await {
                Ok(()) => report.created += 1,
                Err(e) => {
                    warn!(sku = %sku, error = %e, "Skipped import row");
                    report.skipped.push((sku, e.to_string()));
                }
            }
        }

        info!(
            created = report.created,
            skipped = report.skipped.len(),
            "Bulk import finished"
        );
        Ok(report)
    }

    async fn import_row(&self, ctx: &mut ImportContext, row: ImportRow) -> DbResult<()> {
        validate_sku(&row.sku)?;
        validate_name(&row.name)?;
        let unit_pairs: Vec<(String, i64)> = row
            .units
            .iter()
            .map(|u| (u.name.clone(), u.conversion))
            .collect();
        validate_unit_set(&unit_pairs)?;

        if self.get_by_sku(row.sku.trim()).await?.is_some() {
            return Err(DbError::duplicate("sku", row.sku.trim()));
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let product_id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, category, stock, min_stock, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?6)
            "#,
        )
        .bind(&product_id)
        .bind(row.sku.trim())
        .bind(row.name.trim())
        .bind(&row.category)
        .bind(row.min_stock)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut base_unit_id: Option<String> = None;
        let mut base_unit_name = "Pcs".to_string();
        for unit in &row.units {
            let unit_id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO units (id, product_id, name, conversion, price, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&unit_id)
            .bind(&product_id)
            .bind(unit.name.trim())
            .bind(unit.conversion)
            .bind(unit.price)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if unit.conversion == 1 {
                base_unit_id = Some(unit_id);
                base_unit_name = unit.name.trim().to_string();
            }
        }

        // Resolve the supplier through the per-run cache
        let mut resolved_distributor: Option<(String, String)> = None;
        let binding_id = if let Some(distributor_name) = &row.distributor_name {
            let distributor_id = resolve_distributor(&mut tx, ctx, distributor_name.trim()).await?;
            resolved_distributor = Some((
                distributor_name.trim().to_lowercase(),
                distributor_id.clone(),
            ));

            let binding_id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO supplier_bindings (id, product_id, distributor_id, stock, is_default, created_at)
                VALUES (?1, ?2, ?3, ?4, 1, ?5)
                "#,
            )
            .bind(&binding_id)
            .bind(&product_id)
            .bind(&distributor_id)
            .bind(row.initial_stock.max(0))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            Some(binding_id)
        } else {
            None
        };

        if row.initial_stock > 0 {
            // Opening stock from a file is a count, not a receipt
            ledger::apply_movement(
                &mut tx,
                MovementInput {
                    product_id: &product_id,
                    movement_type: MovementType::Adjustment,
                    base_delta: row.initial_stock,
                    unit_name: &base_unit_name,
                    unit_qty: row.initial_stock,
                    note: Some("Imported opening stock"),
                    reference: None,
                },
            )
            .await?;
        }

        if let Some(code) = &row.barcode {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM barcodes WHERE barcode = ?1")
                    .bind(code.trim())
                    .fetch_optional(&mut *tx)
                    .await?;

            if exists.is_some() {
                // Not fatal for the row, the product still imports
                warn!(sku = %row.sku, barcode = %code, "Barcode already registered, skipping");
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO barcodes (id, barcode, product_id, unit_id, binding_id, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(code.trim())
                .bind(&product_id)
                .bind(&base_unit_id)
                .bind(&binding_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        // Cache only after commit so a rolled-back row cannot leave a
        // dangling distributor id behind
        if let Some((key, id)) = resolved_distributor {
            ctx.distributor_ids.insert(key, id);
        }

        Ok(())
    }
}

// =============================================================================
// Helpers (shared with other repositories)
// =============================================================================

/// Finds a product's unit by name within a transaction. Errors with the
/// product's SKU in the message when the unit is not defined.
pub(crate) async fn find_unit(
    tx: &mut SqliteConnection,
    product_id: &str,
    unit_name: &str,
) -> DbResult<Unit> {
    let unit = sqlx::query_as::<_, Unit>(
        r#"
        SELECT id, product_id, name, conversion, price, created_at
        FROM units
        WHERE product_id = ?1 AND name = ?2
        "#,
    )
    .bind(product_id)
    .bind(unit_name)
    .fetch_optional(&mut *tx)
    .await?;

    match unit {
        Some(u) => Ok(u),
        None => {
            let sku: String = sqlx::query_scalar("SELECT sku FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Product", product_id))?;

            Err(CoreError::UnknownUnit {
                sku,
                unit: unit_name.to_string(),
            }
            .into())
        }
    }
}

/// Finds or creates a distributor by name. Reads the run cache but does
/// not write it; the caller caches after its transaction commits.
async fn resolve_distributor(
    tx: &mut SqliteConnection,
    ctx: &ImportContext,
    name: &str,
) -> DbResult<String> {
    let key = name.to_lowercase();
    if let Some(id) = ctx.distributor_ids.get(&key) {
        return Ok(id.clone());
    }

    let existing: Option<String> =
        sqlx::query_scalar("SELECT id FROM distributors WHERE LOWER(name) = ?1")
            .bind(&key)
            .fetch_optional(&mut *tx)
            .await?;

    let id = match existing {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            let now = Utc::now();
            sqlx::query(
                r#"
                INSERT INTO distributors (id, name, phone, address, debt, created_at, updated_at)
                VALUES (?1, ?2, NULL, NULL, 0, ?3, ?3)
                "#,
            )
            .bind(&id)
            .bind(name)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            debug!(distributor_id = %id, name = %name, "Created distributor during import");
            id
        }
    };

    Ok(id)
}
