//! # Barcode Repository
//!
//! Barcode registration, lookup, and EAN-13 generation.
//!
//! ## Generation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  generate()                                                             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  seed = Uuid::new_v4().as_u128()                                        │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  code = ean13_from_seed(seed)     ← 12 digits + check digit            │
//! │      │                                                                  │
//! │      ├── already registered? ──► new seed, retry (up to 100×)          │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  INSERT, rely on the UNIQUE index to win races                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toko_core::barcode::{ean13_from_seed, is_valid_ean13};
use toko_core::{Barcode, ValidationError, BARCODE_GENERATION_ATTEMPTS};

/// Input for registering a barcode.
#[derive(Debug, Clone)]
pub struct NewBarcode {
    /// The code itself. Must be a structurally valid EAN-13.
    pub barcode: String,
    pub product_id: String,

    /// Unit the code resolves to at the register. None means base unit.
    pub unit_id: Option<String>,

    /// Supplier binding the code was registered under, if any.
    pub binding_id: Option<String>,
}

/// Outcome of a bulk registration run.
#[derive(Debug, Clone, Default)]
pub struct BulkBarcodeReport {
    pub created: Vec<Barcode>,

    /// (code, reason) for entries that were not registered.
    pub rejected: Vec<(String, String)>,
}

/// Repository for barcode operations.
#[derive(Debug, Clone)]
pub struct BarcodeRepository {
    pool: SqlitePool,
}

impl BarcodeRepository {
    /// Creates a new BarcodeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BarcodeRepository { pool }
    }

    /// Registers a barcode. The UNIQUE index enforces global
    /// uniqueness; a duplicate surfaces as `UniqueViolation`.
    pub async fn register(&self, input: NewBarcode) -> DbResult<Barcode> {
        let code = input.barcode.trim();
        if !is_valid_ean13(code) {
            return Err(ValidationError::InvalidFormat {
                field: "barcode".to_string(),
                reason: "must be 13 digits with a valid check digit".to_string(),
            }
            .into());
        }

        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO barcodes (id, barcode, product_id, unit_id, binding_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(code)
        .bind(&input.product_id)
        .bind(&input.unit_id)
        .bind(&input.binding_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(barcode = %code, product_id = %input.product_id, "Registered barcode");
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Barcode", id))
    }

    /// Registers a batch of barcodes, one at a time. A bad entry
    /// (malformed code, duplicate) is reported and the rest proceed.
    pub async fn register_many(&self, inputs: Vec<NewBarcode>) -> DbResult<BulkBarcodeReport> {
        let mut report = BulkBarcodeReport::default();

        for input in inputs {
            let code = input.barcode.trim().to_string();
            match self.register(input).await {
                Ok(barcode) => report.created.push(barcode),
                Err(e) => {
                    debug!(code = %code, error = %e, "Rejected barcode in bulk registration");
                    report.rejected.push((code, e.to_string()));
                }
            }
        }

        info!(
            created = report.created.len(),
            rejected = report.rejected.len(),
            "Bulk barcode registration finished"
        );
        Ok(report)
    }

    /// Replaces the code on an existing registration. The new code goes
    /// through the same validity and uniqueness checks as registration.
    pub async fn update(&self, id: &str, new_code: &str) -> DbResult<Barcode> {
        let code = new_code.trim();
        if !is_valid_ean13(code) {
            return Err(ValidationError::InvalidFormat {
                field: "barcode".to_string(),
                reason: "must be 13 digits with a valid check digit".to_string(),
            }
            .into());
        }

        let result = sqlx::query("UPDATE barcodes SET barcode = ?1 WHERE id = ?2")
            .bind(code)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Barcode", id));
        }

        info!(barcode_id = %id, code = %code, "Updated barcode");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Barcode", id))
    }

    /// Generates and registers a fresh EAN-13 for a product.
    ///
    /// Retries with a new random seed on collision, giving up after
    /// [`BARCODE_GENERATION_ATTEMPTS`] tries.
    pub async fn generate(
        &self,
        product_id: &str,
        unit_id: Option<&str>,
        binding_id: Option<&str>,
    ) -> DbResult<Barcode> {
        for attempt in 1..=BARCODE_GENERATION_ATTEMPTS {
            let code = ean13_from_seed(Uuid::new_v4().as_u128());

            let result = self
                .register(NewBarcode {
                    barcode: code.clone(),
                    product_id: product_id.to_string(),
                    unit_id: unit_id.map(str::to_string),
                    binding_id: binding_id.map(str::to_string),
                })
                .await;

            match result {
                Ok(barcode) => return Ok(barcode),
                Err(e) if e.is_unique_violation() => {
                    debug!(attempt, code = %code, "Generated barcode collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::GenerationExhausted {
            what: "barcode",
            attempts: BARCODE_GENERATION_ATTEMPTS,
        })
    }

    /// Gets a barcode row by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Barcode>> {
        let barcode = sqlx::query_as::<_, Barcode>(
            r#"
            SELECT id, barcode, product_id, unit_id, binding_id, created_at
            FROM barcodes
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(barcode)
    }

    /// Resolves a scanned code to its registration, if any.
    pub async fn resolve(&self, code: &str) -> DbResult<Option<Barcode>> {
        let barcode = sqlx::query_as::<_, Barcode>(
            r#"
            SELECT id, barcode, product_id, unit_id, binding_id, created_at
            FROM barcodes
            WHERE barcode = ?1
            "#,
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(barcode)
    }

    /// Lists the barcodes registered for a product.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Barcode>> {
        let barcodes = sqlx::query_as::<_, Barcode>(
            r#"
            SELECT id, barcode, product_id, unit_id, binding_id, created_at
            FROM barcodes
            WHERE product_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(barcodes)
    }

    /// Deletes a barcode registration.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM barcodes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Barcode", id));
        }

        info!(barcode_id = %id, "Deleted barcode");
        Ok(())
    }

    /// Deletes a batch of registrations in one transaction, returning
    /// how many existed.
    pub async fn delete_many(&self, ids: &[String]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        let mut deleted = 0u64;
        for id in ids {
            let result = sqlx::query("DELETE FROM barcodes WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            deleted += result.rows_affected();
        }

        tx.commit().await?;

        info!(requested = ids.len(), deleted, "Bulk deleted barcodes");
        Ok(deleted)
    }
}
