//! # Notification Outbox
//!
//! Durable queue for outbound notifications (low-stock alerts, debt
//! reminders). Writers enqueue inside their own transaction so a
//! notification exists exactly when the event that caused it committed;
//! a delivery worker drains the queue later.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  enqueue (in the event's tx) ──► sent_at NULL, attempts 0              │
//! │                                                                         │
//! │  worker: list_pending ──► deliver                                       │
//! │                             ├── ok ──► mark_sent    (sent_at stamped)  │
//! │                             └── err ─► mark_failed  (attempts += 1,    │
//! │                                        last_error recorded,            │
//! │                                        next_attempt_at pushed out      │
//! │                                        exponentially)                  │
//! │                                                                         │
//! │  attempts >= MAX_DELIVERY_ATTEMPTS drops the entry out of              │
//! │  list_pending; it stays in the table for inspection.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toko_core::{NotificationChannel, NotificationOutboxEntry, ValidationError};

/// Entries with this many failed attempts are no longer offered to the
/// delivery worker.
pub const MAX_DELIVERY_ATTEMPTS: i64 = 5;

/// First retry delay. Doubles per failed attempt: 60s, 120s, 240s, ...
pub const BASE_RETRY_DELAY_SECS: i64 = 60;

/// Input for enqueueing a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,

    /// Channel-specific body, JSON.
    pub payload: String,
}

/// Enqueues a notification inside the caller's transaction, tying it
/// to the commit of the event that produced it.
pub async fn enqueue_in_tx(
    tx: &mut SqliteConnection,
    input: &NewNotification,
) -> DbResult<String> {
    // The worker hands the payload to the channel as-is, so it has to
    // be well-formed JSON before it is stored
    if serde_json::from_str::<serde_json::Value>(&input.payload).is_err() {
        return Err(ValidationError::InvalidFormat {
            field: "payload".to_string(),
            reason: "must be valid JSON".to_string(),
        }
        .into());
    }

    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO notification_outbox (id, channel, recipient, subject, payload, attempts,
                                         last_error, next_attempt_at, created_at, attempted_at,
                                         sent_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, NULL, ?6, NULL, NULL)
        "#,
    )
    .bind(&id)
    .bind(input.channel)
    .bind(&input.recipient)
    .bind(&input.subject)
    .bind(&input.payload)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    Ok(id)
}

/// Repository for the notification outbox.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

impl NotificationOutboxRepository {
    /// Creates a new NotificationOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Enqueues a notification in its own transaction.
    pub async fn enqueue(&self, input: NewNotification) -> DbResult<NotificationOutboxEntry> {
        let mut tx = self.pool.begin().await?;
        let id = enqueue_in_tx(&mut tx, &input).await?;
        tx.commit().await?;

        info!(
            notification_id = %id,
            channel = ?input.channel,
            recipient = %input.recipient,
            "Enqueued notification"
        );
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Notification", id))
    }

    /// Gets an outbox entry by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<NotificationOutboxEntry>> {
        let entry = sqlx::query_as::<_, NotificationOutboxEntry>(
            r#"
            SELECT id, channel, recipient, subject, payload, attempts, last_error,
                   next_attempt_at, created_at, attempted_at, sent_at
            FROM notification_outbox
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Lists undelivered entries still under the attempt ceiling whose
    /// backoff window has elapsed, oldest first, for the delivery
    /// worker.
    pub async fn list_pending(&self, limit: u32) -> DbResult<Vec<NotificationOutboxEntry>> {
        let entries = sqlx::query_as::<_, NotificationOutboxEntry>(
            r#"
            SELECT id, channel, recipient, subject, payload, attempts, last_error,
                   next_attempt_at, created_at, attempted_at, sent_at
            FROM notification_outbox
            WHERE sent_at IS NULL
              AND attempts < ?1
              AND (next_attempt_at IS NULL OR next_attempt_at <= ?2)
            ORDER BY rowid ASC
            LIMIT ?3
            "#,
        )
        .bind(MAX_DELIVERY_ATTEMPTS)
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry delivered.
    pub async fn mark_sent(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET sent_at = ?1, attempted_at = ?1, attempts = attempts + 1, last_error = NULL
            WHERE id = ?2 AND sent_at IS NULL
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }

        info!(notification_id = %id, "Notification delivered");
        Ok(())
    }

    /// Records a failed delivery attempt and pushes the next retry out
    /// by `BASE_RETRY_DELAY_SECS * 2^attempts`.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let attempts: i64 = sqlx::query_scalar(
            "SELECT attempts FROM notification_outbox WHERE id = ?1 AND sent_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Notification", id))?;

        let now = Utc::now();
        let delay_secs = BASE_RETRY_DELAY_SECS << attempts.min(10);
        let next_attempt_at = now + Duration::seconds(delay_secs);

        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1, last_error = ?1, attempted_at = ?2,
                next_attempt_at = ?3
            WHERE id = ?4 AND sent_at IS NULL
            "#,
        )
        .bind(error)
        .bind(now)
        .bind(next_attempt_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        warn!(notification_id = %id, error = %error, "Notification delivery failed");
        Ok(())
    }

    /// Counts entries the worker has given up on.
    pub async fn count_dead(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE sent_at IS NULL AND attempts >= ?1",
        )
        .bind(MAX_DELIVERY_ATTEMPTS)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
