//! # User Repository
//!
//! Store users and the credential check behind the admin-gated sales
//! return flow.
//!
//! Hashing stays behind the [`CredentialVerifier`] trait from toko-core
//! so the approval rules are testable with a fake verifier; production
//! code uses [`BcryptVerifier`].

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use toko_core::validation::validate_name;
use toko_core::{CredentialVerifier, User, UserRole};

/// Bcrypt-backed credential verification.
///
/// A malformed stored hash verifies as false rather than erroring: a
/// credential check has no useful failure mode besides "no".
#[derive(Debug, Clone, Copy, Default)]
pub struct BcryptVerifier;

impl CredentialVerifier for BcryptVerifier {
    fn verify(&self, candidate: &str, hash: &str) -> bool {
        bcrypt::verify(candidate, hash).unwrap_or(false)
    }
}

/// Input for creating a user. The caller supplies an already-hashed
/// credential; this layer never sees plaintext except to verify.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub role: UserRole,
    pub password_hash: String,
}

/// Repository for user operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates a user.
    pub async fn create(&self, input: NewUser) -> DbResult<User> {
        validate_name(&input.name)?;
        if input.username.trim().is_empty() {
            return Err(toko_core::ValidationError::Required {
                field: "username".to_string(),
            }
            .into());
        }

        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, name, role, password_hash, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
            "#,
        )
        .bind(&id)
        .bind(input.username.trim())
        .bind(input.name.trim())
        .bind(input.role)
        .bind(&input.password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(user_id = %id, role = ?input.role, "Created user");
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Gets a user by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, name, role, password_hash, is_active, created_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, name, role, password_hash, is_active, created_at
            FROM users
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Lists active users holding approval authority (admins and
    /// managers). The return flow checks a supplied password against
    /// each of their hashes in turn.
    pub async fn list_active_approvers(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, name, role, password_hash, is_active, created_at
            FROM users
            WHERE is_active = 1 AND role IN ('ADMIN', 'MANAGER')
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Deactivates a user. Deactivated users keep their audit trail but
    /// lose approval authority.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(user_id = %id, "Deactivated user");
        Ok(())
    }
}
