//! # User Repository
//!
//! Accounts and the balance ledger.
//!
//! ## Debit-If-Sufficient
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE users                                                           │
//! │     SET real_cents = real_cents - :total                                │
//! │   WHERE uuid = :uuid AND real_cents >= :total                           │
//! │  RETURNING real_cents                                                   │
//! │                                                                         │
//! │  One statement: the comparison and the subtraction see the same row    │
//! │  version, so two concurrent debits can never both pass the check.     │
//! │  No row back = not enough balance (or no such user).                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{Money, User};

/// Repository for accounts and balances.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn get(&self, uuid: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT uuid, username, real_cents, created_at FROM users WHERE uuid = ?1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Creates an account with an opening balance.
    pub async fn insert(&self, uuid: &str, username: &str, opening: Money) -> DbResult<User> {
        debug!(uuid = %uuid, username = %username, "Inserting user");

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (uuid, username, real_cents, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING uuid, username, real_cents, created_at
            "#,
        )
        .bind(uuid)
        .bind(username)
        .bind(opening.cents())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Current balance, `None` when the user does not exist.
    pub async fn balance(&self, uuid: &str) -> DbResult<Option<Money>> {
        let cents: Option<i64> = sqlx::query_scalar("SELECT real_cents FROM users WHERE uuid = ?1")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(cents.map(Money::from_cents))
    }

    /// Adds to a balance and returns the new balance.
    pub async fn credit(&self, uuid: &str, amount: Money) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        self.credit_in(&mut conn, uuid, amount).await
    }

    /// [`credit`](Self::credit) on the caller's connection.
    pub async fn credit_in(
        &self,
        conn: &mut SqliteConnection,
        uuid: &str,
        amount: Money,
    ) -> DbResult<Money> {
        debug!(uuid = %uuid, amount = %amount, "Crediting balance");

        let cents: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users SET real_cents = real_cents + ?2
            WHERE uuid = ?1
            RETURNING real_cents
            "#,
        )
        .bind(uuid)
        .bind(amount.cents())
        .fetch_optional(&mut *conn)
        .await?;

        cents
            .map(Money::from_cents)
            .ok_or_else(|| DbError::not_found("User", uuid))
    }

    /// Debits `amount` only if the balance covers it.
    ///
    /// Returns the remaining balance, or `None` when nothing was debited.
    pub async fn debit_if_sufficient(
        &self,
        conn: &mut SqliteConnection,
        uuid: &str,
        amount: Money,
    ) -> DbResult<Option<Money>> {
        debug!(uuid = %uuid, amount = %amount, "Debiting balance");

        let cents: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users SET real_cents = real_cents - ?2
            WHERE uuid = ?1 AND real_cents >= ?2
            RETURNING real_cents
            "#,
        )
        .bind(uuid)
        .bind(amount.cents())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(cents.map(Money::from_cents))
    }
}
