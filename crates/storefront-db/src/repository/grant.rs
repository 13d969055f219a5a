//! # Grant Repository
//!
//! Donor group grants, unique per (user, server, group). The grant path
//! only creates rows or moves their expiry; `delete` is the administrative
//! take.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::DonorGrant;

const COLUMNS: &str = "id, user_uuid, server_id, group_id, expires_at, created_at, updated_at";

/// Repository for donor group grants.
#[derive(Debug, Clone)]
pub struct GrantRepository {
    pool: SqlitePool,
}

impl GrantRepository {
    /// Creates a new GrantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        GrantRepository { pool }
    }

    /// Looks up the grant for a key inside a unit of work.
    pub async fn find(
        &self,
        conn: &mut SqliteConnection,
        user_uuid: &str,
        server_id: &str,
        group_id: i64,
    ) -> DbResult<Option<DonorGrant>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM donor_grants \
             WHERE user_uuid = ?1 AND server_id = ?2 AND group_id = ?3"
        );
        let grant = sqlx::query_as::<_, DonorGrant>(&sql)
            .bind(user_uuid)
            .bind(server_id)
            .bind(group_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(grant)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<DonorGrant>> {
        let sql = format!("SELECT {COLUMNS} FROM donor_grants WHERE id = ?1");
        let grant = sqlx::query_as::<_, DonorGrant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(grant)
    }

    /// Grants of a user on one server.
    pub async fn list_for(&self, user_uuid: &str, server_id: &str) -> DbResult<Vec<DonorGrant>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM donor_grants \
             WHERE user_uuid = ?1 AND server_id = ?2 ORDER BY group_id"
        );
        let grants = sqlx::query_as::<_, DonorGrant>(&sql)
            .bind(user_uuid)
            .bind(server_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(grants)
    }

    /// Grants of a user on every server.
    pub async fn list_by_user(&self, user_uuid: &str) -> DbResult<Vec<DonorGrant>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM donor_grants \
             WHERE user_uuid = ?1 ORDER BY server_id, group_id"
        );
        let grants = sqlx::query_as::<_, DonorGrant>(&sql)
            .bind(user_uuid)
            .fetch_all(&self.pool)
            .await?;

        Ok(grants)
    }

    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        user_uuid: &str,
        server_id: &str,
        group_id: i64,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<DonorGrant> {
        debug!(user = %user_uuid, server = %server_id, group_id, ?expires_at, "Creating grant");

        let sql = format!(
            "INSERT INTO donor_grants \
                 (user_uuid, server_id, group_id, expires_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5) \
             RETURNING {COLUMNS}"
        );
        let grant = sqlx::query_as::<_, DonorGrant>(&sql)
            .bind(user_uuid)
            .bind(server_id)
            .bind(group_id)
            .bind(expires_at)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;

        Ok(grant)
    }

    /// Moves a grant's expiry.
    pub async fn set_expiry(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<DonorGrant> {
        debug!(id, ?expires_at, "Extending grant");

        let sql = format!(
            "UPDATE donor_grants SET expires_at = ?2, updated_at = ?3 \
             WHERE id = ?1 \
             RETURNING {COLUMNS}"
        );
        let grant = sqlx::query_as::<_, DonorGrant>(&sql)
            .bind(id)
            .bind(expires_at)
            .bind(now)
            .fetch_optional(&mut *conn)
            .await?;

        grant.ok_or_else(|| DbError::not_found("DonorGrant", id))
    }

    /// Deletes a grant. Returns `false` when there was none.
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        debug!(id, "Deleting grant");

        let result = sqlx::query("DELETE FROM donor_grants WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
