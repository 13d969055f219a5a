//! # History Repository
//!
//! Append-only audit log. Records are written on the caller's connection so
//! they commit or roll back together with the fulfillment they describe.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use storefront_core::{HistoryEntry, HistoryRecord};

/// Repository for history records.
#[derive(Debug, Clone)]
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    /// Creates a new HistoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HistoryRepository { pool }
    }

    /// Appends one record and returns its id.
    pub async fn record(
        &self,
        conn: &mut SqliteConnection,
        entry: &HistoryEntry,
        at: DateTime<Utc>,
    ) -> DbResult<i64> {
        let extra = entry.extra.as_ref().map(serde_json::to_string).transpose()?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO history (kind, created_at, ip, user_uuid, subject_id, server_id, extra)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id
            "#,
        )
        .bind(entry.kind)
        .bind(at)
        .bind(&entry.ip)
        .bind(&entry.user_uuid)
        .bind(entry.subject_id)
        .bind(&entry.server_id)
        .bind(extra)
        .fetch_one(&mut *conn)
        .await?;

        debug!(
            id,
            kind = ?entry.kind,
            user = %entry.user_uuid,
            subject_id = entry.subject_id,
            "Recorded history"
        );
        Ok(id)
    }

    /// All records of a user, oldest first.
    pub async fn list_for_user(&self, user_uuid: &str) -> DbResult<Vec<HistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, kind, created_at, ip, user_uuid, subject_id, server_id, extra
            FROM history
            WHERE user_uuid = ?1
            ORDER BY id
            "#,
        )
        .bind(user_uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
