//! # Warehouse Repository
//!
//! Delivered stock per (user, server, product).
//!
//! ## Merge-Or-Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INSERT INTO warehouse_items (user, server, product, amount)            │
//! │  ON CONFLICT (user, server, product)                                    │
//! │  DO UPDATE SET amount = amount + excluded.amount                        │
//! │                                                                         │
//! │  no row      ──► row created with the line amount                       │
//! │  row exists  ──► amount added in place, never a second row              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use storefront_core::kit::VirtualLine;
use storefront_core::WarehouseItem;

/// Repository for warehouse stock.
#[derive(Debug, Clone)]
pub struct WarehouseRepository {
    pool: SqlitePool,
}

impl WarehouseRepository {
    /// Creates a new WarehouseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WarehouseRepository { pool }
    }

    /// The user's stock on one server.
    pub async fn list(&self, user_uuid: &str, server_id: &str) -> DbResult<Vec<WarehouseItem>> {
        let items = sqlx::query_as::<_, WarehouseItem>(
            r#"
            SELECT id, user_uuid, server_id, product_id, amount
            FROM warehouse_items
            WHERE user_uuid = ?1 AND server_id = ?2
            ORDER BY product_id
            "#,
        )
        .bind(user_uuid)
        .bind(server_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn get(
        &self,
        user_uuid: &str,
        server_id: &str,
        product_id: i64,
    ) -> DbResult<Option<WarehouseItem>> {
        let item = sqlx::query_as::<_, WarehouseItem>(
            r#"
            SELECT id, user_uuid, server_id, product_id, amount
            FROM warehouse_items
            WHERE user_uuid = ?1 AND server_id = ?2 AND product_id = ?3
            "#,
        )
        .bind(user_uuid)
        .bind(server_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Adds a line to the warehouse and returns the merged row.
    pub async fn merge(
        &self,
        conn: &mut SqliteConnection,
        line: &VirtualLine,
    ) -> DbResult<WarehouseItem> {
        let item = sqlx::query_as::<_, WarehouseItem>(
            r#"
            INSERT INTO warehouse_items (user_uuid, server_id, product_id, amount)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_uuid, server_id, product_id)
            DO UPDATE SET amount = amount + excluded.amount
            RETURNING id, user_uuid, server_id, product_id, amount
            "#,
        )
        .bind(&line.user_uuid)
        .bind(&line.server_id)
        .bind(line.product_id)
        .bind(line.amount)
        .fetch_one(&mut *conn)
        .await?;

        debug!(
            user = %item.user_uuid,
            server = %item.server_id,
            product_id = item.product_id,
            added = line.amount,
            total = item.amount,
            "Merged warehouse line"
        );
        Ok(item)
    }
}
