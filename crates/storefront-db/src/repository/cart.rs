//! # Cart Repository
//!
//! Product rows are unique per (user, server, product) and merge amounts;
//! kit rows are one per selection.
//!
//! ```text
//! add_product(A, 2) ──► cart_items (A, 2)
//! add_product(A, 3) ──► cart_items (A, 5)          same row, amount merged
//! add_kit(K)        ──► cart_kits  (K) #1
//! add_kit(K)        ──► cart_kits  (K) #2          bought twice
//! ```
//!
//! A merge that would push a row past `MAX_LINE_AMOUNT` leaves it untouched.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use storefront_core::{CartEntryKind, CartItem, CartKit, MAX_LINE_AMOUNT};

/// Repository for cart rows.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Adds `amount` of a product, merging into an existing row.
    ///
    /// Returns `None`, writing nothing, when the merged amount would exceed
    /// `MAX_LINE_AMOUNT`.
    pub async fn add_product(
        &self,
        user_uuid: &str,
        server_id: &str,
        product_id: i64,
        amount: i64,
    ) -> DbResult<Option<CartItem>> {
        debug!(
            user = %user_uuid,
            server = %server_id,
            product_id,
            amount,
            "Adding product to cart"
        );

        let item = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (user_uuid, server_id, product_id, amount)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_uuid, server_id, product_id)
            DO UPDATE SET amount = cart_items.amount + excluded.amount
            WHERE cart_items.amount + excluded.amount <= ?5
            RETURNING id, user_uuid, server_id, product_id, amount
            "#,
        )
        .bind(user_uuid)
        .bind(server_id)
        .bind(product_id)
        .bind(amount)
        .bind(MAX_LINE_AMOUNT)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Adds one kit selection.
    pub async fn add_kit(
        &self,
        user_uuid: &str,
        server_id: &str,
        kit_id: i64,
    ) -> DbResult<CartKit> {
        debug!(user = %user_uuid, server = %server_id, kit_id, "Adding kit to cart");

        let kit = sqlx::query_as::<_, CartKit>(
            r#"
            INSERT INTO cart_kits (user_uuid, server_id, kit_id)
            VALUES (?1, ?2, ?3)
            RETURNING id, user_uuid, server_id, kit_id
            "#,
        )
        .bind(user_uuid)
        .bind(server_id)
        .bind(kit_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(kit)
    }

    pub async fn items_for(&self, user_uuid: &str, server_id: &str) -> DbResult<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, user_uuid, server_id, product_id, amount
            FROM cart_items
            WHERE user_uuid = ?1 AND server_id = ?2
            ORDER BY id
            "#,
        )
        .bind(user_uuid)
        .bind(server_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn kits_for(&self, user_uuid: &str, server_id: &str) -> DbResult<Vec<CartKit>> {
        let kits = sqlx::query_as::<_, CartKit>(
            r#"
            SELECT id, user_uuid, server_id, kit_id
            FROM cart_kits
            WHERE user_uuid = ?1 AND server_id = ?2
            ORDER BY id
            "#,
        )
        .bind(user_uuid)
        .bind(server_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(kits)
    }

    /// Empties the user's cart on one server. Returns removed rows.
    pub async fn clear_for(&self, user_uuid: &str, server_id: &str) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        let items = sqlx::query("DELETE FROM cart_items WHERE user_uuid = ?1 AND server_id = ?2")
            .bind(user_uuid)
            .bind(server_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let kits = sqlx::query("DELETE FROM cart_kits WHERE user_uuid = ?1 AND server_id = ?2")
            .bind(user_uuid)
            .bind(server_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(user = %user_uuid, server = %server_id, removed = items + kits, "Cleared cart");
        Ok(items + kits)
    }

    /// Empties every cart of the user across all servers.
    pub async fn clear_all(&self, user_uuid: &str) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        let items = sqlx::query("DELETE FROM cart_items WHERE user_uuid = ?1")
            .bind(user_uuid)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let kits = sqlx::query("DELETE FROM cart_kits WHERE user_uuid = ?1")
            .bind(user_uuid)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(user = %user_uuid, removed = items + kits, "Cleared all carts");
        Ok(items + kits)
    }

    /// Removes one row if it belongs to `user_uuid`.
    pub async fn remove_own(
        &self,
        user_uuid: &str,
        kind: CartEntryKind,
        id: i64,
    ) -> DbResult<bool> {
        let sql = match kind {
            CartEntryKind::Product => "DELETE FROM cart_items WHERE id = ?1 AND user_uuid = ?2",
            CartEntryKind::Kit => "DELETE FROM cart_kits WHERE id = ?1 AND user_uuid = ?2",
        };

        let result = sqlx::query(sql)
            .bind(id)
            .bind(user_uuid)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes one row regardless of owner.
    pub async fn remove(&self, kind: CartEntryKind, id: i64) -> DbResult<bool> {
        let sql = match kind {
            CartEntryKind::Product => "DELETE FROM cart_items WHERE id = ?1",
            CartEntryKind::Kit => "DELETE FROM cart_kits WHERE id = ?1",
        };

        let result = sqlx::query(sql).bind(id).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes the rows a checkout consumed.
    ///
    /// Only the rows that were priced are removed; anything added after the
    /// cart was read stays in the cart.
    pub async fn delete_consumed(
        &self,
        conn: &mut SqliteConnection,
        items: &[CartItem],
        kits: &[CartKit],
    ) -> DbResult<()> {
        for item in items {
            sqlx::query("DELETE FROM cart_items WHERE id = ?1")
                .bind(item.id)
                .execute(&mut *conn)
                .await?;
        }
        for kit in kits {
            sqlx::query("DELETE FROM cart_kits WHERE id = ?1")
                .bind(kit.id)
                .execute(&mut *conn)
                .await?;
        }

        debug!(items = items.len(), kits = kits.len(), "Deleted consumed cart rows");
        Ok(())
    }
}
