//! # Catalog Repository
//!
//! Read-side resolvers for servers, products, kits, donor groups and
//! periods, plus the insert helpers the seed binary and tests use.
//!
//! ## Eligibility Tables
//! ```text
//! products ──< product_servers >── servers
//! kits ──────< kit_servers >────── servers
//! kits ──────< kit_items (position, product_id, amount)
//! donor_groups ──< donor_group_servers >── servers
//! donor_groups ──< donor_group_periods >── periods
//! ```
//!
//! Every resolver fills the join-table collections (`servers`, `items`,
//! `periods`) so callers can check eligibility without another round trip.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use storefront_core::{DonorGroup, Kit, KitItem, Period, Product, Server};

/// Repository for catalog reference data.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Servers
    // =========================================================================

    pub async fn get_server(&self, id: &str) -> DbResult<Option<Server>> {
        let server = sqlx::query_as::<_, Server>("SELECT id, name FROM servers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(server)
    }

    pub async fn list_servers(&self) -> DbResult<Vec<Server>> {
        let servers = sqlx::query_as::<_, Server>("SELECT id, name FROM servers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(servers)
    }

    pub async fn insert_server(&self, server: &Server) -> DbResult<()> {
        debug!(id = %server.id, "Inserting server");

        sqlx::query("INSERT INTO servers (id, name) VALUES (?1, ?2)")
            .bind(&server.id)
            .bind(&server.name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Resolves a product with its eligible servers.
    pub async fn get_product(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price_cents, discount_percent
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut product) = product else {
            return Ok(None);
        };
        product.servers = self.servers_of("product_servers", "product_id", id).await?;

        Ok(Some(product))
    }

    /// Inserts a product and its server links. Returns it with the new id.
    pub async fn insert_product(&self, product: &Product) -> DbResult<Product> {
        debug!(name = %product.name, "Inserting product");

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (name, price_cents, discount_percent)
            VALUES (?1, ?2, ?3)
            RETURNING id
            "#,
        )
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.discount_percent)
        .fetch_one(&mut *tx)
        .await?;

        link_servers(&mut tx, "product_servers", "product_id", id, &product.servers).await?;
        tx.commit().await?;

        Ok(Product {
            id,
            ..product.clone()
        })
    }

    // =========================================================================
    // Kits
    // =========================================================================

    /// Resolves a kit with its eligible servers and ordered entries.
    pub async fn get_kit(&self, id: i64) -> DbResult<Option<Kit>> {
        let kit = sqlx::query_as::<_, Kit>(
            r#"
            SELECT id, name, price_cents, discount_percent
            FROM kits
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut kit) = kit else {
            return Ok(None);
        };
        kit.servers = self.servers_of("kit_servers", "kit_id", id).await?;
        kit.items = sqlx::query_as::<_, KitItem>(
            r#"
            SELECT product_id, amount
            FROM kit_items
            WHERE kit_id = ?1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(kit))
    }

    /// Inserts a kit with its server links and entries.
    pub async fn insert_kit(&self, kit: &Kit) -> DbResult<Kit> {
        debug!(name = %kit.name, entries = kit.items.len(), "Inserting kit");

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO kits (name, price_cents, discount_percent)
            VALUES (?1, ?2, ?3)
            RETURNING id
            "#,
        )
        .bind(&kit.name)
        .bind(kit.price_cents)
        .bind(kit.discount_percent)
        .fetch_one(&mut *tx)
        .await?;

        link_servers(&mut tx, "kit_servers", "kit_id", id, &kit.servers).await?;

        for (position, item) in kit.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO kit_items (kit_id, position, product_id, amount)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(id)
            .bind(position as i64)
            .bind(item.product_id)
            .bind(item.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Kit { id, ..kit.clone() })
    }

    // =========================================================================
    // Donor Groups and Periods
    // =========================================================================

    /// Resolves a donor group with its servers and offered periods.
    pub async fn get_group(&self, id: i64) -> DbResult<Option<DonorGroup>> {
        let group = sqlx::query_as::<_, DonorGroup>(
            r#"
            SELECT id, name, price_cents, discount_percent
            FROM donor_groups
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut group) = group else {
            return Ok(None);
        };
        group.servers = self.servers_of("donor_group_servers", "group_id", id).await?;
        group.periods = sqlx::query_scalar(
            "SELECT period_id FROM donor_group_periods WHERE group_id = ?1 ORDER BY period_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(group))
    }

    pub async fn insert_group(&self, group: &DonorGroup) -> DbResult<DonorGroup> {
        debug!(name = %group.name, "Inserting donor group");

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO donor_groups (name, price_cents, discount_percent)
            VALUES (?1, ?2, ?3)
            RETURNING id
            "#,
        )
        .bind(&group.name)
        .bind(group.price_cents)
        .bind(group.discount_percent)
        .fetch_one(&mut *tx)
        .await?;

        link_servers(&mut tx, "donor_group_servers", "group_id", id, &group.servers).await?;

        for period_id in &group.periods {
            sqlx::query("INSERT INTO donor_group_periods (group_id, period_id) VALUES (?1, ?2)")
                .bind(id)
                .bind(period_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(DonorGroup {
            id,
            ..group.clone()
        })
    }

    pub async fn get_period(&self, id: i64) -> DbResult<Option<Period>> {
        let period = sqlx::query_as::<_, Period>(
            r#"
            SELECT id, name, multiplier_bps, duration_secs
            FROM periods
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(period)
    }

    pub async fn insert_period(&self, period: &Period) -> DbResult<Period> {
        debug!(name = %period.name, duration_secs = ?period.duration_secs, "Inserting period");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO periods (name, multiplier_bps, duration_secs)
            VALUES (?1, ?2, ?3)
            RETURNING id
            "#,
        )
        .bind(&period.name)
        .bind(period.multiplier_bps)
        .bind(period.duration_secs)
        .fetch_one(&self.pool)
        .await?;

        Ok(Period {
            id,
            ..period.clone()
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// `table` and `column` are compile-time constants of this module.
    async fn servers_of(&self, table: &str, column: &str, id: i64) -> DbResult<Vec<String>> {
        let sql = format!("SELECT server_id FROM {table} WHERE {column} = ?1 ORDER BY server_id");
        let servers = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(servers)
    }
}

async fn link_servers(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    id: i64,
    servers: &[String],
) -> DbResult<()> {
    let sql = format!("INSERT INTO {table} ({column}, server_id) VALUES (?1, ?2)");
    for server_id in servers {
        sqlx::query(&sql)
            .bind(id)
            .bind(server_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db_with_servers() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for id in ["alpha", "beta"] {
            db.catalog()
                .insert_server(&Server {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                })
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_product_round_trip_with_servers() {
        let db = db_with_servers().await;
        let inserted = db
            .catalog()
            .insert_product(&Product {
                id: 0,
                name: "Diamond".to_string(),
                price_cents: 5_000,
                discount_percent: 10,
                servers: vec!["alpha".to_string()],
            })
            .await
            .unwrap();

        let loaded = db.catalog().get_product(inserted.id).await.unwrap().unwrap();
        assert_eq!(loaded.discount_percent, 10);
        assert!(loaded.is_sold_on("alpha"));
        assert!(!loaded.is_sold_on("beta"));

        assert!(db.catalog().get_product(9_999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_kit_items_keep_position_order() {
        let db = db_with_servers().await;
        let catalog = db.catalog();

        let mut ids = Vec::new();
        for name in ["Sword", "Bread"] {
            let product = catalog
                .insert_product(&Product {
                    id: 0,
                    name: name.to_string(),
                    price_cents: 100,
                    discount_percent: 0,
                    servers: vec![],
                })
                .await
                .unwrap();
            ids.push(product.id);
        }

        let kit = catalog
            .insert_kit(&Kit {
                id: 0,
                name: "Starter".to_string(),
                price_cents: 500,
                discount_percent: 0,
                servers: vec!["alpha".to_string(), "beta".to_string()],
                items: vec![
                    KitItem {
                        product_id: ids[1],
                        amount: 16,
                    },
                    KitItem {
                        product_id: ids[0],
                        amount: 1,
                    },
                ],
            })
            .await
            .unwrap();

        let loaded = catalog.get_kit(kit.id).await.unwrap().unwrap();
        assert_eq!(loaded.items[0].product_id, ids[1]);
        assert_eq!(loaded.items[1].amount, 1);
        assert_eq!(loaded.servers, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn test_group_and_period() {
        let db = db_with_servers().await;
        let catalog = db.catalog();

        let month = catalog
            .insert_period(&Period {
                id: 0,
                name: "Month".to_string(),
                multiplier_bps: 10_000,
                duration_secs: Some(30 * 86_400),
            })
            .await
            .unwrap();
        let forever = catalog
            .insert_period(&Period {
                id: 0,
                name: "Forever".to_string(),
                multiplier_bps: 50_000,
                duration_secs: None,
            })
            .await
            .unwrap();

        let group = catalog
            .insert_group(&DonorGroup {
                id: 0,
                name: "VIP".to_string(),
                price_cents: 10_000,
                discount_percent: 0,
                servers: vec!["beta".to_string()],
                periods: vec![month.id, forever.id],
            })
            .await
            .unwrap();

        let loaded = catalog.get_group(group.id).await.unwrap().unwrap();
        assert!(loaded.offers_period(forever.id));
        assert!(loaded.is_sold_on("beta"));

        let period = catalog.get_period(forever.id).await.unwrap().unwrap();
        assert_eq!(period.duration_secs, None);
        assert_eq!(period.multiplier_bps, 50_000);
    }
}
