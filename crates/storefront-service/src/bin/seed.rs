//! # Seed Data Generator
//!
//! Populates a development database with a small catalog and one funded
//! user.
//!
//! ## Usage
//! ```bash
//! # Seed ./storefront.db (or $STOREFRONT_DB_PATH)
//! cargo run -p storefront-service --bin seed
//!
//! # Specify database path and the opening balance in whole units
//! cargo run -p storefront-service --bin seed -- --db ./data/shop.db --balance 500
//! ```
//!
//! ## Generated Catalog
//! - Servers: `survival`, `creative`, `skyblock`
//! - One product per material, sold on every server
//! - Starter and builder kits
//! - Day, month and forever periods; VIP and Legend donor groups

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::info;
use uuid::Uuid;

use storefront_core::validation::{
    validate_discount_percent, validate_duration_secs, validate_name, validate_price_cents,
};
use storefront_core::{DonorGroup, Kit, KitItem, Money, Period, Product, Server};
use storefront_db::Database;
use storefront_service::{init_tracing, StoreConfig};

const SERVERS: &[(&str, &str)] = &[
    ("survival", "Survival"),
    ("creative", "Creative"),
    ("skyblock", "Skyblock"),
];

/// Name, price in cents, discount percent.
const PRODUCTS: &[(&str, i64, u32)] = &[
    ("Diamond", 5_000, 10),
    ("Emerald", 2_500, 0),
    ("Gold Ingot", 800, 0),
    ("Iron Ingot", 200, 0),
    ("Netherite Ingot", 12_000, 15),
    ("Enchanted Apple", 1_500, 5),
    ("Ender Pearl", 300, 0),
    ("Elytra", 20_000, 20),
];

/// Name, multiplier in basis points, duration in seconds.
const PERIODS: &[(&str, u32, Option<i64>)] = &[
    ("Day", 10_000, Some(DAY)),
    ("Month", 25_000, Some(30 * DAY)),
    ("Forever", 100_000, None),
];

const DAY: i64 = 86_400;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut config = StoreConfig::load().context("reading STOREFRONT_* environment")?;
    let mut balance_units: i64 = 1_000;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                let path = args.get(i + 1).context("--db needs a path")?;
                config.db_path = PathBuf::from(path);
                i += 1;
            }
            "--balance" | "-b" => {
                let raw = args.get(i + 1).context("--balance needs a value")?;
                balance_units = raw.parse().with_context(|| format!("invalid balance: {raw}"))?;
                i += 1;
            }
            "--help" | "-h" => {
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!(
                    "  -d, --db <PATH>       Database file path (default: {})",
                    config.db_path.display()
                );
                println!("  -b, --balance <N>     Opening balance of the seeded user");
                println!("                        (default: 1000)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    let db = Database::new(config.db_config())
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    info!(path = %config.db_path.display(), "Connected and migrated");

    let catalog = db.catalog();
    let existing = catalog.list_servers().await?;
    if !existing.is_empty() {
        info!(servers = existing.len(), "Database already seeded, skipping");
        println!("Database already has {} servers; delete it to regenerate.", existing.len());
        return Ok(());
    }

    let all_servers: Vec<String> = SERVERS.iter().map(|(id, _)| id.to_string()).collect();
    for (id, name) in SERVERS {
        catalog
            .insert_server(&Server {
                id: id.to_string(),
                name: name.to_string(),
            })
            .await?;
    }

    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (name, price_cents, discount_percent) in PRODUCTS {
        validate_name(name)?;
        validate_price_cents(*price_cents)?;
        validate_discount_percent(*discount_percent)?;

        let product = catalog
            .insert_product(&Product {
                id: 0,
                name: name.to_string(),
                price_cents: *price_cents,
                discount_percent: *discount_percent,
                servers: all_servers.clone(),
            })
            .await?;
        products.push(product);
    }

    let kit = |name: &str, price_cents: i64, items: Vec<KitItem>| Kit {
        id: 0,
        name: name.to_string(),
        price_cents,
        discount_percent: 0,
        servers: all_servers.clone(),
        items,
    };
    let item = |index: usize, amount: i64| KitItem {
        product_id: products[index].id,
        amount,
    };
    catalog
        .insert_kit(&kit("Starter", 500, vec![item(3, 16), item(2, 4), item(6, 2)]))
        .await?;
    catalog
        .insert_kit(&kit("Builder", 4_000, vec![item(0, 8), item(1, 8), item(4, 1)]))
        .await?;

    let mut periods = Vec::with_capacity(PERIODS.len());
    for (name, multiplier_bps, duration_secs) in PERIODS {
        validate_duration_secs(*duration_secs)?;
        let period = catalog
            .insert_period(&Period {
                id: 0,
                name: name.to_string(),
                multiplier_bps: *multiplier_bps,
                duration_secs: *duration_secs,
            })
            .await?;
        periods.push(period.id);
    }

    for (name, price_cents, servers) in [
        ("VIP", 1_000, all_servers.clone()),
        ("Legend", 3_000, vec!["survival".to_string()]),
    ] {
        catalog
            .insert_group(&DonorGroup {
                id: 0,
                name: name.to_string(),
                price_cents,
                discount_percent: 0,
                servers,
                periods: periods.clone(),
            })
            .await?;
    }

    let uuid = Uuid::new_v4().to_string();
    let user = db.users().insert(&uuid, "steve", Money::from_units(balance_units)).await?;

    info!(
        servers = SERVERS.len(),
        products = PRODUCTS.len(),
        periods = PERIODS.len(),
        "Seed complete"
    );
    println!("Seeded user {} ({}) with balance {}", user.username, user.uuid, user.balance());

    Ok(())
}
