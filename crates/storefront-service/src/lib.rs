//! # storefront-service: Units of Work for the Storefront
//!
//! Every request that moves money, stock or entitlements runs here, as one
//! transaction under the user's lock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Architecture                          │
//! │                                                                         │
//! │  Request layer (out of tree)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              ★ storefront-service (THIS CRATE) ★                │   │
//! │  │                                                                 │   │
//! │  │  Storefront                                                     │   │
//! │  │  ├── CartService         add / view / clear / remove            │   │
//! │  │  ├── CheckoutEngine      checkout / give_item / give_kit        │   │
//! │  │  ├── EntitlementGranter  buy / give / take / list               │   │
//! │  │  ├── Ledger              balance / credit / transfer            │   │
//! │  │  └── EventBus            donor_group_granted                    │   │
//! │  │                                                                 │   │
//! │  │  shared: UserLocks • Clock • fulfillment routine                │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │                 ▼                              ▼                        │
//! │        storefront-core                  storefront-db                   │
//! │   (pricing, kits, grant rules)     (SQLite, repositories)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_service::{init_tracing, StoreConfig, Storefront};
//!
//! init_tracing();
//! let store = Storefront::open(&StoreConfig::load()?).await?;
//!
//! store.carts().add(&user, &input).await?;
//! let stock = store.checkout().checkout(&user, "survival", Some(ip)).await?;
//! ```

pub mod cart;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod fulfillment;
pub mod granter;
pub mod ledger;
pub mod locks;

pub use cart::{CartService, CartView};
pub use checkout::CheckoutEngine;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, StoreConfig};
pub use error::{ServiceError, ServiceResult};
pub use events::{EventBus, StoreEvent};
pub use granter::EntitlementGranter;
pub use ledger::Ledger;
pub use locks::UserLocks;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use storefront_db::Database;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,storefront=debug,sqlx=warn";

/// Installs the global `tracing` subscriber.
///
/// Reads `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]. Calling it a
/// second time is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Err means a subscriber is already installed
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// The engine with all of its services wired to one database.
///
/// Every service shares the same [`UserLocks`], so a checkout and a donor
/// group purchase for the same user never interleave.
#[derive(Clone)]
pub struct Storefront {
    db: Database,
    carts: CartService,
    checkout: CheckoutEngine,
    granter: EntitlementGranter,
    ledger: Ledger,
    events: EventBus,
}

impl Storefront {
    /// Opens (and migrates) the configured database.
    pub async fn open(config: &StoreConfig) -> ServiceResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(Storefront::new(db, config, Arc::new(SystemClock)))
    }

    pub fn new(db: Database, config: &StoreConfig, clock: Arc<dyn Clock>) -> Self {
        let locks = UserLocks::new();
        let events = EventBus::new(config.event_capacity);

        Storefront {
            carts: CartService::new(db.clone(), locks.clone()),
            checkout: CheckoutEngine::new(db.clone(), locks.clone(), clock.clone()),
            granter: EntitlementGranter::new(
                db.clone(),
                locks.clone(),
                clock.clone(),
                events.clone(),
                config.permanent_grants,
            ),
            ledger: Ledger::new(db.clone(), locks, clock),
            events,
            db,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn carts(&self) -> &CartService {
        &self.carts
    }

    pub fn checkout(&self) -> &CheckoutEngine {
        &self.checkout
    }

    pub fn granter(&self) -> &EntitlementGranter {
        &self.granter
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Receives every [`StoreEvent`] published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
