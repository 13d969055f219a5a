//! # Repository Module
//!
//! Database repository implementations for the storefront.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  storefront-service                                                    │
//! │       │                                                                 │
//! │       │  db.warehouse().merge(&mut tx, &line)                          │
//! │       ▼                                                                 │
//! │  WarehouseRepository                                                   │
//! │  ├── list(&self, user, server)           ← pool                        │
//! │  ├── get(&self, user, server, product)   ← pool                        │
//! │  └── merge(&self, conn, line)            ← caller's transaction        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Reads go through the pool. Writes that belong to a unit of work take  │
//! │  `&mut SqliteConnection` so the caller decides when they commit.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`] - Servers, products, kits, donor groups, periods
//! - [`UserRepository`] - Accounts and the balance ledger
//! - [`CartRepository`] - Cart rows
//! - [`WarehouseRepository`] - Delivered stock
//! - [`GrantRepository`] - Donor group grants
//! - [`HistoryRepository`] - Audit log

pub mod cart;
pub mod catalog;
pub mod grant;
pub mod history;
pub mod user;
pub mod warehouse;

pub use cart::CartRepository;
pub use catalog::CatalogRepository;
pub use grant::GrantRepository;
pub use history::HistoryRepository;
pub use user::UserRepository;
pub use warehouse::WarehouseRepository;
