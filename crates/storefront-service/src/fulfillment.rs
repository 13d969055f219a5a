//! # Fulfillment
//!
//! The one routine that turns priced lines into warehouse stock. Checkout
//! charges the balance; administrative gives waive the charge. Everything
//! else is shared.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order { user, lines, charge, history }                                 │
//! │       │                                                                 │
//! │       ▼            (inside the caller's transaction)                    │
//! │  1. charge   Balance(total) ──► debit_if_sufficient ──► InsufficientFunds│
//! │              Waived         ──► nothing                                 │
//! │  2. merge    every VirtualLine ──► warehouse upsert                     │
//! │  3. history  every HistoryEntry ──► audit log                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  merged WarehouseItems, one per product                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here commits. A failure at any step leaves the transaction to be
//! dropped, which rolls back the debit and every merge with it.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::warn;

use crate::error::ServiceResult;
use storefront_core::kit::VirtualLine;
use storefront_core::{CoreError, HistoryEntry, Money, User, WarehouseItem};
use storefront_db::Database;

/// How an order is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Debit the user's balance.
    Balance(Money),
    /// Administrative give.
    Waived,
}

/// Everything one fulfillment writes.
#[derive(Debug, Clone)]
pub struct Order<'a> {
    /// Snapshot read under the user's lock.
    pub user: &'a User,
    pub lines: Vec<VirtualLine>,
    pub charge: Charge,
    pub history: Vec<HistoryEntry>,
}

/// Debits the balance if the charge asks for it. Returns the new balance.
pub(crate) async fn apply_charge(
    db: &Database,
    conn: &mut SqliteConnection,
    user: &User,
    charge: Charge,
) -> ServiceResult<Option<Money>> {
    let total = match charge {
        Charge::Waived => return Ok(None),
        Charge::Balance(total) if total.is_zero() => return Ok(Some(user.balance())),
        Charge::Balance(total) => total,
    };

    match db.users().debit_if_sufficient(conn, &user.uuid, total).await? {
        Some(rest) => Ok(Some(rest)),
        None => {
            warn!(user = %user.uuid, required = %total, "Debit refused");
            Err(CoreError::InsufficientFunds {
                required: total,
                available: user.balance(),
            }
            .into())
        }
    }
}

/// Appends every history entry at `now`.
pub(crate) async fn record_all(
    db: &Database,
    conn: &mut SqliteConnection,
    entries: &[HistoryEntry],
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let history = db.history();
    for entry in entries {
        history.record(conn, entry, now).await?;
    }
    Ok(())
}

/// Charges, merges and records an order on `conn`.
///
/// When the same product arrives on several lines the returned row carries
/// the final merged amount, in order of first appearance.
pub async fn fulfill(
    db: &Database,
    conn: &mut SqliteConnection,
    order: &Order<'_>,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<WarehouseItem>> {
    apply_charge(db, conn, order.user, order.charge).await?;

    let warehouse = db.warehouse();
    let mut merged: Vec<WarehouseItem> = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        let item = warehouse.merge(conn, line).await?;
        match merged.iter_mut().find(|m| m.id == item.id) {
            Some(existing) => *existing = item,
            None => merged.push(item),
        }
    }

    record_all(db, conn, &order.history, now).await?;

    Ok(merged)
}
