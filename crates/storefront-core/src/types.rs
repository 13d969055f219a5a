//! # Domain Types
//!
//! Core domain types used throughout the storefront.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Reference data (read-only here)                                        │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐           │
//! │  │  Product   │ │    Kit     │ │ DonorGroup │ │   Period   │           │
//! │  │  price     │ │  price     │ │  price     │ │ multiplier │           │
//! │  │  discount% │ │  discount% │ │  discount% │ │ duration?  │           │
//! │  │  servers   │ │  items[]   │ │  periods   │ └────────────┘           │
//! │  └────────────┘ └────────────┘ └────────────┘                          │
//! │                                                                         │
//! │  Owned by the fulfillment engine                                        │
//! │  ┌────────────┐ ┌────────────┐ ┌──────────────┐ ┌──────────────┐      │
//! │  │ CartItem   │ │  CartKit   │ │WarehouseItem │ │ DonorGrant   │      │
//! │  │ (consumed) │ │ (consumed) │ │ (additive)   │ │ (extended)   │      │
//! │  └────────────┘ └────────────┘ └──────────────┘ └──────────────┘      │
//! │                                                                         │
//! │  User.real_cents (balance) ─ debited        HistoryRecord ─ appended   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Composite Keys
//! Cart items, warehouse items and donor grants are unique per
//! `(user_uuid, server_id, product_id | group_id)`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::pricing::Multiplier;
use crate::validation::validate_duration_secs;

// =============================================================================
// Users and Servers
// =============================================================================

/// A storefront account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    /// Account UUID.
    pub uuid: String,

    pub username: String,

    /// Spendable balance in minor units. Never negative.
    pub real_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns the balance as Money.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.real_cents)
    }
}

/// A game server. Everything bought is scoped to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Server {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Catalog
// =============================================================================

/// A product sold per unit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub name: String,

    /// Base price per unit in minor units.
    pub price_cents: i64,

    /// Whole-percent discount, 0-100.
    pub discount_percent: u32,

    /// Servers this product is sold on.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub servers: Vec<String>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn is_sold_on(&self, server_id: &str) -> bool {
        self.servers.iter().any(|s| s == server_id)
    }
}

/// One entry of a kit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct KitItem {
    pub product_id: i64,
    pub amount: i64,
}

/// A bundle of products sold as one SKU.
///
/// The kit's own price and discount are authoritative; the prices of the
/// products inside it are never consulted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Kit {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub discount_percent: u32,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub servers: Vec<String>,

    /// Entries in display order.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<KitItem>,
}

impl Kit {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn is_sold_on(&self, server_id: &str) -> bool {
        self.servers.iter().any(|s| s == server_id)
    }
}

/// A purchasable membership tier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DonorGroup {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub discount_percent: u32,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub servers: Vec<String>,

    /// Ids of the periods this group can be bought for.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub periods: Vec<i64>,
}

impl DonorGroup {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    pub fn is_sold_on(&self, server_id: &str) -> bool {
        self.servers.iter().any(|s| s == server_id)
    }

    pub fn offers_period(&self, period_id: i64) -> bool {
        self.periods.contains(&period_id)
    }
}

/// Duration and price multiplier of a donor group purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Period {
    pub id: i64,
    pub name: String,

    /// 10 000 = ×1.0
    pub multiplier_bps: u32,

    /// `None` means the grant never expires.
    pub duration_secs: Option<i64>,
}

impl Period {
    #[inline]
    pub fn multiplier(&self) -> Multiplier {
        Multiplier::from_bps(self.multiplier_bps)
    }

    /// Length of the period, `None` for permanent.
    ///
    /// ## Errors
    /// `Validation` when the stored duration is not positive or longer than
    /// `MAX_DURATION_SECS`.
    pub fn duration(&self) -> CoreResult<Option<Duration>> {
        validate_duration_secs(self.duration_secs)?;
        Ok(self.duration_secs.and_then(Duration::try_seconds))
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A product waiting in a cart. Unique per (user, server, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartItem {
    pub id: i64,
    pub user_uuid: String,
    pub server_id: String,
    pub product_id: i64,
    pub amount: i64,
}

/// A kit selection. Each row is one purchase of the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartKit {
    pub id: i64,
    pub user_uuid: String,
    pub server_id: String,
    pub kit_id: i64,
}

/// Which cart table an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CartEntryKind {
    Product,
    Kit,
}

/// A cart row of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CartEntry {
    Product(CartItem),
    Kit(CartKit),
}

// =============================================================================
// Warehouse and Grants
// =============================================================================

/// Delivered stock of one product for one user on one server.
///
/// ## Invariants
/// - At most one row per (user, server, product)
/// - `amount` only grows through fulfillment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WarehouseItem {
    pub id: i64,
    pub user_uuid: String,
    pub server_id: String,
    pub product_id: i64,
    pub amount: i64,
}

/// A donor group membership.
///
/// `expires_at = None` is a permanent grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DonorGrant {
    pub id: i64,
    pub user_uuid: String,
    pub server_id: String,
    pub group_id: i64,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// History
// =============================================================================

/// What a history record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    ProductPurchase,
    KitPurchase,
    DonorGroupPurchase,
    ProductGrant,
    KitGrant,
    DonorGroupGrant,
    /// Balance sent to another user. No subject, no server.
    TransferOut,
    TransferIn,
}

impl HistoryKind {
    /// `true` for records paid from the user's balance.
    pub fn is_purchase(&self) -> bool {
        matches!(
            self,
            HistoryKind::ProductPurchase
                | HistoryKind::KitPurchase
                | HistoryKind::DonorGroupPurchase
        )
    }
}

/// A stored audit record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct HistoryRecord {
    pub id: i64,
    pub kind: HistoryKind,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_uuid: String,
    /// Product, kit or donor group id, depending on `kind`; 0 for transfers.
    pub subject_id: i64,
    pub server_id: String,
    /// JSON payload (amount, period, copies, transfer counterpart).
    pub extra: Option<String>,
}

/// An audit record about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    pub ip: Option<String>,
    pub user_uuid: String,
    pub subject_id: i64,
    pub server_id: String,
    pub extra: Option<serde_json::Value>,
}

// =============================================================================
// Request Inputs
// =============================================================================

/// Add something to a cart.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartInput {
    #[serde(rename = "type")]
    pub kind: CartEntryKind,
    /// Product or kit id.
    pub id: i64,
    pub server_id: String,
    /// Ignored for kits.
    #[serde(default = "default_amount")]
    pub amount: i64,
}

/// Administrative product give.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GiveItemInput {
    pub user_uuid: String,
    pub server_id: String,
    pub product_id: i64,
    pub amount: i64,
}

/// Administrative kit give; `amount` is the number of copies.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GiveKitInput {
    pub user_uuid: String,
    pub server_id: String,
    pub kit_id: i64,
    #[serde(default = "default_amount")]
    pub amount: i64,
}

/// Administrative donor group grant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GiveDonorGroupInput {
    pub user_uuid: String,
    pub server_id: String,
    pub group_id: i64,
    pub period_id: i64,
}

/// Donor group purchase by the user.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DonorGroupBuyInput {
    pub group_id: i64,
    pub server_id: String,
    pub period_id: i64,
}

fn default_amount() -> i64 {
    1
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_period_duration() {
        let period = Period {
            id: 1,
            name: "Day".to_string(),
            multiplier_bps: 10_000,
            duration_secs: Some(86_400),
        };
        assert_eq!(period.duration().unwrap(), Some(Duration::days(1)));
        assert_eq!(period.multiplier(), Multiplier::one());

        let forever = Period {
            duration_secs: None,
            ..period.clone()
        };
        assert_eq!(forever.duration().unwrap(), None);

        let endless = Period {
            duration_secs: Some(10_000_000_000_000),
            ..period
        };
        assert!(matches!(endless.duration(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_history_kind_purchase_flag() {
        assert!(HistoryKind::KitPurchase.is_purchase());
        assert!(!HistoryKind::KitGrant.is_purchase());
        assert_eq!(
            serde_json::to_string(&HistoryKind::DonorGroupPurchase).unwrap(),
            "\"donor_group_purchase\""
        );
    }

    #[test]
    fn test_cart_input_defaults_amount() {
        let input: CartInput =
            serde_json::from_str(r#"{"type":"kit","id":4,"server_id":"alpha"}"#).unwrap();
        assert_eq!(input.kind, CartEntryKind::Kit);
        assert_eq!(input.amount, 1);
    }

    #[test]
    fn test_group_eligibility() {
        let group = DonorGroup {
            id: 1,
            name: "VIP".to_string(),
            price_cents: 10_000,
            discount_percent: 0,
            servers: vec!["alpha".to_string()],
            periods: vec![2, 3],
        };
        assert!(group.is_sold_on("alpha"));
        assert!(!group.is_sold_on("beta"));
        assert!(group.offers_period(3));
        assert!(!group.offers_period(1));
    }
}
