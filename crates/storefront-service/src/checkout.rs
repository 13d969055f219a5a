//! # Checkout Engine
//!
//! Turns a user's cart on one server into warehouse stock, and runs the
//! administrative product and kit gives through the same path.
//!
//! ## Checkout States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Collected ──► Priced ──► Validated ──► Fulfilling ──► Fulfilled        │
//! │      │            │           │              │                          │
//! │      ▼            ▼           ▼              ▼                          │
//! │  ServerNotFound  InvalidPricing  InsufficientFunds  (rollback)          │
//! │  SubjectNotFound                                                        │
//! │                                                                         │
//! │  Collected   server, user, cart rows (under the user's lock)           │
//! │  Priced      Σ product lines + Σ kit prices; kits expanded             │
//! │  Validated   balance ≥ total, before any write                          │
//! │  Fulfilling  one transaction: debit, merges, history, cart rows gone    │
//! │  Fulfilled   commit; merged warehouse rows returned                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::ServiceResult;
use crate::fulfillment::{fulfill, Charge, Order};
use crate::locks::UserLocks;
use storefront_core::kit::{expand, expand_copies, VirtualLine};
use storefront_core::pricing::Quote;
use storefront_core::validation::{validate_amount, validate_server_id};
use storefront_core::{
    CoreError, GiveItemInput, GiveKitInput, HistoryEntry, HistoryKind, Kit, Server, User,
    WarehouseItem,
};
use storefront_db::Database;

/// Cart checkout and administrative item gives.
#[derive(Clone)]
pub struct CheckoutEngine {
    db: Database,
    locks: UserLocks,
    clock: Arc<dyn Clock>,
}

impl CheckoutEngine {
    pub fn new(db: Database, locks: UserLocks, clock: Arc<dyn Clock>) -> Self {
        CheckoutEngine { db, locks, clock }
    }

    /// Buys everything in the user's cart on `server_id`.
    ///
    /// An empty cart succeeds with nothing charged and nothing returned.
    ///
    /// ## Errors
    /// - `ServerNotFound` before anything else is looked at
    /// - `SubjectNotFound` for the user or a product/kit that no longer exists
    /// - `InsufficientFunds` when the total exceeds the balance; nothing changes
    pub async fn checkout(
        &self,
        user_uuid: &str,
        server_id: &str,
        ip: Option<&str>,
    ) -> ServiceResult<Vec<WarehouseItem>> {
        let server = self.server(server_id).await?;

        let _guard = self.locks.acquire(user_uuid).await;
        let user = self.user(user_uuid).await?;

        // Collected
        let carts = self.db.carts();
        let items = carts.items_for(&user.uuid, &server.id).await?;
        let kits = carts.kits_for(&user.uuid, &server.id).await?;

        if items.is_empty() && kits.is_empty() {
            debug!(user = %user.uuid, server = %server.id, "Checkout of empty cart");
            return Ok(Vec::new());
        }

        // Priced
        let mut quote = Quote::new();
        let mut lines: Vec<VirtualLine> = Vec::new();
        let mut history: Vec<HistoryEntry> = Vec::with_capacity(items.len() + kits.len());

        for item in &items {
            let product = self
                .db
                .catalog()
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| CoreError::subject_not_found("Product", item.product_id))?;

            quote.add_product(product.id, product.price(), product.discount_percent, item.amount)?;
            lines.push(VirtualLine::from(item));
            history.push(HistoryEntry {
                kind: HistoryKind::ProductPurchase,
                ip: ip.map(str::to_string),
                user_uuid: user.uuid.clone(),
                subject_id: product.id,
                server_id: server.id.clone(),
                extra: Some(json!({ "amount": item.amount })),
            });
        }

        let mut resolved: HashMap<i64, Kit> = HashMap::new();
        for row in &kits {
            if !resolved.contains_key(&row.kit_id) {
                let kit = self
                    .db
                    .catalog()
                    .get_kit(row.kit_id)
                    .await?
                    .ok_or_else(|| CoreError::subject_not_found("Kit", row.kit_id))?;
                resolved.insert(kit.id, kit);
            }
            let Some(kit) = resolved.get(&row.kit_id) else {
                continue;
            };

            quote.add_kit(kit.id, kit.price(), kit.discount_percent)?;
            lines.extend(expand(kit, &server.id, &user.uuid));
            history.push(HistoryEntry {
                kind: HistoryKind::KitPurchase,
                ip: ip.map(str::to_string),
                user_uuid: user.uuid.clone(),
                subject_id: kit.id,
                server_id: server.id.clone(),
                extra: None,
            });
        }

        // Validated
        if user.balance().checked_debit(quote.total).is_none() {
            warn!(
                user = %user.uuid,
                required = %quote.total,
                available = %user.balance(),
                "Checkout rejected: insufficient funds"
            );
            return Err(CoreError::InsufficientFunds {
                required: quote.total,
                available: user.balance(),
            }
            .into());
        }

        // Fulfilling
        let order = Order {
            user: &user,
            lines,
            charge: Charge::Balance(quote.total),
            history,
        };

        let mut tx = self.db.begin().await?;
        let merged = fulfill(&self.db, &mut tx, &order, self.clock.now()).await?;
        carts.delete_consumed(&mut tx, &items, &kits).await?;
        tx.commit().await?;

        // Fulfilled
        info!(
            user = %user.uuid,
            server = %server.id,
            products = items.len(),
            kits = kits.len(),
            total = %quote.total,
            "Checkout complete"
        );
        Ok(merged)
    }

    /// Gives `amount` of a product without charging.
    pub async fn give_item(
        &self,
        input: &GiveItemInput,
        ip: Option<&str>,
    ) -> ServiceResult<WarehouseItem> {
        validate_amount(input.amount)?;
        let server = self.give_target_server(&input.server_id).await?;

        let _guard = self.locks.acquire(&input.user_uuid).await;
        let user = self.user(&input.user_uuid).await?;
        let product = self
            .db
            .catalog()
            .get_product(input.product_id)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("Product", input.product_id))?;

        let order = Order {
            user: &user,
            lines: vec![VirtualLine {
                user_uuid: user.uuid.clone(),
                server_id: server.id.clone(),
                product_id: product.id,
                amount: input.amount,
            }],
            charge: Charge::Waived,
            history: vec![HistoryEntry {
                kind: HistoryKind::ProductGrant,
                ip: ip.map(str::to_string),
                user_uuid: user.uuid.clone(),
                subject_id: product.id,
                server_id: server.id.clone(),
                extra: Some(json!({ "amount": input.amount })),
            }],
        };

        let mut tx = self.db.begin().await?;
        let mut merged = fulfill(&self.db, &mut tx, &order, self.clock.now()).await?;
        tx.commit().await?;

        info!(
            user = %user.uuid,
            server = %server.id,
            product_id = product.id,
            amount = input.amount,
            "Product given"
        );
        merged
            .pop()
            .ok_or_else(|| CoreError::subject_not_found("WarehouseItem", product.id).into())
    }

    /// Gives `amount` copies of a kit without charging.
    ///
    /// One `kit_grant` record is written per give, whatever the copy count.
    pub async fn give_kit(
        &self,
        input: &GiveKitInput,
        ip: Option<&str>,
    ) -> ServiceResult<Vec<WarehouseItem>> {
        validate_amount(input.amount)?;
        let server = self.give_target_server(&input.server_id).await?;

        let _guard = self.locks.acquire(&input.user_uuid).await;
        let user = self.user(&input.user_uuid).await?;
        let kit = self
            .db
            .catalog()
            .get_kit(input.kit_id)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("Kit", input.kit_id))?;

        let order = Order {
            user: &user,
            lines: expand_copies(&kit, &server.id, &user.uuid, input.amount)?,
            charge: Charge::Waived,
            history: vec![HistoryEntry {
                kind: HistoryKind::KitGrant,
                ip: ip.map(str::to_string),
                user_uuid: user.uuid.clone(),
                subject_id: kit.id,
                server_id: server.id.clone(),
                extra: Some(json!({ "copies": input.amount })),
            }],
        };

        let mut tx = self.db.begin().await?;
        let merged = fulfill(&self.db, &mut tx, &order, self.clock.now()).await?;
        tx.commit().await?;

        info!(
            user = %user.uuid,
            server = %server.id,
            kit_id = kit.id,
            copies = input.amount,
            "Kit given"
        );
        Ok(merged)
    }

    /// The user's warehouse on one server.
    pub async fn warehouse(
        &self,
        user_uuid: &str,
        server_id: &str,
    ) -> ServiceResult<Vec<WarehouseItem>> {
        let server = self.server(server_id).await?;
        Ok(self.db.warehouse().list(user_uuid, &server.id).await?)
    }

    /// A malformed id cannot name a server, so it reports `ServerNotFound` too.
    async fn server(&self, server_id: &str) -> ServiceResult<Server> {
        if validate_server_id(server_id).is_err() {
            return Err(CoreError::ServerNotFound(server_id.to_string()).into());
        }
        self.db
            .catalog()
            .get_server(server_id)
            .await?
            .ok_or_else(|| CoreError::ServerNotFound(server_id.to_string()).into())
    }

    /// Gives report a missing server like any other missing subject.
    async fn give_target_server(&self, server_id: &str) -> ServiceResult<Server> {
        self.db
            .catalog()
            .get_server(server_id)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("Server", server_id).into())
    }

    async fn user(&self, user_uuid: &str) -> ServiceResult<User> {
        self.db
            .users()
            .get(user_uuid)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("User", user_uuid).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::testing::{fixture, Fixture};
    use storefront_core::{ErrorKind, Money, Product};

    async fn checkout(fx: &Fixture) -> ServiceResult<Vec<WarehouseItem>> {
        fx.store.checkout().checkout(&fx.user, "alpha", Some("127.0.0.1")).await
    }

    #[tokio::test]
    async fn test_checkout_products_then_kit() {
        let fx = fixture().await;
        let carts = fx.store.db().carts();

        // A: 50.00, 10% off, two units = 90.00
        carts.add_product(&fx.user, "alpha", fx.product_a, 2).await.unwrap();
        let merged = checkout(&fx).await.unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].amount, 2);
        assert_eq!(fx.store.ledger().balance(&fx.user).await.unwrap(), Money::from_units(10));
        assert!(carts.items_for(&fx.user, "alpha").await.unwrap().is_empty());

        // K: A×3 for 5.00
        carts.add_kit(&fx.user, "alpha", fx.kit).await.unwrap();
        let merged = checkout(&fx).await.unwrap();

        assert_eq!(merged[0].product_id, fx.product_a);
        assert_eq!(merged[0].amount, 5);
        assert_eq!(fx.store.ledger().balance(&fx.user).await.unwrap(), Money::from_units(5));
        assert!(carts.kits_for(&fx.user, "alpha").await.unwrap().is_empty());

        let stock = fx.store.checkout().warehouse(&fx.user, "alpha").await.unwrap();
        assert_eq!(stock.len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_changes_nothing() {
        let fx = fixture().await;
        let carts = fx.store.db().carts();

        // 3 × 45.00 = 135.00 > 100.00
        carts.add_product(&fx.user, "alpha", fx.product_a, 3).await.unwrap();
        let err = checkout(&fx).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientFunds { required, available })
                if required == Money::from_units(135) && available == Money::from_units(100)
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(fx.store.ledger().balance(&fx.user).await.unwrap(), Money::from_units(100));
        assert_eq!(carts.items_for(&fx.user, "alpha").await.unwrap()[0].amount, 3);
        assert!(fx.store.checkout().warehouse(&fx.user, "alpha").await.unwrap().is_empty());
        assert!(fx.store.db().history().list_for_user(&fx.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_total_overflow_is_rejected_without_charging() {
        let fx = fixture().await;
        let catalog = fx.store.db().catalog();
        let carts = fx.store.db().carts();

        for name in ["Star", "Moon"] {
            let product = catalog
                .insert_product(&Product {
                    id: 0,
                    name: name.to_string(),
                    price_cents: 5_000_000_000_000_000_000,
                    discount_percent: 0,
                    servers: vec!["alpha".to_string()],
                })
                .await
                .unwrap();
            carts.add_product(&fx.user, "alpha", product.id, 1).await.unwrap();
        }

        let err = checkout(&fx).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::InvalidPricingInput { .. })));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(fx.store.ledger().balance(&fx.user).await.unwrap(), Money::from_units(100));
        assert_eq!(carts.items_for(&fx.user, "alpha").await.unwrap().len(), 2);
        assert!(fx.store.db().history().list_for_user(&fx.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_has_one_record_per_kit() {
        let fx = fixture().await;
        let carts = fx.store.db().carts();

        carts.add_product(&fx.user, "alpha", fx.product_b, 4).await.unwrap();
        carts.add_kit(&fx.user, "alpha", fx.kit).await.unwrap();
        carts.add_kit(&fx.user, "alpha", fx.kit).await.unwrap();
        checkout(&fx).await.unwrap();

        let records = fx.store.db().history().list_for_user(&fx.user).await.unwrap();
        let kinds: Vec<_> = records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                HistoryKind::ProductPurchase,
                HistoryKind::KitPurchase,
                HistoryKind::KitPurchase
            ]
        );
        assert_eq!(records[0].extra.as_deref(), Some(r#"{"amount":4}"#));
        assert_eq!(records[0].ip.as_deref(), Some("127.0.0.1"));

        let a = fx
            .store
            .db()
            .warehouse()
            .get(&fx.user, "alpha", fx.product_a)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.amount, 6);
    }

    #[tokio::test]
    async fn test_empty_cart_checks_out() {
        let fx = fixture().await;
        assert!(checkout(&fx).await.unwrap().is_empty());
        assert_eq!(fx.store.ledger().balance(&fx.user).await.unwrap(), Money::from_units(100));
    }

    #[tokio::test]
    async fn test_unknown_server_comes_first() {
        let fx = fixture().await;
        let err = fx
            .store
            .checkout()
            .checkout("not-a-user", "gamma", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::ServerNotFound(ref s)) if s == "gamma"
        ));

        let err = fx.store.checkout().checkout(&fx.user, "", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::ServerNotFound(_))));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = fx.store.checkout().checkout("not-a-user", "alpha", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::SubjectNotFound { .. })));
    }

    #[tokio::test]
    async fn test_give_item_is_free_and_audited() {
        let fx = fixture().await;
        let engine = fx.store.checkout();

        let input = GiveItemInput {
            user_uuid: fx.user.clone(),
            server_id: "beta".to_string(),
            product_id: fx.product_a,
            amount: 7,
        };
        engine.give_item(&input, None).await.unwrap();
        let row = engine.give_item(&input, None).await.unwrap();

        assert_eq!(row.amount, 14);
        assert_eq!(row.server_id, "beta");
        assert_eq!(fx.store.ledger().balance(&fx.user).await.unwrap(), Money::from_units(100));

        let records = fx.store.db().history().list_for_user(&fx.user).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == HistoryKind::ProductGrant));
    }

    #[tokio::test]
    async fn test_give_kit_copies() {
        let fx = fixture().await;

        let merged = fx
            .store
            .checkout()
            .give_kit(
                &GiveKitInput {
                    user_uuid: fx.user.clone(),
                    server_id: "alpha".to_string(),
                    kit_id: fx.kit,
                    amount: 4,
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(merged[0].amount, 12);

        let records = fx.store.db().history().list_for_user(&fx.user).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, HistoryKind::KitGrant);
        assert_eq!(records[0].extra.as_deref(), Some(r#"{"copies":4}"#));
    }

    #[tokio::test]
    async fn test_give_rejects_unknown_subjects() {
        let fx = fixture().await;
        let engine = fx.store.checkout();

        let missing_product = GiveItemInput {
            user_uuid: fx.user.clone(),
            server_id: "alpha".to_string(),
            product_id: 9_999,
            amount: 1,
        };
        let err = engine.give_item(&missing_product, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let missing_server = GiveItemInput {
            server_id: "gamma".to_string(),
            product_id: fx.product_a,
            ..missing_product.clone()
        };
        let err = engine.give_item(&missing_server, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::SubjectNotFound { ref entity, .. }) if entity == "Server"
        ));

        let zero = GiveItemInput {
            amount: 0,
            ..missing_server
        };
        let err = engine.give_item(&zero, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
