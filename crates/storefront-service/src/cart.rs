//! # Cart Service
//!
//! Adding, viewing and removing cart rows. Checkout lives in
//! [`crate::checkout`].
//!
//! ```text
//! add(product, 2) ──► cart_items (alice, alpha, A, 2)
//! add(product, 3) ──► cart_items (alice, alpha, A, 5)     merged
//! add(kit)        ──► cart_kits  (alice, alpha, K)
//! add(kit)        ──► cart_kits  (alice, alpha, K)        one row per selection
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ServiceResult;
use crate::locks::UserLocks;
use storefront_core::pricing::Quote;
use storefront_core::validation::{validate_amount, validate_server_id};
use storefront_core::{
    CartEntry, CartEntryKind, CartInput, CoreError, Server, ValidationError, MAX_LINE_AMOUNT,
};
use storefront_db::Database;

/// A user's cart on one server, priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    /// Kit selections first, then products.
    pub entries: Vec<CartEntry>,
    pub quote: Quote,
}

#[derive(Clone)]
pub struct CartService {
    db: Database,
    locks: UserLocks,
}

impl CartService {
    pub fn new(db: Database, locks: UserLocks) -> Self {
        CartService { db, locks }
    }

    /// Adds a product (merged by key) or a kit selection (always a new row).
    ///
    /// ## Errors
    /// - `InvalidInput` for a non-positive product amount, or one that would
    ///   take the merged row past `MAX_LINE_AMOUNT`
    /// - `ServerNotFound`, then `SubjectNotFound` for the product or kit
    /// - `NotEligible` when the item is not sold on the server
    pub async fn add(&self, user_uuid: &str, input: &CartInput) -> ServiceResult<CartEntry> {
        let server = self.server(&input.server_id).await?;
        let catalog = self.db.catalog();

        match input.kind {
            CartEntryKind::Product => {
                validate_amount(input.amount)?;
                let product = catalog
                    .get_product(input.id)
                    .await?
                    .ok_or_else(|| CoreError::subject_not_found("Product", input.id))?;
                if !product.is_sold_on(&server.id) {
                    return Err(CoreError::not_eligible("Product", product.id, &server.id).into());
                }

                let _guard = self.locks.acquire(user_uuid).await;
                let item = self
                    .db
                    .carts()
                    .add_product(user_uuid, &server.id, product.id, input.amount)
                    .await?
                    .ok_or_else(|| ValidationError::OutOfRange {
                        field: "amount".to_string(),
                        min: 1,
                        max: MAX_LINE_AMOUNT,
                    })?;
                debug!(
                    user = %user_uuid,
                    server = %server.id,
                    product_id = product.id,
                    amount = item.amount,
                    "Cart product added"
                );
                Ok(CartEntry::Product(item))
            }
            CartEntryKind::Kit => {
                let kit = catalog
                    .get_kit(input.id)
                    .await?
                    .ok_or_else(|| CoreError::subject_not_found("Kit", input.id))?;
                if !kit.is_sold_on(&server.id) {
                    return Err(CoreError::not_eligible("Kit", kit.id, &server.id).into());
                }

                let _guard = self.locks.acquire(user_uuid).await;
                let row = self.db.carts().add_kit(user_uuid, &server.id, kit.id).await?;
                debug!(user = %user_uuid, server = %server.id, kit_id = kit.id, "Cart kit added");
                Ok(CartEntry::Kit(row))
            }
        }
    }

    /// The cart on one server with the price checkout would charge.
    pub async fn view(&self, user_uuid: &str, server_id: &str) -> ServiceResult<CartView> {
        let server = self.server(server_id).await?;
        let catalog = self.db.catalog();
        let carts = self.db.carts();

        let kits = carts.kits_for(user_uuid, &server.id).await?;
        let items = carts.items_for(user_uuid, &server.id).await?;

        let mut quote = Quote::new();
        let mut entries = Vec::with_capacity(kits.len() + items.len());

        for row in kits {
            let kit = catalog
                .get_kit(row.kit_id)
                .await?
                .ok_or_else(|| CoreError::subject_not_found("Kit", row.kit_id))?;
            quote.add_kit(kit.id, kit.price(), kit.discount_percent)?;
            entries.push(CartEntry::Kit(row));
        }
        for item in items {
            let product = catalog
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| CoreError::subject_not_found("Product", item.product_id))?;
            quote.add_product(product.id, product.price(), product.discount_percent, item.amount)?;
            entries.push(CartEntry::Product(item));
        }

        Ok(CartView { entries, quote })
    }

    /// Empties the user's cart on one server.
    pub async fn clear_own(&self, user_uuid: &str, server_id: &str) -> ServiceResult<u64> {
        let server = self.server(server_id).await?;
        let _guard = self.locks.acquire(user_uuid).await;
        let removed = self.db.carts().clear_for(user_uuid, &server.id).await?;
        info!(user = %user_uuid, server = %server.id, removed, "Cart cleared");
        Ok(removed)
    }

    /// Empties every cart of a user.
    pub async fn clear(&self, user_uuid: &str) -> ServiceResult<u64> {
        let _guard = self.locks.acquire(user_uuid).await;
        let removed = self.db.carts().clear_all(user_uuid).await?;
        info!(user = %user_uuid, removed, "All carts cleared");
        Ok(removed)
    }

    /// Removes one of the user's own rows.
    pub async fn remove_own(
        &self,
        user_uuid: &str,
        kind: CartEntryKind,
        id: i64,
    ) -> ServiceResult<()> {
        let _guard = self.locks.acquire(user_uuid).await;
        if !self.db.carts().remove_own(user_uuid, kind, id).await? {
            return Err(CoreError::CartEntryNotFound(id).into());
        }
        Ok(())
    }

    /// Removes any row by id.
    pub async fn remove(&self, kind: CartEntryKind, id: i64) -> ServiceResult<()> {
        if !self.db.carts().remove(kind, id).await? {
            return Err(CoreError::CartEntryNotFound(id).into());
        }
        Ok(())
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::testing::fixture;
    use storefront_core::{ErrorKind, Money};

    fn product(id: i64, amount: i64) -> CartInput {
        CartInput {
            kind: CartEntryKind::Product,
            id,
            server_id: "alpha".to_string(),
            amount,
        }
    }

    fn kit(id: i64) -> CartInput {
        CartInput {
            kind: CartEntryKind::Kit,
            id,
            server_id: "alpha".to_string(),
            amount: 1,
        }
    }

    #[tokio::test]
    async fn test_add_and_view() {
        let fx = fixture().await;
        let carts = fx.store.carts();

        carts.add(&fx.user, &product(fx.product_a, 1)).await.unwrap();
        carts.add(&fx.user, &product(fx.product_a, 1)).await.unwrap();
        carts.add(&fx.user, &kit(fx.kit)).await.unwrap();

        let view = carts.view(&fx.user, "alpha").await.unwrap();
        assert_eq!(view.entries.len(), 2);
        assert!(matches!(view.entries[0], CartEntry::Kit(_)));
        assert!(matches!(&view.entries[1], CartEntry::Product(item) if item.amount == 2));
        // 2 × 45.00 + 5.00
        assert_eq!(view.quote.total, Money::from_units(95));
    }

    #[tokio::test]
    async fn test_add_rejections() {
        let fx = fixture().await;
        let carts = fx.store.carts();

        let err = carts.add(&fx.user, &product(fx.product_a, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = carts.add(&fx.user, &product(9_999, 1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let elsewhere = CartInput {
            server_id: "beta".to_string(),
            ..kit(fx.kit)
        };
        let err = carts.add(&fx.user, &elsewhere).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::NotEligible { .. })));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let nowhere = CartInput {
            server_id: "gamma".to_string(),
            ..product(fx.product_a, 1)
        };
        let err = carts.add(&fx.user, &nowhere).await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::ServerNotFound(_))));

        let malformed = CartInput {
            server_id: "no such/server".to_string(),
            ..product(fx.product_a, 1)
        };
        let err = carts.add(&fx.user, &malformed).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::ServerNotFound(ref s)) if s == "no such/server"
        ));
    }

    #[tokio::test]
    async fn test_merged_amount_is_capped() {
        let fx = fixture().await;
        let carts = fx.store.carts();

        carts.add(&fx.user, &product(fx.product_b, MAX_LINE_AMOUNT)).await.unwrap();
        let err = carts
            .add(&fx.user, &product(fx.product_b, MAX_LINE_AMOUNT))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let view = carts.view(&fx.user, "alpha").await.unwrap();
        assert!(matches!(
            &view.entries[0],
            CartEntry::Product(item) if item.amount == MAX_LINE_AMOUNT
        ));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let fx = fixture().await;
        let carts = fx.store.carts();

        let CartEntry::Kit(row) = carts.add(&fx.user, &kit(fx.kit)).await.unwrap() else {
            panic!("expected a kit row");
        };
        carts.add(&fx.user, &product(fx.product_a, 3)).await.unwrap();

        // someone else's row is not ours to remove
        let err = carts.remove_own("intruder", CartEntryKind::Kit, row.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::CartEntryNotFound(id)) if id == row.id
        ));

        carts.remove_own(&fx.user, CartEntryKind::Kit, row.id).await.unwrap();
        assert!(carts.remove(CartEntryKind::Kit, row.id).await.is_err());

        assert_eq!(carts.clear_own(&fx.user, "alpha").await.unwrap(), 1);
        assert!(carts.view(&fx.user, "alpha").await.unwrap().entries.is_empty());

        carts.add(&fx.user, &product(fx.product_a, 1)).await.unwrap();
        assert_eq!(carts.clear(&fx.user).await.unwrap(), 1);
    }
}
