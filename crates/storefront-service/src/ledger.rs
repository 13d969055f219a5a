//! Balance reads, administrative top-ups and user-to-user transfers.
//!
//! Debits only ever happen inside a unit of work; see
//! [`crate::fulfillment`].
//!
//! ```text
//! transfer(alice → bob, 25.00)
//!   lock(min(alice, bob)) ─ lock(max(alice, bob))
//!   begin ─ debit alice if ≥ 25.00 ─ credit bob ─ transfer_out + transfer_in ─ commit
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::ServiceResult;
use crate::fulfillment::{apply_charge, record_all, Charge};
use crate::locks::UserLocks;
use storefront_core::validation::{validate_credit_cents, validate_transfer_cents};
use storefront_core::{CoreError, HistoryEntry, HistoryKind, Money, User};
use storefront_db::Database;

#[derive(Clone)]
pub struct Ledger {
    db: Database,
    locks: UserLocks,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(db: Database, locks: UserLocks, clock: Arc<dyn Clock>) -> Self {
        Ledger { db, locks, clock }
    }

    pub async fn balance(&self, user_uuid: &str) -> ServiceResult<Money> {
        self.db
            .users()
            .balance(user_uuid)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("User", user_uuid).into())
    }

    /// Adds `amount` to the balance and returns the new balance.
    pub async fn credit(&self, user_uuid: &str, amount: Money) -> ServiceResult<Money> {
        validate_credit_cents(amount.cents())?;

        let _guard = self.locks.acquire(user_uuid).await;
        self.user(user_uuid).await?;
        let balance = self.db.users().credit(user_uuid, amount).await?;

        info!(user = %user_uuid, amount = %amount, balance = %balance, "Balance credited");
        Ok(balance)
    }

    /// Moves `amount` from one user's balance to another's and returns the
    /// sender's new balance.
    ///
    /// ## Errors
    /// - `InvalidInput` for a non-positive amount or a transfer to oneself
    /// - `SubjectNotFound` for either user
    /// - `InsufficientFunds` when the sender cannot cover it; nothing changes
    pub async fn transfer(
        &self,
        from_uuid: &str,
        to_uuid: &str,
        amount: Money,
        ip: Option<&str>,
    ) -> ServiceResult<Money> {
        validate_transfer_cents(amount.cents())?;
        if from_uuid == to_uuid {
            return Err(CoreError::SelfTransfer(from_uuid.to_string()).into());
        }

        let _guards = self.locks.acquire_pair(from_uuid, to_uuid).await;
        let sender = self.user(from_uuid).await?;
        let recipient = self.user(to_uuid).await?;

        if sender.balance().checked_debit(amount).is_none() {
            warn!(
                from = %sender.uuid,
                to = %recipient.uuid,
                required = %amount,
                available = %sender.balance(),
                "Transfer rejected: insufficient funds"
            );
            return Err(CoreError::InsufficientFunds {
                required: amount,
                available: sender.balance(),
            }
            .into());
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        let rest = apply_charge(&self.db, &mut tx, &sender, Charge::Balance(amount))
            .await?
            .unwrap_or_else(|| sender.balance());
        self.db.users().credit_in(&mut tx, &recipient.uuid, amount).await?;
        record_all(
            &self.db,
            &mut tx,
            &[
                transfer_entry(HistoryKind::TransferOut, &sender, "to", &recipient, amount, ip),
                transfer_entry(HistoryKind::TransferIn, &recipient, "from", &sender, amount, ip),
            ],
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            from = %sender.uuid,
            to = %recipient.uuid,
            amount = %amount,
            balance = %rest,
            "Balance transferred"
        );
        Ok(rest)
    }

    async fn user(&self, user_uuid: &str) -> ServiceResult<User> {
        self.db
            .users()
            .get(user_uuid)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("User", user_uuid).into())
    }
}

fn transfer_entry(
    kind: HistoryKind,
    owner: &User,
    direction: &str,
    counterpart: &User,
    amount: Money,
    ip: Option<&str>,
) -> HistoryEntry {
    HistoryEntry {
        kind,
        ip: ip.map(str::to_string),
        user_uuid: owner.uuid.clone(),
        subject_id: 0,
        server_id: String::new(),
        extra: Some(json!({ direction: counterpart.uuid, "amount": amount.cents() })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::testing::fixture;
    use storefront_core::ErrorKind;

    #[tokio::test]
    async fn test_credit() {
        let fx = fixture().await;
        let ledger = fx.store.ledger();

        let balance = ledger.credit(&fx.user, Money::from_cents(250)).await.unwrap();
        assert_eq!(balance, Money::from_cents(10_250));
        assert_eq!(ledger.balance(&fx.user).await.unwrap(), balance);

        let err = ledger.credit(&fx.user, Money::zero()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = ledger.credit("nobody", Money::from_cents(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(ledger.balance("nobody").await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_transfer_moves_balance_and_records_both_sides() {
        let fx = fixture().await;
        let ledger = fx.store.ledger();
        fx.store.db().users().insert("friend", "sam", Money::from_units(5)).await.unwrap();

        let rest = ledger
            .transfer(&fx.user, "friend", Money::from_units(30), Some("10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(rest, Money::from_units(70));
        assert_eq!(ledger.balance(&fx.user).await.unwrap(), Money::from_units(70));
        assert_eq!(ledger.balance("friend").await.unwrap(), Money::from_units(35));

        let history = fx.store.db().history();
        let sent = history.list_for_user(&fx.user).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, HistoryKind::TransferOut);
        assert_eq!(sent[0].ip.as_deref(), Some("10.0.0.1"));
        let extra: serde_json::Value =
            serde_json::from_str(sent[0].extra.as_deref().unwrap()).unwrap();
        assert_eq!(extra, json!({ "to": "friend", "amount": 3000 }));

        let received = history.list_for_user("friend").await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, HistoryKind::TransferIn);
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_changes_nothing() {
        let fx = fixture().await;
        let ledger = fx.store.ledger();
        fx.store.db().users().insert("friend", "sam", Money::zero()).await.unwrap();

        let err = ledger
            .transfer(&fx.user, "friend", Money::from_cents(10_001), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InsufficientFunds { required, available })
                if required == Money::from_cents(10_001) && available == Money::from_units(100)
        ));
        assert_eq!(ledger.balance(&fx.user).await.unwrap(), Money::from_units(100));
        assert_eq!(ledger.balance("friend").await.unwrap(), Money::zero());
        assert!(fx.store.db().history().list_for_user(&fx.user).await.unwrap().is_empty());
        assert!(fx.store.db().history().list_for_user("friend").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_rejections() {
        let fx = fixture().await;
        let ledger = fx.store.ledger();

        let err = ledger
            .transfer(&fx.user, &fx.user, Money::from_units(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::SelfTransfer(_))));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = ledger
            .transfer(&fx.user, "nobody", Money::from_units(1), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = ledger
            .transfer(&fx.user, "nobody", Money::zero(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(ledger.balance(&fx.user).await.unwrap(), Money::from_units(100));
    }
}
