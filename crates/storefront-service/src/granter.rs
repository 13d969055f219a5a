//! # Entitlement Granter
//!
//! Donor group grants, bought by the user or given by an administrator.
//!
//! ## Grant Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per (user, server, group)                                              │
//! │                                                                         │
//! │  Absent ──grant──► Active(now + d)                                      │
//! │                       │                                                 │
//! │                       ├──grant while expires_at > now──► GrantAlreadyActive
//! │                       │                                                 │
//! │                       └──grant after expiry──► Active(old + d)          │
//! │                                                                         │
//! │  Permanent ──grant──► PermanentGrantPolicy::Reject  → GrantAlreadyActive│
//! │                       PermanentGrantPolicy::Replace → Active(now + d)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A purchase debits the balance, writes the grant and its history record
//! in one transaction. The `donor_group_granted` event goes out after commit.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::ServiceResult;
use crate::events::{EventBus, StoreEvent};
use crate::fulfillment::{apply_charge, record_all, Charge};
use crate::locks::UserLocks;
use storefront_core::entitlement::{decide, GrantDecision, PermanentGrantPolicy};
use storefront_core::pricing::price;
use storefront_core::{
    CoreError, DonorGrant, DonorGroup, DonorGroupBuyInput, GiveDonorGroupInput, HistoryEntry,
    HistoryKind, Period, User,
};
use storefront_db::Database;

/// Creates, extends and revokes donor group grants.
#[derive(Clone)]
pub struct EntitlementGranter {
    db: Database,
    locks: UserLocks,
    clock: Arc<dyn Clock>,
    events: EventBus,
    policy: PermanentGrantPolicy,
}

impl EntitlementGranter {
    pub fn new(
        db: Database,
        locks: UserLocks,
        clock: Arc<dyn Clock>,
        events: EventBus,
        policy: PermanentGrantPolicy,
    ) -> Self {
        EntitlementGranter {
            db,
            locks,
            clock,
            events,
            policy,
        }
    }

    /// Buys a donor group for `user_uuid`.
    ///
    /// ## Errors
    /// - `SubjectNotFound` for the group, period or user
    /// - `NotEligible` when the server or period is not offered by the group
    /// - `InsufficientFunds` when the priced period exceeds the balance
    /// - `GrantAlreadyActive` when the group is still running on that server
    pub async fn buy(
        &self,
        user_uuid: &str,
        input: &DonorGroupBuyInput,
        ip: Option<&str>,
    ) -> ServiceResult<DonorGrant> {
        let group = self.group(input.group_id).await?;
        if !group.is_sold_on(&input.server_id) {
            return Err(CoreError::not_eligible("DonorGroup", group.id, &input.server_id).into());
        }
        if !group.offers_period(input.period_id) {
            let scope = format!("donor group {}", group.id);
            return Err(CoreError::not_eligible("Period", input.period_id, scope).into());
        }
        let period = self.period(input.period_id).await?;
        let duration = period.duration()?;

        let total = price(group.price(), group.discount_percent, period.multiplier())?;

        let _guard = self.locks.acquire(user_uuid).await;
        let user = self.user(user_uuid).await?;

        if user.balance().checked_debit(total).is_none() {
            warn!(
                user = %user.uuid,
                group_id = group.id,
                required = %total,
                available = %user.balance(),
                "Donor group purchase rejected: insufficient funds"
            );
            return Err(CoreError::InsufficientFunds {
                required: total,
                available: user.balance(),
            }
            .into());
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        apply_charge(&self.db, &mut tx, &user, Charge::Balance(total)).await?;
        let grant = self
            .grant(&mut tx, &user, &input.server_id, group.id, duration, now)
            .await?;
        record_all(
            &self.db,
            &mut tx,
            &[HistoryEntry {
                kind: HistoryKind::DonorGroupPurchase,
                ip: ip.map(str::to_string),
                user_uuid: user.uuid.clone(),
                subject_id: group.id,
                server_id: input.server_id.clone(),
                extra: Some(json!({ "period_id": period.id })),
            }],
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            user = %user.uuid,
            server = %input.server_id,
            group_id = group.id,
            period_id = period.id,
            total = %total,
            expires_at = ?grant.expires_at,
            "Donor group bought"
        );
        self.events.publish(StoreEvent::DonorGroupGranted { grant: grant.clone() });
        Ok(grant)
    }

    /// Grants a donor group without charging and without eligibility checks.
    pub async fn give(
        &self,
        input: &GiveDonorGroupInput,
        ip: Option<&str>,
    ) -> ServiceResult<DonorGrant> {
        self.db
            .catalog()
            .get_server(&input.server_id)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("Server", &input.server_id))?;
        let group = self.group(input.group_id).await?;
        let period = self.period(input.period_id).await?;
        let duration = period.duration()?;

        let _guard = self.locks.acquire(&input.user_uuid).await;
        let user = self.user(&input.user_uuid).await?;

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        let grant = self
            .grant(&mut tx, &user, &input.server_id, group.id, duration, now)
            .await?;
        record_all(
            &self.db,
            &mut tx,
            &[HistoryEntry {
                kind: HistoryKind::DonorGroupGrant,
                ip: ip.map(str::to_string),
                user_uuid: user.uuid.clone(),
                subject_id: group.id,
                server_id: input.server_id.clone(),
                extra: Some(json!({ "period_id": period.id })),
            }],
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            user = %user.uuid,
            server = %input.server_id,
            group_id = group.id,
            expires_at = ?grant.expires_at,
            "Donor group given"
        );
        self.events.publish(StoreEvent::DonorGroupGranted { grant: grant.clone() });
        Ok(grant)
    }

    /// Revokes a grant regardless of its expiry.
    pub async fn take(&self, grant_id: i64) -> ServiceResult<()> {
        if !self.db.grants().delete(grant_id).await? {
            return Err(CoreError::GrantNotFound(grant_id).into());
        }
        info!(grant_id, "Donor group taken");
        Ok(())
    }

    /// Grants of a user on one server.
    pub async fn list_for(
        &self,
        user_uuid: &str,
        server_id: &str,
    ) -> ServiceResult<Vec<DonorGrant>> {
        Ok(self.db.grants().list_for(user_uuid, server_id).await?)
    }

    /// Every grant of a user.
    pub async fn me(&self, user_uuid: &str) -> ServiceResult<Vec<DonorGrant>> {
        Ok(self.db.grants().list_by_user(user_uuid).await?)
    }

    pub fn policy(&self) -> PermanentGrantPolicy {
        self.policy
    }

    /// Creates or extends the grant on `conn`.
    async fn grant(
        &self,
        conn: &mut SqliteConnection,
        user: &User,
        server_id: &str,
        group_id: i64,
        duration: Option<Duration>,
        now: DateTime<Utc>,
    ) -> ServiceResult<DonorGrant> {
        let grants = self.db.grants();
        let existing = grants.find(conn, &user.uuid, server_id, group_id).await?;

        let decision = decide(existing.as_ref(), duration, now, self.policy).inspect_err(|e| {
            warn!(
                user = %user.uuid,
                server = %server_id,
                group_id,
                error = %e,
                "Grant rejected"
            );
        })?;

        let grant = match (decision, existing) {
            (GrantDecision::Extend { expires_at }, Some(current)) => {
                grants.set_expiry(conn, current.id, expires_at, now).await?
            }
            (decision, _) => {
                let expires_at = decision.expires_at();
                grants
                    .create(conn, &user.uuid, server_id, group_id, expires_at, now)
                    .await?
            }
        };
        Ok(grant)
    }

    async fn group(&self, group_id: i64) -> ServiceResult<DonorGroup> {
        self.db
            .catalog()
            .get_group(group_id)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("DonorGroup", group_id).into())
    }

    async fn period(&self, period_id: i64) -> ServiceResult<Period> {
        self.db
            .catalog()
            .get_period(period_id)
            .await?
            .ok_or_else(|| CoreError::subject_not_found("Period", period_id).into())
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
