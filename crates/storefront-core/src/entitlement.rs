//! # Entitlement Decisions
//!
//! Decides what happens to a donor group grant when the same group is
//! granted again for the same (user, server).
//!
//! ## Grant Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Absent ──grant──► Active(expires = now + d | never)                   │
//! │                                                                         │
//! │   Active(expires > now) ──grant──► GrantAlreadyActive                   │
//! │                                                                         │
//! │   Active(expires ≤ now) ──grant──► Active(expires = old + d | never)    │
//! │                                                                         │
//! │   Active(never) ──grant──► PermanentGrantPolicy                         │
//! │                              ├── Reject  → GrantAlreadyActive           │
//! │                              └── Replace → Active(now + d | never)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An expired grant is extended from its previous expiry, not from now, so
//! a lapsed membership picks up where it stopped.
//!
//! The caller supplies `now`; this module never reads a clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::DonorGrant;

// =============================================================================
// Policy
// =============================================================================

/// What a new grant does to a permanent one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentGrantPolicy {
    /// A permanent grant is always active, so re-granting is a conflict.
    #[default]
    Reject,
    /// The new period replaces the permanent grant, anchored on now.
    Replace,
}

impl FromStr for PermanentGrantPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(PermanentGrantPolicy::Reject),
            "replace" => Ok(PermanentGrantPolicy::Replace),
            other => Err(ValidationError::InvalidFormat {
                field: "permanent_grant_policy".to_string(),
                reason: format!("expected `reject` or `replace`, got `{other}`"),
            }),
        }
    }
}

impl fmt::Display for PermanentGrantPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermanentGrantPolicy::Reject => write!(f, "reject"),
            PermanentGrantPolicy::Replace => write!(f, "replace"),
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Where an existing grant stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    Absent,
    Active { expires_at: DateTime<Utc> },
    Expired { expires_at: DateTime<Utc> },
    Permanent,
}

/// Classifies an existing grant against `now`.
///
/// A grant expiring exactly at `now` counts as expired.
pub fn classify(existing: Option<&DonorGrant>, now: DateTime<Utc>) -> GrantState {
    match existing {
        None => GrantState::Absent,
        Some(grant) => match grant.expires_at {
            None => GrantState::Permanent,
            Some(expires_at) if expires_at > now => GrantState::Active { expires_at },
            Some(expires_at) => GrantState::Expired { expires_at },
        },
    }
}

// =============================================================================
// Decision
// =============================================================================

/// The write a grant request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantDecision {
    /// Insert a new grant row.
    Create { expires_at: Option<DateTime<Utc>> },
    /// Update the existing row's expiry.
    Extend { expires_at: Option<DateTime<Utc>> },
}

impl GrantDecision {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            GrantDecision::Create { expires_at } | GrantDecision::Extend { expires_at } => {
                *expires_at
            }
        }
    }
}

/// Decides how a grant of `duration` (`None` = permanent) applies.
///
/// ## Errors
/// - `GrantAlreadyActive` when the existing grant is still running, or is
///   permanent under [`PermanentGrantPolicy::Reject`]
/// - `ExpiryOutOfRange` when the new expiry would not fit a `DateTime`
///
/// ## Example
/// ```rust
/// use chrono::{Duration, TimeZone, Utc};
/// use storefront_core::entitlement::{decide, GrantDecision, PermanentGrantPolicy};
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let day = Some(Duration::days(1));
/// let decision = decide(None, day, now, PermanentGrantPolicy::Reject).unwrap();
/// assert_eq!(decision, GrantDecision::Create { expires_at: Some(now + Duration::days(1)) });
/// ```
pub fn decide(
    existing: Option<&DonorGrant>,
    duration: Option<Duration>,
    now: DateTime<Utc>,
    policy: PermanentGrantPolicy,
) -> CoreResult<GrantDecision> {
    let anchored = |from: DateTime<Utc>| -> CoreResult<Option<DateTime<Utc>>> {
        let Some(d) = duration else {
            return Ok(None);
        };
        from.checked_add_signed(d)
            .map(Some)
            .ok_or(CoreError::ExpiryOutOfRange {
                from,
                duration_secs: d.num_seconds(),
            })
    };

    let Some(grant) = existing else {
        return Ok(GrantDecision::Create {
            expires_at: anchored(now)?,
        });
    };

    match classify(existing, now) {
        GrantState::Expired { expires_at } => Ok(GrantDecision::Extend {
            expires_at: anchored(expires_at)?,
        }),
        GrantState::Permanent if policy == PermanentGrantPolicy::Replace => {
            Ok(GrantDecision::Extend {
                expires_at: anchored(now)?,
            })
        }
        _ => Err(CoreError::GrantAlreadyActive {
            user_uuid: grant.user_uuid.clone(),
            server_id: grant.server_id.clone(),
            group_id: grant.group_id,
            expires_at: grant.expires_at,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
