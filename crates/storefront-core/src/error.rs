//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-db errors (separate crate)                                 │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  storefront-service errors                                             │
//! │  └── ServiceError     - What the request layer sees                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError ← DbError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! Every error maps onto an [`ErrorKind`] so the request layer can pick a
//! status without matching on individual variants.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced user, server, catalog entry, grant or cart row is missing.
    NotFound,
    /// The request is well-formed but conflicts with current state.
    Conflict,
    /// The request carries malformed values.
    InvalidInput,
    /// The backing store failed.
    Storage,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Pricing inputs are outside their domain.
    ///
    /// ## When This Occurs
    /// - `discount_percent` above 100
    /// - Line amount below 1
    /// - Negative base price
    #[error("Invalid pricing input: {reason}")]
    InvalidPricingInput { reason: String },

    /// The user's balance does not cover the total.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (total: 90.00)
    ///      │
    ///      ▼
    /// Check balance: 40.00
    ///      │
    ///      ▼
    /// InsufficientFunds { required: 90.00, available: 40.00 }
    ///      │
    ///      ▼
    /// Nothing is written, cart stays as it was
    /// ```
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// The server referenced by the request does not exist.
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// A user, product, kit, donor group or period does not resolve.
    #[error("{entity} not found: {id}")]
    SubjectNotFound { entity: String, id: String },

    /// A catalog entry is not sold on the requested server, or a period is
    /// not offered by the requested donor group.
    #[error("{entity} {id} is not available on {scope}")]
    NotEligible {
        entity: String,
        id: String,
        scope: String,
    },

    /// The donor group grant is still running and cannot be extended yet.
    #[error(
        "Donor group {group_id} is already active for {user_uuid} on {server_id} (expires: {})",
        format_expiry(.expires_at)
    )]
    GrantAlreadyActive {
        user_uuid: String,
        server_id: String,
        group_id: i64,
        expires_at: Option<DateTime<Utc>>,
    },

    /// Extending from `from` by `duration_secs` leaves chrono's date range.
    #[error("Grant expiry out of range: {from} + {duration_secs}s")]
    ExpiryOutOfRange {
        from: DateTime<Utc>,
        duration_secs: i64,
    },

    /// A balance transfer names the same user on both ends.
    #[error("Cannot transfer to yourself: {0}")]
    SelfTransfer(String),

    /// No grant with this id exists.
    #[error("Donor group grant not found: {0}")]
    GrantNotFound(i64),

    /// No cart row with this id belongs to the caller.
    #[error("Cart entry not found: {0}")]
    CartEntryNotFound(i64),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a SubjectNotFound error.
    pub fn subject_not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        CoreError::SubjectNotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a NotEligible error.
    pub fn not_eligible(
        entity: impl Into<String>,
        id: impl ToString,
        scope: impl Into<String>,
    ) -> Self {
        CoreError::NotEligible {
            entity: entity.into(),
            id: id.to_string(),
            scope: scope.into(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ServerNotFound(_)
            | CoreError::SubjectNotFound { .. }
            | CoreError::GrantNotFound(_)
            | CoreError::CartEntryNotFound(_) => ErrorKind::NotFound,
            CoreError::InsufficientFunds { .. }
            | CoreError::NotEligible { .. }
            | CoreError::GrantAlreadyActive { .. } => ErrorKind::Conflict,
            CoreError::InvalidPricingInput { .. }
            | CoreError::ExpiryOutOfRange { .. }
            | CoreError::SelfTransfer(_)
            | CoreError::Validation(_) => ErrorKind::InvalidInput,
        }
    }
}

fn format_expiry(expires_at: &Option<DateTime<Utc>>) -> String {
    match expires_at {
        Some(at) => at.to_rfc3339(),
        None => "never".to_string(),
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., a server id with spaces).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientFunds {
            required: Money::from_cents(9000),
            available: Money::from_cents(4000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: required 90.00, available 40.00"
        );

        let err = CoreError::subject_not_found("Kit", 7);
        assert_eq!(err.to_string(), "Kit not found: 7");
    }

    #[test]
    fn test_grant_already_active_message_for_permanent_grant() {
        let err = CoreError::GrantAlreadyActive {
            user_uuid: "u".to_string(),
            server_id: "s".to_string(),
            group_id: 3,
            expires_at: None,
        };
        assert!(err.to_string().ends_with("(expires: never)"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoreError::ServerNotFound("x".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(CoreError::GrantNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::not_eligible("Product", 1, "server alpha").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::InvalidPricingInput {
                reason: "x".to_string()
            }
            .kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "user_uuid".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::InvalidInput);
    }
}
