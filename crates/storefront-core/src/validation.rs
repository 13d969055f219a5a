//! # Validation Module
//!
//! Input validation for requests entering the storefront.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer                                                │
//! │  ├── Deserialization into the *Input types                             │
//! │  └── Authentication (out of tree)                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: storefront-service                                           │
//! │  └── THIS MODULE: amounts, identifiers, catalog values                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (real_cents >= 0), CHECK (amount >= 1)                      │
//! │  ├── UNIQUE composite keys                                             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every check here runs before a transaction is opened.
//!
//! ## Usage
//! ```rust
//! use storefront_core::validation::{validate_amount, validate_server_id};
//!
//! validate_server_id("survival-1").unwrap();
//! validate_amount(64).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_DISCOUNT_PERCENT, MAX_DURATION_SECS, MAX_LINE_AMOUNT, MAX_SERVER_ID_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a server id.
///
/// ## Rules
/// - Must not be empty
/// - At most `MAX_SERVER_ID_LEN` characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_server_id;
///
/// assert!(validate_server_id("skyblock_2").is_ok());
/// assert!(validate_server_id("").is_err());
/// assert!(validate_server_id("has space").is_err());
/// ```
pub fn validate_server_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "server_id".to_string(),
        });
    }

    if id.len() > MAX_SERVER_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "server_id".to_string(),
            max: MAX_SERVER_ID_LEN,
        });
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "server_id".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a catalog name (product, kit, group, period, server).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line amount (cart product amount, give amount, kit copies).
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed `MAX_LINE_AMOUNT`
///
/// ```text
/// add product (amount: 0)  ──► MustBePositive
/// add product (amount: 64) ──► ok, merged into the cart row
/// ```
pub fn validate_amount(amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    if amount > MAX_LINE_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: MAX_LINE_AMOUNT,
        });
    }

    Ok(())
}

/// Validates a price in minor units. Zero is allowed.
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a whole-percent discount.
pub fn validate_discount_percent(percent: u32) -> ValidationResult<()> {
    if percent > MAX_DISCOUNT_PERCENT {
        return Err(ValidationError::OutOfRange {
            field: "discount_percent".to_string(),
            min: 0,
            max: MAX_DISCOUNT_PERCENT as i64,
        });
    }

    Ok(())
}

/// Validates a balance credit. Must be positive.
pub fn validate_credit_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "credit".to_string(),
        });
    }

    Ok(())
}

/// Validates a balance transfer. Must be positive.
pub fn validate_transfer_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "transfer".to_string(),
        });
    }

    Ok(())
}

/// Validates a period duration; `None` (permanent) is always valid.
///
/// Finite durations are capped at `MAX_DURATION_SECS` so expiry arithmetic
/// stays far inside chrono's range.
pub fn validate_duration_secs(secs: Option<i64>) -> ValidationResult<()> {
    match secs {
        Some(s) if s <= 0 => Err(ValidationError::MustBePositive {
            field: "duration_secs".to_string(),
        }),
        Some(s) if s > MAX_DURATION_SECS => Err(ValidationError::OutOfRange {
            field: "duration_secs".to_string(),
            min: 1,
            max: MAX_DURATION_SECS,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_server_id() {
        assert!(validate_server_id("alpha").is_ok());
        assert!(validate_server_id("survival-1").is_ok());

        assert!(validate_server_id("").is_err());
        assert!(validate_server_id("   ").is_err());
        assert!(validate_server_id("a/b").is_err());
        assert!(validate_server_id(&"a".repeat(MAX_SERVER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(1).is_ok());
        assert!(validate_amount(MAX_LINE_AMOUNT).is_ok());

        assert!(matches!(
            validate_amount(0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_amount(-3).is_err());
        assert!(matches!(
            validate_amount(MAX_LINE_AMOUNT + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_discount_percent() {
        assert!(validate_discount_percent(0).is_ok());
        assert!(validate_discount_percent(100).is_ok());
        assert!(validate_discount_percent(101).is_err());
    }

    #[test]
    fn test_validate_price_and_credit() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_credit_cents(1).is_ok());
        assert!(validate_credit_cents(0).is_err());
        assert!(validate_transfer_cents(1).is_ok());
        assert!(validate_transfer_cents(-5).is_err());
    }

    #[test]
    fn test_validate_duration() {
        assert!(validate_duration_secs(None).is_ok());
        assert!(validate_duration_secs(Some(86_400)).is_ok());
        assert!(validate_duration_secs(Some(0)).is_err());

        assert!(validate_duration_secs(Some(MAX_DURATION_SECS)).is_ok());
        assert!(matches!(
            validate_duration_secs(Some(MAX_DURATION_SECS + 1)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate_duration_secs(Some(10_000_000_000_000)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Diamond Sword").is_ok());
        assert!(validate_name("  ").is_err());
        assert!(validate_name(&"A".repeat(201)).is_err());
    }
}
