//! # Pricing Calculator
//!
//! Turns a catalog price into what the user actually pays.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  effective = (base - base × discount% / 100) × multiplier               │
//! │  line      = effective × amount                                         │
//! │                                                                         │
//! │  All factors are combined into ONE exact integer expression and        │
//! │  rounded ONCE (half up) at the very end:                               │
//! │                                                                         │
//! │      base_cents × (100 - discount%) × multiplier_bps × amount           │
//! │      ───────────────────────────────────────────────────────            │
//! │                       100 × 10 000                                      │
//! │                                                                         │
//! │  Rounding the discounted price first and multiplying afterwards       │
//! │  would compound the rounding error on every factor.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Kits are priced with their own price and discount. The discounts of the
//! products inside a kit never take part.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::{MAX_DISCOUNT_PERCENT, MULTIPLIER_SCALE_BPS};

// =============================================================================
// Multiplier
// =============================================================================

/// Period price multiplier in basis points.
///
/// 10 000 bps = ×1.0, 25 000 bps = ×2.5. Stored as an integer for the same
/// reason `Money` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Multiplier(u32);

impl Multiplier {
    /// Creates a multiplier from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Multiplier(bps)
    }

    /// Creates a multiplier from a ratio (for convenience in seeds and tests).
    pub fn from_ratio(ratio: f64) -> Self {
        Multiplier((ratio * MULTIPLIER_SCALE_BPS as f64).round() as u32)
    }

    /// The neutral multiplier, ×1.0.
    #[inline]
    pub const fn one() -> Self {
        Multiplier(MULTIPLIER_SCALE_BPS)
    }

    /// Returns the multiplier in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Multiplier::one()
    }
}

// =============================================================================
// Price Functions
// =============================================================================

/// Effective unit price: `(base - base × discount / 100) × multiplier`.
///
/// ## Example
/// ```rust
/// use storefront_core::money::Money;
/// use storefront_core::pricing::{price, Multiplier};
///
/// // Donor group 200.00, 25% off, 3-month period at ×2.5
/// let total = price(Money::from_units(200), 25, Multiplier::from_bps(25_000)).unwrap();
/// assert_eq!(total, Money::from_units(375));
/// ```
pub fn price(base: Money, discount_percent: u32, multiplier: Multiplier) -> CoreResult<Money> {
    scaled(base, discount_percent, multiplier, 1)
}

/// Total for `amount` units of one product.
///
/// ## Errors
/// `InvalidPricingInput` when `amount < 1`, the discount is above 100 or the
/// base price is negative.
pub fn line_total(base: Money, discount_percent: u32, amount: i64) -> CoreResult<Money> {
    if amount < 1 {
        return Err(CoreError::InvalidPricingInput {
            reason: format!("amount must be at least 1, got {amount}"),
        });
    }
    scaled(base, discount_percent, Multiplier::one(), amount)
}

fn scaled(
    base: Money,
    discount_percent: u32,
    multiplier: Multiplier,
    amount: i64,
) -> CoreResult<Money> {
    if discount_percent > MAX_DISCOUNT_PERCENT {
        return Err(CoreError::InvalidPricingInput {
            reason: format!("discount must be within 0..=100, got {discount_percent}"),
        });
    }
    if base.is_negative() {
        return Err(CoreError::InvalidPricingInput {
            reason: format!("base price must not be negative, got {base}"),
        });
    }

    // i128 keeps cents × 100 × bps × amount far away from overflow
    let numerator = base.cents() as i128
        * (MAX_DISCOUNT_PERCENT - discount_percent) as i128
        * multiplier.bps() as i128
        * amount as i128;
    let denominator = MAX_DISCOUNT_PERCENT as i128 * MULTIPLIER_SCALE_BPS as i128;
    let cents = (numerator + denominator / 2) / denominator;

    i64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| CoreError::InvalidPricingInput {
            reason: "price exceeds the representable range".to_string(),
        })
}

// =============================================================================
// Quote
// =============================================================================

/// One priced line of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuoteLine {
    /// Product or kit id.
    pub subject_id: i64,
    pub kind: QuoteLineKind,
    pub amount: i64,
    pub total: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QuoteLineKind {
    Product,
    Kit,
}

/// Priced view of a cart.
///
/// The total is the plain sum of the line totals, so the order in which
/// lines are added never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub total: Money,
}

impl Quote {
    pub fn new() -> Self {
        Quote::default()
    }

    /// Prices a product line and appends it.
    pub fn add_product(
        &mut self,
        product_id: i64,
        base: Money,
        discount_percent: u32,
        amount: i64,
    ) -> CoreResult<Money> {
        let total = line_total(base, discount_percent, amount)?;
        self.push(QuoteLine {
            subject_id: product_id,
            kind: QuoteLineKind::Product,
            amount,
            total,
        })?;
        Ok(total)
    }

    /// Prices one kit selection and appends it.
    pub fn add_kit(
        &mut self,
        kit_id: i64,
        base: Money,
        discount_percent: u32,
    ) -> CoreResult<Money> {
        let total = price(base, discount_percent, Multiplier::one())?;
        self.push(QuoteLine {
            subject_id: kit_id,
            kind: QuoteLineKind::Kit,
            amount: 1,
            total,
        })?;
        Ok(total)
    }

    fn push(&mut self, line: QuoteLine) -> CoreResult<()> {
        self.total = self.total.checked_add(line.total).ok_or_else(|| {
            CoreError::InvalidPricingInput {
                reason: "quote total exceeds the representable range".to_string(),
            }
        })?;
        self.lines.push(line);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_discounted_line_total() {
        // 50.00 at 10% off, two units = 90.00
        let total = line_total(Money::from_units(50), 10, 2).unwrap();
        assert_eq!(total, Money::from_units(90));
    }

    #[test]
    fn test_full_discount_is_free() {
        assert!(price(Money::from_units(50), 100, Multiplier::one())
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_single_rounding_step() {
        // 0.33 at 50% off at ×3: exact value 0.495 → 0.50
        // Rounding after the discount (0.165 → 0.17) and then ×3 would give 0.51
        let total = price(Money::from_cents(33), 50, Multiplier::from_bps(30_000)).unwrap();
        assert_eq!(total.cents(), 50);
    }

    #[test]
    fn test_multiplier_from_ratio() {
        assert_eq!(Multiplier::from_ratio(1.5).bps(), 15_000);
        assert_eq!(Multiplier::default(), Multiplier::one());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            price(Money::from_units(1), 101, Multiplier::one()),
            Err(CoreError::InvalidPricingInput { .. })
        ));
        assert!(matches!(
            line_total(Money::from_units(1), 0, 0),
            Err(CoreError::InvalidPricingInput { .. })
        ));
        assert!(matches!(
            price(Money::from_cents(-1), 0, Multiplier::one()),
            Err(CoreError::InvalidPricingInput { .. })
        ));
    }

    #[test]
    fn test_quote_uses_kit_price_only() {
        let mut quote = Quote::new();
        quote.add_product(1, Money::from_units(50), 10, 2).unwrap();
        quote.add_kit(9, Money::from_units(5), 0).unwrap();

        assert_eq!(quote.lines.len(), 2);
        assert_eq!(quote.lines[1].kind, QuoteLineKind::Kit);
        assert_eq!(quote.total, Money::from_units(95));
    }

    #[test]
    fn test_quote_total_overflow_is_rejected() {
        let near_half = Money::from_cents(i64::MAX / 2 + 1);
        let mut quote = Quote::new();
        quote.add_product(1, near_half, 0, 1).unwrap();

        assert!(matches!(
            quote.add_product(2, near_half, 0, 1),
            Err(CoreError::InvalidPricingInput { .. })
        ));
        assert!(matches!(
            quote.add_kit(3, near_half, 0),
            Err(CoreError::InvalidPricingInput { .. })
        ));
        assert_eq!(quote.lines.len(), 1);
        assert_eq!(quote.total, near_half);
    }

    proptest! {
        #[test]
        fn quote_total_is_order_independent(
            lines in prop::collection::vec((0i64..1_000_000, 0u32..=100, 1i64..500), 0..20)
        ) {
            let mut forward = Quote::new();
            for (i, (base, discount, amount)) in lines.iter().enumerate() {
                forward
                    .add_product(i as i64, Money::from_cents(*base), *discount, *amount)
                    .unwrap();
            }

            let mut backward = Quote::new();
            for (i, (base, discount, amount)) in lines.iter().enumerate().rev() {
                backward
                    .add_product(i as i64, Money::from_cents(*base), *discount, *amount)
                    .unwrap();
            }

            let summed: Money = forward.lines.iter().map(|l| l.total).sum();
            prop_assert_eq!(forward.total, backward.total);
            prop_assert_eq!(forward.total, summed);
        }

        #[test]
        fn discount_never_raises_the_price(base in 0i64..10_000_000, discount in 0u32..=100) {
            let full = price(Money::from_cents(base), 0, Multiplier::one()).unwrap();
            let discounted = price(Money::from_cents(base), discount, Multiplier::one()).unwrap();
            prop_assert!(discounted <= full);
            prop_assert!(!discounted.is_negative());
        }
    }
}
