//! # storefront-core: Pure Business Logic for the Storefront
//!
//! This crate is the **heart** of the storefront. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Request layer (out of tree)                  │   │
//! │  │    add to cart ──► checkout ──► buy donor group ──► give        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                storefront-service (units of work)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌────────────┐ ┌───────┐ │   │
//! │  │   │  money  │ │ pricing │ │   kit   │ │entitlement │ │ types │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └────────────┘ └───────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 storefront-db (Database Layer)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog, cart, warehouse, grant and history types
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Discount and period multiplier math
//! - [`kit`] - Kit expansion into virtual line items
//! - [`entitlement`] - Donor-group grant state machine
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::money::Money;
//! use storefront_core::pricing::{price, Multiplier};
//!
//! // 50.00 with 10% off at ×1 = 45.00
//! let unit = price(Money::from_cents(5000), 10, Multiplier::one()).unwrap();
//! assert_eq!(unit.cents(), 4500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod entitlement;
pub mod error;
pub mod kit;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Highest discount a catalog entry may carry, in whole percent.
pub const MAX_DISCOUNT_PERCENT: u32 = 100;

/// Basis points that make up a ×1.0 period multiplier.
pub const MULTIPLIER_SCALE_BPS: u32 = 10_000;

/// Largest amount accepted for one cart line or give.
pub const MAX_LINE_AMOUNT: i64 = 1_000_000;

/// Longest finite period, in seconds (a little over a century).
pub const MAX_DURATION_SECS: i64 = 100 * 366 * 86_400;

/// Maximum length of a server id.
pub const MAX_SERVER_ID_LEN: usize = 64;
