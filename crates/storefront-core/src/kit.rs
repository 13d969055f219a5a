//! # Kit Expander
//!
//! Flattens a kit into the line items the warehouse merge understands.
//!
//! ```text
//! Kit "Starter" ─┬─ (Sword, 1)        VirtualLine(user, server, Sword, 1)
//!                ├─ (Bread, 16)  ──►  VirtualLine(user, server, Bread, 16)
//!                └─ (Torch, 32)       VirtualLine(user, server, Torch, 32)
//! ```
//!
//! Expansion is purely structural: no price is read or produced. Checkout
//! and the administrative give both feed its output into the same merge.

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::types::{CartItem, Kit};

/// A product line to be merged into a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualLine {
    pub user_uuid: String,
    pub server_id: String,
    pub product_id: i64,
    pub amount: i64,
}

impl From<&CartItem> for VirtualLine {
    fn from(item: &CartItem) -> Self {
        VirtualLine {
            user_uuid: item.user_uuid.clone(),
            server_id: item.server_id.clone(),
            product_id: item.product_id,
            amount: item.amount,
        }
    }
}

/// One virtual line per kit entry, in kit order.
///
/// ## Example
/// ```rust
/// use storefront_core::kit::expand;
/// use storefront_core::types::{Kit, KitItem};
///
/// let kit = Kit {
///     id: 1,
///     name: "Starter".to_string(),
///     price_cents: 500,
///     discount_percent: 0,
///     servers: vec!["alpha".to_string()],
///     items: vec![KitItem { product_id: 10, amount: 3 }],
/// };
///
/// let lines = expand(&kit, "alpha", "user-1");
/// assert_eq!(lines.len(), 1);
/// assert_eq!(lines[0].amount, 3);
/// ```
pub fn expand(kit: &Kit, server_id: &str, user_uuid: &str) -> Vec<VirtualLine> {
    kit.items
        .iter()
        .map(|item| VirtualLine {
            user_uuid: user_uuid.to_string(),
            server_id: server_id.to_string(),
            product_id: item.product_id,
            amount: item.amount,
        })
        .collect()
}

/// Expands `copies` copies of a kit; every entry amount is multiplied.
pub fn expand_copies(
    kit: &Kit,
    server_id: &str,
    user_uuid: &str,
    copies: i64,
) -> CoreResult<Vec<VirtualLine>> {
    if copies < 1 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }

    let mut lines = expand(kit, server_id, user_uuid);
    for line in &mut lines {
        line.amount *= copies;
    }
    Ok(lines)
}
