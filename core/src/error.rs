//! Error taxonomy for the storefront core.

use crate::types::{CartId, CartLineId, ProductId, SessionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for storefront core operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// One SKU that could not be fully held during checkout creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    /// Product that came up short
    pub product_id: ProductId,
    /// SKU shown to the customer
    pub sku: String,
    /// Quantity the cart asked for
    pub requested: u32,
    /// Quantity actually available when the hold was attempted
    pub available: i64,
}

/// Failure modes of the inventory, cart and checkout operations.
///
/// Grouped by how callers should treat them: validation errors are reported
/// synchronously and never retried, conflicts may be retried with adjusted
/// input, infrastructure errors surface without partial side effects.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    // ═══════════════════════════════════════════════════════════
    // Not found
    // ═══════════════════════════════════════════════════════════
    /// Product reference does not exist.
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// No product with this SKU.
    #[error("SKU {0} not found")]
    SkuNotFound(String),

    /// Cart reference does not exist.
    #[error("Cart {0} not found")]
    CartNotFound(CartId),

    /// Cart line does not exist in this cart.
    #[error("Cart line {0} not found")]
    LineNotFound(CartLineId),

    /// Checkout session does not exist.
    #[error("Checkout session {0} not found")]
    SessionNotFound(SessionId),

    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════
    /// Ledger reason outside the six enumerated kinds.
    #[error("Invalid ledger reason: {0:?}")]
    InvalidReason(String),

    /// Quantity outside the accepted `[1, 1000]` range.
    #[error("Quantity {quantity} is outside the accepted range [1, {limit}]")]
    InvalidQuantity {
        /// Rejected quantity
        quantity: u32,
        /// Upper bound
        limit: u32,
    },

    /// Adding to an existing line would push it past the per-line cap.
    #[error("Line for SKU {sku} would hold {requested}, above the limit of {limit}")]
    QuantityExceedsLimit {
        /// SKU of the offending line
        sku: String,
        /// Combined quantity that was rejected
        requested: u32,
        /// Per-line cap
        limit: u32,
    },

    /// Ledger note longer than 255 characters.
    #[error("Ledger note is {length} characters, above the limit of 255")]
    NoteTooLong {
        /// Rejected note length
        length: usize,
    },

    /// Checkout requires a non-empty cart.
    #[error("Cart {0} has no line items")]
    EmptyCart(CartId),

    // ═══════════════════════════════════════════════════════════
    // Conflicts
    // ═══════════════════════════════════════════════════════════
    /// One or more lines asked for more than is currently available.
    #[error("Insufficient stock for {}", format_shortages(shortages))]
    InsufficientStock {
        /// Every SKU that came up short
        shortages: Vec<Shortage>,
    },

    /// The cart already has an active checkout session (reject policy).
    #[error("Cart {cart_id} already has active checkout session {session_id}")]
    SessionAlreadyActive {
        /// Cart the second create targeted
        cart_id: CartId,
        /// The session already holding stock for it
        session_id: SessionId,
    },

    // ═══════════════════════════════════════════════════════════
    // Invariant violations
    // ═══════════════════════════════════════════════════════════
    /// The projection diverged from the ledger sum. Never silently corrected;
    /// fixing it requires a compensating ledger entry.
    #[error("Ledger drift for product {product_id}: ledger sum {ledger_sum}, projected {projected}")]
    LedgerDrift {
        /// Product whose projection diverged
        product_id: ProductId,
        /// Sum of all ledger deltas
        ledger_sum: i64,
        /// Quantity the projection row reports
        projected: i64,
    },

    // ═══════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════
    /// Database operation failed; the enclosing transaction was rolled back.
    #[error("Database error: {0}")]
    Database(String),

    /// Sweep coordination backend (Redis) failed or is unavailable.
    #[error("Coordination error: {0}")]
    Coordination(String),
}

fn format_shortages(shortages: &[Shortage]) -> String {
    let skus: Vec<&str> = shortages.iter().map(|s| s.sku.as_str()).collect();
    skus.join(", ")
}

impl StoreError {
    /// Bad input shape or range; report synchronously, never retry.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidReason(_)
                | Self::InvalidQuantity { .. }
                | Self::QuantityExceedsLimit { .. }
                | Self::NoteTooLong { .. }
                | Self::EmptyCart(_)
        )
    }

    /// Unknown product/cart/line/session reference.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound(_)
                | Self::SkuNotFound(_)
                | Self::CartNotFound(_)
                | Self::LineNotFound(_)
                | Self::SessionNotFound(_)
        )
    }

    /// Caller may retry with adjusted input; the system never auto-retries.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::InsufficientStock { .. } | Self::SessionAlreadyActive { .. }
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::Database("row not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_names_every_sku() {
        let err = StoreError::InsufficientStock {
            shortages: vec![
                Shortage {
                    product_id: ProductId::new(),
                    sku: "TOWEL-01".to_string(),
                    requested: 3,
                    available: 2,
                },
                Shortage {
                    product_id: ProductId::new(),
                    sku: "SOAP-02".to_string(),
                    requested: 5,
                    available: 0,
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("TOWEL-01"));
        assert!(message.contains("SOAP-02"));
        assert!(err.is_conflict());
        assert!(!err.is_validation());
    }

    #[test]
    fn classifiers_partition_the_taxonomy() {
        let validation = StoreError::InvalidQuantity { quantity: 0, limit: 1000 };
        assert!(validation.is_validation());
        assert!(!validation.is_not_found());

        let missing = StoreError::ProductNotFound(ProductId::new());
        assert!(missing.is_not_found());
        assert!(!missing.is_conflict());
    }
}
