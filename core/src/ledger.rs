//! Stock ledger and inventory projection operations.
//!
//! The ledger is the source of truth: an append-only sequence of signed
//! quantity deltas per product. The projection (one row per product) is the
//! derived, queryable current quantity and must stay equal to the ledger sum
//! within every atomic unit of work. Backends must never mutate the projection
//! except through [`InventoryStore::apply_delta`].

use crate::error::Result;
use crate::types::{LedgerReason, Product, ProductId, StockLedgerEntry, StockLevel, UserId};
use async_trait::async_trait;

/// Maximum length of the free-text note on a ledger entry.
pub const MAX_NOTE_LENGTH: usize = 255;

/// Inventory write and read operations.
///
/// The ledger insert and the projection update happen in one atomic unit: both
/// succeed or both are rolled back. Concurrent `apply_delta` calls on the same
/// product are serialized by the backend (row lock in Postgres, a single mutex
/// in the in-memory store) so no caller observes a partially applied pair.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Create a product with its inventory projection row and an `initial`
    /// ledger entry recording the opening count.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Database`] on storage failure, including
    /// SKU uniqueness violations.
    async fn create_product(
        &self,
        sku: &str,
        name: &str,
        unit_price_cents: i64,
        initial_quantity: i64,
        low_stock_threshold: i64,
    ) -> Result<Product>;

    /// Look up a product by SKU.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::SkuNotFound`] for an unknown SKU.
    async fn product_by_sku(&self, sku: &str) -> Result<Product>;

    /// Append one immutable ledger entry and fold its delta into the
    /// projection, atomically.
    ///
    /// A zero `delta` is allowed: it records a recount that confirmed the
    /// current quantity. Negative projected quantities are an allowed state
    /// for hold accounting; [`StockLevel::is_out_of_stock`] reports them.
    ///
    /// # Errors
    ///
    /// - [`crate::StoreError::ProductNotFound`] if the product reference is
    ///   invalid (checked explicitly here, not in a persistence hook).
    /// - [`crate::StoreError::NoteTooLong`] if `note` exceeds
    ///   [`MAX_NOTE_LENGTH`].
    /// - [`crate::StoreError::Database`] on storage failure; neither write is
    ///   applied.
    async fn apply_delta(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: LedgerReason,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<StockLedgerEntry>;

    /// Ledger entries for a product, most recent first, at most `limit` rows.
    ///
    /// A pure read: no cursor state is retained between calls.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ProductNotFound`] for an unknown product.
    async fn history(&self, product_id: ProductId, limit: u32) -> Result<Vec<StockLedgerEntry>>;

    /// Current projected quantity and low-stock threshold.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ProductNotFound`] for an unknown product.
    async fn stock_level(&self, product_id: ProductId) -> Result<StockLevel>;

    /// Recompute the ledger sum and compare it to the projection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::LedgerDrift`] when the two disagree. The
    /// projection is never overwritten here; recovery requires a compensating
    /// ledger entry.
    async fn verify_projection(&self, product_id: ProductId) -> Result<StockLevel>;
}

/// Reject notes longer than [`MAX_NOTE_LENGTH`] before touching storage.
///
/// # Errors
///
/// Returns [`crate::StoreError::NoteTooLong`] when the note is too long.
pub fn validate_note(note: Option<&str>) -> Result<()> {
    if let Some(text) = note {
        let length = text.chars().count();
        if length > MAX_NOTE_LENGTH {
            return Err(crate::StoreError::NoteTooLong { length });
        }
    }
    Ok(())
}
