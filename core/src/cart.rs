//! Cart operations.
//!
//! Carts hold pre-checkout line items and carry no stock commitment; quantity
//! changes never touch the ledger. Only checkout sessions place holds.

use crate::error::Result;
use crate::types::{Cart, CartId, CartLineId, CartOwner, ProductId};
use async_trait::async_trait;

/// Per-line quantity cap.
pub const MAX_LINE_QUANTITY: u32 = 1000;

/// Check a requested quantity against the accepted `[1, MAX_LINE_QUANTITY]`
/// range.
///
/// # Errors
///
/// Returns [`crate::StoreError::InvalidQuantity`] when out of range.
pub fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 || quantity > MAX_LINE_QUANTITY {
        return Err(crate::StoreError::InvalidQuantity {
            quantity,
            limit: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Cart storage operations.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Fetch the cart for `owner`, creating an empty one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Database`] on storage failure.
    async fn get_or_create_cart(&self, owner: CartOwner, currency: &str) -> Result<Cart>;

    /// Fetch a cart with its lines.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::CartNotFound`] for an unknown cart.
    async fn get_cart(&self, cart_id: CartId) -> Result<Cart>;

    /// Add `quantity` of a product to the cart.
    ///
    /// If the cart already has a line for the product's SKU the quantities
    /// sum; a combined quantity above [`MAX_LINE_QUANTITY`] is rejected with
    /// [`crate::StoreError::QuantityExceedsLimit`] and the line is left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Also returns [`crate::StoreError::InvalidQuantity`],
    /// [`crate::StoreError::CartNotFound`] or
    /// [`crate::StoreError::ProductNotFound`].
    async fn add_item(&self, cart_id: CartId, product_id: ProductId, quantity: u32)
        -> Result<Cart>;

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::InvalidQuantity`],
    /// [`crate::StoreError::CartNotFound`] or
    /// [`crate::StoreError::LineNotFound`].
    async fn update_item(
        &self,
        cart_id: CartId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<Cart>;

    /// Merge a guest cart into a user cart.
    ///
    /// For every guest line: a matching SKU in the user cart sums quantities
    /// (capped at [`MAX_LINE_QUANTITY`], never rejected during merge);
    /// otherwise the line moves over. The guest cart is drained, so invoking
    /// the merge twice is a no-op the second time.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::CartNotFound`] if either cart is unknown.
    async fn merge_carts(&self, guest_cart_id: CartId, user_cart_id: CartId) -> Result<Cart>;
}
