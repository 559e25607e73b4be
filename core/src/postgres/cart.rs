//! `PostgreSQL` implementation of the cart store.

use super::PostgresStorefront;
use crate::cart::{validate_quantity, CartStore, MAX_LINE_QUANTITY};
use crate::error::{Result, StoreError};
use crate::types::{
    Cart, CartId, CartLine, CartLineId, CartOwner, CartToken, ProductId, UserId,
};
use async_trait::async_trait;
use uuid::Uuid;

fn to_db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| StoreError::InvalidQuantity {
        quantity,
        limit: MAX_LINE_QUANTITY,
    })
}

impl PostgresStorefront {
    async fn fetch_cart(&self, cart_id: CartId) -> Result<Cart> {
        let row: Option<(Option<Uuid>, Option<Uuid>, String)> = sqlx::query_as(
            "SELECT guest_token, user_id, currency FROM carts WHERE id = $1",
        )
        .bind(cart_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query cart: {e}")))?;

        let (guest_token, user_id, currency) =
            row.ok_or(StoreError::CartNotFound(cart_id))?;
        let owner = match (guest_token, user_id) {
            (Some(token), _) => CartOwner::Guest { token: CartToken::from_uuid(token) },
            (None, Some(user)) => CartOwner::User { user_id: UserId::from_uuid(user) },
            (None, None) => {
                return Err(StoreError::Database(format!("Cart {cart_id} has no owner")));
            }
        };

        let lines: Vec<(Uuid, Uuid, String, i32, i64)> = sqlx::query_as(
            "SELECT id, product_id, sku, quantity, unit_price_cents
             FROM cart_items WHERE cart_id = $1 ORDER BY sku",
        )
        .bind(cart_id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query cart lines: {e}")))?;

        #[allow(clippy::cast_sign_loss)] // Quantities are >= 1 by schema constraint
        let lines = lines
            .into_iter()
            .map(|(id, product_id, sku, quantity, unit_price_cents)| CartLine {
                id: CartLineId::from_uuid(id),
                product_id: ProductId::from_uuid(product_id),
                sku,
                quantity: quantity as u32,
                unit_price_cents,
            })
            .collect();

        Ok(Cart { id: cart_id, owner, currency, lines })
    }
}

#[async_trait]
impl CartStore for PostgresStorefront {
    async fn get_or_create_cart(&self, owner: CartOwner, currency: &str) -> Result<Cart> {
        let existing: Option<(Uuid,)> = match owner {
            CartOwner::Guest { token } => {
                sqlx::query_as("SELECT id FROM carts WHERE guest_token = $1")
                    .bind(token.as_uuid())
                    .fetch_optional(self.pool())
                    .await
            }
            CartOwner::User { user_id } => {
                sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
                    .bind(user_id.as_uuid())
                    .fetch_optional(self.pool())
                    .await
            }
        }
        .map_err(|e| StoreError::Database(format!("Failed to look up cart: {e}")))?;

        if let Some((id,)) = existing {
            return self.fetch_cart(CartId::from_uuid(id)).await;
        }

        let cart_id = CartId::new();
        let (guest_token, user_id) = match owner {
            CartOwner::Guest { token } => (Some(*token.as_uuid()), None),
            CartOwner::User { user_id } => (None, Some(*user_id.as_uuid())),
        };
        sqlx::query(
            "INSERT INTO carts (id, guest_token, user_id, currency) VALUES ($1, $2, $3, $4)
             ON CONFLICT DO NOTHING",
        )
        .bind(cart_id.as_uuid())
        .bind(guest_token)
        .bind(user_id)
        .bind(currency)
        .execute(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to create cart: {e}")))?;

        // A concurrent first-add may have won the insert; re-resolve by owner.
        self.get_cart_by_owner(owner).await
    }

    async fn get_cart(&self, cart_id: CartId) -> Result<Cart> {
        self.fetch_cart(cart_id).await
    }

    async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        validate_quantity(quantity)?;
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;

        let cart_exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
                .bind(cart_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to lock cart: {e}")))?;
        if cart_exists.is_none() {
            return Err(StoreError::CartNotFound(cart_id));
        }

        let product: Option<(String, i64)> = sqlx::query_as(
            "SELECT sku, unit_price_cents FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query product: {e}")))?;
        let (sku, unit_price_cents) =
            product.ok_or(StoreError::ProductNotFound(product_id))?;

        let existing: Option<(Uuid, i32)> = sqlx::query_as(
            "SELECT id, quantity FROM cart_items WHERE cart_id = $1 AND sku = $2",
        )
        .bind(cart_id.as_uuid())
        .bind(&sku)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query cart line: {e}")))?;

        if let Some((line_id, current)) = existing {
            #[allow(clippy::cast_sign_loss)] // Quantities are >= 1 by schema constraint
            let combined = current as u32 + quantity;
            if combined > MAX_LINE_QUANTITY {
                return Err(StoreError::QuantityExceedsLimit {
                    sku,
                    requested: combined,
                    limit: MAX_LINE_QUANTITY,
                });
            }
            sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
                .bind(line_id)
                .bind(to_db_quantity(combined)?)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to update cart line: {e}")))?;
        } else {
            sqlx::query(
                "INSERT INTO cart_items (id, cart_id, product_id, sku, quantity, unit_price_cents)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(cart_id.as_uuid())
            .bind(product_id.as_uuid())
            .bind(&sku)
            .bind(to_db_quantity(quantity)?)
            .bind(unit_price_cents)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to insert cart line: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit: {e}")))?;
        self.fetch_cart(cart_id).await
    }

    async fn update_item(
        &self,
        cart_id: CartId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<Cart> {
        validate_quantity(quantity)?;
        let updated = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE id = $1 AND cart_id = $2",
        )
        .bind(line_id.as_uuid())
        .bind(cart_id.as_uuid())
        .bind(to_db_quantity(quantity)?)
        .execute(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to update cart line: {e}")))?;

        if updated.rows_affected() == 0 {
            // Distinguish an unknown cart from an unknown line.
            self.fetch_cart(cart_id).await?;
            return Err(StoreError::LineNotFound(line_id));
        }
        self.fetch_cart(cart_id).await
    }

    async fn merge_carts(&self, guest_cart_id: CartId, user_cart_id: CartId) -> Result<Cart> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;

        // Lock both carts in id order so two merges cannot deadlock.
        let mut lock_order = [guest_cart_id, user_cart_id];
        lock_order.sort();
        for cart_id in lock_order {
            let locked: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
                    .bind(cart_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Database(format!("Failed to lock cart: {e}")))?;
            if locked.is_none() {
                return Err(StoreError::CartNotFound(cart_id));
            }
        }

        let guest_lines: Vec<(Uuid, String, i32)> = sqlx::query_as(
            "SELECT id, sku, quantity FROM cart_items WHERE cart_id = $1",
        )
        .bind(guest_cart_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query guest lines: {e}")))?;

        for (line_id, sku, quantity) in guest_lines {
            // Matching SKU in the user cart: sum quantities, capped. Merge
            // never rejects; the guest cannot see the user cart's totals.
            let summed = sqlx::query(
                "UPDATE cart_items SET quantity = LEAST(quantity + $3, $4)
                 WHERE cart_id = $1 AND sku = $2",
            )
            .bind(user_cart_id.as_uuid())
            .bind(&sku)
            .bind(quantity)
            .bind(to_db_quantity(MAX_LINE_QUANTITY)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to merge cart line: {e}")))?;

            if summed.rows_affected() > 0 {
                sqlx::query("DELETE FROM cart_items WHERE id = $1")
                    .bind(line_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Database(format!("Failed to drop merged line: {e}")))?;
            } else {
                sqlx::query("UPDATE cart_items SET cart_id = $2 WHERE id = $1")
                    .bind(line_id)
                    .bind(user_cart_id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Database(format!("Failed to move cart line: {e}")))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit: {e}")))?;
        self.fetch_cart(user_cart_id).await
    }
}

impl PostgresStorefront {
    async fn get_cart_by_owner(&self, owner: CartOwner) -> Result<Cart> {
        let row: Option<(Uuid,)> = match owner {
            CartOwner::Guest { token } => {
                sqlx::query_as("SELECT id FROM carts WHERE guest_token = $1")
                    .bind(token.as_uuid())
                    .fetch_optional(self.pool())
                    .await
            }
            CartOwner::User { user_id } => {
                sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
                    .bind(user_id.as_uuid())
                    .fetch_optional(self.pool())
                    .await
            }
        }
        .map_err(|e| StoreError::Database(format!("Failed to look up cart: {e}")))?;

        match row {
            Some((id,)) => self.fetch_cart(CartId::from_uuid(id)).await,
            None => Err(StoreError::Database("Cart insert raced and lost".to_string())),
        }
    }
}
