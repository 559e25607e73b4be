//! `PostgreSQL` implementation of the checkout session store.

use super::{apply_delta_tx, PostgresStorefront};
use crate::checkout::{CheckoutStore, FinishOutcome, TerminalDisposition};
use crate::error::{Result, Shortage, StoreError};
use crate::types::{
    Address, CartId, CheckoutSession, LedgerReason, ProductId, SessionId, SessionItem,
    SessionStatus, ShippingMethod,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

fn decode_status(value: &str) -> Result<SessionStatus> {
    SessionStatus::parse(value)
        .ok_or_else(|| StoreError::Database(format!("Unknown session status in storage: {value}")))
}

fn decode_method(value: &str) -> Result<ShippingMethod> {
    ShippingMethod::parse(value)
        .ok_or_else(|| StoreError::Database(format!("Unknown shipping method in storage: {value}")))
}

#[async_trait]
impl CheckoutStore for PostgresStorefront {
    async fn create_session(
        &self,
        cart_id: CartId,
        shipping_address: Address,
        billing_address: Address,
        shipping_method: ShippingMethod,
        ttl: Duration,
    ) -> Result<CheckoutSession> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;

        // The cart row lock serializes all session creation for this cart, so
        // the active-session check below cannot race; the partial unique index
        // on (cart_id) WHERE active backs it up at the schema level.
        let cart_locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
                .bind(cart_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to lock cart: {e}")))?;
        if cart_locked.is_none() {
            return Err(StoreError::CartNotFound(cart_id));
        }

        let active: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM checkout_sessions WHERE cart_id = $1 AND status = 'active'",
        )
        .bind(cart_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to check active session: {e}")))?;
        if let Some((existing,)) = active {
            return Err(StoreError::SessionAlreadyActive {
                cart_id,
                session_id: SessionId::from_uuid(existing),
            });
        }

        // Lock inventory rows in product order to avoid deadlocks between
        // concurrent creates sharing products.
        let lines: Vec<(Uuid, String, i32)> = sqlx::query_as(
            "SELECT product_id, sku, quantity FROM cart_items
             WHERE cart_id = $1 ORDER BY product_id",
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query cart lines: {e}")))?;
        if lines.is_empty() {
            return Err(StoreError::EmptyCart(cart_id));
        }

        // Check-and-decrement under row locks: all lines validated before any
        // hold is placed, and the transaction rolls back wholesale on failure.
        let mut shortages = Vec::new();
        #[allow(clippy::cast_sign_loss)] // Quantities are >= 1 by schema constraint
        for (product_uuid, sku, quantity) in &lines {
            let product_id = ProductId::from_uuid(*product_uuid);
            let level: Option<(i64,)> = sqlx::query_as(
                "SELECT quantity FROM inventory WHERE product_id = $1 FOR UPDATE",
            )
            .bind(product_uuid)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to lock inventory row: {e}")))?;
            let available = level.ok_or(StoreError::ProductNotFound(product_id))?.0;
            if available < i64::from(*quantity) {
                shortages.push(Shortage {
                    product_id,
                    sku: sku.clone(),
                    requested: *quantity as u32,
                    available,
                });
            }
        }
        if !shortages.is_empty() {
            // Dropping the transaction rolls everything back; no holds leak.
            return Err(StoreError::InsufficientStock { shortages });
        }

        let session_id = SessionId::new();
        for (product_uuid, _, quantity) in &lines {
            apply_delta_tx(
                &mut tx,
                ProductId::from_uuid(*product_uuid),
                -i64::from(*quantity),
                LedgerReason::OrderHold,
                Some(format!("hold for checkout session {session_id}")),
                None,
            )
            .await?;
        }

        let now = Utc::now();
        let expires_at = now + ttl;
        sqlx::query(
            "INSERT INTO checkout_sessions
                 (id, cart_id, status, shipping_address, billing_address,
                  shipping_method, created_at, expires_at)
             VALUES ($1, $2, 'active', $3, $4, $5, $6, $7)",
        )
        .bind(session_id.as_uuid())
        .bind(cart_id.as_uuid())
        .bind(Json(&shipping_address))
        .bind(Json(&billing_address))
        .bind(shipping_method.as_str())
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to insert session: {e}")))?;

        for (product_uuid, sku, quantity) in &lines {
            sqlx::query(
                "INSERT INTO checkout_session_items (session_id, product_id, sku, quantity)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(session_id.as_uuid())
            .bind(product_uuid)
            .bind(sku)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to insert session item: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit: {e}")))?;

        #[allow(clippy::cast_sign_loss)] // Quantities are >= 1 by schema constraint
        let items = lines
            .into_iter()
            .map(|(product_uuid, sku, quantity)| SessionItem {
                product_id: ProductId::from_uuid(product_uuid),
                sku,
                quantity: quantity as u32,
            })
            .collect();

        Ok(CheckoutSession {
            id: session_id,
            cart_id,
            status: SessionStatus::Active,
            shipping_address,
            billing_address,
            shipping_method,
            items,
            created_at: now,
            expires_at,
        })
    }

    async fn get_session(&self, session_id: SessionId) -> Result<CheckoutSession> {
        let row: Option<(
            Uuid,
            String,
            Json<Address>,
            Json<Address>,
            String,
            DateTime<Utc>,
            DateTime<Utc>,
        )> = sqlx::query_as(
            "SELECT cart_id, status, shipping_address, billing_address,
                    shipping_method, created_at, expires_at
             FROM checkout_sessions WHERE id = $1",
        )
        .bind(session_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query session: {e}")))?;

        let (cart_id, status, shipping, billing, method, created_at, expires_at) =
            row.ok_or(StoreError::SessionNotFound(session_id))?;

        let items: Vec<(Uuid, String, i32)> = sqlx::query_as(
            "SELECT product_id, sku, quantity FROM checkout_session_items
             WHERE session_id = $1 ORDER BY sku",
        )
        .bind(session_id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query session items: {e}")))?;

        #[allow(clippy::cast_sign_loss)] // Quantities are >= 1 by schema constraint
        let items = items
            .into_iter()
            .map(|(product_id, sku, quantity)| SessionItem {
                product_id: ProductId::from_uuid(product_id),
                sku,
                quantity: quantity as u32,
            })
            .collect();

        Ok(CheckoutSession {
            id: session_id,
            cart_id: CartId::from_uuid(cart_id),
            status: decode_status(&status)?,
            shipping_address: shipping.0,
            billing_address: billing.0,
            shipping_method: decode_method(&method)?,
            items,
            created_at,
            expires_at,
        })
    }

    async fn finish_session(
        &self,
        session_id: SessionId,
        disposition: TerminalDisposition,
    ) -> Result<FinishOutcome> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;

        // Compare-and-set claim: of any number of concurrent finishers exactly
        // one sees rows_affected == 1 and performs the release.
        let claimed = sqlx::query(
            "UPDATE checkout_sessions SET status = $2 WHERE id = $1 AND status = 'active'",
        )
        .bind(session_id.as_uuid())
        .bind(disposition.status().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to claim session: {e}")))?;

        if claimed.rows_affected() == 0 {
            let status: Option<(String,)> =
                sqlx::query_as("SELECT status FROM checkout_sessions WHERE id = $1")
                    .bind(session_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Database(format!("Failed to query session: {e}")))?;
            let (status,) = status.ok_or(StoreError::SessionNotFound(session_id))?;
            return Ok(FinishOutcome::AlreadyTerminal(decode_status(&status)?));
        }

        let items: Vec<(Uuid, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM checkout_session_items
             WHERE session_id = $1 ORDER BY product_id",
        )
        .bind(session_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query session items: {e}")))?;

        for (product_uuid, quantity) in items {
            apply_delta_tx(
                &mut tx,
                ProductId::from_uuid(product_uuid),
                i64::from(quantity),
                LedgerReason::OrderRelease,
                Some(format!("release for checkout session {session_id}")),
                None,
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit: {e}")))?;
        Ok(FinishOutcome::Released)
    }

    async fn due_sessions(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<SessionId>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM checkout_sessions
             WHERE status = 'active' AND expires_at <= $1
             ORDER BY expires_at
             LIMIT $2",
        )
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query due sessions: {e}")))?;

        Ok(rows.into_iter().map(|(id,)| SessionId::from_uuid(id)).collect())
    }
}
