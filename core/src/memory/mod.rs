//! In-memory storefront backend.
//!
//! A single-mutex implementation of the storage traits, used as the test
//! double for unit and handler tests. Every operation takes the one lock for
//! its whole duration, which gives the same atomicity and per-product
//! serialization guarantees the Postgres backend gets from transactions and
//! row locks.

use crate::cart::{validate_quantity, CartStore, MAX_LINE_QUANTITY};
use crate::checkout::{CheckoutStore, FinishOutcome, TerminalDisposition};
use crate::error::{Result, Shortage, StoreError};
use crate::ledger::{validate_note, InventoryStore};
use crate::types::{
    Address, Cart, CartId, CartLine, CartLineId, CartOwner, CheckoutSession, LedgerReason,
    Product, ProductId, SessionId, SessionItem, SessionStatus, ShippingMethod, StockLedgerEntry,
    StockLevel, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    sku_index: HashMap<String, ProductId>,
    ledger: Vec<StockLedgerEntry>,
    levels: HashMap<ProductId, StockLevel>,
    carts: HashMap<CartId, Cart>,
    sessions: HashMap<SessionId, CheckoutSession>,
}

/// In-memory implementation of [`InventoryStore`], [`CartStore`] and
/// [`CheckoutStore`].
#[derive(Default)]
pub struct MemoryStorefront {
    state: Mutex<MemoryState>,
}

impl MemoryStorefront {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The one code path that writes stock: append the ledger row, then fold the
/// delta into the projection, under the caller's lock.
fn apply_delta_locked(
    state: &mut MemoryState,
    product_id: ProductId,
    delta: i64,
    reason: LedgerReason,
    note: Option<String>,
    actor: Option<UserId>,
) -> Result<StockLedgerEntry> {
    validate_note(note.as_deref())?;
    if !state.products.contains_key(&product_id) {
        return Err(StoreError::ProductNotFound(product_id));
    }
    let entry = StockLedgerEntry {
        id: Uuid::new_v4(),
        product_id,
        delta,
        reason,
        note,
        created_by: actor,
        created_at: Utc::now(),
    };
    state.ledger.push(entry.clone());
    let level = state
        .levels
        .entry(product_id)
        .or_insert(StockLevel { product_id, quantity: 0, low_stock_threshold: 0 });
    level.quantity += delta;
    Ok(entry)
}

#[async_trait]
impl InventoryStore for MemoryStorefront {
    async fn create_product(
        &self,
        sku: &str,
        name: &str,
        unit_price_cents: i64,
        initial_quantity: i64,
        low_stock_threshold: i64,
    ) -> Result<Product> {
        let mut state = self.lock();
        if state.sku_index.contains_key(sku) {
            return Err(StoreError::Database(format!("SKU {sku} already exists")));
        }
        let product = Product {
            id: ProductId::new(),
            sku: sku.to_string(),
            name: name.to_string(),
            unit_price_cents,
        };
        state.sku_index.insert(sku.to_string(), product.id);
        state.products.insert(product.id, product.clone());
        state.levels.insert(
            product.id,
            StockLevel { product_id: product.id, quantity: 0, low_stock_threshold },
        );
        apply_delta_locked(
            &mut state,
            product.id,
            initial_quantity,
            LedgerReason::Initial,
            Some("initial stock count".to_string()),
            None,
        )?;
        Ok(product)
    }

    async fn product_by_sku(&self, sku: &str) -> Result<Product> {
        let state = self.lock();
        let id = state
            .sku_index
            .get(sku)
            .ok_or_else(|| StoreError::SkuNotFound(sku.to_string()))?;
        state
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SkuNotFound(sku.to_string()))
    }

    async fn apply_delta(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: LedgerReason,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<StockLedgerEntry> {
        let mut state = self.lock();
        apply_delta_locked(&mut state, product_id, delta, reason, note, actor)
    }

    async fn history(&self, product_id: ProductId, limit: u32) -> Result<Vec<StockLedgerEntry>> {
        let state = self.lock();
        if !state.products.contains_key(&product_id) {
            return Err(StoreError::ProductNotFound(product_id));
        }
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|entry| entry.product_id == product_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn stock_level(&self, product_id: ProductId) -> Result<StockLevel> {
        let state = self.lock();
        state
            .levels
            .get(&product_id)
            .copied()
            .ok_or(StoreError::ProductNotFound(product_id))
    }

    async fn verify_projection(&self, product_id: ProductId) -> Result<StockLevel> {
        let state = self.lock();
        let level = state
            .levels
            .get(&product_id)
            .copied()
            .ok_or(StoreError::ProductNotFound(product_id))?;
        let ledger_sum: i64 = state
            .ledger
            .iter()
            .filter(|entry| entry.product_id == product_id)
            .map(|entry| entry.delta)
            .sum();
        if ledger_sum == level.quantity {
            Ok(level)
        } else {
            Err(StoreError::LedgerDrift {
                product_id,
                ledger_sum,
                projected: level.quantity,
            })
        }
    }
}

#[async_trait]
impl CartStore for MemoryStorefront {
    async fn get_or_create_cart(&self, owner: CartOwner, currency: &str) -> Result<Cart> {
        let mut state = self.lock();
        if let Some(cart) = state.carts.values().find(|cart| cart.owner == owner) {
            return Ok(cart.clone());
        }
        let cart = Cart {
            id: CartId::new(),
            owner,
            currency: currency.to_string(),
            lines: Vec::new(),
        };
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn get_cart(&self, cart_id: CartId) -> Result<Cart> {
        let state = self.lock();
        state
            .carts
            .get(&cart_id)
            .cloned()
            .ok_or(StoreError::CartNotFound(cart_id))
    }

    async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        validate_quantity(quantity)?;
        let mut state = self.lock();
        let product = state
            .products
            .get(&product_id)
            .cloned()
            .ok_or(StoreError::ProductNotFound(product_id))?;
        let cart = state
            .carts
            .get_mut(&cart_id)
            .ok_or(StoreError::CartNotFound(cart_id))?;
        if let Some(line) = cart.lines.iter_mut().find(|line| line.sku == product.sku) {
            let combined = line.quantity + quantity;
            if combined > MAX_LINE_QUANTITY {
                return Err(StoreError::QuantityExceedsLimit {
                    sku: product.sku,
                    requested: combined,
                    limit: MAX_LINE_QUANTITY,
                });
            }
            line.quantity = combined;
        } else {
            cart.lines.push(CartLine {
                id: CartLineId::new(),
                product_id,
                sku: product.sku,
                quantity,
                unit_price_cents: product.unit_price_cents,
            });
        }
        Ok(cart.clone())
    }

    async fn update_item(
        &self,
        cart_id: CartId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<Cart> {
        validate_quantity(quantity)?;
        let mut state = self.lock();
        let cart = state
            .carts
            .get_mut(&cart_id)
            .ok_or(StoreError::CartNotFound(cart_id))?;
        let line = cart
            .lines
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or(StoreError::LineNotFound(line_id))?;
        line.quantity = quantity;
        Ok(cart.clone())
    }

    async fn merge_carts(&self, guest_cart_id: CartId, user_cart_id: CartId) -> Result<Cart> {
        let mut state = self.lock();
        let mut guest = state
            .carts
            .remove(&guest_cart_id)
            .ok_or(StoreError::CartNotFound(guest_cart_id))?;
        if !state.carts.contains_key(&user_cart_id) {
            state.carts.insert(guest_cart_id, guest);
            return Err(StoreError::CartNotFound(user_cart_id));
        }
        let merged = {
            let user = state
                .carts
                .get_mut(&user_cart_id)
                .ok_or(StoreError::CartNotFound(user_cart_id))?;
            for line in guest.lines.drain(..) {
                if let Some(existing) = user.lines.iter_mut().find(|l| l.sku == line.sku) {
                    // Merge caps instead of rejecting; the guest should not lose
                    // their cart over a limit they cannot see.
                    existing.quantity = (existing.quantity + line.quantity).min(MAX_LINE_QUANTITY);
                } else {
                    user.lines.push(line);
                }
            }
            user.clone()
        };
        // The drained guest cart stays around, so a second merge finds nothing
        // to move.
        state.carts.insert(guest_cart_id, guest);
        Ok(merged)
    }
}

#[async_trait]
impl CheckoutStore for MemoryStorefront {
    async fn create_session(
        &self,
        cart_id: CartId,
        shipping_address: Address,
        billing_address: Address,
        shipping_method: ShippingMethod,
        ttl: Duration,
    ) -> Result<CheckoutSession> {
        let mut state = self.lock();
        let cart = state
            .carts
            .get(&cart_id)
            .cloned()
            .ok_or(StoreError::CartNotFound(cart_id))?;
        if cart.lines.is_empty() {
            return Err(StoreError::EmptyCart(cart_id));
        }
        if let Some(existing) = state
            .sessions
            .values()
            .find(|session| session.cart_id == cart_id && session.status == SessionStatus::Active)
        {
            return Err(StoreError::SessionAlreadyActive {
                cart_id,
                session_id: existing.id,
            });
        }

        // Check every line before placing any hold: all-or-nothing.
        let mut shortages = Vec::new();
        for line in &cart.lines {
            let level = state
                .levels
                .get(&line.product_id)
                .copied()
                .ok_or(StoreError::ProductNotFound(line.product_id))?;
            if level.quantity < i64::from(line.quantity) {
                shortages.push(Shortage {
                    product_id: line.product_id,
                    sku: line.sku.clone(),
                    requested: line.quantity,
                    available: level.quantity,
                });
            }
        }
        if !shortages.is_empty() {
            return Err(StoreError::InsufficientStock { shortages });
        }

        let session_id = SessionId::new();
        for line in &cart.lines {
            apply_delta_locked(
                &mut state,
                line.product_id,
                -i64::from(line.quantity),
                LedgerReason::OrderHold,
                Some(format!("hold for checkout session {session_id}")),
                None,
            )?;
        }

        let now = Utc::now();
        let session = CheckoutSession {
            id: session_id,
            cart_id,
            status: SessionStatus::Active,
            shipping_address,
            billing_address,
            shipping_method,
            items: cart
                .lines
                .iter()
                .map(|line| SessionItem {
                    product_id: line.product_id,
                    sku: line.sku.clone(),
                    quantity: line.quantity,
                })
                .collect(),
            created_at: now,
            expires_at: now + ttl,
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: SessionId) -> Result<CheckoutSession> {
        let state = self.lock();
        state
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(session_id))
    }

    async fn finish_session(
        &self,
        session_id: SessionId,
        disposition: TerminalDisposition,
    ) -> Result<FinishOutcome> {
        let mut state = self.lock();
        let items = {
            let session = state
                .sessions
                .get_mut(&session_id)
                .ok_or(StoreError::SessionNotFound(session_id))?;
            if session.status != SessionStatus::Active {
                return Ok(FinishOutcome::AlreadyTerminal(session.status));
            }
            session.status = disposition.status();
            session.items.clone()
        };
        for item in items {
            apply_delta_locked(
                &mut state,
                item.product_id,
                i64::from(item.quantity),
                LedgerReason::OrderRelease,
                Some(format!("release for checkout session {session_id}")),
                None,
            )?;
        }
        Ok(FinishOutcome::Released)
    }

    async fn due_sessions(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<SessionId>> {
        let state = self.lock();
        let mut due: Vec<&CheckoutSession> = state
            .sessions
            .values()
            .filter(|session| {
                session.status == SessionStatus::Active && session.expires_at <= now
            })
            .collect();
        due.sort_by_key(|session| session.expires_at);
        Ok(due
            .into_iter()
            .take(limit as usize)
            .map(|session| session.id)
            .collect())
    }
}
