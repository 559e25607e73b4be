//! Shared application state for the HTTP handlers.

use chrono::Duration;
use std::sync::Arc;
use storefront_core::{CartStore, CheckoutStore, InventoryStore};

/// State handed to every handler.
///
/// Storage is held as trait objects so the router can run against the
/// Postgres backend in production and the in-memory backend in tests.
#[derive(Clone)]
pub struct AppState {
    /// Inventory and ledger operations
    pub inventory: Arc<dyn InventoryStore>,
    /// Cart operations
    pub carts: Arc<dyn CartStore>,
    /// Checkout session operations
    pub checkout: Arc<dyn CheckoutStore>,
    /// TTL applied to newly created checkout sessions
    pub session_ttl: Duration,
}

impl AppState {
    /// Bundle the stores and session TTL.
    #[must_use]
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        carts: Arc<dyn CartStore>,
        checkout: Arc<dyn CheckoutStore>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            inventory,
            carts,
            checkout,
            session_ttl,
        }
    }
}
