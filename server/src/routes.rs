//! Router configuration.

use crate::api::{admin, cart, checkout, health};
use crate::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Cart
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/:id", put(cart::update_item))
        .route("/cart/merge", post(cart::merge))
        .route("/cart/:id", get(cart::get_cart))
        // Checkout sessions
        .route("/checkout/sessions", post(checkout::create_session))
        .route("/checkout/sessions/:id", get(checkout::get_session))
        .route("/checkout/sessions/:id/cancel", post(checkout::cancel_session))
        // Store operations
        .route("/admin/products", post(admin::create_product))
        .route(
            "/admin/products/:id/stock",
            put(admin::adjust_stock).get(admin::stock_level),
        )
        .route("/admin/products/:id/ledger", get(admin::ledger_history));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
