//! Checkout session endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use storefront_core::{
    Address, CartId, CheckoutSession, SessionId, ShippingMethod, TerminalDisposition,
};

/// Body of `POST /api/checkout/sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Cart to snapshot
    pub cart_id: CartId,
    /// Delivery address
    pub shipping_address: Address,
    /// Billing address
    pub billing_address: Address,
    /// Chosen shipping method
    pub shipping_method: ShippingMethod,
}

/// Create a checkout session: snapshot the cart and place stock holds.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CheckoutSession>), ApiError> {
    let session = state
        .checkout
        .create_session(
            request.cart_id,
            request.shipping_address,
            request.billing_address,
            request.shipping_method,
            state.session_ttl,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Fetch a checkout session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<CheckoutSession>, ApiError> {
    Ok(Json(state.checkout.get_session(session_id).await?))
}

/// Cancel a checkout session and release its holds.
///
/// Idempotent: cancelling a session that already reached a terminal state
/// succeeds and returns the session as it is, original terminal status intact.
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<CheckoutSession>, ApiError> {
    state
        .checkout
        .finish_session(session_id, TerminalDisposition::Cancelled)
        .await?;
    Ok(Json(state.checkout.get_session(session_id).await?))
}
