//! Cart endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use storefront_core::{Cart, CartId, CartLineId, CartOwner};

fn default_currency() -> String {
    "USD".to_string()
}

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    /// Guest token or user id the cart belongs to
    pub owner: CartOwner,
    /// Currency for a newly created cart
    #[serde(default = "default_currency")]
    pub currency: String,
    /// SKU to add
    pub sku: String,
    /// Quantity to add
    pub quantity: u32,
}

/// Add an item to the owner's cart, creating the cart on first use.
pub async fn add_item(
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    let product = state.inventory.product_by_sku(&request.sku).await?;
    let cart = state
        .carts
        .get_or_create_cart(request.owner, &request.currency)
        .await?;
    let cart = state
        .carts
        .add_item(cart.id, product.id, request.quantity)
        .await?;
    Ok(Json(cart))
}

/// Body of `PUT /api/cart/items/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    /// Cart the line belongs to
    pub cart_id: CartId,
    /// New quantity for the line
    pub quantity: u32,
}

/// Set a cart line's quantity.
pub async fn update_item(
    State(state): State<AppState>,
    Path(line_id): Path<CartLineId>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .update_item(request.cart_id, line_id, request.quantity)
        .await?;
    Ok(Json(cart))
}

/// Fetch a cart with its lines.
pub async fn get_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<CartId>,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.carts.get_cart(cart_id).await?))
}

/// Body of `POST /api/cart/merge`.
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    /// Cart the guest shopped with before signing in
    pub guest_cart_id: CartId,
    /// The signed-in user's cart
    pub user_cart_id: CartId,
}

/// Merge a guest cart into a user cart after sign-in.
pub async fn merge(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .merge_carts(request.guest_cart_id, request.user_cart_id)
        .await?;
    Ok(Json(cart))
}
