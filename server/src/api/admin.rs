//! Store-operator endpoints: product creation, manual stock adjustments and
//! the ledger audit trail.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use storefront_core::{
    LedgerReason, Product, ProductId, StockLedgerEntry, StockLevel, UserId,
};

/// Body of `POST /api/admin/products`.
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    /// Unique SKU
    pub sku: String,
    /// Display name
    pub name: String,
    /// Unit price in minor units
    pub unit_price_cents: i64,
    /// Opening stock count, recorded as an `initial` ledger entry
    pub initial_quantity: i64,
    /// Low-stock threshold for the projection
    #[serde(default)]
    pub low_stock_threshold: i64,
}

/// A product together with its current stock level.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    /// The product
    pub product: Product,
    /// Its projected stock level
    pub stock: StockLevel,
}

/// Create a product with an opening stock count.
pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .inventory
        .create_product(
            &request.sku,
            &request.name,
            request.unit_price_cents,
            request.initial_quantity,
            request.low_stock_threshold,
        )
        .await?;
    let stock = state.inventory.stock_level(product.id).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse { product, stock })))
}

/// Body of `PUT /api/admin/products/:id/stock`.
#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    /// Signed quantity change; zero records a confirming recount
    pub delta: i64,
    /// One of the six ledger reasons
    pub reason: String,
    /// Optional free-text note, at most 255 characters
    pub note: Option<String>,
    /// Operator recording the change
    pub actor: Option<UserId>,
}

/// The appended entry and resulting level.
#[derive(Debug, Serialize)]
pub struct AdjustStockResponse {
    /// The ledger entry that was appended
    pub entry: StockLedgerEntry,
    /// Stock level after the delta
    pub stock: StockLevel,
}

/// Apply a manual stock delta through the ledger.
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<AdjustStockResponse>, ApiError> {
    let reason = LedgerReason::parse(&request.reason)
        .ok_or_else(|| storefront_core::StoreError::InvalidReason(request.reason.clone()))?;
    let entry = state
        .inventory
        .apply_delta(product_id, request.delta, reason, request.note, request.actor)
        .await?;
    let stock = state.inventory.stock_level(product_id).await?;
    Ok(Json(AdjustStockResponse { entry, stock }))
}

/// Query string of `GET /api/admin/products/:id/ledger`.
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    /// Maximum entries returned, most recent first
    pub limit: Option<u32>,
}

/// Ledger history response.
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    /// Entries, most recent first
    pub entries: Vec<StockLedgerEntry>,
}

const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Fetch a product's ledger history, most recent first.
pub async fn ledger_history(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = state.inventory.history(product_id, limit).await?;
    Ok(Json(LedgerResponse { entries }))
}

/// Fetch a product's current stock level.
pub async fn stock_level(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<StockLevel>, ApiError> {
    Ok(Json(state.inventory.stock_level(product_id).await?))
}
