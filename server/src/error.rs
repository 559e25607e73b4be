//! Error translation from the storefront core to HTTP responses.
//!
//! Every failure leaves the API inside one envelope:
//! `{ "error": { "code", "message", "details"? } }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use storefront_core::StoreError;

/// HTTP-facing error for all API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    /// Build an error with no structured details.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details for the client.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// 422 for malformed or out-of-range input.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// 404 for unknown references.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    #[cfg(test)]
    pub(crate) const fn status(&self) -> StatusCode {
        self.status
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                "Request failed"
            );
        }
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::InsufficientStock { shortages } => Self::new(
                StatusCode::CONFLICT,
                "INSUFFICIENT_STOCK",
                err.to_string(),
            )
            .with_details(json!({
                "shortages": shortages
                    .iter()
                    .map(|s| json!({
                        "sku": s.sku,
                        "requested": s.requested,
                        "available": s.available,
                    }))
                    .collect::<Vec<_>>(),
            })),

            StoreError::SessionAlreadyActive { cart_id, session_id } => Self::new(
                StatusCode::CONFLICT,
                "SESSION_ALREADY_ACTIVE",
                err.to_string(),
            )
            .with_details(json!({
                "cart_id": cart_id.to_string(),
                "session_id": session_id.to_string(),
            })),

            StoreError::InvalidQuantity { quantity, limit } => {
                Self::validation(err.to_string()).with_details(json!({
                    "field": "quantity",
                    "quantity": quantity,
                    "limit": limit,
                }))
            }

            StoreError::QuantityExceedsLimit { sku, requested, limit } => {
                Self::validation(err.to_string()).with_details(json!({
                    "field": "quantity",
                    "sku": sku,
                    "requested": requested,
                    "limit": limit,
                }))
            }

            StoreError::NoteTooLong { length } => {
                Self::validation(err.to_string()).with_details(json!({
                    "field": "note",
                    "length": length,
                    "limit": storefront_core::MAX_NOTE_LENGTH,
                }))
            }

            StoreError::InvalidReason(_) | StoreError::EmptyCart(_) => {
                Self::validation(err.to_string())
            }

            _ if err.is_not_found() => Self::not_found(err.to_string()),

            // Ledger drift, database and coordination failures: generic 500,
            // the specifics stay in the logs.
            _ => {
                tracing::error!(error = %err, "Storefront core error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                )
            }
        }
    }
}
