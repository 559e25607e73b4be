//! HTTP server for the storefront inventory and checkout core.
//!
//! Thin axum surface over `storefront-core`: handlers translate requests into
//! store-trait calls and core errors into one JSON error envelope. The server
//! also owns the two checkout cleanup sweep workers.

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
