//! HTTP API handlers.

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod health;
