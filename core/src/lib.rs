//! Storefront core: append-only stock ledger, carts, and checkout sessions.
//!
//! Stock truth lives in an append-only ledger; the `inventory` projection is
//! the materialized running sum and is only ever written in the same
//! transaction as a ledger append. Checkout sessions snapshot a cart, place
//! `order_hold` ledger entries for every line, and release them exactly once
//! when the session leaves the `active` state, whether it is cancelled by the
//! shopper or expired by the sweep worker.
//!
//! Storage is abstracted behind three traits ([`InventoryStore`],
//! [`CartStore`], [`CheckoutStore`]) with two implementations: a
//! `PostgreSQL` backend for production and a mutex-guarded in-memory backend
//! for tests and local development. Sweep coordination between replicas uses
//! a Redis lease ([`lock::RedisSweepLock`]) with a dependency-free fallback
//! ([`lock::NoCoordination`]).

pub mod cart;
pub mod checkout;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod memory;
pub mod postgres;
pub mod sweep;
pub mod types;

pub use cart::{validate_quantity, CartStore, MAX_LINE_QUANTITY};
pub use checkout::{CheckoutStore, FinishOutcome, TerminalDisposition};
pub use error::{Result, Shortage, StoreError};
pub use ledger::{validate_note, InventoryStore, MAX_NOTE_LENGTH};
pub use lock::{NoCoordination, RedisSweepLock, SweepCoordinator};
pub use memory::MemoryStorefront;
pub use postgres::PostgresStorefront;
pub use sweep::{SweepStats, SweepWorker};
pub use types::{
    Address, Cart, CartId, CartLine, CartLineId, CartOwner, CartToken, CheckoutSession,
    LedgerReason, Product, ProductId, SessionId, SessionItem, SessionStatus, ShippingMethod,
    StockLedgerEntry, StockLevel, UserId,
};
