//! Checkout session lifecycle.
//!
//! A checkout session snapshots a cart into a reservation: creating one places
//! an `order_hold` ledger entry per line, and leaving the `active` state
//! releases those holds with matching `order_release` entries exactly once.
//! Completion (successful order placement) is driven from outside this core;
//! expiry and cancellation are handled here.

use crate::error::Result;
use crate::types::{Address, CartId, CheckoutSession, SessionId, SessionStatus, ShippingMethod};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// How an active session is being taken out of the `active` state.
///
/// Both dispositions release the session's holds; they differ only in the
/// terminal status recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalDisposition {
    /// The expiry sweep found the session past its deadline.
    Expired,
    /// The user cancelled explicitly.
    Cancelled,
}

impl TerminalDisposition {
    /// The session status this disposition records.
    #[must_use]
    pub const fn status(self) -> SessionStatus {
        match self {
            Self::Expired => SessionStatus::Expired,
            Self::Cancelled => SessionStatus::Cancelled,
        }
    }
}

/// Result of [`CheckoutStore::finish_session`].
///
/// `AlreadyTerminal` is a soft outcome, not an error: sweeps race with user
/// cancellation by design, and the loser of the race must no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishOutcome {
    /// This call claimed the session and released its holds.
    Released,
    /// Someone else already moved the session out of `active`.
    AlreadyTerminal(SessionStatus),
}

/// Checkout session storage operations.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Snapshot a cart into an active session and place stock holds.
    ///
    /// Validation and hold placement are all-or-nothing across lines: if any
    /// line's requested quantity exceeds what is currently available (the
    /// projection already nets out other active holds), nothing is written and
    /// the error names every short SKU. The availability check and decrement
    /// are serialized per product so concurrent creates can never place holds
    /// totalling more than the on-hand quantity.
    ///
    /// Policy: a cart with an active session rejects a second create with
    /// [`crate::StoreError::SessionAlreadyActive`].
    ///
    /// # Errors
    ///
    /// [`crate::StoreError::CartNotFound`], [`crate::StoreError::EmptyCart`],
    /// [`crate::StoreError::InsufficientStock`],
    /// [`crate::StoreError::SessionAlreadyActive`] or
    /// [`crate::StoreError::Database`].
    async fn create_session(
        &self,
        cart_id: CartId,
        shipping_address: Address,
        billing_address: Address,
        shipping_method: ShippingMethod,
        ttl: Duration,
    ) -> Result<CheckoutSession>;

    /// Fetch a session with its snapshotted items.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::SessionNotFound`] for an unknown session.
    async fn get_session(&self, session_id: SessionId) -> Result<CheckoutSession>;

    /// Move an active session to a terminal state and release its holds.
    ///
    /// Idempotent under concurrency: the status transition is a
    /// compare-and-set on `active`, so of any number of concurrent callers
    /// exactly one observes [`FinishOutcome::Released`] and performs the
    /// release; the rest get [`FinishOutcome::AlreadyTerminal`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::SessionNotFound`] or
    /// [`crate::StoreError::Database`].
    async fn finish_session(
        &self,
        session_id: SessionId,
        disposition: TerminalDisposition,
    ) -> Result<FinishOutcome>;

    /// Active sessions whose `expires_at` is at or before `now`, oldest first,
    /// at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Database`] on storage failure.
    async fn due_sessions(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<SessionId>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn dispositions_map_to_terminal_statuses() {
        assert_eq!(TerminalDisposition::Expired.status(), SessionStatus::Expired);
        assert_eq!(TerminalDisposition::Cancelled.status(), SessionStatus::Cancelled);
        assert!(TerminalDisposition::Expired.status().is_terminal());
    }
}
