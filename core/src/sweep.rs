//! Checkout cleanup sweep.
//!
//! One [`SweepWorker`] abstraction serves both cleanup mechanisms: the primary
//! scheduler (Redis-lease coordinated) and the dependency-free fallback are
//! the same worker with a different [`SweepCoordinator`]. Multiple concurrent
//! sweepers are a normal, expected condition — correctness comes from
//! `finish_session` being idempotent, not from exclusivity.

use crate::checkout::{CheckoutStore, FinishOutcome, TerminalDisposition};
use crate::lock::SweepCoordinator;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What one tick of a sweep worker did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Sessions found past their deadline.
    pub due: usize,
    /// Sessions this tick moved to `expired` (holds released).
    pub expired: usize,
    /// Sessions another sweeper got to first.
    pub already_terminal: usize,
    /// Sessions whose expiry failed; they stay due and are retried next tick.
    pub failed: usize,
    /// The whole tick was skipped (lease held elsewhere or coordination down).
    pub skipped: bool,
}

/// Recurring scan-and-expire worker over active checkout sessions.
pub struct SweepWorker {
    store: Arc<dyn CheckoutStore>,
    coordinator: Arc<dyn SweepCoordinator>,
    interval: Duration,
    batch_limit: u32,
    label: &'static str,
}

impl SweepWorker {
    /// Create a worker.
    ///
    /// `label` distinguishes the primary and fallback workers in logs and
    /// metrics.
    #[must_use]
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        coordinator: Arc<dyn SweepCoordinator>,
        interval: Duration,
        batch_limit: u32,
        label: &'static str,
    ) -> Self {
        Self {
            store,
            coordinator,
            interval,
            batch_limit,
            label,
        }
    }

    /// Spawn the worker loop on the runtime.
    ///
    /// The loop stops when `shutdown` receives a value or all senders drop; an
    /// in-flight sweep always finishes first (the select only races between
    /// ticks).
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Worker loop: sweep on every interval tick until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            worker = self.label,
            coordination = self.coordinator.describe(),
            interval_secs = self.interval.as_secs_f64(),
            "Checkout sweep worker started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.recv() => {
                    info!(worker = self.label, "Checkout sweep worker stopping");
                    break;
                }
            }
        }
    }

    /// One sweep: find sessions past `expires_at` and expire them.
    ///
    /// Per-session failures are logged and do not abort the sweep; one
    /// session's error must not block the release of the others' holds.
    #[tracing::instrument(skip(self), fields(worker = self.label))]
    pub async fn sweep_once(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        match self.coordinator.try_acquire().await {
            Ok(true) => {}
            Ok(false) => {
                debug!(worker = self.label, "Sweep lease held elsewhere, skipping tick");
                stats.skipped = true;
                return stats;
            }
            Err(e) => {
                // Primary degrades here; the fallback worker keeps sweeping.
                warn!(worker = self.label, error = %e, "Sweep coordination unavailable, skipping tick");
                metrics::counter!("checkout_sweep_coordination_errors_total").increment(1);
                stats.skipped = true;
                return stats;
            }
        }

        let due = match self.store.due_sessions(Utc::now(), self.batch_limit).await {
            Ok(due) => due,
            Err(e) => {
                error!(worker = self.label, error = %e, "Failed to query due checkout sessions");
                self.coordinator.release().await;
                stats.skipped = true;
                return stats;
            }
        };
        stats.due = due.len();

        for session_id in due {
            match self
                .store
                .finish_session(session_id, TerminalDisposition::Expired)
                .await
            {
                Ok(FinishOutcome::Released) => {
                    stats.expired += 1;
                    metrics::counter!("checkout_sessions_expired_total").increment(1);
                }
                Ok(FinishOutcome::AlreadyTerminal(status)) => {
                    debug!(
                        worker = self.label,
                        session = %session_id,
                        status = %status,
                        "Session already terminal, nothing to release"
                    );
                    stats.already_terminal += 1;
                }
                Err(e) => {
                    error!(
                        worker = self.label,
                        session = %session_id,
                        error = %e,
                        "Failed to expire checkout session; will retry next tick"
                    );
                    metrics::counter!("checkout_sweep_failures_total").increment(1);
                    stats.failed += 1;
                }
            }
        }

        self.coordinator.release().await;

        if stats.due > 0 {
            info!(
                worker = self.label,
                due = stats.due,
                expired = stats.expired,
                already_terminal = stats.already_terminal,
                failed = stats.failed,
                "Checkout sweep finished"
            );
        } else {
            debug!(worker = self.label, "Checkout sweep found nothing due");
        }
        stats
    }
}
