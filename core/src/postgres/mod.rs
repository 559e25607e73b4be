//! `PostgreSQL` storefront backend.
//!
//! Implements the storage traits on top of sqlx. Atomicity and per-product
//! serialization come from transactions plus `SELECT ... FOR UPDATE` on the
//! inventory projection row; the ledger insert and projection update always
//! travel in the same transaction.

mod cart;
mod checkout;
mod ledger;

use crate::error::{Result, StoreError};
use crate::types::{LedgerReason, ProductId, StockLedgerEntry, UserId};
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// `PostgreSQL`-backed implementation of [`crate::InventoryStore`],
/// [`crate::CartStore`] and [`crate::CheckoutStore`].
#[derive(Clone)]
pub struct PostgresStorefront {
    pool: PgPool,
}

impl PostgresStorefront {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Access the underlying pool, e.g. for health checks.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

/// The single write path for stock inside an open transaction: lock the
/// projection row, append the ledger entry, fold the delta in.
///
/// Every stock mutation in this backend funnels through here so the
/// ledger-sum invariant is enforced in one place.
pub(crate) async fn apply_delta_tx(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    delta: i64,
    reason: LedgerReason,
    note: Option<String>,
    actor: Option<UserId>,
) -> Result<StockLedgerEntry> {
    crate::ledger::validate_note(note.as_deref())?;

    // Serializes all concurrent apply_delta calls for this product.
    let locked: Option<(i64,)> =
        sqlx::query_as("SELECT quantity FROM inventory WHERE product_id = $1 FOR UPDATE")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to lock inventory row: {e}")))?;

    if locked.is_none() {
        // Explicit application-level existence check, not a persistence hook.
        let product_exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to check product: {e}")))?;
        if product_exists.is_none() {
            return Err(StoreError::ProductNotFound(product_id));
        }
        sqlx::query(
            "INSERT INTO inventory (product_id, quantity, low_stock_threshold) VALUES ($1, 0, 0)",
        )
        .bind(product_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to create inventory row: {e}")))?;
    }

    let entry = StockLedgerEntry {
        id: Uuid::new_v4(),
        product_id,
        delta,
        reason,
        note,
        created_by: actor,
        created_at: Utc::now(),
    };
    sqlx::query(
        "INSERT INTO stock_ledger (id, product_id, delta, reason, note, created_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id)
    .bind(entry.product_id.as_uuid())
    .bind(entry.delta)
    .bind(entry.reason.as_str())
    .bind(entry.note.as_deref())
    .bind(entry.created_by.as_ref().map(UserId::as_uuid))
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| StoreError::Database(format!("Failed to append ledger entry: {e}")))?;

    sqlx::query("UPDATE inventory SET quantity = quantity + $2 WHERE product_id = $1")
        .bind(entry.product_id.as_uuid())
        .bind(entry.delta)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to update projection: {e}")))?;

    Ok(entry)
}

pub(crate) fn decode_reason(value: &str) -> Result<LedgerReason> {
    LedgerReason::parse(value)
        .ok_or_else(|| StoreError::Database(format!("Unknown ledger reason in storage: {value}")))
}
