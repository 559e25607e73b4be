//! `PostgreSQL` implementation of the inventory store.

use super::{apply_delta_tx, decode_reason, PostgresStorefront};
use crate::error::{Result, StoreError};
use crate::ledger::InventoryStore;
use crate::types::{
    LedgerReason, Product, ProductId, StockLedgerEntry, StockLevel, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
impl InventoryStore for PostgresStorefront {
    async fn create_product(
        &self,
        sku: &str,
        name: &str,
        unit_price_cents: i64,
        initial_quantity: i64,
        low_stock_threshold: i64,
    ) -> Result<Product> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;

        let product = Product {
            id: ProductId::new(),
            sku: sku.to_string(),
            name: name.to_string(),
            unit_price_cents,
        };
        sqlx::query(
            "INSERT INTO products (id, sku, name, unit_price_cents) VALUES ($1, $2, $3, $4)",
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.unit_price_cents)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return StoreError::Database(format!("SKU {sku} already exists"));
                }
            }
            StoreError::Database(format!("Failed to create product: {e}"))
        })?;

        sqlx::query(
            "INSERT INTO inventory (product_id, quantity, low_stock_threshold) VALUES ($1, 0, $2)",
        )
        .bind(product.id.as_uuid())
        .bind(low_stock_threshold)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to create inventory row: {e}")))?;

        apply_delta_tx(
            &mut tx,
            product.id,
            initial_quantity,
            LedgerReason::Initial,
            Some("initial stock count".to_string()),
            None,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit: {e}")))?;
        Ok(product)
    }

    async fn product_by_sku(&self, sku: &str) -> Result<Product> {
        let row: Option<(Uuid, String, String, i64)> = sqlx::query_as(
            "SELECT id, sku, name, unit_price_cents FROM products WHERE sku = $1",
        )
        .bind(sku)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query product: {e}")))?;

        row.map(|(id, sku, name, unit_price_cents)| Product {
            id: ProductId::from_uuid(id),
            sku,
            name,
            unit_price_cents,
        })
        .ok_or_else(|| StoreError::SkuNotFound(sku.to_string()))
    }

    async fn apply_delta(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: LedgerReason,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<StockLedgerEntry> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;
        let entry = apply_delta_tx(&mut tx, product_id, delta, reason, note, actor).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit: {e}")))?;
        Ok(entry)
    }

    async fn history(&self, product_id: ProductId, limit: u32) -> Result<Vec<StockLedgerEntry>> {
        self.stock_level(product_id).await?;

        let rows: Vec<(Uuid, i64, String, Option<String>, Option<Uuid>, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, delta, reason, note, created_by, created_at
                 FROM stock_ledger
                 WHERE product_id = $1
                 ORDER BY seq DESC
                 LIMIT $2",
            )
            .bind(product_id.as_uuid())
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(|e| StoreError::Database(format!("Failed to query ledger history: {e}")))?;

        rows.into_iter()
            .map(|(id, delta, reason, note, created_by, created_at)| {
                Ok(StockLedgerEntry {
                    id,
                    product_id,
                    delta,
                    reason: decode_reason(&reason)?,
                    note,
                    created_by: created_by.map(UserId::from_uuid),
                    created_at,
                })
            })
            .collect()
    }

    async fn stock_level(&self, product_id: ProductId) -> Result<StockLevel> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT quantity, low_stock_threshold FROM inventory WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to query stock level: {e}")))?;

        row.map(|(quantity, low_stock_threshold)| StockLevel {
            product_id,
            quantity,
            low_stock_threshold,
        })
        .ok_or(StoreError::ProductNotFound(product_id))
    }

    async fn verify_projection(&self, product_id: ProductId) -> Result<StockLevel> {
        let level = self.stock_level(product_id).await?;
        // SUM over BIGINT widens to NUMERIC; cast back so it decodes as i64.
        let (ledger_sum,): (i64,) = sqlx::query_as(
            "SELECT CAST(COALESCE(SUM(delta), 0) AS BIGINT) FROM stock_ledger WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_one(self.pool())
        .await
        .map_err(|e| StoreError::Database(format!("Failed to sum ledger: {e}")))?;

        if ledger_sum == level.quantity {
            Ok(level)
        } else {
            Err(StoreError::LedgerDrift {
                product_id,
                ledger_sum,
                projected: level.quantity,
            })
        }
    }
}
