//! Stock ledger behavior against the in-memory backend.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use storefront_core::{
    InventoryStore, LedgerReason, MemoryStorefront, StoreError, MAX_NOTE_LENGTH,
};

#[tokio::test]
async fn receiving_and_recount_flow() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("TOWEL-01", "Bath towel", 499, 10, 3)
        .await
        .unwrap();

    // Receive 5 more, then a recount finds 2 missing.
    store
        .apply_delta(product.id, 5, LedgerReason::Return, None, None)
        .await
        .unwrap();
    store
        .apply_delta(
            product.id,
            -2,
            LedgerReason::Recount,
            Some("stocktake 2026-08".to_string()),
            None,
        )
        .await
        .unwrap();

    let level = store.stock_level(product.id).await.unwrap();
    assert_eq!(level.quantity, 13);
    assert!(!level.is_low_stock());
    assert_eq!(store.verify_projection(product.id).await.unwrap(), level);
}

#[tokio::test]
async fn zero_delta_recount_is_a_valid_entry() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("SOAP-02", "Bar soap", 120, 4, 1)
        .await
        .unwrap();

    let entry = store
        .apply_delta(
            product.id,
            0,
            LedgerReason::Recount,
            Some("confirmed, no change".to_string()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(entry.delta, 0);

    let history = store.history(product.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(store.stock_level(product.id).await.unwrap().quantity, 4);
}

#[tokio::test]
async fn history_is_most_recent_first_and_limited() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("MOP-09", "Floor mop", 1299, 0, 0)
        .await
        .unwrap();

    for delta in 1..=5 {
        store
            .apply_delta(product.id, delta, LedgerReason::ManualAdjust, None, None)
            .await
            .unwrap();
    }

    let history = store.history(product.id, 3).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].delta, 5);
    assert_eq!(history[1].delta, 4);
    assert_eq!(history[2].delta, 3);
}

#[tokio::test]
async fn unknown_product_is_rejected_explicitly() {
    let store = MemoryStorefront::new();
    let missing = storefront_core::ProductId::new();

    let err = store
        .apply_delta(missing, 1, LedgerReason::ManualAdjust, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ProductNotFound(id) if id == missing));
    assert!(store.history(missing, 10).await.is_err());
    assert!(store.stock_level(missing).await.is_err());
}

#[tokio::test]
async fn over_long_note_is_rejected_without_writing() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("BRUSH-11", "Scrub brush", 350, 2, 0)
        .await
        .unwrap();

    let err = store
        .apply_delta(
            product.id,
            1,
            LedgerReason::ManualAdjust,
            Some("x".repeat(MAX_NOTE_LENGTH + 1)),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NoteTooLong { .. }));

    // The rejected delta left no trace.
    assert_eq!(store.stock_level(product.id).await.unwrap().quantity, 2);
    assert_eq!(store.history(product.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn low_stock_is_at_or_below_threshold() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("GLOVE-07", "Rubber gloves", 250, 3, 3)
        .await
        .unwrap();

    let level = store.stock_level(product.id).await.unwrap();
    assert!(level.is_low_stock());

    store
        .apply_delta(product.id, 1, LedgerReason::Return, None, None)
        .await
        .unwrap();
    assert!(!store.stock_level(product.id).await.unwrap().is_low_stock());
}

proptest! {
    // Any interleaving of deltas keeps the projection equal to the ledger sum.
    #[test]
    fn projection_always_equals_ledger_sum(deltas in proptest::collection::vec(-50i64..=50, 1..20)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let store = MemoryStorefront::new();
            let product = store
                .create_product("PROP-01", "Property", 100, 0, 0)
                .await
                .unwrap();
            let mut expected = 0i64;
            for delta in deltas {
                expected += delta;
                store
                    .apply_delta(product.id, delta, LedgerReason::ManualAdjust, None, None)
                    .await
                    .unwrap();
            }
            let level = store.verify_projection(product.id).await.unwrap();
            assert_eq!(level.quantity, expected);
        });
    }
}
