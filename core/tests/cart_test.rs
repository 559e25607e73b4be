//! Cart behavior against the in-memory backend.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use storefront_core::{
    CartOwner, CartStore, CartToken, InventoryStore, MemoryStorefront, StoreError, UserId,
    MAX_LINE_QUANTITY,
};

#[tokio::test]
async fn get_or_create_is_idempotent_per_owner() {
    let store = MemoryStorefront::new();
    let owner = CartOwner::Guest { token: CartToken::new() };

    let first = store.get_or_create_cart(owner, "USD").await.unwrap();
    let second = store.get_or_create_cart(owner, "USD").await.unwrap();
    assert_eq!(first.id, second.id);

    let other = store
        .get_or_create_cart(CartOwner::User { user_id: UserId::new() }, "USD")
        .await
        .unwrap();
    assert_ne!(first.id, other.id);
}

#[tokio::test]
async fn adding_same_sku_sums_quantities() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("TOWEL-01", "Bath towel", 499, 100, 0)
        .await
        .unwrap();
    let cart = store
        .get_or_create_cart(CartOwner::Guest { token: CartToken::new() }, "USD")
        .await
        .unwrap();

    store.add_item(cart.id, product.id, 2).await.unwrap();
    let cart = store.add_item(cart.id, product.id, 3).await.unwrap();

    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.line_for_sku("TOWEL-01").unwrap().quantity, 5);
    assert_eq!(cart.total_cents(), 5 * 499);
}

#[tokio::test]
async fn add_rejects_combined_quantity_above_cap_and_leaves_line_unchanged() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("SOAP-02", "Bar soap", 120, 5000, 0)
        .await
        .unwrap();
    let cart = store
        .get_or_create_cart(CartOwner::Guest { token: CartToken::new() }, "USD")
        .await
        .unwrap();

    store.add_item(cart.id, product.id, 999).await.unwrap();
    let err = store.add_item(cart.id, product.id, 2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::QuantityExceedsLimit { requested: 1001, .. }
    ));

    let cart = store.get_cart(cart.id).await.unwrap();
    assert_eq!(cart.line_for_sku("SOAP-02").unwrap().quantity, 999);
}

#[tokio::test]
async fn add_rejects_out_of_range_quantities() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("MOP-09", "Floor mop", 1299, 10, 0)
        .await
        .unwrap();
    let cart = store
        .get_or_create_cart(CartOwner::Guest { token: CartToken::new() }, "USD")
        .await
        .unwrap();

    assert!(matches!(
        store.add_item(cart.id, product.id, 0).await.unwrap_err(),
        StoreError::InvalidQuantity { quantity: 0, .. }
    ));
    assert!(store
        .add_item(cart.id, product.id, MAX_LINE_QUANTITY + 1)
        .await
        .is_err());
}

#[tokio::test]
async fn update_sets_quantity_and_distinguishes_missing_line_from_missing_cart() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("BRUSH-11", "Scrub brush", 350, 10, 0)
        .await
        .unwrap();
    let cart = store
        .get_or_create_cart(CartOwner::Guest { token: CartToken::new() }, "USD")
        .await
        .unwrap();
    let cart = store.add_item(cart.id, product.id, 2).await.unwrap();
    let line_id = cart.lines[0].id;

    let cart = store.update_item(cart.id, line_id, 7).await.unwrap();
    assert_eq!(cart.lines[0].quantity, 7);

    assert!(matches!(
        store
            .update_item(cart.id, storefront_core::CartLineId::new(), 1)
            .await
            .unwrap_err(),
        StoreError::LineNotFound(_)
    ));
    assert!(matches!(
        store
            .update_item(storefront_core::CartId::new(), line_id, 1)
            .await
            .unwrap_err(),
        StoreError::CartNotFound(_)
    ));
}

#[tokio::test]
async fn merge_moves_new_skus_and_sums_matching_ones_capped() {
    let store = MemoryStorefront::new();
    let towel = store
        .create_product("TOWEL-01", "Bath towel", 499, 5000, 0)
        .await
        .unwrap();
    let soap = store
        .create_product("SOAP-02", "Bar soap", 120, 5000, 0)
        .await
        .unwrap();

    let guest = store
        .get_or_create_cart(CartOwner::Guest { token: CartToken::new() }, "USD")
        .await
        .unwrap();
    store.add_item(guest.id, towel.id, 800).await.unwrap();
    store.add_item(guest.id, soap.id, 3).await.unwrap();

    let user = store
        .get_or_create_cart(CartOwner::User { user_id: UserId::new() }, "USD")
        .await
        .unwrap();
    store.add_item(user.id, towel.id, 600).await.unwrap();

    let merged = store.merge_carts(guest.id, user.id).await.unwrap();
    // 800 + 600 caps at the per-line limit; merge never rejects.
    assert_eq!(merged.line_for_sku("TOWEL-01").unwrap().quantity, MAX_LINE_QUANTITY);
    assert_eq!(merged.line_for_sku("SOAP-02").unwrap().quantity, 3);

    // Guest cart is drained, so a second merge changes nothing.
    let again = store.merge_carts(guest.id, user.id).await.unwrap();
    assert_eq!(again, merged);
    assert!(store.get_cart(guest.id).await.unwrap().lines.is_empty());
}

#[tokio::test]
async fn cart_changes_never_touch_the_ledger() {
    let store = MemoryStorefront::new();
    let product = store
        .create_product("GLOVE-07", "Rubber gloves", 250, 20, 0)
        .await
        .unwrap();
    let cart = store
        .get_or_create_cart(CartOwner::Guest { token: CartToken::new() }, "USD")
        .await
        .unwrap();

    let cart = store.add_item(cart.id, product.id, 15).await.unwrap();
    store.update_item(cart.id, cart.lines[0].id, 3).await.unwrap();

    assert_eq!(store.stock_level(product.id).await.unwrap().quantity, 20);
    assert_eq!(store.history(product.id, 10).await.unwrap().len(), 1);
}
