//! Product, seller, and stock endpoint tests.

mod common;

use common::{dec, dec_field, TestHarness};
use serde_json::json;

#[tokio::test]
async fn test_stock_adjustment_round_trip() {
    let harness = TestHarness::new();
    let f = harness.fixture;

    let response = harness
        .server
        .patch(&format!("/v1/products/{}/stock", f.kn95))
        .json(&json!({ "quantity_change": 7, "reason": "restock" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["old_quantity"], 5);
    assert_eq!(body["new_quantity"], 12);
    assert_eq!(body["reason"], "restock");

    let response = harness
        .server
        .patch(&format!("/v1/products/{}/stock", f.kn95))
        .json(&json!({ "quantity_change": -12 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["new_quantity"], 0);
}

#[tokio::test]
async fn test_stock_cannot_go_negative() {
    let harness = TestHarness::new();
    let f = harness.fixture;

    let response = harness
        .server
        .patch(&format!("/v1/products/{}/stock", f.kn95))
        .json(&json!({ "quantity_change": -6 }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_stock");

    let product: serde_json::Value = harness
        .server
        .get(&format!("/v1/products/{}", f.kn95))
        .await
        .json();
    assert_eq!(product["stock_quantity"], 5);
}

#[tokio::test]
async fn test_stock_of_missing_product_is_404() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .patch("/v1/products/999/stock")
        .json(&json!({ "quantity_change": 1 }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_batch_creates_and_updates() {
    let harness = TestHarness::new();
    let f = harness.fixture;

    let response = harness
        .server
        .post(&format!("/v1/sellers/{}/products/batch", f.seller_a))
        .json(&json!({
            "products": [
                {
                    "product_id": f.kn95,
                    "name": "KN95 (black) (10 per pack)",
                    "price": "11.00",
                    "stock_quantity": 8
                },
                { "name": "Cotton (green) (3 per pack)", "price": "4.20", "stock_quantity": 30 }
            ]
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["seller_name"], "Pharmacy A");
    assert_eq!(body["created"].as_array().unwrap().len(), 1);
    assert_eq!(body["updated"].as_array().unwrap().len(), 1);
    assert_eq!(dec_field(&body["updated"][0]["price"]), dec("11.00"));

    let products: serde_json::Value = harness
        .server
        .get(&format!("/v1/sellers/{}/products", f.seller_a))
        .await
        .json();
    assert_eq!(products.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_batch_rejects_taken_name_atomically() {
    let harness = TestHarness::new();
    let f = harness.fixture;

    let response = harness
        .server
        .post(&format!("/v1/sellers/{}/products/batch", f.seller_a))
        .json(&json!({
            "products": [
                { "name": "Fresh (red) (1 per pack)", "price": "2.00", "stock_quantity": 1 },
                { "name": "KN95 (black) (10 per pack)", "price": "2.00", "stock_quantity": 1 }
            ]
        }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "product_name_taken");

    let products: serde_json::Value = harness
        .server
        .get(&format!("/v1/sellers/{}/products", f.seller_a))
        .await
        .json();
    assert_eq!(products.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_duplicate_names_and_empty_batch() {
    let harness = TestHarness::new();
    let f = harness.fixture;
    let url = format!("/v1/sellers/{}/products/batch", f.seller_b);

    let response = harness
        .server
        .post(&url)
        .json(&json!({
            "products": [
                { "name": "Twin", "price": "1.00", "stock_quantity": 1 },
                { "name": "Twin", "price": "1.50", "stock_quantity": 1 }
            ]
        }))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "duplicate_product_names");
    assert_eq!(body["error"]["details"]["names"][0], "Twin");

    let response = harness
        .server
        .post(&url)
        .json(&json!({ "products": [] }))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_batch_size");
}

#[tokio::test]
async fn test_batch_for_missing_seller_is_404() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/sellers/999/products/batch")
        .json(&json!({
            "products": [{ "name": "Ghost", "price": "1.00", "stock_quantity": 1 }]
        }))
        .await;

    response.assert_status_not_found();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "seller_not_found");
}

#[tokio::test]
async fn test_missing_rows_are_404() {
    let harness = TestHarness::new();

    harness.server.get("/v1/buyers/999").await.assert_status_not_found();
    harness.server.get("/v1/sellers/999").await.assert_status_not_found();
    harness.server.get("/v1/products/999").await.assert_status_not_found();
    harness
        .server
        .get("/v1/sellers/999/products")
        .await
        .assert_status_not_found();
}
