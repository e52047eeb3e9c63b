//! Integration tests against a running admin server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`stockline-cli migrate`)
//! - The admin server running (`cargo run -p stockline-admin`)
//! - `STOCKLINE_API_TOKEN` set to the server's token
//!
//! Run with: `cargo test -p stockline-integration-tests -- --ignored`

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

/// Base URL for admin API (configurable via environment).
fn admin_base_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

fn api_token() -> String {
    std::env::var("STOCKLINE_API_TOKEN").expect("STOCKLINE_API_TOKEN must be set")
}

fn client() -> Client {
    Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

async fn get_json(client: &Client, path: &str) -> (StatusCode, Value) {
    let resp = client
        .get(format!("{}{path}", admin_base_url()))
        .bearer_auth(api_token())
        .send()
        .await
        .expect("request failed");
    let status = resp.status();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Find one cell in the rules response.
fn cell<'a>(rules: &'a Value, scenario: &str, view: &str) -> Option<&'a Value> {
    rules["rules"]
        .as_array()?
        .iter()
        .find(|c| c["scenario"] == scenario && c["view"] == view)
}

// ============================================================================
// Rule Table
// ============================================================================

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_rules_matrix_is_complete() {
    let (status, body) = get_json(&client(), "/api/availability/rules").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rules"].as_array().map(Vec::len), Some(18));
    assert!(body["cache_ttl_secs"].as_u64().is_some());
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_update_then_reset_rule() {
    let client = client();
    let base_url = admin_base_url();
    let path = "/api/availability/rules/pre_order_po/xlsx_export";

    let resp = client
        .put(format!("{base_url}{path}"))
        .bearer_auth(api_token())
        .header("X-Admin-User", "integration-tests")
        .json(&json!({
            "field_source": {"kind": "formula", "expression": "incoming - committed - 2"},
            "label": "Safe to Order"
        }))
        .send()
        .await
        .expect("Failed to update rule");
    assert_eq!(resp.status(), StatusCode::OK);
    let stored: Value = resp.json().await.expect("Failed to read stored rule");
    assert_eq!(stored["updated_by"], "integration-tests");

    // The edit is visible on the next read, without waiting for the TTL.
    let (_, rules) = get_json(&client, "/api/availability/rules").await;
    let updated = cell(&rules, "pre_order_po", "xlsx_export").expect("cell present");
    assert_eq!(updated["overridden"], true);
    assert_eq!(updated["label"], "Safe to Order");

    let resp = client
        .delete(format!("{base_url}{path}"))
        .bearer_auth(api_token())
        .send()
        .await
        .expect("Failed to reset rule");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (_, rules) = get_json(&client, "/api/availability/rules").await;
    let reset = cell(&rules, "pre_order_po", "xlsx_export").expect("cell present");
    assert_eq!(reset["overridden"], false);
    assert_eq!(reset["label"], "Available to Order");

    // Resetting again has nothing to delete.
    let resp = client
        .delete(format!("{base_url}{path}"))
        .bearer_auth(api_token())
        .send()
        .await
        .expect("Failed to reset rule");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Resolution
// ============================================================================

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_unknown_sku_is_not_found() {
    let (status, body) =
        get_json(&client(), "/api/availability/skus/2147483647?view=buyer_page").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_batch_reports_missing_skus_in_order() {
    let resp = client()
        .post(format!("{}/api/availability/resolve", admin_base_url()))
        .bearer_auth(api_token())
        .json(&json!({"view": "pdf_export", "sku_ids": [2147483647, 2147483646]}))
        .send()
        .await
        .expect("Failed to resolve batch");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to read batch");
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["sku_id"], 2_147_483_647);
    assert_eq!(results[0]["error"], "not_found");
    assert_eq!(results[1]["sku_id"], 2_147_483_646);
}
