//! Smoke tests against a running pickup server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (pickup-cli migrate)
//! - The server running (cargo run -p pickup-server)
//!
//! Run with: cargo test -p pickup-integration-tests -- --ignored

use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use pickup_integration_tests::live_base_url;

#[tokio::test]
#[ignore = "Requires running pickup server"]
async fn test_health_and_readiness() {
    let client = Client::new();
    let base_url = live_base_url();

    let resp = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running pickup server"]
async fn test_issue_without_credentials_is_unauthorized() {
    let client = Client::new();
    let resp = client
        .post(format!("{}/api/tokens", live_base_url()))
        .json(&json!({
            "shop_id": Uuid::new_v4(),
            "customer_location": { "lat": 0.0, "lng": 0.0 },
            "distance_meters": 10.0,
        }))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Response is not JSON");
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
#[ignore = "Requires running pickup server"]
async fn test_cors_preflight() {
    let client = Client::new();
    let resp = client
        .request(Method::OPTIONS, format!("{}/api/tokens", live_base_url()))
        .header("origin", "https://pickup.example")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
