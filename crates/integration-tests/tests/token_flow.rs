//! Issue and lifecycle flows over HTTP against an in-process server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use pickup_core::TokenStatus;
use pickup_integration_tests::{CUSTOMER_CREDENTIAL, OWNER_CREDENTIAL, TestServer};
use pickup_server::services::memory::{FixedClock, sample_token};

fn issue_body(shop_id: impl serde::Serialize, distance_meters: f64) -> Value {
    json!({
        "shop_id": shop_id,
        "customer_location": { "lat": 12.9716, "lng": 77.5946 },
        "distance_meters": distance_meters,
    })
}

async fn post(client: &Client, url: String, credential: &str, body: &Value) -> (StatusCode, Value) {
    let resp = client
        .post(url)
        .bearer_auth(credential)
        .json(body)
        .send()
        .await
        .expect("Request failed");
    let status = resp.status();
    (status, resp.json().await.expect("Response is not JSON"))
}

async fn get(client: &Client, url: String, credential: &str) -> (StatusCode, Value) {
    let resp = client
        .get(url)
        .bearer_auth(credential)
        .send()
        .await
        .expect("Request failed");
    let status = resp.status();
    (status, resp.json().await.expect("Response is not JSON"))
}

#[tokio::test]
async fn test_three_km_customer_at_idle_shop() {
    let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
    let server = TestServer::spawn_with_clock(Arc::new(FixedClock(now))).await;
    let shop = server.fixture.add_shop(5, true).await;
    let client = Client::new();

    let (status, body) = post(
        &client,
        server.url("/api/tokens"),
        CUSTOMER_CREDENTIAL,
        &issue_body(shop.id, 3000.0),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["traffic_duration_minutes"], 9);
    assert_eq!(body["queue_position"], 1);
    let created_at: DateTime<Utc> = serde_json::from_value(body["created_at"].clone()).unwrap();
    let pickup: DateTime<Utc> =
        serde_json::from_value(body["estimated_pickup_time"].clone()).unwrap();
    assert_eq!(created_at, now);
    assert_eq!(pickup, created_at + TimeDelta::minutes(14));
}

#[tokio::test]
async fn test_full_lifecycle() {
    let server = TestServer::spawn().await;
    let shop = server.fixture.add_shop(4, true).await;
    let client = Client::new();

    let (status, issued) = post(
        &client,
        server.url("/api/tokens"),
        CUSTOMER_CREDENTIAL,
        &issue_body(shop.id, 1500.0),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token_id = issued["token_id"].as_str().unwrap().to_owned();

    let (status, queue) = get(
        &client,
        server.url(&format!("/api/shops/{}/queue", shop.id)),
        CUSTOMER_CREDENTIAL,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["backlog"], 1);

    let (status, token) = post(
        &client,
        server.url(&format!("/api/tokens/{token_id}/preparing")),
        OWNER_CREDENTIAL,
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(token["status"], "preparing");

    // The customer shows the QR code; staff scan it twice.
    let qr = json!({ "token_id": token_id, "token_number": issued["token_number"] }).to_string();
    for _ in 0..2 {
        let (status, token) = post(
            &client,
            server.url("/api/tokens/scan"),
            OWNER_CREDENTIAL,
            &json!({ "payload": qr }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(token["status"], "served");
    }

    let (status, mine) = get(&client, server.url("/api/tokens/mine"), CUSTOMER_CREDENTIAL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["status"], "served");

    let (status, summary) = get(
        &client,
        server.url(&format!("/api/shops/{}/summary", shop.id)),
        OWNER_CREDENTIAL,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["served"], 1);
    assert_eq!(summary["backlog"], 0);
}

#[tokio::test]
async fn test_customer_cancels_and_staff_cannot_serve() {
    let server = TestServer::spawn().await;
    let shop = server.fixture.add_shop(4, true).await;
    let mut token = sample_token(shop.id, TokenStatus::Pending);
    token.customer_id = server.fixture.customer;
    server.fixture.store.seed(token.clone()).await;
    let client = Client::new();

    let (status, body) = post(
        &client,
        server.url(&format!("/api/tokens/{}/cancel", token.id)),
        CUSTOMER_CREDENTIAL,
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = post(
        &client,
        server.url(&format!("/api/tokens/{}/served", token.id)),
        OWNER_CREDENTIAL,
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn test_shop_open_and_close_cycle() {
    let server = TestServer::spawn().await;
    let shop = server.fixture.add_shop(4, false).await;
    let client = Client::new();

    let (status, body) = post(
        &client,
        server.url("/api/tokens"),
        CUSTOMER_CREDENTIAL,
        &issue_body(shop.id, 100.0),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "shop_inactive");
    assert!(server.fixture.store.is_empty().await);

    server.fixture.set_shop_active(shop.id, true).await;
    let (status, _) = post(
        &client,
        server.url("/api/tokens"),
        CUSTOMER_CREDENTIAL,
        &issue_body(shop.id, 100.0),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    server.fixture.set_shop_active(shop.id, false).await;
    let (status, body) = post(
        &client,
        server.url("/api/tokens"),
        CUSTOMER_CREDENTIAL,
        &issue_body(shop.id, 100.0),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "shop_inactive");
    assert_eq!(server.fixture.store.len().await, 1);
}

#[tokio::test]
async fn test_unknown_shop_and_bad_credentials() {
    let server = TestServer::spawn().await;
    let client = Client::new();

    let (status, body) = post(
        &client,
        server.url("/api/tokens"),
        CUSTOMER_CREDENTIAL,
        &issue_body("corner-bakery", 100.0),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "shop_not_found");

    let (status, body) = post(
        &client,
        server.url("/api/tokens"),
        "expired-session",
        &issue_body("corner-bakery", 100.0),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}
