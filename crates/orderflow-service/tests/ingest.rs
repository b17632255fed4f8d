//! Order ingest integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::json;

use orderflow_core::UserId;

// ============================================================================
// Submit Order
// ============================================================================

#[tokio::test]
async fn submit_order_appends_to_log() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/log")
        .json(&json!({
            "user_id": "u1",
            "timestamp": "2025-05-31T10:00:00Z",
            "menu_type": "washoku"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body, json!({"status": "ok"}));
    assert_eq!(harness.log_len(), 1);
}

#[tokio::test]
async fn submit_order_does_not_validate_menu_type() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/log")
        .json(&json!({
            "user_id": "u3",
            "timestamp": "2025-05-31T10:00:00Z",
            "menu_type": "dessert"
        }))
        .await;

    response.assert_status_ok();
    assert_eq!(harness.log_len(), 1);
}

#[tokio::test]
async fn submit_order_rejects_bad_timestamp() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/log")
        .json(&json!({
            "user_id": "u1",
            "timestamp": "yesterday",
            "menu_type": "washoku"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(harness.log_len(), 0);
}

#[tokio::test]
async fn submit_order_rejects_empty_user() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/log")
        .json(&json!({
            "user_id": "",
            "timestamp": "2025-05-31T10:00:00Z",
            "menu_type": "washoku"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.log_len(), 0);
}

#[tokio::test]
async fn submit_order_rejects_malformed_json() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/log")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");

    let response = harness
        .server
        .post("/api/log")
        .json(&json!({"user_id": "u1"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_order_fails_when_append_fails() {
    let harness = TestHarness::new();
    // A topic that was never created makes every append fail.
    let mut config = harness.config.clone();
    config.log_topic = "missing".into();
    let state = orderflow_service::AppState::new(harness.log.clone(), harness.store.clone(), config);
    let server = axum_test::TestServer::new(orderflow_service::create_router(state)).unwrap();

    let response = server
        .post("/api/log")
        .json(&json!({
            "user_id": "u1",
            "timestamp": "2025-05-31T10:00:00Z",
            "menu_type": "washoku"
        }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "internal_error");
}

// ============================================================================
// Through the consumer loops
// ============================================================================

#[tokio::test]
async fn ingested_orders_reach_the_counters() {
    let mut harness = TestHarness::with_consumers(2);

    for (user, minute, menu) in [
        ("u1", 0, "washoku"),
        ("u2", 1, "yoshoku"),
        ("u1", 2, "washoku"),
        ("u3", 3, "dessert"),
    ] {
        harness
            .server
            .post("/api/log")
            .json(&json!({
                "user_id": user,
                "timestamp": format!("2025-05-31T10:0{minute}:00Z"),
                "menu_type": menu
            }))
            .await
            .assert_status_ok();
    }

    harness.wait_for_counts("u1", 2).await;
    harness.wait_for_counts("u2", 1).await;
    let u3 = UserId::new("u3").unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while harness.store.raw_orders_for_user(&u3).unwrap().is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("invalid order was not written");

    let response = harness.server.get("/api/users/u1/counts").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body,
        json!({"user_id": "u1", "washoku_cnt": 2, "yoshoku_cnt": 0})
    );

    let body: serde_json::Value = harness.server.get("/api/users/u2/counts").await.json();
    assert_eq!(body["washoku_cnt"], 0);
    assert_eq!(body["yoshoku_cnt"], 1);

    let stats = harness.stop_consumers().await;
    let applied: u64 = stats.iter().map(|s| s.applied).sum();
    let failed: u64 = stats.iter().map(|s| s.failed).sum();
    assert_eq!(applied, 3);
    assert_eq!(failed, 1);

    // The invalid menu type left a fact row but no counters.
    assert_eq!(harness.store.raw_orders_for_user(&u3).unwrap().len(), 1);
    harness
        .server
        .get("/api/users/u3/counts")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
