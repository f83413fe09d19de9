mod common;

use std::sync::Arc;

use common::*;
use reqwest::StatusCode;
use serde_json::json;

use mediapay_core::domain::commission::RateDefaults;
use mediapay_core::gateway::GatewaySelector;
use mediapay_core::services::ledger::TransactionLedger;
use mediapay_core::services::rates::{RateApiClient, RateConverter};
use mediapay_core::services::settlement::SettlementService;
use mediapay_core::{AppState, create_app};

async fn serve_app(
    pool: &sqlx::PgPool,
    gateway: Arc<ScriptedGateway>,
    rate_api_url: String,
) -> String {
    let selector: Arc<dyn GatewaySelector> = Arc::new(SingleGateway(gateway));

    let state = AppState {
        db: pool.clone(),
        ledger: TransactionLedger::new(pool.clone(), RateDefaults::standard()),
        settlements: SettlementService::new(pool.clone(), selector),
        rates: RateConverter::new(pool.clone(), RateApiClient::new(rate_api_url)),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn purchase_payload(media_id: i64) -> serde_json::Value {
    json!({
        "media_id": media_id,
        "amount": 100,
        "currency": "ZMW",
        "payment_method": "MOBILE_MONEY",
        "payment_provider": "MTN_MONEY",
        "device_info": {
            "device_id": "dev-1",
            "device_name": "Pixel 6",
            "device_type": "phone",
            "os": "android",
            "fingerprint": "fp-1"
        }
    })
}

#[tokio::test]
async fn create_and_fetch_transaction_over_http() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, Some("0.5")).await;

    let base_url = serve_app(&pool, ScriptedGateway::successful(), "http://127.0.0.1:1".into()).await;
    let client = reqwest::Client::new();

    // No identity header: refused, no fallback buyer.
    let res = client
        .post(format!("{}/transactions", base_url))
        .json(&purchase_payload(media))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/transactions", base_url))
        .header("X-User-Id", buyer.to_string())
        .json(&purchase_payload(media))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["status"], "PENDING");
    let reference = created["reference"].as_str().unwrap();
    assert!(reference.starts_with("TXN-"));
    let artist_amount = created["metadata"]["calculated_amounts"]["artist_amount"]
        .as_str()
        .unwrap();
    assert_eq!(dec(artist_amount), dec("50"));
    let id = created["id"].as_i64().unwrap();

    let res = client
        .get(format!("{}/transactions/{}", base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched["reference"], reference);

    let res = client
        .get(format!("{}/transactions?limit=10", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unsupported_provider_is_a_client_error() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, None).await;

    let base_url = serve_app(&pool, ScriptedGateway::successful(), "http://127.0.0.1:1".into()).await;
    let client = reqwest::Client::new();

    let mut payload = purchase_payload(media);
    payload["payment_provider"] = json!("ZAMTEL_KWACHA");

    let res = client
        .post(format!("{}/transactions", base_url))
        .header("X-User-Id", buyer.to_string())
        .json(&payload)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("ZAMTEL_KWACHA"));
}

#[tokio::test]
async fn payment_endpoint_drives_settlement() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, Some("0.5")).await;
    seed_account(&pool, artist, true, true).await;

    let base_url = serve_app(&pool, ScriptedGateway::successful(), "http://127.0.0.1:1".into()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/transactions", base_url))
        .header("X-User-Id", buyer.to_string())
        .json(&purchase_payload(media))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    let res = client
        .post(format!("{}/transactions/{}/payments", base_url, id))
        .json(&json!({
            "provider": "MTN_MONEY",
            "payer": {"phone_number": "260971234567", "country": "ZM"}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let result: serde_json::Value = res.json().await.unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["transaction"]["status"], "COMPLETED");
    let payout_amount = result["payouts"]["artist_payout"]["amount"].as_str().unwrap();
    assert_eq!(dec(payout_amount), dec("50"));

    // Re-driving a settled transaction is refused at the boundary.
    let res = client
        .post(format!("{}/transactions/{}/payments", base_url, id))
        .json(&json!({
            "provider": "MTN_MONEY",
            "payer": {"phone_number": "260971234567"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn currency_conversion_records_last_rate() {
    let (pool, _container) = setup_pool().await;

    let mut rate_server = mockito::Server::new_async().await;
    let first = rate_server
        .mock("GET", "/latest/ZMW")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"base": "ZMW", "rates": {"USD": 0.037}}"#)
        .expect(1)
        .create_async()
        .await;

    let base_url = serve_app(&pool, ScriptedGateway::successful(), rate_server.url()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/rates/convert", base_url))
        .json(&json!({"amount": 100, "from_currency": "ZMW", "to_currency": "USD"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(dec(body["converted_amount"].as_str().unwrap()), dec("3.7"));
    assert_eq!(dec(body["rate"].as_str().unwrap()), dec("0.037"));
    first.assert_async().await;

    let stored: (sqlx::types::BigDecimal,) = sqlx::query_as(
        "SELECT rate FROM currency_exchanges WHERE from_currency = 'ZMW' AND to_currency = 'USD'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(stored.0, dec("0.037"));

    // A fresh fetch overwrites the cached rate: last rate wins.
    let _second = rate_server
        .mock("GET", "/latest/ZMW")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"base": "ZMW", "rates": {"USD": 0.041}}"#)
        .create_async()
        .await;

    let res = client
        .post(format!("{}/rates/convert", base_url))
        .json(&json!({"amount": 100, "from_currency": "ZMW", "to_currency": "USD"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let stored: (sqlx::types::BigDecimal,) = sqlx::query_as(
        "SELECT rate FROM currency_exchanges WHERE from_currency = 'ZMW' AND to_currency = 'USD'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(stored.0, dec("0.041"));
}

#[tokio::test]
async fn health_reports_connected_database() {
    let (pool, _container) = setup_pool().await;

    let base_url = serve_app(&pool, ScriptedGateway::successful(), "http://127.0.0.1:1".into()).await;

    let res = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["db"], "connected");
}
