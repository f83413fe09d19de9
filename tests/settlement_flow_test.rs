mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;

use mediapay_core::db::models::TransactionStatus;
use mediapay_core::db::queries;
use mediapay_core::domain::commission::RateDefaults;
use mediapay_core::error::AppError;
use mediapay_core::gateway::{GatewaySelector, PaymentProvider};
use mediapay_core::services::ledger::{CreatePurchase, TransactionLedger};
use mediapay_core::services::settlement::{PayerData, SettlementService};

fn ledger(pool: &sqlx::PgPool) -> TransactionLedger {
    TransactionLedger::new(pool.clone(), RateDefaults::standard())
}

fn settlement(pool: &sqlx::PgPool, gateway: Arc<ScriptedGateway>) -> SettlementService {
    let selector: Arc<dyn GatewaySelector> = Arc::new(SingleGateway(gateway));
    SettlementService::new(pool.clone(), selector)
}

fn purchase(media_id: i64, amount: &str, code: Option<&str>) -> CreatePurchase {
    CreatePurchase {
        media_id,
        amount: dec(amount),
        currency: "ZMW".to_string(),
        payment_method: "MOBILE_MONEY".to_string(),
        payment_provider: PaymentProvider::MtnMoney,
        reseller_link_code: code.map(str::to_string),
        device_info: Some(json!({
            "device_id": "dev-1",
            "device_name": "Pixel 6",
            "device_type": "phone",
            "os": "android",
            "fingerprint": "fp-1"
        })),
    }
}

fn payer() -> PayerData {
    PayerData {
        phone_number: Some("260971234567".to_string()),
        country: Some("ZM".to_string()),
    }
}

#[tokio::test]
async fn direct_sale_flow_completes_and_pays_artist() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, Some("0.5")).await;
    seed_account(&pool, artist, true, true).await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "100", None), buyer)
        .await
        .unwrap();

    assert_eq!(tx.status, TransactionStatus::Pending.as_str());
    assert!(tx.reference.starts_with("TXN-"));
    assert!(!tx.is_reseller_sale);

    let breakdown = tx.breakdown().unwrap();
    assert_eq!(breakdown.platform_amount, dec("50"));
    assert_eq!(breakdown.artist_amount, dec("50"));
    assert_eq!(breakdown.reseller_amount, dec("0"));

    let gateway = ScriptedGateway::successful();
    let result = settlement(&pool, gateway.clone())
        .process_payment(tx.id, PaymentProvider::MtnMoney, payer())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(
        result.transaction.status,
        TransactionStatus::Completed.as_str()
    );
    assert_eq!(
        result.transaction.provider_reference.as_deref(),
        Some("MOCK-REF-1")
    );
    // The frozen breakdown survives the provider-response merge.
    assert_eq!(
        result.transaction.breakdown().unwrap().artist_amount,
        dec("50")
    );

    let artist_payout = result.payouts.artist_payout.as_ref().unwrap();
    assert_eq!(artist_payout.amount, dec("50"));
    assert_eq!(artist_payout.status, "COMPLETED");
    assert!(artist_payout.reference.starts_with("PYT-"));
    assert!(artist_payout.processed_at.is_some());

    assert_eq!(payout_count(&pool, tx.id).await, 1);
    let (earnings, _, _) = user_totals(&pool, artist).await;
    assert_eq!(earnings, dec("50"));
}

#[tokio::test]
async fn reseller_sale_flow_pays_both_and_marks_commission_paid() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let reseller = seed_user(&pool, "reseller", Some("0.25")).await;
    let media = seed_media(&pool, artist, Some("0.6")).await;
    let link = seed_link(&pool, "PROMO-1", reseller, media, Some("0.1"), "ACTIVE").await;
    seed_account(&pool, artist, true, true).await;
    seed_account(&pool, reseller, true, true).await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "100", Some("PROMO-1")), buyer)
        .await
        .unwrap();

    assert!(tx.is_reseller_sale);
    assert_eq!(tx.reseller_link_id, Some(link));
    assert_eq!(conversion_count(&pool, link).await, 1);

    // Link override (0.1) wins over the reseller's own rate (0.25).
    let breakdown = tx.breakdown().unwrap();
    assert_eq!(breakdown.reseller_amount, dec("10"));
    assert_eq!(breakdown.artist_amount, dec("60"));
    assert_eq!(breakdown.platform_amount, dec("30"));

    let commission = queries::get_commission_by_transaction(&pool, tx.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(commission.status, "PENDING");
    assert!(!commission.is_paid);
    assert_eq!(commission.amount, dec("10"));
    assert_eq!(commission.commission_rate, dec("0.1"));

    let gateway = ScriptedGateway::successful();
    let result = settlement(&pool, gateway)
        .process_payment(tx.id, PaymentProvider::MtnMoney, payer())
        .await
        .unwrap();

    assert_eq!(result.payouts.artist_payout.as_ref().unwrap().amount, dec("60"));
    assert_eq!(
        result.payouts.reseller_payout.as_ref().unwrap().amount,
        dec("10")
    );
    assert_eq!(payout_count(&pool, tx.id).await, 2);

    let commission = queries::get_commission_by_transaction(&pool, tx.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(commission.status, "PAID");
    assert!(commission.is_paid);
    assert!(commission.paid_at.is_some());

    let (artist_earnings, _, _) = user_totals(&pool, artist).await;
    assert_eq!(artist_earnings, dec("60"));
    let (_, total_commission, paid_commission) = user_totals(&pool, reseller).await;
    assert_eq!(total_commission, dec("10"));
    assert_eq!(paid_commission, dec("10"));
}

#[tokio::test]
async fn gateway_error_marks_transaction_failed() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, Some("0.5")).await;
    seed_account(&pool, artist, true, true).await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "100", None), buyer)
        .await
        .unwrap();

    let result = settlement(&pool, ScriptedGateway::erroring())
        .process_payment(tx.id, PaymentProvider::MtnMoney, payer())
        .await;

    assert!(matches!(result, Err(AppError::Gateway(_))));

    let stored = queries::get_transaction(&pool, tx.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Failed.as_str());
    assert!(stored.provider_reference.is_none());
    assert_eq!(payout_count(&pool, tx.id).await, 0);

    let (earnings, _, _) = user_totals(&pool, artist).await;
    assert_eq!(earnings, dec("0"));
}

#[tokio::test]
async fn declined_collection_marks_transaction_failed() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, None).await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "40", None), buyer)
        .await
        .unwrap();

    let result = settlement(&pool, ScriptedGateway::declined())
        .process_payment(tx.id, PaymentProvider::MtnMoney, payer())
        .await;

    match result {
        Err(AppError::Gateway(message)) => assert!(message.contains("declined")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected gateway error"),
    }

    let stored = queries::get_transaction(&pool, tx.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Failed.as_str());
}

#[tokio::test]
async fn terminal_transaction_is_not_recollected() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, Some("0.5")).await;
    seed_account(&pool, artist, true, true).await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "100", None), buyer)
        .await
        .unwrap();

    let gateway = ScriptedGateway::successful();
    let service = settlement(&pool, gateway.clone());

    service
        .process_payment(tx.id, PaymentProvider::MtnMoney, payer())
        .await
        .unwrap();
    assert_eq!(gateway.call_count(), 1);

    let result = service
        .process_payment(tx.id, PaymentProvider::MtnMoney, payer())
        .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    // The adapter was never touched the second time.
    assert_eq!(gateway.call_count(), 1);
    assert_eq!(payout_count(&pool, tx.id).await, 1);
}

#[tokio::test]
async fn missing_media_rolls_back_creation() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let reseller = seed_user(&pool, "reseller", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, None).await;
    let link = seed_link(&pool, "PROMO-9", reseller, media, None, "ACTIVE").await;

    let result = ledger(&pool)
        .create_transaction(purchase(9999, "100", Some("PROMO-9")), buyer)
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));

    let tx_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tx_count, 0);

    let commission_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commissions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(commission_count, 0);

    assert_eq!(conversion_count(&pool, link).await, 0);
}

#[tokio::test]
async fn inactive_link_degrades_to_direct_sale() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let reseller = seed_user(&pool, "reseller", None).await;
    let media = seed_media(&pool, artist, Some("0.5")).await;
    let link = seed_link(&pool, "PROMO-OFF", reseller, media, Some("0.3"), "SUSPENDED").await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "100", Some("PROMO-OFF")), buyer)
        .await
        .unwrap();

    assert!(!tx.is_reseller_sale);
    assert!(tx.reseller_link_id.is_none());
    assert_eq!(tx.breakdown().unwrap().reseller_amount, dec("0"));
    assert_eq!(conversion_count(&pool, link).await, 0);
    assert!(queries::get_commission_by_transaction(&pool, tx.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unknown_link_code_degrades_to_direct_sale() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, None).await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "100", Some("NO-SUCH-CODE")), buyer)
        .await
        .unwrap();

    assert!(!tx.is_reseller_sale);
    // Defaults apply: 0.5 artist, remainder to the platform.
    let breakdown = tx.breakdown().unwrap();
    assert_eq!(breakdown.artist_amount, dec("50"));
    assert_eq!(breakdown.platform_amount, dec("50"));
}

#[tokio::test]
async fn missing_reseller_account_does_not_block_artist_payout() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let reseller = seed_user(&pool, "reseller", None).await;
    let media = seed_media(&pool, artist, Some("0.5")).await;
    seed_link(&pool, "PROMO-2", reseller, media, None, "ACTIVE").await;
    seed_account(&pool, artist, true, true).await;
    // Reseller has an account, but it is not verified.
    seed_account(&pool, reseller, true, false).await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "100", Some("PROMO-2")), buyer)
        .await
        .unwrap();

    let result = settlement(&pool, ScriptedGateway::successful())
        .process_payment(tx.id, PaymentProvider::MtnMoney, payer())
        .await
        .unwrap();

    assert!(result.payouts.artist_payout.is_some());
    assert!(result.payouts.reseller_payout.is_none());
    assert_eq!(payout_count(&pool, tx.id).await, 1);

    let (artist_earnings, _, _) = user_totals(&pool, artist).await;
    assert_eq!(artist_earnings, dec("50"));

    // The commission stays pending until the reseller can actually be paid.
    let commission = queries::get_commission_by_transaction(&pool, tx.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(commission.status, "PENDING");
    assert!(!commission.is_paid);

    let (_, total_commission, paid_commission) = user_totals(&pool, reseller).await;
    assert_eq!(total_commission, dec("0"));
    assert_eq!(paid_commission, dec("0"));
}

#[tokio::test]
async fn concurrent_checkouts_increment_conversions_exactly() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let reseller = seed_user(&pool, "reseller", None).await;
    let media = seed_media(&pool, artist, None).await;
    let link = seed_link(&pool, "PROMO-HOT", reseller, media, None, "ACTIVE").await;

    let ledger = ledger(&pool);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        let request = purchase(media, "10", Some("PROMO-HOT"));
        handles.push(tokio::spawn(async move {
            ledger.create_transaction(request, buyer).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(conversion_count(&pool, link).await, 8);

    let tx_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tx_count, 8);
}

#[tokio::test]
async fn user_rate_applies_when_link_has_no_override() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let reseller = seed_user(&pool, "reseller", Some("0.25")).await;
    let media = seed_media(&pool, artist, Some("0.5")).await;
    seed_link(&pool, "PROMO-3", reseller, media, None, "ACTIVE").await;

    let tx = ledger(&pool)
        .create_transaction(purchase(media, "100", Some("PROMO-3")), buyer)
        .await
        .unwrap();

    assert_eq!(tx.breakdown().unwrap().reseller_amount, dec("25"));

    let commission = queries::get_commission_by_transaction(&pool, tx.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(commission.commission_rate, dec("0.25"));
}

#[tokio::test]
async fn non_positive_amount_is_rejected_before_any_write() {
    let (pool, _container) = setup_pool().await;
    let buyer = seed_user(&pool, "buyer", None).await;
    let artist = seed_user(&pool, "artist", None).await;
    let media = seed_media(&pool, artist, None).await;

    let result = ledger(&pool)
        .create_transaction(purchase(media, "0", None), buyer)
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));

    let tx_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tx_count, 0);
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let (pool, _container) = setup_pool().await;

    let result = settlement(&pool, ScriptedGateway::successful())
        .process_payment(424242, PaymentProvider::MtnMoney, payer())
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}
