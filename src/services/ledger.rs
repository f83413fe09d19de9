//! Transaction ledger: turns a purchase request into persisted state.
//!
//! Everything from the media lookup to the commission insert runs inside
//! one store transaction, so a failure anywhere leaves no partial writes
//! behind (no orphaned conversion-count increment, no transaction without
//! its commission row).

use bigdecimal::BigDecimal;
use sqlx::PgPool;

use crate::db::models::{NewTransaction, Transaction, TransactionMetadata};
use crate::db::queries;
use crate::domain::commission::{compute_shares, resolve_reseller_rate, RateDefaults};
use crate::domain::reference;
use crate::error::AppError;
use crate::gateway::PaymentProvider;
use crate::validation;

#[derive(Debug, Clone)]
pub struct CreatePurchase {
    pub media_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub payment_method: String,
    pub payment_provider: PaymentProvider,
    pub reseller_link_code: Option<String>,
    pub device_info: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct TransactionLedger {
    pool: PgPool,
    defaults: RateDefaults,
}

impl TransactionLedger {
    pub fn new(pool: PgPool, defaults: RateDefaults) -> Self {
        Self { pool, defaults }
    }

    pub async fn create_transaction(
        &self,
        request: CreatePurchase,
        buyer_user_id: i64,
    ) -> Result<Transaction, AppError> {
        // Fail fast, before any store work.
        validation::validate_positive_amount(&request.amount)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validation::validate_currency_code(&request.currency)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validation::validate_required("payment_method", &request.payment_method)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validation::validate_max_len(
            "payment_method",
            &request.payment_method,
            validation::PAYMENT_METHOD_MAX_LEN,
        )
        .map_err(|e| AppError::Validation(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let media = queries::get_media(&mut tx, request.media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", request.media_id)))?;

        // Reseller attribution is best-effort: an unknown or inactive code
        // degrades to a direct sale rather than failing the purchase.
        let mut is_reseller_sale = false;
        let mut reseller_link_id = None;
        let mut reseller_rate: Option<BigDecimal> = None;
        let mut reseller_id = None;

        if let Some(code) = request.reseller_link_code.as_deref() {
            match queries::get_reseller_link_by_code(&mut tx, code).await? {
                Some(link) if link.is_active() => {
                    let user_rate =
                        queries::get_user_commission_rate(&mut tx, link.reseller_id).await?;
                    let rate = resolve_reseller_rate(
                        link.custom_commission_rate.as_ref(),
                        user_rate.as_ref(),
                        &self.defaults,
                    );

                    // A conversion accrues per checkout attempt, inside this
                    // same unit, independent of the eventual payment outcome.
                    queries::increment_link_conversions(&mut tx, link.id).await?;

                    is_reseller_sale = true;
                    reseller_link_id = Some(link.id);
                    reseller_id = Some(link.reseller_id);
                    reseller_rate = Some(rate);
                }
                _ => {
                    tracing::debug!(code, "reseller code unknown or inactive, direct sale");
                }
            }
        }

        let shares = compute_shares(
            &request.amount,
            media.artist_commission_rate.as_ref(),
            is_reseller_sale,
            reseller_rate.as_ref(),
            &self.defaults,
        );

        if shares.platform_amount < BigDecimal::from(0) {
            tracing::warn!(
                media_id = media.id,
                platform_amount = %shares.platform_amount,
                "commission rates exceed 100%, platform share is negative"
            );
        }

        let new_tx = NewTransaction {
            reference: reference::purchase_reference(),
            user_id: buyer_user_id,
            media_id: media.id,
            amount: request.amount.clone(),
            currency: request.currency.clone(),
            payment_method: request.payment_method.clone(),
            payment_provider: request.payment_provider.as_str().to_string(),
            is_reseller_sale,
            reseller_link_id,
            metadata: TransactionMetadata {
                device_info: request.device_info.clone(),
                calculated_amounts: Some(shares.clone()),
                provider_response: None,
            },
        };

        let transaction = queries::insert_transaction(&mut tx, &new_tx)
            .await
            .map_err(map_reference_collision)?;

        if is_reseller_sale {
            let reseller_id = reseller_id.ok_or_else(|| {
                AppError::Internal("reseller sale without reseller id".to_string())
            })?;
            let rate = reseller_rate.ok_or_else(|| {
                AppError::Internal("reseller sale without resolved rate".to_string())
            })?;

            queries::insert_commission(
                &mut tx,
                transaction.id,
                media.id,
                reseller_id,
                &shares.reseller_amount,
                &request.currency,
                &rate,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            transaction_id = transaction.id,
            reference = %transaction.reference,
            is_reseller_sale,
            "purchase transaction created"
        );

        Ok(transaction)
    }
}

/// The reference carries a unique constraint; a timestamp+suffix collision
/// is retryable, not a client fault.
fn map_reference_collision(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.constraint() == Some("transactions_reference_key") {
            return AppError::Internal("transaction reference collision, retry".to_string());
        }
    }

    AppError::Database(e)
}
