//! Settlement orchestration: the PENDING -> {COMPLETED, FAILED} state
//! machine over a purchase transaction. Both terminal states are final;
//! a transaction that already reached one is never re-driven through the
//! gateway.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use crate::db::models::Transaction;
use crate::db::queries;
use crate::error::AppError;
use crate::gateway::{CollectionRequest, GatewaySelector, PaymentProvider};
use crate::services::payout::{DistributionOutcome, PayoutDistributor};
use crate::validation;

#[derive(Debug, Clone, Deserialize)]
pub struct PayerData {
    pub phone_number: Option<String>,
    pub country: Option<String>,
}

#[derive(Serialize)]
pub struct PaymentResult {
    pub success: bool,
    pub transaction: Transaction,
    pub provider_reference: String,
    pub message: String,
    pub payouts: DistributionOutcome,
}

#[derive(Clone)]
pub struct SettlementService {
    pool: PgPool,
    gateways: Arc<dyn GatewaySelector>,
    distributor: PayoutDistributor,
}

impl SettlementService {
    pub fn new(pool: PgPool, gateways: Arc<dyn GatewaySelector>) -> Self {
        let distributor = PayoutDistributor::new(pool.clone());
        Self {
            pool,
            gateways,
            distributor,
        }
    }

    pub async fn process_payment(
        &self,
        transaction_id: i64,
        provider: PaymentProvider,
        payer: PayerData,
    ) -> Result<PaymentResult, AppError> {
        let transaction = queries::get_transaction(&self.pool, transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Transaction {} not found", transaction_id))
            })?;

        let status = transaction
            .parsed_status()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        // Duplicate-call guard: a terminal transaction short-circuits here,
        // before the adapter is ever touched.
        if status.is_terminal() {
            return Err(AppError::BadRequest(format!(
                "Transaction {} is already {}",
                transaction_id, status
            )));
        }

        let phone_number = payer
            .phone_number
            .as_deref()
            .ok_or_else(|| AppError::Validation("phone_number: is required".to_string()))?;
        validation::validate_msisdn(phone_number)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let request = CollectionRequest {
            amount: transaction.amount.clone(),
            currency: transaction.currency.clone(),
            reference: transaction.reference.clone(),
            phone_number: phone_number.to_string(),
            country: payer.country.clone(),
        };

        let gateway = self.gateways.select(provider);

        tracing::info!(
            transaction_id,
            provider = %provider,
            reference = %transaction.reference,
            "dispatching collection"
        );

        match gateway.collect(&request).await {
            Ok(outcome) if outcome.success => {
                self.complete(transaction_id, outcome.provider_reference, outcome.message, &outcome.raw)
                    .await
            }
            Ok(outcome) => {
                self.mark_failed(transaction_id).await;
                Err(AppError::Gateway(outcome.message))
            }
            Err(e) => {
                self.mark_failed(transaction_id).await;
                Err(AppError::Gateway(e.to_string()))
            }
        }
    }

    async fn complete(
        &self,
        transaction_id: i64,
        provider_reference: String,
        message: String,
        provider_response: &serde_json::Value,
    ) -> Result<PaymentResult, AppError> {
        let updated = queries::update_transaction_completed(
            &self.pool,
            transaction_id,
            &provider_reference,
            provider_response,
        )
        .await
        .map_err(|e| {
            // Funds are collected but the row is still PENDING. Nothing
            // here can repair that; flag it for operator reconciliation.
            tracing::error!(
                transaction_id,
                provider_reference = %provider_reference,
                error = %e,
                "funds collected but COMPLETED write failed, transaction left PENDING"
            );
            AppError::Database(e)
        })?;

        let transaction = match updated {
            Some(transaction) => transaction,
            None => {
                tracing::warn!(
                    transaction_id,
                    "transaction reached a terminal state concurrently, skipping payout"
                );
                return Err(AppError::BadRequest(format!(
                    "Transaction {} is already settled",
                    transaction_id
                )));
            }
        };

        let payouts = self.distributor.distribute(&transaction).await?;

        Ok(PaymentResult {
            success: true,
            transaction,
            provider_reference,
            message,
            payouts,
        })
    }

    /// The FAILED write is never skipped because the gateway error is about
    /// to propagate; a failed collection must not linger as PENDING.
    async fn mark_failed(&self, transaction_id: i64) {
        match queries::update_transaction_failed(&self.pool, transaction_id).await {
            Ok(Some(_)) => {
                tracing::info!(transaction_id, "transaction marked FAILED");
            }
            Ok(None) => {
                tracing::warn!(
                    transaction_id,
                    "transaction already terminal while marking FAILED"
                );
            }
            Err(write_err) => {
                tracing::error!(
                    transaction_id,
                    error = %write_err,
                    "could not mark transaction FAILED after gateway failure"
                );
            }
        }
    }
}
