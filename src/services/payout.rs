//! Payout distribution for completed purchases.
//!
//! Consumes the breakdown frozen at creation time; nothing here recomputes
//! commission math. The artist and reseller legs are deliberately
//! independent: a skip or failure in one never blocks the other, and a
//! missing payout account is a logged skip, never an error that could
//! unwind an already-completed purchase.

use bigdecimal::BigDecimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::db::models::{PayoutTransaction, Transaction};
use crate::db::queries;
use crate::domain::commission::CommissionBreakdown;
use crate::domain::reference;
use crate::error::AppError;

#[derive(Debug, Default, Serialize)]
pub struct DistributionOutcome {
    pub artist_payout: Option<PayoutTransaction>,
    pub reseller_payout: Option<PayoutTransaction>,
}

#[derive(Clone)]
pub struct PayoutDistributor {
    pool: PgPool,
}

impl PayoutDistributor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Invoked once by the orchestrator, right after the COMPLETED write.
    pub async fn distribute(
        &self,
        transaction: &Transaction,
    ) -> Result<DistributionOutcome, AppError> {
        let breakdown = transaction
            .breakdown()
            .ok_or(AppError::MissingBreakdown(transaction.id))?;

        let mut outcome = DistributionOutcome::default();

        match self.pay_artist(transaction, &breakdown).await {
            Ok(payout) => outcome.artist_payout = payout,
            Err(e) => {
                tracing::error!(
                    transaction_id = transaction.id,
                    error = %e,
                    "artist payout leg failed"
                );
            }
        }

        if transaction.is_reseller_sale && breakdown.reseller_amount > BigDecimal::from(0) {
            match self.pay_reseller(transaction, &breakdown).await {
                Ok(payout) => outcome.reseller_payout = payout,
                Err(e) => {
                    tracing::error!(
                        transaction_id = transaction.id,
                        error = %e,
                        "reseller payout leg failed"
                    );
                }
            }
        }

        Ok(outcome)
    }

    async fn pay_artist(
        &self,
        transaction: &Transaction,
        breakdown: &CommissionBreakdown,
    ) -> Result<Option<PayoutTransaction>, AppError> {
        if breakdown.artist_amount <= BigDecimal::from(0) {
            return Ok(None);
        }

        let media = match queries::get_media_by_id(&self.pool, transaction.media_id).await? {
            Some(media) => media,
            None => {
                tracing::warn!(
                    transaction_id = transaction.id,
                    media_id = transaction.media_id,
                    "media row missing at payout time, skipping artist payout"
                );
                return Ok(None);
            }
        };

        let payout = self
            .payout(
                media.user_id,
                &breakdown.artist_amount,
                &transaction.currency,
                &format!("Artist earnings for {}", transaction.reference),
                transaction.id,
            )
            .await?;

        if payout.is_some() {
            queries::increment_user_earnings(&self.pool, media.user_id, &breakdown.artist_amount)
                .await?;
        }

        Ok(payout)
    }

    async fn pay_reseller(
        &self,
        transaction: &Transaction,
        breakdown: &CommissionBreakdown,
    ) -> Result<Option<PayoutTransaction>, AppError> {
        let commission =
            match queries::get_commission_by_transaction(&self.pool, transaction.id).await? {
                Some(commission) => commission,
                None => {
                    tracing::warn!(
                        transaction_id = transaction.id,
                        "reseller sale without commission row, skipping reseller payout"
                    );
                    return Ok(None);
                }
            };

        let payout = self
            .payout(
                commission.reseller_id,
                &breakdown.reseller_amount,
                &transaction.currency,
                &format!("Reseller commission for {}", transaction.reference),
                transaction.id,
            )
            .await?;

        if payout.is_some() {
            queries::mark_commission_paid(&self.pool, commission.id).await?;
            queries::increment_reseller_totals(
                &self.pool,
                commission.reseller_id,
                &breakdown.reseller_amount,
            )
            .await?;
        }

        Ok(payout)
    }

    /// Disburse one share to the payee's verified default account. No
    /// account means a logged skip; the commission stays PENDING and the
    /// payee's counters stay untouched.
    async fn payout(
        &self,
        user_id: i64,
        amount: &BigDecimal,
        currency: &str,
        description: &str,
        transaction_id: i64,
    ) -> Result<Option<PayoutTransaction>, AppError> {
        let account = match queries::get_default_payment_account(&self.pool, user_id).await? {
            Some(account) => account,
            None => {
                tracing::warn!(
                    user_id,
                    transaction_id,
                    "no verified default payment account, skipping payout"
                );
                return Ok(None);
            }
        };

        let payout = queries::insert_payout_transaction(
            &self.pool,
            account.id,
            transaction_id,
            amount,
            currency,
            &reference::payout_reference(),
            description,
        )
        .await?;

        tracing::info!(
            payout_id = payout.id,
            user_id,
            transaction_id,
            amount = %amount,
            "payout recorded"
        );

        Ok(Some(payout))
    }
}
