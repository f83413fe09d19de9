use sqlx::types::BigDecimal;
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};

use crate::db::models::{
    Commission, CommissionStatus, CurrencyExchange, Media, NewTransaction, PaymentAccount,
    PayoutTransaction, ResellerLink, Transaction, TransactionStatus,
};

// --- Purchase creation (all run inside the ledger's atomic unit) ---

pub async fn get_media(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: i64,
) -> Result<Option<Media>> {
    sqlx::query_as::<_, Media>("SELECT * FROM media WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn get_reseller_link_by_code(
    executor: &mut SqlxTransaction<'_, Postgres>,
    code: &str,
) -> Result<Option<ResellerLink>> {
    sqlx::query_as::<_, ResellerLink>("SELECT * FROM reseller_links WHERE code = $1")
        .bind(code)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn get_user_commission_rate(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: i64,
) -> Result<Option<BigDecimal>> {
    sqlx::query_scalar::<_, Option<BigDecimal>>("SELECT commission_rate FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut **executor)
        .await
        .map(|row| row.flatten())
}

/// Atomic add, never read-modify-write: concurrent checkouts race on this.
pub async fn increment_link_conversions(
    executor: &mut SqlxTransaction<'_, Postgres>,
    link_id: i64,
) -> Result<()> {
    sqlx::query("UPDATE reseller_links SET conversion_count = conversion_count + 1 WHERE id = $1")
        .bind(link_id)
        .execute(&mut **executor)
        .await?;

    Ok(())
}

pub async fn insert_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &NewTransaction,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            reference, user_id, media_id, amount, currency,
            payment_method, payment_provider, status, is_reseller_sale,
            reseller_link_id, metadata
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(&tx.reference)
    .bind(tx.user_id)
    .bind(tx.media_id)
    .bind(&tx.amount)
    .bind(&tx.currency)
    .bind(&tx.payment_method)
    .bind(&tx.payment_provider)
    .bind(TransactionStatus::Pending.as_str())
    .bind(tx.is_reseller_sale)
    .bind(tx.reseller_link_id)
    .bind(sqlx::types::Json(&tx.metadata))
    .fetch_one(&mut **executor)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_commission(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transaction_id: i64,
    media_id: i64,
    reseller_id: i64,
    amount: &BigDecimal,
    currency: &str,
    commission_rate: &BigDecimal,
) -> Result<Commission> {
    sqlx::query_as::<_, Commission>(
        r#"
        INSERT INTO commissions (
            transaction_id, media_id, reseller_id, amount, currency,
            commission_rate, status, is_paid
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE)
        RETURNING *
        "#,
    )
    .bind(transaction_id)
    .bind(media_id)
    .bind(reseller_id)
    .bind(amount)
    .bind(currency)
    .bind(commission_rate)
    .bind(CommissionStatus::Pending.as_str())
    .fetch_one(&mut **executor)
    .await
}

// --- Transaction reads and status transitions ---

pub async fn get_transaction(pool: &PgPool, id: i64) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_transactions(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Guarded PENDING -> COMPLETED transition. Returns None if the row was
/// already terminal, so a racing duplicate call cannot complete twice.
/// The provider response is merged additively; `calculated_amounts` frozen
/// at creation stays untouched.
pub async fn update_transaction_completed(
    pool: &PgPool,
    id: i64,
    provider_reference: &str,
    provider_response: &serde_json::Value,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $2,
            provider_reference = $3,
            metadata = COALESCE(metadata, '{}'::jsonb)
                || jsonb_build_object('provider_response', $4::jsonb),
            updated_at = NOW()
        WHERE id = $1 AND status = $5
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(TransactionStatus::Completed.as_str())
    .bind(provider_reference)
    .bind(provider_response)
    .bind(TransactionStatus::Pending.as_str())
    .fetch_optional(pool)
    .await
}

/// Guarded PENDING -> FAILED transition.
pub async fn update_transaction_failed(pool: &PgPool, id: i64) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $2, updated_at = NOW()
        WHERE id = $1 AND status = $3
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(TransactionStatus::Failed.as_str())
    .bind(TransactionStatus::Pending.as_str())
    .fetch_optional(pool)
    .await
}

// --- Payout distribution ---

pub async fn get_media_by_id(pool: &PgPool, id: i64) -> Result<Option<Media>> {
    sqlx::query_as::<_, Media>("SELECT * FROM media WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_commission_by_transaction(
    pool: &PgPool,
    transaction_id: i64,
) -> Result<Option<Commission>> {
    sqlx::query_as::<_, Commission>("SELECT * FROM commissions WHERE transaction_id = $1")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await
}

/// First payout account that is both default and verified, if any.
pub async fn get_default_payment_account(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<PaymentAccount>> {
    sqlx::query_as::<_, PaymentAccount>(
        r#"
        SELECT * FROM payment_accounts
        WHERE user_id = $1 AND is_default AND is_verified
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_payout_transaction(
    pool: &PgPool,
    payment_account_id: i64,
    transaction_id: i64,
    amount: &BigDecimal,
    currency: &str,
    reference: &str,
    description: &str,
) -> Result<PayoutTransaction> {
    sqlx::query_as::<_, PayoutTransaction>(
        r#"
        INSERT INTO payout_transactions (
            payment_account_id, transaction_id, amount, currency,
            status, reference, metadata, processed_at
        ) VALUES ($1, $2, $3, $4, 'COMPLETED', $5, jsonb_build_object('description', $6::text), NOW())
        RETURNING *
        "#,
    )
    .bind(payment_account_id)
    .bind(transaction_id)
    .bind(amount)
    .bind(currency)
    .bind(reference)
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn mark_commission_paid(pool: &PgPool, id: i64) -> Result<Commission> {
    sqlx::query_as::<_, Commission>(
        r#"
        UPDATE commissions
        SET status = $2, is_paid = TRUE, paid_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(CommissionStatus::Paid.as_str())
    .fetch_one(pool)
    .await
}

pub async fn increment_user_earnings(
    pool: &PgPool,
    user_id: i64,
    amount: &BigDecimal,
) -> Result<()> {
    sqlx::query("UPDATE users SET total_earnings = total_earnings + $2 WHERE id = $1")
        .bind(user_id)
        .bind(amount)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn increment_reseller_totals(
    pool: &PgPool,
    user_id: i64,
    amount: &BigDecimal,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET total_commission = total_commission + $2,
            paid_commission = paid_commission + $2
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .execute(pool)
    .await?;

    Ok(())
}

// --- Currency exchange cache ---

pub async fn upsert_exchange_rate(
    pool: &PgPool,
    from_currency: &str,
    to_currency: &str,
    rate: &BigDecimal,
) -> Result<CurrencyExchange> {
    sqlx::query_as::<_, CurrencyExchange>(
        r#"
        INSERT INTO currency_exchanges (from_currency, to_currency, rate, last_updated)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (from_currency, to_currency)
        DO UPDATE SET rate = EXCLUDED.rate, last_updated = NOW()
        RETURNING *
        "#,
    )
    .bind(from_currency)
    .bind(to_currency)
    .bind(rate)
    .fetch_one(pool)
    .await
}

pub async fn get_exchange_rate(
    pool: &PgPool,
    from_currency: &str,
    to_currency: &str,
) -> Result<Option<CurrencyExchange>> {
    sqlx::query_as::<_, CurrencyExchange>(
        "SELECT * FROM currency_exchanges WHERE from_currency = $1 AND to_currency = $2",
    )
    .bind(from_currency)
    .bind(to_currency)
    .fetch_optional(pool)
    .await
}
