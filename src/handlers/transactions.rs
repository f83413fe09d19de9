use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::gateway::PaymentProvider;
use crate::services::ledger::CreatePurchase;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionPayload {
    pub media_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub payment_method: String,
    pub payment_provider: String,
    pub reseller_link_code: Option<String>,
    pub device_info: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Buyer identity comes from the authenticated caller header; there is no
/// fallback identity.
fn buyer_from_headers(headers: &HeaderMap) -> Result<i64, AppError> {
    headers
        .get("X-User-Id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .ok_or_else(|| AppError::Unauthorized("missing or invalid X-User-Id header".to_string()))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let buyer_user_id = buyer_from_headers(&headers)?;

    let provider = PaymentProvider::from_str(&payload.payment_provider)
        .map_err(|_| AppError::UnsupportedProvider(payload.payment_provider.clone()))?;

    let transaction = state
        .ledger
        .create_transaction(
            CreatePurchase {
                media_id: payload.media_id,
                amount: payload.amount,
                currency: payload.currency,
                payment_method: payload.payment_method,
                payment_provider: provider,
                reseller_link_code: payload.reseller_link_code,
                device_info: payload.device_info,
            },
            buyer_user_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = queries::get_transaction(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))?;

    Ok(Json(transaction))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let limit = pagination.limit.unwrap_or(20);
    let offset = pagination.offset.unwrap_or(0);

    let transactions = queries::list_transactions(&state.db, limit, offset).await?;

    Ok(Json(transactions))
}
