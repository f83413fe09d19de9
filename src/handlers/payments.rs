use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::AppState;
use crate::error::AppError;
use crate::gateway::PaymentProvider;
use crate::services::settlement::PayerData;

#[derive(Debug, Deserialize)]
pub struct ProcessPaymentPayload {
    pub provider: String,
    pub payer: PayerData,
}

pub async fn process_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ProcessPaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    let provider = PaymentProvider::from_str(&payload.provider)
        .map_err(|_| AppError::UnsupportedProvider(payload.provider.clone()))?;

    let result = state
        .settlements
        .process_payment(id, provider, payload.payer)
        .await?;

    Ok(Json(result))
}
