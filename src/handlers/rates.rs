use axum::{Json, extract::State, response::IntoResponse};
use bigdecimal::BigDecimal;
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ConvertPayload {
    pub amount: BigDecimal,
    pub from_currency: String,
    pub to_currency: String,
}

pub async fn convert(
    State(state): State<AppState>,
    Json(payload): Json<ConvertPayload>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .rates
        .convert(&payload.amount, &payload.from_currency, &payload.to_currency)
        .await?;

    Ok(Json(result))
}
