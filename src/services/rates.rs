//! Currency rate refresh and conversion.
//!
//! Standalone utility outside the settlement path: fetches a rate from the
//! external exchange-rate API, records it in the cache table (last rate
//! wins) and returns the converted amount.

use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::db::queries;
use crate::error::AppError;
use crate::validation;

#[derive(Error, Debug)]
pub enum RateApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Rate for {0} missing from response")]
    MissingRate(String),
    #[error("Invalid response from rate API: {0}")]
    InvalidResponse(String),
    #[error("Rate API circuit breaker is open")]
    CircuitOpen,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, serde_json::Number>,
}

/// HTTP client for the external exchange-rate API.
#[derive(Clone)]
pub struct RateApiClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl RateApiClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        RateApiClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn with_circuit_breaker(
        base_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        RateApiClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub async fn fetch_rate(&self, from: &str, to: &str) -> Result<BigDecimal, RateApiError> {
        let url = format!("{}/latest/{}", self.base_url.trim_end_matches('/'), from);
        let client = self.client.clone();
        let to = to.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).send().await?;

                if !response.status().is_success() {
                    return Err(RateApiError::InvalidResponse(format!(
                        "rate API returned {}",
                        response.status()
                    )));
                }

                let body = response.json::<RatesResponse>().await?;
                let number = body
                    .rates
                    .get(&to)
                    .ok_or(RateApiError::MissingRate(to))?;

                number
                    .to_string()
                    .parse::<BigDecimal>()
                    .map_err(|e| RateApiError::InvalidResponse(e.to_string()))
            })
            .await;

        match result {
            Ok(rate) => Ok(rate),
            Err(FailsafeError::Rejected) => Err(RateApiError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversionResult {
    pub original_amount: BigDecimal,
    pub converted_amount: BigDecimal,
    pub rate: BigDecimal,
    pub from_currency: String,
    pub to_currency: String,
}

#[derive(Clone)]
pub struct RateConverter {
    pool: PgPool,
    api: RateApiClient,
}

impl RateConverter {
    pub fn new(pool: PgPool, api: RateApiClient) -> Self {
        Self { pool, api }
    }

    pub async fn convert(
        &self,
        amount: &BigDecimal,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<ConversionResult, AppError> {
        validation::validate_positive_amount(amount)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validation::validate_currency_code(from_currency)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validation::validate_currency_code(to_currency)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let rate = self
            .api
            .fetch_rate(from_currency, to_currency)
            .await
            .map_err(|e| AppError::RateSource(e.to_string()))?;

        queries::upsert_exchange_rate(&self.pool, from_currency, to_currency, &rate).await?;

        let converted_amount = amount * &rate;

        Ok(ConversionResult {
            original_amount: amount.clone(),
            converted_amount,
            rate,
            from_currency: from_currency.to_string(),
            to_currency: to_currency.to_string(),
        })
    }
}
