//! Airtel-style mobile money collection adapter.
//!
//! Unlike the MTN flow, the payments endpoint reports the outcome inline
//! in its response envelope, so no follow-up poll is needed.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CollectionOutcome, CollectionRequest, GatewayError, PaymentGateway, PaymentProvider};
use crate::config::AirtelConfig;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct PaymentRequest {
    reference: String,
    subscriber: Subscriber,
    transaction: TransactionBody,
}

#[derive(Debug, Serialize)]
struct Subscriber {
    country: String,
    currency: String,
    msisdn: String,
}

#[derive(Debug, Serialize)]
struct TransactionBody {
    amount: String,
    country: String,
    currency: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    #[serde(default)]
    data: Option<PaymentData>,
    status: ResponseStatus,
}

#[derive(Debug, Deserialize)]
struct PaymentData {
    #[serde(default)]
    transaction: Option<TransactionResult>,
}

#[derive(Debug, Deserialize)]
struct TransactionResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseStatus {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

pub struct AirtelMoneyGateway {
    client: Client,
    config: AirtelConfig,
}

impl AirtelMoneyGateway {
    pub fn new(config: AirtelConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn fetch_token(&self) -> Result<String, GatewayError> {
        let url = format!("{}/auth/oauth2/token", self.base_url());

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
                grant_type: "client_credentials",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::TokenExchange(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token = response.json::<TokenResponse>().await?;
        Ok(token.access_token)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for AirtelMoneyGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::AirtelMoney
    }

    async fn collect(
        &self,
        request: &CollectionRequest,
    ) -> Result<CollectionOutcome, GatewayError> {
        let token = self.fetch_token().await?;
        let country = request
            .country
            .clone()
            .unwrap_or_else(|| self.config.country.clone());

        // Airtel expects the national msisdn without country prefix noise.
        let msisdn = request
            .phone_number
            .trim_start_matches('+')
            .to_string();

        let payload = PaymentRequest {
            reference: request.reference.clone(),
            subscriber: Subscriber {
                country: country.clone(),
                currency: request.currency.clone(),
                msisdn,
            },
            transaction: TransactionBody {
                amount: request.amount.to_string(),
                country: country.clone(),
                currency: request.currency.clone(),
                id: request.reference.clone(),
            },
        };

        tracing::info!(reference = %request.reference, "submitting Airtel payment");

        let url = format!("{}/merchant/v1/payments/", self.base_url());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("X-Country", &country)
            .header("X-Currency", &request.currency)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!(
                "payments endpoint returned {}: {}",
                status, body
            )));
        }

        let raw = response.json::<serde_json::Value>().await?;
        let parsed: PaymentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let provider_reference = parsed
            .data
            .as_ref()
            .and_then(|data| data.transaction.as_ref())
            .and_then(|tx| tx.id.clone())
            .unwrap_or_else(|| request.reference.clone());

        let message = parsed
            .status
            .message
            .unwrap_or_else(|| match parsed.status.code {
                Some(code) => format!("provider returned code {}", code),
                None => "no provider message".to_string(),
            });

        Ok(CollectionOutcome {
            success: parsed.status.success,
            provider_reference,
            message,
            raw,
        })
    }
}
