//! MTN-style mobile money collection adapter.
//!
//! Collection is asynchronous on the provider side: the request-to-pay
//! submit returns 202 with no outcome, so the adapter follows up with a
//! single status poll and maps the reported state to the normalized
//! outcome.

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::{CollectionOutcome, CollectionRequest, GatewayError, PaymentGateway, PaymentProvider};
use crate::config::MtnConfig;

const STATUS_SUCCESSFUL: &str = "SUCCESSFUL";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestToPay {
    amount: String,
    currency: String,
    external_id: String,
    payer: Payer,
    payer_message: String,
    payee_note: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Payer {
    party_id_type: &'static str,
    party_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestToPayStatus {
    status: String,
    #[serde(default)]
    financial_transaction_id: Option<String>,
    #[serde(default)]
    reason: Option<serde_json::Value>,
}

pub struct MtnMoneyGateway {
    client: Client,
    config: MtnConfig,
}

impl MtnMoneyGateway {
    pub fn new(config: MtnConfig) -> Self {
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
        let url = format!("{}/collection/token/", self.base_url());
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.config.api_user, self.config.api_key));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", credentials))
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
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
impl PaymentGateway for MtnMoneyGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::MtnMoney
    }

    async fn collect(
        &self,
        request: &CollectionRequest,
    ) -> Result<CollectionOutcome, GatewayError> {
        let token = self.fetch_token().await?;
        let correlation_id = Uuid::new_v4();

        let payload = RequestToPay {
            amount: request.amount.to_string(),
            currency: request.currency.clone(),
            external_id: request.reference.clone(),
            payer: Payer {
                party_id_type: "MSISDN",
                party_id: request.phone_number.clone(),
            },
            payer_message: format!("Payment {}", request.reference),
            payee_note: request.reference.clone(),
        };

        tracing::info!(
            reference = %request.reference,
            correlation_id = %correlation_id,
            "submitting MTN request-to-pay"
        );

        let submit_url = format!("{}/collection/v1_0/requesttopay", self.base_url());
        let response = self
            .client
            .post(&submit_url)
            .bearer_auth(&token)
            .header("X-Reference-Id", correlation_id.to_string())
            .header("X-Target-Environment", &self.config.target_environment)
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!(
                "request-to-pay returned {}: {}",
                status, body
            )));
        }

        let status_url = format!(
            "{}/collection/v1_0/requesttopay/{}",
            self.base_url(),
            correlation_id
        );
        let response = self
            .client
            .get(&status_url)
            .bearer_auth(&token)
            .header("X-Target-Environment", &self.config.target_environment)
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::InvalidResponse(format!(
                "status poll returned {}",
                response.status()
            )));
        }

        let raw = response.json::<serde_json::Value>().await?;
        let parsed: RequestToPayStatus = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let success = parsed.status == STATUS_SUCCESSFUL;
        let message = if success {
            "collection successful".to_string()
        } else {
            match &parsed.reason {
                Some(reason) => format!("provider reported {}: {}", parsed.status, reason),
                None => format!("provider reported {}", parsed.status),
            }
        };

        Ok(CollectionOutcome {
            success,
            provider_reference: parsed
                .financial_transaction_id
                .unwrap_or_else(|| correlation_id.to_string()),
            message,
            raw,
        })
    }
}
