//! Mobile money gateway adapters.
//!
//! One adapter per provider behind the same [`PaymentGateway`] contract.
//! Adapters own token exchange and payload mapping for their provider and
//! normalize the result into a [`CollectionOutcome`]. They never retry and
//! never touch the transaction store; failures propagate to the settlement
//! orchestrator, which owns the status transition.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::Config;

pub mod airtel;
pub mod mtn;

pub use airtel::AirtelMoneyGateway;
pub use mtn::MtnMoneyGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Collection request rejected: {0}")]
    Rejected(String),
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
}

/// Closed set of supported providers. Dispatch is exhaustive; a wire value
/// outside this set is refused before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentProvider {
    #[serde(rename = "MTN_MONEY")]
    MtnMoney,
    #[serde(rename = "AIRTEL_MONEY")]
    AirtelMoney,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::MtnMoney => "MTN_MONEY",
            PaymentProvider::AirtelMoney => "AIRTEL_MONEY",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "MTN_MONEY" => Ok(PaymentProvider::MtnMoney),
            "AIRTEL_MONEY" => Ok(PaymentProvider::AirtelMoney),
            _ => anyhow::bail!("Unrecognized payment provider: {}", s),
        }
    }
}

/// What the engine hands an adapter: the purchase reference doubles as the
/// provider correlation key.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub reference: String,
    pub phone_number: String,
    pub country: Option<String>,
}

/// Normalized provider result.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub success: bool,
    pub provider_reference: String,
    pub message: String,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Collect funds from the payer's wallet. A fresh provider token is
    /// fetched on every attempt; nothing is cached across calls.
    async fn collect(&self, request: &CollectionRequest)
        -> Result<CollectionOutcome, GatewayError>;
}

/// Adapter lookup by provider. Implemented by the registry in production
/// and by counting mocks in tests.
pub trait GatewaySelector: Send + Sync {
    fn select(&self, provider: PaymentProvider) -> &dyn PaymentGateway;
}

/// All configured adapters, constructed once at startup from [`Config`].
pub struct GatewayRegistry {
    mtn: MtnMoneyGateway,
    airtel: AirtelMoneyGateway,
}

impl GatewayRegistry {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mtn: MtnMoneyGateway::new(config.mtn.clone()),
            airtel: AirtelMoneyGateway::new(config.airtel.clone()),
        }
    }
}

impl GatewaySelector for GatewayRegistry {
    fn select(&self, provider: PaymentProvider) -> &dyn PaymentGateway {
        match provider {
            PaymentProvider::MtnMoney => &self.mtn,
            PaymentProvider::AirtelMoney => &self.airtel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers() {
        assert_eq!(
            "MTN_MONEY".parse::<PaymentProvider>().unwrap(),
            PaymentProvider::MtnMoney
        );
        assert_eq!(
            "AIRTEL_MONEY".parse::<PaymentProvider>().unwrap(),
            PaymentProvider::AirtelMoney
        );
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!("ZAMTEL_KWACHA".parse::<PaymentProvider>().is_err());
        assert!("mtn_money".parse::<PaymentProvider>().is_err());
    }

    #[test]
    fn provider_round_trips_through_wire_form() {
        for provider in [PaymentProvider::MtnMoney, PaymentProvider::AirtelMoney] {
            let parsed: PaymentProvider = provider.as_str().parse().unwrap();
            assert_eq!(parsed, provider);
        }
    }
}
