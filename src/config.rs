use anyhow::Context;
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

/// MTN-style mobile money provider credentials.
#[derive(Debug, Deserialize, Clone)]
pub struct MtnConfig {
    pub base_url: String,
    pub subscription_key: String,
    pub api_user: String,
    pub api_key: String,
    pub target_environment: String,
}

/// Airtel-style mobile money provider credentials.
#[derive(Debug, Deserialize, Clone)]
pub struct AirtelConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub country: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub mtn: MtnConfig,
    pub airtel: AirtelConfig,
    pub exchange_rate_api_url: String,
    pub default_artist_commission_rate: BigDecimal,
    pub default_reseller_commission_rate: BigDecimal,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            mtn: MtnConfig {
                base_url: env::var("MTN_BASE_URL")?,
                subscription_key: env::var("MTN_SUBSCRIPTION_KEY")?,
                api_user: env::var("MTN_API_USER")?,
                api_key: env::var("MTN_API_KEY")?,
                target_environment: env::var("MTN_TARGET_ENVIRONMENT")
                    .unwrap_or_else(|_| "sandbox".to_string()),
            },
            airtel: AirtelConfig {
                base_url: env::var("AIRTEL_BASE_URL")?,
                client_id: env::var("AIRTEL_CLIENT_ID")?,
                client_secret: env::var("AIRTEL_CLIENT_SECRET")?,
                country: env::var("AIRTEL_COUNTRY").unwrap_or_else(|_| "ZM".to_string()),
            },
            exchange_rate_api_url: env::var("EXCHANGE_RATE_API_URL")?,
            default_artist_commission_rate: parse_rate("DEFAULT_ARTIST_COMMISSION_RATE", "0.5")?,
            default_reseller_commission_rate: parse_rate(
                "DEFAULT_RESELLER_COMMISSION_RATE",
                "0.2",
            )?,
        })
    }
}

fn parse_rate(var: &str, default: &str) -> anyhow::Result<BigDecimal> {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    raw.parse::<BigDecimal>()
        .with_context(|| format!("{} is not a valid decimal rate", var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_default_rates() {
        let rate = parse_rate("MEDIAPAY_TEST_RATE_UNSET", "0.5").unwrap();
        assert_eq!(rate, BigDecimal::from_str("0.5").unwrap());
    }

    #[test]
    fn rejects_non_decimal_rate() {
        env::set_var("MEDIAPAY_TEST_RATE_BAD", "half");
        assert!(parse_rate("MEDIAPAY_TEST_RATE_BAD", "0.5").is_err());
        env::remove_var("MEDIAPAY_TEST_RATE_BAD");
    }
}
