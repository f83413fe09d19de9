pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::domain::commission::RateDefaults;
use crate::gateway::{GatewayRegistry, GatewaySelector};
use crate::services::{RateApiClient, RateConverter, SettlementService, TransactionLedger};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub ledger: TransactionLedger,
    pub settlements: SettlementService,
    pub rates: RateConverter,
}

impl AppState {
    /// Wires every service from configuration. Gateways are constructed
    /// here, once, and injected; nothing holds provider credentials as
    /// module state.
    pub fn build(pool: sqlx::PgPool, config: &Config) -> Self {
        let gateways: Arc<dyn GatewaySelector> = Arc::new(GatewayRegistry::from_config(config));
        let defaults = RateDefaults {
            artist: config.default_artist_commission_rate.clone(),
            reseller: config.default_reseller_commission_rate.clone(),
        };

        AppState {
            ledger: TransactionLedger::new(pool.clone(), defaults),
            settlements: SettlementService::new(pool.clone(), gateways),
            rates: RateConverter::new(
                pool.clone(),
                RateApiClient::new(config.exchange_rate_api_url.clone()),
            ),
            db: pool,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route(
            "/transactions/:id",
            get(handlers::transactions::get_transaction),
        )
        .route(
            "/transactions/:id/payments",
            post(handlers::payments::process_payment),
        )
        .route("/rates/convert", post(handlers::rates::convert))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
