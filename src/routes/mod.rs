//! HTTP routes, one module per checkout flow
//!
//! - `/api/health`, `/api/client-config` - health and SDK settings
//! - `/api/orders` - standard checkout and refunds
//! - `/authcap/api` - authorize now, capture later
//! - `/shipping/api` - shipping callbacks and option patches
//! - `/subs/api` - products, plans and subscriptions
//! - `/tracking/api` - shipment trackers
//! - `/pui/api` - pay upon invoice
//! - `/api/vault`, `/api/payment-tokens`, `/vault-during/api` - saved payment methods
//! - `/api/vault-recurring-payments` - merchant-initiated charges
//! - `/payout/api`, `/invoice/api`, `/multi/api`
//! - `/card/api`, `/old/api` - card fields and hosted fields
//! - `/wallets/api` - Google Pay and Apple Pay
//! - `/braintree/api` - Drop-in
//! - everything else - static pages

pub mod authcap;
pub mod braintree;
pub mod cards;
pub mod health;
pub mod invoices;
pub mod multi;
pub mod payouts;
pub mod pui;
pub mod recurring;
pub mod shipping;
pub mod standard;
pub mod static_files;
pub mod subscriptions;
pub mod tracking;
pub mod vault;
pub mod vault_during;
pub mod wallets;

use crate::middleware::cors_layer;
use crate::models::AppState;
use crate::paypal::orders::parse_amount;
use crate::types::{AppError, AppResult};
use axum::{body::Bytes, Router};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the main application router
///
/// Flow routes take precedence; unmatched paths fall through to the static
/// directory.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);
    let static_dir = state.config.server.static_dir.clone();

    let api_router = Router::new()
        .merge(health::router(state.clone()))
        .merge(standard::router(state.clone()))
        .merge(authcap::router(state.clone()))
        .merge(shipping::router(state.clone()))
        .merge(subscriptions::router(state.clone()))
        .merge(tracking::router(state.clone()))
        .merge(pui::router(state.clone()))
        .merge(vault::router(state.clone()))
        .merge(vault_during::router(state.clone()))
        .merge(recurring::router(state.clone()))
        .merge(payouts::router(state.clone()))
        .merge(invoices::router(state.clone()))
        .merge(multi::router(state.clone()))
        .merge(cards::router(state.clone()))
        .merge(wallets::router(state.clone()))
        .merge(braintree::router(state));

    Router::new()
        .merge(api_router)
        .merge(static_files::router(&static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Parse an optional JSON body. Browsers often POST nothing at all to the
/// create and capture routes, so an empty body means `T::default()`.
pub(crate) fn json_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::InvalidRequest(format!("invalid request body: {}", err)))
}

/// Requested amount, or the configured default
pub(crate) fn order_amount(state: &AppState, requested: Option<&str>) -> AppResult<Decimal> {
    parse_amount(requested.unwrap_or(&state.config.checkout.default_amount))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{CheckoutConfig, Config, ServerConfig, StorageConfig};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use mockito::{Mock, Server, ServerGuard};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub(crate) struct TestApp {
        pub server: ServerGuard,
        pub state: AppState,
        pub dir: TempDir,
    }

    pub(crate) fn test_config(mock_url: &str, dir: &TempDir) -> Config {
        Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".into(),
                cors_allowed_origins: vec![],
                public_url: "http://localhost:8888".into(),
                static_dir: dir.path().join("client"),
                log_dir: None,
            },
            paypal: crate::paypal::client::tests::test_config(mock_url),
            braintree: crate::braintree::tests::test_config(&format!("{}/graphql", mock_url)),
            storage: StorageConfig {
                data_dir: dir.path().join("data"),
                vault_file: "vault-data.json".into(),
            },
            checkout: CheckoutConfig {
                currency: "USD".into(),
                default_amount: "100.00".into(),
                shipping_countries: vec!["US".into()],
                apple_pay_domain_association: None,
            },
        }
    }

    pub(crate) async fn test_app() -> TestApp {
        let server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let state = AppState::new(test_config(&server.url(), &dir));
        TestApp { server, state, dir }
    }

    impl TestApp {
        /// Token endpoint answering with access token `X`
        pub(crate) async fn mock_token(&mut self) -> Mock {
            self.server
                .mock("POST", "/v1/oauth2/token")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"access_token":"X","token_type":"Bearer","expires_in":32400}"#)
                .expect_at_least(1)
                .create_async()
                .await
        }

        pub(crate) async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            let body = match body {
                Some(json) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };
            let response = create_router(self.state.clone())
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            };
            (status, json)
        }

        pub(crate) async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.request(Method::POST, uri, Some(body)).await
        }

        pub(crate) async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.request(Method::GET, uri, None).await
        }
    }
}
