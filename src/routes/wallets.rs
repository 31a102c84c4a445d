//! Google Pay and Apple Pay
//!
//! The wallet buttons confirm the payment source in the browser, so the
//! server only creates a plain CAPTURE order and captures it afterwards.

use crate::models::AppState;
use crate::paypal::{Intent, OrderRequest, ProviderResponse};
use crate::routes::{json_or_default, order_amount, standard};
use crate::types::{AppError, AppResult};
use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/wallets/api/orders", post(create_order))
        .route("/wallets/api/orders/{order_id}/capture", post(standard::capture_order))
        .route(
            "/.well-known/apple-developer-merchantid-domain-association",
            get(domain_association),
        )
        .with_state(state)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wallet {
    #[default]
    GooglePay,
    ApplePay,
}

#[derive(Debug, Default, Deserialize)]
pub struct WalletOrderBody {
    #[serde(default)]
    pub wallet: Wallet,
    pub amount: Option<String>,
}

async fn create_order(State(state): State<AppState>, body: Bytes) -> AppResult<ProviderResponse> {
    let body: WalletOrderBody = json_or_default(&body)?;
    let amount = order_amount(&state, body.amount.as_deref())?;
    let order = OrderRequest::single(Intent::Capture, state.currency(), amount);

    let response = state.paypal.create_order(&order).await?;
    info!(wallet = ?body.wallet, order_id = ?response.id(), "Created wallet order");
    Ok(response)
}

/// Apple Pay domain verification file
async fn domain_association(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let path = state
        .config
        .checkout
        .apple_pay_domain_association
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Apple Pay domain association is not configured".to_string()))?;

    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!(
                "domain association file {} does not exist",
                path.display()
            )))
        }
        Err(err) => return Err(err.into()),
    };
    Ok(([(header::CONTENT_TYPE, "text/plain")], contents))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::StatusCode;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_wallet_order_is_plain_capture() {
        let mut app = test_app().await;
        app.mock_token().await;
        let create = app
            .server
            .mock("POST", "/v2/checkout/orders")
            .match_body(Matcher::PartialJson(json!({
                "intent": "CAPTURE",
                "purchase_units": [{ "amount": { "currency_code": "USD", "value": "12.00" } }]
            })))
            .with_status(201)
            .with_body(r#"{"id":"WALLET-ORDER","status":"CREATED"}"#)
            .create_async()
            .await;

        let (status, body) = app
            .post("/wallets/api/orders", json!({ "wallet": "apple_pay", "amount": "12" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "WALLET-ORDER");
        create.assert_async().await;

        let (status, _) = app
            .post("/wallets/api/orders", json!({ "wallet": "samsung_pay" }))
            .await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_domain_association_missing_is_404() {
        let app = test_app().await;
        let (status, _) = app
            .get("/.well-known/apple-developer-merchantid-domain-association")
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_domain_association_served() {
        let mut app = test_app().await;
        let path = app.dir.path().join("apple-association.txt");
        std::fs::write(&path, "7B227073704964223A2241").unwrap();
        app.state.config.checkout.apple_pay_domain_association = Some(path);

        let (status, body) = app
            .get("/.well-known/apple-developer-merchantid-domain-association")
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("7B227073704964223A2241"));
    }
}
