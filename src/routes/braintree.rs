//! Braintree Drop-in

use crate::braintree::BraintreeClient;
use crate::models::AppState;
use crate::paypal::orders::parse_amount;
use crate::paypal::{Money, ProviderResponse};
use crate::types::{AppError, AppResult};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/braintree/api/client-token", get(client_token))
        .route("/braintree/api/checkout", post(checkout))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutBody {
    #[validate(length(min = 1))]
    pub payment_method_nonce: String,
    pub amount: Option<String>,
}

fn client(state: &AppState) -> AppResult<&BraintreeClient> {
    state
        .braintree
        .as_ref()
        .ok_or_else(|| AppError::Config("Braintree credentials are not configured".to_string()))
}

async fn client_token(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let client_token = client(&state)?.client_token().await?;
    Ok(Json(json!({ "client_token": client_token })))
}

async fn checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> AppResult<ProviderResponse> {
    body.validate()?;
    let braintree = client(&state)?;
    let amount = parse_amount(
        body.amount
            .as_deref()
            .unwrap_or(&state.config.checkout.default_amount),
    )?;

    let response = braintree
        .charge(&body.payment_method_nonce, &Money::from_decimal(state.currency(), amount).value)
        .await?;
    info!(
        transaction_id = ?response.id(),
        status = ?response.resource_status(),
        "Braintree charge"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::StatusCode;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_client_token() {
        let mut app = test_app().await;
        app.server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data":{"createClientToken":{"clientToken":"ct-drop-in"}}}"#)
            .create_async()
            .await;

        let (status, body) = app.get("/braintree/api/client-token").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["client_token"], "ct-drop-in");
    }

    #[tokio::test]
    async fn test_checkout_charges_nonce() {
        let mut app = test_app().await;
        let charge = app
            .server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({
                "variables": { "input": {
                    "paymentMethodId": "fake-valid-nonce",
                    "transaction": { "amount": "25.00" }
                } }
            })))
            .with_status(200)
            .with_body(
                r#"{"data":{"chargePaymentMethod":{"transaction":{"id":"dHJhbnNhY3Rpb25f","status":"SUBMITTED_FOR_SETTLEMENT","amount":{"value":"25.00","currencyIsoCode":"USD"}}}}}"#,
            )
            .create_async()
            .await;

        let (status, body) = app
            .post(
                "/braintree/api/checkout",
                json!({ "payment_method_nonce": "fake-valid-nonce", "amount": "25" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "SUBMITTED_FOR_SETTLEMENT");
        charge.assert_async().await;
    }

    #[tokio::test]
    async fn test_declined_charge_is_422() {
        let mut app = test_app().await;
        app.server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data":null,"errors":[{"message":"Processor declined"}]}"#)
            .create_async()
            .await;

        let (status, body) = app
            .post(
                "/braintree/api/checkout",
                json!({ "payment_method_nonce": "fake-processor-declined-visa-nonce", "amount": "10.00" }),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"][0]["issue"], "Processor declined");
    }

    #[tokio::test]
    async fn test_unconfigured_braintree_is_500() {
        let mut app = test_app().await;
        app.state.braintree = None;
        let (status, body) = app.get("/braintree/api/client-token").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("not configured"));
    }
}
