//! Card fields with 3-D Secure, plus the legacy hosted-fields client token

use crate::models::AppState;
use crate::paypal::orders::{CardSource, ExperienceContext, SourceAttributes, Verification};
use crate::paypal::three_ds::{self, ThreeDsDecision};
use crate::paypal::{Intent, OrderRequest, PaymentSource, ProviderResponse};
use crate::routes::{json_or_default, order_amount};
use crate::types::{AppError, AppResult};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const SCA_METHODS: [&str; 2] = ["SCA_ALWAYS", "SCA_WHEN_REQUIRED"];

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/card/api/orders", post(create_order))
        .route("/card/api/orders/{order_id}/capture", post(capture_order))
        .route("/old/api/client-token", get(client_token))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct CardOrderBody {
    pub amount: Option<String>,
    pub sca: Option<String>,
}

async fn create_order(State(state): State<AppState>, body: Bytes) -> AppResult<ProviderResponse> {
    let body: CardOrderBody = json_or_default(&body)?;
    let method = body
        .sca
        .unwrap_or_else(|| "SCA_WHEN_REQUIRED".to_string())
        .to_uppercase();
    if !SCA_METHODS.contains(&method.as_str()) {
        return Err(AppError::InvalidRequest(format!(
            "sca must be one of {}",
            SCA_METHODS.join(", ")
        )));
    }

    let amount = order_amount(&state, body.amount.as_deref())?;
    let source = CardSource {
        attributes: Some(SourceAttributes {
            verification: Some(Verification { method }),
            ..Default::default()
        }),
        experience_context: Some(ExperienceContext {
            return_url: Some(state.public_url("/card/complete")),
            cancel_url: Some(state.public_url("/card/cancel")),
            ..Default::default()
        }),
        ..Default::default()
    };
    let order = OrderRequest::single(Intent::Capture, state.currency(), amount)
        .with_payment_source(PaymentSource::Card(source));

    let response = state.paypal.create_order(&order).await?;
    info!(order_id = ?response.id(), "Created card-fields order");
    Ok(response)
}

/// Capture only when the 3-D Secure result allows it
async fn capture_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Response> {
    let order = state.paypal.get_order(&order_id).await?;
    let outcome = three_ds::evaluate(&order.body);

    if outcome.decision != ThreeDsDecision::Continue {
        warn!(
            order_id = %order_id,
            decision = ?outcome.decision,
            liability_shift = ?outcome.liability_shift,
            "3-D Secure check blocked capture"
        );
        let error = match outcome.decision {
            ThreeDsDecision::Reject => "Card authentication failed; choose another card",
            _ => "Card authentication could not be completed; please try again",
        };
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": error,
                "decision": outcome.decision,
                "liability_shift": outcome.liability_shift,
            })),
        )
            .into_response());
    }

    let response = state.paypal.capture_order(&order_id).await?;
    info!(
        order_id = %order_id,
        liability_shift = ?outcome.liability_shift,
        status = ?response.resource_status(),
        "Captured card order"
    );
    Ok(response.into_response())
}

async fn client_token(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let client_token = state.paypal.client_token().await?;
    Ok(Json(json!({
        "client_id": state.paypal.client_id(),
        "client_token": client_token,
    })))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::StatusCode;
    use mockito::Matcher;
    use serde_json::json;

    fn order_with_3ds(liability_shift: &str, enrollment: &str, authentication: &str) -> String {
        json!({
            "id": "CARD-ORDER",
            "status": "APPROVED",
            "payment_source": { "card": {
                "last_digits": "1091",
                "authentication_result": {
                    "liability_shift": liability_shift,
                    "three_d_secure": {
                        "enrollment_status": enrollment,
                        "authentication_status": authentication
                    }
                }
            } }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_create_with_sca_always() {
        let mut app = test_app().await;
        app.mock_token().await;
        let create = app
            .server
            .mock("POST", "/v2/checkout/orders")
            .match_body(Matcher::PartialJson(json!({
                "payment_source": { "card": { "attributes": { "verification": { "method": "SCA_ALWAYS" } } } }
            })))
            .with_status(201)
            .with_body(r#"{"id":"CARD-ORDER","status":"CREATED"}"#)
            .create_async()
            .await;

        let (status, _) = app.post("/card/api/orders", json!({ "sca": "sca_always" })).await;
        assert_eq!(status, StatusCode::CREATED);
        create.assert_async().await;

        let (status, _) = app.post("/card/api/orders", json!({ "sca": "SOMETIMES" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_capture_after_successful_authentication() {
        let mut app = test_app().await;
        app.mock_token().await;
        app.server
            .mock("GET", "/v2/checkout/orders/CARD-ORDER")
            .with_status(200)
            .with_body(order_with_3ds("POSSIBLE", "Y", "Y"))
            .create_async()
            .await;
        let capture = app
            .server
            .mock("POST", "/v2/checkout/orders/CARD-ORDER/capture")
            .with_status(201)
            .with_body(r#"{"id":"CARD-ORDER","status":"COMPLETED"}"#)
            .create_async()
            .await;

        let (status, body) = app.post("/card/api/orders/CARD-ORDER/capture", json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "COMPLETED");
        capture.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_authentication_blocks_capture() {
        let mut app = test_app().await;
        app.mock_token().await;
        app.server
            .mock("GET", "/v2/checkout/orders/CARD-ORDER")
            .with_status(200)
            .with_body(order_with_3ds("NO", "Y", "N"))
            .create_async()
            .await;
        let capture = app
            .server
            .mock("POST", "/v2/checkout/orders/CARD-ORDER/capture")
            .expect(0)
            .create_async()
            .await;

        let (status, body) = app.post("/card/api/orders/CARD-ORDER/capture", json!({})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["decision"], "REJECT");
        assert_eq!(body["liability_shift"], "NO");
        capture.assert_async().await;
    }

    #[tokio::test]
    async fn test_legacy_client_token() {
        let mut app = test_app().await;
        app.mock_token().await;
        app.server
            .mock("POST", "/v1/identity/generate-token")
            .match_header("authorization", "Bearer X")
            .with_status(200)
            .with_body(r#"{"client_token":"eyJicmFpbnRyZWUi","expires_in":3600}"#)
            .create_async()
            .await;

        let (status, body) = app.get("/old/api/client-token").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["client_token"], "eyJicmFpbnRyZWUi");
    }
}
