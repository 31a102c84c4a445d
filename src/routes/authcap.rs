//! Authorize now, capture later

use crate::models::{AmountBody, AppState};
use crate::paypal::orders::parse_amount;
use crate::paypal::payments::{AuthorizationCapture, Reauthorization};
use crate::paypal::{Intent, Money, OrderRequest, ProviderResponse};
use crate::routes::{json_or_default, order_amount};
use crate::types::AppResult;
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/authcap/api/orders", post(create_order))
        .route("/authcap/api/orders/{order_id}/authorize", post(authorize_order))
        .route(
            "/authcap/api/authorizations/{authorization_id}/capture",
            post(capture_authorization),
        )
        .route(
            "/authcap/api/authorizations/{authorization_id}/void",
            post(void_authorization),
        )
        .route(
            "/authcap/api/authorizations/{authorization_id}/reauthorize",
            post(reauthorize),
        )
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureBody {
    pub amount: Option<String>,
    pub final_capture: Option<bool>,
    pub invoice_id: Option<String>,
    pub note_to_payer: Option<String>,
}

fn optional_money(state: &AppState, amount: Option<&str>) -> AppResult<Option<Money>> {
    Ok(amount
        .map(parse_amount)
        .transpose()?
        .map(|value| Money::from_decimal(state.currency(), value)))
}

async fn create_order(State(state): State<AppState>, body: Bytes) -> AppResult<ProviderResponse> {
    let body: AmountBody = json_or_default(&body)?;
    let amount = order_amount(&state, body.amount.as_deref())?;
    let order = OrderRequest::single(Intent::Authorize, state.currency(), amount);

    let response = state.paypal.create_order(&order).await?;
    info!(order_id = ?response.id(), "Created AUTHORIZE order");
    Ok(response)
}

async fn authorize_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<ProviderResponse> {
    let response = state.paypal.authorize_order(&order_id).await?;
    info!(order_id = %order_id, status = ?response.resource_status(), "Authorized order");
    Ok(response)
}

async fn capture_authorization(
    State(state): State<AppState>,
    Path(authorization_id): Path<String>,
    body: Bytes,
) -> AppResult<ProviderResponse> {
    let body: CaptureBody = json_or_default(&body)?;
    let capture = AuthorizationCapture {
        amount: optional_money(&state, body.amount.as_deref())?,
        final_capture: body.final_capture,
        invoice_id: body.invoice_id,
        note_to_payer: body.note_to_payer,
    };
    let response = state
        .paypal
        .capture_authorization(&authorization_id, &capture)
        .await?;
    info!(
        authorization_id = %authorization_id,
        status = ?response.resource_status(),
        "Captured authorization"
    );
    Ok(response)
}

async fn void_authorization(
    State(state): State<AppState>,
    Path(authorization_id): Path<String>,
) -> AppResult<ProviderResponse> {
    let response = state.paypal.void_authorization(&authorization_id).await?;
    info!(authorization_id = %authorization_id, "Voided authorization");
    Ok(response)
}

async fn reauthorize(
    State(state): State<AppState>,
    Path(authorization_id): Path<String>,
    body: Bytes,
) -> AppResult<ProviderResponse> {
    let body: AmountBody = json_or_default(&body)?;
    let request = Reauthorization {
        amount: optional_money(&state, body.amount.as_deref())?,
    };
    state.paypal.reauthorize(&authorization_id, &request).await
}
