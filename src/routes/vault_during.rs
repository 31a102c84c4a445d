//! Save the payment method while paying (`store_in_vault: ON_SUCCESS`)

use crate::models::{AppState, OptionalCustomerQuery};
use crate::paypal::orders::{
    vaulted_token, CardSource, CustomerRef, ExperienceContext, PaypalSource, SourceAttributes,
    Verification, VaultInstruction,
};
use crate::paypal::vault::VaultSourceKind;
use crate::paypal::{Intent, OrderRequest, PaymentSource, ProviderResponse};
use crate::routes::vault::{remember_token, token_record};
use crate::routes::{json_or_default, order_amount};
use crate::types::AppResult;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/vault-during/api/orders", post(create_order))
        .route("/vault-during/api/orders/{order_id}/capture", post(capture_order))
        .route("/vault-during/api/id-token", get(id_token))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VaultOrderBody {
    pub payment_source: VaultSourceKind,
    pub customer_id: Option<String>,
    pub amount: Option<String>,
}

impl Default for VaultOrderBody {
    fn default() -> Self {
        Self {
            payment_source: VaultSourceKind::Paypal,
            customer_id: None,
            amount: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureBody {
    pub customer_id: Option<String>,
}

pub(crate) fn vault_source(
    state: &AppState,
    kind: VaultSourceKind,
    customer_id: Option<&str>,
) -> PaymentSource {
    let customer = customer_id.map(|id| CustomerRef { id: id.to_string() });
    match kind {
        VaultSourceKind::Paypal => PaymentSource::Paypal(PaypalSource {
            attributes: Some(SourceAttributes {
                vault: Some(VaultInstruction::paypal_on_success()),
                customer,
                ..Default::default()
            }),
            experience_context: Some(ExperienceContext {
                brand_name: Some(state.config.paypal.brand_name.clone()),
                shipping_preference: Some("NO_SHIPPING".to_string()),
                return_url: Some(state.public_url("/vault-during/complete")),
                cancel_url: Some(state.public_url("/vault-during/cancel")),
                ..Default::default()
            }),
            ..Default::default()
        }),
        VaultSourceKind::Card => PaymentSource::Card(CardSource {
            attributes: Some(SourceAttributes {
                vault: Some(VaultInstruction::on_success()),
                verification: Some(Verification {
                    method: "SCA_WHEN_REQUIRED".to_string(),
                }),
                customer,
            }),
            ..Default::default()
        }),
    }
}

async fn create_order(State(state): State<AppState>, body: Bytes) -> AppResult<ProviderResponse> {
    let body: VaultOrderBody = json_or_default(&body)?;
    let amount = order_amount(&state, body.amount.as_deref())?;
    let order = OrderRequest::single(Intent::Capture, state.currency(), amount).with_payment_source(
        vault_source(&state, body.payment_source, body.customer_id.as_deref()),
    );

    let response = state.paypal.create_order(&order).await?;
    info!(order_id = ?response.id(), "Created order with vault-on-success");
    Ok(response)
}

async fn capture_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    body: Bytes,
) -> AppResult<ProviderResponse> {
    let body: CaptureBody = json_or_default(&body)?;
    let response = state.paypal.capture_order(&order_id).await?;

    match vaulted_token(&response.body) {
        Some(vaulted) => {
            let customer_id = vaulted.customer_id.clone().or(body.customer_id);
            let record = token_record(&vaulted.id, &vaulted.status, &vaulted.source_kind, &vaulted.source);
            match (customer_id, record) {
                (Some(customer_id), Some(record)) => {
                    remember_token(&state, &customer_id, record).await?;
                }
                _ => warn!(token_id = %vaulted.id, "Vaulted token has no customer; not stored"),
            }
        }
        None => info!(order_id = %order_id, "Capture returned no vaulted token"),
    }
    Ok(response)
}

/// User id token for the JS SDK's `data-user-id-token`
async fn id_token(
    State(state): State<AppState>,
    Query(query): Query<OptionalCustomerQuery>,
) -> AppResult<Json<Value>> {
    let id_token = state
        .paypal
        .user_id_token(query.customer_id.as_deref())
        .await?;
    Ok(Json(json!({ "id_token": id_token })))
}
