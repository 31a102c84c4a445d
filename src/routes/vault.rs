//! Save payment methods without a purchase (Vault v3 setup tokens) and manage
//! the saved tokens

use crate::models::{AppState, CustomerQuery};
use crate::paypal::vault::{SetupTokenRequest, VaultSourceKind};
use crate::paypal::ProviderResponse;
use crate::storage::{CardDetails, PaymentTokenRecord, TokenKind};
use crate::types::AppResult;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/vault/setup-token", post(create_setup_token))
        .route("/api/vault/payment-token", post(create_payment_token))
        .route("/api/payment-tokens", get(list_payment_tokens))
        .route(
            "/api/payment-tokens/{token_id}",
            get(get_payment_token).delete(delete_payment_token),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SetupTokenBody {
    pub payment_source: VaultSourceKind,
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentTokenBody {
    pub vault_setup_token: String,
    pub customer_id: Option<String>,
}

pub(crate) fn token_kind(kind: &str) -> Option<TokenKind> {
    match kind.to_ascii_lowercase().as_str() {
        "paypal" | "venmo" => Some(TokenKind::Paypal),
        "card" => Some(TokenKind::Card),
        _ => None,
    }
}

/// Local record for a saved token. `source` is the `payment_source.<kind>`
/// object of a token or order resource.
pub(crate) fn token_record(id: &str, status: &str, kind: &str, source: &Value) -> Option<PaymentTokenRecord> {
    let kind = token_kind(kind)?;
    let text = |name: &str| source.get(name).and_then(Value::as_str).map(String::from);

    let mut record = PaymentTokenRecord::new(id, kind, status);
    match kind {
        TokenKind::Card => {
            record.card_details = Some(CardDetails {
                brand: text("brand"),
                last_digits: text("last_digits"),
                expiry: text("expiry"),
            });
        }
        TokenKind::Paypal => record.payer_email = text("email_address"),
    }
    Some(record)
}

/// Record for a `/v3/vault/payment-tokens` resource
fn record_from_payment_token(token: &Value) -> Option<PaymentTokenRecord> {
    let id = token.get("id").and_then(Value::as_str)?;
    let (kind, source) = token.get("payment_source")?.as_object()?.iter().next()?;
    let status = token
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("VAULTED");
    token_record(id, status, kind, source)
}

/// Store a token for `customer_id`; logs instead of failing on duplicates
pub(crate) async fn remember_token(
    state: &AppState,
    customer_id: &str,
    record: PaymentTokenRecord,
) -> AppResult<bool> {
    let token_id = record.id.clone();
    let payer_email = record.payer_email.clone();
    let stored = state
        .vault
        .update(|data| {
            data.upsert_customer(customer_id, None, payer_email);
            data.add_payment_token(customer_id, record)
        })
        .await?;
    if stored {
        info!(customer_id = %customer_id, token_id = %token_id, "Stored payment token");
    } else {
        info!(customer_id = %customer_id, token_id = %token_id, "Payment token already stored");
    }
    Ok(stored)
}

async fn create_setup_token(
    State(state): State<AppState>,
    Json(body): Json<SetupTokenBody>,
) -> AppResult<ProviderResponse> {
    let request = SetupTokenRequest::for_kind(
        body.payment_source,
        body.customer_id.as_deref(),
        &state.public_url("/vault/complete"),
        &state.public_url("/vault/cancel"),
        &state.config.paypal.brand_name,
    );
    let response = state.paypal.create_setup_token(&request).await?;
    info!(setup_token = ?response.id(), status = ?response.resource_status(), "Created setup token");
    Ok(response)
}

async fn create_payment_token(
    State(state): State<AppState>,
    Json(body): Json<PaymentTokenBody>,
) -> AppResult<ProviderResponse> {
    let response = state
        .paypal
        .create_payment_token(&body.vault_setup_token, body.customer_id.as_deref())
        .await?;

    let customer_id = response
        .body
        .pointer("/customer/id")
        .and_then(Value::as_str)
        .map(String::from)
        .or(body.customer_id);

    match (customer_id, record_from_payment_token(&response.body)) {
        (Some(customer_id), Some(record)) => {
            remember_token(&state, &customer_id, record).await?;
        }
        _ => warn!(token_id = ?response.id(), "Payment token not stored: no customer or unknown source"),
    }
    Ok(response)
}

async fn list_payment_tokens(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<Value>> {
    let provider = state.paypal.list_payment_tokens(&query.customer_id).await?;
    let data = state.vault.snapshot().await?;
    Ok(Json(json!({
        "customer_id": query.customer_id,
        "payment_tokens": provider.body.get("payment_tokens").cloned().unwrap_or_else(|| json!([])),
        "local": data.payment_tokens(&query.customer_id),
    })))
}

async fn get_payment_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> AppResult<ProviderResponse> {
    state.paypal.get_payment_token(&token_id).await
}

async fn delete_payment_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<Value>> {
    state.paypal.delete_payment_token(&token_id).await?;
    let removed = state
        .vault
        .update(|data| data.remove_payment_token(&query.customer_id, &token_id))
        .await?;
    info!(
        customer_id = %query.customer_id,
        token_id = %token_id,
        removed_locally = removed.is_some(),
        "Deleted payment token"
    );
    Ok(Json(json!({
        "id": token_id,
        "deleted": true,
        "removed_locally": removed.is_some(),
    })))
}
