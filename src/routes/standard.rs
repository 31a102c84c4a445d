//! Standard checkout: create, look up, capture and refund orders

use crate::models::AppState;
use crate::paypal::orders::{parse_amount, Item};
use crate::paypal::payments::Refund;
use crate::paypal::{Amount, Intent, Money, OrderRequest, ProviderResponse, PurchaseUnit};
use crate::routes::{json_or_default, order_amount};
use crate::types::{AppError, AppResult};
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/{order_id}", get(get_order))
        .route("/api/orders/{order_id}/capture", post(capture_order))
        .route("/api/payments/captures/{capture_id}/refund", post(refund_capture))
        .with_state(state)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    #[serde(default)]
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default = "one")]
    pub quantity: u32,
    pub price: Option<String>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderBody {
    #[serde(default)]
    pub cart: Vec<CartItem>,
    pub amount: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundBody {
    pub amount: Option<String>,
    pub note_to_payer: Option<String>,
}

/// Purchase unit for a cart. Priced cart lines become order items with a
/// matching `item_total`; otherwise the explicit or default amount is used.
pub(crate) fn cart_purchase_unit(state: &AppState, body: &CreateOrderBody) -> AppResult<PurchaseUnit> {
    let currency = state.currency();
    let mut items = Vec::new();
    let mut total = Decimal::ZERO;

    for line in body.cart.iter().filter(|line| line.price.is_some()) {
        if line.quantity == 0 {
            return Err(AppError::InvalidRequest("cart quantity must be at least 1".to_string()));
        }
        let price = parse_amount(line.price.as_deref().unwrap_or_default())?;
        total += price * Decimal::from(line.quantity);
        items.push(Item {
            name: line
                .name
                .clone()
                .or_else(|| line.id.clone())
                .unwrap_or_else(|| "Item".to_string()),
            quantity: line.quantity.to_string(),
            unit_amount: Money::from_decimal(currency, price),
            category: None,
        });
    }

    if items.is_empty() {
        let amount = order_amount(state, body.amount.as_deref())?;
        return Ok(PurchaseUnit::new(Amount::new(
            currency,
            Money::from_decimal(currency, amount).value,
        )));
    }

    let mut unit = PurchaseUnit::new(Amount::with_item_total(currency, total));
    unit.items = items;
    Ok(unit)
}

async fn create_order(State(state): State<AppState>, body: Bytes) -> AppResult<ProviderResponse> {
    let body: CreateOrderBody = json_or_default(&body)?;
    let unit = cart_purchase_unit(&state, &body)?;
    let order = OrderRequest::new(Intent::Capture, vec![unit]);

    let response = state.paypal.create_order(&order).await?;
    info!(order_id = ?response.id(), "Created order");
    Ok(response)
}

async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<ProviderResponse> {
    state.paypal.get_order(&order_id).await
}

pub(crate) async fn capture_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<ProviderResponse> {
    let response = match state.paypal.capture_order(&order_id).await {
        Ok(response) => response,
        Err(err) => {
            if let Some(issue) = err.provider_issue() {
                let declined = matches!(&err, AppError::Provider(p) if p.is_instrument_declined());
                warn!(
                    order_id = %order_id,
                    issue = %issue,
                    payer_can_retry = declined,
                    "Capture rejected by provider"
                );
            }
            return Err(err);
        }
    };
    info!(
        order_id = %order_id,
        status = ?response.resource_status(),
        "Captured order"
    );
    Ok(response)
}

async fn refund_capture(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
    body: Bytes,
) -> AppResult<ProviderResponse> {
    let body: RefundBody = json_or_default(&body)?;
    let amount = body
        .amount
        .as_deref()
        .map(parse_amount)
        .transpose()?
        .map(|value| Money::from_decimal(state.currency(), value));
    let refund = Refund {
        amount,
        note_to_payer: body.note_to_payer,
    };

    let response = state.paypal.refund_capture(&capture_id, &refund).await?;
    info!(capture_id = %capture_id, status = ?response.resource_status(), "Refunded capture");
    Ok(response)
}
