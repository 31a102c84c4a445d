//! One order, several purchase units (marketplace-style multi-seller)

use crate::models::AppState;
use crate::paypal::orders::{parse_amount, Payee};
use crate::paypal::{Amount, Intent, Money, OrderRequest, ProviderResponse, PurchaseUnit};
use crate::types::{AppError, AppResult};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/multi/api/orders", post(create_order))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UnitBody {
    #[validate(length(min = 1, max = 256))]
    pub reference_id: String,
    pub amount: String,
    #[validate(email)]
    pub payee_email: Option<String>,
    pub payee_merchant_id: Option<String>,
    #[validate(length(max = 127))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MultiOrderBody {
    #[validate(length(min = 1, max = 10), nested)]
    pub units: Vec<UnitBody>,
}

fn purchase_units(state: &AppState, units: Vec<UnitBody>) -> AppResult<Vec<PurchaseUnit>> {
    let mut seen = HashSet::new();
    units
        .into_iter()
        .map(|unit| {
            if !seen.insert(unit.reference_id.clone()) {
                return Err(AppError::InvalidRequest(format!(
                    "duplicate reference_id {}",
                    unit.reference_id
                )));
            }
            let amount = parse_amount(&unit.amount)?;
            let mut purchase_unit = PurchaseUnit::new(Amount::new(
                state.currency(),
                Money::from_decimal(state.currency(), amount).value,
            ));
            purchase_unit.reference_id = Some(unit.reference_id);
            purchase_unit.description = unit.description;
            if unit.payee_email.is_some() || unit.payee_merchant_id.is_some() {
                purchase_unit.payee = Some(Payee {
                    email_address: unit.payee_email,
                    merchant_id: unit.payee_merchant_id,
                });
            }
            Ok(purchase_unit)
        })
        .collect()
}

async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<MultiOrderBody>,
) -> AppResult<ProviderResponse> {
    body.validate()?;
    let units = purchase_units(&state, body.units)?;
    let unit_count = units.len();
    let order = OrderRequest::new(Intent::Capture, units);

    let response = state.paypal.create_order(&order).await?;
    info!(order_id = ?response.id(), units = unit_count, "Created multi-unit order");
    Ok(response)
}
