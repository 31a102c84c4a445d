//! Pay upon invoice (Germany, EUR only)

use crate::models::AppState;
use crate::paypal::orders::{
    Address, ExperienceContext, OrderHeaders, PartyName, PayUponInvoiceSource, Phone,
};
use crate::paypal::{Amount, Intent, OrderRequest, PaymentSource, ProviderResponse, PurchaseUnit};
use crate::routes::order_amount;
use crate::types::{AppError, AppResult};
use axum::{extract::State, routing::post, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const PUI_CURRENCY: &str = "EUR";
const PROCESSING_INSTRUCTION: &str = "ORDER_COMPLETE_ON_PAYMENT_APPROVAL";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/pui/api/orders", post(create_order))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
pub struct PuiOrderBody {
    pub amount: Option<String>,
    pub name: PartyName,
    #[validate(email)]
    pub email: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
    pub phone: Phone,
    pub billing_address: Address,
    /// FraudNet session id collected on the page; sent as `PayPal-Client-Metadata-Id`
    #[validate(length(min = 1, max = 32))]
    pub fraudnet_session_id: Option<String>,
    pub locale: Option<String>,
}

async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<PuiOrderBody>,
) -> AppResult<ProviderResponse> {
    body.validate()?;
    NaiveDate::parse_from_str(&body.birth_date, "%Y-%m-%d").map_err(|_| {
        AppError::InvalidRequest(format!("birth_date must be YYYY-MM-DD, got {}", body.birth_date))
    })?;

    let amount = order_amount(&state, body.amount.as_deref())?;
    let source = PayUponInvoiceSource {
        name: body.name,
        email: body.email,
        birth_date: body.birth_date,
        phone: body.phone,
        billing_address: body.billing_address,
        experience_context: ExperienceContext {
            brand_name: Some(state.config.paypal.brand_name.clone()),
            locale: Some(body.locale.unwrap_or_else(|| "de-DE".to_string())),
            customer_service_instructions: Some(vec![format!(
                "Customer service: {}",
                state.public_url("/pui/support")
            )]),
            ..Default::default()
        },
    };

    let mut order = OrderRequest::new(
        Intent::Capture,
        vec![PurchaseUnit::new(Amount::with_item_total(PUI_CURRENCY, amount))],
    )
    .with_payment_source(PaymentSource::PayUponInvoice(source));
    order.processing_instruction = Some(PROCESSING_INSTRUCTION.to_string());

    let headers = OrderHeaders {
        request_id: Some(Uuid::new_v4().to_string()),
        client_metadata_id: Some(
            body.fraudnet_session_id
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        ),
    };

    let response = state.paypal.create_order_with(&order, &headers).await?;
    info!(
        order_id = ?response.id(),
        status = ?response.resource_status(),
        "Created pay-upon-invoice order"
    );
    Ok(response)
}
