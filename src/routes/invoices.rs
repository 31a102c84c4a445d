use crate::models::AppState;
use crate::paypal::invoicing::{created_invoice_id, InvoiceItem, InvoiceRequest};
use crate::paypal::orders::parse_amount;
use crate::paypal::{Money, ProviderResponse};
use crate::routes::json_or_default;
use crate::types::{AppError, AppResult};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invoice/api/invoices", post(create_invoice).get(list_invoices))
        .route(
            "/invoice/api/invoices/{invoice_id}",
            get(get_invoice).delete(delete_invoice),
        )
        .route("/invoice/api/invoices/{invoice_id}/{action}", post(invoice_action))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceLine {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
    pub unit_amount: String,
    pub description: Option<String>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceBody {
    #[validate(email)]
    pub recipient_email: String,
    #[validate(length(min = 1), nested)]
    pub items: Vec<InvoiceLine>,
    pub note: Option<String>,
    #[serde(default)]
    pub send: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "one")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    20
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionBody {
    pub note: Option<String>,
}

async fn create_invoice(
    State(state): State<AppState>,
    Json(body): Json<CreateInvoiceBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let currency = state.currency().to_string();
    let items = body
        .items
        .into_iter()
        .map(|line| {
            Ok(InvoiceItem {
                name: line.name,
                quantity: line.quantity.max(1).to_string(),
                unit_amount: Money::from_decimal(currency.as_str(), parse_amount(&line.unit_amount)?),
                description: line.description,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let invoice_number = state.paypal.next_invoice_number().await?;
    let request = InvoiceRequest::new(
        invoice_number,
        &currency,
        &body.recipient_email,
        &state.config.paypal.brand_name,
        items,
        body.note,
    );
    let created = state.paypal.create_invoice(&request).await?;
    let invoice_id = created_invoice_id(&created.body)
        .ok_or_else(|| AppError::Internal("invoice response had no id".to_string()))?;
    info!(invoice_id = %invoice_id, "Created draft invoice");

    let sent = if body.send {
        let response = state.paypal.send_invoice(&invoice_id).await?;
        info!(invoice_id = %invoice_id, "Sent invoice");
        response.body
    } else {
        Value::Null
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": invoice_id,
            "invoice": created.body,
            "send": sent,
        })),
    ))
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ProviderResponse> {
    state.paypal.list_invoices(query.page, query.page_size).await
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> AppResult<ProviderResponse> {
    state.paypal.get_invoice(&invoice_id).await
}

async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> AppResult<ProviderResponse> {
    let response = state.paypal.delete_invoice(&invoice_id).await?;
    info!(invoice_id = %invoice_id, "Deleted draft invoice");
    Ok(response)
}

async fn invoice_action(
    State(state): State<AppState>,
    Path((invoice_id, action)): Path<(String, String)>,
    body: Bytes,
) -> AppResult<ProviderResponse> {
    let body: ActionBody = json_or_default(&body)?;
    let response = match action.as_str() {
        "send" => state.paypal.send_invoice(&invoice_id).await?,
        "remind" => state.paypal.remind_invoice(&invoice_id).await?,
        "cancel" => {
            let note = body
                .note
                .unwrap_or_else(|| "This invoice has been cancelled".to_string());
            state.paypal.cancel_invoice(&invoice_id, &note).await?
        }
        other => {
            return Err(AppError::InvalidRequest(format!("unknown invoice action: {}", other)))
        }
    };
    info!(invoice_id = %invoice_id, action = %action, "Invoice action");
    Ok(response)
}
