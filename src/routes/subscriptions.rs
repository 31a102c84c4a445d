//! Subscriptions: catalog products, plans, subscriptions and their lifecycle

use crate::models::AppState;
use crate::paypal::orders::parse_amount;
use crate::paypal::subscriptions::{
    billing_progress, Frequency, IntervalUnit, PlanRequest, ProductRequest, SubscriptionAction,
};
use crate::paypal::{Money, ProviderResponse};
use crate::routes::json_or_default;
use crate::storage::SubscriptionRecord;
use crate::types::{AppError, AppResult};
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/subs/api/products", post(create_product))
        .route("/subs/api/plans", post(create_plan))
        .route("/subs/api/subscriptions", post(create_subscription))
        .route("/subs/api/subscriptions/{subscription_id}", get(get_subscription))
        .route(
            "/subs/api/subscriptions/{subscription_id}/{action}",
            post(subscription_action),
        )
        .route(
            "/subs/api/customers/{customer_id}/subscriptions",
            get(customer_subscriptions),
        )
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductBody {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlanBody {
    pub product_id: String,
    pub name: Option<String>,
    pub price: String,
    pub interval_unit: Option<IntervalUnit>,
    pub interval_count: Option<u32>,
    /// 0 means until cancelled
    #[serde(default)]
    pub total_cycles: u32,
    #[serde(default)]
    pub trial: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionBody {
    pub plan_id: String,
    pub customer_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionBody {
    pub customer_id: Option<String>,
    pub reason: Option<String>,
}

async fn create_product(State(state): State<AppState>, body: Bytes) -> AppResult<ProviderResponse> {
    let body: ProductBody = json_or_default(&body)?;
    let product = ProductRequest {
        name: body.name.unwrap_or_else(|| format!("{} Membership", state.config.paypal.brand_name)),
        description: body.description,
        kind: body.kind.unwrap_or_else(|| "SERVICE".to_string()),
        category: Some(body.category.unwrap_or_else(|| "SOFTWARE".to_string())),
    };
    let response = state.paypal.create_product(&product).await?;
    info!(product_id = ?response.id(), "Created catalog product");
    Ok(response)
}

async fn create_plan(
    State(state): State<AppState>,
    Json(body): Json<PlanBody>,
) -> AppResult<ProviderResponse> {
    let price = Money::from_decimal(state.currency(), parse_amount(&body.price)?);
    let frequency = Frequency {
        interval_unit: body.interval_unit.unwrap_or(IntervalUnit::Month),
        interval_count: body.interval_count.unwrap_or(1).max(1),
    };
    let name = body.name.unwrap_or_else(|| "Monthly plan".to_string());
    let plan = PlanRequest::fixed(
        &body.product_id,
        &name,
        price,
        frequency,
        body.total_cycles,
        body.trial,
    );
    let response = state.paypal.create_plan(&plan).await?;
    info!(plan_id = ?response.id(), "Created billing plan");
    Ok(response)
}

fn subscription_record(subscription_id: &str, plan_id: &str, body: &Value) -> SubscriptionRecord {
    let (next_payment_date, payment_count) = billing_progress(body);
    let now = Utc::now();
    SubscriptionRecord {
        subscription_id: subscription_id.to_string(),
        plan_id: plan_id.to_string(),
        status: body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string(),
        next_payment_date,
        payment_count,
        created: now,
        updated: now,
    }
}

async fn create_subscription(
    State(state): State<AppState>,
    Json(body): Json<SubscriptionBody>,
) -> AppResult<ProviderResponse> {
    let mut request = json!({
        "plan_id": body.plan_id,
        "application_context": {
            "brand_name": state.config.paypal.brand_name,
            "user_action": "SUBSCRIBE_NOW",
            "shipping_preference": "NO_SHIPPING",
            "return_url": state.public_url("/subs/complete"),
            "cancel_url": state.public_url("/subs/cancel"),
        }
    });
    if let Some(customer_id) = &body.customer_id {
        request["custom_id"] = json!(customer_id);
    }

    let response = state.paypal.create_subscription(&request).await?;
    info!(subscription_id = ?response.id(), "Created subscription");

    if let (Some(customer_id), Some(subscription_id)) = (&body.customer_id, response.id()) {
        let record = subscription_record(subscription_id, &body.plan_id, &response.body);
        state
            .vault
            .update(|data| data.record_subscription(customer_id, record))
            .await?;
    }
    Ok(response)
}

async fn get_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> AppResult<ProviderResponse> {
    state.paypal.get_subscription(&subscription_id).await
}

async fn subscription_action(
    State(state): State<AppState>,
    Path((subscription_id, action)): Path<(String, String)>,
    body: Bytes,
) -> AppResult<ProviderResponse> {
    let body: ActionBody = json_or_default(&body)?;
    if action == "approve" {
        return approve_subscription(&state, &subscription_id, body).await;
    }

    let action: SubscriptionAction = action.parse().map_err(AppError::InvalidRequest)?;
    let reason = body
        .reason
        .unwrap_or_else(|| format!("Customer requested {}", action.as_str()));
    let response = state
        .paypal
        .change_subscription(&subscription_id, action, &reason)
        .await?;

    let status = action.resulting_status();
    let updated = state
        .vault
        .update(|data| data.update_subscription_status(&subscription_id, status, Utc::now()))
        .await?;
    if !updated {
        warn!(subscription_id = %subscription_id, "Subscription not tracked locally");
    }
    info!(subscription_id = %subscription_id, status, "Subscription {}", action.as_str());
    Ok(response)
}

/// Buyer approved on PayPal; fetch the live resource and remember it
async fn approve_subscription(
    state: &AppState,
    subscription_id: &str,
    body: ActionBody,
) -> AppResult<ProviderResponse> {
    let customer_id = body
        .customer_id
        .ok_or_else(|| AppError::InvalidRequest("customer_id is required".to_string()))?;
    let response = state.paypal.get_subscription(subscription_id).await?;

    let plan_id = response
        .body
        .get("plan_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let record = subscription_record(subscription_id, &plan_id, &response.body);
    state
        .vault
        .update(|data| data.record_subscription(&customer_id, record))
        .await?;
    info!(
        subscription_id = %subscription_id,
        status = ?response.resource_status(),
        "Recorded approved subscription"
    );
    Ok(response)
}

async fn customer_subscriptions(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> AppResult<Json<Value>> {
    let data = state.vault.snapshot().await?;
    Ok(Json(json!({
        "customer_id": customer_id,
        "subscriptions": data.subscriptions_for(&customer_id),
    })))
}
