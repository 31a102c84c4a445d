//! Shipping module: server-side shipping callbacks and option changes
//!
//! PayPal calls `/shipping/api/shipping-callback` whenever the buyer picks an
//! address or a shipping option. The answer carries the priced options and a
//! recomputed amount breakdown, or a 422 with `COUNTRY_ERROR` /
//! `METHOD_UNAVAILABLE` so the buyer is asked to choose again.

use crate::models::{AmountBody, AppState};
use crate::paypal::orders::{
    Address, AmountBreakdown, CallbackConfig, ExperienceContext, PatchOperation, PaypalSource,
};
use crate::paypal::{Amount, Intent, Money, OrderRequest, PaymentSource, ProviderResponse, PurchaseUnit};
use crate::routes::{json_or_default, order_amount};
use crate::types::AppResult;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{patch, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

const DEFAULT_REFERENCE_ID: &str = "default";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/shipping/api/orders", post(create_order))
        .route("/shipping/api/orders/{order_id}", patch(patch_shipping_option))
        .route("/shipping/api/shipping-callback", post(shipping_callback))
        .with_state(state)
}

#[derive(Debug, Clone, Copy)]
pub struct ShippingMethod {
    pub id: &'static str,
    pub label: &'static str,
    cents: i64,
}

impl ShippingMethod {
    pub fn price(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }
}

pub const SHIPPING_METHODS: [ShippingMethod; 3] = [
    ShippingMethod { id: "SHIP_FREE", label: "Free Shipping", cents: 0 },
    ShippingMethod { id: "SHIP_EXPRESS", label: "Express Shipping", cents: 1000 },
    ShippingMethod { id: "SHIP_PRIORITY", label: "Priority Overnight", cents: 2500 },
];

fn find_method(id: &str) -> Option<&'static ShippingMethod> {
    SHIPPING_METHODS.iter().find(|m| m.id == id)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingOption {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Money,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingQuote {
    pub amount: Amount,
    pub options: Vec<ShippingOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingRejection {
    CountryError,
    MethodUnavailable,
}

impl ShippingRejection {
    pub fn issue(&self) -> &'static str {
        match self {
            ShippingRejection::CountryError => "COUNTRY_ERROR",
            ShippingRejection::MethodUnavailable => "METHOD_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ShippingRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "details": [{ "issue": self.issue() }]
            })),
        )
            .into_response()
    }
}

/// Price every method for `item_total` and mark `selected` (first method
/// when none is given). Total = item total + selected shipping.
pub fn price_options(
    item_total: Decimal,
    currency: &str,
    selected: Option<&str>,
) -> Result<ShippingQuote, ShippingRejection> {
    let chosen = match selected {
        Some(id) => find_method(id).ok_or(ShippingRejection::MethodUnavailable)?,
        None => &SHIPPING_METHODS[0],
    };

    let options = SHIPPING_METHODS
        .iter()
        .map(|method| ShippingOption {
            id: method.id.to_string(),
            label: method.label.to_string(),
            kind: "SHIPPING".to_string(),
            amount: Money::from_decimal(currency, method.price()),
            selected: method.id == chosen.id,
        })
        .collect();

    let total = item_total + chosen.price();
    let amount = Amount {
        currency_code: currency.to_string(),
        value: Money::from_decimal(currency, total).value,
        breakdown: Some(AmountBreakdown {
            item_total: Some(Money::from_decimal(currency, item_total)),
            shipping: Some(Money::from_decimal(currency, chosen.price())),
            ..Default::default()
        }),
    };

    Ok(ShippingQuote { amount, options })
}

/// Country check, then pricing
pub fn quote(
    allowed_countries: &[String],
    address: &Address,
    item_total: Decimal,
    currency: &str,
    selected: Option<&str>,
) -> Result<ShippingQuote, ShippingRejection> {
    let supported = allowed_countries
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&address.country_code));
    if !supported {
        return Err(ShippingRejection::CountryError);
    }
    price_options(item_total, currency, selected)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOption {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackUnit {
    pub reference_id: Option<String>,
    pub amount: Amount,
}

impl CallbackUnit {
    /// Item total of the unit, excluding whatever shipping was priced before
    fn item_total(&self) -> AppResult<Decimal> {
        let breakdown = self.amount.breakdown.as_ref();
        if let Some(item_total) = breakdown.and_then(|b| b.item_total.as_ref()) {
            return item_total.decimal();
        }
        let value = Money::new(self.amount.currency_code.clone(), self.amount.value.clone()).decimal()?;
        let shipping = match breakdown.and_then(|b| b.shipping.as_ref()) {
            Some(shipping) => shipping.decimal()?,
            None => Decimal::ZERO,
        };
        Ok(value - shipping)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingCallback {
    pub id: Option<String>,
    pub shipping_address: Address,
    pub shipping_option: Option<SelectedOption>,
    #[serde(default)]
    pub purchase_units: Vec<CallbackUnit>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShippingPatchBody {
    pub shipping_option_id: String,
    pub item_total: Option<String>,
}

async fn create_order(State(state): State<AppState>, body: Bytes) -> AppResult<ProviderResponse> {
    let body: AmountBody = json_or_default(&body)?;
    let amount = order_amount(&state, body.amount.as_deref())?;
    let currency = state.currency();

    let experience_context = ExperienceContext {
        brand_name: Some(state.config.paypal.brand_name.clone()),
        shipping_preference: Some("GET_FROM_FILE".to_string()),
        user_action: Some("PAY_NOW".to_string()),
        return_url: Some(state.public_url("/shipping/complete")),
        cancel_url: Some(state.public_url("/shipping/cancel")),
        order_update_callback_config: Some(CallbackConfig {
            callback_events: vec!["SHIPPING_ADDRESS".to_string(), "SHIPPING_OPTIONS".to_string()],
            callback_url: state.public_url("/shipping/api/shipping-callback"),
        }),
        ..Default::default()
    };
    let order = OrderRequest::new(
        Intent::Capture,
        vec![PurchaseUnit::new(Amount::with_item_total(currency, amount))],
    )
    .with_payment_source(PaymentSource::Paypal(PaypalSource {
        experience_context: Some(experience_context),
        ..Default::default()
    }));

    let response = state.paypal.create_order(&order).await?;
    info!(order_id = ?response.id(), "Created order with shipping callback");
    Ok(response)
}

async fn shipping_callback(
    State(state): State<AppState>,
    Json(callback): Json<ShippingCallback>,
) -> AppResult<Response> {
    debug!(
        order_id = ?callback.id,
        country = %callback.shipping_address.country_code,
        "Shipping callback"
    );

    let (reference_id, currency, item_total) = match callback.purchase_units.first() {
        Some(unit) => (
            unit.reference_id
                .clone()
                .unwrap_or_else(|| DEFAULT_REFERENCE_ID.to_string()),
            unit.amount.currency_code.clone(),
            unit.item_total()?,
        ),
        None => (
            DEFAULT_REFERENCE_ID.to_string(),
            state.currency().to_string(),
            order_amount(&state, None)?,
        ),
    };

    let quote = match quote(
        &state.config.checkout.shipping_countries,
        &callback.shipping_address,
        item_total,
        &currency,
        callback.shipping_option.as_ref().map(|o| o.id.as_str()),
    ) {
        Ok(quote) => quote,
        Err(rejection) => {
            info!(issue = rejection.issue(), "Rejected shipping selection");
            return Ok(rejection.into_response());
        }
    };

    Ok(Json(json!({
        "id": callback.id,
        "purchase_units": [{
            "reference_id": reference_id,
            "amount": quote.amount,
            "shipping_options": quote.options,
        }]
    }))
    .into_response())
}

/// Client-side `onShippingOptionsChange`: reprice and patch the order
async fn patch_shipping_option(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<ShippingPatchBody>,
) -> AppResult<Response> {
    let item_total = order_amount(&state, body.item_total.as_deref())?;
    let quote = match price_options(item_total, state.currency(), Some(&body.shipping_option_id)) {
        Ok(quote) => quote,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let unit_path = format!("/purchase_units/@reference_id=='{}'", DEFAULT_REFERENCE_ID);
    let operations = [
        PatchOperation::replace(format!("{}/amount", unit_path), serde_json::to_value(&quote.amount)?),
        PatchOperation::replace(
            format!("{}/shipping/options", unit_path),
            serde_json::to_value(&quote.options)?,
        ),
    ];

    let response = state.paypal.patch_order(&order_id, &operations).await?;
    info!(order_id = %order_id, option = %body.shipping_option_id, "Patched shipping option");
    Ok(response.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::test_app;
    use axum::http::Method;
    use mockito::Matcher;
    use std::str::FromStr;

    fn address(country: &str) -> Address {
        Address {
            country_code: country.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_quote_adds_selected_shipping() {
        let allowed = vec!["US".to_string()];
        let total = Decimal::from_str("100.00").unwrap();

        let quote = quote(&allowed, &address("us"), total, "USD", Some("SHIP_EXPRESS")).unwrap();
        assert_eq!(quote.amount.value, "110.00");
        let breakdown = quote.amount.breakdown.unwrap();
        assert_eq!(breakdown.shipping.unwrap().value, "10.00");
        assert_eq!(breakdown.item_total.unwrap().value, "100.00");
        let selected: Vec<_> = quote.options.iter().filter(|o| o.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "SHIP_EXPRESS");
    }

    #[test]
    fn test_quote_rejections() {
        let allowed = vec!["US".to_string()];
        let total = Decimal::from_str("20.00").unwrap();
        assert_eq!(
            quote(&allowed, &address("DE"), total, "USD", None).unwrap_err(),
            ShippingRejection::CountryError
        );
        assert_eq!(
            quote(&allowed, &address("US"), total, "USD", Some("SHIP_CARRIER_PIGEON")).unwrap_err(),
            ShippingRejection::MethodUnavailable
        );
        // Defaults to the free option
        let quote = quote(&allowed, &address("US"), total, "USD", None).unwrap();
        assert_eq!(quote.amount.value, "20.00");
    }

    #[tokio::test]
    async fn test_callback_reprices_order() {
        let app = test_app().await;
        let (status, body) = app
            .post(
                "/shipping/api/shipping-callback",
                json!({
                    "id": "ORDER1",
                    "shipping_address": { "country_code": "US", "admin_area_1": "CA", "postal_code": "95131" },
                    "shipping_option": { "id": "SHIP_PRIORITY" },
                    "purchase_units": [{
                        "reference_id": "default",
                        "amount": {
                            "currency_code": "USD",
                            "value": "50.00",
                            "breakdown": { "item_total": { "currency_code": "USD", "value": "50.00" } }
                        }
                    }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "ORDER1");
        assert_eq!(body["purchase_units"][0]["amount"]["value"], "75.00");
        assert_eq!(body["purchase_units"][0]["shipping_options"][2]["selected"], true);
    }

    #[tokio::test]
    async fn test_callback_rejects_unsupported_country() {
        let app = test_app().await;
        let (status, body) = app
            .post(
                "/shipping/api/shipping-callback",
                json!({
                    "id": "ORDER1",
                    "shipping_address": { "country_code": "FR" },
                    "purchase_units": [{ "amount": { "currency_code": "USD", "value": "50.00" } }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["name"], "UNPROCESSABLE_ENTITY");
        assert_eq!(body["details"][0]["issue"], "COUNTRY_ERROR");
    }

    #[tokio::test]
    async fn test_create_order_registers_callback() {
        let mut app = test_app().await;
        app.mock_token().await;
        let create = app
            .server
            .mock("POST", "/v2/checkout/orders")
            .match_body(Matcher::PartialJson(json!({
                "payment_source": { "paypal": { "experience_context": {
                    "shipping_preference": "GET_FROM_FILE",
                    "order_update_callback_config": {
                        "callback_events": ["SHIPPING_ADDRESS", "SHIPPING_OPTIONS"],
                        "callback_url": "http://localhost:8888/shipping/api/shipping-callback"
                    }
                } } }
            })))
            .with_status(201)
            .with_body(r#"{"id":"SHIP-ORDER","status":"PAYER_ACTION_REQUIRED"}"#)
            .create_async()
            .await;

        let (status, _) = app.post("/shipping/api/orders", json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_patch_replaces_amount_and_options() {
        let mut app = test_app().await;
        app.mock_token().await;
        let patch = app
            .server
            .mock("PATCH", "/v2/checkout/orders/ORDER1")
            .match_body(Matcher::PartialJson(json!([
                {
                    "op": "replace",
                    "path": "/purchase_units/@reference_id=='default'/amount",
                    "value": { "value": "30.00" }
                }
            ])))
            .with_status(204)
            .create_async()
            .await;

        let (status, _) = app
            .request(
                Method::PATCH,
                "/shipping/api/orders/ORDER1",
                Some(json!({ "shipping_option_id": "SHIP_EXPRESS", "item_total": "20.00" })),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        patch.assert_async().await;
    }
}
