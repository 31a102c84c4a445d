// Orders v2: payload model and client calls
// API Reference: https://developer.paypal.com/docs/api/orders/v2/

use super::client::{resource_id, PayPalClient, ProviderResponse};
use crate::types::{AppError, AppResult};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Capture,
    Authorize,
}

/// Parse a browser-supplied amount, rounded to cents. Must be positive
/// after rounding.
pub fn parse_amount(value: &str) -> AppResult<Decimal> {
    let amount = Decimal::from_str(value.trim())?.round_dp(2);
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidRequest(format!(
            "amount must be at least 0.01, got {}",
            value
        )));
    }
    Ok(amount)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Money {
    pub currency_code: String,
    pub value: String,
}

impl Money {
    pub fn new(currency_code: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            currency_code: currency_code.into(),
            value: value.into(),
        }
    }

    pub fn from_decimal(currency_code: impl Into<String>, value: Decimal) -> Self {
        Self::new(currency_code, format!("{:.2}", value.round_dp(2)))
    }

    pub fn decimal(&self) -> AppResult<Decimal> {
        Ok(Decimal::from_str(self.value.trim())?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AmountBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_total: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_total: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Amount {
    pub currency_code: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<AmountBreakdown>,
}

impl Amount {
    pub fn new(currency_code: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            currency_code: currency_code.into(),
            value: value.into(),
            breakdown: None,
        }
    }

    /// Amount whose breakdown carries a single item total equal to the value
    pub fn with_item_total(currency_code: &str, value: Decimal) -> Self {
        let money = Money::from_decimal(currency_code, value);
        Self {
            currency_code: currency_code.to_string(),
            value: money.value.clone(),
            breakdown: Some(AmountBreakdown {
                item_total: Some(money),
                ..Default::default()
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Payee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub name: String,
    pub quantity: String,
    pub unit_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseUnit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee: Option<Payee>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl PurchaseUnit {
    pub fn new(amount: Amount) -> Self {
        Self {
            reference_id: None,
            description: None,
            custom_id: None,
            invoice_id: None,
            amount,
            payee: None,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<String>,
    /// State / province
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_area_1: Option<String>,
    /// City
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_area_2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackConfig {
    pub callback_events: Vec<String>,
    pub callback_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExperienceContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_service_instructions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_update_callback_config: Option<CallbackConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultInstruction {
    pub store_in_vault: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_multiple_payment_tokens: Option<bool>,
}

impl VaultInstruction {
    /// Save the card once the payment succeeds
    pub fn on_success() -> Self {
        Self {
            store_in_vault: "ON_SUCCESS".to_string(),
            usage_type: None,
            customer_type: None,
            permit_multiple_payment_tokens: None,
        }
    }

    /// PayPal wallets also need the usage and customer type
    pub fn paypal_on_success() -> Self {
        Self {
            usage_type: Some("MERCHANT".to_string()),
            customer_type: Some("CONSUMER".to_string()),
            permit_multiple_payment_tokens: Some(false),
            ..Self::on_success()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verification {
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerRef>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    OneTime,
    Recurring,
    #[default]
    Unscheduled,
}

/// Card-on-file indicator for merchant-initiated charges
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCredential {
    pub payment_initiator: String,
    pub payment_type: PaymentType,
    pub usage: String,
}

impl StoredCredential {
    pub fn merchant_subsequent(payment_type: PaymentType) -> Self {
        Self {
            payment_initiator: "MERCHANT".to_string(),
            payment_type,
            usage: "SUBSEQUENT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaypalSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<SourceAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_context: Option<ExperienceContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CardSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<SourceAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_credential: Option<StoredCredential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_context: Option<ExperienceContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenSource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartyName {
    pub given_name: String,
    pub surname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phone {
    pub national_number: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayUponInvoiceSource {
    pub name: PartyName,
    pub email: String,
    pub birth_date: String,
    pub phone: Phone,
    pub billing_address: Address,
    pub experience_context: ExperienceContext,
}

/// `payment_source` of an order; serializes as `{"paypal": {...}}`, `{"card": {...}}`, ...
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    Paypal(PaypalSource),
    Card(CardSource),
    Token(TokenSource),
    PayUponInvoice(PayUponInvoiceSource),
}

impl PaymentSource {
    pub fn billing_agreement(id: impl Into<String>) -> Self {
        PaymentSource::Token(TokenSource {
            id: id.into(),
            kind: "BILLING_AGREEMENT".to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub intent: Intent,
    pub purchase_units: Vec<PurchaseUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_source: Option<PaymentSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_instruction: Option<String>,
}

impl OrderRequest {
    pub fn new(intent: Intent, purchase_units: Vec<PurchaseUnit>) -> Self {
        Self {
            intent,
            purchase_units,
            payment_source: None,
            processing_instruction: None,
        }
    }

    /// Single purchase unit for `amount` in `currency`
    pub fn single(intent: Intent, currency: &str, amount: Decimal) -> Self {
        Self::new(
            intent,
            vec![PurchaseUnit::new(Amount::new(
                currency,
                Money::from_decimal(currency, amount).value,
            ))],
        )
    }

    pub fn with_payment_source(mut self, source: PaymentSource) -> Self {
        self.payment_source = Some(source);
        self
    }
}

/// JSON Patch operation for `PATCH /v2/checkout/orders/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchOperation {
    pub op: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: "replace".to_string(),
            path: path.into(),
            value: Some(value),
        }
    }
}

/// Idempotency and risk headers some order flows must send
#[derive(Debug, Clone, Default)]
pub struct OrderHeaders {
    pub request_id: Option<String>,
    pub client_metadata_id: Option<String>,
}

impl OrderHeaders {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("Prefer", "return=representation".to_string())];
        if let Some(id) = &self.request_id {
            pairs.push(("PayPal-Request-Id", id.clone()));
        }
        if let Some(id) = &self.client_metadata_id {
            pairs.push(("PayPal-Client-Metadata-Id", id.clone()));
        }
        pairs
    }
}

impl PayPalClient {
    pub async fn create_order(&self, order: &OrderRequest) -> AppResult<ProviderResponse> {
        self.create_order_with(order, &OrderHeaders::default()).await
    }

    pub async fn create_order_with(
        &self,
        order: &OrderRequest,
        headers: &OrderHeaders,
    ) -> AppResult<ProviderResponse> {
        self.send(
            Method::POST,
            "/v2/checkout/orders",
            Some(order),
            &headers.to_pairs(),
        )
        .await
    }

    pub async fn get_order(&self, order_id: &str) -> AppResult<ProviderResponse> {
        self.get(&format!("/v2/checkout/orders/{}", resource_id(order_id)?))
            .await
    }

    pub async fn capture_order(&self, order_id: &str) -> AppResult<ProviderResponse> {
        let path = format!("/v2/checkout/orders/{}/capture", resource_id(order_id)?);
        self.send::<Value>(
            Method::POST,
            &path,
            None,
            &OrderHeaders::default().to_pairs(),
        )
        .await
    }

    pub async fn authorize_order(&self, order_id: &str) -> AppResult<ProviderResponse> {
        let path = format!("/v2/checkout/orders/{}/authorize", resource_id(order_id)?);
        self.send::<Value>(
            Method::POST,
            &path,
            None,
            &OrderHeaders::default().to_pairs(),
        )
        .await
    }

    pub async fn patch_order(
        &self,
        order_id: &str,
        operations: &[PatchOperation],
    ) -> AppResult<ProviderResponse> {
        self.patch(
            &format!("/v2/checkout/orders/{}", resource_id(order_id)?),
            operations,
        )
        .await
    }
}

/// Pull the vaulted token out of a captured/created order, if the provider
/// saved one (`payment_source.<kind>.attributes.vault`)
pub fn vaulted_token(order: &Value) -> Option<VaultedToken> {
    let sources = order.get("payment_source")?.as_object()?;
    sources.iter().find_map(|(kind, source)| {
        let vault = source.get("attributes")?.get("vault")?;
        Some(VaultedToken {
            id: vault.get("id")?.as_str()?.to_string(),
            status: vault
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN")
                .to_string(),
            customer_id: vault
                .get("customer")
                .and_then(|c| c.get("id"))
                .and_then(Value::as_str)
                .map(String::from),
            source_kind: kind.clone(),
            source: source.clone(),
        })
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaultedToken {
    pub id: String,
    pub status: String,
    pub customer_id: Option<String>,
    /// `paypal`, `card`, ...
    pub source_kind: String,
    pub source: Value,
}
