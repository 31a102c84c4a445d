// Subscriptions v1: catalog products, billing plans, subscriptions
// API Reference: https://developer.paypal.com/docs/api/subscriptions/v1/

use super::client::{resource_id, PayPalClient, ProviderResponse};
use super::orders::Money;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frequency {
    pub interval_unit: IntervalUnit,
    pub interval_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingScheme {
    pub fixed_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingCycle {
    pub frequency: Frequency,
    /// `TRIAL` or `REGULAR`
    pub tenure_type: String,
    pub sequence: u32,
    /// 0 means infinite
    pub total_cycles: u32,
    pub pricing_scheme: PricingScheme,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPreferences {
    pub auto_bill_outstanding: bool,
    pub setup_fee_failure_action: String,
    pub payment_failure_threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_fee: Option<Money>,
}

impl Default for PaymentPreferences {
    fn default() -> Self {
        Self {
            auto_bill_outstanding: true,
            setup_fee_failure_action: "CONTINUE".to_string(),
            payment_failure_threshold: 3,
            setup_fee: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRequest {
    pub product_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    pub billing_cycles: Vec<BillingCycle>,
    pub payment_preferences: PaymentPreferences,
}

impl PlanRequest {
    /// Fixed-price plan, optionally preceded by a free trial cycle of one interval
    pub fn fixed(
        product_id: &str,
        name: &str,
        price: Money,
        frequency: Frequency,
        total_cycles: u32,
        trial: bool,
    ) -> Self {
        let mut billing_cycles = Vec::new();
        if trial {
            billing_cycles.push(BillingCycle {
                frequency: frequency.clone(),
                tenure_type: "TRIAL".to_string(),
                sequence: 1,
                total_cycles: 1,
                pricing_scheme: PricingScheme {
                    fixed_price: Money::new(price.currency_code.clone(), "0"),
                },
            });
        }
        billing_cycles.push(BillingCycle {
            frequency,
            tenure_type: "REGULAR".to_string(),
            sequence: billing_cycles.len() as u32 + 1,
            total_cycles,
            pricing_scheme: PricingScheme { fixed_price: price },
        });
        Self {
            product_id: product_id.to_string(),
            name: name.to_string(),
            description: None,
            status: "ACTIVE".to_string(),
            billing_cycles,
            payment_preferences: PaymentPreferences::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Cancel,
    Suspend,
    Activate,
}

impl SubscriptionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionAction::Cancel => "cancel",
            SubscriptionAction::Suspend => "suspend",
            SubscriptionAction::Activate => "activate",
        }
    }

    /// Local status once the provider accepted the action
    pub fn resulting_status(&self) -> &'static str {
        match self {
            SubscriptionAction::Cancel => "CANCELLED",
            SubscriptionAction::Suspend => "SUSPENDED",
            SubscriptionAction::Activate => "ACTIVE",
        }
    }
}

impl std::str::FromStr for SubscriptionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancel" => Ok(SubscriptionAction::Cancel),
            "suspend" => Ok(SubscriptionAction::Suspend),
            "activate" => Ok(SubscriptionAction::Activate),
            other => Err(format!("unknown subscription action: {}", other)),
        }
    }
}

impl PayPalClient {
    pub async fn create_product(&self, product: &ProductRequest) -> AppResult<ProviderResponse> {
        self.post("/v1/catalogs/products", product).await
    }

    pub async fn create_plan(&self, plan: &PlanRequest) -> AppResult<ProviderResponse> {
        self.post("/v1/billing/plans", plan).await
    }

    pub async fn create_subscription(&self, subscription: &Value) -> AppResult<ProviderResponse> {
        self.post("/v1/billing/subscriptions", subscription).await
    }

    pub async fn get_subscription(&self, subscription_id: &str) -> AppResult<ProviderResponse> {
        self.get(&format!(
            "/v1/billing/subscriptions/{}",
            resource_id(subscription_id)?
        ))
        .await
    }

    pub async fn change_subscription(
        &self,
        subscription_id: &str,
        action: SubscriptionAction,
        reason: &str,
    ) -> AppResult<ProviderResponse> {
        self.post(
            &format!(
                "/v1/billing/subscriptions/{}/{}",
                resource_id(subscription_id)?,
                action.as_str()
            ),
            &serde_json::json!({ "reason": reason }),
        )
        .await
    }
}

/// `(next_billing_time, cycles_completed)` from a subscription resource
pub fn billing_progress(subscription: &Value) -> (Option<String>, u32) {
    let info = subscription.get("billing_info");
    let next = info
        .and_then(|i| i.get("next_billing_time"))
        .and_then(Value::as_str)
        .map(String::from);
    let completed = info
        .and_then(|i| i.get("cycle_executions"))
        .and_then(Value::as_array)
        .map(|cycles| {
            cycles
                .iter()
                .filter_map(|c| c.get("cycles_completed").and_then(Value::as_u64))
                .sum::<u64>() as u32
        })
        .unwrap_or(0);
    (next, completed)
}
