// Payouts v1: batch payouts to PayPal accounts

use super::client::{resource_id, PayPalClient, ProviderResponse};
use super::orders::Money;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderBatchHeader {
    pub sender_batch_id: String,
    pub email_subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutItem {
    /// `EMAIL`, `PHONE` or `PAYPAL_ID`
    pub recipient_type: String,
    pub amount: PayoutAmount,
    pub receiver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub sender_item_id: String,
}

/// Payouts v1 spells money as `{value, currency}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutAmount {
    pub value: String,
    pub currency: String,
}

impl From<Money> for PayoutAmount {
    fn from(money: Money) -> Self {
        Self {
            value: money.value,
            currency: money.currency_code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutRequest {
    pub sender_batch_header: SenderBatchHeader,
    pub items: Vec<PayoutItem>,
}

impl PayPalClient {
    pub async fn create_payout(&self, payout: &PayoutRequest) -> AppResult<ProviderResponse> {
        self.post("/v1/payments/payouts", payout).await
    }

    pub async fn get_payout(&self, batch_id: &str) -> AppResult<ProviderResponse> {
        self.get(&format!("/v1/payments/payouts/{}", resource_id(batch_id)?))
            .await
    }

    pub async fn get_payout_item(&self, item_id: &str) -> AppResult<ProviderResponse> {
        self.get(&format!("/v1/payments/payouts-item/{}", resource_id(item_id)?))
            .await
    }

    /// Only unclaimed items can be cancelled
    pub async fn cancel_payout_item(&self, item_id: &str) -> AppResult<ProviderResponse> {
        self.post_empty(&format!(
            "/v1/payments/payouts-item/{}/cancel",
            resource_id(item_id)?
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_amount_field_names() {
        let amount: PayoutAmount = Money::new("USD", "9.87").into();
        let value = serde_json::to_value(&amount).unwrap();
        assert_eq!(value["value"], "9.87");
        assert_eq!(value["currency"], "USD");
        assert!(value.get("currency_code").is_none());
    }
}
