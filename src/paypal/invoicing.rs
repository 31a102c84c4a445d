// Invoicing v2
// API Reference: https://developer.paypal.com/docs/api/invoicing/v2/

use super::client::{resource_id, PayPalClient, ProviderResponse};
use super::orders::Money;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub currency_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub payment_term: PaymentTerm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentTerm {
    /// `DUE_ON_RECEIPT`, `NET_10`, `NET_30`, ...
    pub term_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceItem {
    pub name: String,
    pub quantity: String,
    pub unit_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceRequest {
    pub detail: InvoiceDetail,
    pub invoicer: Value,
    pub primary_recipients: Vec<Value>,
    pub items: Vec<InvoiceItem>,
}

impl InvoiceRequest {
    pub fn new(
        invoice_number: Option<String>,
        currency_code: &str,
        recipient_email: &str,
        business_name: &str,
        items: Vec<InvoiceItem>,
        note: Option<String>,
    ) -> Self {
        Self {
            detail: InvoiceDetail {
                invoice_number,
                currency_code: currency_code.to_string(),
                note,
                payment_term: PaymentTerm {
                    term_type: "DUE_ON_RECEIPT".to_string(),
                },
            },
            invoicer: serde_json::json!({ "business_name": business_name }),
            primary_recipients: vec![serde_json::json!({
                "billing_info": { "email_address": recipient_email }
            })],
            items,
        }
    }
}

/// Invoice id from a create response. The provider answers either with the
/// full invoice or with a `{rel, href, method}` link to the draft.
pub fn created_invoice_id(body: &Value) -> Option<String> {
    if let Some(id) = body.get("id").and_then(Value::as_str) {
        return Some(id.to_string());
    }
    body.get("href")
        .and_then(Value::as_str)
        .and_then(|href| href.trim_end_matches('/').rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(String::from)
}

impl PayPalClient {
    pub async fn next_invoice_number(&self) -> AppResult<Option<String>> {
        let response = self
            .post_empty("/v2/invoicing/generate-next-invoice-number")
            .await?;
        Ok(response
            .body
            .get("invoice_number")
            .and_then(Value::as_str)
            .map(String::from))
    }

    pub async fn create_invoice(&self, invoice: &InvoiceRequest) -> AppResult<ProviderResponse> {
        self.post("/v2/invoicing/invoices", invoice).await
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> AppResult<ProviderResponse> {
        self.get(&format!("/v2/invoicing/invoices/{}", resource_id(invoice_id)?))
            .await
    }

    pub async fn list_invoices(&self, page: u32, page_size: u32) -> AppResult<ProviderResponse> {
        self.get(&format!(
            "/v2/invoicing/invoices?page={}&page_size={}&total_required=true",
            page.max(1),
            page_size.clamp(1, 100)
        ))
        .await
    }

    pub async fn send_invoice(&self, invoice_id: &str) -> AppResult<ProviderResponse> {
        self.post(
            &format!("/v2/invoicing/invoices/{}/send", resource_id(invoice_id)?),
            &serde_json::json!({ "send_to_invoicer": true, "send_to_recipient": true }),
        )
        .await
    }

    pub async fn remind_invoice(&self, invoice_id: &str) -> AppResult<ProviderResponse> {
        self.post(
            &format!("/v2/invoicing/invoices/{}/remind", resource_id(invoice_id)?),
            &serde_json::json!({ "send_to_invoicer": true }),
        )
        .await
    }

    pub async fn cancel_invoice(&self, invoice_id: &str, note: &str) -> AppResult<ProviderResponse> {
        self.post(
            &format!("/v2/invoicing/invoices/{}/cancel", resource_id(invoice_id)?),
            &serde_json::json!({
                "note": note,
                "send_to_invoicer": true,
                "send_to_recipient": true
            }),
        )
        .await
    }

    pub async fn delete_invoice(&self, invoice_id: &str) -> AppResult<ProviderResponse> {
        self.delete(&format!("/v2/invoicing/invoices/{}", resource_id(invoice_id)?))
            .await
    }
}
