//! Merchant-initiated payments against saved payment methods
//!
//! Charges use either a vaulted payment token (Vault v3) or a billing
//! agreement (reference transactions). Automation rules only describe a
//! schedule: they run when someone calls `/execute`, never on their own.

use crate::models::{AppState, CustomerQuery};
use crate::paypal::billing::{agreement_payer_email, agreement_state, AgreementTokenRequest};
use crate::paypal::orders::{parse_amount, CardSource, OrderHeaders, PaymentType, PaypalSource, StoredCredential};
use crate::paypal::{Intent, OrderRequest, PaymentSource, ProviderResponse};
use crate::storage::{AutomationRule, BillingAgreementRecord, ReferenceSource, ReferenceTransaction, TokenKind};
use crate::routes::json_or_default;
use crate::types::{AppError, AppResult};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

const PREFIX: &str = "/api/vault-recurring-payments";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{}/charge", PREFIX), post(charge))
        .route(
            &format!("{}/billing-agreements/token", PREFIX),
            post(create_agreement_token),
        )
        .route(
            &format!("{}/billing-agreements", PREFIX),
            post(create_agreement).get(list_agreements),
        )
        .route(
            &format!("{}/billing-agreements/{{agreement_id}}", PREFIX),
            get(get_agreement),
        )
        .route(
            &format!("{}/billing-agreements/{{agreement_id}}/cancel", PREFIX),
            post(cancel_agreement),
        )
        .route(
            &format!("{}/reference-transactions", PREFIX),
            post(reference_transaction).get(list_reference_transactions),
        )
        .route(
            &format!("{}/automation-rules", PREFIX),
            post(create_rule).get(list_rules),
        )
        .route(
            &format!("{}/automation-rules/{{rule_id}}", PREFIX),
            delete(delete_rule),
        )
        .route(
            &format!("{}/automation-rules/{{rule_id}}/execute", PREFIX),
            post(execute_rule),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChargeBody {
    pub customer_id: String,
    pub payment_token_id: String,
    pub amount: String,
    pub currency_code: Option<String>,
    #[serde(default)]
    pub payment_type: PaymentType,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgreementTokenBody {
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AgreementBody {
    pub token_id: String,
    pub customer_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelAgreementBody {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceTransactionBody {
    pub customer_id: String,
    pub billing_agreement_id: String,
    pub amount: String,
    pub currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RuleBody {
    pub customer_id: String,
    pub payment_token_id: String,
    pub amount: String,
    pub currency_code: Option<String>,
    pub interval_days: u32,
    #[serde(default = "recurring")]
    pub payment_type: PaymentType,
    /// First run; defaults to now
    pub start_at: Option<DateTime<Utc>>,
}

fn recurring() -> PaymentType {
    PaymentType::Recurring
}

/// First capture id of an order, falling back to the order id
fn capture_id(order: &Value) -> Option<String> {
    order
        .pointer("/purchase_units/0/payments/captures/0/id")
        .or_else(|| order.get("id"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Create the order and capture it unless the provider already completed it
async fn create_and_capture(state: &AppState, order: &OrderRequest) -> AppResult<ProviderResponse> {
    let headers = OrderHeaders {
        request_id: Some(Uuid::new_v4().to_string()),
        ..Default::default()
    };
    let created = state.paypal.create_order_with(order, &headers).await?;
    if created.resource_status() == Some("COMPLETED") {
        return Ok(created);
    }
    let order_id = created
        .id()
        .ok_or_else(|| AppError::Internal("order response had no id".to_string()))?
        .to_string();
    state.paypal.capture_order(&order_id).await
}

/// Charge a stored payment token once and record it as a reference transaction
pub(crate) async fn charge_token(
    state: &AppState,
    customer_id: &str,
    token_id: &str,
    amount: Decimal,
    currency: &str,
    payment_type: PaymentType,
) -> AppResult<ProviderResponse> {
    let data = state.vault.snapshot().await?;
    let token = data
        .find_payment_token(customer_id, token_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("payment token {} for customer {}", token_id, customer_id))
        })?;

    let source = match token.kind {
        TokenKind::Paypal => PaymentSource::Paypal(PaypalSource {
            vault_id: Some(token.id.clone()),
            ..Default::default()
        }),
        TokenKind::Card => PaymentSource::Card(CardSource {
            vault_id: Some(token.id.clone()),
            stored_credential: Some(StoredCredential::merchant_subsequent(payment_type)),
            ..Default::default()
        }),
    };
    let order = OrderRequest::single(Intent::Capture, currency, amount).with_payment_source(source);
    let response = create_and_capture(state, &order).await?;

    let transaction = ReferenceTransaction {
        id: capture_id(&response.body).unwrap_or_default(),
        order_id: response.id().unwrap_or_default().to_string(),
        source_id: token_id.to_string(),
        source_type: ReferenceSource::PaymentToken,
        amount: format!("{:.2}", amount),
        currency_code: currency.to_string(),
        status: response.resource_status().unwrap_or("UNKNOWN").to_string(),
        created: Utc::now(),
    };
    let now = transaction.created;
    state
        .vault
        .update(|data| {
            data.record_reference_transaction(customer_id, transaction);
            data.touch_payment_token(customer_id, token_id, now);
        })
        .await?;

    info!(
        customer_id = %customer_id,
        token_id = %token_id,
        status = ?response.resource_status(),
        "Charged saved payment token"
    );
    Ok(response)
}

async fn charge(
    State(state): State<AppState>,
    Json(body): Json<ChargeBody>,
) -> AppResult<ProviderResponse> {
    let amount = parse_amount(&body.amount)?;
    let currency = body
        .currency_code
        .unwrap_or_else(|| state.currency().to_string());
    charge_token(
        &state,
        &body.customer_id,
        &body.payment_token_id,
        amount,
        &currency,
        body.payment_type,
    )
    .await
}

async fn create_agreement_token(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<ProviderResponse> {
    let body: AgreementTokenBody = json_or_default(&body)?;
    let description = body
        .description
        .unwrap_or_else(|| format!("{} billing agreement", state.config.paypal.brand_name));
    let request = AgreementTokenRequest::merchant_initiated(
        &description,
        &state.public_url("/vault-recurring-payments/complete"),
        &state.public_url("/vault-recurring-payments/cancel"),
    );
    let response = state.paypal.create_agreement_token(&request).await?;
    info!("Created billing agreement token");
    Ok(response)
}

async fn create_agreement(
    State(state): State<AppState>,
    Json(body): Json<AgreementBody>,
) -> AppResult<ProviderResponse> {
    let response = state.paypal.create_agreement(&body.token_id).await?;
    let agreement_id = response
        .id()
        .ok_or_else(|| AppError::Internal("agreement response had no id".to_string()))?
        .to_string();

    let record = BillingAgreementRecord {
        id: agreement_id.clone(),
        status: agreement_state(&response.body),
        description: response
            .body
            .get("description")
            .and_then(Value::as_str)
            .map(String::from),
        payer_email: agreement_payer_email(&response.body),
        created: Utc::now(),
    };
    let added = state
        .vault
        .update(|data| data.add_billing_agreement(&body.customer_id, record))
        .await?;
    info!(
        customer_id = %body.customer_id,
        agreement_id = %agreement_id,
        added,
        "Created billing agreement"
    );
    Ok(response)
}

async fn list_agreements(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<Value>> {
    let data = state.vault.snapshot().await?;
    Ok(Json(json!({
        "customer_id": query.customer_id,
        "billing_agreements": data.billing_agreements_for(&query.customer_id),
    })))
}

async fn get_agreement(
    State(state): State<AppState>,
    Path(agreement_id): Path<String>,
) -> AppResult<ProviderResponse> {
    state.paypal.get_agreement(&agreement_id).await
}

async fn cancel_agreement(
    State(state): State<AppState>,
    Path(agreement_id): Path<String>,
    body: Bytes,
) -> AppResult<ProviderResponse> {
    let body: CancelAgreementBody = json_or_default(&body)?;
    let note = body
        .note
        .unwrap_or_else(|| "Cancelled by merchant".to_string());
    let response = state.paypal.cancel_agreement(&agreement_id, &note).await?;
    let updated = state
        .vault
        .update(|data| data.update_billing_agreement_status(&agreement_id, "CANCELLED"))
        .await?;
    if !updated {
        warn!(agreement_id = %agreement_id, "Billing agreement not tracked locally");
    }
    Ok(response)
}

async fn reference_transaction(
    State(state): State<AppState>,
    Json(body): Json<ReferenceTransactionBody>,
) -> AppResult<ProviderResponse> {
    let amount = parse_amount(&body.amount)?;
    let currency = body
        .currency_code
        .unwrap_or_else(|| state.currency().to_string());

    let data = state.vault.snapshot().await?;
    let agreement = data
        .find_billing_agreement(&body.customer_id, &body.billing_agreement_id)
        .ok_or_else(|| AppError::NotFound(format!("billing agreement {}", body.billing_agreement_id)))?;
    if agreement.status != "ACTIVE" {
        return Err(AppError::InvalidRequest(format!(
            "billing agreement {} is {}",
            agreement.id, agreement.status
        )));
    }

    let order = OrderRequest::single(Intent::Capture, &currency, amount)
        .with_payment_source(PaymentSource::billing_agreement(&body.billing_agreement_id));
    let response = create_and_capture(&state, &order).await?;

    let transaction = ReferenceTransaction {
        id: capture_id(&response.body).unwrap_or_default(),
        order_id: response.id().unwrap_or_default().to_string(),
        source_id: body.billing_agreement_id.clone(),
        source_type: ReferenceSource::BillingAgreement,
        amount: format!("{:.2}", amount),
        currency_code: currency,
        status: response.resource_status().unwrap_or("UNKNOWN").to_string(),
        created: Utc::now(),
    };
    state
        .vault
        .update(|data| data.record_reference_transaction(&body.customer_id, transaction))
        .await?;
    info!(
        agreement_id = %body.billing_agreement_id,
        status = ?response.resource_status(),
        "Reference transaction charged"
    );
    Ok(response)
}

async fn list_reference_transactions(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<Value>> {
    let data = state.vault.snapshot().await?;
    Ok(Json(json!({
        "customer_id": query.customer_id,
        "reference_transactions": data.reference_transactions_for(&query.customer_id),
    })))
}

async fn create_rule(
    State(state): State<AppState>,
    Json(body): Json<RuleBody>,
) -> AppResult<Json<AutomationRule>> {
    if body.interval_days == 0 {
        return Err(AppError::InvalidRequest("interval_days must be at least 1".to_string()));
    }
    let amount = parse_amount(&body.amount)?;

    let rule = AutomationRule {
        id: Uuid::new_v4().to_string(),
        payment_token_id: body.payment_token_id.clone(),
        amount: format!("{:.2}", amount),
        currency_code: body
            .currency_code
            .unwrap_or_else(|| state.currency().to_string()),
        interval_days: body.interval_days,
        payment_type: body.payment_type,
        next_run: body.start_at.unwrap_or_else(Utc::now),
        last_run: None,
        executions: 0,
        active: true,
    };

    let customer_id = body.customer_id;
    let token_id = body.payment_token_id;
    let created = rule.clone();
    let stored = state
        .vault
        .update(|data| {
            if data.find_payment_token(&customer_id, &token_id).is_none() {
                return false;
            }
            data.add_automation_rule(&customer_id, created);
            true
        })
        .await?;
    if !stored {
        return Err(AppError::NotFound(format!(
            "payment token {} for customer {}",
            token_id, customer_id
        )));
    }

    info!(rule_id = %rule.id, customer_id = %customer_id, "Created automation rule");
    Ok(Json(rule))
}

async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<Value>> {
    let data = state.vault.snapshot().await?;
    Ok(Json(json!({
        "customer_id": query.customer_id,
        "automation_rules": data.automation_rules_for(&query.customer_id),
    })))
}

async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<AutomationRule>> {
    let removed = state
        .vault
        .update(|data| data.remove_automation_rule(&query.customer_id, &rule_id))
        .await?;
    removed
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("automation rule {}", rule_id)))
}

/// Run a rule's charge once, then advance its schedule
async fn execute_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<Value>> {
    let data = state.vault.snapshot().await?;
    let rule = data
        .find_automation_rule(&query.customer_id, &rule_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("automation rule {}", rule_id)))?;
    if !rule.active {
        return Err(AppError::InvalidRequest(format!("automation rule {} is inactive", rule_id)));
    }

    let amount = parse_amount(&rule.amount)?;
    let payment = charge_token(
        &state,
        &query.customer_id,
        &rule.payment_token_id,
        amount,
        &rule.currency_code,
        rule.payment_type,
    )
    .await?;

    let updated = state
        .vault
        .update(|data| data.mark_rule_executed(&query.customer_id, &rule_id, Utc::now()))
        .await?;
    info!(rule_id = %rule_id, "Executed automation rule");
    Ok(Json(json!({
        "rule": updated,
        "payment": payment.body,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{test_app, TestApp};
    use crate::storage::PaymentTokenRecord;
    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use mockito::Matcher;

    async fn seed_card_token(app: &TestApp) {
        app.state
            .vault
            .update(|data| {
                data.add_payment_token("cust-1", PaymentTokenRecord::new("tok-card", TokenKind::Card, "VAULTED"))
            })
            .await
            .unwrap();
    }

    async fn mock_capture_flow(app: &mut TestApp) {
        app.server
            .mock("POST", "/v2/checkout/orders")
            .match_body(Matcher::PartialJson(json!({
                "payment_source": { "card": {
                    "vault_id": "tok-card",
                    "stored_credential": {
                        "payment_initiator": "MERCHANT",
                        "payment_type": "RECURRING",
                        "usage": "SUBSEQUENT"
                    }
                } }
            })))
            .with_status(201)
            .with_body(r#"{"id":"MIT-ORDER","status":"APPROVED"}"#)
            .expect_at_least(1)
            .create_async()
            .await;
        app.server
            .mock("POST", "/v2/checkout/orders/MIT-ORDER/capture")
            .with_status(201)
            .with_body(
                r#"{"id":"MIT-ORDER","status":"COMPLETED",
                    "purchase_units":[{"payments":{"captures":[{"id":"CAP-MIT","status":"COMPLETED"}]}}]}"#,
            )
            .expect_at_least(1)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_charge_card_token_records_transaction() {
        let mut app = test_app().await;
        app.mock_token().await;
        seed_card_token(&app).await;
        mock_capture_flow(&mut app).await;

        let (status, body) = app
            .post(
                "/api/vault-recurring-payments/charge",
                json!({
                    "customer_id": "cust-1",
                    "payment_token_id": "tok-card",
                    "amount": "19.99",
                    "payment_type": "RECURRING"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "COMPLETED");

        let data = app.state.vault.snapshot().await.unwrap();
        let transactions = data.reference_transactions_for("cust-1");
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].id, "CAP-MIT");
        assert_eq!(transactions[0].source_type, ReferenceSource::PaymentToken);
        assert!(data.payment_tokens("cust-1")[0].last_used.is_some());
    }

    #[tokio::test]
    async fn test_charge_unknown_token_is_404() {
        let app = test_app().await;
        let (status, _) = app
            .post(
                "/api/vault-recurring-payments/charge",
                json!({ "customer_id": "cust-1", "payment_token_id": "missing", "amount": "5.00" }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rule_execute_advances_schedule() {
        let mut app = test_app().await;
        app.mock_token().await;
        seed_card_token(&app).await;
        mock_capture_flow(&mut app).await;

        let start = Utc::now();
        let (status, rule) = app
            .post(
                "/api/vault-recurring-payments/automation-rules",
                json!({
                    "customer_id": "cust-1",
                    "payment_token_id": "tok-card",
                    "amount": "9.99",
                    "interval_days": 7,
                    "start_at": start.to_rfc3339()
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let rule_id = rule["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .post(
                &format!("/api/vault-recurring-payments/automation-rules/{}/execute?customer_id=cust-1", rule_id),
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rule"]["executions"], 1);
        assert_eq!(body["payment"]["status"], "COMPLETED");

        let data = app.state.vault.snapshot().await.unwrap();
        let stored = data.find_automation_rule("cust-1", &rule_id).unwrap();
        let expected = DateTime::parse_from_rfc3339(&start.to_rfc3339()).unwrap().with_timezone(&Utc)
            + Duration::days(7);
        assert_eq!(stored.next_run, expected);

        let (status, _) = app
            .request(
                Method::DELETE,
                &format!("/api/vault-recurring-payments/automation-rules/{}?customer_id=cust-1", rule_id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = app.get("/api/vault-recurring-payments/automation-rules?customer_id=cust-1").await;
        assert_eq!(body["automation_rules"], json!([]));
    }

    #[tokio::test]
    async fn test_rule_requires_known_token() {
        let app = test_app().await;
        let (status, _) = app
            .post(
                "/api/vault-recurring-payments/automation-rules",
                json!({ "customer_id": "cust-1", "payment_token_id": "nope", "amount": "1.00", "interval_days": 30 }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_billing_agreement_and_reference_transaction() {
        let mut app = test_app().await;
        app.mock_token().await;
        app.server
            .mock("POST", "/v1/billing-agreements/agreements")
            .match_body(Matcher::PartialJson(json!({ "token_id": "BA-TOKEN" })))
            .with_status(201)
            .with_body(
                r#"{"id":"B-AGREEMENT1","state":"ACTIVE","description":"Top-ups",
                    "payer":{"payer_info":{"email":"buyer@example.com"}}}"#,
            )
            .create_async()
            .await;
        app.server
            .mock("POST", "/v2/checkout/orders")
            .match_body(Matcher::PartialJson(json!({
                "payment_source": { "token": { "id": "B-AGREEMENT1", "type": "BILLING_AGREEMENT" } }
            })))
            .with_status(201)
            .with_body(
                r#"{"id":"RT-ORDER","status":"COMPLETED",
                    "purchase_units":[{"payments":{"captures":[{"id":"CAP-RT"}]}}]}"#,
            )
            .create_async()
            .await;
        let no_capture = app
            .server
            .mock("POST", "/v2/checkout/orders/RT-ORDER/capture")
            .expect(0)
            .create_async()
            .await;

        let (status, _) = app
            .post(
                "/api/vault-recurring-payments/billing-agreements",
                json!({ "token_id": "BA-TOKEN", "customer_id": "cust-1" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = app
            .get("/api/vault-recurring-payments/billing-agreements?customer_id=cust-1")
            .await;
        assert_eq!(body["billing_agreements"][0]["status"], "ACTIVE");
        assert_eq!(body["billing_agreements"][0]["payer_email"], "buyer@example.com");

        let (status, _) = app
            .post(
                "/api/vault-recurring-payments/reference-transactions",
                json!({ "customer_id": "cust-1", "billing_agreement_id": "B-AGREEMENT1", "amount": "12.00" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        no_capture.assert_async().await;

        let (_, body) = app
            .get("/api/vault-recurring-payments/reference-transactions?customer_id=cust-1")
            .await;
        assert_eq!(body["reference_transactions"][0]["id"], "CAP-RT");
        assert_eq!(body["reference_transactions"][0]["source_type"], "BILLING_AGREEMENT");
    }

    #[tokio::test]
    async fn test_agreement_token_and_cancel_accept_empty_body() {
        let mut app = test_app().await;
        app.mock_token().await;
        let token = app
            .server
            .mock("POST", "/v1/billing-agreements/agreement-tokens")
            .match_body(Matcher::PartialJson(json!({
                "description": "Test Store billing agreement",
                "payer": { "payment_method": "PAYPAL" }
            })))
            .with_status(201)
            .with_body(r#"{"token_id":"BA-TOKEN","links":[]}"#)
            .create_async()
            .await;
        let cancel = app
            .server
            .mock("POST", "/v1/billing-agreements/agreements/B-1/cancel")
            .match_body(Matcher::PartialJson(json!({ "description": "Cancelled by merchant" })))
            .with_status(204)
            .create_async()
            .await;

        let (status, body) = app
            .request(Method::POST, "/api/vault-recurring-payments/billing-agreements/token", None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["token_id"], "BA-TOKEN");

        let (status, _) = app
            .request(Method::POST, "/api/vault-recurring-payments/billing-agreements/B-1/cancel", None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        app.server
            .mock("GET", "/v1/billing-agreements/agreements/B-1")
            .with_status(200)
            .with_body(r#"{"id":"B-1","state":"CANCELLED"}"#)
            .create_async()
            .await;
        let (status, body) = app
            .get("/api/vault-recurring-payments/billing-agreements/B-1")
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "CANCELLED");
        token.assert_async().await;
        cancel.assert_async().await;
    }

    #[test]
    fn test_capture_id_falls_back_to_order() {
        assert_eq!(capture_id(&json!({ "id": "ORDER" })).as_deref(), Some("ORDER"));
        assert_eq!(capture_id(&json!({})), None);
    }
}
