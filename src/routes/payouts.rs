use crate::models::AppState;
use crate::paypal::orders::parse_amount;
use crate::paypal::payouts::{PayoutItem, PayoutRequest, SenderBatchHeader};
use crate::paypal::{Money, ProviderResponse};
use crate::types::AppResult;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/payout/api/payouts", post(create_payout))
        .route("/payout/api/payouts/{batch_id}", get(get_payout))
        .route("/payout/api/items/{item_id}", get(get_payout_item))
        .route("/payout/api/items/{item_id}/cancel", post(cancel_payout_item))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PayoutRecipient {
    #[validate(email)]
    pub receiver: String,
    pub amount: String,
    pub currency_code: Option<String>,
    #[validate(length(max = 4000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePayoutBody {
    #[validate(length(max = 255))]
    pub email_subject: Option<String>,
    pub email_message: Option<String>,
    #[validate(length(min = 1, max = 15000), nested)]
    pub items: Vec<PayoutRecipient>,
}

fn payout_request(state: &AppState, body: CreatePayoutBody) -> AppResult<PayoutRequest> {
    let batch_id = Uuid::new_v4().simple().to_string();
    let items = body
        .items
        .into_iter()
        .enumerate()
        .map(|(index, recipient)| {
            let currency = recipient
                .currency_code
                .unwrap_or_else(|| state.currency().to_string());
            let amount = parse_amount(&recipient.amount)?;
            Ok(PayoutItem {
                recipient_type: "EMAIL".to_string(),
                amount: Money::from_decimal(currency, amount).into(),
                receiver: recipient.receiver,
                note: recipient.note,
                sender_item_id: format!("{}-{}", batch_id, index + 1),
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(PayoutRequest {
        sender_batch_header: SenderBatchHeader {
            sender_batch_id: batch_id,
            email_subject: body
                .email_subject
                .unwrap_or_else(|| format!("You have a payout from {}", state.config.paypal.brand_name)),
            email_message: body.email_message,
        },
        items,
    })
}

async fn create_payout(
    State(state): State<AppState>,
    Json(body): Json<CreatePayoutBody>,
) -> AppResult<ProviderResponse> {
    body.validate()?;
    let request = payout_request(&state, body)?;
    let batch_id = request.sender_batch_header.sender_batch_id.clone();
    let item_count = request.items.len();

    let response = state.paypal.create_payout(&request).await?;
    info!(
        sender_batch_id = %batch_id,
        items = item_count,
        payout_batch_id = ?response.body.pointer("/batch_header/payout_batch_id"),
        "Created payout batch"
    );
    Ok(response)
}

async fn get_payout(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> AppResult<ProviderResponse> {
    state.paypal.get_payout(&batch_id).await
}

async fn get_payout_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> AppResult<ProviderResponse> {
    state.paypal.get_payout_item(&item_id).await
}

async fn cancel_payout_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> AppResult<ProviderResponse> {
    let response = state.paypal.cancel_payout_item(&item_id).await?;
    info!(item_id = %item_id, "Cancelled unclaimed payout item");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::StatusCode;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_payout_batch() {
        let mut app = test_app().await;
        app.mock_token().await;
        let payout = app
            .server
            .mock("POST", "/v1/payments/payouts")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "items": [
                        { "recipient_type": "EMAIL", "receiver": "a@example.com",
                          "amount": { "value": "10.00", "currency": "USD" } },
                        { "receiver": "b@example.com", "amount": { "value": "2.50", "currency": "EUR" } }
                    ]
                })),
                Matcher::Regex(r#""sender_batch_id":"[0-9a-f]{32}""#.into()),
            ]))
            .with_status(201)
            .with_body(r#"{"batch_header":{"payout_batch_id":"BATCH1","batch_status":"PENDING"}}"#)
            .create_async()
            .await;

        let (status, body) = app
            .post(
                "/payout/api/payouts",
                json!({
                    "items": [
                        { "receiver": "a@example.com", "amount": "10" },
                        { "receiver": "b@example.com", "amount": "2.50", "currency_code": "EUR" }
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["batch_header"]["batch_status"], "PENDING");
        payout.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_receiver_or_amount_is_400() {
        let app = test_app().await;
        let (status, _) = app
            .post("/payout/api/payouts", json!({ "items": [{ "receiver": "nope", "amount": "1.00" }] }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post("/payout/api/payouts", json!({ "items": [{ "receiver": "a@example.com", "amount": "0" }] }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.post("/payout/api/payouts", json!({ "items": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_unclaimed_item() {
        let mut app = test_app().await;
        app.mock_token().await;
        app.server
            .mock("POST", "/v1/payments/payouts-item/ITEM1/cancel")
            .with_status(200)
            .with_body(r#"{"payout_item_id":"ITEM1","transaction_status":"RETURNED"}"#)
            .create_async()
            .await;

        let (status, body) = app.post("/payout/api/items/ITEM1/cancel", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transaction_status"], "RETURNED");
    }
}
