//! Vault data model
//!
//! Everything the demo persists lives in one JSON document: customers and
//! their saved payment tokens, subscriptions, billing agreements, reference
//! transactions and automation rules, each keyed by customer id.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::paypal::orders::PaymentType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Paypal,
    Card,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_digits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentTokenRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub status: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_details: Option<CardDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,
}

impl PaymentTokenRecord {
    pub fn new(id: impl Into<String>, kind: TokenKind, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            status: status.into(),
            created: Utc::now(),
            last_used: None,
            card_details: None,
            payer_email: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub payment_tokens: Vec<PaymentTokenRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionRecord {
    pub subscription_id: String,
    pub plan_id: String,
    pub status: String,
    #[serde(default)]
    pub next_payment_date: Option<String>,
    #[serde(default)]
    pub payment_count: u32,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingAgreementRecord {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payer_email: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceSource {
    BillingAgreement,
    PaymentToken,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceTransaction {
    /// Capture id when known, otherwise the order id
    pub id: String,
    pub order_id: String,
    pub source_id: String,
    pub source_type: ReferenceSource,
    pub amount: String,
    pub currency_code: String,
    pub status: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationRule {
    pub id: String,
    pub payment_token_id: String,
    pub amount: String,
    pub currency_code: String,
    pub interval_days: u32,
    #[serde(default)]
    pub payment_type: PaymentType,
    pub next_run: DateTime<Utc>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub executions: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VaultData {
    #[serde(default)]
    pub customers: BTreeMap<String, Customer>,
    #[serde(default)]
    pub subscriptions: BTreeMap<String, Vec<SubscriptionRecord>>,
    #[serde(default)]
    pub billing_agreements: BTreeMap<String, Vec<BillingAgreementRecord>>,
    #[serde(default)]
    pub reference_transactions: BTreeMap<String, Vec<ReferenceTransaction>>,
    #[serde(default)]
    pub automation_rules: BTreeMap<String, Vec<AutomationRule>>,
}

impl VaultData {
    pub fn customer_mut(&mut self, customer_id: &str) -> &mut Customer {
        self.customers.entry(customer_id.to_string()).or_default()
    }

    /// Fill in name/email when the caller knows them; never clears existing values
    pub fn upsert_customer(&mut self, customer_id: &str, name: Option<String>, email: Option<String>) {
        let customer = self.customer_mut(customer_id);
        if name.is_some() {
            customer.name = name;
        }
        if email.is_some() {
            customer.email = email;
        }
    }

    /// Push a token unless one with the same id is already stored.
    /// Returns `false` when the id was already present.
    pub fn add_payment_token(&mut self, customer_id: &str, token: PaymentTokenRecord) -> bool {
        let customer = self.customer_mut(customer_id);
        if customer.payment_tokens.iter().any(|t| t.id == token.id) {
            return false;
        }
        customer.payment_tokens.push(token);
        true
    }

    /// Remove exactly the token with `token_id`
    pub fn remove_payment_token(&mut self, customer_id: &str, token_id: &str) -> Option<PaymentTokenRecord> {
        let customer = self.customers.get_mut(customer_id)?;
        let index = customer.payment_tokens.iter().position(|t| t.id == token_id)?;
        Some(customer.payment_tokens.remove(index))
    }

    pub fn payment_tokens(&self, customer_id: &str) -> &[PaymentTokenRecord] {
        self.customers
            .get(customer_id)
            .map(|c| c.payment_tokens.as_slice())
            .unwrap_or(&[])
    }

    pub fn find_payment_token(&self, customer_id: &str, token_id: &str) -> Option<&PaymentTokenRecord> {
        self.payment_tokens(customer_id).iter().find(|t| t.id == token_id)
    }

    pub fn touch_payment_token(&mut self, customer_id: &str, token_id: &str, at: DateTime<Utc>) -> bool {
        match self
            .customers
            .get_mut(customer_id)
            .and_then(|c| c.payment_tokens.iter_mut().find(|t| t.id == token_id))
        {
            Some(token) => {
                token.last_used = Some(at);
                true
            }
            None => false,
        }
    }

    /// Insert or refresh a subscription by id
    pub fn record_subscription(&mut self, customer_id: &str, record: SubscriptionRecord) {
        let list = self.subscriptions.entry(customer_id.to_string()).or_default();
        match list
            .iter_mut()
            .find(|s| s.subscription_id == record.subscription_id)
        {
            Some(existing) => {
                existing.plan_id = record.plan_id;
                existing.status = record.status;
                existing.next_payment_date = record.next_payment_date;
                existing.payment_count = record.payment_count;
                existing.updated = record.updated;
            }
            None => list.push(record),
        }
    }

    /// Set the status of a subscription wherever it is stored
    pub fn update_subscription_status(&mut self, subscription_id: &str, status: &str, at: DateTime<Utc>) -> bool {
        let mut found = false;
        for record in self
            .subscriptions
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .filter(|s| s.subscription_id == subscription_id)
        {
            record.status = status.to_string();
            record.updated = at;
            found = true;
        }
        found
    }

    pub fn subscriptions_for(&self, customer_id: &str) -> &[SubscriptionRecord] {
        self.subscriptions
            .get(customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_billing_agreement(&mut self, customer_id: &str, record: BillingAgreementRecord) -> bool {
        let list = self.billing_agreements.entry(customer_id.to_string()).or_default();
        if list.iter().any(|a| a.id == record.id) {
            return false;
        }
        list.push(record);
        true
    }

    pub fn update_billing_agreement_status(&mut self, agreement_id: &str, status: &str) -> bool {
        let mut found = false;
        for record in self
            .billing_agreements
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .filter(|a| a.id == agreement_id)
        {
            record.status = status.to_string();
            found = true;
        }
        found
    }

    pub fn billing_agreements_for(&self, customer_id: &str) -> &[BillingAgreementRecord] {
        self.billing_agreements
            .get(customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find_billing_agreement(&self, customer_id: &str, agreement_id: &str) -> Option<&BillingAgreementRecord> {
        self.billing_agreements_for(customer_id)
            .iter()
            .find(|a| a.id == agreement_id)
    }

    pub fn record_reference_transaction(&mut self, customer_id: &str, transaction: ReferenceTransaction) {
        self.reference_transactions
            .entry(customer_id.to_string())
            .or_default()
            .push(transaction);
    }

    pub fn reference_transactions_for(&self, customer_id: &str) -> &[ReferenceTransaction] {
        self.reference_transactions
            .get(customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_automation_rule(&mut self, customer_id: &str, rule: AutomationRule) {
        self.automation_rules
            .entry(customer_id.to_string())
            .or_default()
            .push(rule);
    }

    pub fn automation_rules_for(&self, customer_id: &str) -> &[AutomationRule] {
        self.automation_rules
            .get(customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find_automation_rule(&self, customer_id: &str, rule_id: &str) -> Option<&AutomationRule> {
        self.automation_rules_for(customer_id)
            .iter()
            .find(|r| r.id == rule_id)
    }

    pub fn remove_automation_rule(&mut self, customer_id: &str, rule_id: &str) -> Option<AutomationRule> {
        let list = self.automation_rules.get_mut(customer_id)?;
        let index = list.iter().position(|r| r.id == rule_id)?;
        Some(list.remove(index))
    }

    /// Count one execution and push `next_run` out by the rule's interval
    pub fn mark_rule_executed(&mut self, customer_id: &str, rule_id: &str, at: DateTime<Utc>) -> Option<AutomationRule> {
        let rule = self
            .automation_rules
            .get_mut(customer_id)?
            .iter_mut()
            .find(|r| r.id == rule_id)?;
        rule.executions += 1;
        rule.last_run = Some(at);
        rule.next_run += Duration::days(i64::from(rule.interval_days));
        Some(rule.clone())
    }
}
