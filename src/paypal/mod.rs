// PayPal REST API client, split by API family

pub mod billing;
pub mod client;
pub mod invoicing;
pub mod orders;
pub mod payments;
pub mod payouts;
pub mod subscriptions;
pub mod three_ds;
pub mod tracking;
pub mod vault;

pub use client::{PayPalClient, ProviderResponse};
pub use orders::{Amount, Intent, Money, OrderRequest, PaymentSource, PurchaseUnit};
