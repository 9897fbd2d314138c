//! Billing: payment provider abstraction and subscription reconciliation.
//!
//! The payment provider sits behind the [`BillingProvider`] trait so the
//! reconciler (the actual state machine) can be exercised against a test
//! double, and so webhook payloads are converted into domain
//! [`BillingEvent`]s in exactly one place. Adding another provider means
//! implementing the trait, nothing else changes.

use crate::config::StripeConfig;
use crate::db::models::subscriptions::SubscriptionStatus;
use crate::policy::PlanTier;
use crate::types::TenantId;
use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

pub mod reconciler;
pub mod stripe;

pub use reconciler::Reconciler;

/// Result type for billing operations
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur during billing processing
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// Webhook signature did not verify; the payload must not be trusted
    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("malformed webhook payload: {0}")]
    InvalidPayload(String),

    #[error("payment provider API error: {0}")]
    ProviderApi(String),

    #[error("database error: {0}")]
    Database(#[from] crate::db::errors::DbError),
}

/// A payment-provider subscription, reduced to the fields the reconciler
/// derives local state from.
#[derive(Debug, Clone)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_id: String,
    pub price_id: Option<String>,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub latest_invoice_id: Option<String>,
}

/// A payment-provider invoice, reduced to what the reconciler needs.
#[derive(Debug, Clone)]
pub struct ProviderInvoice {
    pub period_end: Option<DateTime<Utc>>,
}

/// A verified webhook event mapped into the domain.
#[derive(Debug, Clone)]
pub enum BillingEvent {
    CheckoutCompleted {
        customer_id: Option<String>,
        subscription_id: Option<String>,
        /// Tenant id passed through checkout as the client reference
        client_reference: Option<TenantId>,
    },
    /// Carries the full subscription object from the event payload: state
    /// is always re-derived from the latest external object, never applied
    /// as a delta, which is what makes redelivery and reordering safe.
    SubscriptionUpdated(ProviderSubscription),
    SubscriptionDeleted { customer_id: Option<String> },
    InvoicePaymentSucceeded { customer_id: Option<String> },
    InvoicePaymentFailed { customer_id: Option<String> },
    /// An event type this system does not react to
    Ignored { event_type: String },
}

/// Abstract payment provider interface.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Verify a webhook delivery against the signing secret and map the
    /// payload into a [`BillingEvent`]. An invalid signature is an error;
    /// an unhandled event type is `Ok(Ignored)`.
    fn verify_webhook(&self, headers: &HeaderMap, body: &str) -> Result<BillingEvent>;

    /// Retrieve a subscription by its provider id.
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription>;

    /// Retrieve an invoice by its provider id.
    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<ProviderInvoice>;

    /// Create a hosted checkout session for a price; returns the redirect
    /// URL.
    async fn create_checkout_session(
        &self,
        tenant: TenantId,
        email: &str,
        existing_customer_id: Option<&str>,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String>;

    /// Create a billing portal session; returns the redirect URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String>;

    /// Switch an existing subscription to a different price in place, with
    /// proration.
    async fn change_subscription_price(&self, subscription_id: &str, price_id: &str) -> Result<()>;
}

/// Mapping between provider price identifiers and plan tiers.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    pub starter_price_id: String,
    pub pro_price_id: String,
}

impl PlanCatalog {
    pub fn from_stripe_config(config: &StripeConfig) -> Self {
        Self {
            starter_price_id: config.starter_price_id.clone(),
            pro_price_id: config.pro_price_id.clone(),
        }
    }

    /// Exact string match against the configured tier prices; anything else
    /// (including a missing price) maps to free.
    pub fn tier_for_price(&self, price_id: Option<&str>) -> PlanTier {
        match price_id {
            Some(p) if p == self.starter_price_id => PlanTier::Starter,
            Some(p) if p == self.pro_price_id => PlanTier::Pro,
            _ => PlanTier::Free,
        }
    }

    /// The price to check out for a paid tier; free has no price.
    pub fn price_for_tier(&self, tier: PlanTier) -> Option<&str> {
        match tier {
            PlanTier::Free => None,
            PlanTier::Starter => Some(&self.starter_price_id),
            PlanTier::Pro => Some(&self.pro_price_id),
        }
    }
}
