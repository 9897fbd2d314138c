//! API models for billing.

use crate::db::models::subscriptions::SubscriptionDBResponse;
use crate::policy::PlanTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub plan_tier: PlanTier,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    /// Whether the tier includes platform-managed SMS
    pub managed_sms_eligible: bool,
    /// Client-record limit for the tier; null means unlimited
    pub client_limit: Option<i64>,
}

impl From<SubscriptionDBResponse> for SubscriptionResponse {
    fn from(subscription: SubscriptionDBResponse) -> Self {
        let tier = subscription.tier();
        Self {
            plan_tier: tier,
            status: subscription.status,
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
            managed_sms_eligible: tier.managed_sms(),
            client_limit: tier.client_limit(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Target paid tier
    pub tier: PlanTier,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedirectResponse {
    /// URL the client should navigate to
    pub url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePlanRequest {
    /// Target paid tier
    pub tier: PlanTier,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChangePlanResponse {
    /// The requested tier; local state converges when the provider's
    /// subscription-updated webhook lands
    pub tier: PlanTier,
}
