//! Database models for per-tenant billing state.

use crate::policy::PlanTier;
use crate::types::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Subscription payment status as mirrored from the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Incomplete,
    Trialing,
    Unpaid,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Unpaid => "unpaid",
        }
    }

    /// Parse a provider status string. Unknown values are treated as
    /// `Incomplete` rather than failing the whole transition.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "trialing" => SubscriptionStatus::Trialing,
            "unpaid" => SubscriptionStatus::Unpaid,
            _ => SubscriptionStatus::Incomplete,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database request for syncing a subscription row from provider state.
///
/// Every sync carries the full derived state (never deltas), so redelivered
/// or reordered webhook events converge to the same row.
#[derive(Debug, Clone)]
pub struct SubscriptionSyncDBRequest {
    pub plan_tier: PlanTier,
    pub status: SubscriptionStatus,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// Database response for a subscription row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionDBResponse {
    pub id: uuid::Uuid,
    pub user_id: TenantId,
    pub plan_tier: String,
    pub status: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionDBResponse {
    pub fn tier(&self) -> PlanTier {
        PlanTier::parse(&self.plan_tier)
    }

    pub fn subscription_status(&self) -> SubscriptionStatus {
        SubscriptionStatus::parse(&self.status)
    }
}
