//! Plan tiers and the usage policy they imply.
//!
//! Pure functions only: tier to client-count limit, tier to managed-SMS
//! eligibility, and the gate consulted before a new client record (or a bulk
//! import batch) is committed.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of client records a free tenant may hold.
pub const FREE_CLIENT_LIMIT: i64 = 50;
/// Number of client records a starter tenant may hold.
pub const STARTER_CLIENT_LIMIT: i64 = 500;

/// Subscription plan tier. Governs client limits and managed-SMS
/// eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Starter,
    Pro,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Pro => "pro",
        }
    }

    /// Parse a stored tier string. Unknown values degrade to `Free` rather
    /// than failing: a tenant must never lose access to their data because a
    /// row holds an outdated tier name.
    pub fn parse(s: &str) -> Self {
        match s {
            "starter" => PlanTier::Starter,
            "pro" => PlanTier::Pro,
            _ => PlanTier::Free,
        }
    }

    /// Maximum number of client records for the tier; `None` is unlimited.
    pub fn client_limit(&self) -> Option<i64> {
        match self {
            PlanTier::Free => Some(FREE_CLIENT_LIMIT),
            PlanTier::Starter => Some(STARTER_CLIENT_LIMIT),
            PlanTier::Pro => None,
        }
    }

    /// Whether the tier includes platform-managed SMS credentials.
    pub fn managed_sms(&self) -> bool {
        matches!(self, PlanTier::Starter | PlanTier::Pro)
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when a tenant holding `current_count` records may add one more.
pub fn can_add_client(current_count: i64, tier: PlanTier) -> bool {
    match tier.client_limit() {
        Some(limit) => current_count < limit,
        None => true,
    }
}

/// True when a tenant holding `current_count` records may add `additional`
/// more in one batch. Used by bulk import, which validates the whole batch
/// before committing any row.
pub fn can_add_clients(current_count: i64, additional: i64, tier: PlanTier) -> bool {
    match tier.client_limit() {
        Some(limit) => current_count.saturating_add(additional) <= limit,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_limit_boundary() {
        assert!(can_add_client(49, PlanTier::Free));
        assert!(!can_add_client(50, PlanTier::Free));
    }

    #[test]
    fn starter_limit_boundary() {
        assert!(can_add_client(499, PlanTier::Starter));
        assert!(!can_add_client(500, PlanTier::Starter));
    }

    #[test]
    fn pro_is_unlimited() {
        assert!(can_add_client(0, PlanTier::Pro));
        assert!(can_add_client(1_000_000, PlanTier::Pro));
    }

    #[test]
    fn batch_limit_counts_the_whole_batch() {
        assert!(can_add_clients(40, 10, PlanTier::Free));
        assert!(!can_add_clients(41, 10, PlanTier::Free));
        assert!(can_add_clients(0, 10_000, PlanTier::Pro));
    }

    #[test]
    fn managed_sms_eligibility() {
        assert!(!PlanTier::Free.managed_sms());
        assert!(PlanTier::Starter.managed_sms());
        assert!(PlanTier::Pro.managed_sms());
    }

    #[test]
    fn unknown_tier_parses_as_free() {
        assert_eq!(PlanTier::parse("enterprise"), PlanTier::Free);
        assert_eq!(PlanTier::parse("pro"), PlanTier::Pro);
    }
}
