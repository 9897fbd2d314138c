//! Database models for per-tenant settings.

use crate::types::TenantId;
use chrono::{DateTime, Utc};

/// Database request for saving tenant settings.
///
/// `sms_auth_secret` must already be encrypted by the caller; the repository
/// stores it opaquely. The `managed_sms` flag is deliberately absent here;
/// only the billing reconciler flips it.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpsertDBRequest {
    pub sms_account_id: Option<String>,
    pub sms_auth_secret: Option<String>,
    pub sms_from_number: Option<String>,
    pub business_name: Option<String>,
    pub business_contact: Option<String>,
    pub reminder_lead_days: i32,
    pub message_template: String,
}

/// Database response for tenant settings
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TenantSettingsDBResponse {
    pub id: uuid::Uuid,
    pub user_id: TenantId,
    pub sms_account_id: Option<String>,
    pub sms_auth_secret: Option<String>,
    pub sms_from_number: Option<String>,
    pub business_name: Option<String>,
    pub business_contact: Option<String>,
    pub reminder_lead_days: i32,
    pub message_template: String,
    pub managed_sms: bool,
    pub updated_at: DateTime<Utc>,
}
