//! API models for tenant settings.

use crate::db::models::settings::TenantSettingsDBResponse;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub sms_account_id: Option<String>,
    /// Whether an SMS auth token is stored. The token itself is never
    /// echoed back.
    pub sms_auth_secret_set: bool,
    pub sms_from_number: Option<String>,
    pub business_name: Option<String>,
    pub business_contact: Option<String>,
    pub reminder_lead_days: i32,
    pub message_template: String,
    pub managed_sms: bool,
}

impl From<TenantSettingsDBResponse> for SettingsResponse {
    fn from(settings: TenantSettingsDBResponse) -> Self {
        Self {
            sms_account_id: settings.sms_account_id,
            sms_auth_secret_set: settings
                .sms_auth_secret
                .as_deref()
                .is_some_and(|s| !s.is_empty()),
            sms_from_number: settings.sms_from_number,
            business_name: settings.business_name,
            business_contact: settings.business_contact,
            reminder_lead_days: settings.reminder_lead_days,
            message_template: settings.message_template,
            managed_sms: settings.managed_sms,
        }
    }
}

impl SettingsResponse {
    /// Shape returned before the tenant has ever saved settings.
    pub fn defaults() -> Self {
        Self {
            sms_account_id: None,
            sms_auth_secret_set: false,
            sms_from_number: None,
            business_name: None,
            business_contact: None,
            reminder_lead_days: 7,
            message_template:
                "Hi {client_name}, your {resource} is due on {date}. — {business_name} ({business_contact})"
                    .to_string(),
            managed_sms: false,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SettingsUpdate {
    pub sms_account_id: Option<String>,
    /// New SMS auth token. Omit (or send null) to keep the stored one.
    pub sms_auth_secret: Option<String>,
    pub sms_from_number: Option<String>,
    pub business_name: Option<String>,
    pub business_contact: Option<String>,
    #[serde(default = "default_lead_days")]
    pub reminder_lead_days: i32,
    pub message_template: String,
}

fn default_lead_days() -> i32 {
    7
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TestSmsRequest {
    /// Destination phone number, any recognized national or E.164 format
    pub to: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TestSmsResponse {
    pub message_id: String,
}
