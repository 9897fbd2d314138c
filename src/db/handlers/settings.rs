//! Repository for per-tenant settings.

use crate::db::errors::Result;
use crate::db::models::settings::{SettingsUpsertDBRequest, TenantSettingsDBResponse};
use crate::types::TenantId;
use sqlx::PgConnection;

const SETTINGS_COLUMNS: &str = "id, user_id, sms_account_id, sms_auth_secret, sms_from_number, \
     business_name, business_contact, reminder_lead_days, message_template, managed_sms, updated_at";

pub struct Settings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Settings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn get(&mut self, tenant: TenantId) -> Result<Option<TenantSettingsDBResponse>> {
        let settings = sqlx::query_as::<_, TenantSettingsDBResponse>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM tenant_settings WHERE user_id = $1"
        ))
        .bind(tenant)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(settings)
    }

    /// Save the tenant-editable settings fields, creating the row on first
    /// save. The unique constraint on `user_id` makes concurrent first saves
    /// converge on a single row.
    pub async fn upsert(
        &mut self,
        tenant: TenantId,
        request: &SettingsUpsertDBRequest,
    ) -> Result<TenantSettingsDBResponse> {
        let settings = sqlx::query_as::<_, TenantSettingsDBResponse>(&format!(
            "INSERT INTO tenant_settings
                (user_id, sms_account_id, sms_auth_secret, sms_from_number,
                 business_name, business_contact, reminder_lead_days, message_template)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id) DO UPDATE SET
                sms_account_id = EXCLUDED.sms_account_id,
                sms_auth_secret = EXCLUDED.sms_auth_secret,
                sms_from_number = EXCLUDED.sms_from_number,
                business_name = EXCLUDED.business_name,
                business_contact = EXCLUDED.business_contact,
                reminder_lead_days = EXCLUDED.reminder_lead_days,
                message_template = EXCLUDED.message_template,
                updated_at = NOW()
             RETURNING {SETTINGS_COLUMNS}"
        ))
        .bind(tenant)
        .bind(&request.sms_account_id)
        .bind(&request.sms_auth_secret)
        .bind(&request.sms_from_number)
        .bind(&request.business_name)
        .bind(&request.business_contact)
        .bind(request.reminder_lead_days)
        .bind(&request.message_template)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(settings)
    }

    /// Flip the managed-SMS entitlement. Only the billing reconciler calls
    /// this. `create_if_missing` distinguishes the checkout path (a settings
    /// row is created so the entitlement lands even before the tenant has
    /// saved settings) from the downgrade paths (a missing row stays
    /// missing).
    pub async fn set_managed_sms(
        &mut self,
        tenant: TenantId,
        enabled: bool,
        create_if_missing: bool,
    ) -> Result<()> {
        if create_if_missing {
            sqlx::query(
                "INSERT INTO tenant_settings (user_id, managed_sms) VALUES ($1, $2)
                 ON CONFLICT (user_id) DO UPDATE SET managed_sms = $2, updated_at = NOW()",
            )
            .bind(tenant)
            .bind(enabled)
            .execute(&mut *self.db)
            .await?;
        } else {
            sqlx::query(
                "UPDATE tenant_settings SET managed_sms = $2, updated_at = NOW() WHERE user_id = $1",
            )
            .bind(tenant)
            .bind(enabled)
            .execute(&mut *self.db)
            .await?;
        }

        Ok(())
    }
}
