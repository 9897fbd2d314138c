//! Scheduled reminder dispatch across all tenants.
//!
//! One run walks every tenant, scans their due records and pushes each one
//! through render → send → mark-sent. Tenants are independent: a tenant
//! with broken SMS credentials produces failure entries for their own
//! records and nothing else. Records stay unsent on failure, so the next
//! scheduled run retries them.
//!
//! Tenants and records are processed strictly sequentially. That bounds
//! carrier API load and keeps failure attribution trivial, at the cost of a
//! run time linear in record count.

use crate::config::ManagedSmsConfig;
use crate::crypto::CredentialCodec;
use crate::db::errors::DbError;
use crate::db::handlers::{ClientRecords, Settings, Users};
use crate::db::models::settings::TenantSettingsDBResponse;
use crate::errors::Result;
use crate::reminders::scanner;
use crate::sms::{SmsCarrier, SmsGateway};
use crate::template::{self, TemplateFields};
use crate::types::{RecordId, TenantId};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

/// Outcome of one record's dispatch attempt.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DispatchEntry {
    #[schema(value_type = Uuid)]
    pub tenant: TenantId,
    #[schema(value_type = Uuid)]
    pub record: RecordId,
    pub phone: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate report for one dispatch run.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct DispatchReport {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<DispatchEntry>,
}

impl DispatchReport {
    fn record_success(&mut self, tenant: TenantId, record: RecordId, phone: String) {
        self.processed += 1;
        self.sent += 1;
        self.results.push(DispatchEntry {
            tenant,
            record,
            phone,
            success: true,
            error: None,
        });
    }

    fn record_failure(&mut self, tenant: TenantId, record: RecordId, phone: String, error: String) {
        self.processed += 1;
        self.failed += 1;
        self.results.push(DispatchEntry {
            tenant,
            record,
            phone,
            success: false,
            error: Some(error),
        });
    }
}

/// Run one dispatch pass over every tenant.
///
/// Only a failure to enumerate tenants errors out; anything that goes wrong
/// inside a single tenant or record is isolated, logged and collected into
/// the report.
#[tracing::instrument(skip_all, fields(as_of = %as_of))]
pub async fn run_reminder_dispatch(
    db: &PgPool,
    carrier: &dyn SmsCarrier,
    managed: Option<&ManagedSmsConfig>,
    codec: &CredentialCodec,
    as_of: NaiveDate,
) -> Result<DispatchReport> {
    let tenant_ids = {
        let mut conn = db.acquire().await.map_err(DbError::from)?;
        Users::new(&mut conn).list_ids().await?
    };

    let mut report = DispatchReport::default();

    for tenant in tenant_ids {
        if let Err(e) = dispatch_tenant(db, carrier, managed, codec, as_of, tenant, &mut report).await
        {
            tracing::error!(tenant = %tenant, error = %e, "tenant dispatch failed, continuing");
        }
    }

    tracing::info!(
        processed = report.processed,
        sent = report.sent,
        failed = report.failed,
        "reminder dispatch run complete"
    );
    Ok(report)
}

async fn dispatch_tenant(
    db: &PgPool,
    carrier: &dyn SmsCarrier,
    managed: Option<&ManagedSmsConfig>,
    codec: &CredentialCodec,
    as_of: NaiveDate,
    tenant: TenantId,
    report: &mut DispatchReport,
) -> Result<()> {
    let mut conn = db.acquire().await.map_err(DbError::from)?;

    let Some(settings) = Settings::new(&mut conn).get(tenant).await? else {
        tracing::debug!(tenant = %tenant, "no settings, skipping tenant");
        return Ok(());
    };

    let candidates = scanner::scan(&mut conn, tenant, &settings, as_of).await?;
    if candidates.is_empty() {
        return Ok(());
    }

    tracing::debug!(tenant = %tenant, candidates = candidates.len(), "dispatching due reminders");

    let gateway = SmsGateway::new(carrier, managed, codec);

    for record in candidates {
        let body = render_message(&settings, &record.name, &record.resource, record.reminder_date);

        match gateway.send(tenant, &settings, &record.phone, &body).await {
            Ok(delivery) => {
                // Conditional update: only this statement flips the flag,
                // and only if no concurrent sender got there first.
                match ClientRecords::new(&mut conn).mark_sent_if_unsent(tenant, record.id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(
                            tenant = %tenant,
                            record = %record.id,
                            "record already marked sent by a concurrent sender"
                        );
                    }
                    Err(e) => {
                        // The SMS left, the flag didn't stick: the next run
                        // will retry and the tenant may double-message.
                        tracing::error!(
                            tenant = %tenant,
                            record = %record.id,
                            error = %e,
                            "sent but failed to mark record, it will be retried"
                        );
                    }
                }
                tracing::info!(
                    tenant = %tenant,
                    record = %record.id,
                    message_id = %delivery.message_id,
                    "reminder sent"
                );
                report.record_success(tenant, record.id, record.phone);
            }
            Err(e) => {
                report.record_failure(tenant, record.id, record.phone, e.user_message());
            }
        }
    }

    Ok(())
}

/// Render the tenant's template for one record.
pub fn render_message(
    settings: &TenantSettingsDBResponse,
    client_name: &str,
    resource: &str,
    reminder_date: NaiveDate,
) -> String {
    let fields = TemplateFields {
        client_name: client_name.to_string(),
        resource: resource.to_string(),
        date: template::format_reminder_date(reminder_date),
        business_name: settings.business_name.clone().unwrap_or_default(),
        business_contact: settings.business_contact.clone().unwrap_or_default(),
    };
    template::render(&settings.message_template, &fields)
}
