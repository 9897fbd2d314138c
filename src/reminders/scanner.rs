//! Reminder eligibility scanning.
//!
//! A record is eligible when it is unsent and its reminder date falls on or
//! before the end of the tenant's reminder window. The window's lower bound
//! is "today" but the query deliberately does not enforce it: a record due
//! yesterday that was never notified is still eligible today, and stays
//! eligible until it is sent or rescheduled. There is no overdue cutoff.

use crate::db::errors::Result;
use crate::db::handlers::ClientRecords;
use crate::db::models::client_records::ClientRecordDBResponse;
use crate::db::models::settings::TenantSettingsDBResponse;
use crate::types::TenantId;
use chrono::{Duration, NaiveDate};
use sqlx::PgConnection;

/// Compute the reminder window `[as_of, as_of + lead_days]`, both ends
/// inclusive. Lead days below 1 are clamped to 1.
pub fn reminder_window(as_of: NaiveDate, lead_days: i32) -> (NaiveDate, NaiveDate) {
    let lead = i64::from(lead_days.max(1));
    (as_of, as_of + Duration::days(lead))
}

/// Select the tenant's records due for notification as of the given date.
pub async fn scan(
    conn: &mut PgConnection,
    tenant: TenantId,
    settings: &TenantSettingsDBResponse,
    as_of: NaiveDate,
) -> Result<Vec<ClientRecordDBResponse>> {
    let (_, window_end) = reminder_window(as_of, settings.reminder_lead_days);
    ClientRecords::new(conn).due_for_reminder(tenant, window_end).await
}
