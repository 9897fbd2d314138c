//! Database models for client records.

use crate::types::{RecordId, TenantId};
use chrono::{DateTime, NaiveDate, Utc};

/// Database request for creating a client record
#[derive(Debug, Clone)]
pub struct ClientRecordCreateDBRequest {
    pub name: String,
    pub phone: String,
    pub resource: String,
    pub reminder_date: NaiveDate,
}

/// Database request for updating a client record.
///
/// Only present fields are changed. Changing `reminder_date` to a different
/// value resets the sent flag: a new date is a new reminder obligation.
#[derive(Debug, Clone, Default)]
pub struct ClientRecordUpdateDBRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub resource: Option<String>,
    pub reminder_date: Option<NaiveDate>,
}

/// Database response for a client record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientRecordDBResponse {
    pub id: RecordId,
    pub user_id: TenantId,
    pub name: String,
    pub phone: String,
    pub resource: String,
    pub reminder_date: NaiveDate,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
}
