//! API models for client records.

use crate::db::models::client_records::ClientRecordDBResponse;
use crate::types::RecordId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientRecordResponse {
    #[schema(value_type = Uuid)]
    pub id: RecordId,
    pub name: String,
    pub phone: String,
    pub resource: String,
    pub reminder_date: NaiveDate,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ClientRecordDBResponse> for ClientRecordResponse {
    fn from(record: ClientRecordDBResponse) -> Self {
        Self {
            id: record.id,
            name: record.name,
            phone: record.phone,
            resource: record.resource,
            reminder_date: record.reminder_date,
            reminder_sent: record.reminder_sent,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientRecordCreate {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub resource: String,
    pub reminder_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClientRecordUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub resource: Option<String>,
    pub reminder_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    #[schema(value_type = Vec<Uuid>)]
    pub ids: Vec<RecordId>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}

/// Bulk import payload: rows already parsed from the tenant's spreadsheet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportRequest {
    pub records: Vec<ClientRecordCreate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportResponse {
    pub imported: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendNowResponse {
    /// Carrier-assigned message identifier
    pub message_id: String,
}
