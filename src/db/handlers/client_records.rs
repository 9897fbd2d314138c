//! Repository for client records.
//!
//! Every statement is scoped by both record id and tenant id where a single
//! row is touched, so a mutation can never cross tenants even if record ids
//! were guessable.

use crate::db::errors::Result;
use crate::db::models::client_records::{
    ClientRecordCreateDBRequest, ClientRecordDBResponse, ClientRecordUpdateDBRequest,
};
use crate::types::{RecordId, TenantId};
use chrono::NaiveDate;
use sqlx::{Connection, PgConnection};

const RECORD_COLUMNS: &str =
    "id, user_id, name, phone, resource, reminder_date, reminder_sent, created_at";

pub struct ClientRecords<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ClientRecords<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &mut self,
        tenant: TenantId,
        request: &ClientRecordCreateDBRequest,
    ) -> Result<ClientRecordDBResponse> {
        let record = sqlx::query_as::<_, ClientRecordDBResponse>(&format!(
            "INSERT INTO client_records (user_id, name, phone, resource, reminder_date)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(tenant)
        .bind(&request.name)
        .bind(&request.phone)
        .bind(&request.resource)
        .bind(request.reminder_date)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(record)
    }

    /// Insert a batch of records atomically. Either every row lands or none
    /// do; bulk import must not leave a half-committed batch behind.
    pub async fn insert_many(
        &mut self,
        tenant: TenantId,
        requests: &[ClientRecordCreateDBRequest],
    ) -> Result<Vec<ClientRecordDBResponse>> {
        let mut tx = self.db.begin().await?;
        let mut inserted = Vec::with_capacity(requests.len());

        for request in requests {
            let record = sqlx::query_as::<_, ClientRecordDBResponse>(&format!(
                "INSERT INTO client_records (user_id, name, phone, resource, reminder_date)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {RECORD_COLUMNS}"
            ))
            .bind(tenant)
            .bind(&request.name)
            .bind(&request.phone)
            .bind(&request.resource)
            .bind(request.reminder_date)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(record);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get(&mut self, tenant: TenantId, id: RecordId) -> Result<Option<ClientRecordDBResponse>> {
        let record = sqlx::query_as::<_, ClientRecordDBResponse>(&format!(
            "SELECT {RECORD_COLUMNS} FROM client_records WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(tenant)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(record)
    }

    pub async fn list(&mut self, tenant: TenantId) -> Result<Vec<ClientRecordDBResponse>> {
        let records = sqlx::query_as::<_, ClientRecordDBResponse>(&format!(
            "SELECT {RECORD_COLUMNS} FROM client_records
             WHERE user_id = $1
             ORDER BY reminder_date, created_at"
        ))
        .bind(tenant)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(records)
    }

    /// Update a record. When `reminder_date` changes to a different value
    /// the sent flag resets to false; setting the same date leaves it alone.
    pub async fn update(
        &mut self,
        tenant: TenantId,
        id: RecordId,
        request: &ClientRecordUpdateDBRequest,
    ) -> Result<Option<ClientRecordDBResponse>> {
        let record = sqlx::query_as::<_, ClientRecordDBResponse>(&format!(
            "UPDATE client_records SET
                name = COALESCE($3, name),
                phone = COALESCE($4, phone),
                resource = COALESCE($5, resource),
                reminder_sent = CASE
                    WHEN $6::date IS NOT NULL AND $6::date IS DISTINCT FROM reminder_date
                    THEN FALSE
                    ELSE reminder_sent
                END,
                reminder_date = COALESCE($6, reminder_date)
             WHERE id = $1 AND user_id = $2
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(tenant)
        .bind(&request.name)
        .bind(&request.phone)
        .bind(&request.resource)
        .bind(request.reminder_date)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(record)
    }

    pub async fn delete(&mut self, tenant: TenantId, id: RecordId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM client_records WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(tenant)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_many(&mut self, tenant: TenantId, ids: &[RecordId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM client_records WHERE user_id = $1 AND id = ANY($2)")
            .bind(tenant)
            .bind(ids)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count(&mut self, tenant: TenantId) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM client_records WHERE user_id = $1")
                .bind(tenant)
                .fetch_one(&mut *self.db)
                .await?;

        Ok(count)
    }

    /// Records due for a reminder: unsent, with a reminder date on or before
    /// the window end. The lower bound is open into the past on purpose:
    /// an overdue record that was never notified stays eligible until sent.
    pub async fn due_for_reminder(
        &mut self,
        tenant: TenantId,
        window_end: NaiveDate,
    ) -> Result<Vec<ClientRecordDBResponse>> {
        let records = sqlx::query_as::<_, ClientRecordDBResponse>(&format!(
            "SELECT {RECORD_COLUMNS} FROM client_records
             WHERE user_id = $1 AND reminder_sent = FALSE AND reminder_date <= $2
             ORDER BY reminder_date, created_at"
        ))
        .bind(tenant)
        .bind(window_end)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(records)
    }

    /// Conditionally flip the sent flag. Returns false when the record was
    /// already marked (or doesn't exist for this tenant), so a concurrent
    /// manual send and the scheduled run record at most one durable sender.
    pub async fn mark_sent_if_unsent(&mut self, tenant: TenantId, id: RecordId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE client_records SET reminder_sent = TRUE
             WHERE id = $1 AND user_id = $2 AND reminder_sent = FALSE",
        )
        .bind(id)
        .bind(tenant)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
