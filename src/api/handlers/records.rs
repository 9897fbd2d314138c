//! Client record handlers: CRUD, bulk operations, manual send, export.

use crate::{
    api::models::{
        records::{
            BulkDeleteRequest, BulkDeleteResponse, ClientRecordCreate, ClientRecordResponse,
            ClientRecordUpdate, ImportRequest, ImportResponse, SendNowResponse,
        },
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{ClientRecords, Settings, Subscriptions},
        models::client_records::{ClientRecordCreateDBRequest, ClientRecordUpdateDBRequest},
    },
    errors::{Error, Result},
    phone,
    policy::{self, PlanTier},
    reminders::dispatcher,
    sms::SmsGateway,
    types::RecordId,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

fn validate_record(name: &str, phone_raw: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Client name is required".to_string(),
        });
    }
    let normalized = phone::normalize(phone_raw);
    if normalized.is_empty() {
        return Err(Error::BadRequest {
            message: "A phone number is required".to_string(),
        });
    }
    Ok(normalized)
}

/// Current plan tier for a tenant, materializing the implicit free
/// subscription on first access.
async fn tenant_tier(conn: &mut sqlx::PgConnection, user: &CurrentUser) -> Result<PlanTier> {
    let subscription = Subscriptions::new(conn).get_or_create(user.id).await?;
    Ok(subscription.tier())
}

#[utoipa::path(
    get,
    path = "/api/v1/records",
    tag = "records",
    responses((status = 200, description = "All of the tenant's client records", body = [ClientRecordResponse]))
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn list_records(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ClientRecordResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let records = ClientRecords::new(&mut conn).list(user.id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/records",
    tag = "records",
    request_body = ClientRecordCreate,
    responses(
        (status = 200, description = "Record created", body = ClientRecordResponse),
        (status = 403, description = "Plan client limit reached"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn create_record(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ClientRecordCreate>,
) -> Result<Json<ClientRecordResponse>> {
    let normalized_phone = validate_record(&request.name, &request.phone)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    let tier = tenant_tier(&mut conn, &user).await?;
    let mut records = ClientRecords::new(&mut conn);
    let current_count = records.count(user.id).await?;
    if !policy::can_add_client(current_count, tier) {
        return Err(Error::PlanLimit {
            limit: tier.client_limit().unwrap_or(current_count),
        });
    }

    let record = records
        .create(
            user.id,
            &ClientRecordCreateDBRequest {
                name: request.name.trim().to_string(),
                phone: normalized_phone,
                resource: request.resource.trim().to_string(),
                reminder_date: request.reminder_date,
            },
        )
        .await?;

    Ok(Json(record.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/records/{id}",
    tag = "records",
    responses(
        (status = 200, description = "The record", body = ClientRecordResponse),
        (status = 404, description = "No such record for this tenant"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn get_record(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<RecordId>,
) -> Result<Json<ClientRecordResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let record = ClientRecords::new(&mut conn)
        .get(user.id, id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Client record".to_string(),
            id: id.to_string(),
        })?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/records/{id}",
    tag = "records",
    request_body = ClientRecordUpdate,
    responses(
        (status = 200, description = "Updated record", body = ClientRecordResponse),
        (status = 404, description = "No such record for this tenant"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn update_record(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<RecordId>,
    Json(request): Json<ClientRecordUpdate>,
) -> Result<Json<ClientRecordResponse>> {
    let phone = match request.phone.as_deref() {
        Some(raw) => {
            let normalized = phone::normalize(raw);
            if normalized.is_empty() {
                return Err(Error::BadRequest {
                    message: "Phone number cannot be empty".to_string(),
                });
            }
            Some(normalized)
        }
        None => None,
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let record = ClientRecords::new(&mut conn)
        .update(
            user.id,
            id,
            &ClientRecordUpdateDBRequest {
                name: request.name,
                phone,
                resource: request.resource,
                reminder_date: request.reminder_date,
            },
        )
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Client record".to_string(),
            id: id.to_string(),
        })?;

    Ok(Json(record.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/records/{id}",
    tag = "records",
    responses(
        (status = 200, description = "Record deleted"),
        (status = 404, description = "No such record for this tenant"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn delete_record(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<RecordId>,
) -> Result<Json<serde_json::Value>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let deleted = ClientRecords::new(&mut conn).delete(user.id, id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "Client record".to_string(),
            id: id.to_string(),
        });
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

#[utoipa::path(
    delete,
    path = "/api/v1/records",
    tag = "records",
    request_body = BulkDeleteRequest,
    responses((status = 200, description = "Matching records deleted", body = BulkDeleteResponse))
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn delete_records(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let deleted = ClientRecords::new(&mut conn)
        .delete_many(user.id, &request.ids)
        .await?;
    Ok(Json(BulkDeleteResponse { deleted }))
}

#[utoipa::path(
    post,
    path = "/api/v1/records/import",
    tag = "records",
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Batch imported", body = ImportResponse),
        (status = 400, description = "A row failed validation; nothing was imported"),
        (status = 403, description = "Batch would exceed the plan client limit"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id, rows = request.records.len()))]
pub async fn import_records(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>> {
    if request.records.is_empty() {
        return Err(Error::BadRequest {
            message: "Import contains no rows".to_string(),
        });
    }

    // Validate every row before touching the database: an import either
    // lands completely or not at all.
    let mut rows = Vec::with_capacity(request.records.len());
    for (index, record) in request.records.iter().enumerate() {
        let normalized_phone = validate_record(&record.name, &record.phone).map_err(|e| {
            Error::BadRequest {
                message: format!("Row {}: {}", index + 1, e.user_message()),
            }
        })?;
        rows.push(ClientRecordCreateDBRequest {
            name: record.name.trim().to_string(),
            phone: normalized_phone,
            resource: record.resource.trim().to_string(),
            reminder_date: record.reminder_date,
        });
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    let tier = tenant_tier(&mut conn, &user).await?;
    let mut records = ClientRecords::new(&mut conn);
    let current_count = records.count(user.id).await?;
    if !policy::can_add_clients(current_count, rows.len() as i64, tier) {
        return Err(Error::PlanLimit {
            limit: tier.client_limit().unwrap_or(current_count),
        });
    }

    let inserted = records.insert_many(user.id, &rows).await?;

    tracing::info!(imported = inserted.len(), "bulk import committed");
    Ok(Json(ImportResponse {
        imported: inserted.len(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/records/export",
    tag = "records",
    responses((status = 200, description = "All records as CSV", content_type = "text/csv"))
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn export_records(State(state): State<AppState>, user: CurrentUser) -> Result<Response> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let records = ClientRecords::new(&mut conn).list(user.id).await?;

    let mut csv = String::from("name,phone,resource,reminder_date,reminder_sent\n");
    for record in records {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_field(&record.name),
            csv_field(&record.phone),
            csv_field(&record.resource),
            record.reminder_date,
            record.reminder_sent,
        ));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"clients.csv\"".to_string(),
            ),
        ],
        csv,
    )
        .into_response())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/records/{id}/send",
    tag = "records",
    responses(
        (status = 200, description = "Reminder sent now", body = SendNowResponse),
        (status = 400, description = "SMS not configured"),
        (status = 404, description = "No such record for this tenant"),
        (status = 502, description = "Carrier rejected the send"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn send_record_now(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<RecordId>,
) -> Result<Json<SendNowResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    let record = ClientRecords::new(&mut conn)
        .get(user.id, id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Client record".to_string(),
            id: id.to_string(),
        })?;

    let settings = Settings::new(&mut conn)
        .get(user.id)
        .await?
        .ok_or_else(|| Error::BadRequest {
            message: "Save your SMS settings before sending reminders".to_string(),
        })?;

    let body = dispatcher::render_message(&settings, &record.name, &record.resource, record.reminder_date);

    let gateway = SmsGateway::new(
        state.carrier.as_ref(),
        state.config.sms.managed.as_ref(),
        &state.codec,
    );
    let delivery = gateway.send(user.id, &settings, &record.phone, &body).await?;

    // Same conditional update as the scheduled run; if the cron raced us
    // and won, the flag is already set and this is a no-op.
    ClientRecords::new(&mut conn)
        .mark_sent_if_unsent(user.id, id)
        .await?;

    Ok(Json(SendNowResponse {
        message_id: delivery.message_id,
    }))
}
