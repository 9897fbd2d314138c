//! Tenant settings handlers.

use crate::{
    api::models::{
        settings::{SettingsResponse, SettingsUpdate, TestSmsRequest, TestSmsResponse},
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::Settings,
        models::settings::SettingsUpsertDBRequest,
    },
    errors::{Error, Result},
    phone,
    sms::SmsGateway,
    AppState,
};
use axum::{extract::State, Json};

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    tag = "settings",
    responses((status = 200, description = "Tenant settings (defaults before first save)", body = SettingsResponse))
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn get_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SettingsResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let settings = Settings::new(&mut conn).get(user.id).await?;

    Ok(Json(match settings {
        Some(settings) => settings.into(),
        None => SettingsResponse::defaults(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/settings",
    tag = "settings",
    request_body = SettingsUpdate,
    responses(
        (status = 200, description = "Settings saved", body = SettingsResponse),
        (status = 400, description = "Invalid settings"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>> {
    if request.reminder_lead_days < 1 {
        return Err(Error::BadRequest {
            message: "Reminder lead time must be at least 1 day".to_string(),
        });
    }
    if request.message_template.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Message template cannot be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut settings = Settings::new(&mut conn);

    // An omitted auth token keeps the stored one; a provided token is
    // encrypted before it ever reaches the database.
    let sms_auth_secret = match request.sms_auth_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(new_secret) => Some(state.codec.encrypt(new_secret)),
        None => settings
            .get(user.id)
            .await?
            .and_then(|existing| existing.sms_auth_secret),
    };

    let sms_from_number = request
        .sms_from_number
        .as_deref()
        .map(phone::normalize)
        .filter(|s| !s.is_empty());

    let saved = settings
        .upsert(
            user.id,
            &SettingsUpsertDBRequest {
                sms_account_id: request.sms_account_id.filter(|s| !s.is_empty()),
                sms_auth_secret,
                sms_from_number,
                business_name: request.business_name.filter(|s| !s.is_empty()),
                business_contact: request.business_contact.filter(|s| !s.is_empty()),
                reminder_lead_days: request.reminder_lead_days,
                message_template: request.message_template,
            },
        )
        .await?;

    Ok(Json(saved.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/settings/test-sms",
    tag = "settings",
    request_body = TestSmsRequest,
    responses(
        (status = 200, description = "Test message sent", body = TestSmsResponse),
        (status = 400, description = "SMS not configured or bad destination"),
        (status = 502, description = "Carrier rejected the send, with the classified reason"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn test_sms(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<TestSmsRequest>,
) -> Result<Json<TestSmsResponse>> {
    let to = phone::normalize(&request.to);
    if to.is_empty() {
        return Err(Error::BadRequest {
            message: "A destination phone number is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let settings = Settings::new(&mut conn)
        .get(user.id)
        .await?
        .ok_or_else(|| Error::BadRequest {
            message: "Save your SMS settings before sending a test message".to_string(),
        })?;

    let business = settings
        .business_name
        .clone()
        .unwrap_or_else(|| "your business".to_string());
    let body = format!("Test message from AutoRemind for {business}. Your SMS setup works.");

    let gateway = SmsGateway::new(
        state.carrier.as_ref(),
        state.config.sms.managed.as_ref(),
        &state.codec,
    );
    let delivery = gateway.send(user.id, &settings, &to, &body).await?;

    Ok(Json(TestSmsResponse {
        message_id: delivery.message_id,
    }))
}
