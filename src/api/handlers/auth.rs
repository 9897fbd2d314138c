//! Authentication handlers: registration, login, logout, session info.

use crate::{
    api::models::users::{CurrentUser, LoginRequest, RegisterRequest, UserResponse},
    auth::{password, session},
    db::{errors::DbError, handlers::Users, models::users::UserCreateDBRequest},
    errors::{Error, Result},
    AppState,
};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};

const MIN_PASSWORD_LENGTH: usize = 8;

#[utoipa::path(
    post,
    path = "/authentication/register",
    tag = "authentication",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::BadRequest {
            message: "A valid email address is required".to_string(),
        });
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        });
    }

    let password_hash = password::hash_string(&request.password)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    let user = users
        .create(&UserCreateDBRequest {
            email,
            display_name: request.display_name,
            password_hash: Some(password_hash),
        })
        .await?;

    tracing::info!(tenant = %user.id, "new tenant registered");

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
    };
    let token = session::create_session_token(&current, &state.config)?;
    let cookie = session::session_cookie(&token, &state.config);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(user)),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/authentication/login",
    tag = "authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = UserResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    let email = request.email.trim().to_lowercase();

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    // A single failure path for unknown email and wrong password, so the
    // endpoint doesn't disclose which addresses have accounts.
    let invalid = || Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    };

    let user = users.get_by_email(&email).await?.ok_or_else(invalid)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !password::verify_string(&request.password, hash)? {
        return Err(invalid());
    }

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
    };
    let token = session::create_session_token(&current, &state.config)?;
    let cookie = session::session_cookie(&token, &state.config);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(user)),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses((status = 200, description = "Session cleared"))
)]
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = session::clear_session_cookie(&state.config);
    ([(header::SET_COOKIE, cookie)], Json(serde_json::json!({"ok": true}))).into_response()
}

#[utoipa::path(
    get,
    path = "/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current session", body = CurrentUser),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn me(user: CurrentUser) -> Json<CurrentUser> {
    Json(user)
}

#[utoipa::path(
    delete,
    path = "/authentication/account",
    tag = "authentication",
    responses(
        (status = 200, description = "Account and all owned data deleted"),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn delete_account(State(state): State<AppState>, user: CurrentUser) -> Result<Response> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    // Cascades to client records, settings and the subscription row.
    Users::new(&mut conn).delete(user.id).await?;

    tracing::info!(tenant = %user.id, "tenant account deleted");

    let cookie = session::clear_session_cookie(&state.config);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({"ok": true})),
    )
        .into_response())
}
