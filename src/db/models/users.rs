//! Database models for tenants.

use crate::types::TenantId;
use chrono::{DateTime, Utc};

/// Database request for creating a new tenant
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
}

/// Database response for a tenant
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserDBResponse {
    pub id: TenantId,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub payment_provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
