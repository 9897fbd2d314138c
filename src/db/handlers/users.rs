//! Repository for tenants.

use crate::db::errors::Result;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::types::TenantId;
use sqlx::PgConnection;

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (email, display_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, display_name, password_hash, payment_provider_id, created_at, updated_at
            "#,
        )
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(&mut self, id: TenantId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            "SELECT id, email, display_name, password_hash, payment_provider_id, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            "SELECT id, email, display_name, password_hash, payment_provider_id, created_at, updated_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    pub async fn get_by_payment_provider_id(&mut self, customer_id: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            "SELECT id, email, display_name, password_hash, payment_provider_id, created_at, updated_at
             FROM users WHERE payment_provider_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    pub async fn set_payment_provider_id(&mut self, id: TenantId, customer_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET payment_provider_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(customer_id)
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// All tenant ids, oldest first. Used by the reminder dispatcher to walk
    /// every tenant in a stable order.
    pub async fn list_ids(&mut self) -> Result<Vec<TenantId>> {
        let ids = sqlx::query_scalar::<_, TenantId>("SELECT id FROM users ORDER BY created_at, id")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(ids)
    }

    pub async fn delete(&mut self, id: TenantId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
