//! Repository for per-tenant billing state.

use crate::db::errors::{DbError, Result};
use crate::db::models::subscriptions::{
    SubscriptionDBResponse, SubscriptionStatus, SubscriptionSyncDBRequest,
};
use crate::types::TenantId;
use sqlx::PgConnection;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_tier, status, customer_id, subscription_id, \
     price_id, current_period_end, cancel_at_period_end, created_at, updated_at";

pub struct Subscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn get(&mut self, tenant: TenantId) -> Result<Option<SubscriptionDBResponse>> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1"
        ))
        .bind(tenant)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    /// A tenant with no subscription row is an implicit free/active
    /// subscription; the row is materialized here on first access. This is
    /// the only place such creation happens. The insert tolerates a
    /// concurrent creator via ON CONFLICT DO NOTHING and re-reads.
    pub async fn get_or_create(&mut self, tenant: TenantId) -> Result<SubscriptionDBResponse> {
        sqlx::query(
            "INSERT INTO subscriptions (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(tenant)
        .execute(&mut *self.db)
        .await?;

        self.get(tenant).await?.ok_or(DbError::NotFound)
    }

    pub async fn get_by_customer_id(&mut self, customer_id: &str) -> Result<Option<SubscriptionDBResponse>> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    /// Write the full derived billing state for a tenant. Upsert keyed on
    /// the tenant id, so redelivered events rewrite the same row.
    pub async fn sync(
        &mut self,
        tenant: TenantId,
        request: &SubscriptionSyncDBRequest,
    ) -> Result<SubscriptionDBResponse> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            "INSERT INTO subscriptions
                (user_id, plan_tier, status, customer_id, subscription_id, price_id,
                 current_period_end, cancel_at_period_end)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id) DO UPDATE SET
                plan_tier = EXCLUDED.plan_tier,
                status = EXCLUDED.status,
                customer_id = EXCLUDED.customer_id,
                subscription_id = EXCLUDED.subscription_id,
                price_id = EXCLUDED.price_id,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                updated_at = NOW()
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(tenant)
        .bind(request.plan_tier.as_str())
        .bind(request.status.as_str())
        .bind(&request.customer_id)
        .bind(&request.subscription_id)
        .bind(&request.price_id)
        .bind(request.current_period_end)
        .bind(request.cancel_at_period_end)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    pub async fn set_status(&mut self, tenant: TenantId, status: SubscriptionStatus) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET status = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(tenant)
            .bind(status.as_str())
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Unconditional downgrade to free/canceled. External subscription and
    /// price ids and the period end are cleared; the customer id is kept so
    /// later events for this customer still resolve to the tenant.
    pub async fn mark_canceled(&mut self, tenant: TenantId) -> Result<()> {
        sqlx::query(
            "UPDATE subscriptions SET
                plan_tier = 'free',
                status = 'canceled',
                subscription_id = NULL,
                price_id = NULL,
                current_period_end = NULL,
                cancel_at_period_end = FALSE,
                updated_at = NOW()
             WHERE user_id = $1",
        )
        .bind(tenant)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }
}
