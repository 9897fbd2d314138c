//! Subscription state reconciliation.
//!
//! Webhook events are the only thing that moves local billing state. Each
//! transition re-derives the full local row from the latest external object
//! (never applies deltas), looks the tenant up by external customer id, and
//! writes the subscription row as its final step, so a failed upstream
//! fetch can never leave a partially-applied local mutation behind.
//!
//! Events for customers with no local tenant are logged and dropped: a
//! retry would hammer on a lookup that cannot start succeeding, so the
//! caller is told the event was handled.

use super::{BillingEvent, BillingProvider, PlanCatalog, ProviderSubscription, Result};
use crate::db::handlers::{Settings, Subscriptions, Users};
use crate::db::models::subscriptions::{SubscriptionStatus, SubscriptionSyncDBRequest};
use crate::policy::PlanTier;
use crate::types::TenantId;
use sqlx::PgPool;

pub struct Reconciler<'a> {
    db: &'a PgPool,
    provider: &'a dyn BillingProvider,
    catalog: &'a PlanCatalog,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a PgPool, provider: &'a dyn BillingProvider, catalog: &'a PlanCatalog) -> Self {
        Self {
            db,
            provider,
            catalog,
        }
    }

    /// Apply one verified webhook event. Idempotent: redelivering the same
    /// event converges on the same local state.
    #[tracing::instrument(skip_all)]
    pub async fn apply(&self, event: BillingEvent) -> Result<()> {
        match event {
            BillingEvent::CheckoutCompleted {
                customer_id,
                subscription_id,
                client_reference,
            } => {
                self.handle_checkout_completed(customer_id, subscription_id, client_reference)
                    .await
            }
            BillingEvent::SubscriptionUpdated(subscription) => {
                self.handle_subscription_updated(subscription).await
            }
            BillingEvent::SubscriptionDeleted { customer_id } => {
                self.handle_subscription_deleted(customer_id).await
            }
            BillingEvent::InvoicePaymentSucceeded { customer_id } => {
                self.handle_invoice_payment_succeeded(customer_id).await
            }
            BillingEvent::InvoicePaymentFailed { customer_id } => {
                self.handle_invoice_payment_failed(customer_id).await
            }
            BillingEvent::Ignored { event_type } => {
                tracing::debug!(event_type = %event_type, "ignoring webhook event type");
                Ok(())
            }
        }
    }

    async fn handle_checkout_completed(
        &self,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        client_reference: Option<TenantId>,
    ) -> Result<()> {
        let Some(subscription_id) = subscription_id else {
            tracing::warn!("checkout completed without a subscription, dropping event");
            return Ok(());
        };

        // Step 1: fetch the resulting subscription from the provider. The
        // checkout payload itself does not carry the price, so the full
        // object is the source of truth.
        let subscription = self.provider.retrieve_subscription(&subscription_id).await?;

        // Step 2: resolve the tenant. The checkout carried our tenant id
        // as the client reference; fall back to the customer id for
        // sessions created out-of-band.
        let mut conn = self.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
        let tenant = match client_reference {
            Some(tenant) => Some(tenant),
            None => {
                let lookup = customer_id.as_deref().unwrap_or(&subscription.customer_id);
                self.tenant_for_customer(&mut conn, lookup).await?
            }
        };
        let Some(tenant) = tenant else {
            tracing::warn!(
                customer_id = ?customer_id,
                "checkout completed for unknown customer, dropping event"
            );
            return Ok(());
        };

        // Step 3: map the price to a tier and enrich with the period end.
        let tier = self.catalog.tier_for_price(subscription.price_id.as_deref());
        let period_end = self.period_end_for(subscription.latest_invoice_id.as_deref()).await;

        // Step 4: persist. Customer id lands on the tenant first so later
        // events resolve, then the full subscription row.
        let mut users = Users::new(&mut conn);
        users.set_payment_provider_id(tenant, &subscription.customer_id).await?;

        self.sync_row(&mut conn, tenant, tier, &subscription, period_end).await?;

        // A managed tier grants the managed-SMS entitlement, creating the
        // settings row when the tenant has never saved settings. A free
        // result leaves the flag untouched here; only explicit
        // update/delete events turn it off.
        if tier.managed_sms() {
            let mut settings = Settings::new(&mut conn);
            settings.set_managed_sms(tenant, true, true).await?;
        }

        tracing::info!(tenant = %tenant, tier = %tier, "checkout completed, subscription synced");
        Ok(())
    }

    async fn handle_subscription_updated(&self, subscription: ProviderSubscription) -> Result<()> {
        let mut conn = self.db.acquire().await.map_err(crate::db::errors::DbError::from)?;

        let Some(tenant) = self.tenant_for_customer(&mut conn, &subscription.customer_id).await? else {
            tracing::warn!(
                customer_id = %subscription.customer_id,
                "subscription update for unknown customer, dropping event"
            );
            return Ok(());
        };

        let tier = self.catalog.tier_for_price(subscription.price_id.as_deref());
        let period_end = self.period_end_for(subscription.latest_invoice_id.as_deref()).await;

        self.sync_row(&mut conn, tenant, tier, &subscription, period_end).await?;

        let mut settings = Settings::new(&mut conn);
        if tier.managed_sms() {
            settings.set_managed_sms(tenant, true, true).await?;
        } else {
            // An explicit downgrade to free revokes the entitlement, but a
            // tenant who never created settings doesn't get a row for it.
            settings.set_managed_sms(tenant, false, false).await?;
        }

        tracing::info!(
            tenant = %tenant,
            tier = %tier,
            status = %subscription.status,
            "subscription updated"
        );
        Ok(())
    }

    async fn handle_subscription_deleted(&self, customer_id: Option<String>) -> Result<()> {
        let Some(customer_id) = customer_id else {
            tracing::warn!("subscription deletion without a customer, dropping event");
            return Ok(());
        };

        let mut conn = self.db.acquire().await.map_err(crate::db::errors::DbError::from)?;

        let Some(tenant) = self.tenant_for_customer(&mut conn, &customer_id).await? else {
            tracing::warn!(
                customer_id = %customer_id,
                "subscription deletion for unknown customer, dropping event"
            );
            return Ok(());
        };

        let mut subscriptions = Subscriptions::new(&mut conn);
        subscriptions.mark_canceled(tenant).await?;

        let mut settings = Settings::new(&mut conn);
        settings.set_managed_sms(tenant, false, false).await?;

        tracing::info!(tenant = %tenant, "subscription deleted, downgraded to free");
        Ok(())
    }

    async fn handle_invoice_payment_succeeded(&self, customer_id: Option<String>) -> Result<()> {
        let Some(customer_id) = customer_id else {
            return Ok(());
        };

        let mut conn = self.db.acquire().await.map_err(crate::db::errors::DbError::from)?;

        let Some(tenant) = self.tenant_for_customer(&mut conn, &customer_id).await? else {
            tracing::debug!(customer_id = %customer_id, "invoice paid for unknown customer");
            return Ok(());
        };

        // Recovery transition only: a paid invoice clears past_due.
        let mut subscriptions = Subscriptions::new(&mut conn);
        if let Some(row) = subscriptions.get(tenant).await? {
            if row.subscription_status() == SubscriptionStatus::PastDue {
                subscriptions.set_status(tenant, SubscriptionStatus::Active).await?;
                tracing::info!(tenant = %tenant, "payment recovered, subscription active again");
            }
        }
        Ok(())
    }

    async fn handle_invoice_payment_failed(&self, customer_id: Option<String>) -> Result<()> {
        let Some(customer_id) = customer_id else {
            return Ok(());
        };

        let mut conn = self.db.acquire().await.map_err(crate::db::errors::DbError::from)?;

        let Some(tenant) = self.tenant_for_customer(&mut conn, &customer_id).await? else {
            tracing::debug!(customer_id = %customer_id, "failed invoice for unknown customer");
            return Ok(());
        };

        let mut subscriptions = Subscriptions::new(&mut conn);
        subscriptions.set_status(tenant, SubscriptionStatus::PastDue).await?;

        tracing::warn!(tenant = %tenant, "invoice payment failed, subscription past due");
        Ok(())
    }

    async fn sync_row(
        &self,
        conn: &mut sqlx::PgConnection,
        tenant: TenantId,
        tier: PlanTier,
        subscription: &ProviderSubscription,
        period_end: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()> {
        let mut subscriptions = Subscriptions::new(conn);
        subscriptions
            .sync(
                tenant,
                &SubscriptionSyncDBRequest {
                    plan_tier: tier,
                    status: subscription.status,
                    customer_id: Some(subscription.customer_id.clone()),
                    subscription_id: Some(subscription.id.clone()),
                    price_id: subscription.price_id.clone(),
                    current_period_end: period_end,
                    cancel_at_period_end: subscription.cancel_at_period_end,
                },
            )
            .await?;
        Ok(())
    }

    /// Resolve the tenant owning an external customer id: the subscription
    /// row first, then the tenant record (covers the very first event for a
    /// customer, before any subscription row exists).
    async fn tenant_for_customer(
        &self,
        conn: &mut sqlx::PgConnection,
        customer_id: &str,
    ) -> Result<Option<TenantId>> {
        let mut subscriptions = Subscriptions::new(conn);
        if let Some(row) = subscriptions.get_by_customer_id(customer_id).await? {
            return Ok(Some(row.user_id));
        }

        let mut users = Users::new(conn);
        Ok(users
            .get_by_payment_provider_id(customer_id)
            .await?
            .map(|user| user.id))
    }

    /// Best-effort period end from the latest invoice. A failed or missing
    /// lookup degrades to `None` instead of failing the transition.
    async fn period_end_for(&self, invoice_id: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
        let invoice_id = invoice_id?;
        match self.provider.retrieve_invoice(invoice_id).await {
            Ok(invoice) => invoice.period_end,
            Err(e) => {
                tracing::warn!(
                    invoice_id = %invoice_id,
                    error = %e,
                    "could not fetch invoice for period end, leaving it unset"
                );
                None
            }
        }
    }
}
