//! Subscription state machine: webhook-driven transitions and idempotence.

use async_trait::async_trait;
use autoremind::billing::{
    BillingEvent, BillingError, BillingProvider, PlanCatalog, ProviderInvoice,
    ProviderSubscription, Reconciler,
};
use autoremind::db::handlers::{Settings, Subscriptions, Users};
use autoremind::db::models::subscriptions::SubscriptionStatus;
use autoremind::db::models::users::UserCreateDBRequest;
use autoremind::policy::PlanTier;
use autoremind::types::TenantId;
use axum::http::HeaderMap;
use chrono::{TimeZone, Utc};
use sqlx::PgPool;

struct FakeProvider {
    subscription: Option<ProviderSubscription>,
    invoice_period_end: Option<i64>,
    fail_invoice_lookup: bool,
}

impl FakeProvider {
    fn with_subscription(subscription: ProviderSubscription) -> Self {
        Self {
            subscription: Some(subscription),
            invoice_period_end: Some(1_735_689_600), // 2025-01-01T00:00:00Z
            fail_invoice_lookup: false,
        }
    }

    fn empty() -> Self {
        Self {
            subscription: None,
            invoice_period_end: None,
            fail_invoice_lookup: false,
        }
    }
}

#[async_trait]
impl BillingProvider for FakeProvider {
    fn verify_webhook(&self, _headers: &HeaderMap, _body: &str) -> Result<BillingEvent, BillingError> {
        Ok(BillingEvent::Ignored {
            event_type: "test".to_string(),
        })
    }

    async fn retrieve_subscription(
        &self,
        _subscription_id: &str,
    ) -> Result<ProviderSubscription, BillingError> {
        self.subscription
            .clone()
            .ok_or_else(|| BillingError::ProviderApi("no such subscription".to_string()))
    }

    async fn retrieve_invoice(&self, _invoice_id: &str) -> Result<ProviderInvoice, BillingError> {
        if self.fail_invoice_lookup {
            return Err(BillingError::ProviderApi("invoice lookup failed".to_string()));
        }
        Ok(ProviderInvoice {
            period_end: self
                .invoice_period_end
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        })
    }

    async fn create_checkout_session(
        &self,
        _tenant: TenantId,
        _email: &str,
        _existing_customer_id: Option<&str>,
        _price_id: &str,
        _success_url: &str,
        _cancel_url: &str,
    ) -> Result<String, BillingError> {
        Ok("https://checkout.example/session".to_string())
    }

    async fn create_portal_session(
        &self,
        _customer_id: &str,
        _return_url: &str,
    ) -> Result<String, BillingError> {
        Ok("https://portal.example/session".to_string())
    }

    async fn change_subscription_price(
        &self,
        _subscription_id: &str,
        _price_id: &str,
    ) -> Result<(), BillingError> {
        Ok(())
    }
}

fn catalog() -> PlanCatalog {
    PlanCatalog {
        starter_price_id: "price_starter".to_string(),
        pro_price_id: "price_pro".to_string(),
    }
}

fn pro_subscription(customer_id: &str) -> ProviderSubscription {
    ProviderSubscription {
        id: "sub_123".to_string(),
        customer_id: customer_id.to_string(),
        price_id: Some("price_pro".to_string()),
        status: SubscriptionStatus::Active,
        cancel_at_period_end: false,
        latest_invoice_id: Some("in_123".to_string()),
    }
}

async fn create_tenant(pool: &PgPool, email: &str) -> TenantId {
    let mut conn = pool.acquire().await.unwrap();
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            display_name: None,
            password_hash: None,
        })
        .await
        .unwrap();
    user.id
}

fn checkout_event(tenant: TenantId, customer_id: &str) -> BillingEvent {
    BillingEvent::CheckoutCompleted {
        customer_id: Some(customer_id.to_string()),
        subscription_id: Some("sub_123".to_string()),
        client_reference: Some(tenant),
    }
}

#[sqlx::test]
async fn get_or_create_materializes_one_free_row(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;

    let mut conn = pool.acquire().await.unwrap();
    let mut subscriptions = Subscriptions::new(&mut conn);

    let first = subscriptions.get_or_create(tenant).await.unwrap();
    assert_eq!(first.tier(), PlanTier::Free);
    assert_eq!(first.subscription_status(), SubscriptionStatus::Active);

    let second = subscriptions.get_or_create(tenant).await.unwrap();
    assert_eq!(first.id, second.id, "repeated access must reuse the row");
}

#[sqlx::test]
async fn checkout_completed_upgrades_and_grants_managed_sms(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let provider = FakeProvider::with_subscription(pro_subscription("cus_123"));
    let cat = catalog();
    let reconciler = Reconciler::new(&pool, &provider, &cat);

    reconciler.apply(checkout_event(tenant, "cus_123")).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.tier(), PlanTier::Pro);
    assert_eq!(row.subscription_status(), SubscriptionStatus::Active);
    assert_eq!(row.customer_id.as_deref(), Some("cus_123"));
    assert_eq!(row.subscription_id.as_deref(), Some("sub_123"));
    assert!(row.current_period_end.is_some());

    // Settings row was created just to carry the entitlement.
    let settings = Settings::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert!(settings.managed_sms);
}

#[sqlx::test]
async fn redelivered_event_is_idempotent(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let provider = FakeProvider::with_subscription(pro_subscription("cus_123"));
    let cat = catalog();
    let reconciler = Reconciler::new(&pool, &provider, &cat);

    reconciler.apply(checkout_event(tenant, "cus_123")).await.unwrap();
    reconciler
        .apply(BillingEvent::SubscriptionUpdated(pro_subscription("cus_123")))
        .await
        .unwrap();
    reconciler
        .apply(BillingEvent::SubscriptionUpdated(pro_subscription("cus_123")))
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(tenant)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
    assert_eq!(count, 1, "redelivery must not create duplicate rows");

    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.tier(), PlanTier::Pro);
    let settings = Settings::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert!(settings.managed_sms);
}

#[sqlx::test]
async fn downgrade_to_free_disables_managed_sms(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let provider = FakeProvider::with_subscription(pro_subscription("cus_123"));
    let cat = catalog();
    let reconciler = Reconciler::new(&pool, &provider, &cat);

    reconciler.apply(checkout_event(tenant, "cus_123")).await.unwrap();

    // The provider reports a price we don't recognize -> free tier.
    let mut downgraded = pro_subscription("cus_123");
    downgraded.price_id = Some("price_unknown".to_string());
    reconciler
        .apply(BillingEvent::SubscriptionUpdated(downgraded))
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.tier(), PlanTier::Free);
    let settings = Settings::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert!(!settings.managed_sms);
}

#[sqlx::test]
async fn deletion_downgrades_and_clears_external_ids(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let provider = FakeProvider::with_subscription(pro_subscription("cus_123"));
    let cat = catalog();
    let reconciler = Reconciler::new(&pool, &provider, &cat);

    reconciler.apply(checkout_event(tenant, "cus_123")).await.unwrap();
    reconciler
        .apply(BillingEvent::SubscriptionDeleted {
            customer_id: Some("cus_123".to_string()),
        })
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.tier(), PlanTier::Free);
    assert_eq!(row.subscription_status(), SubscriptionStatus::Canceled);
    assert!(row.subscription_id.is_none());
    assert!(row.price_id.is_none());
    assert!(row.current_period_end.is_none());
    // Customer id survives so later events still resolve.
    assert_eq!(row.customer_id.as_deref(), Some("cus_123"));

    let settings = Settings::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert!(!settings.managed_sms);
}

#[sqlx::test]
async fn invoice_failure_and_recovery(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let provider = FakeProvider::with_subscription(pro_subscription("cus_123"));
    let cat = catalog();
    let reconciler = Reconciler::new(&pool, &provider, &cat);

    reconciler.apply(checkout_event(tenant, "cus_123")).await.unwrap();

    reconciler
        .apply(BillingEvent::InvoicePaymentFailed {
            customer_id: Some("cus_123".to_string()),
        })
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.subscription_status(), SubscriptionStatus::PastDue);
    drop(conn);

    reconciler
        .apply(BillingEvent::InvoicePaymentSucceeded {
            customer_id: Some("cus_123".to_string()),
        })
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.subscription_status(), SubscriptionStatus::Active);
    drop(conn);

    // A paid invoice while already active is a no-op.
    reconciler
        .apply(BillingEvent::InvoicePaymentSucceeded {
            customer_id: Some("cus_123".to_string()),
        })
        .await
        .unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.subscription_status(), SubscriptionStatus::Active);
}

#[sqlx::test]
async fn unknown_customer_events_are_dropped_quietly(pool: PgPool) {
    let provider = FakeProvider::empty();
    let cat = catalog();
    let reconciler = Reconciler::new(&pool, &provider, &cat);

    // No tenant matches: the handler logs and reports success so the
    // provider does not retry forever.
    reconciler
        .apply(BillingEvent::SubscriptionUpdated(pro_subscription("cus_ghost")))
        .await
        .unwrap();
    reconciler
        .apply(BillingEvent::SubscriptionDeleted {
            customer_id: Some("cus_ghost".to_string()),
        })
        .await
        .unwrap();
    reconciler
        .apply(BillingEvent::InvoicePaymentFailed {
            customer_id: Some("cus_ghost".to_string()),
        })
        .await
        .unwrap();
}

#[sqlx::test]
async fn failed_invoice_lookup_degrades_to_null_period_end(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let mut provider = FakeProvider::with_subscription(pro_subscription("cus_123"));
    provider.fail_invoice_lookup = true;
    let cat = catalog();
    let reconciler = Reconciler::new(&pool, &provider, &cat);

    reconciler.apply(checkout_event(tenant, "cus_123")).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.tier(), PlanTier::Pro, "transition must not fail");
    assert!(row.current_period_end.is_none());
}

#[sqlx::test]
async fn checkout_to_free_leaves_managed_sms_untouched(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let mut subscription = pro_subscription("cus_123");
    subscription.price_id = Some("price_unknown".to_string());
    let provider = FakeProvider::with_subscription(subscription);
    let cat = catalog();
    let reconciler = Reconciler::new(&pool, &provider, &cat);

    reconciler.apply(checkout_event(tenant, "cus_123")).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let row = Subscriptions::new(&mut conn).get(tenant).await.unwrap().unwrap();
    assert_eq!(row.tier(), PlanTier::Free);
    // No settings row was conjured up just to store a false flag.
    assert!(Settings::new(&mut conn).get(tenant).await.unwrap().is_none());
}
