//! Stripe billing provider implementation.

use super::{
    BillingError, BillingEvent, BillingProvider, ProviderInvoice, ProviderSubscription, Result,
};
use crate::db::models::subscriptions::SubscriptionStatus;
use crate::types::TenantId;
use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, TimeZone, Utc};
use stripe::{
    BillingPortalSession, CheckoutSession, CheckoutSessionMode, Client, CreateBillingPortalSession,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, Event, EventObject, EventType, Invoice,
    InvoiceId, Subscription, SubscriptionId, UpdateSubscription, UpdateSubscriptionItems, Webhook,
};

/// Stripe payment provider
pub struct StripeBilling {
    client: Client,
    webhook_secret: String,
}

impl StripeBilling {
    pub fn new(api_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(api_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    fn convert_subscription(subscription: Subscription) -> ProviderSubscription {
        ProviderSubscription {
            id: subscription.id.to_string(),
            customer_id: subscription.customer.id().to_string(),
            price_id: subscription
                .items
                .data
                .first()
                .and_then(|item| item.price.as_ref())
                .map(|price| price.id.to_string()),
            status: convert_status(subscription.status),
            cancel_at_period_end: subscription.cancel_at_period_end,
            latest_invoice_id: subscription
                .latest_invoice
                .as_ref()
                .map(|invoice| invoice.id().to_string()),
        }
    }
}

fn convert_status(status: stripe::SubscriptionStatus) -> SubscriptionStatus {
    use stripe::SubscriptionStatus as S;
    match status {
        S::Active => SubscriptionStatus::Active,
        S::PastDue => SubscriptionStatus::PastDue,
        S::Canceled => SubscriptionStatus::Canceled,
        S::Trialing => SubscriptionStatus::Trialing,
        S::Unpaid => SubscriptionStatus::Unpaid,
        _ => SubscriptionStatus::Incomplete,
    }
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

#[async_trait]
impl BillingProvider for StripeBilling {
    fn verify_webhook(&self, headers: &HeaderMap, body: &str) -> Result<BillingEvent> {
        let signature = headers
            .get("stripe-signature")
            .and_then(|value| value.to_str().ok())
            .ok_or(BillingError::InvalidSignature)?;

        let event: Event = Webhook::construct_event(body, signature, &self.webhook_secret)
            .map_err(|e| {
                tracing::warn!(error = %e, "webhook signature verification failed");
                BillingError::InvalidSignature
            })?;

        tracing::debug!(event_type = ?event.type_, event_id = %event.id, "verified webhook event");

        let billing_event = match event.type_ {
            EventType::CheckoutSessionCompleted => match event.data.object {
                EventObject::CheckoutSession(session) => BillingEvent::CheckoutCompleted {
                    customer_id: session.customer.as_ref().map(|c| c.id().to_string()),
                    subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
                    client_reference: session
                        .client_reference_id
                        .as_deref()
                        .and_then(|r| r.parse::<TenantId>().ok()),
                },
                other => {
                    return Err(BillingError::InvalidPayload(format!(
                        "expected checkout session object, got {other:?}"
                    )))
                }
            },
            EventType::CustomerSubscriptionUpdated => match event.data.object {
                EventObject::Subscription(subscription) => {
                    BillingEvent::SubscriptionUpdated(Self::convert_subscription(subscription))
                }
                other => {
                    return Err(BillingError::InvalidPayload(format!(
                        "expected subscription object, got {other:?}"
                    )))
                }
            },
            EventType::CustomerSubscriptionDeleted => match event.data.object {
                EventObject::Subscription(subscription) => BillingEvent::SubscriptionDeleted {
                    customer_id: Some(subscription.customer.id().to_string()),
                },
                other => {
                    return Err(BillingError::InvalidPayload(format!(
                        "expected subscription object, got {other:?}"
                    )))
                }
            },
            EventType::InvoicePaymentSucceeded | EventType::InvoicePaid => {
                match event.data.object {
                    EventObject::Invoice(invoice) => BillingEvent::InvoicePaymentSucceeded {
                        customer_id: invoice.customer.as_ref().map(|c| c.id().to_string()),
                    },
                    other => {
                        return Err(BillingError::InvalidPayload(format!(
                            "expected invoice object, got {other:?}"
                        )))
                    }
                }
            }
            EventType::InvoicePaymentFailed => match event.data.object {
                EventObject::Invoice(invoice) => BillingEvent::InvoicePaymentFailed {
                    customer_id: invoice.customer.as_ref().map(|c| c.id().to_string()),
                },
                other => {
                    return Err(BillingError::InvalidPayload(format!(
                        "expected invoice object, got {other:?}"
                    )))
                }
            },
            other => BillingEvent::Ignored {
                event_type: format!("{other:?}"),
            },
        };

        Ok(billing_event)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription> {
        let id: SubscriptionId = subscription_id
            .parse()
            .map_err(|_| BillingError::InvalidPayload("invalid subscription ID".to_string()))?;

        let subscription = Subscription::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| BillingError::ProviderApi(e.to_string()))?;

        Ok(Self::convert_subscription(subscription))
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<ProviderInvoice> {
        let id: InvoiceId = invoice_id
            .parse()
            .map_err(|_| BillingError::InvalidPayload("invalid invoice ID".to_string()))?;

        let invoice = Invoice::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| BillingError::ProviderApi(e.to_string()))?;

        Ok(ProviderInvoice {
            period_end: invoice.period_end.and_then(timestamp_to_datetime),
        })
    }

    async fn create_checkout_session(
        &self,
        tenant: TenantId,
        email: &str,
        existing_customer_id: Option<&str>,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String> {
        let reference = tenant.to_string();

        let mut params = CreateCheckoutSession {
            cancel_url: Some(cancel_url),
            success_url: Some(success_url),
            client_reference_id: Some(&reference),
            line_items: Some(vec![CreateCheckoutSessionLineItems {
                price: Some(price_id.to_string()),
                quantity: Some(1),
                ..Default::default()
            }]),
            mode: Some(CheckoutSessionMode::Subscription),
            ..Default::default()
        };

        // Reuse the provider customer when we already have one so the
        // tenant's billing history stays on a single customer object.
        if let Some(existing) = existing_customer_id {
            params.customer = Some(existing.parse().map_err(|_| {
                BillingError::InvalidPayload("invalid stored customer ID".to_string())
            })?);
        } else {
            params.customer_email = Some(email);
        }

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| BillingError::ProviderApi(e.to_string()))?;

        tracing::info!(session_id = %session.id, tenant = %tenant, "created checkout session");

        session
            .url
            .ok_or_else(|| BillingError::ProviderApi("checkout session missing URL".to_string()))
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        let customer = customer_id
            .parse()
            .map_err(|_| BillingError::InvalidPayload("invalid customer ID".to_string()))?;

        let mut params = CreateBillingPortalSession::new(customer);
        params.return_url = Some(return_url);

        let session = BillingPortalSession::create(&self.client, params)
            .await
            .map_err(|e| BillingError::ProviderApi(e.to_string()))?;

        Ok(session.url)
    }

    async fn change_subscription_price(&self, subscription_id: &str, price_id: &str) -> Result<()> {
        let id: SubscriptionId = subscription_id
            .parse()
            .map_err(|_| BillingError::InvalidPayload("invalid subscription ID".to_string()))?;

        let current = Subscription::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| BillingError::ProviderApi(e.to_string()))?;

        let item_id = current
            .items
            .data
            .first()
            .map(|item| item.id.to_string())
            .ok_or_else(|| {
                BillingError::ProviderApi("subscription has no items to update".to_string())
            })?;

        let params = UpdateSubscription {
            items: Some(vec![UpdateSubscriptionItems {
                id: Some(item_id),
                price: Some(price_id.to_string()),
                ..Default::default()
            }]),
            proration_behavior: Some(
                stripe::generated::billing::subscription::SubscriptionProrationBehavior::CreateProrations,
            ),
            ..Default::default()
        };

        Subscription::update(&self.client, &id, params)
            .await
            .map_err(|e| BillingError::ProviderApi(e.to_string()))?;

        Ok(())
    }
}
