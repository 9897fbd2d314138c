//! Billing handlers: subscription state, checkout, portal, plan changes.

use crate::{
    api::models::{
        billing::{
            ChangePlanRequest, ChangePlanResponse, CheckoutRequest, RedirectResponse,
            SubscriptionResponse,
        },
        users::CurrentUser,
    },
    billing::{BillingProvider, PlanCatalog},
    db::{
        errors::DbError,
        handlers::{Subscriptions, Users},
    },
    errors::{Error, Result},
    policy::PlanTier,
    AppState,
};
use axum::{extract::State, Json};
use std::sync::Arc;

fn provider_and_catalog(state: &AppState) -> Result<(&Arc<dyn BillingProvider>, &PlanCatalog)> {
    match (state.billing.as_ref(), state.catalog.as_ref()) {
        (Some(provider), Some(catalog)) => Ok((provider, catalog)),
        _ => Err(Error::Billing {
            message: "No payment provider is configured".to_string(),
        }),
    }
}

fn paid_price<'a>(catalog: &'a PlanCatalog, tier: PlanTier) -> Result<&'a str> {
    catalog.price_for_tier(tier).ok_or_else(|| Error::BadRequest {
        message: "The free plan has nothing to check out; pick starter or pro".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/subscription",
    tag = "billing",
    responses((status = 200, description = "The tenant's subscription", body = SubscriptionResponse))
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn get_subscription(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SubscriptionResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let subscription = Subscriptions::new(&mut conn).get_or_create(user.id).await?;
    Ok(Json(subscription.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/checkout",
    tag = "billing",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Hosted checkout URL", body = RedirectResponse),
        (status = 400, description = "Free tier requested"),
        (status = 502, description = "Payment provider unavailable or not configured"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn create_checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<RedirectResponse>> {
    let (provider, catalog) = provider_and_catalog(&state)?;
    let price_id = paid_price(catalog, request.tier)?;

    let existing_customer_id = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        Users::new(&mut conn)
            .get_by_id(user.id)
            .await?
            .and_then(|u| u.payment_provider_id)
    };

    let success_url = format!("{}/billing?checkout=success", state.config.dashboard_url);
    let cancel_url = format!("{}/billing?checkout=cancelled", state.config.dashboard_url);

    let url = provider
        .create_checkout_session(
            user.id,
            &user.email,
            existing_customer_id.as_deref(),
            price_id,
            &success_url,
            &cancel_url,
        )
        .await
        .map_err(|e| Error::Billing {
            message: e.to_string(),
        })?;

    Ok(Json(RedirectResponse { url }))
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/portal",
    tag = "billing",
    responses(
        (status = 200, description = "Billing portal URL", body = RedirectResponse),
        (status = 400, description = "Tenant has no billing account yet"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn create_portal(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<RedirectResponse>> {
    let (provider, _) = provider_and_catalog(&state)?;

    let customer_id = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let subscription = Subscriptions::new(&mut conn).get_or_create(user.id).await?;
        subscription.customer_id
    }
    .ok_or_else(|| Error::BadRequest {
        message: "No billing account yet; subscribe to a plan first".to_string(),
    })?;

    let return_url = format!("{}/billing", state.config.dashboard_url);
    let url = provider
        .create_portal_session(&customer_id, &return_url)
        .await
        .map_err(|e| Error::Billing {
            message: e.to_string(),
        })?;

    Ok(Json(RedirectResponse { url }))
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/change-plan",
    tag = "billing",
    request_body = ChangePlanRequest,
    responses(
        (status = 200, description = "Plan change submitted", body = ChangePlanResponse),
        (status = 400, description = "No active paid subscription, or free tier requested"),
    )
)]
#[tracing::instrument(skip_all, fields(tenant = %user.id))]
pub async fn change_plan(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChangePlanRequest>,
) -> Result<Json<ChangePlanResponse>> {
    let (provider, catalog) = provider_and_catalog(&state)?;
    let price_id = paid_price(catalog, request.tier)?;

    let subscription_id = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let subscription = Subscriptions::new(&mut conn).get_or_create(user.id).await?;
        subscription.subscription_id
    }
    .ok_or_else(|| Error::BadRequest {
        message: "No active paid subscription to change; use checkout instead".to_string(),
    })?;

    provider
        .change_subscription_price(&subscription_id, price_id)
        .await
        .map_err(|e| Error::Billing {
            message: e.to_string(),
        })?;

    // Local state is not written here: the provider emits a
    // subscription-updated webhook and the reconciler derives the new tier
    // from it, the same as any other transition.
    Ok(Json(ChangePlanResponse { tier: request.tier }))
}
