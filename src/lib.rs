//! # AutoRemind: SMS reminder platform for small service businesses
//!
//! AutoRemind lets garages, salons and clinics track their clients and send
//! SMS maintenance/appointment reminders. Each signed-up business is a
//! tenant and the hard isolation boundary: client records, settings and
//! billing state are always scoped by tenant id.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for all persistence. There is no
//! cross-request in-memory state; handlers are stateless and every mutation
//! is a single tenant-scoped statement.
//!
//! Two pipelines carry the real invariants:
//!
//! - **Reminder dispatch** ([`reminders`]): a scheduled trigger
//!   (`GET /cron/reminders`) walks every tenant, selects due-but-unsent
//!   records inside the tenant's reminder window, renders the tenant's
//!   message template and hands each message to the SMS gateway ([`sms`]).
//!   A record is only marked sent after the carrier accepted the message,
//!   via a conditional update, and failures are isolated per record.
//! - **Subscription reconciliation** ([`billing`]): payment provider
//!   webhooks (`POST /webhooks/payments`) drive a small state machine that
//!   maps provider price ids to plan tiers, syncs the local subscription
//!   row from the latest external object and maintains the managed-SMS
//!   entitlement flag. Plan rules themselves live in [`policy`].
//!
//! The supporting surface (authentication, client record CRUD, bulk
//! import/export, settings, checkout/portal endpoints) lives under [`api`].

pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
mod openapi;
pub mod phone;
pub mod policy;
pub mod reminders;
pub mod sms;
pub mod telemetry;
pub mod template;
pub mod types;

use crate::billing::{stripe::StripeBilling, BillingProvider, PlanCatalog};
use crate::crypto::CredentialCodec;
use crate::openapi::ApiDoc;
use crate::sms::{twilio::TwilioCarrier, SmsCarrier};
use axum::{
    routing::{get, post},
    Json, Router,
};
pub use config::Config;
use config::PaymentConfig;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, instrument, Level};
use utoipa::OpenApi;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub codec: CredentialCodec,
    pub carrier: Arc<dyn SmsCarrier>,
    pub billing: Option<Arc<dyn BillingProvider>>,
    pub catalog: Option<PlanCatalog>,
}

impl AppState {
    /// Build the production state: Twilio as the carrier and Stripe as the
    /// payment provider when configured.
    pub fn new(db: PgPool, config: Config) -> Self {
        let (billing, catalog) = match &config.payment {
            Some(PaymentConfig::Stripe(stripe_config)) => (
                Some(Arc::new(StripeBilling::new(
                    &stripe_config.api_key,
                    &stripe_config.webhook_secret,
                )) as Arc<dyn BillingProvider>),
                Some(PlanCatalog::from_stripe_config(stripe_config)),
            ),
            None => (None, None),
        };

        let carrier: Arc<dyn SmsCarrier> = Arc::new(TwilioCarrier::new(config.sms.request_timeout));

        Self::with_components(db, config, carrier, billing, catalog)
    }

    /// Assemble state from explicit components. Tests use this to swap the
    /// carrier and billing provider for doubles.
    pub fn with_components(
        db: PgPool,
        config: Config,
        carrier: Arc<dyn SmsCarrier>,
        billing: Option<Arc<dyn BillingProvider>>,
        catalog: Option<PlanCatalog>,
    ) -> Self {
        let codec = CredentialCodec::new(&config.secret_key);
        Self {
            db,
            config,
            codec,
            carrier,
            billing,
            catalog,
        }
    }
}

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the application router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    use api::handlers::{auth, billing, cron, records, settings, webhooks};

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        // Authentication
        .route("/authentication/register", post(auth::register))
        .route("/authentication/login", post(auth::login))
        .route("/authentication/logout", post(auth::logout))
        .route("/authentication/me", get(auth::me))
        .route("/authentication/account", axum::routing::delete(auth::delete_account))
        // Client records
        .route(
            "/api/v1/records",
            get(records::list_records)
                .post(records::create_record)
                .delete(records::delete_records),
        )
        .route("/api/v1/records/import", post(records::import_records))
        .route("/api/v1/records/export", get(records::export_records))
        .route(
            "/api/v1/records/{id}",
            get(records::get_record)
                .patch(records::update_record)
                .delete(records::delete_record),
        )
        .route("/api/v1/records/{id}/send", post(records::send_record_now))
        // Settings
        .route(
            "/api/v1/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/api/v1/settings/test-sms", post(settings::test_sms))
        // Billing
        .route("/api/v1/billing/subscription", get(billing::get_subscription))
        .route("/api/v1/billing/checkout", post(billing::create_checkout))
        .route("/api/v1/billing/portal", post(billing::create_portal))
        .route("/api/v1/billing/change-plan", post(billing::change_plan))
        // External triggers
        .route("/webhooks/payments", post(webhooks::payments_webhook))
        .route("/cron/reminders", get(cron::run_reminders))
        .with_state(state);

    router
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct owning resources and lifecycle.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Connect to the database, run migrations and build the router.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = PgPool::connect(&config.database_url).await?;
        migrator().run(&pool).await?;

        config.log_posture_warnings();

        let state = AppState::new(pool.clone(), config.clone());
        let router = build_router(state);

        Ok(Self {
            router,
            config,
            pool,
        })
    }

    /// Start serving until the shutdown future resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("AutoRemind listening on http://{bind_addr}");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
