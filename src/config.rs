//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` and can be set via
//! `-f` or `AUTOREMIND_CONFIG`. Environment variables prefixed with
//! `AUTOREMIND_` override YAML values; nested fields use double underscores
//! (`AUTOREMIND_SMS__MANAGED__AUTH_TOKEN=...`). `DATABASE_URL` is a special
//! case that overrides `database_url` when set.
//!
//! Everything process-wide (the encryption secret, payment provider keys,
//! platform SMS credentials, the cron shared secret) lives here and is
//! constructed once at startup. No module reads ambient environment state.

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Simple CLI args - just for specifying the config file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "AUTOREMIND_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base URL where the dashboard is accessible. Used for checkout and
    /// billing portal redirect URLs.
    pub dashboard_url: String,
    /// PostgreSQL connection string (DATABASE_URL overrides this)
    pub database_url: String,
    /// Secret used for session token signing and for deriving the
    /// credential encryption key. Set this in production.
    pub secret_key: String,
    /// Shared secret for the scheduled reminder endpoint. When unset, the
    /// endpoint runs in open mode and a warning is logged at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_secret: Option<String>,
    /// Session cookie configuration
    pub session: SessionConfig,
    /// SMS carrier configuration
    pub sms: SmsConfig,
    /// Payment provider configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentConfig>,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Session timeout duration
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for the session token
    pub cookie_name: String,
    /// Set the Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(24 * 60 * 60),
            cookie_name: "autoremind_session".to_string(),
            cookie_secure: true,
        }
    }
}

/// SMS carrier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmsConfig {
    /// Platform-owned carrier credentials used for tenants on managed-SMS
    /// plans. Tenants on the free tier bring their own credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed: Option<ManagedSmsConfig>,
    /// Timeout for carrier API calls
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            managed: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Platform carrier account used for managed-SMS tenants.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagedSmsConfig {
    /// Carrier account identifier
    pub account_id: String,
    /// Carrier auth token
    pub auth_token: String,
    /// Sender number used for managed tenants (E.164)
    pub from_number: String,
}

/// Payment provider configuration.
///
/// Credentials should be set via environment variables:
/// - `AUTOREMIND_PAYMENT__STRIPE__API_KEY`
/// - `AUTOREMIND_PAYMENT__STRIPE__WEBHOOK_SECRET`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentConfig {
    Stripe(StripeConfig),
}

/// Stripe payment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeConfig {
    /// Stripe API key (secret key starting with sk_)
    pub api_key: String,
    /// Stripe webhook signing secret (starts with whsec_)
    pub webhook_secret: String,
    /// Price ID for the starter plan (starts with price_)
    pub starter_price_id: String,
    /// Price ID for the pro plan
    pub pro_price_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            dashboard_url: "http://localhost:5173".to_string(),
            database_url: "postgres://localhost:5432/autoremind".to_string(),
            secret_key: "dev-secret-change-me".to_string(),
            cron_secret: None,
            session: SessionConfig::default(),
            sms: SmsConfig::default(),
            payment: None,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("AUTOREMIND_").split("__"))
            .extract()?;

        // DATABASE_URL wins over the config file when set.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.database_url = url;
            }
        }

        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(PaymentConfig::Stripe(stripe)) = &self.payment {
            if stripe.api_key.is_empty() || stripe.webhook_secret.is_empty() {
                return Err("payment.stripe requires api_key and webhook_secret".to_string());
            }
            if stripe.starter_price_id.is_empty() || stripe.pro_price_id.is_empty() {
                return Err("payment.stripe requires starter_price_id and pro_price_id".to_string());
            }
        }
        if let Some(managed) = &self.sms.managed {
            if managed.account_id.is_empty() || managed.auth_token.is_empty() || managed.from_number.is_empty() {
                return Err("sms.managed requires account_id, auth_token and from_number".to_string());
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Emit startup warnings for configurations that are valid but weaker
    /// than what production should run with.
    pub fn log_posture_warnings(&self) {
        if self.secret_key == Config::default().secret_key {
            tracing::warn!("secret_key is the development default; set a real secret in production");
        }
        match &self.cron_secret {
            Some(_) => {}
            None => tracing::warn!(
                "cron_secret is not configured: /cron/reminders will accept unauthenticated \
                 triggers (open mode)"
            ),
        }
    }
}
