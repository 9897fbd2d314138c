//! SMS delivery: carrier abstraction, credential resolution and error
//! classification.
//!
//! The carrier is abstracted behind [`SmsCarrier`] so the dispatch pipeline
//! and the manual test-send endpoint can run against a test double. Carrier
//! failures are classified into a small set of tenant-actionable categories:
//! a tenant staring at "send failed" can't fix anything, one told their
//! auth token is wrong can.

use async_trait::async_trait;
use thiserror::Error;

pub mod gateway;
pub mod twilio;

pub use gateway::{SmsDelivery, SmsGateway};

/// Carrier account credentials resolved for a single send.
#[derive(Debug, Clone)]
pub struct CarrierCredentials {
    pub account_id: String,
    pub auth_token: String,
}

/// The effective sender identity for a tenant: either credentials the
/// tenant brought themselves, or the platform account used on managed-SMS
/// plans. A closed variant keeps the branch exhaustive.
#[derive(Debug, Clone)]
pub enum SenderCredentials {
    Own {
        account_id: String,
        auth_token: String,
        from_number: String,
    },
    Managed,
}

/// A successfully submitted carrier message.
#[derive(Debug, Clone)]
pub struct CarrierMessage {
    /// Carrier-assigned message identifier
    pub id: String,
}

/// Raw failure from the carrier API, before classification.
#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("carrier API error (status {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<u32>,
        message: String,
    },
    #[error("carrier transport error: {0}")]
    Transport(String),
}

/// A classified SMS send failure. Never propagates a raw carrier error past
/// the gateway boundary.
#[derive(Debug, Error)]
pub enum SmsSendError {
    /// Missing sender number or credentials; fails fast, no carrier call
    #[error("SMS not configured: {reason}")]
    NotConfigured { reason: String },

    #[error("carrier rejected credentials: {detail}")]
    AuthenticationFailed { detail: String },

    #[error("carrier rejected sender number: {detail}")]
    InvalidSender { detail: String },

    #[error("carrier trial account restriction: {detail}")]
    TrialRestriction { detail: String },

    #[error("carrier send failed: {detail}")]
    Carrier { detail: String },
}

impl SmsSendError {
    /// Human-actionable message shown to the tenant.
    pub fn user_message(&self) -> String {
        match self {
            SmsSendError::NotConfigured { reason } => {
                format!("SMS is not set up yet: {reason}")
            }
            SmsSendError::AuthenticationFailed { .. } => {
                "The SMS provider rejected your account credentials. Check the account ID and \
                 auth token in Settings."
                    .to_string()
            }
            SmsSendError::InvalidSender { .. } => {
                "The SMS provider rejected your sender number. Check that the number in Settings \
                 belongs to your provider account."
                    .to_string()
            }
            SmsSendError::TrialRestriction { .. } => {
                "Your SMS provider account is a trial account and can only message verified \
                 numbers. Upgrade the provider account or verify the destination number."
                    .to_string()
            }
            SmsSendError::Carrier { detail } => {
                format!("The SMS could not be delivered: {detail}")
            }
        }
    }
}

/// Twilio error codes that indicate bad account credentials.
const CODE_AUTH_FAILED: u32 = 20003;
/// Twilio error codes for an unusable From number.
const CODES_INVALID_SENDER: [u32; 3] = [21212, 21603, 21606];
/// Twilio error codes for trial-account restrictions.
const CODES_TRIAL_RESTRICTION: [u32; 2] = [21219, 21608];

/// Map a raw carrier failure to an actionable category.
pub fn classify_carrier_error(err: CarrierError) -> SmsSendError {
    match err {
        CarrierError::Api { status, code, message } => {
            let detail = format!("status {status}, code {code:?}: {message}");
            match code {
                Some(CODE_AUTH_FAILED) => SmsSendError::AuthenticationFailed { detail },
                Some(c) if CODES_INVALID_SENDER.contains(&c) => {
                    SmsSendError::InvalidSender { detail }
                }
                Some(c) if CODES_TRIAL_RESTRICTION.contains(&c) => {
                    SmsSendError::TrialRestriction { detail }
                }
                _ if status == 401 => SmsSendError::AuthenticationFailed { detail },
                _ => SmsSendError::Carrier { detail },
            }
        }
        CarrierError::Transport(detail) => SmsSendError::Carrier { detail },
    }
}

/// Abstract SMS carrier interface.
#[async_trait]
pub trait SmsCarrier: Send + Sync {
    /// Submit one message. Returns the carrier-assigned id on success.
    async fn send(
        &self,
        credentials: &CarrierCredentials,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<CarrierMessage, CarrierError>;
}
