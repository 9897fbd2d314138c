//! Twilio carrier client.

use super::{CarrierCredentials, CarrierError, CarrierMessage, SmsCarrier};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio REST API client for outbound SMS.
pub struct TwilioCarrier {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    code: Option<u32>,
    message: Option<String>,
}

impl TwilioCarrier {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_base: TWILIO_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API base. Used by tests against a
    /// local stub server.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl SmsCarrier for TwilioCarrier {
    async fn send(
        &self,
        credentials: &CarrierCredentials,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<CarrierMessage, CarrierError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, credentials.account_id
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&credentials.account_id, Some(&credentials.auth_token))
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await
            .map_err(|e| CarrierError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let message: TwilioMessageResponse = response
                .json()
                .await
                .map_err(|e| CarrierError::Transport(format!("invalid carrier response: {e}")))?;
            return Ok(CarrierMessage { id: message.sid });
        }

        // Twilio error bodies carry a numeric error code distinct from the
        // HTTP status; classification keys off it.
        let parsed: Option<TwilioErrorResponse> = response.json().await.ok();
        let (code, message) = match parsed {
            Some(err) => (
                err.code,
                err.message.unwrap_or_else(|| "unknown carrier error".to_string()),
            ),
            None => (None, "unknown carrier error".to_string()),
        };

        Err(CarrierError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}
