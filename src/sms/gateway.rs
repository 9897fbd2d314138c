//! SMS dispatch gateway: resolves per-tenant sender credentials, invokes
//! the carrier and classifies failures.

use super::{
    classify_carrier_error, CarrierCredentials, SenderCredentials, SmsCarrier, SmsSendError,
};
use crate::config::ManagedSmsConfig;
use crate::crypto::CredentialCodec;
use crate::db::models::settings::TenantSettingsDBResponse;
use crate::types::TenantId;

/// A completed SMS delivery.
#[derive(Debug, Clone)]
pub struct SmsDelivery {
    /// Carrier-assigned message identifier
    pub message_id: String,
}

/// Per-send gateway over a carrier. Cheap to construct; holds borrowed
/// process-wide pieces (carrier client, platform credentials, codec).
pub struct SmsGateway<'a> {
    carrier: &'a dyn SmsCarrier,
    managed: Option<&'a ManagedSmsConfig>,
    codec: &'a CredentialCodec,
}

impl<'a> SmsGateway<'a> {
    pub fn new(
        carrier: &'a dyn SmsCarrier,
        managed: Option<&'a ManagedSmsConfig>,
        codec: &'a CredentialCodec,
    ) -> Self {
        Self {
            carrier,
            managed,
            codec,
        }
    }

    /// Determine the effective sender identity for a tenant from their
    /// settings. Managed-SMS tenants use the platform account; everyone
    /// else brings their own credentials, with the auth secret decrypted
    /// here and nowhere else.
    pub fn resolve_credentials(
        &self,
        settings: &TenantSettingsDBResponse,
    ) -> Result<SenderCredentials, SmsSendError> {
        if settings.managed_sms {
            return Ok(SenderCredentials::Managed);
        }

        let account_id = settings
            .sms_account_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SmsSendError::NotConfigured {
                reason: "missing SMS account ID".to_string(),
            })?;
        let stored_secret = settings
            .sms_auth_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SmsSendError::NotConfigured {
                reason: "missing SMS auth token".to_string(),
            })?;
        let from_number = settings
            .sms_from_number
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SmsSendError::NotConfigured {
                reason: "missing SMS sender number".to_string(),
            })?;

        Ok(SenderCredentials::Own {
            account_id: account_id.to_string(),
            auth_token: self.codec.decrypt(stored_secret),
            from_number: from_number.to_string(),
        })
    }

    /// Send one message for a tenant. Fails fast on configuration gaps,
    /// classifies carrier failures, and never panics or leaks a raw carrier
    /// error.
    #[tracing::instrument(skip(self, settings, body), fields(tenant = %tenant))]
    pub async fn send(
        &self,
        tenant: TenantId,
        settings: &TenantSettingsDBResponse,
        to: &str,
        body: &str,
    ) -> Result<SmsDelivery, SmsSendError> {
        if to.is_empty() {
            return Err(SmsSendError::NotConfigured {
                reason: "destination phone number is empty".to_string(),
            });
        }

        let (credentials, from_number) = match self.resolve_credentials(settings)? {
            SenderCredentials::Own {
                account_id,
                auth_token,
                from_number,
            } => (
                CarrierCredentials {
                    account_id,
                    auth_token,
                },
                from_number,
            ),
            SenderCredentials::Managed => {
                let managed = self.managed.ok_or_else(|| SmsSendError::NotConfigured {
                    reason: "managed SMS is enabled but the platform carrier account is not \
                             configured"
                        .to_string(),
                })?;
                (
                    CarrierCredentials {
                        account_id: managed.account_id.clone(),
                        auth_token: managed.auth_token.clone(),
                    },
                    managed.from_number.clone(),
                )
            }
        };

        match self.carrier.send(&credentials, &from_number, to, body).await {
            Ok(message) => {
                tracing::debug!(message_id = %message.id, "carrier accepted message");
                Ok(SmsDelivery {
                    message_id: message.id,
                })
            }
            Err(err) => {
                let classified = classify_carrier_error(err);
                tracing::warn!(error = %classified, "carrier send failed");
                Err(classified)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sms::{CarrierError, CarrierMessage};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct RecordingCarrier {
        sends: Mutex<Vec<(String, String, String)>>,
        fail_with: Option<fn() -> CarrierError>,
    }

    impl RecordingCarrier {
        fn ok() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }

        fn failing(f: fn() -> CarrierError) -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                fail_with: Some(f),
            }
        }
    }

    #[async_trait]
    impl SmsCarrier for RecordingCarrier {
        async fn send(
            &self,
            _credentials: &CarrierCredentials,
            from: &str,
            to: &str,
            body: &str,
        ) -> Result<CarrierMessage, CarrierError> {
            self.sends
                .lock()
                .unwrap()
                .push((from.to_string(), to.to_string(), body.to_string()));
            match self.fail_with {
                Some(f) => Err(f()),
                None => Ok(CarrierMessage { id: "SM123".into() }),
            }
        }
    }

    fn settings(managed: bool) -> TenantSettingsDBResponse {
        TenantSettingsDBResponse {
            id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::new_v4(),
            sms_account_id: Some("AC123".into()),
            sms_auth_secret: Some("token-plaintext".into()),
            sms_from_number: Some("+351210000000".into()),
            business_name: Some("Oficina Silva".into()),
            business_contact: Some("21 123 4567".into()),
            reminder_lead_days: 7,
            message_template: "Hi {client_name}".into(),
            managed_sms: managed,
            updated_at: Utc::now(),
        }
    }

    fn managed_config() -> ManagedSmsConfig {
        ManagedSmsConfig {
            account_id: "AC-platform".into(),
            auth_token: "platform-token".into(),
            from_number: "+351219999999".into(),
        }
    }

    #[tokio::test]
    async fn own_credentials_send_succeeds() {
        let carrier = RecordingCarrier::ok();
        let codec = CredentialCodec::new("secret");
        let gateway = SmsGateway::new(&carrier, None, &codec);

        let delivery = gateway
            .send(uuid::Uuid::new_v4(), &settings(false), "+351912345678", "hello")
            .await
            .unwrap();
        assert_eq!(delivery.message_id, "SM123");

        let sends = carrier.sends.lock().unwrap();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, "+351210000000");
    }

    #[tokio::test]
    async fn stored_secret_is_decrypted_before_use() {
        let codec = CredentialCodec::new("secret");
        let mut s = settings(false);
        s.sms_auth_secret = Some(codec.encrypt("real-token"));

        let carrier = RecordingCarrier::ok();
        let gateway = SmsGateway::new(&carrier, None, &codec);

        match gateway.resolve_credentials(&s).unwrap() {
            SenderCredentials::Own { auth_token, .. } => assert_eq!(auth_token, "real-token"),
            SenderCredentials::Managed => panic!("expected own credentials"),
        }
    }

    #[tokio::test]
    async fn managed_tenant_uses_platform_account() {
        let carrier = RecordingCarrier::ok();
        let codec = CredentialCodec::new("secret");
        let managed = managed_config();
        let gateway = SmsGateway::new(&carrier, Some(&managed), &codec);

        gateway
            .send(uuid::Uuid::new_v4(), &settings(true), "+351912345678", "hello")
            .await
            .unwrap();

        let sends = carrier.sends.lock().unwrap();
        assert_eq!(sends[0].0, "+351219999999");
    }

    #[tokio::test]
    async fn managed_without_platform_config_fails_fast() {
        let carrier = RecordingCarrier::ok();
        let codec = CredentialCodec::new("secret");
        let gateway = SmsGateway::new(&carrier, None, &codec);

        let err = gateway
            .send(uuid::Uuid::new_v4(), &settings(true), "+351912345678", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, SmsSendError::NotConfigured { .. }));
        assert!(carrier.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_sender_number_fails_fast() {
        let carrier = RecordingCarrier::ok();
        let codec = CredentialCodec::new("secret");
        let gateway = SmsGateway::new(&carrier, None, &codec);

        let mut s = settings(false);
        s.sms_from_number = None;
        let err = gateway
            .send(uuid::Uuid::new_v4(), &s, "+351912345678", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, SmsSendError::NotConfigured { .. }));
        assert!(carrier.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn carrier_failure_is_classified() {
        let carrier = RecordingCarrier::failing(|| CarrierError::Api {
            status: 401,
            code: Some(20003),
            message: "Authenticate".into(),
        });
        let codec = CredentialCodec::new("secret");
        let gateway = SmsGateway::new(&carrier, None, &codec);

        let err = gateway
            .send(uuid::Uuid::new_v4(), &settings(false), "+351912345678", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, SmsSendError::AuthenticationFailed { .. }));
    }
}
