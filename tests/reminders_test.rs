//! Reminder pipeline: window selection and end-to-end dispatch.

use async_trait::async_trait;
use autoremind::config::ManagedSmsConfig;
use autoremind::crypto::CredentialCodec;
use autoremind::db::handlers::{ClientRecords, Settings, Users};
use autoremind::db::models::client_records::ClientRecordCreateDBRequest;
use autoremind::db::models::settings::SettingsUpsertDBRequest;
use autoremind::db::models::users::UserCreateDBRequest;
use autoremind::reminders::{self, reminder_window};
use autoremind::sms::{CarrierCredentials, CarrierError, CarrierMessage, SmsCarrier};
use autoremind::types::TenantId;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::sync::Mutex;

struct FakeCarrier {
    sends: Mutex<Vec<(String, String)>>,
    fail_for: Option<String>,
}

impl FakeCarrier {
    fn ok() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            fail_for: None,
        }
    }

    /// Fails every send to the given destination number.
    fn failing_for(phone: &str) -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            fail_for: Some(phone.to_string()),
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsCarrier for FakeCarrier {
    async fn send(
        &self,
        _credentials: &CarrierCredentials,
        _from: &str,
        to: &str,
        body: &str,
    ) -> Result<CarrierMessage, CarrierError> {
        if self.fail_for.as_deref() == Some(to) {
            return Err(CarrierError::Api {
                status: 400,
                code: Some(21608),
                message: "unverified number".to_string(),
            });
        }
        self.sends.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(CarrierMessage {
            id: format!("SM{}", self.sends.lock().unwrap().len()),
        })
    }
}

async fn create_tenant_with_settings(pool: &PgPool, email: &str, lead_days: i32) -> TenantId {
    let mut conn = pool.acquire().await.unwrap();
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            display_name: None,
            password_hash: None,
        })
        .await
        .unwrap();

    Settings::new(&mut conn)
        .upsert(
            user.id,
            &SettingsUpsertDBRequest {
                sms_account_id: Some("AC123".to_string()),
                sms_auth_secret: Some("token".to_string()),
                sms_from_number: Some("+351210000000".to_string()),
                business_name: Some("Oficina Silva".to_string()),
                business_contact: Some("21 123 4567".to_string()),
                reminder_lead_days: lead_days,
                message_template: "Hi {client_name}, due {date}".to_string(),
            },
        )
        .await
        .unwrap();

    user.id
}

async fn add_record(pool: &PgPool, tenant: TenantId, name: &str, phone: &str, date: NaiveDate) {
    let mut conn = pool.acquire().await.unwrap();
    ClientRecords::new(&mut conn)
        .create(
            tenant,
            &ClientRecordCreateDBRequest {
                name: name.to_string(),
                phone: phone.to_string(),
                resource: "Fiat Punto".to_string(),
                reminder_date: date,
            },
        )
        .await
        .unwrap();
}

fn codec() -> CredentialCodec {
    CredentialCodec::new("test-secret")
}

#[sqlx::test]
async fn window_selection_is_inclusive_and_keeps_overdue(pool: PgPool) {
    let tenant = create_tenant_with_settings(&pool, "garage@example.com", 7).await;
    let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    // On the window edge, beyond it, long overdue, and already handled.
    add_record(&pool, tenant, "Edge", "+351911111111", NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()).await;
    add_record(&pool, tenant, "Beyond", "+351922222222", NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()).await;
    add_record(&pool, tenant, "Overdue", "+351933333333", NaiveDate::from_ymd_opt(2024, 12, 20).unwrap()).await;
    add_record(&pool, tenant, "Handled", "+351944444444", NaiveDate::from_ymd_opt(2025, 1, 3).unwrap()).await;

    let (_, window_end) = reminder_window(as_of, 7);
    let mut conn = pool.acquire().await.unwrap();
    let mut records = ClientRecords::new(&mut conn);

    // A record already marked sent never comes back, whatever its date.
    let handled = records
        .list(tenant)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name == "Handled")
        .unwrap();
    records.mark_sent_if_unsent(tenant, handled.id).await.unwrap();

    let due = records.due_for_reminder(tenant, window_end).await.unwrap();

    let names: Vec<_> = due.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Overdue", "Edge"]);
}

#[sqlx::test]
async fn dispatch_sends_renders_and_marks(pool: PgPool) {
    let tenant = create_tenant_with_settings(&pool, "garage@example.com", 7).await;
    let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    // Due in 3 days: inside the window.
    add_record(&pool, tenant, "Ana", "+351912345678", NaiveDate::from_ymd_opt(2025, 1, 4).unwrap()).await;

    let carrier = FakeCarrier::ok();
    let report = reminders::run_reminder_dispatch(&pool, &carrier, None, &codec(), as_of)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);
    assert!(report.results[0].success);

    // The gateway saw exactly one rendered message.
    let sent = carrier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+351912345678");
    assert!(sent[0].1.contains("Ana"));
    assert!(sent[0].1.contains("04/01/2025"));

    // The record is marked sent and drops out of the next run entirely.
    let report2 = reminders::run_reminder_dispatch(&pool, &carrier, None, &codec(), as_of)
        .await
        .unwrap();
    assert_eq!(report2.processed, 0);
    assert_eq!(carrier.sent().len(), 1);
}

#[sqlx::test]
async fn failed_sends_stay_unsent_and_retry(pool: PgPool) {
    let tenant = create_tenant_with_settings(&pool, "garage@example.com", 7).await;
    let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    add_record(&pool, tenant, "Ana", "+351912345678", NaiveDate::from_ymd_opt(2025, 1, 4).unwrap()).await;

    let carrier = FakeCarrier::failing_for("+351912345678");
    let report = reminders::run_reminder_dispatch(&pool, &carrier, None, &codec(), as_of)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.results[0].success);
    let error = report.results[0].error.as_deref().unwrap();
    assert!(error.contains("trial"), "classified reason expected, got: {error}");

    // Still unsent, so the next run picks it up again.
    let report2 = reminders::run_reminder_dispatch(&pool, &carrier, None, &codec(), as_of)
        .await
        .unwrap();
    assert_eq!(report2.processed, 1);
}

#[sqlx::test]
async fn one_tenants_failure_does_not_affect_another(pool: PgPool) {
    let broken = create_tenant_with_settings(&pool, "broken@example.com", 7).await;
    let healthy = create_tenant_with_settings(&pool, "healthy@example.com", 7).await;
    let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    // The broken tenant's settings lose their credentials.
    {
        let mut conn = pool.acquire().await.unwrap();
        Settings::new(&mut conn)
            .upsert(
                broken,
                &SettingsUpsertDBRequest {
                    sms_account_id: None,
                    sms_auth_secret: None,
                    sms_from_number: None,
                    business_name: None,
                    business_contact: None,
                    reminder_lead_days: 7,
                    message_template: "Hi {client_name}".to_string(),
                },
            )
            .await
            .unwrap();
    }

    add_record(&pool, broken, "Ana", "+351911111111", NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()).await;
    add_record(&pool, healthy, "Bruno", "+351922222222", NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()).await;

    let carrier = FakeCarrier::ok();
    let report = reminders::run_reminder_dispatch(&pool, &carrier, None, &codec(), as_of)
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);

    let sent = carrier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+351922222222");
}

#[sqlx::test]
async fn managed_tenant_sends_from_platform_number(pool: PgPool) {
    let tenant = create_tenant_with_settings(&pool, "garage@example.com", 7).await;
    let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    {
        let mut conn = pool.acquire().await.unwrap();
        Settings::new(&mut conn).set_managed_sms(tenant, true, false).await.unwrap();
    }

    add_record(&pool, tenant, "Ana", "+351912345678", NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()).await;

    let managed = ManagedSmsConfig {
        account_id: "AC-platform".to_string(),
        auth_token: "platform-token".to_string(),
        from_number: "+351219999999".to_string(),
    };

    let carrier = FakeCarrier::ok();
    let report = reminders::run_reminder_dispatch(&pool, &carrier, Some(&managed), &codec(), as_of)
        .await
        .unwrap();

    assert_eq!(report.sent, 1);
}
