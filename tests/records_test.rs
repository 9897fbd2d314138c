//! Client record repository behavior: sent-flag semantics and tenant
//! isolation.

use autoremind::db::handlers::{ClientRecords, Users};
use autoremind::db::models::client_records::{
    ClientRecordCreateDBRequest, ClientRecordUpdateDBRequest,
};
use autoremind::db::models::users::UserCreateDBRequest;
use autoremind::types::TenantId;
use chrono::NaiveDate;
use sqlx::PgPool;

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

fn record_request(name: &str, date: NaiveDate) -> ClientRecordCreateDBRequest {
    ClientRecordCreateDBRequest {
        name: name.to_string(),
        phone: "+351912345678".to_string(),
        resource: "Fiat Punto".to_string(),
        reminder_date: date,
    }
}

#[sqlx::test]
async fn changing_reminder_date_resets_sent_flag(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let mut records = ClientRecords::new(&mut conn);

    let record = records.create(tenant, &record_request("Ana", date)).await.unwrap();
    assert!(!record.reminder_sent);

    // Simulate a completed send.
    assert!(records.mark_sent_if_unsent(tenant, record.id).await.unwrap());

    // Rescheduling resets the flag: a new date is a new obligation.
    let updated = records
        .update(
            tenant,
            record.id,
            &ClientRecordUpdateDBRequest {
                reminder_date: Some(NaiveDate::from_ymd_opt(2025, 4, 10).unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert!(!updated.reminder_sent);
}

#[sqlx::test]
async fn updating_with_same_date_keeps_sent_flag(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let mut records = ClientRecords::new(&mut conn);

    let record = records.create(tenant, &record_request("Ana", date)).await.unwrap();
    records.mark_sent_if_unsent(tenant, record.id).await.unwrap();

    let updated = records
        .update(
            tenant,
            record.id,
            &ClientRecordUpdateDBRequest {
                name: Some("Ana Maria".to_string()),
                reminder_date: Some(date),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert!(updated.reminder_sent, "same date must not reset the flag");
    assert_eq!(updated.name, "Ana Maria");
}

#[sqlx::test]
async fn mark_sent_is_conditional(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let mut records = ClientRecords::new(&mut conn);
    let record = records.create(tenant, &record_request("Ana", date)).await.unwrap();

    // First marker wins, second observes it lost the race.
    assert!(records.mark_sent_if_unsent(tenant, record.id).await.unwrap());
    assert!(!records.mark_sent_if_unsent(tenant, record.id).await.unwrap());
}

#[sqlx::test]
async fn records_are_tenant_scoped(pool: PgPool) {
    let tenant_a = create_tenant(&pool, "a@example.com").await;
    let tenant_b = create_tenant(&pool, "b@example.com").await;
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let mut records = ClientRecords::new(&mut conn);

    let record_a = records.create(tenant_a, &record_request("Ana", date)).await.unwrap();
    let record_b = records.create(tenant_b, &record_request("Bruno", date)).await.unwrap();

    // Reads are scoped.
    assert!(records.get(tenant_b, record_a.id).await.unwrap().is_none());
    let listed_b: Vec<_> = records.list(tenant_b).await.unwrap();
    assert_eq!(listed_b.len(), 1);
    assert_eq!(listed_b[0].id, record_b.id);

    // Mutations are scoped: tenant B cannot delete or mark A's record.
    assert!(!records.delete(tenant_b, record_a.id).await.unwrap());
    assert!(!records.mark_sent_if_unsent(tenant_b, record_a.id).await.unwrap());
    assert!(records.get(tenant_a, record_a.id).await.unwrap().is_some());

    // Scanner never crosses tenants either.
    let due_b = records.due_for_reminder(tenant_b, date).await.unwrap();
    assert_eq!(due_b.len(), 1);
    assert_eq!(due_b[0].id, record_b.id);
}

#[sqlx::test]
async fn bulk_insert_and_delete(pool: PgPool) {
    let tenant = create_tenant(&pool, "garage@example.com").await;
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let mut records = ClientRecords::new(&mut conn);

    let batch: Vec<_> = (0..5)
        .map(|i| record_request(&format!("Client {i}"), date))
        .collect();
    let inserted = records.insert_many(tenant, &batch).await.unwrap();
    assert_eq!(inserted.len(), 5);
    assert_eq!(records.count(tenant).await.unwrap(), 5);

    let ids: Vec<_> = inserted.iter().take(3).map(|r| r.id).collect();
    assert_eq!(records.delete_many(tenant, &ids).await.unwrap(), 3);
    assert_eq!(records.count(tenant).await.unwrap(), 2);
}
