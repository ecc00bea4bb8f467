//! Integration tests for background jobs.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, Utc};
use sqlx::SqlitePool;

use campusfin::config::JobsConfig;
use campusfin::jobs::{run_enrollment_expiry_sweep, JobScheduler};
use campusfin::server::database::Database;

/// Helper to create a test database with the enrollment table.
async fn setup_test_db() -> Arc<Database> {
    std::env::set_var("CAMPUSFIN_DATABASE_TYPE", "sqlite");
    std::env::set_var("CAMPUSFIN_DATABASE_URL", "sqlite::memory:");

    let db = Database::new().await.expect("failed to create database");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollment (
            enrollment_id TEXT PRIMARY KEY,
            student TEXT NOT NULL,
            batch TEXT NOT NULL,
            status BOOLEAN NOT NULL DEFAULT FALSE,
            end_date DATE,
            is_permanent BOOLEAN,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool(&db))
    .await
    .expect("failed to create enrollment table");

    db
}

fn pool(db: &Database) -> &SqlitePool {
    match db {
        Database::SQLite(pool) => pool,
        #[cfg(feature = "postgres")]
        Database::Postgres(_) => panic!("PostgreSQL not supported in tests"),
    }
}

async fn insert_enrollment(
    db: &Database,
    enrollment_id: &str,
    end_date: Option<NaiveDate>,
    is_permanent: Option<bool>,
) {
    sqlx::query(
        "INSERT INTO enrollment (enrollment_id, student, batch, status, end_date, is_permanent, created_at)
         VALUES ($1, $2, $3, TRUE, $4, $5, $6)",
    )
    .bind(enrollment_id)
    .bind("stu-1")
    .bind("batch-1")
    .bind(end_date)
    .bind(is_permanent)
    .bind(Utc::now().naive_utc())
    .execute(pool(db))
    .await
    .unwrap();
}

async fn enrollment_status(db: &Database, enrollment_id: &str) -> bool {
    db.get_enrollment(enrollment_id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn sweep_expires_lapsed_enrollments_only() {
    let db = setup_test_db().await;
    let today = Local::now().date_naive();

    insert_enrollment(&db, "lapsed", Some(today - Duration::days(5)), None).await;
    insert_enrollment(&db, "lapsed-explicit", Some(today - Duration::days(1)), Some(false)).await;
    insert_enrollment(&db, "permanent", Some(today - Duration::days(5)), Some(true)).await;
    insert_enrollment(&db, "running", Some(today + Duration::days(5)), None).await;
    insert_enrollment(&db, "ends-today", Some(today), None).await;
    insert_enrollment(&db, "open-ended", None, None).await;

    let swept = run_enrollment_expiry_sweep(&db).await.unwrap();
    assert_eq!(swept, 2);

    assert!(!enrollment_status(&db, "lapsed").await);
    assert!(!enrollment_status(&db, "lapsed-explicit").await);
    assert!(enrollment_status(&db, "permanent").await);
    assert!(enrollment_status(&db, "running").await);
    // end_date is inclusive: the last day of access is still active.
    assert!(enrollment_status(&db, "ends-today").await);
    assert!(enrollment_status(&db, "open-ended").await);
}

#[tokio::test]
async fn sweep_is_a_noop_when_nothing_lapsed() {
    let db = setup_test_db().await;
    let today = Local::now().date_naive();

    insert_enrollment(&db, "running", Some(today + Duration::days(30)), None).await;

    assert_eq!(run_enrollment_expiry_sweep(&db).await.unwrap(), 0);
    assert_eq!(run_enrollment_expiry_sweep(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn scheduler_exposes_a_manual_trigger() {
    let db = setup_test_db().await;
    let today = Local::now().date_naive();

    insert_enrollment(&db, "lapsed", Some(today - Duration::days(10)), None).await;

    let scheduler = JobScheduler::new(Arc::clone(&db), JobsConfig::default())
        .await
        .unwrap();
    let swept = scheduler.run_enrollment_expiry_now().await.unwrap();
    assert_eq!(swept, 1);
}
