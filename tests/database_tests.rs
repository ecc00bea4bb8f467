//! Integration tests for the database layer, against in-memory SQLite.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::SqlitePool;

use campusfin::billing::{format_invoice_number, FiscalYear};
use campusfin::server::database::{CenterInvoice, Database, InvoiceItem, StatusHistoryEntry};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn datetime(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(12, 0, 0).unwrap()
}

/// Helper to create a test database with the full schema.
async fn setup_test_db() -> Arc<Database> {
    std::env::set_var("CAMPUSFIN_DATABASE_TYPE", "sqlite");
    std::env::set_var("CAMPUSFIN_DATABASE_URL", "sqlite::memory:");

    let db = Database::new().await.expect("failed to create database");

    for statement in include_str!("../migrations/001_init.sql").split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement)
            .execute(pool(&db))
            .await
            .expect("failed to create schema");
    }

    db
}

fn pool(db: &Database) -> &SqlitePool {
    match db {
        Database::SQLite(pool) => pool,
        #[cfg(feature = "postgres")]
        Database::Postgres(_) => panic!("PostgreSQL not supported in tests"),
    }
}

async fn insert_center(db: &Database, center_id: &str, name: &str, state: Option<&str>) {
    sqlx::query(
        "INSERT INTO centers (center_id, center_name, center_code, center_admin, state)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(center_id)
    .bind(name)
    .bind(format!("{}-CODE", center_id.to_uppercase()))
    .bind(format!("admin-{center_id}"))
    .bind(state)
    .execute(pool(db))
    .await
    .unwrap();
}

async fn insert_student(
    db: &Database,
    student_id: &str,
    center: Option<&str>,
    referred_by: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO students (student_id, name, email, phone, registration_number, center, is_referred, referred_by_center)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(student_id)
    .bind(format!("Student {student_id}"))
    .bind(format!("{student_id}@example.com"))
    .bind("555-0000")
    .bind(format!("REG-{student_id}"))
    .bind(center)
    .bind(referred_by.is_some())
    .bind(referred_by)
    .execute(pool(db))
    .await
    .unwrap();
}

async fn insert_course_and_batch(db: &Database, batch_id: &str, center: &str) {
    sqlx::query("INSERT INTO courses (id, course_name, mode) VALUES ($1, $2, $3)")
        .bind(format!("course-{batch_id}"))
        .bind("Applied Data Science")
        .bind("Offline")
        .execute(pool(db))
        .await
        .unwrap();
    sqlx::query("INSERT INTO batches (batch_id, batch_name, center, course) VALUES ($1, $2, $3, $4)")
        .bind(batch_id)
        .bind(format!("Batch {batch_id}"))
        .bind(center)
        .bind(format!("course-{batch_id}"))
        .execute(pool(db))
        .await
        .unwrap();
}

async fn insert_enrollment(
    db: &Database,
    enrollment_id: &str,
    student: &str,
    batch: &str,
    end_date: Option<NaiveDate>,
    is_permanent: Option<bool>,
) {
    sqlx::query(
        "INSERT INTO enrollment (enrollment_id, student, batch, status, end_date, is_permanent, created_at)
         VALUES ($1, $2, $3, TRUE, $4, $5, $6)",
    )
    .bind(enrollment_id)
    .bind(student)
    .bind(batch)
    .bind(end_date)
    .bind(is_permanent)
    .bind(Utc::now().naive_utc())
    .execute(pool(db))
    .await
    .unwrap();
}

async fn insert_payment(
    db: &Database,
    payment_id: &str,
    enrollment_id: &str,
    final_fees: f64,
    payment_type: &str,
    approved: bool,
    created_at: NaiveDateTime,
) {
    sqlx::query(
        "INSERT INTO student_course_payment
         (payment_id, enrollment_id, final_fees, payment_type, emi_duration, current_emi, status, created_at)
         VALUES ($1, $2, $3, $4, 6, 2, $5, $6)",
    )
    .bind(payment_id)
    .bind(enrollment_id)
    .bind(final_fees)
    .bind(payment_type)
    .bind(approved)
    .bind(created_at)
    .execute(pool(db))
    .await
    .unwrap();
}

fn test_invoice(
    invoice_id: &str,
    center_id: &str,
    invoice_date: NaiveDate,
    cycle_number: i32,
    period_start: NaiveDate,
) -> CenterInvoice {
    CenterInvoice {
        invoice_id: invoice_id.to_string(),
        center_id: center_id.to_string(),
        invoice_number: None,
        invoice_date,
        period_start,
        period_end: period_start + chrono::Duration::days(9),
        cycle_number,
        total_net_amount: 100.0,
        total_center_share: 80.0,
        status: "Pending".to_string(),
        pdf_url: None,
        created_by: Some("admin-1".to_string()),
        created_at: invoice_date.and_hms_opt(9, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn approve_payment_flips_status_and_records_timestamp() {
    let db = setup_test_db().await;
    insert_payment(&db, "pay-1", "enr-1", 118.0, "full", false, datetime(2025, 6, 2)).await;

    let approved_at = datetime(2025, 6, 12);
    let updated = db.approve_payment("pay-1", approved_at).await.unwrap();
    assert_eq!(updated, 1);

    let payment = db.get_payment("pay-1").await.unwrap().unwrap();
    assert!(payment.status);
    assert_eq!(payment.approved_at, Some(approved_at));

    // Unknown ids touch no rows.
    assert_eq!(db.approve_payment("missing", approved_at).await.unwrap(), 0);
}

#[tokio::test]
async fn enrollment_approval_updates_end_date_and_keeps_permanent_flag() {
    let db = setup_test_db().await;
    insert_enrollment(&db, "enr-1", "stu-1", "batch-1", Some(date(2025, 1, 1)), None).await;

    db.update_enrollment_approval("enr-1", date(2025, 7, 1), false)
        .await
        .unwrap();
    let enrollment = db.get_enrollment("enr-1").await.unwrap().unwrap();
    assert!(enrollment.status);
    assert_eq!(enrollment.end_date, Some(date(2025, 7, 1)));
    assert_ne!(enrollment.is_permanent, Some(true));

    // Once permanent, later non-permanent approvals do not clear the flag.
    db.update_enrollment_approval("enr-1", date(2125, 7, 1), true)
        .await
        .unwrap();
    db.update_enrollment_approval("enr-1", date(2025, 8, 1), false)
        .await
        .unwrap();
    let enrollment = db.get_enrollment("enr-1").await.unwrap().unwrap();
    assert_eq!(enrollment.is_permanent, Some(true));
}

#[tokio::test]
async fn expire_enrollments_skips_permanent_and_future_rows() {
    let db = setup_test_db().await;
    let today = date(2025, 6, 15);

    insert_enrollment(&db, "lapsed", "s1", "b1", Some(date(2025, 6, 1)), None).await;
    insert_enrollment(&db, "lapsed-flag-false", "s2", "b1", Some(date(2025, 6, 1)), Some(false)).await;
    insert_enrollment(&db, "permanent", "s3", "b1", Some(date(2025, 6, 1)), Some(true)).await;
    insert_enrollment(&db, "running", "s4", "b1", Some(date(2025, 6, 20)), None).await;
    insert_enrollment(&db, "open-ended", "s5", "b1", None, None).await;

    let swept = db.expire_enrollments(today).await.unwrap();
    assert_eq!(swept, 2);

    assert!(!db.get_enrollment("lapsed").await.unwrap().unwrap().status);
    assert!(!db.get_enrollment("lapsed-flag-false").await.unwrap().unwrap().status);
    assert!(db.get_enrollment("permanent").await.unwrap().unwrap().status);
    assert!(db.get_enrollment("running").await.unwrap().unwrap().status);
    assert!(db.get_enrollment("open-ended").await.unwrap().unwrap().status);
}

#[tokio::test]
async fn payment_details_join_exposes_center_and_referral_context() {
    let db = setup_test_db().await;
    insert_center(&db, "center-a", "Alpha Learning Center", Some("state-1")).await;
    insert_center(&db, "center-b", "Beta Learning Center", Some("state-1")).await;
    insert_course_and_batch(&db, "batch-1", "center-a").await;
    insert_student(&db, "stu-direct", Some("center-a"), None).await;
    insert_student(&db, "stu-referred", Some("center-a"), Some("center-b")).await;
    insert_enrollment(&db, "enr-direct", "stu-direct", "batch-1", None, None).await;
    insert_enrollment(&db, "enr-referred", "stu-referred", "batch-1", None, None).await;
    insert_payment(&db, "pay-direct", "enr-direct", 118.0, "full", true, datetime(2025, 6, 2)).await;
    insert_payment(&db, "pay-referred", "enr-referred", 236.0, "emi", false, datetime(2025, 6, 3)).await;

    let details = db.payment_details(false).await.unwrap();
    assert_eq!(details.len(), 2);

    // Newest first.
    assert_eq!(details[0].payment_id, "pay-referred");
    assert_eq!(details[0].is_referred, Some(true));
    assert_eq!(details[0].referred_by_center.as_deref(), Some("center-b"));
    assert_eq!(
        details[0].referring_center_name.as_deref(),
        Some("Beta Learning Center")
    );
    assert_eq!(details[0].batch_center_id.as_deref(), Some("center-a"));
    assert_eq!(details[0].course_mode.as_deref(), Some("Offline"));

    assert_eq!(details[1].payment_id, "pay-direct");
    assert_eq!(details[1].is_referred, Some(false));
    assert_eq!(details[1].student_center_id.as_deref(), Some("center-a"));
    assert_eq!(details[1].registration_number.as_deref(), Some("REG-stu-direct"));

    // Approved-only filtering drops the pending EMI payment.
    let approved = db.payment_details(true).await.unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].payment_id, "pay-direct");
}

#[tokio::test]
async fn invoice_sequence_restarts_each_fiscal_year() {
    let db = setup_test_db().await;
    insert_center(&db, "center-a", "Alpha Learning Center", None).await;

    // Last invoice of fiscal year 24-25.
    db.insert_invoice(&test_invoice("inv-1", "center-a", date(2025, 3, 30), 3, date(2025, 3, 21)))
        .await
        .unwrap();
    // First two invoices of fiscal year 25-26.
    db.insert_invoice(&test_invoice("inv-2", "center-a", date(2025, 4, 12), 1, date(2025, 4, 1)))
        .await
        .unwrap();
    db.insert_invoice(&test_invoice("inv-3", "center-a", date(2025, 5, 12), 1, date(2025, 5, 1)))
        .await
        .unwrap();

    let old_fy = FiscalYear::containing(date(2025, 3, 30));
    let new_fy = FiscalYear::containing(date(2025, 4, 12));

    let old_count = db
        .count_center_invoices_between("center-a", old_fy.start, old_fy.end)
        .await
        .unwrap();
    assert_eq!(old_count, 1);

    let new_count = db
        .count_center_invoices_between("center-a", new_fy.start, new_fy.end)
        .await
        .unwrap();
    assert_eq!(new_count, 2);

    // The sequence the generator would assign.
    assert_eq!(
        format_invoice_number("ALC", &old_fy.label, old_count),
        "ALC/INV/24-25/001"
    );
    assert_eq!(
        format_invoice_number("ALC", &new_fy.label, new_count),
        "ALC/INV/25-26/002"
    );
}

#[tokio::test]
async fn one_invoice_per_center_and_cycle() {
    let db = setup_test_db().await;
    insert_center(&db, "center-a", "Alpha Learning Center", None).await;

    assert!(db
        .find_invoice_for_cycle("center-a", 1, date(2025, 6, 1))
        .await
        .unwrap()
        .is_none());

    db.insert_invoice(&test_invoice("inv-1", "center-a", date(2025, 6, 11), 1, date(2025, 6, 1)))
        .await
        .unwrap();

    let existing = db
        .find_invoice_for_cycle("center-a", 1, date(2025, 6, 1))
        .await
        .unwrap();
    assert!(existing.is_some());

    // A different cycle of the same month is free.
    assert!(db
        .find_invoice_for_cycle("center-a", 2, date(2025, 6, 11))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn invoice_items_and_invoiced_payment_tracking() {
    let db = setup_test_db().await;
    insert_center(&db, "center-a", "Alpha Learning Center", None).await;
    db.insert_invoice(&test_invoice("inv-1", "center-a", date(2025, 6, 11), 1, date(2025, 6, 1)))
        .await
        .unwrap();

    let items = vec![
        InvoiceItem {
            item_id: "item-1".to_string(),
            invoice_id: "inv-1".to_string(),
            payment_id: "pay-1".to_string(),
            student_id: Some("stu-1".to_string()),
            student_name: "Student One".to_string(),
            registration_number: "REG-1".to_string(),
            course_name: "Applied Data Science".to_string(),
            transaction_date: date(2025, 6, 2),
            fee_term: "Full".to_string(),
            fee_paid: 118.0,
            net_amount: 100.0,
            center_share: 80.0,
            created_at: datetime(2025, 6, 11),
        },
        InvoiceItem {
            item_id: "item-2".to_string(),
            invoice_id: "inv-1".to_string(),
            payment_id: "pay-2".to_string(),
            student_id: None,
            student_name: "Student Two".to_string(),
            registration_number: "REG-2".to_string(),
            course_name: "Applied Data Science".to_string(),
            transaction_date: date(2025, 6, 4),
            fee_term: "EMI - 2".to_string(),
            fee_paid: 59.0,
            net_amount: 50.0,
            center_share: 10.0,
            created_at: datetime(2025, 6, 11),
        },
    ];
    db.insert_invoice_items(&items).await.unwrap();

    let stored = db.list_invoice_items("inv-1").await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].fee_term, "Full");

    let mut invoiced = db.invoiced_payment_ids().await.unwrap();
    invoiced.sort();
    assert_eq!(invoiced, vec!["pay-1".to_string(), "pay-2".to_string()]);
}

#[tokio::test]
async fn status_listings_join_the_center_name() {
    let db = setup_test_db().await;
    insert_center(&db, "center-a", "Alpha Learning Center", Some("state-1")).await;
    insert_center(&db, "center-b", "Beta Learning Center", Some("state-2")).await;

    let mut pending = test_invoice("inv-1", "center-a", date(2025, 6, 11), 1, date(2025, 6, 1));
    pending.status = "Pending".to_string();
    db.insert_invoice(&pending).await.unwrap();

    let mut verified = test_invoice("inv-2", "center-b", date(2025, 6, 11), 1, date(2025, 6, 1));
    verified.status = "MF Verified".to_string();
    db.insert_invoice(&verified).await.unwrap();

    let pending_rows = db.list_invoices_by_statuses(&["Pending"]).await.unwrap();
    assert_eq!(pending_rows.len(), 1);
    assert_eq!(pending_rows[0].invoice.invoice_id, "inv-1");
    assert_eq!(pending_rows[0].center_name, "Alpha Learning Center");

    let multi = db
        .list_invoices_by_statuses(&["Pending", "MF Verified"])
        .await
        .unwrap();
    assert_eq!(multi.len(), 2);
}

#[tokio::test]
async fn status_updates_and_history_roundtrip() {
    let db = setup_test_db().await;
    insert_center(&db, "center-a", "Alpha Learning Center", None).await;
    db.insert_invoice(&test_invoice("inv-1", "center-a", date(2025, 6, 11), 1, date(2025, 6, 1)))
        .await
        .unwrap();

    db.update_invoice_status("inv-1", "MF Verified").await.unwrap();
    let invoice = db.get_invoice("inv-1").await.unwrap().unwrap();
    assert_eq!(invoice.status, "MF Verified");

    db.insert_status_history(&StatusHistoryEntry {
        id: "hist-1".to_string(),
        invoice_id: "inv-1".to_string(),
        old_status: "Pending".to_string(),
        new_status: "MF Verified".to_string(),
        changed_by: "user-1".to_string(),
        notes: Some("Verified after review".to_string()),
        changed_at: datetime(2025, 6, 12),
    })
    .await
    .unwrap();

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM invoice_status_history WHERE invoice_id = $1")
            .bind("inv-1")
            .fetch_one(pool(&db))
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn invoice_number_and_pdf_url_updates_stick() {
    let db = setup_test_db().await;
    insert_center(&db, "center-a", "Alpha Learning Center", None).await;
    db.insert_invoice(&test_invoice("inv-1", "center-a", date(2025, 6, 11), 1, date(2025, 6, 1)))
        .await
        .unwrap();

    db.set_invoice_number("inv-1", "ALC/INV/25-26/001").await.unwrap();
    db.set_invoice_pdf_url("inv-1", "http://docs/invoice-inv-1.pdf")
        .await
        .unwrap();

    let invoice = db.get_invoice("inv-1").await.unwrap().unwrap();
    assert_eq!(invoice.invoice_number.as_deref(), Some("ALC/INV/25-26/001"));
    assert_eq!(
        invoice.pdf_url.as_deref(),
        Some("http://docs/invoice-inv-1.pdf")
    );

    let listed = db.list_center_invoices("center-a").await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn admin_lookups_resolve_centers_and_states() {
    let db = setup_test_db().await;
    insert_center(&db, "center-a", "Alpha Learning Center", Some("state-1")).await;
    insert_center(&db, "center-b", "Beta Learning Center", Some("state-1")).await;
    insert_center(&db, "center-c", "Gamma Learning Center", Some("state-2")).await;
    sqlx::query("INSERT INTO states (state_id, state_name, state_admin) VALUES ($1, $2, $3)")
        .bind("state-1")
        .bind("Northern State")
        .bind("state-admin-1")
        .execute(pool(&db))
        .await
        .unwrap();
    sqlx::query("INSERT INTO users (id, name, full_name) VALUES ($1, $2, $3)")
        .bind("admin-center-a")
        .bind("Priya")
        .bind("Priya Nair")
        .execute(pool(&db))
        .await
        .unwrap();

    assert_eq!(
        db.center_for_admin("admin-center-a").await.unwrap(),
        Some("center-a".to_string())
    );
    assert_eq!(db.center_for_admin("nobody").await.unwrap(), None);

    assert_eq!(
        db.state_for_admin("state-admin-1").await.unwrap(),
        Some("state-1".to_string())
    );

    let mut ids = db.center_ids_for_state("state-1").await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["center-a".to_string(), "center-b".to_string()]);

    let account = db.get_user("admin-center-a").await.unwrap().unwrap();
    assert_eq!(account.full_name.as_deref(), Some("Priya Nair"));
}

#[tokio::test]
async fn payments_for_enrollment_come_newest_first() {
    let db = setup_test_db().await;
    insert_payment(&db, "pay-old", "enr-1", 59.0, "emi", true, datetime(2025, 5, 2)).await;
    insert_payment(&db, "pay-new", "enr-1", 59.0, "emi", true, datetime(2025, 6, 2)).await;
    insert_payment(&db, "pay-other", "enr-2", 59.0, "emi", true, datetime(2025, 6, 3)).await;

    let payments = db.payments_for_enrollment("enr-1").await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].payment_id, "pay-new");
    assert_eq!(payments[1].payment_id, "pay-old");
}

#[tokio::test]
async fn notifications_are_inserted_unread() {
    let db = setup_test_db().await;
    db.insert_notification("stu-1", "Your payment has been approved!")
        .await
        .unwrap();

    let (count, unread): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), SUM(CASE WHEN is_read THEN 0 ELSE 1 END) FROM notifications WHERE student = $1",
    )
    .bind("stu-1")
    .fetch_one(pool(&db))
    .await
    .unwrap();
    assert_eq!(count, 1);
    assert_eq!(unread, 1);
}
