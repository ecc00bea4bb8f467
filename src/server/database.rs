use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{query, query_as, query_scalar, FromRow};
use std::sync::Arc;
use tracing::error;

#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::config::get_config;
use crate::errors::{ServiceError, ServiceResult};

/// A row of the `student_course_payment` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub payment_id: String,
    pub enrollment_id: String,
    pub order_id: Option<String>,
    pub bank_rrn: Option<String>,
    pub student_name: Option<String>,
    pub course_name: Option<String>,
    pub original_fees: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub final_fees: f64,
    /// "full" or "emi"
    pub payment_type: String,
    pub emi_duration: Option<i32>,
    pub current_emi: Option<i32>,
    pub course_duration: Option<i32>,
    /// true once finance has approved the payment
    pub status: bool,
    pub approved_at: Option<NaiveDateTime>,
    pub next_emi_due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

/// A row of the `enrollment` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Enrollment {
    pub enrollment_id: String,
    pub student: String,
    pub batch: String,
    pub status: bool,
    pub end_date: Option<NaiveDate>,
    pub is_permanent: Option<bool>,
    pub created_at: NaiveDateTime,
}

/// A row of the `students` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Student {
    pub student_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub registration_number: Option<String>,
    pub center: Option<String>,
    pub is_referred: bool,
    pub referred_by_center: Option<String>,
}

/// A row of the `centers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Center {
    pub center_id: String,
    pub center_name: String,
    pub center_username: Option<String>,
    pub center_shortcode: Option<String>,
    pub center_code: Option<String>,
    pub center_admin: Option<String>,
    pub state: Option<String>,
}

/// A row of the `users` table (platform accounts, e.g. center admins).
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub full_name: Option<String>,
}

/// A row of the `center_invoices` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CenterInvoice {
    pub invoice_id: String,
    pub center_id: String,
    pub invoice_number: Option<String>,
    pub invoice_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub cycle_number: i32,
    pub total_net_amount: f64,
    pub total_center_share: f64,
    pub status: String,
    pub pdf_url: Option<String>,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
}

/// An invoice joined with the name of its issuing center.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvoiceWithCenter {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invoice: CenterInvoice,
    pub center_name: String,
}

/// A row of the `center_invoice_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvoiceItem {
    pub item_id: String,
    pub invoice_id: String,
    pub payment_id: String,
    pub student_id: Option<String>,
    pub student_name: String,
    pub registration_number: String,
    pub course_name: String,
    pub transaction_date: NaiveDate,
    pub fee_term: String,
    pub fee_paid: f64,
    pub net_amount: f64,
    pub center_share: f64,
    pub created_at: NaiveDateTime,
}

/// A row of the `invoice_status_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusHistoryEntry {
    pub id: String,
    pub invoice_id: String,
    pub old_status: String,
    pub new_status: String,
    pub changed_by: String,
    pub notes: Option<String>,
    pub changed_at: NaiveDateTime,
}

/// Flattened payment detail: one payment joined through enrollment to the
/// student (and the center that referred them), the batch (and its center),
/// and the course. Joins are outer, so everything past the payment itself is
/// optional.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentDetail {
    pub payment_id: String,
    pub enrollment_id: String,
    pub order_id: Option<String>,
    pub bank_rrn: Option<String>,
    pub original_fees: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub final_fees: f64,
    pub payment_type: String,
    pub emi_duration: Option<i32>,
    pub current_emi: Option<i32>,
    pub course_duration: Option<i32>,
    pub status: bool,
    pub approved_at: Option<NaiveDateTime>,
    pub next_emi_due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub student_id: Option<String>,
    pub student_email: Option<String>,
    pub student_name: Option<String>,
    pub registration_number: Option<String>,
    pub student_center_id: Option<String>,
    pub is_referred: Option<bool>,
    pub referred_by_center: Option<String>,
    pub referring_center_name: Option<String>,
    pub batch_id: Option<String>,
    pub batch_name: Option<String>,
    pub batch_center_id: Option<String>,
    pub batch_center_name: Option<String>,
    pub course_name: Option<String>,
    pub course_mode: Option<String>,
}

/// Context needed to notify a student about an approved payment.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationContext {
    pub student_id: String,
    pub batch_name: Option<String>,
    pub course_name: Option<String>,
}

const PAYMENT_DETAIL_SQL: &str = r#"
    SELECT
        p.payment_id, p.enrollment_id, p.order_id, p.bank_rrn,
        p.original_fees, p.discount_percentage, p.final_fees,
        p.payment_type, p.emi_duration, p.current_emi, p.course_duration,
        p.status, p.approved_at, p.next_emi_due_date, p.created_at,
        s.student_id, s.email AS student_email, s.name AS student_name,
        s.registration_number, s.center AS student_center_id,
        s.is_referred, s.referred_by_center,
        rc.center_name AS referring_center_name,
        b.batch_id, b.batch_name,
        bc.center_id AS batch_center_id, bc.center_name AS batch_center_name,
        c.course_name, c.mode AS course_mode
    FROM student_course_payment p
    LEFT JOIN enrollment e ON e.enrollment_id = p.enrollment_id
    LEFT JOIN students s ON s.student_id = e.student
    LEFT JOIN centers rc ON rc.center_id = s.referred_by_center
    LEFT JOIN batches b ON b.batch_id = e.batch
    LEFT JOIN centers bc ON bc.center_id = b.center
    LEFT JOIN courses c ON c.id = b.course
"#;

fn db_err(e: sqlx::Error) -> ServiceError {
    error!("Database operation failed: {e}");
    ServiceError::DatabaseError(e.to_string())
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
///
/// Queries use `$n` placeholders, which both backends accept, so each SQL
/// string is shared between the two match arms.
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Initialize the database connection based on configuration.
    ///
    /// Uses the global configuration from `config.toml` and environment
    /// variables. See `crate::config` for configuration options.
    pub async fn new() -> ServiceResult<Arc<Self>> {
        let config = get_config()?;
        let db_config = &config.database;

        match db_config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePool::connect(&db_config.sqlite_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        ServiceError::ServerError(format!("failed to connect to SQLite: {e}"))
                    })?;

                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(ServiceError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPool::connect(&db_config.postgres_url).await.map_err(|e| {
                    error!("Failed to connect to PostgreSQL: {e}");
                    ServiceError::ServerError(format!("failed to connect to PostgreSQL: {e}"))
                })?;

                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(ServiceError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(ServiceError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Backend name, for the health endpoint.
    pub fn backend(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Cheap connectivity probe.
    pub async fn ping(&self) -> bool {
        const SQL: &str = "SELECT 1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, i64>(SQL).fetch_one(pool).await.is_ok(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, i64>(SQL).fetch_one(pool).await.is_ok(),
        }
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// Fetch a payment by id.
    pub async fn get_payment(&self, payment_id: &str) -> ServiceResult<Option<Payment>> {
        const SQL: &str = "SELECT * FROM student_course_payment WHERE payment_id = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Payment>(SQL)
                .bind(payment_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Payment>(SQL)
                .bind(payment_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Mark a payment approved.
    pub async fn approve_payment(
        &self,
        payment_id: &str,
        approved_at: NaiveDateTime,
    ) -> ServiceResult<u64> {
        const SQL: &str =
            "UPDATE student_course_payment SET status = TRUE, approved_at = $1 WHERE payment_id = $2";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(approved_at)
                .bind(payment_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(approved_at)
                .bind(payment_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
        }
    }

    /// Record the due date of the next EMI installment.
    pub async fn set_next_emi_due_date(
        &self,
        payment_id: &str,
        due_date: NaiveDate,
    ) -> ServiceResult<u64> {
        const SQL: &str =
            "UPDATE student_course_payment SET next_emi_due_date = $1 WHERE payment_id = $2";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(due_date)
                .bind(payment_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(due_date)
                .bind(payment_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
        }
    }

    /// Change the course duration recorded on a payment.
    pub async fn update_course_duration(
        &self,
        payment_id: &str,
        course_duration: i32,
    ) -> ServiceResult<u64> {
        const SQL: &str =
            "UPDATE student_course_payment SET course_duration = $1 WHERE payment_id = $2";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(course_duration)
                .bind(payment_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(course_duration)
                .bind(payment_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
        }
    }

    /// All payments of one enrollment, newest first.
    pub async fn payments_for_enrollment(
        &self,
        enrollment_id: &str,
    ) -> ServiceResult<Vec<Payment>> {
        const SQL: &str =
            "SELECT * FROM student_course_payment WHERE enrollment_id = $1 ORDER BY created_at DESC";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Payment>(SQL)
                .bind(enrollment_id)
                .fetch_all(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Payment>(SQL)
                .bind(enrollment_id)
                .fetch_all(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Flattened payment details for every payment, newest first.
    ///
    /// With `approved_only` set, restricts to approved payments (the rows
    /// that count towards revenue and invoicing).
    pub async fn payment_details(&self, approved_only: bool) -> ServiceResult<Vec<PaymentDetail>> {
        let sql = if approved_only {
            format!("{PAYMENT_DETAIL_SQL} WHERE p.status ORDER BY p.created_at DESC")
        } else {
            format!("{PAYMENT_DETAIL_SQL} ORDER BY p.created_at DESC")
        };
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, PaymentDetail>(&sql)
                .fetch_all(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, PaymentDetail>(&sql)
                .fetch_all(pool)
                .await
                .map_err(db_err),
        }
    }

    // ========================================================================
    // Enrollments and students
    // ========================================================================

    /// Fetch an enrollment by id.
    pub async fn get_enrollment(&self, enrollment_id: &str) -> ServiceResult<Option<Enrollment>> {
        const SQL: &str = "SELECT * FROM enrollment WHERE enrollment_id = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Enrollment>(SQL)
                .bind(enrollment_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Enrollment>(SQL)
                .bind(enrollment_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Grant course access after an approved payment: active status, new end
    /// date, and the permanent flag for full or final-EMI payments.
    pub async fn update_enrollment_approval(
        &self,
        enrollment_id: &str,
        end_date: NaiveDate,
        is_permanent: bool,
    ) -> ServiceResult<u64> {
        const SQL: &str = "UPDATE enrollment SET status = TRUE, end_date = $1, is_permanent = (is_permanent OR $2) WHERE enrollment_id = $3";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(end_date)
                .bind(is_permanent)
                .bind(enrollment_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(end_date)
                .bind(is_permanent)
                .bind(enrollment_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
        }
    }

    /// Student, batch, and course names for a payment-approval notification.
    pub async fn enrollment_notification_context(
        &self,
        enrollment_id: &str,
    ) -> ServiceResult<Option<NotificationContext>> {
        const SQL: &str = r#"
            SELECT e.student AS student_id, b.batch_name, c.course_name
            FROM enrollment e
            LEFT JOIN batches b ON b.batch_id = e.batch
            LEFT JOIN courses c ON c.id = b.course
            WHERE e.enrollment_id = $1
        "#;
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, NotificationContext>(SQL)
                .bind(enrollment_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, NotificationContext>(SQL)
                .bind(enrollment_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Look up a student by registration number.
    pub async fn find_student_by_registration(
        &self,
        registration_number: &str,
    ) -> ServiceResult<Option<Student>> {
        const SQL: &str = "SELECT * FROM students WHERE registration_number = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Student>(SQL)
                .bind(registration_number)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Student>(SQL)
                .bind(registration_number)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Enrollment of a student in a batch, if any.
    pub async fn find_enrollment(
        &self,
        batch_id: &str,
        student_id: &str,
    ) -> ServiceResult<Option<Enrollment>> {
        const SQL: &str = "SELECT * FROM enrollment WHERE batch = $1 AND student = $2";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Enrollment>(SQL)
                .bind(batch_id)
                .bind(student_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Enrollment>(SQL)
                .bind(batch_id)
                .bind(student_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Expire enrollments whose end date has passed.
    ///
    /// Permanent enrollments are excluded; a NULL flag counts as not
    /// permanent. Returns the number of rows flipped.
    pub async fn expire_enrollments(&self, today: NaiveDate) -> ServiceResult<u64> {
        const SQL: &str = "UPDATE enrollment SET status = FALSE WHERE end_date < $1 AND (is_permanent IS NULL OR is_permanent = FALSE)";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(today)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(today)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
        }
    }

    // ========================================================================
    // Centers, states, users
    // ========================================================================

    /// Fetch a center by id.
    pub async fn get_center(&self, center_id: &str) -> ServiceResult<Option<Center>> {
        const SQL: &str = "SELECT * FROM centers WHERE center_id = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, Center>(SQL)
                .bind(center_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, Center>(SQL)
                .bind(center_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// The center administered by a user, if any.
    pub async fn center_for_admin(&self, user_id: &str) -> ServiceResult<Option<String>> {
        const SQL: &str = "SELECT center_id FROM centers WHERE center_admin = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, String>(SQL)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, String>(SQL)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// The state administered by a user, if any.
    pub async fn state_for_admin(&self, user_id: &str) -> ServiceResult<Option<String>> {
        const SQL: &str = "SELECT state_id FROM states WHERE state_admin = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, String>(SQL)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, String>(SQL)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Ids of every center in a state.
    pub async fn center_ids_for_state(&self, state_id: &str) -> ServiceResult<Vec<String>> {
        const SQL: &str = "SELECT center_id FROM centers WHERE state = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, String>(SQL)
                .bind(state_id)
                .fetch_all(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, String>(SQL)
                .bind(state_id)
                .fetch_all(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Fetch a platform user by id.
    pub async fn get_user(&self, user_id: &str) -> ServiceResult<Option<User>> {
        const SQL: &str = "SELECT id, name, full_name FROM users WHERE id = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, User>(SQL)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, User>(SQL)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    // ========================================================================
    // Invoices
    // ========================================================================

    /// Payment ids that already appear on some invoice.
    pub async fn invoiced_payment_ids(&self) -> ServiceResult<Vec<String>> {
        const SQL: &str = "SELECT DISTINCT payment_id FROM center_invoice_items";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, String>(SQL)
                .fetch_all(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, String>(SQL)
                .fetch_all(pool)
                .await
                .map_err(db_err),
        }
    }

    /// The invoice a center already generated for a cycle, if any.
    pub async fn find_invoice_for_cycle(
        &self,
        center_id: &str,
        cycle_number: i32,
        period_start: NaiveDate,
    ) -> ServiceResult<Option<CenterInvoice>> {
        const SQL: &str = "SELECT * FROM center_invoices WHERE center_id = $1 AND cycle_number = $2 AND period_start = $3";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, CenterInvoice>(SQL)
                .bind(center_id)
                .bind(cycle_number)
                .bind(period_start)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, CenterInvoice>(SQL)
                .bind(center_id)
                .bind(cycle_number)
                .bind(period_start)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Insert a freshly generated invoice.
    pub async fn insert_invoice(&self, invoice: &CenterInvoice) -> ServiceResult<()> {
        const SQL: &str = r#"
            INSERT INTO center_invoices (
                invoice_id, center_id, invoice_number, invoice_date,
                period_start, period_end, cycle_number,
                total_net_amount, total_center_share,
                status, pdf_url, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#;
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(&invoice.invoice_id)
                .bind(&invoice.center_id)
                .bind(&invoice.invoice_number)
                .bind(invoice.invoice_date)
                .bind(invoice.period_start)
                .bind(invoice.period_end)
                .bind(invoice.cycle_number)
                .bind(invoice.total_net_amount)
                .bind(invoice.total_center_share)
                .bind(&invoice.status)
                .bind(&invoice.pdf_url)
                .bind(&invoice.created_by)
                .bind(invoice.created_at)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(&invoice.invoice_id)
                .bind(&invoice.center_id)
                .bind(&invoice.invoice_number)
                .bind(invoice.invoice_date)
                .bind(invoice.period_start)
                .bind(invoice.period_end)
                .bind(invoice.cycle_number)
                .bind(invoice.total_net_amount)
                .bind(invoice.total_center_share)
                .bind(&invoice.status)
                .bind(&invoice.pdf_url)
                .bind(&invoice.created_by)
                .bind(invoice.created_at)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(db_err),
        }
    }

    /// Count a center's invoices dated within a window (fiscal-year
    /// sequence numbering).
    pub async fn count_center_invoices_between(
        &self,
        center_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<i64> {
        const SQL: &str = "SELECT COUNT(*) FROM center_invoices WHERE center_id = $1 AND invoice_date >= $2 AND invoice_date <= $3";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, i64>(SQL)
                .bind(center_id)
                .bind(start)
                .bind(end)
                .fetch_one(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, i64>(SQL)
                .bind(center_id)
                .bind(start)
                .bind(end)
                .fetch_one(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Persist the formatted invoice number.
    pub async fn set_invoice_number(
        &self,
        invoice_id: &str,
        invoice_number: &str,
    ) -> ServiceResult<u64> {
        const SQL: &str = "UPDATE center_invoices SET invoice_number = $1 WHERE invoice_id = $2";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(invoice_number)
                .bind(invoice_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(invoice_number)
                .bind(invoice_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
        }
    }

    /// Persist the URL of the rendered invoice document.
    pub async fn set_invoice_pdf_url(&self, invoice_id: &str, pdf_url: &str) -> ServiceResult<u64> {
        const SQL: &str = "UPDATE center_invoices SET pdf_url = $1 WHERE invoice_id = $2";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(pdf_url)
                .bind(invoice_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(pdf_url)
                .bind(invoice_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
        }
    }

    /// Insert the line items of an invoice.
    pub async fn insert_invoice_items(&self, items: &[InvoiceItem]) -> ServiceResult<()> {
        const SQL: &str = r#"
            INSERT INTO center_invoice_items (
                item_id, invoice_id, payment_id, student_id,
                student_name, registration_number, course_name,
                transaction_date, fee_term, fee_paid, net_amount, center_share,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#;
        for item in items {
            match self {
                #[cfg(feature = "sqlite")]
                Database::SQLite(pool) => query(SQL)
                    .bind(&item.item_id)
                    .bind(&item.invoice_id)
                    .bind(&item.payment_id)
                    .bind(&item.student_id)
                    .bind(&item.student_name)
                    .bind(&item.registration_number)
                    .bind(&item.course_name)
                    .bind(item.transaction_date)
                    .bind(&item.fee_term)
                    .bind(item.fee_paid)
                    .bind(item.net_amount)
                    .bind(item.center_share)
                    .bind(item.created_at)
                    .execute(pool)
                    .await
                    .map(|_| ())
                    .map_err(db_err)?,
                #[cfg(feature = "postgres")]
                Database::Postgres(pool) => query(SQL)
                    .bind(&item.item_id)
                    .bind(&item.invoice_id)
                    .bind(&item.payment_id)
                    .bind(&item.student_id)
                    .bind(&item.student_name)
                    .bind(&item.registration_number)
                    .bind(&item.course_name)
                    .bind(item.transaction_date)
                    .bind(&item.fee_term)
                    .bind(item.fee_paid)
                    .bind(item.net_amount)
                    .bind(item.center_share)
                    .bind(item.created_at)
                    .execute(pool)
                    .await
                    .map(|_| ())
                    .map_err(db_err)?,
            }
        }
        Ok(())
    }

    /// Fetch an invoice by id.
    pub async fn get_invoice(&self, invoice_id: &str) -> ServiceResult<Option<CenterInvoice>> {
        const SQL: &str = "SELECT * FROM center_invoices WHERE invoice_id = $1";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, CenterInvoice>(SQL)
                .bind(invoice_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, CenterInvoice>(SQL)
                .bind(invoice_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err),
        }
    }

    /// All invoices of a center, newest first.
    pub async fn list_center_invoices(&self, center_id: &str) -> ServiceResult<Vec<CenterInvoice>> {
        const SQL: &str =
            "SELECT * FROM center_invoices WHERE center_id = $1 ORDER BY created_at DESC";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, CenterInvoice>(SQL)
                .bind(center_id)
                .fetch_all(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, CenterInvoice>(SQL)
                .bind(center_id)
                .fetch_all(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Items of an invoice, oldest first.
    pub async fn list_invoice_items(&self, invoice_id: &str) -> ServiceResult<Vec<InvoiceItem>> {
        const SQL: &str =
            "SELECT * FROM center_invoice_items WHERE invoice_id = $1 ORDER BY created_at ASC";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, InvoiceItem>(SQL)
                .bind(invoice_id)
                .fetch_all(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, InvoiceItem>(SQL)
                .bind(invoice_id)
                .fetch_all(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Invoices in any of the given workflow statuses, joined with their
    /// center name, newest first.
    ///
    /// The status list comes from the `InvoiceStatus` enum, never from user
    /// input, so it is interpolated directly.
    pub async fn list_invoices_by_statuses(
        &self,
        statuses: &[&str],
    ) -> ServiceResult<Vec<InvoiceWithCenter>> {
        let quoted: Vec<String> = statuses.iter().map(|s| format!("'{s}'")).collect();
        let sql = format!(
            r#"
            SELECT i.*, c.center_name
            FROM center_invoices i
            JOIN centers c ON c.center_id = i.center_id
            WHERE i.status IN ({})
            ORDER BY i.created_at DESC
            "#,
            quoted.join(", ")
        );
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, InvoiceWithCenter>(&sql)
                .fetch_all(pool)
                .await
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, InvoiceWithCenter>(&sql)
                .fetch_all(pool)
                .await
                .map_err(db_err),
        }
    }

    /// Move an invoice to a new workflow status.
    pub async fn update_invoice_status(
        &self,
        invoice_id: &str,
        status: &str,
    ) -> ServiceResult<u64> {
        const SQL: &str = "UPDATE center_invoices SET status = $1 WHERE invoice_id = $2";
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(status)
                .bind(invoice_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(status)
                .bind(invoice_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err),
        }
    }

    /// Append an entry to the invoice status audit trail.
    pub async fn insert_status_history(&self, entry: &StatusHistoryEntry) -> ServiceResult<()> {
        const SQL: &str = r#"
            INSERT INTO invoice_status_history (
                id, invoice_id, old_status, new_status, changed_by, notes, changed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(&entry.id)
                .bind(&entry.invoice_id)
                .bind(&entry.old_status)
                .bind(&entry.new_status)
                .bind(&entry.changed_by)
                .bind(&entry.notes)
                .bind(entry.changed_at)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(&entry.id)
                .bind(&entry.invoice_id)
                .bind(&entry.old_status)
                .bind(&entry.new_status)
                .bind(&entry.changed_by)
                .bind(&entry.notes)
                .bind(entry.changed_at)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(db_err),
        }
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Insert a notification for a student.
    pub async fn insert_notification(&self, student_id: &str, message: &str) -> ServiceResult<()> {
        const SQL: &str = r#"
            INSERT INTO notifications (id, student, message, is_read, created_at)
            VALUES ($1, $2, $3, FALSE, $4)
        "#;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(SQL)
                .bind(&id)
                .bind(student_id)
                .bind(message)
                .bind(now)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(db_err),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(SQL)
                .bind(&id)
                .bind(student_id)
                .bind(message)
                .bind(now)
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(db_err),
        }
    }
}
