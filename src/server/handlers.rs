use std::sync::Arc;

use axum::{extract::Path, extract::State, Json};
use chrono::{Datelike, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::auth::{AcademicUser, AuthUser, CenterUser, FinanceUser, Role};
use crate::server::database::{Database, Payment, PaymentDetail};
use crate::server::validation::validate_not_empty;
use crate::storage::DocumentStore;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub documents: Arc<DocumentStore>,
}

/// Standard success envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Resolve the center a caller acts for.
///
/// The center id normally travels in the token; center admins whose tokens
/// predate that claim are resolved through `centers.center_admin`.
pub(crate) async fn resolve_center_id(user: &AuthUser, db: &Database) -> Result<String, ApiError> {
    if let Some(center_id) = &user.center_id {
        return Ok(center_id.clone());
    }

    if user.role == Role::Center {
        if let Some(center_id) = db.center_for_admin(&user.id).await? {
            return Ok(center_id);
        }
        return Err(ApiError::with_message(
            ErrorCode::CenterNotFound,
            "Center not found for this admin",
        ));
    }

    Err(ApiError::with_message(
        ErrorCode::InvalidRequest,
        "Center ID not found",
    ))
}

// ============================================================================
// Payment approval
// ============================================================================

/// How an approved payment affects the enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApprovalKind {
    /// One-time full payment: lifelong access.
    Full,
    /// Last EMI installment: lifelong access.
    FinalEmi,
    /// Any other EMI installment: 30 more days of access.
    RegularEmi,
}

fn classify_payment(payment: &Payment) -> Option<ApprovalKind> {
    match payment.payment_type.as_str() {
        "full" => Some(ApprovalKind::Full),
        "emi" => match (payment.current_emi, payment.emi_duration) {
            (Some(current), Some(total)) if current >= total => Some(ApprovalKind::FinalEmi),
            _ => Some(ApprovalKind::RegularEmi),
        },
        _ => None,
    }
}

/// End date for a permanent enrollment: far enough in the future that it
/// never triggers expiry handling. The `is_permanent` flag is what actually
/// grants lifelong access.
fn permanent_end_date(today: NaiveDate) -> NaiveDate {
    today
        .with_year(today.year() + 100)
        // Feb 29 may not exist 100 years out
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(today.year() + 100, 3, 1).unwrap())
}

/// Extend an enrollment by 30 days from its current end date, or from today
/// when the enrollment has already lapsed.
fn extended_end_date(existing: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    let base = existing.filter(|d| *d > today).unwrap_or(today);
    base + Duration::days(30)
}

fn approval_message(
    kind: ApprovalKind,
    course_name: &str,
    batch_name: &str,
    next_due: Option<NaiveDate>,
) -> String {
    let header = format!(
        "Your payment has been approved!\n\nCourse: {course_name}\nBatch: {batch_name}\n\n"
    );
    match kind {
        ApprovalKind::Full => {
            format!("{header}Your enrollment is now active with lifelong access.")
        }
        ApprovalKind::FinalEmi => format!(
            "{header}Congratulations! All EMI payments completed. Your enrollment is now active with lifelong access."
        ),
        ApprovalKind::RegularEmi => {
            let due = next_due
                .map(|d| d.format("%b %-d, %Y").to_string())
                .unwrap_or_else(|| "N/A".to_string());
            format!("{header}Next EMI Due: {due}")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApprovePaymentRequest {
    #[serde(default)]
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Approve a payment and grant the matching course access.
///
/// The primary operation is the payment flip plus the enrollment update.
/// Recording the next EMI due date and notifying the student are best-effort
/// side effects: failures are logged, never surfaced.
pub async fn approve_payment_handler(
    State(state): State<AppState>,
    _user: FinanceUser,
    Json(payload): Json<ApprovePaymentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let payment_id = payload
        .payment_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("payment_id"))?;

    let payment = state
        .db
        .get_payment(payment_id)
        .await?
        .ok_or_else(ApiError::payment_not_found)?;

    let kind = classify_payment(&payment).ok_or_else(|| {
        ApiError::invalid_field("payment_type", "expected 'full' or 'emi'")
    })?;

    info!(
        "Approving payment {} ({:?}) for enrollment {}",
        payment.payment_id, kind, payment.enrollment_id
    );

    state
        .db
        .approve_payment(payment_id, Utc::now().naive_utc())
        .await?;

    let today = Local::now().date_naive();
    let (new_end_date, permanent) = match kind {
        ApprovalKind::Full | ApprovalKind::FinalEmi => (permanent_end_date(today), true),
        ApprovalKind::RegularEmi => {
            let enrollment = state
                .db
                .get_enrollment(&payment.enrollment_id)
                .await?
                .ok_or_else(|| {
                    ApiError::with_message(ErrorCode::EnrollmentNotFound, "Enrollment not found")
                })?;
            (extended_end_date(enrollment.end_date, today), false)
        }
    };

    state
        .db
        .update_enrollment_approval(&payment.enrollment_id, new_end_date, permanent)
        .await?;

    // Every EMI payment schedules the next installment 30 days out.
    let mut next_due = None;
    if payment.payment_type == "emi" {
        let due = today + Duration::days(30);
        next_due = Some(due);
        if let Err(e) = state.db.set_next_emi_due_date(payment_id, due).await {
            error!("Failed to update next EMI due date for {payment_id}: {e}");
        }
    }

    // Best-effort student notification.
    match state
        .db
        .enrollment_notification_context(&payment.enrollment_id)
        .await
    {
        Ok(Some(ctx)) => {
            let message = approval_message(
                kind,
                ctx.course_name.as_deref().unwrap_or("course"),
                ctx.batch_name.as_deref().unwrap_or("your course"),
                next_due,
            );
            if let Err(e) = state.db.insert_notification(&ctx.student_id, &message).await {
                error!("Failed to create payment approval notification: {e}");
            }
        }
        Ok(None) => {
            error!(
                "Could not fetch enrollment {} for notification",
                payment.enrollment_id
            );
        }
        Err(e) => {
            error!("Error creating payment approval notification: {e}");
        }
    }

    Ok(Json(MessageResponse {
        message: "Payment approved successfully".to_string(),
    }))
}

// ============================================================================
// Payment listings
// ============================================================================

/// All payments with student/batch/course context, for the finance desk.
pub async fn get_all_payments_handler(
    State(state): State<AppState>,
    _user: FinanceUser,
) -> Result<Json<ApiResponse<Vec<PaymentDetail>>>, ApiError> {
    let details = state.db.payment_details(false).await?;
    Ok(ApiResponse::ok(details))
}

/// Payments visible to one center: its own batches plus students it referred.
pub async fn get_center_payments_handler(
    State(state): State<AppState>,
    user: CenterUser,
) -> Result<Json<ApiResponse<Vec<PaymentDetail>>>, ApiError> {
    let center_id = resolve_center_id(&user.0, &state.db).await?;

    let details = state.db.payment_details(false).await?;
    let filtered: Vec<PaymentDetail> = details
        .into_iter()
        .filter(|d| {
            let direct = d.batch_center_id.as_deref() == Some(center_id.as_str());
            let referred = d.is_referred.unwrap_or(false)
                && d.referred_by_center.as_deref() == Some(center_id.as_str());
            direct || referred
        })
        .collect();

    Ok(ApiResponse::ok(filtered))
}

#[derive(Debug, Deserialize)]
pub struct EditPaymentDurationRequest {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub new_course_duration: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedPaymentResponse {
    pub success: bool,
    pub message: String,
    pub data: Payment,
}

/// Change the course duration recorded on a payment.
pub async fn edit_payment_duration_handler(
    State(state): State<AppState>,
    _user: FinanceUser,
    Json(payload): Json<EditPaymentDurationRequest>,
) -> Result<Json<UpdatedPaymentResponse>, ApiError> {
    let (payment_id, duration) = match (payload.payment_id.as_deref(), payload.new_course_duration)
    {
        (Some(id), Some(duration)) if !id.trim().is_empty() => (id, duration),
        _ => {
            return Err(ApiError::with_message(
                ErrorCode::MissingField,
                "Payment ID and new course duration are required",
            ))
        }
    };

    let updated = state.db.update_course_duration(payment_id, duration).await?;
    if updated == 0 {
        return Err(ApiError::payment_not_found());
    }

    let payment = state
        .db
        .get_payment(payment_id)
        .await?
        .ok_or_else(ApiError::payment_not_found)?;

    Ok(Json(UpdatedPaymentResponse {
        success: true,
        message: "Course duration updated successfully".to_string(),
        data: payment,
    }))
}

// ============================================================================
// Student payment details
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StudentInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmiSummary {
    pub total_emis: i32,
    pub paid_emis: i32,
    pub remaining_emis: i32,
    pub next_due_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct StudentPaymentDetails {
    pub registration_number: String,
    pub batch_id: String,
    pub payment_type: Option<String>,
    pub payment_history: Vec<Payment>,
    pub student_info: StudentInfo,
    pub emi_summary: Option<EmiSummary>,
}

/// Payment history of a student in a batch, with an EMI summary when the
/// latest payment is an installment plan.
pub async fn get_student_payment_details_handler(
    State(state): State<AppState>,
    _user: AcademicUser,
    Path((registration_number, batch_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<StudentPaymentDetails>>, ApiError> {
    validate_not_empty(&registration_number, "registration_number")?;
    validate_not_empty(&batch_id, "batch_id")?;

    let student = state
        .db
        .find_student_by_registration(&registration_number)
        .await?
        .ok_or_else(|| ApiError::with_message(ErrorCode::StudentNotFound, "Student not found"))?;

    let enrollment = state
        .db
        .find_enrollment(&batch_id, &student.student_id)
        .await?
        .ok_or_else(|| {
            ApiError::with_message(
                ErrorCode::EnrollmentNotFound,
                "Student not enrolled in this batch",
            )
        })?;

    let payments = state
        .db
        .payments_for_enrollment(&enrollment.enrollment_id)
        .await?;

    let latest = payments.first();
    let emi_summary = latest
        .filter(|p| p.payment_type == "emi")
        .map(|p| {
            let total = p.emi_duration.unwrap_or(0);
            let paid = p.current_emi.unwrap_or(0);
            EmiSummary {
                total_emis: total,
                paid_emis: paid,
                remaining_emis: total - paid,
                next_due_date: p.next_emi_due_date,
            }
        });

    let details = StudentPaymentDetails {
        registration_number,
        batch_id,
        payment_type: latest.map(|p| p.payment_type.clone()),
        payment_history: payments.clone(),
        student_info: StudentInfo {
            name: student.name,
            email: student.email,
            contact: student.phone,
        },
        emi_summary,
    };

    Ok(ApiResponse::ok(details))
}
