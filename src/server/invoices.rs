//! Invoice handlers: cycle payments, invoice generation, the approval
//! workflow, and the role-specific queue listings.
//!
//! The invoice workflow is a fixed chain:
//!
//! ```text
//! Pending -> MF Verified -> Finance Accepted -> Invoice Paid
//! ```
//!
//! State admins verify, finance admins accept, managers/admins mark paid.

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::billing::{self, FiscalYear, InvoiceCycle};
use crate::errors::{ServiceError, ServiceResult};
use crate::pdf::{render_invoice_pdf, InvoiceDocument, InvoiceLine};
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::auth::{AuthUser, CenterUser, FinanceUser, InvoiceUser, Role, StateUser};
use crate::server::database::{
    CenterInvoice, Database, InvoiceItem, InvoiceWithCenter, PaymentDetail, StatusHistoryEntry,
};
use crate::server::handlers::{resolve_center_id, ApiResponse, AppState};
use crate::server::validation::validate_uuid;

// ============================================================================
// Invoice workflow statuses
// ============================================================================

/// Workflow status of a center invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    MfVerified,
    FinanceAccepted,
    InvoicePaid,
}

impl InvoiceStatus {
    /// The status string stored in the database and shown to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::MfVerified => "MF Verified",
            InvoiceStatus::FinanceAccepted => "Finance Accepted",
            InvoiceStatus::InvoicePaid => "Invoice Paid",
        }
    }

    /// Parse a stored status string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(InvoiceStatus::Pending),
            "MF Verified" => Some(InvoiceStatus::MfVerified),
            "Finance Accepted" => Some(InvoiceStatus::FinanceAccepted),
            "Invoice Paid" => Some(InvoiceStatus::InvoicePaid),
            _ => None,
        }
    }

    /// The next status in the workflow chain, if any.
    pub fn next(&self) -> Option<InvoiceStatus> {
        match self {
            InvoiceStatus::Pending => Some(InvoiceStatus::MfVerified),
            InvoiceStatus::MfVerified => Some(InvoiceStatus::FinanceAccepted),
            InvoiceStatus::FinanceAccepted => Some(InvoiceStatus::InvoicePaid),
            InvoiceStatus::InvoicePaid => None,
        }
    }

    /// Whether a role is allowed to move an invoice *into* this status.
    pub fn settable_by(&self, role: Role) -> bool {
        match self {
            InvoiceStatus::Pending => false,
            InvoiceStatus::MfVerified => role == Role::State,
            InvoiceStatus::FinanceAccepted => role == Role::Financial,
            InvoiceStatus::InvoicePaid => matches!(role, Role::Manager | Role::Admin),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Shared views and helpers
// ============================================================================

/// Cycle information as sent to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleView {
    pub cycle_number: u8,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub generation_start: NaiveDate,
    pub generation_end: NaiveDate,
    pub year: i32,
    pub month: u32,
}

impl From<&InvoiceCycle> for CycleView {
    fn from(cycle: &InvoiceCycle) -> Self {
        Self {
            cycle_number: cycle.cycle_number,
            period_start: cycle.period_start,
            period_end: cycle.period_end,
            generation_start: cycle.generation_start,
            generation_end: cycle.generation_end,
            year: cycle.year,
            month: cycle.month,
        }
    }
}

/// One invoiceable payment as shown on the generate-invoice screen.
#[derive(Debug, Serialize)]
pub struct CyclePaymentView {
    pub payment_id: String,
    pub student_name: String,
    pub registration_number: String,
    pub course_name: String,
    pub course_mode: String,
    pub transaction_date: NaiveDate,
    pub fee_term: String,
    pub fee_paid: f64,
    pub net_amount: f64,
    pub total_amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub total_payments: usize,
    pub total_net_amount: f64,
    pub total_center_share: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CyclePaymentsData {
    pub cycle: CycleView,
    pub can_generate: bool,
    pub payments: Vec<CyclePaymentView>,
    pub summary: CycleSummary,
}

/// An approved, not-yet-invoiced payment of a center inside a cycle.
struct CollectedPayment {
    detail: PaymentDetail,
    direct: bool,
    net: f64,
    share: f64,
}

fn fee_term(detail: &PaymentDetail) -> String {
    if detail.payment_type == "emi" {
        if let Some(installment) = detail.current_emi {
            return format!("EMI - {installment}");
        }
    }
    "Full".to_string()
}

fn display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn window_closed_message(cycle: &InvoiceCycle) -> String {
    format!(
        "Invoice for Cycle {} (Payment Period: {} - {}) can only be generated during the generation period: {} - {}",
        cycle.cycle_number,
        display_date(cycle.period_start),
        display_date(cycle.period_end),
        display_date(cycle.generation_start),
        display_date(cycle.generation_end),
    )
}

/// Collect a center's invoiceable payments for a cycle: approved, belonging
/// to the center (directly enrolled or referred by it), dated inside the
/// payment period, and not already on an invoice.
async fn collect_cycle_payments(
    db: &Database,
    center_id: &str,
    cycle: &InvoiceCycle,
) -> Result<Vec<CollectedPayment>, ApiError> {
    let details = db.payment_details(true).await?;
    let invoiced: HashSet<String> = db.invoiced_payment_ids().await?.into_iter().collect();

    let mut collected = Vec::new();
    for detail in details {
        let direct = detail.student_center_id.as_deref() == Some(center_id);
        let referred = detail.is_referred.unwrap_or(false)
            && detail.referred_by_center.as_deref() == Some(center_id);
        if !direct && !referred {
            continue;
        }
        if !cycle.contains_payment_date(detail.created_at.date()) {
            continue;
        }
        if invoiced.contains(&detail.payment_id) {
            continue;
        }

        let net = billing::net_amount(detail.final_fees);
        let share = billing::center_share(net, direct);
        collected.push(CollectedPayment {
            detail,
            direct,
            net,
            share,
        });
    }

    let direct_count = collected.iter().filter(|c| c.direct).count();
    info!(
        "Cycle payments for center {center_id}: {} total, {} direct, {} referred",
        collected.len(),
        direct_count,
        collected.len() - direct_count
    );

    Ok(collected)
}

fn cycle_payment_view(collected: &CollectedPayment) -> CyclePaymentView {
    let detail = &collected.detail;
    CyclePaymentView {
        payment_id: detail.payment_id.clone(),
        student_name: detail.student_name.clone().unwrap_or_else(|| "N/A".into()),
        registration_number: detail
            .registration_number
            .clone()
            .unwrap_or_else(|| "N/A".into()),
        course_name: detail.course_name.clone().unwrap_or_else(|| "N/A".into()),
        course_mode: detail.course_mode.clone().unwrap_or_else(|| "Online".into()),
        transaction_date: detail.created_at.date(),
        fee_term: fee_term(detail),
        fee_paid: detail.final_fees,
        net_amount: collected.net,
        total_amount: collected.share,
    }
}

// ============================================================================
// Cycle payments (generate-invoice screen)
// ============================================================================

/// Current cycle, whether generation is open, and the payments that would go
/// on the invoice.
pub async fn get_cycle_payments_handler(
    State(state): State<AppState>,
    user: CenterUser,
) -> Result<Json<ApiResponse<CyclePaymentsData>>, ApiError> {
    let center_id = resolve_center_id(&user.0, &state.db).await?;

    let today = Local::now().date_naive();
    let cycle = InvoiceCycle::for_date(today);
    let can_generate = cycle.can_generate_on(today);

    let collected = collect_cycle_payments(&state.db, &center_id, &cycle).await?;
    let payments: Vec<CyclePaymentView> = collected.iter().map(cycle_payment_view).collect();

    let summary = CycleSummary {
        total_payments: payments.len(),
        total_net_amount: collected.iter().map(|c| c.net).sum(),
        total_center_share: collected.iter().map(|c| c.share).sum(),
    };

    Ok(ApiResponse::ok(CyclePaymentsData {
        cycle: CycleView::from(&cycle),
        can_generate,
        payments,
        summary,
    }))
}

// ============================================================================
// Invoice generation
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GeneratedInvoice {
    #[serde(flatten)]
    pub invoice: CenterInvoice,
    pub sequence_number: i64,
    pub fiscal_year: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub total_net_amount: f64,
    pub total_center_share: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInvoiceData {
    pub invoice: GeneratedInvoice,
    pub items_count: usize,
    pub summary: InvoiceTotals,
}

/// Generate the invoice for the current cycle.
///
/// Only allowed while the cycle's generation window is open, at most once per
/// center and cycle. The PDF render is a best-effort side effect; the invoice
/// record and its items are the primary operation.
pub async fn generate_invoice_handler(
    State(state): State<AppState>,
    user: CenterUser,
) -> Result<(StatusCode, Json<ApiResponse<GenerateInvoiceData>>), ApiError> {
    let center_id = resolve_center_id(&user.0, &state.db).await?;

    let today = Local::now().date_naive();
    let cycle = InvoiceCycle::for_date(today);
    if !cycle.can_generate_on(today) {
        return Err(ApiError::with_message(
            ErrorCode::GenerationWindowClosed,
            window_closed_message(&cycle),
        ));
    }

    if state
        .db
        .find_invoice_for_cycle(&center_id, cycle.cycle_number as i32, cycle.period_start)
        .await?
        .is_some()
    {
        return Err(ApiError::new(ErrorCode::InvoiceAlreadyExists));
    }

    let collected = collect_cycle_payments(&state.db, &center_id, &cycle).await?;
    if collected.is_empty() {
        return Err(ApiError::new(ErrorCode::NoInvoiceablePayments));
    }

    let center = state
        .db
        .get_center(&center_id)
        .await?
        .ok_or_else(|| ApiError::with_message(ErrorCode::CenterNotFound, "Center not found"))?;

    // Admin display names feed the invoice-number segment; tokens may not
    // carry them, in which case the user record does.
    let mut admin_name = user.0.name.clone();
    let mut admin_full_name = user.0.full_name.clone();
    if admin_name.is_none() || admin_full_name.is_none() {
        let account = match state.db.get_user(&user.0.id).await? {
            Some(account) => Some(account),
            None => match &center.center_admin {
                Some(admin_id) => state.db.get_user(admin_id).await?,
                None => None,
            },
        };
        if let Some(account) = account {
            admin_name = admin_name.or(account.name.clone()).or(account.full_name.clone());
            admin_full_name = admin_full_name.or(account.full_name).or(account.name);
        }
    }

    let now = Utc::now().naive_utc();
    let total_net_amount: f64 = collected.iter().map(|c| c.net).sum();
    let total_center_share: f64 = collected.iter().map(|c| c.share).sum();

    let invoice_id = Uuid::new_v4().to_string();
    let items: Vec<InvoiceItem> = collected
        .iter()
        .map(|c| InvoiceItem {
            item_id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.clone(),
            payment_id: c.detail.payment_id.clone(),
            student_id: c.detail.student_id.clone(),
            student_name: c.detail.student_name.clone().unwrap_or_else(|| "N/A".into()),
            registration_number: c
                .detail
                .registration_number
                .clone()
                .unwrap_or_else(|| "N/A".into()),
            course_name: c.detail.course_name.clone().unwrap_or_else(|| "N/A".into()),
            transaction_date: c.detail.created_at.date(),
            fee_term: fee_term(&c.detail),
            fee_paid: c.detail.final_fees,
            net_amount: c.net,
            center_share: c.share,
            created_at: now,
        })
        .collect();

    let mut invoice = CenterInvoice {
        invoice_id: invoice_id.clone(),
        center_id: center_id.clone(),
        invoice_number: None,
        invoice_date: today,
        period_start: cycle.period_start,
        period_end: cycle.period_end,
        cycle_number: cycle.cycle_number as i32,
        total_net_amount,
        total_center_share,
        status: InvoiceStatus::Pending.as_str().to_string(),
        pdf_url: None,
        created_by: Some(user.0.id.clone()),
        created_at: now,
    };
    state.db.insert_invoice(&invoice).await?;

    // Sequence number within the fiscal year, counting the fresh row.
    let fiscal_year = FiscalYear::containing(invoice.invoice_date);
    let sequence = state
        .db
        .count_center_invoices_between(&center_id, fiscal_year.start, fiscal_year.end)
        .await?;

    let segment = billing::center_segment(
        &[
            admin_name.as_deref(),
            admin_full_name.as_deref(),
            center.center_username.as_deref(),
            center.center_shortcode.as_deref(),
            center.center_code.as_deref(),
        ],
        &center.center_name,
    );
    let invoice_number = billing::format_invoice_number(&segment, &fiscal_year.label, sequence);
    state
        .db
        .set_invoice_number(&invoice_id, &invoice_number)
        .await?;
    invoice.invoice_number = Some(invoice_number);

    info!(
        "Generated invoice {} for center {center_id}, cycle {} ({} payments)",
        invoice.invoice_number.as_deref().unwrap_or("-"),
        cycle.cycle_number,
        items.len()
    );

    // Best-effort PDF render and upload.
    match render_and_store_pdf(&state, &invoice, &center.center_name, &items, false).await {
        Ok(url) => invoice.pdf_url = Some(url),
        Err(e) => error!("Error generating invoice PDF for {invoice_id}: {e}"),
    }

    state.db.insert_invoice_items(&items).await?;

    let data = GenerateInvoiceData {
        invoice: GeneratedInvoice {
            invoice,
            sequence_number: sequence,
            fiscal_year: fiscal_year.label,
        },
        items_count: items.len(),
        summary: InvoiceTotals {
            total_net_amount,
            total_center_share,
        },
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            data,
        }),
    ))
}

fn invoice_document(
    invoice: &CenterInvoice,
    center_name: &str,
    items: &[InvoiceItem],
    paid: bool,
) -> InvoiceDocument {
    InvoiceDocument {
        invoice_number: invoice.invoice_number.clone().unwrap_or_default(),
        center_name: center_name.to_string(),
        invoice_date: invoice.invoice_date,
        cycle_number: invoice.cycle_number.clamp(1, 3) as u8,
        period_start: invoice.period_start,
        period_end: invoice.period_end,
        total_net_amount: invoice.total_net_amount,
        total_center_share: invoice.total_center_share,
        items: items
            .iter()
            .map(|item| InvoiceLine {
                student_name: item.student_name.clone(),
                registration_number: item.registration_number.clone(),
                course_name: item.course_name.clone(),
                transaction_date: item.transaction_date,
                fee_term: item.fee_term.clone(),
                fee_paid: item.fee_paid,
                net_amount: item.net_amount,
                center_share: item.center_share,
            })
            .collect(),
        paid,
    }
}

async fn render_and_store_pdf(
    state: &AppState,
    invoice: &CenterInvoice,
    center_name: &str,
    items: &[InvoiceItem],
    paid: bool,
) -> ServiceResult<String> {
    let document = invoice_document(invoice, center_name, items, paid);
    let bytes = render_invoice_pdf(&document)?;
    let stored = state
        .documents
        .store_invoice_pdf(&invoice.invoice_id, &bytes)
        .await?;
    state
        .db
        .set_invoice_pdf_url(&invoice.invoice_id, &stored.public_url)
        .await?;
    Ok(stored.public_url)
}

/// Re-render the stored PDF with the PAID watermark.
///
/// The invoice is already paid by the time this runs; a failed render keeps
/// the original document in place.
async fn apply_paid_watermark(state: &AppState, invoice: &CenterInvoice) -> ServiceResult<()> {
    let items = state.db.list_invoice_items(&invoice.invoice_id).await?;
    let center = state
        .db
        .get_center(&invoice.center_id)
        .await?
        .ok_or_else(|| {
            ServiceError::ServerError(format!(
                "center {} missing for invoice {}",
                invoice.center_id, invoice.invoice_id
            ))
        })?;
    render_and_store_pdf(state, invoice, &center.center_name, &items, true).await?;
    info!("PAID watermark added for invoice {}", invoice.invoice_id);
    Ok(())
}

// ============================================================================
// Invoice listings
// ============================================================================

/// All invoices of the caller's center, newest first (history tab).
pub async fn get_center_invoices_handler(
    State(state): State<AppState>,
    user: CenterUser,
) -> Result<Json<ApiResponse<Vec<CenterInvoice>>>, ApiError> {
    let center_id = resolve_center_id(&user.0, &state.db).await?;
    let invoices = state.db.list_center_invoices(&center_id).await?;
    Ok(ApiResponse::ok(invoices))
}

fn require_exact_role(user: &AuthUser, allowed: &[Role], message: &str) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::with_message(
            ErrorCode::RoleNotAllowed,
            format!("Access denied. {message}"),
        ))
    }
}

/// Center ids of the calling state admin's state.
async fn state_center_ids(db: &Database, user_id: &str) -> Result<Vec<String>, ApiError> {
    let state_id = db.state_for_admin(user_id).await?.ok_or_else(|| {
        ApiError::with_message(
            ErrorCode::StateNotFound,
            "State not found for this admin. Please ensure you are assigned to a state.",
        )
    })?;
    Ok(db.center_ids_for_state(&state_id).await?)
}

async fn invoices_for_state(
    db: &Database,
    user_id: &str,
    statuses: &[InvoiceStatus],
) -> Result<Vec<InvoiceWithCenter>, ApiError> {
    let center_ids = state_center_ids(db, user_id).await?;
    if center_ids.is_empty() {
        return Ok(Vec::new());
    }
    let members: HashSet<&str> = center_ids.iter().map(String::as_str).collect();

    let status_strs: Vec<&str> = statuses.iter().map(InvoiceStatus::as_str).collect();
    let invoices = db.list_invoices_by_statuses(&status_strs).await?;
    Ok(invoices
        .into_iter()
        .filter(|i| members.contains(i.invoice.center_id.as_str()))
        .collect())
}

/// Pending invoices from centers in the caller's state (verification queue).
pub async fn get_state_pending_invoices_handler(
    State(state): State<AppState>,
    user: StateUser,
) -> Result<Json<ApiResponse<Vec<InvoiceWithCenter>>>, ApiError> {
    require_exact_role(
        &user.0,
        &[Role::State],
        "Only State Admin can view pending invoices.",
    )?;
    let invoices = invoices_for_state(&state.db, &user.0.id, &[InvoiceStatus::Pending]).await?;
    Ok(ApiResponse::ok(invoices))
}

/// Invoices the caller's state has already verified (and beyond).
pub async fn get_state_verified_invoices_handler(
    State(state): State<AppState>,
    user: StateUser,
) -> Result<Json<ApiResponse<Vec<InvoiceWithCenter>>>, ApiError> {
    require_exact_role(
        &user.0,
        &[Role::State],
        "Only State Admin can view approved invoices.",
    )?;
    let invoices = invoices_for_state(
        &state.db,
        &user.0.id,
        &[
            InvoiceStatus::MfVerified,
            InvoiceStatus::FinanceAccepted,
            InvoiceStatus::InvoicePaid,
        ],
    )
    .await?;
    Ok(ApiResponse::ok(invoices))
}

/// State-verified invoices awaiting finance approval.
pub async fn get_finance_verified_invoices_handler(
    State(state): State<AppState>,
    user: FinanceUser,
) -> Result<Json<ApiResponse<Vec<InvoiceWithCenter>>>, ApiError> {
    require_exact_role(
        &user.0,
        &[Role::Financial],
        "Only Finance Admin can view verified invoices.",
    )?;
    let invoices = state
        .db
        .list_invoices_by_statuses(&[InvoiceStatus::MfVerified.as_str()])
        .await?;
    Ok(ApiResponse::ok(invoices))
}

/// Invoices finance has accepted (and beyond).
pub async fn get_finance_accepted_invoices_handler(
    State(state): State<AppState>,
    user: FinanceUser,
) -> Result<Json<ApiResponse<Vec<InvoiceWithCenter>>>, ApiError> {
    require_exact_role(
        &user.0,
        &[Role::Financial],
        "Only Finance Admin can view approved invoices.",
    )?;
    let invoices = state
        .db
        .list_invoices_by_statuses(&[
            InvoiceStatus::FinanceAccepted.as_str(),
            InvoiceStatus::InvoicePaid.as_str(),
        ])
        .await?;
    Ok(ApiResponse::ok(invoices))
}

/// Finance-accepted invoices awaiting final approval.
pub async fn get_manager_accepted_invoices_handler(
    State(state): State<AppState>,
    user: CenterUser,
) -> Result<Json<ApiResponse<Vec<InvoiceWithCenter>>>, ApiError> {
    require_exact_role(
        &user.0,
        &[Role::Manager, Role::Admin],
        "Only Manager or Admin can view finance accepted invoices.",
    )?;
    let invoices = state
        .db
        .list_invoices_by_statuses(&[InvoiceStatus::FinanceAccepted.as_str()])
        .await?;
    Ok(ApiResponse::ok(invoices))
}

/// Invoices with final approval (paid).
pub async fn get_manager_paid_invoices_handler(
    State(state): State<AppState>,
    user: CenterUser,
) -> Result<Json<ApiResponse<Vec<InvoiceWithCenter>>>, ApiError> {
    require_exact_role(
        &user.0,
        &[Role::Manager, Role::Admin],
        "Only Manager or Admin can view approved invoices.",
    )?;
    let invoices = state
        .db
        .list_invoices_by_statuses(&[InvoiceStatus::InvoicePaid.as_str()])
        .await?;
    Ok(ApiResponse::ok(invoices))
}

// ============================================================================
// Invoice items
// ============================================================================

/// Items of one invoice, with per-role ownership checks.
pub async fn get_invoice_items_handler(
    State(state): State<AppState>,
    user: InvoiceUser,
    Path(invoice_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<InvoiceItem>>>, ApiError> {
    validate_uuid(&invoice_id, "invoice_id")?;

    let invoice = state
        .db
        .get_invoice(&invoice_id)
        .await?
        .ok_or_else(ApiError::invoice_not_found)?;

    match user.0.role {
        Role::Center => {
            let center_id = resolve_center_id(&user.0, &state.db).await?;
            if invoice.center_id != center_id {
                return Err(ApiError::with_message(
                    ErrorCode::CenterMismatch,
                    "Access denied. This invoice does not belong to your center.",
                ));
            }
        }
        Role::State => {
            let state_id = state.db.state_for_admin(&user.0.id).await?.ok_or_else(|| {
                ApiError::with_message(
                    ErrorCode::StateNotFound,
                    "State not found for this admin. Please ensure you are assigned to a state.",
                )
            })?;
            let center = state
                .db
                .get_center(&invoice.center_id)
                .await?
                .ok_or_else(|| {
                    ApiError::with_message(
                        ErrorCode::CenterNotFound,
                        "Center not found for this invoice",
                    )
                })?;
            if center.state.as_deref() != Some(state_id.as_str()) {
                return Err(ApiError::with_message(
                    ErrorCode::CenterMismatch,
                    "Access denied. This invoice does not belong to a center in your state.",
                ));
            }
        }
        // Financial, manager, and admin see every invoice.
        _ => {}
    }

    let items = state.db.list_invoice_items(&invoice_id).await?;
    Ok(ApiResponse::ok(items))
}

// ============================================================================
// Status updates
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedInvoiceResponse {
    pub success: bool,
    pub data: CenterInvoice,
    pub message: String,
}

/// Advance an invoice along the approval workflow.
pub async fn update_invoice_status_handler(
    State(state): State<AppState>,
    user: StateUser,
    Path(invoice_id): Path<String>,
    Json(payload): Json<UpdateInvoiceStatusRequest>,
) -> Result<Json<UpdatedInvoiceResponse>, ApiError> {
    validate_uuid(&invoice_id, "invoice_id")?;

    let target = payload
        .status
        .as_deref()
        .and_then(InvoiceStatus::parse)
        .filter(|s| *s != InvoiceStatus::Pending)
        .ok_or_else(|| {
            ApiError::with_message(
                ErrorCode::InvalidField,
                "Invalid status. Must be one of: MF Verified, Finance Accepted, Invoice Paid",
            )
        })?;

    if !target.settable_by(user.0.role) {
        return Err(ApiError::with_message(
            ErrorCode::RoleNotAllowed,
            format!("Access denied. {} cannot set status to {target}", user.0.role),
        ));
    }

    let invoice = state
        .db
        .get_invoice(&invoice_id)
        .await?
        .ok_or_else(ApiError::invoice_not_found)?;

    let current = InvoiceStatus::parse(&invoice.status);
    if current.and_then(|c| c.next()) != Some(target) {
        return Err(ApiError::with_message(
            ErrorCode::InvalidStatusTransition,
            format!(
                "Invalid status transition from {} to {target}",
                invoice.status
            ),
        ));
    }

    state
        .db
        .update_invoice_status(&invoice_id, target.as_str())
        .await?;

    info!(
        "Invoice {invoice_id} moved from {} to {target} by {} ({})",
        invoice.status, user.0.id, user.0.role
    );

    // Best-effort audit trail.
    let history = StatusHistoryEntry {
        id: Uuid::new_v4().to_string(),
        invoice_id: invoice_id.clone(),
        old_status: invoice.status.clone(),
        new_status: target.as_str().to_string(),
        changed_by: user.0.id.clone(),
        notes: Some(
            payload
                .notes
                .unwrap_or_else(|| format!("Status changed by {}", user.0.role)),
        ),
        changed_at: Utc::now().naive_utc(),
    };
    if let Err(e) = state.db.insert_status_history(&history).await {
        error!("Error logging status change for invoice {invoice_id}: {e}");
    }

    // A paid invoice gets its document re-rendered with the PAID watermark.
    if target == InvoiceStatus::InvoicePaid && invoice.pdf_url.is_some() {
        if let Err(e) = apply_paid_watermark(&state, &invoice).await {
            warn!(
                "Invoice {invoice_id} marked as paid, but watermark failed ({e}). Original PDF preserved."
            );
        }
    }

    let updated = state
        .db
        .get_invoice(&invoice_id)
        .await?
        .ok_or_else(ApiError::invoice_not_found)?;

    Ok(Json(UpdatedInvoiceResponse {
        success: true,
        data: updated,
        message: format!("Invoice status updated to {target}"),
    }))
}
