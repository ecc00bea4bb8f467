use axum::{
    middleware,
    routing::{get, patch, post, put},
    Extension, Router,
};

use crate::server::auth::AuthState;
use crate::server::handlers::{
    approve_payment_handler, edit_payment_duration_handler, get_all_payments_handler,
    get_center_payments_handler, get_student_payment_details_handler, AppState,
};
use crate::server::invoices::{
    generate_invoice_handler, get_center_invoices_handler, get_cycle_payments_handler,
    get_finance_accepted_invoices_handler, get_finance_verified_invoices_handler,
    get_invoice_items_handler, get_manager_accepted_invoices_handler,
    get_manager_paid_invoices_handler, get_state_pending_invoices_handler,
    get_state_verified_invoices_handler, update_invoice_status_handler,
};
use crate::server::logging::{health_handler, request_logging_middleware};
use crate::server::revenue::get_revenue_stats_handler;

/// Build the main application router.
///
/// This is a convenience helper so `main.rs` or tests can construct the
/// router in a single call.
///
/// # Routes
///
/// ## Payment approval (finance gate unless noted)
/// - `POST /api/financial/approve` - Approve a payment
/// - `GET /api/financial/payments` - List all payments
/// - `PUT /api/financial/payment/edit` - Edit a payment's course duration
/// - `GET /api/financial/center/payments` - Center-scoped payment list (center gate)
/// - `GET /api/financial/payments/student/{registration_number}/{batch_id}` -
///   Student payment history (academic gate)
///
/// ## Invoices
/// - `GET /api/financial/invoices/cycle-payments` - Current cycle payments (center gate)
/// - `POST /api/financial/invoices/generate` - Generate the cycle invoice (center gate)
/// - `GET /api/financial/invoices` - Center invoice history (center gate)
/// - `GET /api/financial/invoices/{invoice_id}/items` - Invoice items (invoice gate)
/// - `PATCH /api/financial/invoices/{invoice_id}/status` - Advance the workflow (state gate)
/// - `GET /api/financial/invoices/state-admin/pending` - Verification queue (state gate)
/// - `GET /api/financial/invoices/state-admin/verified` - State-approved invoices (state gate)
/// - `GET /api/financial/invoices/finance-admin/verified` - Finance approval queue (finance gate)
/// - `GET /api/financial/invoices/finance-admin/accepted` - Finance-approved invoices (finance gate)
/// - `GET /api/financial/invoices/manager-admin/accepted` - Final approval queue (center gate)
/// - `GET /api/financial/invoices/manager-admin/paid` - Paid invoices (center gate)
///
/// ## Revenue
/// - `GET /api/financial/revenue/stats` - Dashboard rollups (finance gate)
///
/// ## Operations
/// - `GET /health` - Unauthenticated health probe
pub fn build_router(state: AppState, auth: AuthState) -> Router {
    Router::new()
        // Payment approval
        .route("/api/financial/approve", post(approve_payment_handler))
        .route("/api/financial/payments", get(get_all_payments_handler))
        .route(
            "/api/financial/payment/edit",
            put(edit_payment_duration_handler),
        )
        .route(
            "/api/financial/center/payments",
            get(get_center_payments_handler),
        )
        .route(
            "/api/financial/payments/student/:registration_number/:batch_id",
            get(get_student_payment_details_handler),
        )
        // Invoices
        .route(
            "/api/financial/invoices/cycle-payments",
            get(get_cycle_payments_handler),
        )
        .route(
            "/api/financial/invoices/generate",
            post(generate_invoice_handler),
        )
        .route(
            "/api/financial/invoices/state-admin/pending",
            get(get_state_pending_invoices_handler),
        )
        .route(
            "/api/financial/invoices/state-admin/verified",
            get(get_state_verified_invoices_handler),
        )
        .route(
            "/api/financial/invoices/finance-admin/verified",
            get(get_finance_verified_invoices_handler),
        )
        .route(
            "/api/financial/invoices/finance-admin/accepted",
            get(get_finance_accepted_invoices_handler),
        )
        .route(
            "/api/financial/invoices/manager-admin/accepted",
            get(get_manager_accepted_invoices_handler),
        )
        .route(
            "/api/financial/invoices/manager-admin/paid",
            get(get_manager_paid_invoices_handler),
        )
        .route(
            "/api/financial/invoices/:invoice_id/items",
            get(get_invoice_items_handler),
        )
        .route(
            "/api/financial/invoices/:invoice_id/status",
            patch(update_invoice_status_handler),
        )
        .route("/api/financial/invoices", get(get_center_invoices_handler))
        // Revenue
        .route(
            "/api/financial/revenue/stats",
            get(get_revenue_stats_handler),
        )
        // Operations
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(Extension(auth))
        .with_state(state)
}
