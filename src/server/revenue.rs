//! Revenue statistics for the admin dashboard.
//!
//! A single in-memory pass over the payment rows: approved payments drive
//! the revenue numbers, all payments drive the status overview and the
//! recent-transaction list. Nothing is persisted.

use std::collections::HashMap;

use axum::{extract::State, Json};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::server::api_error::ApiError;
use crate::server::auth::FinanceUser;
use crate::server::database::PaymentDetail;
use crate::server::handlers::{ApiResponse, AppState};

#[derive(Debug, Clone, Serialize)]
pub struct CourseRevenue {
    pub course: String,
    pub revenue: f64,
    pub count: usize,
    /// Share of total revenue, one decimal, as a display string.
    pub percentage: String,
}

#[derive(Debug, Serialize)]
pub struct MonthRevenue {
    /// Display label, e.g. "Jun 2025".
    pub month: String,
    pub revenue: f64,
    pub transactions: usize,
}

#[derive(Debug, Serialize)]
pub struct PaymentMethodTotals {
    pub emi: f64,
    pub full: f64,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusCounts {
    pub approved: usize,
    pub pending: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransaction {
    pub id: String,
    pub student_name: Option<String>,
    pub course_name: Option<String>,
    pub amount: f64,
    pub payment_type: String,
    pub status: &'static str,
    pub date: NaiveDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueStats {
    pub total_revenue: f64,
    pub monthly_revenue: f64,
    pub course_revenue: Vec<CourseRevenue>,
    pub total_transactions: usize,
    pub monthly_transactions: usize,
    pub monthly_revenue_data: Vec<MonthRevenue>,
    pub payment_methods: PaymentMethodTotals,
    pub payment_status: PaymentStatusCounts,
    pub recent_transactions: Vec<RecentTransaction>,
    pub revenue_growth: f64,
    pub average_transaction_value: f64,
    pub top_performing_course: Option<CourseRevenue>,
}

impl RevenueStats {
    fn zeroed() -> Self {
        Self {
            total_revenue: 0.0,
            monthly_revenue: 0.0,
            course_revenue: Vec::new(),
            total_transactions: 0,
            monthly_transactions: 0,
            monthly_revenue_data: Vec::new(),
            payment_methods: PaymentMethodTotals { emi: 0.0, full: 0.0 },
            payment_status: PaymentStatusCounts {
                approved: 0,
                pending: 0,
            },
            recent_transactions: Vec::new(),
            revenue_growth: 0.0,
            average_transaction_value: 0.0,
            top_performing_course: None,
        }
    }
}

/// The calendar month `offset` months before (year, month).
fn months_back(year: i32, month: u32, offset: u32) -> (i32, u32) {
    let total = year * 12 + month as i32 - 1 - offset as i32;
    (total.div_euclid(12), total.rem_euclid(12) as u32 + 1)
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap()
        .format("%b %Y")
        .to_string()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute all dashboard rollups from the full payment list.
///
/// `payments` must be sorted newest first (the recent-transaction list takes
/// the first ten rows as-is).
pub fn compute_revenue_stats(payments: &[PaymentDetail], today: NaiveDate) -> RevenueStats {
    let approved: Vec<&PaymentDetail> = payments.iter().filter(|p| p.status).collect();
    if approved.is_empty() {
        return RevenueStats::zeroed();
    }

    let total_revenue: f64 = approved.iter().map(|p| p.final_fees).sum();

    // Twelve trailing calendar months, oldest first.
    let mut monthly_revenue_data = Vec::with_capacity(12);
    for offset in (0..12).rev() {
        let (year, month) = months_back(today.year(), today.month(), offset);
        let bucket: Vec<&&PaymentDetail> = approved
            .iter()
            .filter(|p| {
                p.created_at.date().year() == year && p.created_at.date().month() == month
            })
            .collect();
        monthly_revenue_data.push(MonthRevenue {
            month: month_label(year, month),
            revenue: bucket.iter().map(|p| p.final_fees).sum(),
            transactions: bucket.len(),
        });
    }

    let current_month: Vec<&&PaymentDetail> = approved
        .iter()
        .filter(|p| {
            p.created_at.date().year() == today.year()
                && p.created_at.date().month() == today.month()
        })
        .collect();
    let monthly_revenue: f64 = current_month.iter().map(|p| p.final_fees).sum();

    let payment_methods = PaymentMethodTotals {
        emi: approved
            .iter()
            .filter(|p| p.payment_type == "emi")
            .map(|p| p.final_fees)
            .sum(),
        full: approved
            .iter()
            .filter(|p| p.payment_type == "full")
            .map(|p| p.final_fees)
            .sum(),
    };

    let payment_status = PaymentStatusCounts {
        approved: approved.len(),
        pending: payments.iter().filter(|p| !p.status).count(),
    };

    // Per-course rollup, sorted by revenue descending.
    let mut course_map: HashMap<String, (f64, usize)> = HashMap::new();
    for payment in &approved {
        let course = payment
            .course_name
            .clone()
            .unwrap_or_else(|| "Unknown Course".to_string());
        let entry = course_map.entry(course).or_insert((0.0, 0));
        entry.0 += payment.final_fees;
        entry.1 += 1;
    }
    let mut course_revenue: Vec<CourseRevenue> = course_map
        .into_iter()
        .map(|(course, (revenue, count))| CourseRevenue {
            course,
            revenue,
            count,
            percentage: format!("{:.1}", revenue / total_revenue * 100.0),
        })
        .collect();
    course_revenue.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

    let recent_transactions: Vec<RecentTransaction> = payments
        .iter()
        .take(10)
        .map(|p| RecentTransaction {
            id: p.payment_id.clone(),
            student_name: p.student_name.clone(),
            course_name: p.course_name.clone(),
            amount: p.final_fees,
            payment_type: p.payment_type.clone(),
            status: if p.status { "Approved" } else { "Pending" },
            date: p.created_at,
        })
        .collect();

    // Month-over-month growth against the previous bucket.
    let last_month_revenue = monthly_revenue_data
        .get(monthly_revenue_data.len() - 2)
        .map(|m| m.revenue)
        .unwrap_or(0.0);
    let revenue_growth = if last_month_revenue > 0.0 {
        round1((monthly_revenue - last_month_revenue) / last_month_revenue * 100.0)
    } else {
        0.0
    };

    let average_transaction_value = (total_revenue / approved.len() as f64).round();

    let top_performing_course = course_revenue.first().cloned();

    RevenueStats {
        total_revenue,
        monthly_revenue,
        course_revenue,
        total_transactions: approved.len(),
        monthly_transactions: current_month.len(),
        monthly_revenue_data,
        payment_methods,
        payment_status,
        recent_transactions,
        revenue_growth,
        average_transaction_value,
        top_performing_course,
    }
}

/// Revenue statistics for the admin dashboard.
pub async fn get_revenue_stats_handler(
    State(state): State<AppState>,
    _user: FinanceUser,
) -> Result<Json<ApiResponse<RevenueStats>>, ApiError> {
    let payments = state.db.payment_details(false).await?;
    let stats = compute_revenue_stats(&payments, Local::now().date_naive());
    Ok(ApiResponse::ok(stats))
}
