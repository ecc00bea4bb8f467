//! Billing-cycle and revenue-share calculations.
//!
//! Every month is split into three billing cycles. Each cycle has a payment
//! collection period and a three-day invoice generation window that opens the
//! day after the period closes:
//!
//! - Cycle 1: payments 1–10, generation 11–13
//! - Cycle 2: payments 11–20, generation 21–23
//! - Cycle 3: payments 21–end of month, generation 1–3 of the next month
//!
//! Days 1–3 of a month therefore belong to cycle 3 of the *previous* month,
//! which is in its generation window at that point.
//!
//! Invoice numbers are sequential per center within a fiscal year (April 1 to
//! March 31): `{CENTER_SEGMENT}/INV/{YY-YY}/{SEQ}` with a three-digit,
//! zero-padded sequence.
//!
//! Everything in this module is pure computation over calendar dates and
//! amounts; no I/O, no failure modes beyond malformed input dates (which the
//! caller guarantees are well-formed `NaiveDate`s).

use chrono::{Datelike, NaiveDate};

/// Course fees are stored tax-inclusive at 18%; dividing by this yields the
/// net amount.
pub const TAX_DIVISOR: f64 = 1.18;

/// Share of the net amount owed to a center for a directly enrolled student.
pub const DIRECT_SHARE: f64 = 0.80;

/// Share of the net amount owed to a center for a student it referred.
pub const REFERRED_SHARE: f64 = 0.20;

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Number of days in a Gregorian month, leap years included.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    ymd(next_year, next_month, 1).pred_opt().unwrap().day()
}

/// A billing cycle: payment period plus its invoice generation window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceCycle {
    /// 1, 2, or 3.
    pub cycle_number: u8,
    /// First day of the payment collection period.
    pub period_start: NaiveDate,
    /// Last day of the payment collection period (inclusive).
    pub period_end: NaiveDate,
    /// First day invoices for this cycle may be generated.
    pub generation_start: NaiveDate,
    /// Last day invoices for this cycle may be generated (inclusive).
    pub generation_end: NaiveDate,
    /// Year of the month the payment period belongs to.
    pub year: i32,
    /// Month (1-based) the payment period belongs to.
    pub month: u32,
}

impl InvoiceCycle {
    /// Classify a calendar date into its billing cycle.
    pub fn for_date(date: NaiveDate) -> Self {
        let day = date.day();
        let year = date.year();
        let month = date.month();

        if day <= 3 {
            // Generation window of the previous month's cycle 3.
            let (prev_year, prev_month) = if month == 1 {
                (year - 1, 12)
            } else {
                (year, month - 1)
            };
            let last_day = days_in_month(prev_year, prev_month);
            Self {
                cycle_number: 3,
                period_start: ymd(prev_year, prev_month, 21),
                period_end: ymd(prev_year, prev_month, last_day),
                generation_start: ymd(year, month, 1),
                generation_end: ymd(year, month, 3),
                year: prev_year,
                month: prev_month,
            }
        } else if day <= 13 {
            Self {
                cycle_number: 1,
                period_start: ymd(year, month, 1),
                period_end: ymd(year, month, 10),
                generation_start: ymd(year, month, 11),
                generation_end: ymd(year, month, 13),
                year,
                month,
            }
        } else if day <= 23 {
            Self {
                cycle_number: 2,
                period_start: ymd(year, month, 11),
                period_end: ymd(year, month, 20),
                generation_start: ymd(year, month, 21),
                generation_end: ymd(year, month, 23),
                year,
                month,
            }
        } else {
            // Cycle 3 runs to the end of the month; its generation window
            // rolls into the next month (and next year in December).
            let last_day = days_in_month(year, month);
            let (next_year, next_month) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            Self {
                cycle_number: 3,
                period_start: ymd(year, month, 21),
                period_end: ymd(year, month, last_day),
                generation_start: ymd(next_year, next_month, 1),
                generation_end: ymd(next_year, next_month, 3),
                year,
                month,
            }
        }
    }

    /// Whether invoices for this cycle may be generated on `today`.
    ///
    /// Date-only comparison, inclusive at both ends of the window.
    pub fn can_generate_on(&self, today: NaiveDate) -> bool {
        self.generation_start <= today && today <= self.generation_end
    }

    /// Whether a payment made on `date` falls inside this cycle's period.
    pub fn contains_payment_date(&self, date: NaiveDate) -> bool {
        self.period_start <= date && date <= self.period_end
    }
}

/// A fiscal year window (April 1 through March 31) with its `YY-YY` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalYear {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl FiscalYear {
    /// The fiscal year containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let start_year = if date.month() >= 4 {
            date.year()
        } else {
            date.year() - 1
        };
        let end_year = start_year + 1;
        Self {
            start: ymd(start_year, 4, 1),
            end: ymd(end_year, 3, 31),
            label: format!(
                "{:02}-{:02}",
                start_year.rem_euclid(100),
                end_year.rem_euclid(100)
            ),
        }
    }
}

/// Net amount of a tax-inclusive fee.
pub fn net_amount(gross_fee: f64) -> f64 {
    gross_fee / TAX_DIVISOR
}

/// Center share of a net amount: 80% for a direct student, 20% for a
/// student the center referred.
pub fn center_share(net: f64, direct_student: bool) -> f64 {
    if direct_student {
        net * DIRECT_SHARE
    } else {
        net * REFERRED_SHARE
    }
}

/// Strip everything but ASCII alphanumerics and uppercase the rest.
pub fn sanitize_code(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_uppercase()
}

/// Initials of a name: first character of each whitespace-separated word.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_uppercase()
}

/// Resolve the invoice-number center segment.
///
/// Candidates are tried in order; the first that sanitizes to a non-empty
/// code wins. Falls back to the initials of the center name, then to "INV".
pub fn center_segment(candidates: &[Option<&str>], center_name: &str) -> String {
    for candidate in candidates.iter().flatten() {
        let code = sanitize_code(candidate);
        if !code.is_empty() {
            return code;
        }
    }
    let fallback = initials(center_name);
    if fallback.is_empty() {
        "INV".to_string()
    } else {
        fallback
    }
}

/// Format a full invoice number: `{SEGMENT}/INV/{FY_LABEL}/{SEQ}`.
pub fn format_invoice_number(segment: &str, fiscal_label: &str, sequence: i64) -> String {
    format!("{}/INV/{}/{:03}", segment, fiscal_label, sequence)
}
