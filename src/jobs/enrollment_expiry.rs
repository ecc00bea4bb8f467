//! Enrollment expiry job.
//!
//! Deactivates enrollments whose end date has passed. Permanent enrollments
//! (full payment or completed EMI plan) are excluded; a NULL flag counts as
//! not permanent.

use chrono::Local;
use tracing::debug;

use crate::server::database::Database;

use super::JobError;

/// Sweep expired enrollments.
///
/// Flips `status = false` on every enrollment where:
/// - `end_date < today`
/// - `is_permanent` is not true
///
/// Returns the number of enrollments that were deactivated.
pub async fn run_enrollment_expiry_sweep(db: &Database) -> Result<u64, JobError> {
    let today = Local::now().date_naive();

    debug!("Checking for expired enrollments before {}", today);

    let count = db.expire_enrollments(today).await?;

    Ok(count)
}
