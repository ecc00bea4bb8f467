//! Background job scheduler for campusfin.
//!
//! # Available Jobs
//!
//! - **Enrollment Expiry**: once-daily sweep that deactivates enrollments
//!   whose end date has passed, leaving permanent enrollments untouched
//!
//! # Usage
//!
//! ```rust,ignore
//! use campusfin::jobs::JobScheduler;
//! use campusfin::server::Database;
//!
//! let db = Database::new().await?;
//! let config = campusfin::config::get_config()?.jobs.clone();
//! let scheduler = JobScheduler::new(db, config).await?;
//! scheduler.start().await?;
//! ```

use std::sync::Arc;

use chrono::Local;
use tokio_cron_scheduler::{Job, JobScheduler as TokioJobScheduler};
use tracing::{error, info};

use crate::config::JobsConfig;
use crate::server::database::Database;

mod enrollment_expiry;

pub use enrollment_expiry::run_enrollment_expiry_sweep;

/// Background job scheduler for campusfin.
pub struct JobScheduler {
    scheduler: TokioJobScheduler,
    db: Arc<Database>,
    config: JobsConfig,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub async fn new(db: Arc<Database>, config: JobsConfig) -> Result<Self, JobError> {
        let scheduler = TokioJobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            db,
            config,
        })
    }

    /// Start the job scheduler with all configured jobs.
    pub async fn start(&self) -> Result<(), JobError> {
        info!("Starting campusfin job scheduler");

        self.add_enrollment_expiry_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("Campusfin job scheduler started successfully");

        Ok(())
    }

    /// Stop the job scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        info!("Shutting down campusfin job scheduler");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;
        Ok(())
    }

    /// Add the daily enrollment expiry job.
    async fn add_enrollment_expiry_job(&self) -> Result<(), JobError> {
        let db = Arc::clone(&self.db);

        let job = Job::new_async(
            self.config.enrollment_expiry_cron.as_str(),
            move |_uuid, _l| {
                let db = Arc::clone(&db);
                Box::pin(async move {
                    let today = Local::now().date_naive();
                    info!("Running enrollment expiry sweep for {}", today);

                    match run_enrollment_expiry_sweep(&db).await {
                        Ok(count) => {
                            info!(
                                "Enrollment expiry sweep: {} enrollments expired (permanent enrollments excluded)",
                                count
                            );
                        }
                        Err(e) => {
                            error!("Enrollment expiry sweep failed: {}", e);
                        }
                    }
                })
            },
        )
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!(
            "Added enrollment expiry job (schedule: {})",
            self.config.enrollment_expiry_cron
        );

        Ok(())
    }

    /// Run the enrollment expiry sweep immediately (manual triggers, tests).
    pub async fn run_enrollment_expiry_now(&self) -> Result<u64, JobError> {
        run_enrollment_expiry_sweep(&self.db).await
    }
}

/// Errors that can occur in the job scheduler.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<crate::errors::ServiceError> for JobError {
    fn from(err: crate::errors::ServiceError) -> Self {
        JobError::DatabaseError(err.to_string())
    }
}
