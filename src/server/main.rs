use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use campusfin::config::init_config;
use campusfin::jobs::JobScheduler;
use campusfin::server::auth::AuthState;
use campusfin::server::database::Database;
use campusfin::server::handlers::AppState;
use campusfin::server::routes::build_router;
use campusfin::storage::DocumentStore;

#[tokio::main]
async fn main() {
    // Load configuration before anything else so startup failures are loud.
    let config = match init_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting campusfin financial service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = match Database::new().await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {e}");
            std::process::exit(1);
        }
    };

    let auth = match AuthState::from_config(&config.auth) {
        Ok(auth) => auth,
        Err(e) => {
            error!("Failed to initialize authentication: {e}");
            std::process::exit(1);
        }
    };

    let documents = Arc::new(DocumentStore::from_config(&config.storage));

    let state = AppState {
        db: Arc::clone(&db),
        documents,
    };
    let app = build_router(state, auth);

    // The scheduler handle must stay alive for the jobs to keep firing.
    let mut _scheduler = None;
    if config.jobs.enabled {
        match JobScheduler::new(Arc::clone(&db), config.jobs.clone()).await {
            Ok(scheduler) => {
                if let Err(e) = scheduler.start().await {
                    error!("Failed to start job scheduler: {e}");
                } else {
                    _scheduler = Some(scheduler);
                }
            }
            Err(e) => error!("Failed to create job scheduler: {e}"),
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("Financial service listening on http://{addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
