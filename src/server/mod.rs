//! Server-side components for campusfin.
//!
//! This module contains:
//! - `database`   - DB abstraction over SQLite/Postgres
//! - `handlers`   - Payment approval and listing handlers
//! - `invoices`   - Invoice generation and workflow handlers
//! - `revenue`    - Revenue statistics
//! - `routes`     - Router builder
//! - `auth`       - JWT role-gate middleware
//! - `api_error`  - Standardized API error envelope
//! - `logging`    - Request logging middleware and health endpoint
//! - `validation` - Request validation utilities

pub mod api_error;
pub mod auth;
pub mod database;
pub mod handlers;
pub mod invoices;
pub mod logging;
pub mod revenue;
pub mod routes;
pub mod validation;

// Convenient re-exports so callers can do `campusfin::server::X`
// instead of digging into submodules.

pub use api_error::{ApiError, ErrorCode};
pub use auth::{
    AcademicUser, AuthError, AuthState, AuthUser, CenterUser, Claims, FinanceUser, InvoiceUser,
    JwtValidator, Role, StateUser,
};
pub use database::Database;
pub use handlers::{ApiResponse, AppState};
pub use invoices::InvoiceStatus;
pub use logging::{health_handler, request_logging_middleware, HealthResponse};
pub use routes::build_router;
pub use validation::{validate_not_empty, validate_uuid, ValidationError, ValidationResult};
