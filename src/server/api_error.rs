//! Standardized API error responses for all campusfin endpoints.
//!
//! All error responses follow this JSON structure:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "PAYMENT_NOT_FOUND",
//!     "message": "The requested payment does not exist",
//!     "details": null
//!   }
//! }
//! ```
//!
//! The `details` field is optional and may contain additional context.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::server::validation::ValidationError;

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error
/// handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === Missing Resources (404) ===
    /// Payment was not found in the database
    PaymentNotFound,
    /// Enrollment was not found for the payment
    EnrollmentNotFound,
    /// Student was not found
    StudentNotFound,
    /// Invoice was not found
    InvoiceNotFound,
    /// Center was not found (or is not assigned to the caller)
    CenterNotFound,
    /// State was not found for the calling state admin
    StateNotFound,

    // === Validation Errors (400) ===
    /// Request payload is invalid or malformed
    InvalidRequest,
    /// A required field is missing
    MissingField,
    /// A field value is invalid
    InvalidField,

    // === Invoice Workflow Errors (400) ===
    /// Today is outside the cycle's invoice generation window
    GenerationWindowClosed,
    /// An invoice for this center and cycle already exists
    InvoiceAlreadyExists,
    /// No un-invoiced payments fall inside the cycle
    NoInvoiceablePayments,
    /// The requested status does not follow the workflow chain
    InvalidStatusTransition,

    // === Authentication Errors (400/401/403) ===
    /// No authentication token provided
    MissingToken,
    /// Authorization header is malformed
    InvalidHeader,
    /// Authentication token is invalid
    InvalidToken,
    /// Authentication token has expired
    TokenExpired,
    /// The caller's role may not perform this operation
    RoleNotAllowed,
    /// The resource belongs to a different center or state
    CenterMismatch,

    // === Server Errors (5xx) ===
    /// Database operation failed
    DatabaseError,
    /// Document storage operation failed
    StorageError,
    /// PDF rendering failed
    PdfError,
    /// Server configuration error
    ConfigError,
    /// Unexpected internal server error
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            ErrorCode::InvalidRequest
            | ErrorCode::MissingField
            | ErrorCode::InvalidField
            | ErrorCode::InvalidHeader
            | ErrorCode::GenerationWindowClosed
            | ErrorCode::InvoiceAlreadyExists
            | ErrorCode::NoInvoiceablePayments
            | ErrorCode::InvalidStatusTransition => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            ErrorCode::MissingToken | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            ErrorCode::RoleNotAllowed | ErrorCode::CenterMismatch => StatusCode::FORBIDDEN,

            // 404 Not Found
            ErrorCode::PaymentNotFound
            | ErrorCode::EnrollmentNotFound
            | ErrorCode::StudentNotFound
            | ErrorCode::InvoiceNotFound
            | ErrorCode::CenterNotFound
            | ErrorCode::StateNotFound => StatusCode::NOT_FOUND,

            // 500 Internal Server Error
            ErrorCode::DatabaseError
            | ErrorCode::StorageError
            | ErrorCode::PdfError
            | ErrorCode::ConfigError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::PaymentNotFound => "The requested payment does not exist",
            ErrorCode::EnrollmentNotFound => "Enrollment not found",
            ErrorCode::StudentNotFound => "Student not found",
            ErrorCode::InvoiceNotFound => "Invoice not found",
            ErrorCode::CenterNotFound => "Center not found",
            ErrorCode::StateNotFound => "State not found",
            ErrorCode::InvalidRequest => "Request payload is invalid",
            ErrorCode::MissingField => "A required field is missing",
            ErrorCode::InvalidField => "A field value is invalid",
            ErrorCode::GenerationWindowClosed => {
                "Invoice can only be generated during the generation period for each cycle"
            }
            ErrorCode::InvoiceAlreadyExists => "Invoice already generated for this cycle",
            ErrorCode::NoInvoiceablePayments => "No payments available for invoice generation",
            ErrorCode::InvalidStatusTransition => "Invalid invoice status transition",
            ErrorCode::MissingToken => "Access denied, no token provided",
            ErrorCode::InvalidHeader => "Authorization header is malformed",
            ErrorCode::InvalidToken => "Invalid token",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::RoleNotAllowed => "Access denied, you are not authorized",
            ErrorCode::CenterMismatch => "Access denied for this center",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::StorageError => "Document storage operation failed",
            ErrorCode::PdfError => "PDF rendering failed",
            ErrorCode::ConfigError => "Server configuration error",
            ErrorCode::InternalError => "An unexpected error occurred",
        }
    }
}

/// The inner error object containing code, message, and optional details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field name, constraint violated, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Standardized API error response.
///
/// This is the top-level error response returned by all API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorBody,
}

impl ApiError {
    /// Creates a new API error with the given code.
    ///
    /// Uses the default message for the error code.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: code.default_message().to_string(),
                details: None,
            },
        }
    }

    /// Creates a new API error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.error.code.status_code()
    }

    // === Convenience constructors for common errors ===

    /// Payment not found error.
    pub fn payment_not_found() -> Self {
        Self::with_message(ErrorCode::PaymentNotFound, "Payment not found")
    }

    /// Invoice not found error.
    pub fn invoice_not_found() -> Self {
        Self::with_message(ErrorCode::InvoiceNotFound, "Invoice not found")
    }

    /// Missing required field error.
    pub fn missing_field(field: &str) -> Self {
        Self {
            error: ErrorBody {
                code: ErrorCode::MissingField,
                message: format!("Required field '{}' is missing", field),
                details: Some(serde_json::json!({ "field": field })),
            },
        }
    }

    /// Invalid field error with field details.
    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self {
            error: ErrorBody {
                code: ErrorCode::InvalidField,
                message: format!("Invalid value for '{}': {}", field, reason),
                details: Some(serde_json::json!({ "field": field })),
            },
        }
    }

    /// Internal server error.
    pub fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error.message)
    }
}

impl std::error::Error for ApiError {}

// === Conversions from internal error types ===

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::ConfigError(msg) => ApiError::with_message(ErrorCode::ConfigError, msg),
            ServiceError::DatabaseError(_) => ApiError::new(ErrorCode::DatabaseError),
            ServiceError::StorageError(_) => ApiError::new(ErrorCode::StorageError),
            ServiceError::PdfError(_) => ApiError::new(ErrorCode::PdfError),
            ServiceError::ServerError(msg) => ApiError::with_message(ErrorCode::InternalError, msg),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::invalid_field(&err.field, &err.message)
    }
}
