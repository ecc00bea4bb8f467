//! JWT authentication and role gates for the campusfin API.
//!
//! Every route is gated by one of five role groups, implemented as axum
//! extractors over a shared JWT validator:
//!
//! - [`FinanceUser`]  - financial, admin, manager
//! - [`CenterUser`]   - center, financial, admin, manager
//! - [`StateUser`]    - state, financial, admin, manager
//! - [`InvoiceUser`]  - state, financial, admin, manager, center
//! - [`AcademicUser`] - academic, financial
//!
//! ```rust,ignore
//! async fn approve_handler(user: FinanceUser) -> impl IntoResponse {
//!     format!("approved by {}", user.0.id)
//! }
//! ```
//!
//! # Configuration
//!
//! Set via environment variables or config.toml:
//! - `CAMPUSFIN_JWT_SECRET` - Required secret key for HS256 signing
//! - `CAMPUSFIN_JWT_ISSUER` - Expected issuer claim (default: "campusfin")
//! - `CAMPUSFIN_JWT_AUDIENCE` - Expected audience claim (default: "campusfin-api")

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::errors::{ServiceError, ServiceResult};
use crate::server::api_error::{ApiError, ErrorCode};

/// Platform roles carried in JWT tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Center,
    State,
    Financial,
    Manager,
    Admin,
    Academic,
}

impl Role {
    /// Parse a role string, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "center" => Some(Role::Center),
            "state" => Some(Role::State),
            "financial" => Some(Role::Financial),
            "manager" => Some(Role::Manager),
            "admin" => Some(Role::Admin),
            "academic" => Some(Role::Academic),
            _ => None,
        }
    }

    /// The canonical lowercase name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Center => "center",
            Role::State => "state",
            Role::Financial => "financial",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Academic => "academic",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Role name (e.g. "center", "financial")
    pub role: String,
    /// Center id, present for center-scoped accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_id: Option<String>,
    /// Short display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Full display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

/// Authenticated caller extracted from a JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The subject from the JWT (user id)
    pub id: String,
    /// Parsed role
    pub role: Role,
    /// Center id from the token, when present
    pub center_id: Option<String>,
    /// Short display name from the token
    pub name: Option<String>,
    /// Full display name from the token
    pub full_name: Option<String>,
}

/// Authentication errors.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Missing Authorization header
    MissingToken,
    /// Invalid Authorization header format
    InvalidHeader,
    /// Token validation failed
    InvalidToken(String),
    /// Token has expired
    TokenExpired,
    /// Role is not part of the gate for this route
    RoleNotAllowed(String),
    /// Auth state missing from the router (server misconfiguration)
    NotConfigured,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Access denied, no token provided"),
            AuthError::InvalidHeader => write!(f, "invalid authorization header format"),
            AuthError::InvalidToken(msg) => write!(f, "Invalid token: {msg}"),
            AuthError::TokenExpired => write!(f, "token has expired"),
            AuthError::RoleNotAllowed(role) => {
                write!(f, "Access denied: role {role} not authorized")
            }
            AuthError::NotConfigured => write!(f, "authentication is not configured"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = match &err {
            AuthError::MissingToken => ErrorCode::MissingToken,
            AuthError::InvalidHeader => ErrorCode::InvalidHeader,
            AuthError::InvalidToken(_) => ErrorCode::InvalidToken,
            AuthError::TokenExpired => ErrorCode::TokenExpired,
            AuthError::RoleNotAllowed(_) => ErrorCode::RoleNotAllowed,
            AuthError::NotConfigured => ErrorCode::ConfigError,
        };
        ApiError::with_message(code, err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// JWT validator for token verification.
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    expiration_secs: u64,
}

impl JwtValidator {
    /// Create a new JWT validator from auth configuration.
    pub fn from_config(config: &AuthConfig) -> ServiceResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(ServiceError::ConfigError(
                "auth.jwt_secret is required".to_string(),
            ));
        }

        // Resolve secret (support env: prefix for environment variable)
        let secret = if let Some(env_var) = config.jwt_secret.strip_prefix("env:") {
            std::env::var(env_var).map_err(|_| {
                ServiceError::ConfigError(format!(
                    "environment variable '{env_var}' not found for jwt_secret"
                ))
            })?
        } else {
            config.jwt_secret.clone()
        };

        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiration_secs: config.token_expiration_secs,
        })
    }

    /// Validate a JWT token and extract claims.
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })
    }

    /// Create a new JWT token for a user.
    ///
    /// Used by the test suites and by operators minting service tokens.
    pub fn create_token(
        &self,
        subject: &str,
        role: &str,
        center_id: Option<&str>,
    ) -> ServiceResult<String> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| ServiceError::ServerError(format!("system time error: {e}")))?
            .as_secs();

        let claims = Claims {
            sub: subject.to_string(),
            role: role.to_string(),
            center_id: center_id.map(String::from),
            name: None,
            full_name: None,
            iat: now,
            exp: now + self.expiration_secs,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::ServerError(format!("failed to create token: {e}")))
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

/// Shared authentication state, attached to the router as an extension.
#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<JwtValidator>,
}

impl AuthState {
    /// Create auth state from configuration.
    pub fn from_config(config: &AuthConfig) -> ServiceResult<Self> {
        Ok(Self {
            validator: Arc::new(JwtValidator::from_config(config)?),
        })
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState").finish()
    }
}

/// Shared extraction: validate the bearer token and parse the role.
fn authenticate(parts: &mut Parts) -> Result<AuthUser, AuthError> {
    let auth_state = parts
        .extensions
        .get::<AuthState>()
        .cloned()
        .ok_or(AuthError::NotConfigured)?;

    let auth_header = parts
        .headers
        .get("Authorization")
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidHeader)?;

    let token_data = auth_state.validator.validate_token(token)?;
    let claims = token_data.claims;

    let role =
        Role::parse(&claims.role).ok_or_else(|| AuthError::RoleNotAllowed(claims.role.clone()))?;

    Ok(AuthUser {
        id: claims.sub,
        role,
        center_id: claims.center_id,
        name: claims.name,
        full_name: claims.full_name,
    })
}

fn require_role(user: AuthUser, allowed: &[Role]) -> Result<AuthUser, AuthError> {
    if allowed.contains(&user.role) {
        Ok(user)
    } else {
        Err(AuthError::RoleNotAllowed(user.role.to_string()))
    }
}

/// Roles admitted by the finance gate.
pub const FINANCE_ROLES: &[Role] = &[Role::Financial, Role::Admin, Role::Manager];
/// Roles admitted by the center gate.
pub const CENTER_ROLES: &[Role] = &[Role::Center, Role::Financial, Role::Admin, Role::Manager];
/// Roles admitted by the state gate.
pub const STATE_ROLES: &[Role] = &[Role::State, Role::Financial, Role::Admin, Role::Manager];
/// Roles admitted by the invoice gate.
pub const INVOICE_ROLES: &[Role] = &[
    Role::State,
    Role::Financial,
    Role::Admin,
    Role::Manager,
    Role::Center,
];
/// Roles admitted by the academic gate.
pub const ACADEMIC_ROLES: &[Role] = &[Role::Academic, Role::Financial];

/// Finance gate: financial, admin, manager.
#[derive(Debug, Clone)]
pub struct FinanceUser(pub AuthUser);

/// Center gate: center, financial, admin, manager.
#[derive(Debug, Clone)]
pub struct CenterUser(pub AuthUser);

/// State gate: state, financial, admin, manager.
#[derive(Debug, Clone)]
pub struct StateUser(pub AuthUser);

/// Invoice gate: state, financial, admin, manager, center.
#[derive(Debug, Clone)]
pub struct InvoiceUser(pub AuthUser);

/// Academic gate: academic, financial.
#[derive(Debug, Clone)]
pub struct AcademicUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for FinanceUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(authenticate(parts)?, FINANCE_ROLES).map(FinanceUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CenterUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(authenticate(parts)?, CENTER_ROLES).map(CenterUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StateUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(authenticate(parts)?, STATE_ROLES).map(StateUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for InvoiceUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(authenticate(parts)?, INVOICE_ROLES).map(InvoiceUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AcademicUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(authenticate(parts)?, ACADEMIC_ROLES).map(AcademicUser)
    }
}
