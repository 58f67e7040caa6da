// Authentication error types and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Message returned for a request without a refresh cookie
pub const NOT_LOGGED_IN: &str = "Unauthorized: Not logged in";

/// Message returned when the refresh cookie fails verification
pub const INVALID_SESSION: &str = "Unauthorized: Invalid or expired session";

/// Authentication error types
///
/// Bad signature, expiry and malformed tokens are deliberately collapsed into
/// `VerificationFailed` so callers cannot learn which check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Unknown email or wrong password, indistinguishable on the wire
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing refresh token")]
    MissingToken,

    #[error("Token verification failed")]
    VerificationFailed,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Password hashing error")]
    PasswordHashError,

    #[error("Token generation error: {0}")]
    TokenGenerationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::DatabaseError(msg) => error!("Database error in auth: {}", msg),
            AuthError::PasswordHashError => error!("Password hashing error"),
            AuthError::TokenGenerationError(msg) => error!("Token generation error: {}", msg),
            AuthError::Internal(msg) => error!("Internal auth error: {}", msg),
            AuthError::InvalidRole(msg) => error!("Invalid role stored for user: {}", msg),
            _ => {}
        }

        let body = Json(json!({
            "error": self.error_message(),
        }));

        (self.status_code(), body).into_response()
    }
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
            AuthError::EmailAlreadyExists => StatusCode::CONFLICT,
            AuthError::InvalidRole(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::PasswordHashError => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::TokenGenerationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a message that is safe to send to clients
    pub fn error_message(&self) -> String {
        match self {
            AuthError::ValidationError(msg) => msg.clone(),
            AuthError::InvalidCredentials => "Invalid credentials".to_string(),
            AuthError::MissingToken => NOT_LOGGED_IN.to_string(),
            AuthError::VerificationFailed => INVALID_SESSION.to_string(),
            AuthError::EmailAlreadyExists => "Email already exists".to_string(),
            AuthError::InvalidRole(_)
            | AuthError::DatabaseError(_)
            | AuthError::PasswordHashError
            | AuthError::TokenGenerationError(_)
            | AuthError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// True for failures caused by the caller's session rather than the server
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AuthError::ValidationError(format!("Validation failed: {}", errors))
    }
}
