use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors from the credential plane: token parsing, signature/expiry
/// validation, and the revocation check for api_key-typed tokens.
#[derive(Debug)]
pub enum SecurityError {
    MissingAuthHeader,
    InvalidAuthScheme,
    InvalidToken(String),
    TokenExpired,
    Revoked,
    InsufficientScope,
    Persistence(String),
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::MissingAuthHeader => write!(f, "missing Authorization header"),
            SecurityError::InvalidAuthScheme => write!(f, "invalid authorization scheme"),
            SecurityError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            SecurityError::TokenExpired => write!(f, "token expired"),
            SecurityError::Revoked => write!(f, "token has been revoked"),
            SecurityError::InsufficientScope => write!(f, "insufficient scope"),
            SecurityError::Persistence(msg) => write!(f, "persistence error: {msg}"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl SecurityError {
    fn status(&self) -> StatusCode {
        match self {
            SecurityError::InsufficientScope => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<SecurityError> for gateway_core::AppError {
    fn from(err: SecurityError) -> Self {
        match err.status() {
            StatusCode::FORBIDDEN => gateway_core::AppError::Forbidden(err.to_string()),
            _ => gateway_core::AppError::Unauthorized(err.to_string()),
        }
    }
}
