//! Convenience type aliases for common handler return types.
//!
//! ```ignore
//! use gateway_core::types::JsonResult;
//!
//! async fn list(&self) -> JsonResult<Vec<User>> {
//!     Ok(Json(self.service.list().await?))
//! }
//! ```

use axum::http::StatusCode;
use axum::Json;

use crate::error::AppError;

/// Flexible result alias — any response type with [`AppError`].
pub type ApiResult<T> = Result<T, AppError>;

/// The most common handler return type.
pub type JsonResult<T> = Result<Json<T>, AppError>;

/// Shorthand for endpoints that return only a status code (e.g. DELETE).
pub type StatusResult = Result<StatusCode, AppError>;
