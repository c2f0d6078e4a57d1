//! Convenience re-exports for handler modules.
//!
//! ```ignore
//! use gateway_core::prelude::*;
//! ```

pub use crate::error::AppError;
pub use crate::guards::{Identity, NoIdentity, PathParams};
pub use crate::request_id::RequestId;
pub use crate::secure_headers::SecureHeadersLayer;
pub use crate::types::{ApiResult, JsonResult, StatusResult};

pub use axum::extract::{FromRef, Path, Query, State};
pub use axum::http::{HeaderMap, StatusCode};
pub use axum::response::{IntoResponse, Redirect, Response};
pub use axum::{Json, Router};
