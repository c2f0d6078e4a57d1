pub mod error;
pub mod guards;
pub mod health;
pub mod layers;
pub mod multipart;
pub mod prelude;
pub mod request_id;
pub mod secure_headers;
pub mod sse;
pub mod state;
pub mod types;

pub use error::AppError;
pub use guards::{Identity, NoIdentity, PathParams};
pub use health::{HealthIndicator, HealthStatus};
pub use layers::{catch_panic_layer, default_cors, default_trace, init_tracing};
pub use request_id::RequestId;
pub use secure_headers::SecureHeadersLayer;
pub use sse::{SseBroadcaster, SseMessage};
pub use state::GatewayState;
pub use types::{ApiResult, JsonResult, StatusResult};
