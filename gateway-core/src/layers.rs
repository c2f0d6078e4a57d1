use axum::http::StatusCode;
use axum::response::IntoResponse;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Initialise the global `tracing` subscriber.
///
/// Respects `RUST_LOG`, falling back to `info,tower_http=debug`. Selects the
/// JSON formatter when `GATEWAY_LOG_FORMAT=json`, otherwise the human-readable
/// `fmt` layer. Call once, at the very start of `main`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".parse().unwrap());

    let json = std::env::var("GATEWAY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Permissive CORS layer allowing any origin/method/header.
pub fn default_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// `TraceLayer` configured for HTTP request/response tracing.
pub fn default_trace() -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

/// `CatchPanicLayer` that converts panics into JSON 500 responses instead of
/// tearing down the connection.
pub fn catch_panic_layer() -> CatchPanicLayer<fn(Box<dyn std::any::Any + Send>) -> axum::response::Response> {
    CatchPanicLayer::custom(panic_handler as fn(_) -> _)
}

fn panic_handler(_err: Box<dyn std::any::Any + Send>) -> axum::response::Response {
    let body = serde_json::json!({ "error": "Internal server error" });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}
