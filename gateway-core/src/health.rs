//! Liveness/readiness probes.
//!
//! | Path             | Description                                 |
//! |------------------|----------------------------------------------|
//! | `GET /health`      | Aggregated status — 200 if UP, 503 if DOWN |
//! | `GET /health/live`  | Liveness probe — always 200               |
//! | `GET /health/ready` | Readiness probe — 200 if all checks pass  |

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

/// Result of a single health check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down(String),
}

impl HealthStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, HealthStatus::Up)
    }
}

/// A named health indicator (e.g. "db", "backend").
pub trait HealthIndicator: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn check(&self) -> impl std::future::Future<Output = HealthStatus> + Send;

    /// Whether this check affects the readiness probe (default: `true`).
    fn affects_readiness(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthCheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthCheckStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthCheckStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
    pub uptime_seconds: u64,
}

trait HealthIndicatorErased: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn check(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send + '_>>;
    fn affects_readiness(&self) -> bool;
}

impl<T: HealthIndicator> HealthIndicatorErased for T {
    fn name(&self) -> &str {
        HealthIndicator::name(self)
    }

    fn check(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send + '_>> {
        Box::pin(HealthIndicator::check(self))
    }

    fn affects_readiness(&self) -> bool {
        HealthIndicator::affects_readiness(self)
    }
}

/// Shared state backing the `/health*` routes.
pub struct HealthState {
    checks: Vec<Box<dyn HealthIndicatorErased>>,
    start_time: Instant,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn with_check<H: HealthIndicator>(mut self, indicator: H) -> Self {
        self.checks.push(Box::new(indicator));
        self
    }

    async fn aggregate(&self, readiness_only: bool) -> HealthResponse {
        let mut checks = Vec::with_capacity(self.checks.len());
        let mut all_up = true;

        for indicator in &self.checks {
            if readiness_only && !indicator.affects_readiness() {
                continue;
            }
            let start = Instant::now();
            let status = indicator.check().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (check_status, reason) = match &status {
                HealthStatus::Up => (HealthCheckStatus::Up, None),
                HealthStatus::Down(r) => {
                    all_up = false;
                    (HealthCheckStatus::Down, Some(r.clone()))
                }
            };
            checks.push(HealthCheck {
                name: indicator.name().to_string(),
                status: check_status,
                reason,
                duration_ms,
            });
        }

        HealthResponse {
            status: if all_up {
                HealthCheckStatus::Up
            } else {
                HealthCheckStatus::Down
            },
            checks,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = state.aggregate(false).await;
    let status_code = if response.status.is_up_status() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = state.aggregate(true).await;
    let status_code = if response.status.is_up_status() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

impl HealthCheckStatus {
    fn is_up_status(&self) -> bool {
        matches!(self, HealthCheckStatus::Up)
    }
}

/// Build the `/health`, `/health/live`, `/health/ready` routes, mountable
/// standalone (the health state has no bearing on the gateway's own `S`).
pub fn router<S: Clone + Send + Sync + 'static>(state: Arc<HealthState>) -> Router<S> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysUp;
    impl HealthIndicator for AlwaysUp {
        fn name(&self) -> &str {
            "always_up"
        }
        async fn check(&self) -> HealthStatus {
            HealthStatus::Up
        }
    }

    struct AlwaysDown;
    impl HealthIndicator for AlwaysDown {
        fn name(&self) -> &str {
            "always_down"
        }
        async fn check(&self) -> HealthStatus {
            HealthStatus::Down("boom".into())
        }
        fn affects_readiness(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn aggregate_all_up() {
        let state = HealthState::new().with_check(AlwaysUp);
        let resp = state.aggregate(false).await;
        assert!(resp.status.is_up_status());
        assert_eq!(resp.checks.len(), 1);
    }

    #[tokio::test]
    async fn aggregate_reports_down() {
        let state = HealthState::new().with_check(AlwaysUp).with_check(AlwaysDown);
        let resp = state.aggregate(false).await;
        assert!(!resp.status.is_up_status());
        assert_eq!(resp.checks.len(), 2);
    }

    #[tokio::test]
    async fn readiness_skips_non_readiness_checks() {
        let state = HealthState::new().with_check(AlwaysUp).with_check(AlwaysDown);
        let resp = state.aggregate(true).await;
        assert!(resp.status.is_up_status());
        assert_eq!(resp.checks.len(), 1);
    }
}
