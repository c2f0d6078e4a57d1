//! Security headers layer — adds common security-related HTTP headers to
//! every response.
//!
//! # Default headers
//!
//! | Header | Value |
//! |--------|-------|
//! | `X-Content-Type-Options` | `nosniff` |
//! | `X-Frame-Options` | `DENY` |
//! | `Strict-Transport-Security` | `max-age=31536000; includeSubDomains` |
//! | `Referrer-Policy` | `strict-origin-when-cross-origin` |
//!
//! # Usage
//!
//! ```ignore
//! let app = Router::new().layer(SecureHeadersLayer::default());
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use tower::{Layer, Service};

#[derive(Clone)]
pub struct SecureHeadersLayer {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl SecureHeadersLayer {
    pub fn builder() -> SecureHeadersBuilder {
        SecureHeadersBuilder::new()
    }
}

impl Default for SecureHeadersLayer {
    fn default() -> Self {
        SecureHeadersBuilder::new().build()
    }
}

impl<S> Layer<S> for SecureHeadersLayer {
    type Service = SecureHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecureHeadersService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SecureHeadersService<S> {
    inner: S,
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl<S, Req> Service<Req> for SecureHeadersService<S>
where
    S: Service<Req, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let headers = self.headers.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            let mut response = inner.call(req).await?;
            for (name, value) in headers.iter() {
                response.headers_mut().insert(name.clone(), value.clone());
            }
            Ok(response)
        })
    }
}

/// Builder for [`SecureHeadersLayer`].
pub struct SecureHeadersBuilder {
    content_type_options: bool,
    frame_options: Option<String>,
    hsts: bool,
    hsts_max_age: u64,
    hsts_include_subdomains: bool,
    referrer_policy: Option<String>,
    content_security_policy: Option<String>,
}

impl SecureHeadersBuilder {
    fn new() -> Self {
        Self {
            content_type_options: true,
            frame_options: Some("DENY".to_string()),
            hsts: true,
            hsts_max_age: 31536000,
            hsts_include_subdomains: true,
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            content_security_policy: None,
        }
    }

    pub fn hsts(mut self, enabled: bool) -> Self {
        self.hsts = enabled;
        self
    }

    pub fn hsts_max_age(mut self, seconds: u64) -> Self {
        self.hsts_max_age = seconds;
        self
    }

    pub fn frame_options(mut self, value: impl Into<String>) -> Self {
        self.frame_options = Some(value.into());
        self
    }

    pub fn content_security_policy(mut self, value: impl Into<String>) -> Self {
        self.content_security_policy = Some(value.into());
        self
    }

    pub fn build(self) -> SecureHeadersLayer {
        let mut headers = Vec::new();

        if self.content_type_options {
            headers.push((
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            ));
        }

        if let Some(ref fo) = self.frame_options {
            if let Ok(val) = HeaderValue::from_str(fo) {
                headers.push((HeaderName::from_static("x-frame-options"), val));
            }
        }

        if self.hsts {
            let value = if self.hsts_include_subdomains {
                format!("max-age={}; includeSubDomains", self.hsts_max_age)
            } else {
                format!("max-age={}", self.hsts_max_age)
            };
            if let Ok(val) = HeaderValue::from_str(&value) {
                headers.push((HeaderName::from_static("strict-transport-security"), val));
            }
        }

        if let Some(ref rp) = self.referrer_policy {
            if let Ok(val) = HeaderValue::from_str(rp) {
                headers.push((HeaderName::from_static("referrer-policy"), val));
            }
        }

        if let Some(ref csp) = self.content_security_policy {
            if let Ok(val) = HeaderValue::from_str(csp) {
                headers.push((HeaderName::from_static("content-security-policy"), val));
            }
        }

        SecureHeadersLayer {
            headers: Arc::new(headers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[tokio::test]
    async fn default_headers_applied() {
        let app: Router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(SecureHeadersLayer::default());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert!(response.headers().contains_key("strict-transport-security"));
    }

    #[tokio::test]
    async fn custom_frame_options() {
        let layer = SecureHeadersLayer::builder()
            .frame_options("SAMEORIGIN")
            .build();
        let app: Router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(layer);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-frame-options").unwrap(),
            "SAMEORIGIN"
        );
    }
}
