use axum::response::{IntoResponse, Response};
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A request-scoped identifier, propagated via the `X-Request-Id` header and
/// inserted into request extensions so handlers and the cancellation
/// machinery can tag logs and derive a `CancellationToken` per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl IntoResponse for RequestId {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

/// Middleware: reuse an inbound `X-Request-Id` header if present, otherwise
/// mint a fresh UUIDv4. Inserts the id into request extensions and echoes it
/// on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_display() {
        let id = RequestId("abc-123".into());
        assert_eq!(id.to_string(), "abc-123");
    }

    #[tokio::test]
    async fn request_id_into_response() {
        use http_body_util::BodyExt;
        let id = RequestId("test-id".into());
        let resp = id.into_response();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"test-id");
    }
}
