use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;

use crate::error::SecurityError;
use crate::identity::GatewayIdentity;
use crate::plane::CredentialPlane;

/// Pulls the bearer token out of the `Authorization` header. Tolerates
/// `Bearer <token>`, `ApiKey <token>`, and a bare token with no scheme
/// prefix (api-key routes accept the key value directly).
fn extract_token(parts: &Parts) -> Result<&str, SecurityError> {
    let header_value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| {
            warn!(uri = %parts.uri, "missing Authorization header");
            SecurityError::MissingAuthHeader
        })?
        .to_str()
        .map_err(|_| SecurityError::InvalidAuthScheme)?;

    match header_value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("apikey") => Ok(token),
        Some(_) => Err(SecurityError::InvalidAuthScheme),
        None => Ok(header_value),
    }
}

/// Authenticates the request and attaches the resulting identity. Does
/// not check any scope — handlers call [`GatewayIdentity::require_scope`]
/// themselves, which doubles as this system's path-allowlist equivalent:
/// routes that should bypass auth entirely (login, docs) simply omit this
/// extractor from their handler signature.
impl<S> FromRequestParts<S> for GatewayIdentity
where
    S: Send + Sync,
    Arc<CredentialPlane>: FromRef<S>,
{
    type Rejection = SecurityError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;
        let plane = Arc::<CredentialPlane>::from_ref(state);
        plane.verify(token, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: &str) -> Parts {
        Request::builder()
            .header(AUTHORIZATION, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn bearer_scheme_extracted() {
        let parts = parts_with_auth("Bearer abc.def.ghi");
        assert_eq!(extract_token(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn apikey_scheme_extracted() {
        let parts = parts_with_auth("ApiKey my-api-key");
        assert_eq!(extract_token(&parts).unwrap(), "my-api-key");
    }

    #[test]
    fn bare_token_accepted() {
        let parts = parts_with_auth("bare-token-value");
        assert_eq!(extract_token(&parts).unwrap(), "bare-token-value");
    }

    #[test]
    fn unknown_scheme_rejected() {
        let parts = parts_with_auth("Basic dXNlcjpwYXNz");
        assert!(matches!(
            extract_token(&parts),
            Err(SecurityError::InvalidAuthScheme)
        ));
    }
}
