use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, warn};

use crate::claims::Claims;
use crate::error::SecurityError;

/// Low-level JWT codec. Validates signature and standard claims and
/// returns raw [`Claims`] without consulting the persistence layer — the
/// api_key revocation check is a separate step owned by the credential
/// plane, since it requires a database round trip and this type doesn't.
///
/// Self-issued HS256 only; there is no external issuer to trust, so unlike
/// a JWKS-backed validator this holds a single shared-secret key pair
/// derived once from configuration at boot.
pub struct JwtClaimsValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtClaimsValidator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, SecurityError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| SecurityError::InvalidToken(e.to_string()))
    }

    /// Decode and validate signature + expiry. Tokens with no `exp` claim
    /// (admin non-expiring api keys) are accepted without an expiry check.
    pub fn decode(&self, token: &str) -> Result<Claims, SecurityError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            let err = match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
                _ => SecurityError::InvalidToken(e.to_string()),
            };
            warn!(error = %err, "JWT validation failed");
            err
        })?;

        debug!(sub = %data.claims.sub, "JWT decoded");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::TokenType;

    fn sample_claims(exp: Option<i64>) -> Claims {
        Claims {
            sub: "alice".into(),
            user_id: 1,
            scopes: vec!["chat:base".into()],
            iat: 1_700_000_000,
            token_type: TokenType::Session,
            exp,
        }
    }

    #[test]
    fn round_trips_claims() {
        let codec = JwtClaimsValidator::new(b"test-secret");
        let token = codec.encode(&sample_claims(Some(1_900_000_000))).unwrap();
        let decoded = codec.decode(&token).unwrap();
        assert_eq!(decoded.sub, "alice");
        assert_eq!(decoded.scopes, vec!["chat:base".to_string()]);
    }

    #[test]
    fn rejects_expired_token() {
        let codec = JwtClaimsValidator::new(b"test-secret");
        let token = codec.encode(&sample_claims(Some(1))).unwrap();
        assert!(matches!(codec.decode(&token), Err(SecurityError::TokenExpired)));
    }

    #[test]
    fn accepts_non_expiring_token() {
        let codec = JwtClaimsValidator::new(b"test-secret");
        let token = codec.encode(&sample_claims(None)).unwrap();
        assert!(codec.decode(&token).is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let codec = JwtClaimsValidator::new(b"test-secret");
        let other = JwtClaimsValidator::new(b"different-secret");
        let token = codec.encode(&sample_claims(Some(1_900_000_000))).unwrap();
        assert!(other.decode(&token).is_err());
    }
}
