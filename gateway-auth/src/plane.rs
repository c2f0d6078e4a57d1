use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use gateway_data::{ApiKeyRepository, ApiKeyRow};

use crate::claims::{Claims, TokenType};
use crate::error::SecurityError;
use crate::identity::GatewayIdentity;
use crate::jwt::JwtClaimsValidator;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

/// The credential plane: the two issuance primitives and the one
/// verification primitive, all built over [`JwtClaimsValidator`].
pub struct CredentialPlane {
    codec: JwtClaimsValidator,
    api_keys: Arc<dyn ApiKeyRepository>,
    session_ttl_seconds: i64,
    api_key_ttl_seconds: i64,
    admin_token_never_expires: bool,
}

impl CredentialPlane {
    pub fn new(
        secret: &[u8],
        api_keys: Arc<dyn ApiKeyRepository>,
        session_ttl_seconds: i64,
        api_key_ttl_seconds: i64,
        admin_token_never_expires: bool,
    ) -> Self {
        Self {
            codec: JwtClaimsValidator::new(secret),
            api_keys,
            session_ttl_seconds,
            api_key_ttl_seconds,
            admin_token_never_expires,
        }
    }

    /// Short-lived bearer, not persisted; validated by signature + expiry
    /// alone.
    pub fn issue_session(
        &self,
        user_id: i64,
        username: &str,
        scopes: Vec<String>,
    ) -> Result<String, SecurityError> {
        let iat = now();
        let claims = Claims {
            sub: username.to_string(),
            user_id,
            scopes,
            iat,
            token_type: TokenType::Session,
            exp: Some(iat + self.session_ttl_seconds),
        };
        self.codec.encode(&claims)
    }

    /// Long-lived bearer, persisted as a row. Revokes the user's prior
    /// active keys in the same transaction as the insert.
    pub async fn issue_api_key(
        &self,
        user_id: i64,
        username: &str,
        scopes: Vec<String>,
        is_admin: bool,
        never_expires: Option<bool>,
    ) -> Result<String, SecurityError> {
        let iat = now();
        let omit_exp = is_admin && self.admin_token_never_expires && never_expires != Some(false);
        let exp = if omit_exp {
            None
        } else {
            Some(iat + self.api_key_ttl_seconds)
        };

        let claims = Claims {
            sub: username.to_string(),
            user_id,
            scopes,
            iat,
            token_type: TokenType::ApiKey,
            exp,
        };
        let token = self.codec.encode(&claims)?;

        let row = ApiKeyRow {
            key: token.clone(),
            user_id,
            expires_at: exp.and_then(|secs| {
                chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0)
            }),
            revoked: false,
            created_at: chrono::Utc::now(),
        };
        self.api_keys
            .create(row)
            .await
            .map_err(|e| SecurityError::Persistence(e.to_string()))?;

        Ok(token)
    }

    /// Decodes and validates `token`, checks revocation for api_key-typed
    /// tokens, and enforces `required_scopes ⊆ claims.scopes` (empty means
    /// any authenticated principal; `admin` bypasses the check).
    pub async fn verify(
        &self,
        token: &str,
        required_scopes: &[&str],
    ) -> Result<GatewayIdentity, SecurityError> {
        let claims = self.codec.decode(token)?;

        if claims.token_type == TokenType::ApiKey {
            let row = self
                .api_keys
                .find_active(token)
                .await
                .map_err(|e| SecurityError::Persistence(e.to_string()))?;
            if row.is_none() {
                return Err(SecurityError::Revoked);
            }
        }

        let identity = GatewayIdentity {
            user_id: claims.user_id,
            sub: claims.sub,
            scopes: claims.scopes,
            token_type: claims.token_type,
        };

        let is_admin = identity.scopes.iter().any(|s| s == "admin");
        let satisfied = required_scopes.is_empty()
            || is_admin
            || required_scopes.iter().all(|req| identity.scopes.iter().any(|s| s == req));

        if !satisfied {
            return Err(SecurityError::InsufficientScope);
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_data::DataError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockApiKeys {
        rows: Mutex<Vec<ApiKeyRow>>,
    }

    #[async_trait]
    impl ApiKeyRepository for MockApiKeys {
        async fn find_active(&self, key: &str) -> Result<Option<ApiKeyRow>, DataError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.key == key && !r.revoked)
                .cloned())
        }

        async fn find_active_for_user(&self, user_id: i64) -> Result<Option<ApiKeyRow>, DataError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|r| r.user_id == user_id && !r.revoked)
                .cloned())
        }

        async fn create(&self, row: ApiKeyRow) -> Result<ApiKeyRow, DataError> {
            let mut rows = self.rows.lock().unwrap();
            for r in rows.iter_mut() {
                if r.user_id == row.user_id {
                    r.revoked = true;
                }
            }
            rows.push(row.clone());
            Ok(row)
        }

        async fn revoke(&self, key: &str) -> Result<(), DataError> {
            for r in self.rows.lock().unwrap().iter_mut() {
                if r.key == key {
                    r.revoked = true;
                }
            }
            Ok(())
        }

        async fn revoke_all_for_user(&self, user_id: i64) -> Result<(), DataError> {
            for r in self.rows.lock().unwrap().iter_mut() {
                if r.user_id == user_id {
                    r.revoked = true;
                }
            }
            Ok(())
        }
    }

    fn plane() -> CredentialPlane {
        CredentialPlane::new(b"test-secret", Arc::new(MockApiKeys::default()), 1800, 2_592_000, true)
    }

    #[tokio::test]
    async fn session_token_round_trips_without_persistence() {
        let plane = plane();
        let token = plane
            .issue_session(1, "alice", vec!["chat:base".into()])
            .unwrap();
        let identity = plane.verify(&token, &[]).await.unwrap();
        assert_eq!(identity.sub, "alice");
    }

    #[tokio::test]
    async fn api_key_requires_active_row() {
        let plane = plane();
        let token = plane
            .issue_api_key(1, "alice", vec!["chat:base".into()], false, None)
            .await
            .unwrap();
        assert!(plane.verify(&token, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn revoked_api_key_rejected() {
        let plane = plane();
        let token = plane
            .issue_api_key(1, "alice", vec!["chat:base".into()], false, None)
            .await
            .unwrap();
        plane.api_keys.revoke(&token).await.unwrap();
        assert!(matches!(plane.verify(&token, &[]).await, Err(SecurityError::Revoked)));
    }

    #[tokio::test]
    async fn issuing_a_second_key_revokes_the_first() {
        let plane = plane();
        let first = plane
            .issue_api_key(1, "alice", vec!["chat:base".into()], false, None)
            .await
            .unwrap();
        let _second = plane
            .issue_api_key(1, "alice", vec!["chat:base".into()], false, None)
            .await
            .unwrap();
        assert!(matches!(plane.verify(&first, &[]).await, Err(SecurityError::Revoked)));
    }

    #[tokio::test]
    async fn admin_never_expires_when_configured() {
        let plane = plane();
        let token = plane
            .issue_api_key(1, "admin", vec!["admin".into()], true, None)
            .await
            .unwrap();
        assert!(plane.verify(&token, &["chat:base"]).await.is_ok());
    }

    #[tokio::test]
    async fn required_scope_enforced() {
        let plane = plane();
        let token = plane
            .issue_session(1, "alice", vec!["chat:base".into()])
            .unwrap();
        assert!(matches!(
            plane.verify(&token, &["embeddings:base"]).await,
            Err(SecurityError::InsufficientScope)
        ));
    }
}
