use gateway_core::guards::Identity;

use crate::claims::TokenType;

/// The authenticated principal attached to a request after `verify`
/// succeeds. Implements [`gateway_core::Identity`] so handlers can use the
/// shared `has_scope`/`is_admin` helpers.
#[derive(Debug, Clone)]
pub struct GatewayIdentity {
    pub user_id: i64,
    pub sub: String,
    pub scopes: Vec<String>,
    pub token_type: TokenType,
}

impl Identity for GatewayIdentity {
    fn sub(&self) -> &str {
        &self.sub
    }

    fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

impl GatewayIdentity {
    /// Returns `Err` mapped to `403` unless this identity carries `scope`
    /// (or is admin). Handlers call this as their first statement.
    pub fn require_scope(&self, scope: &str) -> Result<(), gateway_core::AppError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(gateway_core::AppError::Forbidden(format!(
                "missing required scope: {scope}"
            )))
        }
    }
}
