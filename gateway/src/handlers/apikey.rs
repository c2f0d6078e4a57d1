//! `/apikey` — issuance and lookup of the caller's long-lived API key.
//! Both routes require a session-typed identity (the admin UI's own
//! login), not an API key itself, since minting a key from a key would
//! bypass the single-active-key-per-user invariant's intended entry point.

use std::sync::Arc;

use axum::extract::State;
use gateway_auth::{CredentialPlane, GatewayIdentity, TokenType};
use gateway_core::prelude::*;
use gateway_data::ApiKeyRepository;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyStatusResponse {
    pub active: bool,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn require_session(identity: &GatewayIdentity) -> ApiResult<()> {
    if identity.token_type != TokenType::Session {
        return Err(AppError::Forbidden(
            "API key management requires a session login".into(),
        ));
    }
    Ok(())
}

pub async fn issue(
    identity: GatewayIdentity,
    State(credentials): State<Arc<CredentialPlane>>,
) -> ApiResult<Json<ApiKeyResponse>> {
    require_session(&identity)?;

    let token = credentials
        .issue_api_key(
            identity.user_id,
            &identity.sub,
            identity.scopes.clone(),
            identity.is_admin(),
            None,
        )
        .await
        .map_err(AppError::from)?;

    Ok(Json(ApiKeyResponse { api_key: token }))
}

pub async fn current(
    identity: GatewayIdentity,
    State(api_keys): State<Arc<dyn ApiKeyRepository>>,
) -> ApiResult<Json<ApiKeyStatusResponse>> {
    require_session(&identity)?;

    let row = api_keys.find_active_for_user(identity.user_id).await?;
    Ok(Json(ApiKeyStatusResponse {
        active: row.is_some(),
        expires_at: row.and_then(|r| r.expires_at),
    }))
}
