//! Session lifecycle: login, current-user lookup, password change, and
//! access-token refresh/introspection for the admin-UI credential class.

use std::sync::Arc;

use axum::extract::State;
use axum::Form;
use gateway_auth::{CredentialPlane, GatewayIdentity};
use gateway_config::ConfigRegistry;
use gateway_core::prelude::*;
use gateway_data::{UserRepository, UserUpdate};
use serde::{Deserialize, Serialize};

use crate::password;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub username: String,
    pub email: Option<String>,
    pub scopes: Vec<String>,
    pub disabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessInfoRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AccessInfoResponse {
    pub sub: String,
    pub scopes: Vec<String>,
    pub token_type: &'static str,
}

/// `POST /session` — public. Validates username/password and mints a
/// short-lived session token.
pub async fn login(
    State(users): State<Arc<dyn UserRepository>>,
    State(credentials): State<Arc<CredentialPlane>>,
    State(config): State<Arc<ConfigRegistry>>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let user = users
        .find_by_username(&form.username)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid username or password".into()))?;

    if user.disabled {
        return Err(AppError::Unauthorized("account disabled".into()));
    }
    if !password::verify(&form.password, &user.password_hash) {
        return Err(AppError::Unauthorized("invalid username or password".into()));
    }

    let token = credentials
        .issue_session(user.id, &user.username, user.scopes.clone())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_at: chrono::Utc::now().timestamp() + config.snapshot().session_ttl_seconds(),
    }))
}

/// `GET /session/user` — any authenticated principal.
pub async fn current_user(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
) -> ApiResult<Json<UserInfoResponse>> {
    let user = users
        .find_by_username(&identity.sub)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user `{}` not found", identity.sub)))?;

    Ok(Json(UserInfoResponse {
        username: user.username,
        email: user.email,
        scopes: user.scopes,
        disabled: user.disabled,
    }))
}

/// `POST /session/changePwd` — any authenticated principal.
pub async fn change_password(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
    Json(body): Json<ChangePasswordRequest>,
) -> StatusResult {
    let user = users
        .find_by_username(&identity.sub)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user `{}` not found", identity.sub)))?;

    if !password::verify(&body.current_password, &user.password_hash) {
        return Err(AppError::Unauthorized("current password is incorrect".into()));
    }

    let new_hash = password::hash(&body.new_password)?;
    users
        .update(
            user.id,
            UserUpdate {
                password_hash: Some(new_hash),
                ..Default::default()
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /access/refresh` — any authenticated principal; reissues a fresh
/// session token carrying the same subject and scopes.
pub async fn refresh(
    identity: GatewayIdentity,
    State(credentials): State<Arc<CredentialPlane>>,
    State(config): State<Arc<ConfigRegistry>>,
) -> ApiResult<Json<TokenResponse>> {
    let token = credentials
        .issue_session(identity.user_id, &identity.sub, identity.scopes.clone())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_at: chrono::Utc::now().timestamp() + config.snapshot().session_ttl_seconds(),
    }))
}

/// `POST /access/info` — any authenticated principal; introspects an
/// arbitrary token (not necessarily the caller's own).
pub async fn access_info(
    _identity: GatewayIdentity,
    State(credentials): State<Arc<CredentialPlane>>,
    Json(body): Json<AccessInfoRequest>,
) -> ApiResult<Json<AccessInfoResponse>> {
    let target = credentials
        .verify(&body.token, &[])
        .await
        .map_err(AppError::from)?;

    Ok(Json(AccessInfoResponse {
        sub: target.sub,
        scopes: target.scopes,
        token_type: "bearer",
    }))
}
