//! `/admin/*` — user and API-key management, grounded on the original
//! system's `oauth2` controller: list/get/create/update/delete users, and
//! list/revoke API keys by user. Every route requires the `admin` scope.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use gateway_auth::GatewayIdentity;
use gateway_core::prelude::*;
use gateway_data::{ApiKeyRepository, NewUser, Page, Pageable, User, UserRepository, UserUpdate};
use serde::{Deserialize, Serialize};

use crate::password;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub scopes: Vec<String>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            scopes: user.scopes,
            disabled: user.disabled,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<Option<String>>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

fn require_admin(identity: &GatewayIdentity) -> ApiResult<()> {
    identity.require_scope("admin")
}

pub async fn list_users(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
    Query(pageable): Query<Pageable>,
) -> ApiResult<Json<Page<UserView>>> {
    require_admin(&identity)?;
    let page = users.list_paged(&pageable).await?;
    Ok(Json(Page {
        content: page.content.into_iter().map(UserView::from).collect(),
        page: page.page,
        size: page.size,
        total_elements: page.total_elements,
        total_pages: page.total_pages,
    }))
}

pub async fn get_user(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
    Path(username): Path<String>,
) -> ApiResult<Json<UserView>> {
    require_admin(&identity)?;
    let user = users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user `{username}` not found")))?;
    Ok(Json(UserView::from(user)))
}

pub async fn create_user(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<Json<UserView>> {
    require_admin(&identity)?;

    if users.find_by_username(&body.username).await?.is_some() {
        return Err(AppError::BadRequest(format!(
            "username `{}` already exists",
            body.username
        )));
    }

    let password_hash = password::hash(&body.password)?;
    let user = users
        .create(NewUser {
            username: body.username,
            email: body.email,
            password_hash,
            scopes: body.scopes,
        })
        .await?;

    Ok(Json(UserView::from(user)))
}

pub async fn update_user(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
    Path(username): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserView>> {
    require_admin(&identity)?;

    let existing = users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user `{username}` not found")))?;

    let password_hash = body.password.as_deref().map(password::hash).transpose()?;

    let updated = users
        .update(
            existing.id,
            UserUpdate {
                email: body.email,
                password_hash,
                scopes: body.scopes,
                disabled: body.disabled,
            },
        )
        .await?;

    Ok(Json(UserView::from(updated)))
}

pub async fn delete_user(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
    Path(username): Path<String>,
) -> StatusResult {
    require_admin(&identity)?;

    if username == "admin" {
        return Err(AppError::BadRequest("the `admin` user cannot be deleted".into()));
    }

    let user = users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user `{username}` not found")))?;
    users.delete(user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct ApiKeyView {
    pub user_id: i64,
    pub revoked: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn list_api_keys_for_user(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
    State(api_keys): State<Arc<dyn ApiKeyRepository>>,
    Path(username): Path<String>,
) -> ApiResult<Json<Option<ApiKeyView>>> {
    require_admin(&identity)?;

    let user = users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user `{username}` not found")))?;
    let row = api_keys.find_active_for_user(user.id).await?;

    Ok(Json(row.map(|r| ApiKeyView {
        user_id: r.user_id,
        revoked: r.revoked,
        expires_at: r.expires_at,
    })))
}

pub async fn revoke_api_keys_for_user(
    identity: GatewayIdentity,
    State(users): State<Arc<dyn UserRepository>>,
    State(api_keys): State<Arc<dyn ApiKeyRepository>>,
    Path(username): Path<String>,
) -> StatusResult {
    require_admin(&identity)?;

    let user = users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user `{username}` not found")))?;
    api_keys.revoke_all_for_user(user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
