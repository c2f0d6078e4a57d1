use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A registered principal. Scopes are a subset of the closed catalog
/// (`admin`, `models:read`, `chat:base`, `embeddings:base`,
/// `audio:transcribe`) enforced by the credential plane, not by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub scopes: Vec<String>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a user. The password is already hashed by
/// the caller (the credential plane owns hashing policy).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub scopes: Vec<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub disabled: Option<bool>,
}

/// A persisted API key row. The bearer token itself is the signed JWT;
/// `key` stores its full encoded form so revocation can look it up by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRow {
    pub key: String,
    pub user_id: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

/// One row of the append-only usage ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRow {
    pub ts: DateTime<Utc>,
    pub api_type: String,
    pub user_id: i64,
    pub model: String,
    pub request_id: String,
    pub prompt_tokens: i64,
    pub completion_tokens: Option<i64>,
    pub total_tokens: i64,
    pub input_count: Option<i64>,
    pub extra_data: Value,
    pub host: String,
    pub pid: i32,
}
