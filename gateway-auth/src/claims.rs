use serde::{Deserialize, Serialize};

/// The two token shapes the credential plane issues. Serializes to the
/// `type` claim as `"session"` / `"api_key"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Session,
    ApiKey,
}

/// Claim set shared by both token kinds. `exp` is absent for admin keys
/// configured as non-expiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub scopes: Vec<String>,
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}
