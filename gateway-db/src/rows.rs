//! `sqlx::FromRow` row shapes, kept separate from `gateway_data`'s plain
//! entities so that crate stays driver-free.

use chrono::{DateTime, Utc};
use serde_json::Value;

use gateway_data::{ApiKeyRow, UsageRow, User};

#[derive(sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub scopes: Vec<String>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            scopes: r.scopes,
            disabled: r.disabled,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct ApiKeyRowSql {
    pub key: String,
    pub user_id: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKeyRowSql> for ApiKeyRow {
    fn from(r: ApiKeyRowSql) -> Self {
        ApiKeyRow {
            key: r.key,
            user_id: r.user_id,
            expires_at: r.expires_at,
            revoked: r.revoked,
            created_at: r.created_at,
        }
    }
}

/// Shape used only for `extra_data` coercion at bind time; `UsageRow` itself
/// round-trips through positional binds, no `FromRow` needed since it is
/// never read back.
pub fn coerce_extra_data(value: &Value) -> Value {
    if value.is_object() || value.is_array() || value.is_null() {
        value.clone()
    } else {
        Value::String(value.to_string())
    }
}

pub use gateway_data::UsageRow as UsageRowInsert;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_and_arrays_pass_through() {
        let obj = json!({"a": 1});
        assert_eq!(coerce_extra_data(&obj), obj);
        let arr = json!([1, 2]);
        assert_eq!(coerce_extra_data(&arr), arr);
        assert_eq!(coerce_extra_data(&Value::Null), Value::Null);
    }

    #[test]
    fn scalars_are_stringified() {
        assert_eq!(coerce_extra_data(&json!(42)), Value::String("42".into()));
        assert_eq!(coerce_extra_data(&json!(true)), Value::String("true".into()));
        assert_eq!(
            coerce_extra_data(&json!("already a string")),
            Value::String("\"already a string\"".into())
        );
    }
}
