use async_trait::async_trait;
use sqlx::PgPool;

use gateway_data::{
    ApiKeyRepository, ApiKeyRow, DataError, NewUser, Page, Pageable, UsageRepository, UsageRow,
    User, UserRepository, UserUpdate,
};

use crate::error::SqlxErrorExt;
use crate::rows::{coerce_extra_data, ApiKeyRowSql, UserRow};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, scopes, disabled, created_at, updated_at";

/// Postgres-backed [`UserRepository`]. Table name is the fixed `oauth2_users`
/// (see the migrations directory); the config's `table_prefix` is
/// documentation-only and not interpolated into queries.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DataError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM oauth2_users WHERE username = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map(|r| r.map(User::from))
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM oauth2_users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map(|r| r.map(User::from))
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn create(&self, user: NewUser) -> Result<User, DataError> {
        let sql = format!(
            "INSERT INTO oauth2_users (username, email, password_hash, scopes, disabled)
             VALUES ($1, $2, $3, $4, false)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.username)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.scopes)
            .fetch_one(&self.pool)
            .await
            .map(User::from)
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn update(&self, id: i64, update: UserUpdate) -> Result<User, DataError> {
        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;

        let select_sql = format!("SELECT {USER_COLUMNS} FROM oauth2_users WHERE id = $1 FOR UPDATE");
        let current: User = sqlx::query_as::<_, UserRow>(&select_sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_data_error)?
            .map(User::from)
            .ok_or_else(|| DataError::NotFound(format!("user {id}")))?;

        let email = update.email.unwrap_or(current.email);
        let password_hash = update.password_hash.unwrap_or(current.password_hash);
        let scopes = update.scopes.unwrap_or(current.scopes);
        let disabled = update.disabled.unwrap_or(current.disabled);

        let update_sql = format!(
            "UPDATE oauth2_users
             SET email = $2, password_hash = $3, scopes = $4, disabled = $5, updated_at = now()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, UserRow>(&update_sql)
            .bind(id)
            .bind(email)
            .bind(password_hash)
            .bind(scopes)
            .bind(disabled)
            .fetch_one(&mut *tx)
            .await
            .map(User::from)
            .map_err(SqlxErrorExt::into_data_error)?;

        tx.commit().await.map_err(SqlxErrorExt::into_data_error)?;
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<(), DataError> {
        sqlx::query("DELETE FROM oauth2_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(())
    }

    async fn list_paged(&self, pageable: &Pageable) -> Result<Page<User>, DataError> {
        let total: (i64,) = sqlx::query_as("SELECT count(*) FROM oauth2_users")
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM oauth2_users ORDER BY id LIMIT $1 OFFSET $2"
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(pageable.size as i64)
            .bind(pageable.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        let users: Vec<User> = rows.into_iter().map(User::from).collect();
        Ok(Page::new(users, pageable, total.0.max(0) as u64))
    }
}

const API_KEY_COLUMNS: &str = "key, user_id, expires_at, revoked, created_at";

/// Postgres-backed [`ApiKeyRepository`]. Fixed table name `oauth2_api_keys`.
#[derive(Clone)]
pub struct PgApiKeyRepository {
    pool: PgPool,
}

impl PgApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for PgApiKeyRepository {
    async fn find_active(&self, key: &str) -> Result<Option<ApiKeyRow>, DataError> {
        let sql = format!(
            "SELECT {API_KEY_COLUMNS} FROM oauth2_api_keys
             WHERE key = $1 AND revoked = false
               AND (expires_at IS NULL OR expires_at > now())"
        );
        sqlx::query_as::<_, ApiKeyRowSql>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map(|r| r.map(ApiKeyRow::from))
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_active_for_user(&self, user_id: i64) -> Result<Option<ApiKeyRow>, DataError> {
        let sql = format!(
            "SELECT {API_KEY_COLUMNS} FROM oauth2_api_keys
             WHERE user_id = $1 AND revoked = false
               AND (expires_at IS NULL OR expires_at > now())
             ORDER BY created_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, ApiKeyRowSql>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map(|r| r.map(ApiKeyRow::from))
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn create(&self, row: ApiKeyRow) -> Result<ApiKeyRow, DataError> {
        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;

        sqlx::query("UPDATE oauth2_api_keys SET revoked = true WHERE user_id = $1 AND revoked = false")
            .bind(row.user_id)
            .execute(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        let insert_sql = format!(
            "INSERT INTO oauth2_api_keys (key, user_id, expires_at, revoked)
             VALUES ($1, $2, $3, false)
             RETURNING {API_KEY_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ApiKeyRowSql>(&insert_sql)
            .bind(row.key)
            .bind(row.user_id)
            .bind(row.expires_at)
            .fetch_one(&mut *tx)
            .await
            .map(ApiKeyRow::from)
            .map_err(SqlxErrorExt::into_data_error)?;

        tx.commit().await.map_err(SqlxErrorExt::into_data_error)?;
        Ok(inserted)
    }

    async fn revoke(&self, key: &str) -> Result<(), DataError> {
        sqlx::query("UPDATE oauth2_api_keys SET revoked = true WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<(), DataError> {
        sqlx::query("UPDATE oauth2_api_keys SET revoked = true WHERE user_id = $1 AND revoked = false")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(())
    }
}

/// Postgres-backed [`UsageRepository`]. Fixed table name `usage`. The only
/// caller is the usage pipeline's worker, which always inserts whole
/// batches in a single transaction.
#[derive(Clone)]
pub struct PgUsageRepository {
    pool: PgPool,
}

impl PgUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    async fn insert_batch(&self, rows: &[UsageRow]) -> Result<(), DataError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;

        for row in rows {
            sqlx::query(
                "INSERT INTO usage
                 (ts, api_type, user_id, model, request_id, prompt_tokens,
                  completion_tokens, total_tokens, input_count, extra_data, host, pid)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(row.ts)
            .bind(&row.api_type)
            .bind(row.user_id)
            .bind(&row.model)
            .bind(&row.request_id)
            .bind(row.prompt_tokens)
            .bind(row.completion_tokens)
            .bind(row.total_tokens)
            .bind(row.input_count)
            .bind(coerce_extra_data(&row.extra_data))
            .bind(&row.host)
            .bind(row.pid)
            .execute(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        }

        tx.commit().await.map_err(SqlxErrorExt::into_data_error)?;
        Ok(())
    }
}
