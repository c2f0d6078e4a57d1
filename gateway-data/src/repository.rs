use crate::entity::{ApiKeyRow, NewUser, UsageRow, User, UserUpdate};
use crate::error::DataError;
use crate::page::{Page, Pageable};

/// User repository contract. Backend-agnostic; implemented over Postgres
/// by `gateway-db`.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DataError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError>;
    async fn create(&self, user: NewUser) -> Result<User, DataError>;
    async fn update(&self, id: i64, update: UserUpdate) -> Result<User, DataError>;
    async fn delete(&self, id: i64) -> Result<(), DataError>;
    async fn list_paged(&self, pageable: &Pageable) -> Result<Page<User>, DataError>;
}

/// API key repository contract.
///
/// `create` must atomically revoke all prior non-revoked keys for the same
/// user in the same transaction as the insert.
#[async_trait::async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn find_active(&self, key: &str) -> Result<Option<ApiKeyRow>, DataError>;
    async fn find_active_for_user(&self, user_id: i64) -> Result<Option<ApiKeyRow>, DataError>;
    async fn create(&self, row: ApiKeyRow) -> Result<ApiKeyRow, DataError>;
    async fn revoke(&self, key: &str) -> Result<(), DataError>;
    async fn revoke_all_for_user(&self, user_id: i64) -> Result<(), DataError>;
}

/// Usage row repository contract. Append-only; the usage pipeline is the
/// only caller.
#[async_trait::async_trait]
pub trait UsageRepository: Send + Sync {
    async fn insert_batch(&self, rows: &[UsageRow]) -> Result<(), DataError>;
}
