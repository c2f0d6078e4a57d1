//! Postgres-backed implementation of the repository traits defined in
//! `gateway-data`.
//!
//! `pool::connect` builds the shared `sqlx::PgPool` per the persistence
//! layer's pool policy (min 1, max 10, 1h lifetime, pre-ping); the three
//! `Pg*Repository` types wrap that pool and implement `UserRepository`,
//! `ApiKeyRepository`, and `UsageRepository` over the fixed `oauth2_users`,
//! `oauth2_api_keys`, and `usage` tables.

pub mod error;
pub mod pool;
pub mod repository;
pub mod rows;

pub use error::{SqlxErrorExt, SqlxResult};
pub use pool::{connect, run_migrations};
pub use repository::{PgApiKeyRepository, PgUserRepository, PgUsageRepository};

pub mod prelude {
    pub use crate::{
        connect, run_migrations, PgApiKeyRepository, PgUserRepository, PgUsageRepository,
        SqlxErrorExt, SqlxResult,
    };
    pub use gateway_data::prelude::*;
}
