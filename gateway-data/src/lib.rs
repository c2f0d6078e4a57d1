//! Backend-agnostic data access abstractions for the inference gateway.
//!
//! Defines the domain entities (`User`, `ApiKeyRow`, `UsageRow`) and the
//! repository traits the gateway binary depends on, with zero database
//! driver dependencies. The concrete Postgres implementation lives in
//! `gateway-db`.

pub mod entity;
pub mod error;
pub mod page;
pub mod repository;

pub use entity::{ApiKeyRow, NewUser, UsageRow, User, UserUpdate};
pub use error::DataError;
pub use page::{Page, Pageable};
pub use repository::{ApiKeyRepository, UsageRepository, UserRepository};

pub mod prelude {
    pub use crate::{
        ApiKeyRepository, ApiKeyRow, DataError, NewUser, Page, Pageable, UsageRepository,
        UsageRow, User, UserRepository, UserUpdate,
    };
}
