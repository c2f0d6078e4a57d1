//! Composition-root state. One `Services` instance is built once in
//! `main` and cloned into the router; each field gets its own `FromRef`
//! impl (grounded on the teacher's per-field `FromRef<Services>` pattern)
//! so handlers extract exactly the dependency they need.

use std::sync::Arc;

use axum::extract::FromRef;
use gateway_auth::CredentialPlane;
use gateway_config::ConfigRegistry;
use gateway_data::{ApiKeyRepository, UserRepository};
use gateway_usage::UsagePipeline;

use crate::usage::TokenCounter;

#[derive(Clone)]
pub struct Services {
    pub config: Arc<ConfigRegistry>,
    pub credentials: Arc<CredentialPlane>,
    pub users: Arc<dyn UserRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub usage: UsagePipeline,
    pub token_counter: TokenCounter,
    /// Shared client for the OpenAI-compatible HTTP forwarding path;
    /// `reqwest::Client` is internally `Arc`-backed so cloning is cheap.
    pub http: reqwest::Client,
}

impl FromRef<Services> for Arc<ConfigRegistry> {
    fn from_ref(services: &Services) -> Self {
        services.config.clone()
    }
}

impl FromRef<Services> for Arc<CredentialPlane> {
    fn from_ref(services: &Services) -> Self {
        services.credentials.clone()
    }
}

impl FromRef<Services> for Arc<dyn UserRepository> {
    fn from_ref(services: &Services) -> Self {
        services.users.clone()
    }
}

impl FromRef<Services> for Arc<dyn ApiKeyRepository> {
    fn from_ref(services: &Services) -> Self {
        services.api_keys.clone()
    }
}

impl FromRef<Services> for UsagePipeline {
    fn from_ref(services: &Services) -> Self {
        services.usage.clone()
    }
}

impl FromRef<Services> for TokenCounter {
    fn from_ref(services: &Services) -> Self {
        services.token_counter.clone()
    }
}

impl FromRef<Services> for reqwest::Client {
    fn from_ref(services: &Services) -> Self {
        services.http.clone()
    }
}
