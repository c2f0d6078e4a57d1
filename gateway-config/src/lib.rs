//! Typed snapshot of the gateway's YAML configuration.
//!
//! Loaded once at boot (grounded on the loader pattern in the teacher's
//! `r2e_core::config::loader`, simplified here to a single `serde` derive
//! since the section set is closed and known, unlike r2e's generic
//! dot-path flatten registry) and held as an immutable [`Arc<GatewayConfig>`]
//! snapshot. `ConfigRegistry::reload` swaps the `Arc` under a write lock;
//! readers only ever clone the `Arc`, never holding the lock across `.await`.

mod error;
mod model;

pub use error::ConfigError;
pub use model::{Capability, ModelDescriptor, PromptFamily};

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

fn default_table_prefix() -> String {
    "oauth2".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultAdminConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2Config {
    pub secret_key: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_access_token_expire_minutes")]
    pub access_token_expire_minutes: i64,
    #[serde(default = "default_user_token_expire_days")]
    pub user_token_expire_days: i64,
    #[serde(default)]
    pub admin_token_never_expires: bool,
    pub default_admin: DefaultAdminConfig,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_token_expire_minutes() -> i64 {
    30
}

fn default_user_token_expire_days() -> i64 {
    30
}

impl OAuth2Config {
    pub fn session_ttl_seconds(&self) -> i64 {
        self.access_token_expire_minutes * 60
    }

    pub fn api_key_ttl_seconds(&self) -> i64 {
        self.user_token_expire_days * 86_400
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub use_database: bool,
    #[serde(default = "default_table_prefix_usage")]
    pub table_prefix: String,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_table_prefix_usage() -> String {
    "usage".to_string()
}

fn default_log_retention_days() -> i64 {
    90
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_grpc_timeout_ms")]
    pub grpc_timeout_ms: u64,
}

fn default_http_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_grpc_timeout_ms() -> u64 {
    60_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            grpc_timeout_ms: default_grpc_timeout_ms(),
        }
    }
}

/// Top-level configuration document, one-to-one with the YAML file's keys.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub database: DatabaseConfig,
    pub oauth2: OAuth2Config,
    pub models: HashMap<String, ModelDescriptor>,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl GatewayConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        Self::from_yaml_str(&content)
    }

    /// Look up a model descriptor by name.
    pub fn get_model(&self, name: &str) -> Result<&ModelDescriptor, ConfigError> {
        self.models
            .get(name)
            .ok_or_else(|| ConfigError::ModelNotFound(name.to_string()))
    }

    /// All models advertising the given capability.
    pub fn models_with_capability(&self, cap: Capability) -> Vec<&ModelDescriptor> {
        self.models
            .values()
            .filter(|m| m.capabilities.contains(&cap))
            .collect()
    }

    pub fn secret(&self) -> &[u8] {
        self.oauth2.secret_key.as_bytes()
    }

    pub fn algorithm(&self) -> &str {
        &self.oauth2.algorithm
    }

    pub fn api_key_ttl_seconds(&self) -> i64 {
        self.oauth2.api_key_ttl_seconds()
    }

    pub fn session_ttl_seconds(&self) -> i64 {
        self.oauth2.session_ttl_seconds()
    }
}

/// Read-mostly, hot-swappable holder of the current [`GatewayConfig`]
/// snapshot. Readers clone the `Arc` and never hold the lock across an
/// `.await` point.
pub struct ConfigRegistry {
    current: RwLock<Arc<GatewayConfig>>,
}

impl ConfigRegistry {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(GatewayConfig::from_file(path)?))
    }

    /// Snapshot the current configuration. Cheap — just bumps an `Arc`
    /// refcount.
    pub fn snapshot(&self) -> Arc<GatewayConfig> {
        self.current
            .read()
            .expect("config registry lock poisoned")
            .clone()
    }

    /// Atomically replace the current snapshot. In-flight readers holding an
    /// old `Arc` are unaffected.
    pub fn reload(&self, config: GatewayConfig) {
        let mut guard = self.current.write().expect("config registry lock poisoned");
        *guard = Arc::new(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
database:
  host: localhost
  port: 5432
  username: gateway
  password: secret
  database: gateway
  table_prefix: oauth2
oauth2:
  secret_key: test-secret
  algorithm: HS256
  access_token_expire_minutes: 30
  user_token_expire_days: 30
  admin_token_never_expires: true
  default_admin:
    username: admin
    password: admin-password
  exclude_paths:
    - /session
models:
  llama-3-8b:
    host: backend.internal
    port: 8001
    type: [chat]
  embed-ada:
    host: backend.internal
    port: 8002
    type: [embeddings]
logging:
  level: info
  table_prefix: usage
"#
    }

    #[test]
    fn parses_full_document() {
        let cfg = GatewayConfig::from_yaml_str(sample_yaml()).unwrap();
        assert_eq!(cfg.database.host, "localhost");
        assert_eq!(cfg.oauth2.algorithm, "HS256");
        assert_eq!(cfg.models.len(), 2);
        assert_eq!(cfg.server.http_addr, "0.0.0.0:8000");
    }

    #[test]
    fn get_model_found_and_missing() {
        let cfg = GatewayConfig::from_yaml_str(sample_yaml()).unwrap();
        assert!(cfg.get_model("llama-3-8b").is_ok());
        assert!(matches!(
            cfg.get_model("nonexistent"),
            Err(ConfigError::ModelNotFound(_))
        ));
    }

    #[test]
    fn models_with_capability_filters() {
        let cfg = GatewayConfig::from_yaml_str(sample_yaml()).unwrap();
        let chat_models = cfg.models_with_capability(Capability::ChatBase);
        assert_eq!(chat_models.len(), 1);
        assert!(chat_models[0].has_capability(Capability::ChatBase));
    }

    #[test]
    fn ttl_conversions() {
        let cfg = GatewayConfig::from_yaml_str(sample_yaml()).unwrap();
        assert_eq!(cfg.session_ttl_seconds(), 1800);
        assert_eq!(cfg.api_key_ttl_seconds(), 30 * 86_400);
    }

    #[test]
    fn registry_snapshot_is_stable_across_reload() {
        let registry = ConfigRegistry::new(GatewayConfig::from_yaml_str(sample_yaml()).unwrap());
        let before = registry.snapshot();
        let mut reloaded = GatewayConfig::from_yaml_str(sample_yaml()).unwrap();
        reloaded.oauth2.secret_key = "rotated".to_string();
        registry.reload(reloaded);
        let after = registry.snapshot();

        assert_eq!(before.oauth2.secret_key, "test-secret");
        assert_eq!(after.oauth2.secret_key, "rotated");
    }
}
