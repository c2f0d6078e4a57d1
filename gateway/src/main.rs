//! Composition root: loads configuration, wires the persistence,
//! credential, and usage layers together, and serves the HTTP router.

mod agent_format;
mod handlers;
mod llama3;
mod openai;
mod openai_compatible;
mod password;
mod state;
mod tool_calls;
mod usage;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use gateway_auth::CredentialPlane;
use gateway_config::{ConfigRegistry, GatewayConfig};
use gateway_core::health::{HealthIndicator, HealthState, HealthStatus};
use gateway_core::request_id::request_id_middleware;
use gateway_core::{catch_panic_layer, default_cors, default_trace, init_tracing, SecureHeadersLayer};
use gateway_data::NewUser;
use gateway_db::{PgApiKeyRepository, PgUsageRepository, PgUserRepository};
use gateway_usage::{UsagePipeline, UsagePipelineConfig};
use sqlx::PgPool;
use state::Services;
use tracing::{error, info, warn};
use usage::TokenCounter;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Pings the database pool as part of `/health/ready`.
struct DatabaseHealth {
    pool: PgPool,
}

impl HealthIndicator for DatabaseHealth {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> HealthStatus {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => HealthStatus::Up,
            Err(e) => HealthStatus::Down(e.to_string()),
        }
    }
}

/// Creates the configured admin user if it doesn't already exist. Best
/// effort: a failure here is logged, not fatal, since a pre-existing
/// deployment may already carry its own admin account under a different
/// name.
async fn seed_default_admin(config: &GatewayConfig, users: &PgUserRepository) {
    use gateway_data::UserRepository;

    let admin = &config.oauth2.default_admin;
    match users.find_by_username(&admin.username).await {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "could not check for existing default admin, skipping seed");
            return;
        }
    }

    let password_hash = match password::hash(&admin.password) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(error = %e, "could not hash default admin password, skipping seed");
            return;
        }
    };

    let created = users
        .create(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash,
            scopes: vec!["admin".to_string()],
        })
        .await;

    match created {
        Ok(_) => info!(username = %admin.username, "seeded default admin user"),
        Err(e) => warn!(error = %e, "failed to seed default admin user"),
    }
}

fn build_router(services: Services, health: Arc<HealthState>) -> Router {
    let api = Router::new()
        .route("/session", post(handlers::session::login))
        .route("/session/user", get(handlers::session::current_user))
        .route("/session/changePwd", post(handlers::session::change_password))
        .route("/access/refresh", post(handlers::session::refresh))
        .route("/access/info", post(handlers::session::access_info))
        .route(
            "/apikey",
            post(handlers::apikey::issue).get(handlers::apikey::current),
        )
        .route("/v1/models", get(handlers::models::list_models))
        .route("/v1/chat/completions", post(handlers::chat::chat_completions))
        .route("/v1/embeddings", post(handlers::embeddings::create_embeddings))
        .route("/v1/audio/transcriptions", post(handlers::audio::transcribe))
        .route(
            "/admin/users",
            get(handlers::admin::list_users).post(handlers::admin::create_user),
        )
        .route(
            "/admin/users/{username}",
            get(handlers::admin::get_user)
                .put(handlers::admin::update_user)
                .delete(handlers::admin::delete_user),
        )
        .route(
            "/admin/users/{username}/apikeys",
            get(handlers::admin::list_api_keys_for_user).delete(handlers::admin::revoke_api_keys_for_user),
        )
        .with_state(services);

    Router::new()
        .merge(api)
        .merge(gateway_core::health::router(health))
        .layer(SecureHeadersLayer::default())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(catch_panic_layer())
        .layer(default_trace())
        .layer(default_cors())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config_path = env::var("GATEWAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config_registry = ConfigRegistry::load(&config_path).unwrap_or_else(|e| {
        error!(error = %e, path = %config_path, "failed to load configuration");
        std::process::exit(1);
    });
    let config = config_registry.snapshot();

    let pool = gateway_db::connect(&config.database).await.unwrap_or_else(|e| {
        error!(error = %e, "failed to connect to the database");
        std::process::exit(1);
    });
    if let Err(e) = gateway_db::run_migrations(&pool).await {
        error!(error = %e, "failed to run database migrations");
        std::process::exit(1);
    }

    let user_repo = PgUserRepository::new(pool.clone());
    seed_default_admin(&config, &user_repo).await;

    let users: Arc<dyn gateway_data::UserRepository> = Arc::new(user_repo);
    let api_keys: Arc<dyn gateway_data::ApiKeyRepository> = Arc::new(PgApiKeyRepository::new(pool.clone()));
    let usage_repo: Arc<dyn gateway_data::UsageRepository> = Arc::new(PgUsageRepository::new(pool.clone()));

    let credentials = Arc::new(CredentialPlane::new(
        config.secret(),
        api_keys.clone(),
        config.session_ttl_seconds(),
        config.api_key_ttl_seconds(),
        config.oauth2.admin_token_never_expires,
    ));

    let usage = UsagePipeline::spawn(usage_repo, UsagePipelineConfig::default());

    let counter_endpoint = config
        .models
        .values()
        .find(|m| m.has_capability(gateway_config::Capability::ChatBase))
        .map(|m| m.endpoint())
        .unwrap_or_default();

    let services = Services {
        config: Arc::new(config_registry),
        credentials,
        users,
        api_keys,
        usage: usage.clone(),
        token_counter: TokenCounter::new(counter_endpoint),
        http: reqwest::Client::new(),
    };

    let health = Arc::new(HealthState::new().with_check(DatabaseHealth { pool }));

    let app = build_router(services, health);

    let listener = tokio::net::TcpListener::bind(&config.server.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, addr = %config.server.http_addr, "failed to bind listener");
            std::process::exit(1);
        });

    info!(addr = %config.server.http_addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| error!(error = %e, "server exited with error"));

    usage.shutdown(Duration::from_secs(10)).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
