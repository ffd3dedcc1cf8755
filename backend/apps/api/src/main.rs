//! Gateway Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;

use std::sync::Arc;

use auth::domain::repository::AuthStore;
use auth::provider::{
    dev::DevProvider, facebook, federated::FederatedProvider, github, google,
    oauth2::OAuth2Provider, password::PasswordProvider,
};
use auth::{
    AuthAppState, AuthConfig, MemoryAuthRepository, PgAuthRepository, ProviderRegistry,
    api_router, auth_router,
};
use axum::{
    Router,
    http::{Method, header},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::GatewayConfig;

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env()?;
    let auth_config = Arc::new(config.auth.clone());

    let (auth, api) = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;

            tracing::info!("Connected to database");

            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            routers(
                Arc::new(PgAuthRepository::new(pool)),
                auth_config.clone(),
                &config,
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, accounts are kept in memory");
            routers(
                Arc::new(MemoryAuthRepository::new()),
                auth_config.clone(),
                &config,
            )
        }
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origins.clone())
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let base_url = auth_config.base_url.trim_end_matches('/');
    let app = Router::new()
        .nest(base_url, auth)
        .nest("/api/auth", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Listening on {}", config.listen_addr);

    let listener = TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Provider routes and JSON API over one store
fn routers<R>(repo: Arc<R>, auth_config: Arc<AuthConfig>, config: &GatewayConfig) -> (Router, Router)
where
    R: AuthStore,
{
    let registry = provider_registry(&repo, &auth_config, config);
    let state = AuthAppState::new(repo, auth_config, registry);
    (auth_router(state.clone()), api_router(state))
}

fn provider_registry<R>(
    repo: &Arc<R>,
    auth_config: &Arc<AuthConfig>,
    config: &GatewayConfig,
) -> ProviderRegistry
where
    R: AuthStore,
{
    let mut registry = ProviderRegistry::new();
    registry.register(
        "password",
        Arc::new(PasswordProvider::new(repo.clone(), auth_config.clone())),
    );

    let state_key = &auth_config.session_secret;
    let oauth2 = |provider: OAuth2Provider| {
        Arc::new(
            provider
                .with_state_ttl(auth_config.oauth_state_ttl)
                .with_cookie_secure(auth_config.cookie_secure),
        )
    };

    if let Some(c) = &config.google {
        let provider = google::provider(&c.client_id, &c.client_secret, c.scope.as_deref(), state_key);
        registry.register("google", oauth2(provider));
    }
    if let Some(c) = &config.github {
        let provider = github::provider(&c.client_id, &c.client_secret, c.scope.as_deref(), state_key);
        registry.register("github", oauth2(provider));
    }
    if let Some(c) = &config.facebook {
        let provider =
            facebook::provider(&c.client_id, &c.client_secret, c.scope.as_deref(), state_key);
        registry.register("facebook", oauth2(provider));
    }
    if let Some(login_url) = &config.federated_login_url {
        registry.register("federated", Arc::new(FederatedProvider::new(login_url.clone())));
    }
    if config.enable_dev_provider {
        tracing::warn!("Dev provider enabled, any posted identity is trusted");
        registry.register("dev", Arc::new(DevProvider::new()));
    }

    tracing::info!(
        providers = ?registry.keys().collect::<Vec<_>>(),
        "Identity providers registered"
    );
    registry
}
