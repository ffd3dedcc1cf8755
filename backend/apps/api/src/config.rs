//! Gateway Configuration
//!
//! Read from the environment after `.env` is loaded. Providers without
//! credentials are simply not registered.

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, bail};
use auth::AuthConfig;
use axum::http::HeaderValue;
use base64::Engine;
use base64::engine::general_purpose;

/// Client credentials of one OAuth2 provider
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Overrides the provider's default scope
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Accounts live in memory when unset
    pub database_url: Option<String>,
    pub frontend_origins: Vec<HeaderValue>,
    pub auth: AuthConfig,
    pub google: Option<OAuthCredentials>,
    pub github: Option<OAuthCredentials>,
    pub facebook: Option<OAuthCredentials>,
    /// Login page of the trusted upstream proxy
    pub federated_login_url: Option<String>,
    /// Always on in debug builds
    pub enable_dev_provider: bool,
}

impl GatewayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = var("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:31113".to_string())
            .parse()
            .context("LISTEN_ADDR must be host:port")?;

        let frontend_origins = var("FRONTEND_ORIGINS")
            .unwrap_or_else(|| "http://localhost:40922,http://127.0.0.1:40922".to_string())
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();

        Ok(Self {
            listen_addr,
            database_url: var("DATABASE_URL"),
            frontend_origins,
            auth: auth_config()?,
            google: oauth_credentials("GOOGLE"),
            github: oauth_credentials("GITHUB"),
            facebook: oauth_credentials("FACEBOOK"),
            federated_login_url: var("FEDERATED_LOGIN_URL"),
            enable_dev_provider: cfg!(debug_assertions)
                || var("AUTH_ENABLE_DEV_PROVIDER").is_some_and(|v| {
                    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
                }),
        })
    }
}

fn auth_config() -> anyhow::Result<AuthConfig> {
    let mut config = match var("AUTH_SESSION_SECRET") {
        Some(secret_b64) => {
            let secret = decode_secret(&secret_b64).context("AUTH_SESSION_SECRET")?;
            AuthConfig {
                session_secret: secret,
                ..AuthConfig::default()
            }
        }
        None if cfg!(debug_assertions) => AuthConfig::development(),
        None => bail!("AUTH_SESSION_SECRET must be set in production"),
    };

    if let Some(pepper_b64) = var("AUTH_PASSWORD_PEPPER") {
        let pepper = general_purpose::STANDARD
            .decode(pepper_b64.trim())
            .context("AUTH_PASSWORD_PEPPER must be base64")?;
        config.password_pepper = Some(pepper);
    }
    if let Some(secure) = var("AUTH_COOKIE_SECURE") {
        config.cookie_secure = secure != "false" && secure != "0";
    }
    if let Some(same_site) = var("AUTH_COOKIE_SAME_SITE") {
        config.cookie_same_site = same_site
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    config.public_origin = var("PUBLIC_ORIGIN");
    if let Some(url) = var("AUTH_LOGIN_URL") {
        config.login_url = url;
    }
    if let Some(url) = var("AUTH_SUCCESS_URL") {
        config.success_url = url;
    }

    Ok(config)
}

fn decode_secret(secret_b64: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = general_purpose::STANDARD
        .decode(secret_b64.trim())
        .context("must be base64")?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow::anyhow!("must decode to 32 bytes, got {}", bytes.len()))
}

fn oauth_credentials(prefix: &str) -> Option<OAuthCredentials> {
    Some(OAuthCredentials {
        client_id: var(&format!("{prefix}_CLIENT_ID"))?,
        client_secret: var(&format!("{prefix}_CLIENT_SECRET"))?,
        scope: var(&format!("{prefix}_SCOPE")),
    })
}

/// Non-empty environment variable
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
