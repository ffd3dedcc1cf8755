//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::cookie::CookieAttributes;
use platform::password::{HashParams, PasswordPolicy};

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Mount point of the provider routes, with trailing slash
    pub base_url: String,
    /// Where failed logins are sent
    pub login_url: String,
    pub logout_url: String,
    /// Where successful logins are sent
    pub success_url: String,
    /// Scheme and host used to build absolute callback URLs
    /// (e.g. `https://example.com`). Derived from `Host` when unset.
    pub public_origin: Option<String>,
    /// Session cookie name
    pub session_cookie_name: String,
    /// Session secret key for HMAC signing (32 bytes)
    pub session_secret: [u8; 32],
    /// Session cookie lifetime
    pub session_ttl: Duration,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    pub password_policy: PasswordPolicy,
    /// Argon2id cost, fixed per deployment
    pub hash_params: HashParams,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Lifetime of the OAuth2 `state` parameter
    pub oauth_state_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "/-/auth/".to_string(),
            login_url: "/-/auth/login".to_string(),
            logout_url: "/-/auth/logout".to_string(),
            success_url: "/".to_string(),
            public_origin: None,
            session_cookie_name: "auth_session".to_string(),
            session_secret: [0u8; 32],
            session_ttl: Duration::from_secs(14 * 24 * 3600), // 2 weeks
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_policy: PasswordPolicy::default(),
            hash_params: HashParams::default(),
            password_pepper: None,
            oauth_state_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl AuthConfig {
    /// Create config with a random session secret (for development)
    pub fn with_random_secret() -> Self {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self {
            session_secret: secret,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    /// Cookie attributes of the session cookie
    pub fn session_cookie(&self) -> CookieAttributes {
        CookieAttributes {
            name: self.session_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
            max_age: Some(self.session_ttl),
        }
    }

    /// Path of a provider's callback route, e.g. `/-/auth/google/callback`
    pub fn callback_path(&self, provider_key: &str) -> String {
        format!(
            "{}/{}/callback",
            self.base_url.trim_end_matches('/'),
            provider_key
        )
    }
}
