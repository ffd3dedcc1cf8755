//! OAuth2 Provider
//!
//! Authorization-code flow:
//! 1. entry path: redirect to the authorize URL with a signed, expiring `state`
//!    and pin the state's nonce in an HttpOnly cookie
//! 2. callback: verify `state` and that its nonce matches the cookie, exchange
//!    `code` at the token URL, fetch the profile with the bearer token and map
//!    it to an identity
//!
//! Google, GitHub and Facebook are this provider with fixed endpoints and
//! their own profile mapper.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use platform::cookie::{self, CookieAttributes};
use platform::crypto;

use crate::domain::entity::{identity::ExternalIdentity, person::Person};
use crate::error::{AuthError, AuthResult};
use crate::provider::{AuthOutcome, Provider, ProviderRequest};

/// Cookie holding the nonce of the authorization request in flight
pub const STATE_COOKIE_NAME: &str = "auth_oauth2_state";

/// Turns a provider's profile payload into `(provider_id, person)`
pub type ProfileMapper = fn(&Value) -> AuthResult<MappedProfile>;

#[derive(Debug, Clone, Default)]
pub struct MappedProfile {
    pub provider_id: String,
    pub person: Person,
}

/// Static description of an OAuth2 provider
#[derive(Debug, Clone)]
pub struct OAuth2Settings {
    pub name: String,
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub profile_url: String,
}

pub struct OAuth2Provider {
    settings: OAuth2Settings,
    mapper: ProfileMapper,
    http: reqwest::Client,
    state_key: Vec<u8>,
    state_ttl: Duration,
    state_cookie: CookieAttributes,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl OAuth2Provider {
    /// `state_key` signs the `state` parameter; use the session secret.
    pub fn new(settings: OAuth2Settings, mapper: ProfileMapper, state_key: &[u8]) -> Self {
        let state_ttl = Duration::from_secs(600);
        Self {
            settings,
            mapper,
            http: reqwest::Client::new(),
            state_key: state_key.to_vec(),
            state_ttl,
            state_cookie: CookieAttributes {
                max_age: Some(state_ttl),
                ..CookieAttributes::named(STATE_COOKIE_NAME)
            },
        }
    }

    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self.state_cookie.max_age = Some(ttl);
        self
    }

    /// Plain-HTTP development setups need `false`.
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.state_cookie.secure = secure;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn settings(&self) -> &OAuth2Settings {
        &self.settings
    }

    // ========================================================================
    // State
    // ========================================================================

    /// `{provider_key}:{expires_unix}:{nonce}` signed with the state key.
    /// Returns the state and its nonce.
    fn issue_state(&self, provider_key: &str) -> (String, String) {
        let expires = Utc::now().timestamp() + self.state_ttl.as_secs() as i64;
        let nonce = crypto::to_base64_url(&crypto::random_bytes(16));
        let state = crypto::sign(&self.state_key, &format!("{provider_key}:{expires}:{nonce}"));
        (state, nonce)
    }

    /// `browser_nonce` is the state cookie sent with the callback.
    fn verify_state(
        &self,
        provider_key: &str,
        state: &str,
        browser_nonce: Option<&str>,
    ) -> AuthResult<()> {
        let payload =
            crypto::verify_signed(&self.state_key, state).ok_or(AuthError::InvalidOAuthState)?;
        let mut parts = payload.splitn(3, ':');
        let (Some(key), Some(expires), Some(nonce)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidOAuthState);
        };
        let expires: i64 = expires.parse().map_err(|_| AuthError::InvalidOAuthState)?;

        if key != provider_key || expires < Utc::now().timestamp() {
            return Err(AuthError::InvalidOAuthState);
        }
        if browser_nonce != Some(nonce) {
            tracing::debug!(provider = %provider_key, "OAuth2 state not issued to this browser");
            return Err(AuthError::InvalidOAuthState);
        }
        Ok(())
    }

    // ========================================================================
    // Flow
    // ========================================================================

    fn authorize(&self, req: &ProviderRequest) -> AuthResult<AuthOutcome> {
        let (state, nonce) = self.issue_state(&req.provider_key);

        let mut url = Url::parse(&self.settings.auth_url)
            .map_err(|e| AuthError::Internal(format!("invalid auth URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &req.callback_url)
            .append_pair("response_type", "code")
            .append_pair("state", &state);
        if !self.settings.scope.is_empty() {
            url.query_pairs_mut()
                .append_pair("scope", &self.settings.scope);
        }

        let set_cookie = self
            .state_cookie
            .set_cookie_header(&nonce)
            .ok_or_else(|| AuthError::Internal("invalid OAuth2 state cookie".into()))?;

        Ok(AuthOutcome::RedirectWithCookie {
            location: url.into(),
            set_cookie,
        })
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> AuthResult<String> {
        let response = self
            .http
            .post(&self.settings.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let token: TokenResponse = response.json().await?;

        if let Some(error) = token.error {
            let detail = token.error_description.unwrap_or_default();
            return Err(AuthError::Upstream(format!("token endpoint: {error} {detail}")));
        }
        if !status.is_success() {
            return Err(AuthError::Upstream(format!("token endpoint returned {status}")));
        }
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Upstream("token endpoint returned no access_token".into()))
    }

    async fn fetch_profile(&self, access_token: &str) -> AuthResult<Value> {
        let response = self
            .http
            .get(&self.settings.profile_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, "auth-gateway")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn callback(&self, req: &ProviderRequest) -> AuthResult<ExternalIdentity> {
        if let Some(error) = req.non_empty_param("error") {
            return Err(AuthError::ProviderDenied(error.to_string()));
        }
        let state = req
            .non_empty_param("state")
            .ok_or(AuthError::InvalidOAuthState)?;
        let browser_nonce = cookie::extract_cookie(&req.headers, STATE_COOKIE_NAME);
        self.verify_state(&req.provider_key, state, browser_nonce.as_deref())?;

        let code = req
            .non_empty_param("code")
            .ok_or_else(|| AuthError::ProviderDenied("missing authorization code".into()))?;

        let access_token = self.exchange_code(code, &req.callback_url).await?;
        let raw = self.fetch_profile(&access_token).await?;
        let mapped = (self.mapper)(&raw)?;

        tracing::debug!(
            provider = %self.settings.name,
            provider_id = %mapped.provider_id,
            "OAuth2 profile fetched"
        );

        let mut identity = ExternalIdentity::new(&self.settings.name, &self.settings.url)
            .with_provider_id(mapped.provider_id)
            .with_person(mapped.person);
        identity.person_raw = Some(raw);
        Ok(identity)
    }
}

#[async_trait]
impl Provider for OAuth2Provider {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn authenticate(&self, req: &ProviderRequest) -> AuthResult<AuthOutcome> {
        if req.is_callback {
            self.callback(req).await.map(AuthOutcome::Identity)
        } else {
            self.authorize(req)
        }
    }
}

// ============================================================================
// Mapper helpers
// ============================================================================

/// String field, accepting JSON numbers too (GitHub IDs are numeric)
pub(crate) fn json_text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn required_id(value: &Value, key: &str) -> AuthResult<String> {
    json_text(value, key)
        .ok_or_else(|| AuthError::Upstream(format!("profile response has no `{key}`")))
}
