//! Identity Providers
//!
//! A provider turns an inbound request into either a redirect (more
//! round trips needed) or a verified [`ExternalIdentity`]. The dispatcher
//! hands identities to the reconciliation engine; providers never touch
//! accounts themselves.

pub mod dev;
pub mod facebook;
pub mod federated;
pub mod github;
pub mod google;
pub mod oauth2;
pub mod password;
pub mod registry;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, Method};

use crate::domain::entity::identity::ExternalIdentity;
use crate::domain::entity::person::{Person, PersonImage};
use crate::domain::value_object::account_id::AccountId;
use crate::error::AuthResult;

pub use registry::ProviderRegistry;

/// What a provider decided for this request
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Send the user agent elsewhere first (authorize page, login form)
    Redirect(String),
    /// Redirect that also sets a cookie the provider reads back on callback
    RedirectWithCookie {
        location: String,
        set_cookie: HeaderValue,
    },
    /// Authentication finished
    Identity(ExternalIdentity),
}

/// Request data handed to providers
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub method: Method,
    /// Whether the `/{provider}/callback` path was hit
    pub is_callback: bool,
    /// Registry key the request was routed by
    pub provider_key: String,
    /// Form body parameters followed by query parameters
    pub params: Vec<(String, String)>,
    pub headers: HeaderMap,
    /// Account logged in for this request, if any
    pub session_account_id: Option<AccountId>,
    /// Absolute URL of this provider's callback route
    pub callback_url: String,
}

impl ProviderRequest {
    pub fn new(provider_key: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            is_callback: false,
            provider_key: provider_key.into(),
            params: Vec::new(),
            headers: HeaderMap::new(),
            session_account_id: None,
            callback_url: String::new(),
        }
    }

    /// First value for `key`. Form values shadow query values.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`param`](Self::param), treating an empty value as absent.
    pub fn non_empty_param(&self, key: &str) -> Option<&str> {
        self.param(key).filter(|v| !v.is_empty())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Person attributes posted as dotted form keys
    /// (`Email`, `Name.GivenName`, `Image.Url`, ...).
    pub fn person_from_params(&self) -> Person {
        let text = |key: &str| self.param(key).unwrap_or_default().to_string();

        let mut person = match self.non_empty_param("Email") {
            Some(email) => Person::with_email(email),
            None => Person::default(),
        };
        person.display_name = text("DisplayName");
        person.name.given_name = text("Name.GivenName");
        person.name.family_name = text("Name.FamilyName");
        person.name.formatted = text("Name.Formatted");
        person.url = text("Url");
        person.locale = text("Locale");
        person.image = self
            .non_empty_param("Image.Url")
            .map(|url| PersonImage { url: url.to_string() });
        person
    }
}

/// A pluggable authentication strategy
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name, e.g. `"Google"`
    fn name(&self) -> &str;

    async fn authenticate(&self, req: &ProviderRequest) -> AuthResult<AuthOutcome>;
}

/// Parse a truthy flag value (`1`, `true`, `on`, `yes`)
pub(crate) fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "on" | "yes")
    )
}
