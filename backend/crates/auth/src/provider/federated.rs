//! Federated Provider
//!
//! Trusts identity headers set by a fronting identity-aware proxy. Only
//! safe when that proxy strips these headers from client requests.
//! Without the headers the user agent is sent to the proxy's login URL.

use async_trait::async_trait;
use url::Url;

use crate::domain::entity::{identity::ExternalIdentity, person::Person};
use crate::error::{AuthError, AuthResult};
use crate::provider::{AuthOutcome, Provider, ProviderRequest, is_truthy};

pub const HEADER_IDENTITY: &str = "x-federated-identity";
pub const HEADER_USER_ID: &str = "x-federated-user-id";
pub const HEADER_EMAIL: &str = "x-federated-email";
pub const HEADER_ADMIN: &str = "x-federated-admin";

pub struct FederatedProvider {
    name: String,
    login_url: String,
}

impl FederatedProvider {
    /// `login_url` receives `continue` (our callback) and `provider` params.
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            name: "Federated".to_string(),
            login_url: login_url.into(),
        }
    }

    fn login_redirect(&self, req: &ProviderRequest) -> AuthResult<String> {
        let mut url = Url::parse(&self.login_url)
            .map_err(|e| AuthError::Internal(format!("invalid federated login URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("continue", &req.callback_url)
            .append_pair("provider", req.param("provider").unwrap_or_default());
        Ok(url.into())
    }
}

#[async_trait]
impl Provider for FederatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self, req: &ProviderRequest) -> AuthResult<AuthOutcome> {
        let federated_identity = req.header(HEADER_IDENTITY);
        let Some(provider_id) = federated_identity.or_else(|| req.header(HEADER_USER_ID)) else {
            return self.login_redirect(req).map(AuthOutcome::Redirect);
        };

        let mut person = match req.header(HEADER_EMAIL) {
            Some(email) => Person::with_email(email),
            None => Person::default(),
        };
        person.url = federated_identity.unwrap_or_default().to_string();

        let provider_url = req.param("provider").unwrap_or_default();
        let mut identity = ExternalIdentity::new(&self.name, provider_url)
            .with_provider_id(provider_id)
            .with_person(person);
        identity.is_admin = is_truthy(req.header(HEADER_ADMIN));

        Ok(AuthOutcome::Identity(identity))
    }
}
