//! Dev Provider
//!
//! Trusts whatever is posted. For local development and tests only.

use async_trait::async_trait;

use crate::domain::entity::identity::ExternalIdentity;
use crate::error::AuthResult;
use crate::provider::{AuthOutcome, Provider, ProviderRequest, is_truthy};

pub struct DevProvider {
    name: String,
    url: String,
}

impl DevProvider {
    pub fn new() -> Self {
        Self {
            name: "Dev".to_string(),
            url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for DevProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for DevProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self, req: &ProviderRequest) -> AuthResult<AuthOutcome> {
        let provider_id = req.non_empty_param("ID").unwrap_or("default");

        let mut identity = ExternalIdentity::new(&self.name, &self.url)
            .with_provider_id(provider_id)
            .with_person(req.person_from_params());
        identity.is_admin = is_truthy(req.param("IsAdmin"));

        Ok(AuthOutcome::Identity(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(outcome: AuthOutcome) -> ExternalIdentity {
        match outcome {
            AuthOutcome::Identity(identity) => identity,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_id() {
        let outcome = DevProvider::new()
            .authenticate(&ProviderRequest::new("dev"))
            .await
            .unwrap();
        let identity = identity(outcome);
        assert_eq!(identity.provider_name, "Dev");
        assert_eq!(identity.provider_url, "http://localhost:8080");
        assert_eq!(identity.provider_id, "default");
        assert!(!identity.is_admin);
    }

    #[tokio::test]
    async fn test_params() {
        let mut req = ProviderRequest::new("dev");
        req.params = vec![
            ("ID".into(), "1".into()),
            ("Name.GivenName".into(), "Barack".into()),
            ("IsAdmin".into(), "true".into()),
        ];
        let identity = identity(DevProvider::new().authenticate(&req).await.unwrap());
        assert_eq!(identity.composite_id().unwrap().as_str(), "dev|1");
        assert_eq!(identity.person.name.given_name, "Barack");
        assert!(identity.is_admin);
    }
}
