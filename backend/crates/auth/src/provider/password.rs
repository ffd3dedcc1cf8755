//! Password Provider
//!
//! Form keys: `Email`, `Password.New`, `Password.Current`, plus person
//! attributes. Which password keys are present picks the operation; see
//! [`PasswordUseCase`].
//!
//! Without a session, log in and change locate the account through the email index.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::config::AuthConfig;
use crate::application::password::{PASSWORD_PROVIDER_NAME, PasswordInput, PasswordUseCase};
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};
use crate::provider::{AuthOutcome, Provider, ProviderRequest};

pub struct PasswordProvider<R>
where
    R: AuthStore,
{
    use_case: PasswordUseCase<R>,
}

impl<R> PasswordProvider<R>
where
    R: AuthStore,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self {
            use_case: PasswordUseCase::new(repo, config),
        }
    }
}

#[async_trait]
impl<R> Provider for PasswordProvider<R>
where
    R: AuthStore,
{
    fn name(&self) -> &str {
        PASSWORD_PROVIDER_NAME
    }

    async fn authenticate(&self, req: &ProviderRequest) -> AuthResult<AuthOutcome> {
        let input = PasswordInput {
            new: req.param("Password.New").map(str::to_string),
            current: req.param("Password.Current").map(str::to_string),
            email: req.param("Email").unwrap_or_default().to_string(),
            person: req.person_from_params(),
        };

        self.use_case
            .execute(req.session_account_id, input)
            .await?
            .map(AuthOutcome::Identity)
            .ok_or(AuthError::CredentialsMissing)
    }
}
