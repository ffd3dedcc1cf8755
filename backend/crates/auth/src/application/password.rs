//! Password Use Case
//!
//! Decides, from which of `new` / `current` are present, whether to create
//! a password credential, log in with it, or change it. Produces the
//! identity to hand to [`ReconcileUseCase`](super::reconcile::ReconcileUseCase);
//! it never links accounts itself.
//!
//! | current | new | operation |
//! |---------|-----|-----------|
//! | -       | yes | create; rejected if a credential already exists |
//! | yes     | -   | log in |
//! | yes     | yes | verify `current`, then replace hash and person |
//! | -       | -   | nothing |
//!
//! Create only ever attaches to the session's account or to a freshly
//! allocated one. The email index resolves the account for log in and
//! change, never for create.

use std::sync::Arc;

use platform::password::{ClearTextPassword, HashedPassword};

use crate::application::config::AuthConfig;
use crate::domain::entity::{identity::ExternalIdentity, person::Person};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::{
    account_id::AccountId, composite_id::CompositeId, email::Email,
};
use crate::error::{AuthError, AuthResult};

/// Provider name of password identities
pub const PASSWORD_PROVIDER_NAME: &str = "Password";

/// Password input
#[derive(Debug, Clone, Default)]
pub struct PasswordInput {
    /// Desired password
    pub new: Option<String>,
    /// Password presented for verification
    pub current: Option<String>,
    pub email: String,
    pub person: Person,
}

pub struct PasswordUseCase<R>
where
    R: AuthStore,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> PasswordUseCase<R>
where
    R: AuthStore,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    /// Returns `None` when neither password was supplied.
    pub async fn execute(
        &self,
        session_account_id: Option<AccountId>,
        input: PasswordInput,
    ) -> AuthResult<Option<ExternalIdentity>> {
        let policy = &self.config.password_policy;
        let new = non_empty(input.new)
            .map(|p| ClearTextPassword::new(p, policy))
            .transpose()?;
        let current = non_empty(input.current)
            .map(|p| ClearTextPassword::new(p, policy))
            .transpose()?;
        let email = Email::parse(&input.email)?;

        let mut person = input.person;
        person.email = email.as_str().to_string();

        match (current, new) {
            (None, None) => Ok(None),
            (None, Some(new)) => self
                .create(&new, session_account_id, &email, person)
                .await
                .map(Some),
            (Some(current), new) => {
                let account_id = match session_account_id {
                    Some(id) => Some(id),
                    None => self.repo.lookup_account_id(&email).await?,
                };
                match new {
                    None => self.login(&current, account_id).await.map(Some),
                    Some(new) => self
                        .update(&current, &new, account_id, person)
                        .await
                        .map(Some),
                }
            }
        }
    }

    /// Whether the account has a password credential
    pub async fn is_set(&self, account_id: &AccountId) -> AuthResult<bool> {
        let stored = self
            .repo
            .find_by_composite_id(&password_composite_id(account_id))
            .await?;
        Ok(stored.is_some())
    }

    async fn create(
        &self,
        new: &ClearTextPassword,
        session_account_id: Option<AccountId>,
        email: &Email,
        person: Person,
    ) -> AuthResult<ExternalIdentity> {
        let (account_id, allocates_account) = match session_account_id {
            Some(account_id) => (account_id, false),
            None => match self.repo.lookup_account_id(email).await? {
                Some(owner) if self.is_set(&owner).await? => {
                    return Err(AuthError::PasswordAlreadySet);
                }
                Some(_) => return Err(AuthError::EmailInUse),
                // The account row is written by reconciliation together with the identity.
                None => (AccountId::new(), true),
            },
        };

        if self.is_set(&account_id).await? {
            return Err(AuthError::PasswordAlreadySet);
        }

        let hashed = new.hash(&self.config.hash_params, self.config.pepper())?;

        let mut identity = ExternalIdentity::new(PASSWORD_PROVIDER_NAME, "")
            .with_provider_id(account_id.to_string())
            .with_person(person);
        identity.account_id = Some(account_id);
        identity.allocates_account = allocates_account;
        identity.credential_secret = Some(hashed.as_phc_string().as_bytes().to_vec());

        tracing::debug!(account_id = %account_id, allocates_account, "Password credential prepared");
        Ok(identity)
    }

    async fn login(
        &self,
        password: &ClearTextPassword,
        account_id: Option<AccountId>,
    ) -> AuthResult<ExternalIdentity> {
        let account_id = account_id.ok_or(AuthError::ProfileNotFound)?;
        let stored = self
            .repo
            .find_by_composite_id(&password_composite_id(&account_id))
            .await?
            .ok_or(AuthError::ProfileNotFound)?;

        let hashed = stored_hash(&stored)?;
        if !hashed.verify(password, self.config.pepper()) {
            tracing::debug!(account_id = %account_id, "Password verification failed");
            return Err(AuthError::PasswordMismatch);
        }
        Ok(stored)
    }

    async fn update(
        &self,
        current: &ClearTextPassword,
        new: &ClearTextPassword,
        account_id: Option<AccountId>,
        person: Person,
    ) -> AuthResult<ExternalIdentity> {
        let mut identity = self.login(current, account_id).await?;
        let hashed = new.hash(&self.config.hash_params, self.config.pepper())?;
        identity.credential_secret = Some(hashed.as_phc_string().as_bytes().to_vec());
        identity.person = person;

        tracing::info!(provider_id = %identity.provider_id, "Password changed");
        Ok(identity)
    }
}

pub fn password_composite_id(account_id: &AccountId) -> CompositeId {
    CompositeId::new(PASSWORD_PROVIDER_NAME, &account_id.to_string())
}

/// Stored hash of a password identity
pub fn stored_hash(identity: &ExternalIdentity) -> AuthResult<HashedPassword> {
    let secret = identity
        .credential_secret
        .as_deref()
        .ok_or_else(|| AuthError::Internal("password identity has no credential".into()))?;
    let phc = std::str::from_utf8(secret)
        .map_err(|_| AuthError::Internal("password credential is not UTF-8".into()))?;
    Ok(HashedPassword::from_phc_string(phc)?)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
