//! List Profiles Use Case
//!
//! Person data of every identity linked to an account, in link order.

use std::sync::Arc;

use crate::domain::entity::person::Person;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::account_id::AccountId;
use crate::error::{AuthError, AuthResult};

pub struct ListProfilesUseCase<R>
where
    R: AuthStore,
{
    repo: Arc<R>,
}

impl<R> ListProfilesUseCase<R>
where
    R: AuthStore,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, account_id: &AccountId) -> AuthResult<Vec<Person>> {
        let account = self
            .repo
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::NotLoggedIn)?;

        let identities = self.repo.find_many(&account.linked_identities).await?;
        if identities.len() != account.linked_identities.len() {
            tracing::warn!(
                account_id = %account_id,
                linked = account.linked_identities.len(),
                found = identities.len(),
                "Linked identities missing from store"
            );
        }

        Ok(identities.into_iter().map(|identity| identity.person).collect())
    }
}
