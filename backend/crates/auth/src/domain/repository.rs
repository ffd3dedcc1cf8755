//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the infra layer.

use crate::domain::entity::{account::Account, identity::ExternalIdentity};
use crate::domain::value_object::{
    account_id::AccountId, composite_id::CompositeId, email::Email,
};
use crate::error::AuthResult;

/// External identity lookups
#[trait_variant::make(IdentityRepository: Send)]
pub trait LocalIdentityRepository {
    /// Find an identity by its composite key
    async fn find_by_composite_id(
        &self,
        composite_id: &CompositeId,
    ) -> AuthResult<Option<ExternalIdentity>>;

    /// Find several identities, returned in the order of `composite_ids`.
    /// Keys without a stored identity are skipped.
    async fn find_many(&self, composite_ids: &[CompositeId]) -> AuthResult<Vec<ExternalIdentity>>;
}

/// Account lookups. Accounts are only written through [`LinkRepository`].
#[trait_variant::make(AccountRepository: Send)]
pub trait LocalAccountRepository {
    /// Find account by ID
    async fn find_by_id(&self, account_id: &AccountId) -> AuthResult<Option<Account>>;
}

/// Email address to account mapping
#[trait_variant::make(EmailIndex: Send)]
pub trait LocalEmailIndex {
    /// Account currently owning `email`
    async fn lookup_account_id(&self, email: &Email) -> AuthResult<Option<AccountId>>;

    /// Bind `email` to `account_id`. Re-linking the same pair is a no-op.
    async fn link(&self, account_id: &AccountId, email: &Email) -> AuthResult<()>;
}

/// The reconciliation write
#[trait_variant::make(LinkRepository: Send)]
pub trait LocalLinkRepository {
    /// Upsert `account` and `identity` together: both are stored or neither is.
    ///
    /// An existing account keeps the identities and roles it already has;
    /// the given ones are appended. Fails with `LinkConflict` when the
    /// stored identity belongs to a different account.
    async fn save_link(&self, account: &Account, identity: &ExternalIdentity) -> AuthResult<()>;
}

/// Everything the auth use cases need from a store
pub trait AuthStore:
    IdentityRepository + AccountRepository + EmailIndex + LinkRepository + Send + Sync + 'static
{
}

impl<T> AuthStore for T where
    T: IdentityRepository + AccountRepository + EmailIndex + LinkRepository + Send + Sync + 'static
{
}
