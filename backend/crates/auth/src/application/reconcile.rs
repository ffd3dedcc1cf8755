//! Reconcile Use Case
//!
//! Maps a verified external identity onto exactly one local account:
//! the identity's stored account wins, then an account the identity was
//! pre-bound to, then the logged-in account; otherwise a new account is
//! created. Runs under a per-identity lock, then a per-account lock, so
//! neither two first logins of one identity nor two links into one account
//! can interleave in this process. Across processes the store rejects a
//! conflicting identity write and the reconciliation is retried once.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::application::session::Session;
use crate::domain::entity::{account::Account, identity::ExternalIdentity};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::{
    account_id::AccountId, composite_id::CompositeId, email::Email, role::Role,
};
use crate::error::{AuthError, AuthResult};

// ============================================================================
// Keyed locks
// ============================================================================

type LockMap<K> = Arc<DashMap<K, Arc<Mutex<()>>>>;

/// Async mutexes, one per key currently in use
pub struct KeyedLocks<K> {
    inner: LockMap<K>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    pub async fn lock(&self, key: &K) -> KeyGuard<K> {
        // Clone out of the map before awaiting so no shard lock is held.
        let mutex = self.inner.entry(key.clone()).or_default().value().clone();
        let guard = mutex.lock_owned().await;

        KeyGuard {
            key: key.clone(),
            map: Arc::clone(&self.inner),
            guard: Some(guard),
        }
    }

    /// Number of keys with a live lock entry
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for KeyedLocks<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLocks")
            .field("len", &self.inner.len())
            .finish()
    }
}

/// Held for the duration of one reconciliation. The map entry is removed
/// once nobody holds or waits on it.
pub struct KeyGuard<K>
where
    K: Eq + Hash,
{
    key: K,
    map: LockMap<K>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyGuard<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.guard.take();
        self.map
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Locks shared by every reconciliation in the process.
///
/// Always taken identity first, account second.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    identities: KeyedLocks<CompositeId>,
    accounts: KeyedLocks<AccountId>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_identity(&self, composite_id: &CompositeId) -> KeyGuard<CompositeId> {
        self.identities.lock(composite_id).await
    }

    pub async fn lock_account(&self, account_id: &AccountId) -> KeyGuard<AccountId> {
        self.accounts.lock(account_id).await
    }

    /// Number of identity and account keys with a live lock entry
    pub fn len(&self) -> usize {
        self.identities.len() + self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty() && self.accounts.is_empty()
    }
}

// ============================================================================
// Use case
// ============================================================================

/// Reconcile output
#[derive(Debug, Clone)]
pub struct ReconcileOutput {
    pub account: Account,
    /// Identity as persisted
    pub identity: ExternalIdentity,
    /// Whether this call created the account
    pub account_created: bool,
}

pub struct ReconcileUseCase<R>
where
    R: AuthStore,
{
    repo: Arc<R>,
    locks: Arc<IdentityLocks>,
}

impl<R> ReconcileUseCase<R>
where
    R: AuthStore,
{
    pub fn new(repo: Arc<R>, locks: Arc<IdentityLocks>) -> Self {
        Self { repo, locks }
    }

    pub async fn execute<S>(
        &self,
        session: &mut S,
        identity: ExternalIdentity,
    ) -> AuthResult<ReconcileOutput>
    where
        S: Session + ?Sized,
    {
        match self.reconcile(session, identity.clone()).await {
            Err(AuthError::LinkConflict { composite_id }) => {
                // Another process linked it first; its stored link now wins.
                tracing::debug!(composite_id = %composite_id, "Retrying reconciliation");
                self.reconcile(session, identity).await
            }
            result => result,
        }
    }

    async fn reconcile<S>(
        &self,
        session: &mut S,
        mut identity: ExternalIdentity,
    ) -> AuthResult<ReconcileOutput>
    where
        S: Session + ?Sized,
    {
        let composite_id = identity.composite_id()?;
        let session_account_id = session.current_account_id().ok();

        let identity_guard = self.locks.lock_identity(&composite_id).await;

        let stored = self.repo.find_by_composite_id(&composite_id).await?;
        let stored_account_id = stored.as_ref().and_then(|s| s.account_id);

        match (stored_account_id, session_account_id) {
            (Some(stored_id), Some(session_id)) if stored_id != session_id => {
                tracing::debug!(
                    composite_id = %composite_id,
                    stored_account_id = %stored_id,
                    session_account_id = %session_id,
                    "Identity already linked to another account, switching session"
                );
            }
            _ => {}
        }

        let allocated = stored_account_id.is_none() && identity.allocates_account;
        let target = stored_account_id
            .or(identity.account_id)
            .or(session_account_id);

        let (account_guard, mut account, account_created) = match target {
            None => (None, Account::new(), true),
            Some(account_id) => {
                let guard = self.locks.lock_account(&account_id).await;
                let (account, created) =
                    self.load_account(&composite_id, account_id, allocated).await?;
                (Some(guard), account, created)
            }
        };

        account.link_identity(composite_id.clone());

        if identity.is_admin && account.grant_role(Role::admin()) {
            tracing::info!(
                account_id = %account.account_id,
                composite_id = %composite_id,
                "Granted admin role from provider"
            );
        }

        if let Some(stored) = &stored {
            identity.inherit_from(stored);
        }
        identity.account_id = Some(account.account_id);
        identity.allocates_account = false;
        identity.touch();

        self.repo.save_link(&account, &identity).await?;

        if let Some(email) = identity.person.primary_email() {
            self.link_email(&account.account_id, email).await?;
        }

        drop(account_guard);
        drop(identity_guard);

        session.set_current_account_id(&account.account_id)?;

        tracing::info!(
            account_id = %account.account_id,
            composite_id = %composite_id,
            account_created,
            "Identity reconciled"
        );

        Ok(ReconcileOutput {
            account,
            identity,
            account_created,
        })
    }

    /// Load the target account. A missing account is only created when the
    /// identity carried a freshly allocated ID.
    async fn load_account(
        &self,
        composite_id: &CompositeId,
        account_id: AccountId,
        allocated: bool,
    ) -> AuthResult<(Account, bool)> {
        match self.repo.find_by_id(&account_id).await? {
            Some(account) => Ok((account, false)),
            None if allocated => Ok((Account::with_id(account_id), true)),
            None => Err(AuthError::AccountSyncFault {
                composite_id: composite_id.clone(),
                account_id,
            }),
        }
    }

    /// Claim `email` for the account unless another account owns it.
    async fn link_email(&self, account_id: &AccountId, email: &str) -> AuthResult<()> {
        let email = match Email::parse(email) {
            Ok(email) => email,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unusable email from provider");
                return Ok(());
            }
        };

        match self.repo.lookup_account_id(&email).await? {
            None => self.repo.link(account_id, &email).await,
            Some(owner) if owner == *account_id => Ok(()),
            Some(owner) => {
                tracing::warn!(
                    account_id = %account_id,
                    owner_account_id = %owner,
                    "Email already linked to another account, not re-linking"
                );
                Ok(())
            }
        }
    }
}
