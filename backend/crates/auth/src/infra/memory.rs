//! In-Memory Repository Implementation
//!
//! All tables sit behind one lock, so `save_link` is trivially atomic.
//! Used by tests and by the gateway when no database is configured.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::entity::{account::Account, identity::ExternalIdentity};
use crate::domain::repository::{AccountRepository, EmailIndex, IdentityRepository, LinkRepository};
use crate::domain::value_object::{
    account_id::AccountId, composite_id::CompositeId, email::Email,
};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Default)]
struct Tables {
    identities: HashMap<CompositeId, ExternalIdentity>,
    accounts: HashMap<AccountId, Account>,
    emails: HashMap<Email, AccountId>,
}

/// Memory-backed auth repository. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthRepository {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account_count(&self) -> usize {
        self.tables.read().await.accounts.len()
    }

    pub async fn identity_count(&self) -> usize {
        self.tables.read().await.identities.len()
    }
}

// ============================================================================
// Identity Repository Implementation
// ============================================================================

impl IdentityRepository for MemoryAuthRepository {
    async fn find_by_composite_id(
        &self,
        composite_id: &CompositeId,
    ) -> AuthResult<Option<ExternalIdentity>> {
        Ok(self.tables.read().await.identities.get(composite_id).cloned())
    }

    async fn find_many(&self, composite_ids: &[CompositeId]) -> AuthResult<Vec<ExternalIdentity>> {
        let tables = self.tables.read().await;
        Ok(composite_ids
            .iter()
            .filter_map(|id| tables.identities.get(id).cloned())
            .collect())
    }
}

// ============================================================================
// Account Repository Implementation
// ============================================================================

impl AccountRepository for MemoryAuthRepository {
    async fn find_by_id(&self, account_id: &AccountId) -> AuthResult<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(account_id).cloned())
    }
}

// ============================================================================
// Email Index Implementation
// ============================================================================

impl EmailIndex for MemoryAuthRepository {
    async fn lookup_account_id(&self, email: &Email) -> AuthResult<Option<AccountId>> {
        Ok(self.tables.read().await.emails.get(email).copied())
    }

    async fn link(&self, account_id: &AccountId, email: &Email) -> AuthResult<()> {
        self.tables
            .write()
            .await
            .emails
            .entry(email.clone())
            .or_insert(*account_id);
        Ok(())
    }
}

// ============================================================================
// Link Repository Implementation
// ============================================================================

impl LinkRepository for MemoryAuthRepository {
    async fn save_link(&self, account: &Account, identity: &ExternalIdentity) -> AuthResult<()> {
        let composite_id = identity.composite_id()?;
        let mut stored = identity.clone();
        stored.is_admin = false;
        stored.allocates_account = false;

        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.identities.get(&composite_id) {
            if existing.account_id != stored.account_id {
                return Err(AuthError::LinkConflict { composite_id });
            }
        }

        match tables.accounts.get_mut(&account.account_id) {
            Some(existing) => {
                for linked in &account.linked_identities {
                    existing.link_identity(linked.clone());
                }
                for role in &account.roles {
                    existing.grant_role(role.clone());
                }
            }
            None => {
                tables.accounts.insert(account.account_id, account.clone());
            }
        }
        tables.identities.insert(composite_id, stored);
        Ok(())
    }
}
