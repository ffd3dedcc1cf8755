//! Account Entity
//!
//! A local account aggregating one or more external identities.
//!
//! Invariant maintained by the reconciliation engine: every entry of
//! `linked_identities` resolves to exactly one stored identity whose
//! `account_id` is this account.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::value_object::{account_id::AccountId, composite_id::CompositeId, role::Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Assigned once, never reused
    pub account_id: AccountId,
    /// Insertion ordered; the first entry created the account
    pub linked_identities: Vec<CompositeId>,
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a freshly allocated ID
    pub fn new() -> Self {
        Self::with_id(AccountId::new())
    }

    /// Create a new account around an already allocated ID
    pub fn with_id(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            linked_identities: Vec::new(),
            roles: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_linked(&self, composite_id: &CompositeId) -> bool {
        self.linked_identities.contains(composite_id)
    }

    /// Append an identity key. Returns `false` if it was already linked.
    pub fn link_identity(&mut self, composite_id: CompositeId) -> bool {
        if self.is_linked(&composite_id) {
            return false;
        }
        self.linked_identities.push(composite_id);
        self.updated_at = Utc::now();
        true
    }

    /// Returns `false` if the role was already granted.
    pub fn grant_role(&mut self, role: Role) -> bool {
        let added = self.roles.insert(role);
        if added {
            self.updated_at = Utc::now();
        }
        added
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}
