//! ExternalIdentity Entity
//!
//! One provider-scoped identity and its link to a local account.
//! The link is a plain [`AccountId`] back-reference; consistency with
//! [`Account::linked_identities`](super::account::Account) is maintained by
//! the reconciliation engine, not by the types.

use chrono::{DateTime, Utc};

use crate::domain::entity::person::Person;
use crate::domain::value_object::{account_id::AccountId, composite_id::CompositeId};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    /// Provider name in its display case, e.g. `"Google"`
    pub provider_name: String,
    /// Origin commonly associated with the provider
    pub provider_url: String,
    /// Opaque, provider-assigned ID
    pub provider_id: String,
    /// Linked account; `None` only before the first reconciliation
    pub account_id: Option<AccountId>,
    /// Provider-private credential material (password hash)
    pub credential_secret: Option<Vec<u8>>,
    pub person: Person,
    /// Raw profile payload returned by the provider
    pub person_raw: Option<serde_json::Value>,
    /// Set by the provider for the current request only; never persisted
    pub is_admin: bool,
    /// `account_id` was freshly allocated and has no stored account yet.
    /// Never persisted.
    pub allocates_account: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExternalIdentity {
    pub fn new(provider_name: impl Into<String>, provider_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            provider_name: provider_name.into(),
            provider_url: provider_url.into(),
            provider_id: String::new(),
            account_id: None,
            credential_secret: None,
            person: Person::default(),
            person_raw: None,
            is_admin: false,
            allocates_account: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = provider_id.into();
        self
    }

    pub fn with_person(mut self, person: Person) -> Self {
        self.person = person;
        self
    }

    /// Lookup key. Fails when the provider left its name or ID empty.
    pub fn composite_id(&self) -> AuthResult<CompositeId> {
        if self.provider_name.is_empty() {
            return Err(AuthError::MalformedIdentity("empty provider name"));
        }
        if self.provider_id.is_empty() {
            return Err(AuthError::MalformedIdentity("empty provider id"));
        }
        Ok(CompositeId::new(&self.provider_name, &self.provider_id))
    }

    /// Refresh `updated_at` and stamp the person data. Called before every persist.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.person.stamp(
            &self.provider_name,
            &self.provider_url,
            &self.provider_id,
            self.created_at.timestamp_millis(),
            self.updated_at.timestamp_millis(),
        );
    }

    /// Keep what only the stored record knows when upserting over it.
    pub fn inherit_from(&mut self, stored: &ExternalIdentity) {
        self.created_at = stored.created_at;
        if self.credential_secret.is_none() {
            self.credential_secret = stored.credential_secret.clone();
        }
    }
}
