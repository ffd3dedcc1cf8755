//! Session Accessor
//!
//! The use cases only need "who is logged in" and "log this account in";
//! how that is carried (signed cookie, memory) is up to the implementation.

use crate::domain::value_object::account_id::AccountId;
use crate::error::{AuthError, AuthResult};

pub trait Session {
    /// Account logged in for this request, or [`AuthError::NotLoggedIn`]
    fn current_account_id(&self) -> AuthResult<AccountId>;

    fn set_current_account_id(&mut self, account_id: &AccountId) -> AuthResult<()>;

    fn logout(&mut self) -> AuthResult<()>;
}

/// Session held in memory, for tests and internal callers
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    account_id: Option<AccountId>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
        }
    }
}

impl Session for MemorySession {
    fn current_account_id(&self) -> AuthResult<AccountId> {
        self.account_id.ok_or(AuthError::NotLoggedIn)
    }

    fn set_current_account_id(&mut self, account_id: &AccountId) -> AuthResult<()> {
        self.account_id = Some(*account_id);
        Ok(())
    }

    fn logout(&mut self) -> AuthResult<()> {
        self.account_id = None;
        Ok(())
    }
}
