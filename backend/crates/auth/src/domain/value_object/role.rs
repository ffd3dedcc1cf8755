//! Role Value Object
//!
//! Roles are open-ended strings; providers grant `admin`, deployments may
//! store others.

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub const ADMIN: &'static str = "admin";

    /// Role codes are trimmed and lowercased.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    #[inline]
    pub fn admin() -> Self {
        Self(Self::ADMIN.to_string())
    }

    #[inline]
    pub fn code(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.0 == Self::ADMIN
    }
}
