//! CompositeId Value Object
//!
//! The sole lookup key of an external identity:
//! `lowercase(provider_name) + "|" + provider_id`.
//!
//! ```rust
//! use auth::domain::value_object::composite_id::CompositeId;
//!
//! let id = CompositeId::new("Google", "123");
//! assert_eq!(id.as_str(), "google|123");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeId(String);

impl CompositeId {
    /// Only the provider name is case-folded; the provider ID is opaque.
    pub fn new(provider_name: &str, provider_id: &str) -> Self {
        Self(format!(
            "{}{}{}",
            provider_name.to_lowercase(),
            SEPARATOR,
            provider_id
        ))
    }

    /// Create from database value (assumed already well-formed)
    pub fn from_db(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompositeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
