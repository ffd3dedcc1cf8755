//! Domain Layer
//!
//! Contains entities, value objects, and repository traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{account::Account, identity::ExternalIdentity, person::Person};
pub use repository::{AccountRepository, EmailIndex, IdentityRepository, LinkRepository};
