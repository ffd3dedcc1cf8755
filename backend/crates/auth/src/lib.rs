//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Reconciliation, password and profile use cases
//! - `provider/` - Pluggable identity providers and their registry
//! - `infra/` - PostgreSQL and in-memory stores
//! - `presentation/` - HTTP handlers, DTOs, routers, session cookie
//!
//! ## Features
//! - One local account per user, any number of linked external identities
//! - Providers: password, OAuth2 (Google, GitHub, Facebook), trusted
//!   upstream headers, and a development provider
//! - Account discovery by email for password sign in
//! - Admin role granted by providers that assert it
//!
//! ## Consistency Model
//! - Identity and account are written in one transaction
//! - Concurrent logins of the same identity are serialized per process
//! - An identity already linked elsewhere wins over the current session

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;
pub mod provider;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use infra::memory::MemoryAuthRepository;
pub use infra::postgres::PgAuthRepository;
pub use presentation::router::{api_router, auth_router};
pub use presentation::handlers::AuthAppState;
pub use provider::{AuthOutcome, Provider, ProviderRegistry, ProviderRequest};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod handlers {
    pub use crate::presentation::handlers::*;
}

pub mod store {
    pub use crate::domain::repository::AuthStore;
    pub use crate::infra::memory::MemoryAuthRepository;
    pub use crate::infra::postgres::PgAuthRepository;
}

pub mod router {
    pub use crate::presentation::router::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}

#[cfg(test)]
mod tests;
