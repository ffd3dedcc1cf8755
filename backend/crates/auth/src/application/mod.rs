//! Application Layer
//!
//! Use cases and application services.

pub mod config;
pub mod password;
pub mod profiles;
pub mod reconcile;
pub mod session;

// Re-exports
pub use config::AuthConfig;
pub use password::{PasswordInput, PasswordUseCase};
pub use profiles::ListProfilesUseCase;
pub use reconcile::{IdentityLocks, ReconcileOutput, ReconcileUseCase};
pub use session::{MemorySession, Session};
