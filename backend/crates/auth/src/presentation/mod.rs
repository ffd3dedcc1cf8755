//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, session cookie and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod session;

pub use handlers::AuthAppState;
pub use middleware::{CurrentAccount, require_account};
pub use router::{api_router, auth_router};
pub use session::CookieSession;
