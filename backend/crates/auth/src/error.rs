//! Auth Error Types
//!
//! Auth-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

use crate::domain::value_object::{account_id::AccountId, composite_id::CompositeId};

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// A provider produced an identity without name or ID (provider bug)
    #[error("Malformed identity: {0}")]
    MalformedIdentity(&'static str),

    /// An identity or session points at an account that does not exist
    #[error("Account {account_id} referenced by {composite_id} not found")]
    AccountSyncFault {
        composite_id: CompositeId,
        account_id: AccountId,
    },

    /// No stored identity for the presented credentials
    #[error("Profile not found")]
    ProfileNotFound,

    /// Presented password does not match the stored hash
    #[error("Password does not match")]
    PasswordMismatch,

    /// Password outside the configured length policy
    #[error("{0}")]
    PasswordLengthInvalid(#[from] platform::password::PasswordPolicyError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] crate::domain::value_object::email::EmailError),

    /// Sign-up for an account that already has a password credential
    #[error("Password already set")]
    PasswordAlreadySet,

    /// Sign-up with an email another account already owns
    #[error("Email already in use")]
    EmailInUse,

    /// The identity was linked to a different account by a concurrent writer
    #[error("Identity {composite_id} was linked concurrently")]
    LinkConflict { composite_id: CompositeId },

    /// Neither a new nor a current password was supplied
    #[error("No credentials supplied")]
    CredentialsMissing,

    #[error("Unknown provider: {0}")]
    ProviderNotFound(String),

    /// The upstream provider refused or the user cancelled
    #[error("Provider denied authentication: {0}")]
    ProviderDenied(String),

    #[error("Invalid or expired OAuth state")]
    InvalidOAuthState,

    /// Upstream provider I/O or protocol failure
    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Not logged in")]
    NotLoggedIn,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ProfileNotFound | AuthError::ProviderNotFound(_) => StatusCode::NOT_FOUND,
            AuthError::PasswordMismatch | AuthError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            AuthError::ProviderDenied(_) => StatusCode::FORBIDDEN,
            AuthError::PasswordAlreadySet
            | AuthError::EmailInUse
            | AuthError::LinkConflict { .. } => StatusCode::CONFLICT,
            AuthError::PasswordLengthInvalid(_)
            | AuthError::InvalidEmail(_)
            | AuthError::CredentialsMissing
            | AuthError::InvalidOAuthState => StatusCode::BAD_REQUEST,
            AuthError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AuthError::MalformedIdentity(_)
            | AuthError::AccountSyncFault { .. }
            | AuthError::Database(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::ProfileNotFound | AuthError::ProviderNotFound(_) => ErrorKind::NotFound,
            AuthError::PasswordMismatch | AuthError::NotLoggedIn => ErrorKind::Unauthorized,
            AuthError::ProviderDenied(_) => ErrorKind::Forbidden,
            AuthError::PasswordAlreadySet
            | AuthError::EmailInUse
            | AuthError::LinkConflict { .. } => ErrorKind::Conflict,
            AuthError::PasswordLengthInvalid(_)
            | AuthError::InvalidEmail(_)
            | AuthError::CredentialsMissing
            | AuthError::InvalidOAuthState => ErrorKind::BadRequest,
            AuthError::Upstream(_) => ErrorKind::BadGateway,
            AuthError::MalformedIdentity(_)
            | AuthError::AccountSyncFault { .. }
            | AuthError::Database(_)
            | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Server-side faults never expose their message to clients.
    pub fn to_app_error(&self) -> AppError {
        match self.kind() {
            ErrorKind::InternalServerError => {
                AppError::new(ErrorKind::InternalServerError, "Internal server error")
            }
            kind => AppError::new(kind, self.to_string()),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AuthError::MalformedIdentity(reason) => {
                tracing::error!(reason, "Provider returned a malformed identity");
            }
            AuthError::AccountSyncFault {
                composite_id,
                account_id,
            } => {
                tracing::error!(
                    composite_id = %composite_id,
                    account_id = %account_id,
                    "Account referenced by identity or session was not found"
                );
            }
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::Upstream(msg) => {
                tracing::warn!(message = %msg, "Upstream provider error");
            }
            AuthError::PasswordMismatch => {
                tracing::warn!("Password mismatch");
            }
            AuthError::InvalidOAuthState => {
                tracing::warn!("OAuth state rejected");
            }
            AuthError::LinkConflict { composite_id } => {
                tracing::warn!(composite_id = %composite_id, "Concurrent identity link");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Upstream(err.to_string())
    }
}
