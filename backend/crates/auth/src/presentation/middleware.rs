//! Auth Middleware
//!
//! Middleware for requiring a logged-in account on protected routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::config::AuthConfig;
use crate::application::session::Session;
use crate::domain::value_object::account_id::AccountId;
use crate::presentation::session::CookieSession;

/// Logged-in account, stored in request extensions by [`require_account`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentAccount(pub AccountId);

/// Middleware that requires a valid session cookie
///
/// Rejects with 401 and `X-Auth-Required: true` when nobody is logged in.
pub async fn require_account(
    State(config): State<Arc<AuthConfig>>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = CookieSession::from_headers(req.headers(), &config);

    match session.current_account_id() {
        Ok(account_id) => {
            req.extensions_mut().insert(CurrentAccount(account_id));
            next.run(req).await
        }
        Err(e) => {
            let mut response = e.into_response();
            response
                .headers_mut()
                .insert("x-auth-required", HeaderValue::from_static("true"));
            response
        }
    }
}
