//! Auth Router

use axum::{Router, middleware, routing::get};

use crate::domain::repository::AuthStore;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::require_account;

/// Provider dispatch routes, mounted at `AuthConfig::base_url`
pub fn auth_router<R>(state: AuthAppState<R>) -> Router
where
    R: AuthStore,
{
    Router::new()
        .route(
            "/logout",
            get(handlers::logout::<R>).post(handlers::logout::<R>),
        )
        .route(
            "/{provider}",
            get(handlers::begin::<R>).post(handlers::begin::<R>),
        )
        .route(
            "/{provider}/callback",
            get(handlers::callback::<R>).post(handlers::callback::<R>),
        )
        .with_state(state)
}

/// JSON API for the password form and the profile list
pub fn api_router<R>(state: AuthAppState<R>) -> Router
where
    R: AuthStore,
{
    Router::new()
        .route("/profiles", get(handlers::list_profiles::<R>))
        .route_layer(middleware::from_fn_with_state(
            state.config.clone(),
            require_account,
        ))
        .route(
            "/password",
            get(handlers::password_status::<R>).post(handlers::password_submit::<R>),
        )
        .with_state(state)
}
