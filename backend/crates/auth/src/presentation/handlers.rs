//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::application::config::AuthConfig;
use crate::application::{
    IdentityLocks, ListProfilesUseCase, PasswordInput, PasswordUseCase, ReconcileUseCase, Session,
};
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    PasswordRequest, PasswordResponse, PasswordStatusResponse, ProfilesResponse,
};
use crate::presentation::middleware::CurrentAccount;
use crate::presentation::session::CookieSession;
use crate::provider::{AuthOutcome, ProviderRegistry, ProviderRequest};

/// Shared state for auth handlers
pub struct AuthAppState<R>
where
    R: AuthStore,
{
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub registry: Arc<ProviderRegistry>,
    pub locks: Arc<IdentityLocks>,
}

impl<R> AuthAppState<R>
where
    R: AuthStore,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, registry: ProviderRegistry) -> Self {
        Self {
            repo,
            config,
            registry: Arc::new(registry),
            locks: Arc::new(IdentityLocks::new()),
        }
    }

    fn reconcile(&self) -> ReconcileUseCase<R> {
        ReconcileUseCase::new(self.repo.clone(), self.locks.clone())
    }
}

impl<R> Clone for AuthAppState<R>
where
    R: AuthStore,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            config: self.config.clone(),
            registry: self.registry.clone(),
            locks: self.locks.clone(),
        }
    }
}

// ============================================================================
// Provider dispatch
// ============================================================================

/// GET|POST {base}/{provider}
pub async fn begin<R>(
    State(state): State<AuthAppState<R>>,
    Path(provider): Path<String>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response
where
    R: AuthStore,
{
    dispatch(state, provider, false, method, headers, query, body).await
}

/// GET|POST {base}/{provider}/callback
pub async fn callback<R>(
    State(state): State<AuthAppState<R>>,
    Path(provider): Path<String>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response
where
    R: AuthStore,
{
    dispatch(state, provider, true, method, headers, query, body).await
}

async fn dispatch<R>(
    state: AuthAppState<R>,
    provider_key: String,
    is_callback: bool,
    method: Method,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
) -> Response
where
    R: AuthStore,
{
    let provider_key = provider_key.to_lowercase();
    let Some(provider) = state.registry.get(&provider_key) else {
        return AuthError::ProviderNotFound(provider_key).into_response();
    };

    let mut session = CookieSession::from_headers(&headers, &state.config);
    let request = ProviderRequest {
        params: collect_params(&headers, query.as_deref(), &body),
        callback_url: format!(
            "{}{}",
            request_origin(&state.config, &headers),
            state.config.callback_path(&provider_key)
        ),
        session_account_id: session.current_account_id().ok(),
        method,
        is_callback,
        provider_key,
        headers,
    };

    let identity = match provider.authenticate(&request).await {
        Ok(AuthOutcome::Redirect(url)) => return found(&url, None),
        Ok(AuthOutcome::RedirectWithCookie {
            location,
            set_cookie,
        }) => {
            let mut response = found(&location, None);
            response.headers_mut().append(header::SET_COOKIE, set_cookie);
            return response;
        }
        Ok(AuthOutcome::Identity(identity)) => identity,
        Err(e) => {
            e.log();
            return found(&state.config.login_url, None);
        }
    };

    // A provider bug, not a login failure: never reaches storage.
    if let Err(e) = identity.composite_id() {
        return e.into_response();
    }

    match state.reconcile().execute(&mut session, identity).await {
        Ok(_) => found(&state.config.success_url, Some(&session)),
        Err(e) => {
            e.log();
            found(&state.config.login_url, None)
        }
    }
}

/// GET|POST {base}/logout
pub async fn logout<R>(State(state): State<AuthAppState<R>>, headers: HeaderMap) -> Response
where
    R: AuthStore,
{
    let mut session = CookieSession::from_headers(&headers, &state.config);
    if let Err(e) = session.logout() {
        return e.into_response();
    }
    found(&state.config.success_url, Some(&session))
}

// ============================================================================
// JSON API
// ============================================================================

/// POST /api/auth/password
pub async fn password_submit<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
    Json(req): Json<PasswordRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
{
    let mut session = CookieSession::from_headers(&headers, &state.config);
    let use_case = PasswordUseCase::new(state.repo.clone(), state.config.clone());

    let input = PasswordInput {
        new: req.password.new,
        current: req.password.current,
        email: req.password.email,
        person: req.person,
    };

    let identity = use_case
        .execute(session.current_account_id().ok(), input)
        .await?
        .ok_or(AuthError::CredentialsMissing)?;

    let output = state.reconcile().execute(&mut session, identity).await?;

    let mut response = Json(PasswordResponse {
        person: output.identity.person,
    })
    .into_response();
    attach_session_cookie(&mut response, &session);
    Ok(response)
}

/// GET /api/auth/password
pub async fn password_status<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
) -> AuthResult<Json<PasswordStatusResponse>>
where
    R: AuthStore,
{
    let session = CookieSession::from_headers(&headers, &state.config);
    let account_id = session.current_account_id()?;

    let use_case = PasswordUseCase::new(state.repo.clone(), state.config.clone());
    let is_set = use_case.is_set(&account_id).await?;

    Ok(Json(PasswordStatusResponse { is_set }))
}

/// GET /api/auth/profiles
pub async fn list_profiles<R>(
    State(state): State<AuthAppState<R>>,
    Extension(CurrentAccount(account_id)): Extension<CurrentAccount>,
) -> AuthResult<Json<ProfilesResponse>>
where
    R: AuthStore,
{
    let use_case = ListProfilesUseCase::new(state.repo.clone());
    let profiles = use_case.execute(&account_id).await?;
    Ok(Json(ProfilesResponse { profiles }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Form body values first, then query values
fn collect_params(headers: &HeaderMap, query: Option<&str>, body: &[u8]) -> Vec<(String, String)> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let mut params = Vec::new();
    if is_form {
        params.extend(url::form_urlencoded::parse(body).into_owned());
    }
    if let Some(query) = query {
        params.extend(url::form_urlencoded::parse(query.as_bytes()).into_owned());
    }
    params
}

/// Scheme and host used for absolute callback URLs
fn request_origin(config: &AuthConfig, headers: &HeaderMap) -> String {
    if let Some(origin) = &config.public_origin {
        return origin.trim_end_matches('/').to_string();
    }
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let host = header_str("host").unwrap_or("localhost");
    let scheme = header_str("x-forwarded-proto").unwrap_or("http");
    format!("{scheme}://{host}")
}

/// 302 to `location`, carrying the session cookie if it changed
fn found(location: &str, session: Option<&CookieSession>) -> Response {
    let Ok(location) = HeaderValue::from_str(location) else {
        return AuthError::Internal(format!("invalid redirect location: {location}")).into_response();
    };
    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(header::LOCATION, location);
    if let Some(session) = session {
        attach_session_cookie(&mut response, session);
    }
    response
}

fn attach_session_cookie(response: &mut Response, session: &CookieSession) {
    if let Some(cookie) = session.set_cookie_header() {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
}
