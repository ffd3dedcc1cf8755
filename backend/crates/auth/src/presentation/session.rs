//! Cookie Session
//!
//! [`Session`] over an HMAC-SHA256 signed cookie:
//! `{account_id}:{expires_unix}.{base64url(tag)}`. Forged, malformed or
//! expired cookies read as "not logged in".

use axum::http::{HeaderMap, HeaderValue};
use chrono::Utc;

use platform::cookie::{CookieAttributes, extract_cookie};
use platform::crypto;

use crate::application::config::AuthConfig;
use crate::application::session::Session;
use crate::domain::value_object::account_id::AccountId;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Set(String),
    Clear,
}

#[derive(Debug, Clone)]
pub struct CookieSession {
    secret: [u8; 32],
    cookie: CookieAttributes,
    current: Option<AccountId>,
    pending: Option<Pending>,
}

impl CookieSession {
    /// Read the session cookie of an inbound request.
    pub fn from_headers(headers: &HeaderMap, config: &AuthConfig) -> Self {
        let current = extract_cookie(headers, &config.session_cookie_name)
            .and_then(|value| decode(&config.session_secret, &value));

        Self {
            secret: config.session_secret,
            cookie: config.session_cookie(),
            current,
            pending: None,
        }
    }

    /// `Set-Cookie` value to attach to the response, if the session changed.
    pub fn set_cookie_header(&self) -> Option<HeaderValue> {
        match self.pending.as_ref()? {
            Pending::Set(value) => self.cookie.set_cookie_header(value),
            Pending::Clear => self.cookie.delete_cookie_header(),
        }
    }

    fn encode(&self, account_id: &AccountId) -> String {
        let ttl = self.cookie.max_age.map(|d| d.as_secs()).unwrap_or(0) as i64;
        let expires = Utc::now().timestamp() + ttl;
        crypto::sign(&self.secret, &format!("{account_id}:{expires}"))
    }
}

fn decode(secret: &[u8], value: &str) -> Option<AccountId> {
    let payload = crypto::verify_signed(secret, value)?;
    let (account_id, expires) = payload.split_once(':')?;
    let expires: i64 = expires.parse().ok()?;
    if expires < Utc::now().timestamp() {
        return None;
    }
    account_id.parse().ok()
}

impl Session for CookieSession {
    fn current_account_id(&self) -> AuthResult<AccountId> {
        self.current.ok_or(AuthError::NotLoggedIn)
    }

    fn set_current_account_id(&mut self, account_id: &AccountId) -> AuthResult<()> {
        let value = self.encode(account_id);
        self.current = Some(*account_id);
        self.pending = Some(Pending::Set(value));
        Ok(())
    }

    fn logout(&mut self) -> AuthResult<()> {
        self.current = None;
        self.pending = Some(Pending::Clear);
        Ok(())
    }
}
