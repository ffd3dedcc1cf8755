//! Google (OpenID Connect userinfo)

use serde_json::Value;

use crate::domain::entity::person::{Person, PersonImage};
use crate::error::AuthResult;
use crate::provider::oauth2::{
    MappedProfile, OAuth2Provider, OAuth2Settings, json_text, required_id,
};

pub const DEFAULT_SCOPE: &str = "openid email profile";

pub fn settings(client_id: &str, client_secret: &str, scope: Option<&str>) -> OAuth2Settings {
    OAuth2Settings {
        name: "Google".to_string(),
        url: "https://accounts.google.com".to_string(),
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        scope: scope.unwrap_or(DEFAULT_SCOPE).to_string(),
        auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
        token_url: "https://oauth2.googleapis.com/token".to_string(),
        profile_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
    }
}

pub fn provider(
    client_id: &str,
    client_secret: &str,
    scope: Option<&str>,
    state_key: &[u8],
) -> OAuth2Provider {
    OAuth2Provider::new(settings(client_id, client_secret, scope), map_profile, state_key)
}

pub fn map_profile(value: &Value) -> AuthResult<MappedProfile> {
    let provider_id = required_id(value, "sub")?;

    let mut person = match json_text(value, "email") {
        Some(email) => Person::with_email(email),
        None => Person::default(),
    };
    person.display_name = json_text(value, "name").unwrap_or_default();
    person.name.formatted = person.display_name.clone();
    person.name.given_name = json_text(value, "given_name").unwrap_or_default();
    person.name.family_name = json_text(value, "family_name").unwrap_or_default();
    person.image = json_text(value, "picture").map(|url| PersonImage { url });
    person.locale = json_text(value, "locale").unwrap_or_default();

    Ok(MappedProfile {
        provider_id,
        person,
    })
}
