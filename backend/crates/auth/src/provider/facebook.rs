//! Facebook (Graph API)

use serde_json::Value;

use crate::domain::entity::person::{Person, PersonImage};
use crate::error::AuthResult;
use crate::provider::oauth2::{
    MappedProfile, OAuth2Provider, OAuth2Settings, json_text, required_id,
};

pub const DEFAULT_SCOPE: &str = "email public_profile";

const PROFILE_URL: &str =
    "https://graph.facebook.com/v19.0/me?fields=id,name,first_name,last_name,email,picture,locale";

pub fn settings(client_id: &str, client_secret: &str, scope: Option<&str>) -> OAuth2Settings {
    OAuth2Settings {
        name: "Facebook".to_string(),
        url: "https://facebook.com".to_string(),
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        scope: scope.unwrap_or(DEFAULT_SCOPE).to_string(),
        auth_url: "https://www.facebook.com/v19.0/dialog/oauth".to_string(),
        token_url: "https://graph.facebook.com/v19.0/oauth/access_token".to_string(),
        profile_url: PROFILE_URL.to_string(),
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
    let provider_id = required_id(value, "id")?;

    let mut person = match json_text(value, "email") {
        Some(email) => Person::with_email(email),
        None => Person::default(),
    };
    person.display_name = json_text(value, "name").unwrap_or_default();
    person.name.formatted = person.display_name.clone();
    person.name.given_name = json_text(value, "first_name").unwrap_or_default();
    person.name.family_name = json_text(value, "last_name").unwrap_or_default();
    person.locale = json_text(value, "locale").unwrap_or_default();
    person.url = format!("https://facebook.com/{provider_id}");
    person.image = value
        .pointer("/picture/data")
        .and_then(|data| json_text(data, "url"))
        .map(|url| PersonImage { url });

    Ok(MappedProfile {
        provider_id,
        person,
    })
}
