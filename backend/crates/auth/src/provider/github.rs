//! GitHub

use serde_json::Value;

use crate::domain::entity::person::{Person, PersonImage};
use crate::error::AuthResult;
use crate::provider::oauth2::{
    MappedProfile, OAuth2Provider, OAuth2Settings, json_text, required_id,
};

pub const DEFAULT_SCOPE: &str = "read:user user:email";

pub fn settings(client_id: &str, client_secret: &str, scope: Option<&str>) -> OAuth2Settings {
    OAuth2Settings {
        name: "GitHub".to_string(),
        url: "https://github.com".to_string(),
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        scope: scope.unwrap_or(DEFAULT_SCOPE).to_string(),
        auth_url: "https://github.com/login/oauth/authorize".to_string(),
        token_url: "https://github.com/login/oauth/access_token".to_string(),
        profile_url: "https://api.github.com/user".to_string(),
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

    // `email` is null unless the user made it public
    let mut person = match json_text(value, "email") {
        Some(email) => Person::with_email(email),
        None => Person::default(),
    };
    let login = json_text(value, "login").unwrap_or_default();
    person.display_name = json_text(value, "name").unwrap_or_else(|| login.clone());
    person.name.formatted = json_text(value, "name").unwrap_or_default();
    person.url = json_text(value, "html_url").unwrap_or_default();
    person.image = json_text(value, "avatar_url").map(|url| PersonImage { url });

    Ok(MappedProfile {
        provider_id,
        person,
    })
}
