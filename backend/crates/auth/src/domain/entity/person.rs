//! Person
//!
//! Profile attributes supplied by a provider. Owned by a single
//! [`ExternalIdentity`](super::identity::ExternalIdentity), never shared
//! between identities. Serialized in camelCase for API consumers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    /// Provider-assigned ID (stamped before persist)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// `"{provider}#person"` (stamped before persist)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<PersonProvider>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(skip_serializing_if = "PersonName::is_empty")]
    pub name: PersonName,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<PersonEmail>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PersonImage>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub locale: String,
    /// Unix milliseconds
    pub created: i64,
    /// Unix milliseconds
    pub updated: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonProvider {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonName {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub formatted: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub family_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub given_name: String,
}

impl PersonName {
    pub fn is_empty(&self) -> bool {
        self.formatted.is_empty() && self.family_name.is_empty() && self.given_name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonEmail {
    pub primary: bool,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonImage {
    pub url: String,
}

impl Person {
    /// Person with only a primary email set.
    pub fn with_email(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            emails: vec![PersonEmail {
                primary: true,
                kind: "home".to_string(),
                value: email.clone(),
            }],
            email,
            ..Self::default()
        }
    }

    /// Primary email, falling back to the first listed address.
    pub fn primary_email(&self) -> Option<&str> {
        if !self.email.is_empty() {
            return Some(&self.email);
        }
        self.emails
            .iter()
            .find(|e| e.primary)
            .or_else(|| self.emails.first())
            .map(|e| e.value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Stamp provider metadata and timestamps ahead of a persist.
    pub fn stamp(
        &mut self,
        provider_name: &str,
        provider_url: &str,
        provider_id: &str,
        created_ms: i64,
        updated_ms: i64,
    ) {
        self.provider = Some(PersonProvider {
            name: provider_name.to_string(),
            url: provider_url.to_string(),
        });
        self.kind = format!("{}#person", provider_name.to_lowercase());
        self.id = provider_id.to_string();
        self.created = created_ms;
        self.updated = updated_ms;
    }
}
