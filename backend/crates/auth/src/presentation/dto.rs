//! API DTOs (Data Transfer Objects)

use serde::{Deserialize, Serialize};

use crate::domain::entity::person::Person;

// ============================================================================
// Password
// ============================================================================

/// Password fields of a password request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordFields {
    pub new: Option<String>,
    pub current: Option<String>,
    pub email: String,
}

/// POST /password request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest {
    pub password: PasswordFields,
    #[serde(default)]
    pub person: Person,
}

/// POST /password response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResponse {
    /// Stored person data of the password identity
    pub person: Person,
}

/// GET /password response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStatusResponse {
    pub is_set: bool,
}

// ============================================================================
// Profiles
// ============================================================================

/// GET /profiles response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilesResponse {
    /// One entry per linked identity, in link order
    pub profiles: Vec<Person>,
}
