//! Platform Crate - Technical Infrastructure
//!
//! Domain-free building blocks used by the auth crate:
//! - Password policy and Argon2id hashing
//! - HMAC signing, base64 and randomness helpers
//! - Cookie parsing and `Set-Cookie` construction

pub mod cookie;
pub mod crypto;
pub mod password;
