//! Shared Kernel
//!
//! Vocabulary shared by every crate in the workspace:
//! - Typed identifiers ([`id::Id`], [`id::AccountId`])
//! - The unified [`error::app_error::AppError`] and its [`error::kind::ErrorKind`]
//!
//! Only things whose meaning is identical in every bounded context belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
