//! Value Object Module

pub mod account_id;
pub mod composite_id;
pub mod email;
pub mod role;
