//! Shared domain types for the filmnesia services.

pub mod error;
pub mod registration;
pub mod types;
