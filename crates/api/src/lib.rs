//! Filmnesia user service library.
//!
//! Exposes config, state, error handling, the registration workflow and the
//! router so integration tests and the binary entrypoint share them.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod registration;
pub mod response;
pub mod router;
pub mod routes;
pub mod shutdown;
pub mod state;
