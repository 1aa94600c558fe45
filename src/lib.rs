//! Library crate for heart-quiz-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Player persistence.
pub mod dao;
mod dto;
mod error;
/// HTTP and SSE routes.
pub mod routes;
/// Round coordination and application services.
pub mod services;
/// Shared application state.
pub mod state;
