//! Library crate for scrambled-words, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Storage backends.
pub mod dao;
/// Wire payloads.
pub mod dto;
/// Service and HTTP errors.
pub mod error;
/// Router role.
pub mod proxy;
/// HTTP routes.
pub mod routes;
/// Game role services.
pub mod services;
/// Game role state.
pub mod state;
