//! Relay Engine Library
//!
//! This library provides the query pipeline and the router agent service.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Downstream agent client
pub mod client;

/// Language detection
pub mod language;

/// Query pipeline
pub mod pipeline;

/// Router agent HTTP service
pub mod server;

/// CLI interface module
pub mod cli;

/// Command handlers
pub mod handlers;
