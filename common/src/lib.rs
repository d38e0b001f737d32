//! Shared pieces of the sales analytics API: entity and report models, the
//! backend trait with its report catalog, configuration, and the HTTP server.

pub mod analytics;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
