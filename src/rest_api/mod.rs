//! REST API module for external integrations
//!
//! Provides health, metrics, and a read-only view of monitored clusters.

mod dto;
mod handlers;
mod server;

pub use server::run_server;
