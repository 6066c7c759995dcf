//! openliga-proxy: rate-limited, retrying proxy in front of OpenLigaDB.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod clock;
pub mod config;
pub mod engine;
pub mod providers;
pub mod resilience;
pub mod server;
pub mod types;
