//! Command implementations for the CLI
//!
//! - logs: recent / range / query
//! - config: configuration display and validation

pub mod config;
pub mod logs;
