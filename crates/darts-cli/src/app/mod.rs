//! Application-level utilities for the Darts CLI.
//!
//! This module provides:
//! - Path resolution for the config file, database directory and sync remote
//! - A lazily-loaded application context shared by command handlers

mod context;
mod resolver;

// Re-export public API
pub use context::AppContext;
pub use resolver::{missing_config_message, missing_remote_message, resolve_config_path};
