//! UI primitives for the Darts CLI.
//!
//! This module provides:
//! - **Context**: Environment detection (TTY, color, unicode)
//! - **Mode**: Output mode resolution (json, plain, pretty)
//! - **Theme**: Badge tokens and their colors
//! - **Render**: Tables, badges, key-value lines, hints
//! - **Progress**: Spinner for long-running operations

mod context;
mod mode;
pub mod progress;
pub mod render;
pub mod theme;

// Re-export core types at module level
pub use context::UiContext;
pub use theme::Badge;

// Re-export commonly used render functions
pub use render::{badge, hint, kv, print, print_error, table, Column};

pub use progress::Spinner;
