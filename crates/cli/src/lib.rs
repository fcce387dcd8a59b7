//! Granary command-line support
//!
//! This crate provides:
//! - User configuration loading
//! - Console credential prompts and conflict resolution
//! - Grain diff rendering
//! - Shared helpers for the `granary` commands

pub mod config;
pub mod diff_utils;
pub mod prompt;
pub mod util;

// Re-exports
pub use config::Config;
pub use prompt::{ConsolePrompt, ConsoleResolver};
