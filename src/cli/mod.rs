//! CLI command handlers and output formatting.

mod commands;
mod output;

pub use commands::*;
