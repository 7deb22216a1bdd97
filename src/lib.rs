//! actionlint MCP server
//!
//! Exposes GitHub Actions workflow validation to AI assistants over the
//! Model Context Protocol.
//!
//! This library provides:
//! - Single-document and whole-directory workflow validation
//! - The `actionlint` engine adapter
//! - MCP protocol implementation
//! - Configuration management

pub mod config;
pub mod linter;
pub mod mcp;
pub mod validation;

// Re-exports for clean public API
pub use config::Config;
pub use linter::{Actionlint, LintEngine};
pub use validation::{
    Aggregator, DirectoryOutcome, DirectorySummary, ValidationRequest, ValidationResult, Validator,
};
