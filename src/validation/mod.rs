//! Validation
//!
//! Single-document validation and the directory aggregator built on top of it.

pub mod aggregate;
pub mod engine;

pub use aggregate::{Aggregator, DirectoryOutcome, DirectorySummary, discover_workflows};
pub use engine::{
    Diagnostic, INLINE_FILENAME, RequestError, Severity, ValidationRequest, ValidationResult,
    Validator,
};
