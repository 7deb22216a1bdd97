//! Linting Engine
//!
//! Boundary to the external workflow linter. Everything behind [`LintEngine`]
//! is opaque: a filename and raw bytes go in, positioned findings come out.

pub mod actionlint;
pub mod fake;

use serde::Deserialize;

pub use actionlint::Actionlint;
pub use fake::FakeEngine;

/// A finding as reported by the engine, before severity normalization
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawDiagnostic {
    pub message: String,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
    #[serde(default)]
    pub kind: String,
}

/// The engine could not produce a verdict for the document
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected output from {program}: {source}")]
    Output {
        program: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A workflow linter
///
/// Implementations must be safe to call from many worker threads at once and
/// must never write to the process's stdout.
pub trait LintEngine: Send + Sync {
    /// Lint `content`, reported under the virtual `filename`
    fn lint(&self, filename: &str, content: &[u8]) -> Result<Vec<RawDiagnostic>, EngineError>;
}
