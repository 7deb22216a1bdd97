//! Validation Engine
//!
//! Single-document validation: resolve the input, hand it to the linting
//! engine, and normalize what comes back.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::linter::{EngineError, LintEngine, RawDiagnostic};

/// Identifier used for documents supplied as inline content
pub const INLINE_FILENAME: &str = "inline.yml";

/// Category attached to the synthetic diagnostic of a document that could not be linted
pub const LINT_FAILURE_KIND: &str = "lint-failure";

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Engine category -> severity. Anything not listed falls back to [`DEFAULT_SEVERITY`].
const SEVERITY_BY_KIND: &[(&str, Severity)] = &[
    ("syntax-check", Severity::Error),
    ("type-check", Severity::Error),
    ("shellcheck", Severity::Warning),
    ("pyflakes", Severity::Warning),
];

pub const DEFAULT_SEVERITY: Severity = Severity::Info;

impl Severity {
    /// Classify an engine category. Total: unknown categories are `Info`.
    pub fn for_kind(kind: &str) -> Self {
        SEVERITY_BY_KIND
            .iter()
            .find(|(known, _)| *known == kind)
            .map(|(_, severity)| *severity)
            .unwrap_or(DEFAULT_SEVERITY)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// A diagnostic message for a validation issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub kind: String,
    pub severity: Severity,
}

impl From<RawDiagnostic> for Diagnostic {
    fn from(raw: RawDiagnostic) -> Self {
        let severity = Severity::for_kind(&raw.kind);
        Self {
            message: raw.message,
            line: raw.line,
            column: raw.column,
            kind: raw.kind,
            severity,
        }
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(rename = "errors")]
    pub diagnostics: Vec<Diagnostic>,
    pub valid: bool,
    pub file_path: String,
}

impl ValidationResult {
    /// Build a result from engine findings, keeping their order
    pub fn from_findings(file_path: impl Into<String>, findings: Vec<RawDiagnostic>) -> Self {
        let diagnostics: Vec<Diagnostic> = findings.into_iter().map(Diagnostic::from).collect();
        Self {
            valid: diagnostics.is_empty(),
            diagnostics,
            file_path: file_path.into(),
        }
    }

    /// Stand-in result for a document whose validation failed outright
    pub fn lint_failure(file_path: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            diagnostics: vec![Diagnostic {
                message: format!("Failed to lint: {}", cause),
                line: 0,
                column: 0,
                kind: LINT_FAILURE_KIND.to_string(),
                severity: Severity::Error,
            }],
            valid: false,
            file_path: file_path.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// What to validate: a file on disk or inline text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRequest {
    ByPath(PathBuf),
    ByContent(String),
}

impl ValidationRequest {
    /// Resolve the two optional wire fields. The path wins when both are set;
    /// empty strings count as missing.
    pub fn from_fields(
        file_path: Option<String>,
        content: Option<String>,
    ) -> Result<Self, RequestError> {
        let file_path = file_path.filter(|p| !p.is_empty());
        let content = content.filter(|c| !c.is_empty());
        match (file_path, content) {
            (Some(path), _) => Ok(Self::ByPath(PathBuf::from(path))),
            (None, Some(content)) => Ok(Self::ByContent(content)),
            (None, None) => Err(RequestError::MissingInput),
        }
    }
}

/// Why a validation call produced no result
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("either file_path or content must be provided")]
    MissingInput,
    #[error("failed to read file: {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("linting failed: {0}")]
    EngineFailure(#[source] EngineError),
    #[error("failed to marshal result: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Validates single documents against a linting engine
#[derive(Clone)]
pub struct Validator {
    engine: Arc<dyn LintEngine>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Validator {
    pub fn new(engine: Arc<dyn LintEngine>) -> Self {
        Self { engine }
    }

    /// Validate one document
    ///
    /// File content is read completely (and the handle closed) before the
    /// engine runs. Content is forwarded as-is; the engine decides what is
    /// malformed.
    pub fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult, RequestError> {
        let (identifier, content): (String, Cow<'_, [u8]>) = match request {
            ValidationRequest::ByPath(path) => {
                let bytes = std::fs::read(path).map_err(|source| RequestError::FileUnreadable {
                    path: path.clone(),
                    source,
                })?;
                (path.display().to_string(), Cow::Owned(bytes))
            }
            ValidationRequest::ByContent(text) => {
                (INLINE_FILENAME.to_string(), Cow::Borrowed(text.as_bytes()))
            }
        };

        let findings = self
            .engine
            .lint(&identifier, &content)
            .map_err(RequestError::EngineFailure)?;

        log::debug!("{}: {} finding(s)", identifier, findings.len());
        Ok(ValidationResult::from_findings(identifier, findings))
    }
}
