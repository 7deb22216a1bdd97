//! In-memory engine for tests and benchmarks.
//!
//! Judges documents with a handful of fixed rules instead of a real linter:
//! - blank content is one `syntax-check` finding ("workflow is empty")
//! - every tab-indented line is a `syntax-check` finding
//! - a line `# finding <kind>: <message>` yields a finding of that kind on that line
//! - content containing `# engine-failure` makes the engine itself fail

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{EngineError, LintEngine, RawDiagnostic};

const FINDING_DIRECTIVE: &str = "# finding ";
const FAILURE_DIRECTIVE: &str = "# engine-failure";

#[derive(Debug, Default)]
pub struct FakeEngine {
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents linted so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LintEngine for FakeEngine {
    fn lint(&self, _filename: &str, content: &[u8]) -> Result<Vec<RawDiagnostic>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = String::from_utf8_lossy(content);

        if text.contains(FAILURE_DIRECTIVE) {
            return Err(EngineError::Failed {
                program: "fake".to_string(),
                status: "exit status: 3".to_string(),
                stderr: "could not parse config".to_string(),
            });
        }

        if text.trim().is_empty() {
            return Ok(vec![RawDiagnostic {
                message: "workflow is empty".to_string(),
                line: 0,
                column: 0,
                kind: "syntax-check".to_string(),
            }]);
        }

        let mut findings = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line_num = idx + 1;
            if line.starts_with('\t') {
                findings.push(RawDiagnostic {
                    message: "tabs are not allowed for indentation".to_string(),
                    line: line_num,
                    column: 1,
                    kind: "syntax-check".to_string(),
                });
            }
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix(FINDING_DIRECTIVE) {
                let (kind, message) = rest.split_once(':').unwrap_or((rest, ""));
                findings.push(RawDiagnostic {
                    message: message.trim().to_string(),
                    line: line_num,
                    column: line.len() - trimmed.len() + 1,
                    kind: kind.trim().to_string(),
                });
            }
        }

        Ok(findings)
    }
}
