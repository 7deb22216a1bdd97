//! `actionlint` subprocess engine.
//!
//! The document is piped on stdin and findings are read back as JSON
//! (`-format '{{json .}}'`). Both output streams are captured so nothing the
//! linter prints can reach the protocol channel.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use super::{EngineError, LintEngine, RawDiagnostic};
use crate::Config;

/// actionlint exits 0 for a clean run and 1 when it found problems.
const EXIT_CLEAN: i32 = 0;
const EXIT_PROBLEMS: i32 = 1;

#[derive(Debug, Clone)]
pub struct Actionlint {
    program: PathBuf,
    shellcheck: Option<String>,
    pyflakes: Option<String>,
    config_file: Option<PathBuf>,
}

impl Actionlint {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            shellcheck: None,
            pyflakes: None,
            config_file: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.actionlint.clone(),
            shellcheck: config.shellcheck.clone(),
            pyflakes: config.pyflakes.clone(),
            config_file: config.engine_config.clone(),
        }
    }

    pub fn with_shellcheck(mut self, path: impl Into<String>) -> Self {
        self.shellcheck = Some(path.into());
        self
    }

    pub fn with_pyflakes(mut self, path: impl Into<String>) -> Self {
        self.pyflakes = Some(path.into());
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn command(&self, filename: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-format")
            .arg("{{json .}}")
            .arg("-stdin-filename")
            .arg(filename)
            // An empty value turns the integration off.
            .arg(format!("-shellcheck={}", self.shellcheck.as_deref().unwrap_or("")))
            .arg(format!("-pyflakes={}", self.pyflakes.as_deref().unwrap_or("")));
        if let Some(config_file) = &self.config_file {
            cmd.arg("-config-file").arg(config_file);
        }
        cmd.arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn run(&self, filename: &str, content: &[u8]) -> std::io::Result<Output> {
        let mut child = self.command(filename).spawn()?;
        let stdin = child.stdin.take();

        // Feed stdin from a second thread so a chatty linter cannot fill the
        // stdout pipe while we are still writing.
        std::thread::scope(|scope| {
            if let Some(mut stdin) = stdin {
                scope.spawn(move || {
                    if let Err(e) = stdin.write_all(content) {
                        log::debug!("actionlint closed stdin early: {}", e);
                    }
                });
            }
            child.wait_with_output()
        })
    }
}

impl LintEngine for Actionlint {
    fn lint(&self, filename: &str, content: &[u8]) -> Result<Vec<RawDiagnostic>, EngineError> {
        log::debug!("running {} on {}", self.program.display(), filename);

        let output = self.run(filename, content).map_err(|source| EngineError::Spawn {
            program: self.program_name(),
            source,
        })?;

        match output.status.code() {
            Some(EXIT_CLEAN) | Some(EXIT_PROBLEMS) => {
                parse_findings(&output.stdout).map_err(|source| EngineError::Output {
                    program: self.program_name(),
                    source,
                })
            }
            _ => Err(EngineError::Failed {
                program: self.program_name(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

/// Parse actionlint's JSON output. A clean run prints `null` or `[]`.
fn parse_findings(stdout: &[u8]) -> Result<Vec<RawDiagnostic>, serde_json::Error> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let findings: Option<Vec<RawDiagnostic>> = serde_json::from_str(text)?;
    Ok(findings.unwrap_or_default())
}
