//! Configuration management for the actionlint MCP server.
//!
//! Handles:
//! - Command-line argument parsing
//! - Environment overrides for the external checkers
//! - The optional user config file (`<config_dir>/actionlint-mcp/config.toml`)
//!
//! Precedence is CLI flag > environment variable > user config file > default.
//! Everything is read once at startup.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Conventional location of the actionlint configuration inside a repository
pub const DEFAULT_ENGINE_CONFIG: &str = ".github/actionlint.yaml";

/// Directory searched when `check_all_workflows` gets no directory argument
pub const DEFAULT_WORKFLOW_DIR: &str = ".github/workflows";

static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{}\n  Commit: {}\n  Built:  {}\n  Built by: {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("ACTIONLINT_MCP_COMMIT").unwrap_or("none"),
        option_env!("ACTIONLINT_MCP_BUILD_DATE").unwrap_or("unknown"),
        option_env!("ACTIONLINT_MCP_BUILT_BY").unwrap_or("unknown"),
    )
});

/// Command-line arguments for the actionlint MCP server
#[derive(Debug, Default, Parser)]
#[command(name = "actionlint-mcp")]
#[command(about = "MCP server exposing actionlint workflow validation")]
#[command(version, long_version = LONG_VERSION.as_str())]
pub struct Args {
    /// Path to the actionlint executable
    #[arg(long, env = "ACTIONLINT_COMMAND", help = "actionlint executable")]
    pub actionlint: Option<PathBuf>,

    /// Path to shellcheck; unset disables shell script checks
    #[arg(long, env = "SHELLCHECK_COMMAND", help = "shellcheck executable")]
    pub shellcheck: Option<String>,

    /// Path to pyflakes; unset disables Python script checks
    #[arg(long, env = "PYFLAKES_COMMAND", help = "pyflakes executable")]
    pub pyflakes: Option<String>,

    /// actionlint configuration file
    #[arg(long, help = "actionlint config file (defaults to .github/actionlint.yaml if present)")]
    pub config_file: Option<PathBuf>,

    /// Upper bound on documents validated in parallel by one directory check
    #[arg(long, help = "Maximum number of workflows linted concurrently")]
    pub max_concurrency: Option<usize>,

    /// Deadline applied to each tool call
    #[arg(long, help = "Abandon a tool call after this many seconds")]
    pub call_timeout_secs: Option<u64>,

    /// Log level for the server
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Settings read from the user config file
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub actionlint: Option<PathBuf>,
    pub shellcheck: Option<String>,
    pub pyflakes: Option<String>,
    pub config_file: Option<PathBuf>,
    pub max_concurrency: Option<usize>,
    pub call_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load the user config file, returning defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Default location under the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("actionlint-mcp").join("config.toml"))
    }
}

/// Combined configuration from all sources
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// actionlint executable
    pub actionlint: PathBuf,
    /// shellcheck executable, `None` disables shellcheck integration
    pub shellcheck: Option<String>,
    /// pyflakes executable, `None` disables pyflakes integration
    pub pyflakes: Option<String>,
    /// actionlint configuration file handed to every lint run
    pub engine_config: Option<PathBuf>,
    /// Worker pool size for directory checks
    pub max_concurrency: NonZeroUsize,
    /// Per-call deadline
    pub call_timeout: Option<Duration>,
    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actionlint: PathBuf::from("actionlint"),
            shellcheck: None,
            pyflakes: None,
            engine_config: None,
            max_concurrency: default_concurrency(),
            call_timeout: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments, environment and the user file
    pub fn from_args_and_env() -> Result<Self> {
        let file = match FileConfig::default_path() {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Self::from_sources(Args::parse(), file)
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        Self::from_sources(args, FileConfig::default())
    }

    /// Merge CLI arguments over the user config file
    pub fn from_sources(args: Args, file: FileConfig) -> Result<Self> {
        let defaults = Self::default();

        let max_concurrency = match args.max_concurrency.or(file.max_concurrency) {
            Some(n) => NonZeroUsize::new(n)
                .ok_or_else(|| anyhow::anyhow!("max-concurrency must be at least 1"))?,
            None => defaults.max_concurrency,
        };

        let engine_config = args
            .config_file
            .or(file.config_file)
            .or_else(|| discover_engine_config(Path::new(DEFAULT_ENGINE_CONFIG)));

        Ok(Config {
            actionlint: args
                .actionlint
                .or(file.actionlint)
                .unwrap_or(defaults.actionlint),
            shellcheck: non_empty(args.shellcheck.or(file.shellcheck)),
            pyflakes: non_empty(args.pyflakes.or(file.pyflakes)),
            engine_config,
            max_concurrency,
            call_timeout: args
                .call_timeout_secs
                .or(file.call_timeout_secs)
                .map(Duration::from_secs),
            log_level: if args.log_level.is_empty() {
                defaults.log_level
            } else {
                args.log_level
            },
        })
    }
}

fn discover_engine_config(candidate: &Path) -> Option<PathBuf> {
    candidate.is_file().then(|| candidate.to_path_buf())
}

// An empty SHELLCHECK_COMMAND means "disabled", same as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_concurrency() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_file() {
        let args = Args {
            shellcheck: Some("/usr/bin/shellcheck".to_string()),
            log_level: "debug".to_string(),
            ..Default::default()
        };
        let file = FileConfig {
            shellcheck: Some("/opt/shellcheck".to_string()),
            pyflakes: Some("/opt/pyflakes".to_string()),
            max_concurrency: Some(3),
            ..Default::default()
        };

        let config = Config::from_sources(args, file).expect("config");
        assert_eq!(config.shellcheck.as_deref(), Some("/usr/bin/shellcheck"));
        assert_eq!(config.pyflakes.as_deref(), Some("/opt/pyflakes"));
        assert_eq!(config.max_concurrency.get(), 3);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn empty_checker_paths_disable_checkers() {
        let args = Args {
            shellcheck: Some(String::new()),
            pyflakes: Some("  ".to_string()),
            ..Default::default()
        };
        let config = Config::from_args(args).expect("config");
        assert!(config.shellcheck.is_none());
        assert!(config.pyflakes.is_none());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let args = Args {
            max_concurrency: Some(0),
            ..Default::default()
        };
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn timeout_comes_from_file() {
        let file = FileConfig {
            call_timeout_secs: Some(30),
            ..Default::default()
        };
        let config = Config::from_sources(Args::default(), file).expect("config");
        assert_eq!(config.call_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.actionlint, PathBuf::from("actionlint"));
    }

    #[test]
    fn file_config_parses_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "actionlint = \"/opt/actionlint\"\nshellcheck = \"shellcheck\"\nmax_concurrency = 2\n",
        )
        .expect("write config");

        let file = FileConfig::load(&path).expect("load");
        assert_eq!(file.actionlint, Some(PathBuf::from("/opt/actionlint")));
        assert_eq!(file.shellcheck.as_deref(), Some("shellcheck"));
        assert_eq!(file.max_concurrency, Some(2));
    }

    #[test]
    fn missing_file_config_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = FileConfig::load(&dir.path().join("nope.toml")).expect("load");
        assert_eq!(file, FileConfig::default());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "colour = true\n").expect("write config");
        assert!(FileConfig::load(&path).is_err());
    }
}
