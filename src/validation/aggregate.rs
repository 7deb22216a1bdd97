//! Directory Aggregation
//!
//! Finds the workflow files directly inside a directory, validates each one
//! on a bounded worker pool and folds the outcomes into a single summary.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::engine::{ValidationRequest, ValidationResult, Validator};

/// File suffixes treated as workflow documents (case-sensitive)
pub const WORKFLOW_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Aggregate outcome of a directory check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySummary {
    pub total_files: usize,
    pub files_with_errors: usize,
    pub total_errors: usize,
    pub results: BTreeMap<String, ValidationResult>,
    /// Set when a deadline cut the check short; `results` then only holds
    /// the documents that finished.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
}

impl DirectorySummary {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    /// Record one document's result, keeping the counters in step with `results`
    pub fn record(&mut self, path: String, result: ValidationResult) {
        if let Some(previous) = self.results.remove(&path) {
            self.untally(&previous);
        }
        self.tally(&result);
        self.results.insert(path, result);
    }

    fn tally(&mut self, result: &ValidationResult) {
        if !result.valid {
            self.files_with_errors += 1;
        }
        self.total_errors += result.diagnostics.len();
    }

    fn untally(&mut self, result: &ValidationResult) {
        if !result.valid {
            self.files_with_errors -= 1;
        }
        self.total_errors -= result.diagnostics.len();
    }
}

/// Result of [`Aggregator::aggregate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOutcome {
    /// Nothing to validate: the directory is missing or holds no workflow files
    Empty { directory: String },
    Summary(DirectorySummary),
}

impl DirectoryOutcome {
    pub fn empty_message(directory: &str) -> String {
        format!("No workflow files found in {}", directory)
    }
}

/// List workflow files directly inside `dir`, sorted by path.
///
/// Entries are matched on name only, so a directory called `x.yml` is listed
/// and later reported as unreadable. A missing or unreadable directory lists
/// nothing.
pub async fn discover_workflows(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot list workflow directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if is_workflow_file(&path) {
                    files.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Error while listing {}: {}", dir.display(), e);
                break;
            }
        }
    }

    files.sort();
    files
}

fn is_workflow_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| WORKFLOW_EXTENSIONS.contains(&ext))
}

/// Scatter/gather wrapper around [`Validator`]
#[derive(Debug, Clone)]
pub struct Aggregator {
    validator: Validator,
    max_concurrency: NonZeroUsize,
}

impl Aggregator {
    pub fn new(validator: Validator, max_concurrency: NonZeroUsize) -> Self {
        Self {
            validator,
            max_concurrency,
        }
    }

    /// Validate every workflow file in `directory`
    pub async fn aggregate(&self, directory: &Path) -> DirectoryOutcome {
        self.aggregate_until(directory, None).await
    }

    /// Like [`aggregate`](Self::aggregate), but stops waiting at `deadline`.
    ///
    /// Documents still running at the deadline are abandoned and the summary
    /// covers only the completed ones.
    pub async fn aggregate_until(
        &self,
        directory: &Path,
        deadline: Option<Instant>,
    ) -> DirectoryOutcome {
        let files = discover_workflows(directory).await;
        if files.is_empty() {
            return DirectoryOutcome::Empty {
                directory: directory.display().to_string(),
            };
        }

        log::info!(
            "Linting {} workflow file(s) in {}",
            files.len(),
            directory.display()
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrency.get()));
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::new();

        for path in &files {
            let validator = self.validator.clone();
            let permits = Arc::clone(&permits);
            let task_path = path.clone();
            let handle = tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let request = ValidationRequest::ByPath(task_path.clone());
                let worker = tokio::task::spawn_blocking(move || validator.validate(&request));
                match worker.await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        log::warn!("Failed to lint {}: {}", task_path.display(), e);
                        ValidationResult::lint_failure(task_path.display().to_string(), e)
                    }
                    Err(e) => ValidationResult::lint_failure(task_path.display().to_string(), e),
                }
            });
            pending.insert(handle.id(), path.display().to_string());
        }

        let mut summary = DirectorySummary::new(files.len());

        loop {
            let joined = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            log::warn!(
                                "Deadline reached with {} of {} workflow file(s) unfinished",
                                pending.len(),
                                files.len()
                            );
                            tasks.abort_all();
                            summary.incomplete = true;
                            break;
                        }
                    }
                }
                None => tasks.join_next_with_id().await,
            };

            match joined {
                Some(Ok((id, result))) => {
                    let path = pending.remove(&id).unwrap_or_else(|| result.file_path.clone());
                    summary.record(path, result);
                }
                Some(Err(e)) => {
                    // Only reachable if the wrapper task panicked; still report the document.
                    if let Some(path) = pending.remove(&e.id()) {
                        let result = ValidationResult::lint_failure(path.clone(), &e);
                        summary.record(path, result);
                    }
                }
                None => break,
            }
        }

        DirectoryOutcome::Summary(summary)
    }
}
