//! Tool definitions and handlers.
//!
//! `lint_workflow` validates one document, `check_all_workflows` validates a
//! directory. Both reply with a single text content block.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::protocol::{Tool, ToolResult};
use crate::config::DEFAULT_WORKFLOW_DIR;
use crate::validation::{
    Aggregator, DirectoryOutcome, RequestError, ValidationRequest, ValidationResult, Validator,
};

pub const LINT_WORKFLOW: &str = "lint_workflow";
pub const CHECK_ALL_WORKFLOWS: &str = "check_all_workflows";

#[derive(Debug, Default, Deserialize)]
pub struct LintWorkflowParams {
    #[serde(default, alias = "path")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckAllWorkflowsParams {
    #[serde(default)]
    pub directory: Option<String>,
}

/// Errors that reject the call itself rather than report a tool failure
#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures reported back to the host as tool errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("deadline exceeded after {}s", .0.as_secs_f64())]
    Deadline(Duration),
    #[error("validation worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub fn define_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: LINT_WORKFLOW.to_string(),
            description: "Lint a GitHub Actions workflow file using actionlint".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the workflow file to lint"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content of the workflow file to lint (if file_path is not provided)"
                    }
                },
                "oneOf": [
                    {"required": ["file_path"]},
                    {"required": ["content"]}
                ]
            }),
        },
        Tool {
            name: CHECK_ALL_WORKFLOWS.to_string(),
            description: "Check all GitHub Actions workflow files in a directory".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Directory to search for workflow files (defaults to .github/workflows)"
                    }
                }
            }),
        },
    ]
}

/// Tool handlers shared by every request task
#[derive(Debug, Clone)]
pub struct WorkflowTools {
    validator: Validator,
    aggregator: Aggregator,
    call_timeout: Option<Duration>,
}

impl WorkflowTools {
    pub fn new(
        validator: Validator,
        aggregator: Aggregator,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            validator,
            aggregator,
            call_timeout,
        }
    }

    /// Dispatch a `tools/call` by tool name
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolCallError> {
        let outcome = match name {
            LINT_WORKFLOW | "validateDocument" => {
                let params = parse_arguments::<LintWorkflowParams>(name, arguments)?;
                self.lint_workflow(params).await
            }
            CHECK_ALL_WORKFLOWS | "checkDirectory" => {
                let params = parse_arguments::<CheckAllWorkflowsParams>(name, arguments)?;
                self.check_all_workflows(params).await
            }
            other => return Err(ToolCallError::UnknownTool(other.to_string())),
        };

        Ok(match outcome {
            Ok(text) => ToolResult::text(text),
            Err(e) => {
                log::info!("{} failed: {}", name, e);
                ToolResult::error(e.to_string())
            }
        })
    }

    /// Validate one workflow, returning the result as pretty JSON
    pub async fn lint_workflow(&self, params: LintWorkflowParams) -> Result<String, ToolError> {
        let request = ValidationRequest::from_fields(params.file_path, params.content)?;
        let result = self.validate(request).await?;
        Ok(serde_json::to_string_pretty(&result).map_err(RequestError::from)?)
    }

    /// Validate every workflow in a directory, returning the summary as pretty JSON
    /// or the "nothing found" notice
    pub async fn check_all_workflows(
        &self,
        params: CheckAllWorkflowsParams,
    ) -> Result<String, ToolError> {
        let directory = params
            .directory
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_WORKFLOW_DIR.to_string());

        let deadline = self
            .call_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);

        match self
            .aggregator
            .aggregate_until(Path::new(&directory), deadline)
            .await
        {
            DirectoryOutcome::Empty { directory } => {
                Ok(DirectoryOutcome::empty_message(&directory))
            }
            DirectoryOutcome::Summary(summary) => {
                Ok(serde_json::to_string_pretty(&summary).map_err(RequestError::from)?)
            }
        }
    }

    async fn validate(&self, request: ValidationRequest) -> Result<ValidationResult, ToolError> {
        let validator = self.validator.clone();
        let worker = tokio::task::spawn_blocking(move || validator.validate(&request));

        let joined = match self.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, worker)
                .await
                .map_err(|_| ToolError::Deadline(timeout))?,
            None => worker.await,
        };
        Ok(joined??)
    }
}

fn parse_arguments<T>(tool: &str, arguments: Value) -> Result<T, ToolCallError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if arguments.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(arguments).map_err(|source| ToolCallError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}
