use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR, ToolCallParams, ToolsListResult,
};
use super::tools::{WorkflowTools, define_tools};
use crate::Config;
use crate::linter::{Actionlint, LintEngine};
use crate::validation::{Aggregator, Validator};

/// Start the MCP server on stdio
pub async fn serve() -> Result<()> {
    let config = Config::from_args_and_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!(
        "actionlint-mcp {} starting (actionlint: {}, shellcheck: {}, pyflakes: {}, config: {})",
        env!("CARGO_PKG_VERSION"),
        config.actionlint.display(),
        config.shellcheck.as_deref().unwrap_or("disabled"),
        config.pyflakes.as_deref().unwrap_or("disabled"),
        config
            .engine_config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
    );

    let server = Arc::new(McpServer::new(&config));
    server
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}

/// MCP request dispatcher
///
/// Stateless apart from the read-only tool handlers, so requests are served
/// concurrently.
#[derive(Debug)]
pub struct McpServer {
    tools: WorkflowTools,
}

impl McpServer {
    pub fn new(config: &Config) -> Self {
        Self::with_engine(Arc::new(Actionlint::from_config(config)), config)
    }

    pub fn with_engine(engine: Arc<dyn LintEngine>, config: &Config) -> Self {
        let validator = Validator::new(engine);
        let aggregator = Aggregator::new(validator.clone(), config.max_concurrency);
        Self {
            tools: WorkflowTools::new(validator, aggregator, config.call_timeout),
        }
    }

    /// Serve newline-delimited JSON-RPC until `reader` hits EOF.
    ///
    /// Each request runs on its own task; responses go through one channel to
    /// a single writer so frames never interleave.
    pub async fn run<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut in_flight = JoinSet::new();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
            if line.trim().is_empty() {
                continue;
            }
            log::trace!("<- {}", line);

            let server = Arc::clone(&self);
            let tx = tx.clone();
            in_flight.spawn(async move {
                if let Some(response) = server.handle_message(&line).await {
                    // The writer only goes away once stdout is closed.
                    let _ = tx.send(response);
                }
            });

            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    log::error!("Request task failed: {}", e);
                }
            }
        }

        log::info!("stdin closed, finishing {} in-flight request(s)", in_flight.len());
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                log::error!("Request task failed: {}", e);
            }
        }
        drop(tx);

        writer_task.await.context("Response writer panicked")?
    }

    /// Handle one raw message. Returns `None` for notifications.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let message: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    Some(Value::Null),
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        // Well-formed JSON that is not a request object still gets its id echoed back.
        let raw_id = message.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    Some(raw_id.unwrap_or(Value::Null)),
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                INVALID_REQUEST,
                "Invalid JSON-RPC version",
            ));
        }

        let is_notification = request.id.is_none();
        let response = self.dispatch(request).await;
        // JSON-RPC 2.0: notifications never get a response
        if is_notification { None } else { response }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => Some(to_response(id, &InitializeResult::default())),
            "initialized" | "notifications/initialized" => None,
            "ping" | "shutdown" => Some(JsonRpcResponse::success(id, serde_json::json!({}))),
            "tools/list" => Some(to_response(
                id,
                &ToolsListResult {
                    tools: define_tools(),
                },
            )),
            "tools/call" => Some(self.handle_tools_call(id, request.params).await),
            method if method.starts_with("notifications/") => None,
            method => Some(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e));
            }
        };

        log::debug!("tools/call {}", params.name);
        match self
            .tools
            .call(&params.name, params.arguments.unwrap_or(Value::Null))
            .await
        {
            Ok(result) => to_response(id, &result),
            Err(e) => JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string()),
        }
    }
}

fn to_response<T: serde::Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            id,
            INTERNAL_ERROR,
            format!("Failed to serialize result: {}", e),
        ),
    }
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut writer: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut frame = serde_json::to_string(&response).context("Failed to encode response")?;
        log::trace!("-> {}", frame);
        frame.push('\n');
        writer
            .write_all(frame.as_bytes())
            .await
            .context("Failed to write response")?;
        writer.flush().await.context("Failed to flush response")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linter::FakeEngine;

    fn server() -> McpServer {
        McpServer::with_engine(Arc::new(FakeEngine::new()), &Config::default())
    }

    #[tokio::test]
    async fn initialize_reports_tools_capability() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .expect("response");
        let result = response.result.expect("result");
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "actionlint-mcp");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let server = server();
        assert!(
            server
                .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .await
                .is_none()
        );
        assert!(
            server
                .handle_message(r#"{"jsonrpc":"2.0","method":"no/such/method"}"#)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn protocol_errors() {
        let server = server();

        let parse = server.handle_message("{not json").await.expect("response");
        assert_eq!(parse.error.map(|e| e.code), Some(PARSE_ERROR));

        let version = server
            .handle_message(r#"{"jsonrpc":"1.0","id":2,"method":"ping"}"#)
            .await
            .expect("response");
        assert_eq!(version.error.map(|e| e.code), Some(INVALID_REQUEST));

        let unknown = server
            .handle_message(r#"{"jsonrpc":"2.0","id":3,"method":"resources/read"}"#)
            .await
            .expect("response");
        assert_eq!(unknown.error.map(|e| e.code), Some(METHOD_NOT_FOUND));

        let bad_tool = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope"}}"#,
            )
            .await
            .expect("response");
        assert_eq!(bad_tool.error.map(|e| e.code), Some(INVALID_PARAMS));
    }

    #[tokio::test]
    async fn null_id_is_a_request() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .expect("null id still gets a reply");
        assert_eq!(response.id, Some(Value::Null));
        assert!(response.error.is_none());

        let frame = serde_json::to_value(&response).expect("serialize");
        assert_eq!(frame["id"], Value::Null);
        assert!(frame.as_object().is_some_and(|o| o.contains_key("id")));
    }

    #[tokio::test]
    async fn malformed_requests_are_invalid_not_parse_errors() {
        let server = server();

        let no_method = server
            .handle_message(r#"{"jsonrpc":"2.0","id":9}"#)
            .await
            .expect("response");
        assert_eq!(no_method.id, Some(Value::from(9)));
        assert_eq!(no_method.error.map(|e| e.code), Some(INVALID_REQUEST));

        let not_object = server.handle_message("[1,2]").await.expect("response");
        assert_eq!(not_object.id, Some(Value::Null));
        assert_eq!(not_object.error.map(|e| e.code), Some(INVALID_REQUEST));

        let parse = server.handle_message(r#"{"jsonrpc":"2.0","#).await.expect("response");
        assert_eq!(parse.id, Some(Value::Null));
        assert_eq!(parse.error.map(|e| e.code), Some(PARSE_ERROR));
    }

    #[tokio::test]
    async fn tools_list_names() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .expect("response");
        assert_eq!(response.id, Some(Value::from("a")));
        let tools = response.result.expect("result")["tools"].clone();
        assert_eq!(tools[0]["name"], "lint_workflow");
        assert_eq!(tools[1]["name"], "check_all_workflows");
        assert!(tools[0]["inputSchema"]["properties"]["file_path"].is_object());
    }

    #[tokio::test]
    async fn run_answers_every_request() {
        let (mut client, server_end) = tokio::io::duplex(1 << 16);
        let (server_read, server_write) = tokio::io::split(server_end);
        let server = Arc::new(server());
        let running = tokio::spawn(server.run(BufReader::new(server_read), server_write));

        let requests = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"lint_workflow","arguments":{"content":"on: push\n"}}}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
        ];
        for request in requests {
            client
                .write_all(format!("{}\n", request).as_bytes())
                .await
                .expect("write");
        }
        client.shutdown().await.expect("shutdown");

        let mut output = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut client, &mut output)
            .await
            .expect("read");
        running.await.expect("join").expect("run");

        let mut ids: Vec<i64> = output
            .lines()
            .map(|line| {
                let response: JsonRpcResponse = serde_json::from_str(line).expect("frame");
                response.id.and_then(|id| id.as_i64()).expect("id")
            })
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
