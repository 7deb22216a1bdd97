//! MCP Protocol Implementation
//!
//! JSON-RPC 2.0 over newline-delimited stdio, exposing the workflow tools.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{McpServer, serve};
pub use tools::WorkflowTools;
