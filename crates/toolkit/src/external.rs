//! External tool servers.
//!
//! An [`ExternalToolkit`] fronts tools hosted by another process. The server
//! seam is the [`ToolServer`] trait; [`StdioToolServer`] implements it over
//! line-delimited JSON-RPC on a child process's stdio.
//!
//! Server-declared schemas are advertised in closed form: every property is
//! required, `additionalProperties` is false, and strict mode is requested,
//! which keeps the model from inventing arguments a server never declared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dendrite_core::error::{Error, Result, ToolkitError};
use dendrite_core::message::ToolCall;
use dendrite_core::provider::ToolSchema;
use dendrite_core::toolkit::{ToolContext, ToolResult, Toolkit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A tool as declared by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTool {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON Schema for the arguments object, as the server declares it.
    #[serde(rename = "input_schema", alias = "inputSchema")]
    pub input_schema: Value,
}

/// One piece of a tool result. Servers may return several; only text blocks
/// are fed back to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

/// Transport seam to an out-of-process tool server.
#[async_trait]
pub trait ToolServer: Send + Sync {
    async fn list_tools(&self) -> std::result::Result<Vec<ServerTool>, ToolkitError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> std::result::Result<Vec<ContentBlock>, ToolkitError>;
}

/// Toolkit fronting one external server.
///
/// Discovery happens once, on first use, behind a lock so concurrent
/// callers never trigger a second `tools/list`.
pub struct ExternalToolkit {
    server: Arc<dyn ToolServer>,
    discovered: Mutex<Option<Vec<ToolSchema>>>,
}

impl ExternalToolkit {
    pub fn new(server: Arc<dyn ToolServer>) -> Self {
        Self {
            server,
            discovered: Mutex::new(None),
        }
    }

    async fn discover(&self) -> Result<Vec<ToolSchema>> {
        let mut cache = self.discovered.lock().await;
        if let Some(tools) = cache.as_ref() {
            return Ok(tools.clone());
        }

        let tools: Vec<ToolSchema> = self
            .server
            .list_tools()
            .await?
            .into_iter()
            .map(|t| ToolSchema {
                name: t.name,
                description: t.description,
                parameters: close_schema(t.input_schema),
                strict: true,
            })
            .collect();
        debug!(count = tools.len(), "Discovered external tools");

        *cache = Some(tools.clone());
        Ok(tools)
    }
}

/// Close an object schema: require every declared property and forbid
/// undeclared ones.
fn close_schema(mut schema: Value) -> Value {
    if !schema.is_object() {
        schema = serde_json::json!({"type": "object", "properties": {}});
    }
    let keys: Vec<Value> = schema["properties"]
        .as_object()
        .map(|props| props.keys().cloned().map(Value::String).collect())
        .unwrap_or_default();
    schema["required"] = Value::Array(keys);
    schema["additionalProperties"] = Value::Bool(false);
    schema
}

/// Join a result's text blocks; non-text blocks are dropped.
fn render_blocks(blocks: Vec<ContentBlock>) -> String {
    blocks
        .into_iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Unsupported => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Toolkit for ExternalToolkit {
    async fn tools(&self) -> Result<Vec<ToolSchema>> {
        self.discover().await
    }

    async fn handle_tool_calls(
        &self,
        calls: &[ToolCall],
        _ctx: &ToolContext,
    ) -> Result<Vec<ToolResult>> {
        let known = self.discover().await?;

        let mut results = Vec::new();
        for call in calls {
            if !known.iter().any(|t| t.name == call.name) {
                continue; // not ours
            }

            let arguments: Value = serde_json::from_str(&call.arguments).map_err(|e| {
                Error::MalformedOutput(format!(
                    "Arguments for {} are not valid JSON: {e}",
                    call.name
                ))
            })?;

            debug!(tool = %call.name, "Calling external tool");
            let blocks = self.server.call_tool(&call.name, arguments).await?;
            results.push(ToolResult::new(call.id.clone(), render_blocks(blocks)));
        }
        Ok(results)
    }
}

// ── Stdio transport ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

struct StdioPipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Line-delimited JSON-RPC over a child process's stdio.
///
/// Requests are serialized under one lock, so at most one call is in flight
/// at a time.
pub struct StdioToolServer {
    pipes: Mutex<StdioPipes>,
    next_id: AtomicU64,
    _child: Child,
}

impl StdioToolServer {
    /// Spawn the server process and take over its stdio.
    pub fn spawn(
        program: &str,
        args: &[&str],
    ) -> std::result::Result<Self, ToolkitError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolkitError::ServerUnavailable(format!("spawn {program}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolkitError::ServerUnavailable("no stdin pipe".into()))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| ToolkitError::ServerUnavailable("no stdout pipe".into()))?;

        Ok(Self {
            pipes: Mutex::new(StdioPipes { stdin, stdout }),
            next_id: AtomicU64::new(1),
            _child: child,
        })
    }

    async fn request(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<Value, ToolkitError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| ToolkitError::ServerUnavailable(e.to_string()))?;
        line.push('\n');

        let mut pipes = self.pipes.lock().await;
        pipes
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ToolkitError::ServerUnavailable(format!("write: {e}")))?;
        pipes
            .stdin
            .flush()
            .await
            .map_err(|e| ToolkitError::ServerUnavailable(format!("flush: {e}")))?;

        // Read until our response id; servers may interleave notifications.
        loop {
            let mut buf = String::new();
            let n = pipes
                .stdout
                .read_line(&mut buf)
                .await
                .map_err(|e| ToolkitError::ServerUnavailable(format!("read: {e}")))?;
            if n == 0 {
                return Err(ToolkitError::ServerUnavailable(
                    "server closed its stdout".into(),
                ));
            }

            let response: RpcResponse = match serde_json::from_str(buf.trim()) {
                Ok(r) => r,
                Err(_) => {
                    warn!(line = %buf.trim(), "Ignoring non-response line from tool server");
                    continue;
                }
            };
            if response.id != id {
                continue;
            }

            if let Some(error) = response.error {
                return Err(ToolkitError::ServerUnavailable(format!(
                    "rpc error {}: {}",
                    error.code, error.message
                )));
            }
            return response.result.ok_or_else(|| {
                ToolkitError::ServerUnavailable("response carried no result".into())
            });
        }
    }
}

#[async_trait]
impl ToolServer for StdioToolServer {
    async fn list_tools(&self) -> std::result::Result<Vec<ServerTool>, ToolkitError> {
        let result = self.request("tools/list", serde_json::json!({})).await?;
        serde_json::from_value(result["tools"].clone())
            .map_err(|e| ToolkitError::ServerUnavailable(format!("bad tools/list reply: {e}")))
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> std::result::Result<Vec<ContentBlock>, ToolkitError> {
        let result = self
            .request(
                "tools/call",
                serde_json::json!({"name": name, "arguments": arguments}),
            )
            .await?;
        serde_json::from_value(result["content"].clone())
            .map_err(|e| ToolkitError::ServerUnavailable(format!("bad tools/call reply: {e}")))
    }
}
