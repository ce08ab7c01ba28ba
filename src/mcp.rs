//! MCP server over stdio: newline-delimited JSON-RPC 2.0.

use crate::store::Store;
use crate::tools::{self, ToolCall};
use eyre::{Context, Result};
use serde_json::{Value, json};
use std::io::{BufRead, Write};

const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

const INSTRUCTIONS: &str = "Code knowledge tree: a persistent dependency graph of code elements. \
Add elements with their dependencies, then inspect the tree, missing references and health stats.";

fn response(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}

/// Wrap a tool envelope as MCP content. A `success: false` envelope is a tool error.
fn tool_result(data: Value) -> Value {
    let is_error = data.get("success").and_then(Value::as_bool) == Some(false);
    let text = serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string());
    json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": data,
        "isError": is_error
    })
}

/// Stdio MCP server bound to one store.
pub struct Server {
    store: Store,
}

impl Server {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Serve until stdin closes.
    pub fn run(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        self.serve(stdin.lock(), stdout.lock())
    }

    /// Serve newline-delimited requests from `reader`, writing responses to `writer`.
    pub fn serve(&mut self, reader: impl BufRead, mut writer: impl Write) -> Result<()> {
        log::info!(
            "MCP server started for {}",
            self.store.config().working_dir().display()
        );

        for line in reader.lines() {
            let line = line.context("Failed to read from stdin")?;
            if line.trim().is_empty() {
                continue;
            }

            let reply = match serde_json::from_str::<Value>(&line) {
                Ok(message) => self.handle_message(message),
                Err(e) => {
                    log::warn!("Unparseable MCP message: {}", e);
                    Some(error_response(Value::Null, PARSE_ERROR, &format!("Parse error: {}", e)))
                }
            };

            if let Some(reply) = reply {
                serde_json::to_writer(&mut writer, &reply)?;
                writer.write_all(b"\n")?;
                writer.flush()?;
            }
        }

        log::info!("MCP server stopped: stdin closed");
        Ok(())
    }

    /// Handle one JSON-RPC message. Notifications get no reply.
    pub fn handle_message(&mut self, message: Value) -> Option<Value> {
        let method = message.get("method").and_then(Value::as_str).unwrap_or_default();
        if method.starts_with("notifications/") {
            return None;
        }
        let id = message.get("id").cloned()?;
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        log::debug!("MCP request: {}", method);

        let reply = match method {
            "initialize" => {
                let protocol = params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);
                response(
                    id,
                    json!({
                        "protocolVersion": protocol,
                        "capabilities": {"tools": {"listChanged": false}},
                        "serverInfo": {
                            "name": "ctree",
                            "version": env!("CARGO_PKG_VERSION")
                        },
                        "instructions": INSTRUCTIONS
                    }),
                )
            }
            "ping" => response(id, json!({})),
            "tools/list" => response(id, json!({"tools": tools::tool_specs()})),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
                if name.is_empty() {
                    return Some(error_response(id, INVALID_PARAMS, "tools/call requires tool name"));
                }
                let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
                match ToolCall::from_parts(name, arguments) {
                    Ok(call) => response(id, tool_result(tools::dispatch(&mut self.store, call))),
                    Err(e) => error_response(id, INVALID_PARAMS, &format!("Invalid call to '{}': {}", name, e)),
                }
            }
            _ => error_response(id, METHOD_NOT_FOUND, "method not found"),
        };
        Some(reply)
    }
}
