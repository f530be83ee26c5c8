use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::file::FileStore;
use crate::tools::{FileTools, ToolError};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "lineshift";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ToolError> for RpcError {
    fn from(err: ToolError) -> Self {
        RpcError::new(INVALID_PARAMS, err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn response(id: Value, result: Result<Value, RpcError>) -> Value {
    match result {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
    }
}

/// Dispatches line-delimited JSON-RPC 2.0 requests onto a tool catalogue
///
/// A request object with no `id` member is a notification and gets no
/// response; `"id": null` is still a request.
pub struct Server<S: FileStore> {
    tools: FileTools<S>,
}

impl<S: FileStore> Server<S> {
    pub fn new(tools: FileTools<S>) -> Self {
        Self { tools }
    }

    /// Handle one raw input line, returning the response to send, if any
    pub fn handle_line(&self, line: &str) -> Option<Value> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                return Some(response(Value::Null, Err(RpcError::new(PARSE_ERROR, e.to_string()))));
            }
        };

        let id = raw.get("id").cloned();
        let request: Request = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(e) => {
                return Some(response(
                    id.unwrap_or(Value::Null),
                    Err(RpcError::new(INVALID_REQUEST, e.to_string())),
                ));
            }
        };

        debug!(method = %request.method, "request");
        let result = self.dispatch(&request.method, request.params);
        id.map(|id| response(id, result))
    }

    fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({"tools": self.tools.definitions()})),
            "tools/call" => {
                let params: CallParams = serde_json::from_value(params.unwrap_or(Value::Null))
                    .map_err(|e| RpcError::new(INVALID_PARAMS, e.to_string()))?;
                let arguments = params.arguments.unwrap_or_else(|| json!({}));
                let output = self.tools.call(&params.name, arguments)?;

                Ok(json!({
                    "content": [{"type": "text", "text": output.text}],
                    "isError": output.is_error
                }))
            }
            method if method.starts_with("notifications/") => Ok(Value::Null),
            other => Err(RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        }
    }

    /// Serve requests from `reader` until end of input
    pub fn serve<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> io::Result<()> {
        info!("serving tools on stdio");

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(reply) = self.handle_line(&line) {
                writeln!(writer, "{}", reply)?;
                writer.flush()?;
            }
        }

        info!("input closed, shutting down");
        Ok(())
    }
}
