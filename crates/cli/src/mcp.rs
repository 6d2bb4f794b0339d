// MCP server over stdio: line-delimited JSON-RPC 2.0.
// - initialize / ping / tools/list / tools/call
// - notifications (no id) are accepted and ignored
// - one task per request, responses funnelled through a single writer

use fsgate_gateway::{tool_definitions, Dispatcher};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "fsgate";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Success response carrying `payload`; a payload that cannot be encoded is
    /// an internal error.
    pub fn encode<T: Serialize>(id: Value, payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(v) => Self::result(id, v),
            Err(e) => Self::error(id, INTERNAL_ERROR, format!("internal error: {e}")),
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct Session {
    dispatcher: Arc<Dispatcher>,
}

impl Session {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// `None` for notifications, which never get a response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                ))
            }
        };
        let id_hint = value.get("id").cloned().unwrap_or(Value::Null);
        let req: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id_hint,
                    INVALID_REQUEST,
                    format!("invalid request: {e}"),
                ))
            }
        };
        if req.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            return Some(JsonRpcResponse::error(
                id_hint,
                INVALID_REQUEST,
                "invalid json-rpc version",
            ));
        }
        let Some(id) = req.id else {
            tracing::debug!(method = %req.method, "notification ignored");
            return None;
        };
        Some(self.handle_request(id, &req.method, req.params).await)
    }

    async fn handle_request(
        &self,
        id: Value,
        method: &str,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        match method {
            "initialize" => JsonRpcResponse::result(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") }
                }),
            ),
            "ping" => JsonRpcResponse::result(id, json!({})),
            "tools/list" => JsonRpcResponse::result(id, json!({ "tools": tool_definitions() })),
            "tools/call" => {
                let params = params.unwrap_or(Value::Null);
                let call: ToolCallParams = match serde_json::from_value(params) {
                    Ok(c) => c,
                    Err(e) => {
                        return JsonRpcResponse::error(
                            id,
                            INVALID_PARAMS,
                            format!("invalid tools/call params: {e}"),
                        )
                    }
                };
                let result = self.dispatcher.call(&call.name, &call.arguments).await;
                JsonRpcResponse::encode(id, &result)
            }
            other => {
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("method not found: {other}"))
            }
        }
    }
}

/// Serves requests from `reader` until EOF, then waits for in-flight calls to
/// finish before returning.
pub async fn serve<R, W>(dispatcher: Arc<Dispatcher>, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(frame) = rx.recv().await {
            writer.write_all(frame.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<(), io::Error>(())
    });

    let session = Arc::new(Session::new(dispatcher));
    let mut tasks = JoinSet::new();
    let mut reader = reader;
    let mut buf = Vec::new();
    let read_result = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }
        let line = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "frame is not valid UTF-8");
                let resp = JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                );
                send_frame(&tx, &resp);
                continue;
            }
        };
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        let line = line.to_string();
        let session = session.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            if let Some(resp) = session.handle_line(&line).await {
                send_frame(&tx, &resp);
            }
        });
        // reap finished tasks so the set does not grow unbounded
        while tasks.try_join_next().is_some() {}
    };
    // answer everything already accepted, even when the transport failed
    while tasks.join_next().await.is_some() {}
    drop(tx);
    let written = writer_task.await.map_err(io::Error::other)?;
    read_result.and(written)
}

fn send_frame(tx: &mpsc::UnboundedSender<String>, resp: &JsonRpcResponse) {
    match serde_json::to_string(resp) {
        Ok(frame) => {
            let _ = tx.send(frame);
        }
        Err(e) => tracing::error!(error = %e, "response serialization failed"),
    }
}
