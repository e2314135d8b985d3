//! Scripted fake MCP server for tests.
//!
//! [`gateway_with_fake_server`] pairs a [`ChannelTransport`] with a spawned
//! task that answers the MCP handshake, advertises a small SQL tool set and
//! pops one scripted reply per `tools/call`. Every JSON-RPC method received
//! is recorded so tests can assert on protocol traffic.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::client::ToolGateway;
use crate::transport::ChannelTransport;
use crate::types::{error_codes, PROTOCOL_VERSION};

/// Scripted reply for one `tools/call` request.
pub enum FakeReply {
    /// JSON-RPC success with this `result` value.
    Result(Value),
    /// JSON-RPC error with this code and message.
    Error(i64, String),
}

/// Methods the fake server has received, in arrival order.
pub type MethodLog = Arc<Mutex<Vec<String>>>;

/// Build a gateway wired to a fake server task that serves `replies` to
/// `tools/call` requests in order (an empty content envelope once the
/// script runs out). Returns the gateway and the server's method log.
pub fn gateway_with_fake_server(replies: Vec<FakeReply>) -> (ToolGateway, MethodLog) {
    let (client_end, server_end) = ChannelTransport::pair();
    let seen: MethodLog = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn(run_fake_server(server_end, replies, Arc::clone(&seen)));
    (ToolGateway::from_transport(Box::new(client_end)), seen)
}

/// Drive the server end of a transport pair until the client hangs up.
pub async fn run_fake_server(
    mut peer: ChannelTransport,
    mut replies: Vec<FakeReply>,
    seen: MethodLog,
) {
    use crate::transport::Transport;

    while let Ok(Some(line)) = peer.receive().await {
        let frame: Value = serde_json::from_str(&line).unwrap();
        let method = frame["method"].as_str().unwrap_or_default().to_string();
        seen.lock().unwrap().push(method.clone());
        let Some(id) = frame.get("id").cloned() else {
            continue;
        };

        let response = match method.as_str() {
            "initialize" => json!({"jsonrpc": "2.0", "id": id, "result": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": "fake-sql-server", "version": "0.0.1"},
            }}),
            "tools/list" => json!({"jsonrpc": "2.0", "id": id, "result": {"tools": [
                {
                    "name": "list_tables",
                    "description": "List all tables",
                    "inputSchema": {"type": "object", "properties": {}},
                },
                {
                    "name": "execute_sql",
                    "description": "Execute a SQL query",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"query": {"type": "string"}},
                        "required": ["query"],
                    },
                },
            ]}}),
            "tools/call" => {
                let reply = if replies.is_empty() {
                    FakeReply::Result(json!({"content": []}))
                } else {
                    replies.remove(0)
                };
                match reply {
                    FakeReply::Result(value) => {
                        json!({"jsonrpc": "2.0", "id": id, "result": value})
                    }
                    FakeReply::Error(code, message) => {
                        json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
                    }
                }
            }
            other => json!({"jsonrpc": "2.0", "id": id, "error": {
                "code": error_codes::METHOD_NOT_FOUND,
                "message": format!("unknown method {other}"),
            }}),
        };

        if peer.send(&response.to_string()).await.is_err() {
            break;
        }
    }
}
