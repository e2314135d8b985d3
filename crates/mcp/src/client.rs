//! MCP client gateway.
//!
//! [`ToolGateway`] owns the single connection to the tool server: it spawns
//! the server subprocess (or adopts an injected transport), runs the MCP
//! initialize handshake on first use, caches the discovered tool set for the
//! lifetime of the connection, and dispatches `tools/call` requests. All
//! methods take `&mut self`; the conversation loop drives the gateway
//! strictly sequentially.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::GatewayError;
use crate::normalize::RawToolResponse;
use crate::transport::{ProcessTransport, ServerCommand, Transport};
use crate::types::{
    CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, InitializeParams,
    InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    RpcId, ToolContent, ToolDescriptor, PROTOCOL_VERSION,
};

/// Where the gateway's connection comes from.
enum ConnectionSource {
    /// Spawn this server command on first use.
    Spawn(ServerCommand),
    /// Use an injected transport (tests, embedding). Consumed on connect.
    Prepared(Option<Box<dyn Transport>>),
}

impl ConnectionSource {
    fn take_transport(&mut self) -> Result<Box<dyn Transport>, GatewayError> {
        match self {
            ConnectionSource::Spawn(command) => {
                tracing::info!(command = %command, "starting MCP server");
                Ok(Box::new(ProcessTransport::spawn(command)?))
            }
            ConnectionSource::Prepared(slot) => slot.take().ok_or_else(|| {
                GatewayError::Connection("injected transport was already consumed".to_string())
            }),
        }
    }
}

/// A live MCP session: the transport plus everything scoped to it.
struct Connection {
    transport: Box<dyn Transport>,
    next_id: i64,
    tools: Option<IndexMap<String, ToolDescriptor>>,
}

impl Connection {
    fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            next_id: 1,
            tools: None,
        }
    }

    /// Send a JSON-RPC request and wait for its matching response.
    /// Server-initiated notifications arriving in between are skipped.
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, GatewayError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(RpcId::Number(id), method, params);
        let json = serde_json::to_string(&request)?;
        tracing::debug!(method = %method, id, "sending request");
        self.transport.send(&json).await?;

        loop {
            let line = self.transport.receive().await?.ok_or_else(|| {
                GatewayError::Connection("server closed the connection".to_string())
            })?;
            match serde_json::from_str::<JsonRpcResponse>(&line) {
                Ok(response) => {
                    if response.id != RpcId::Number(id) {
                        return Err(GatewayError::Protocol(format!(
                            "response id does not match request for '{method}'"
                        )));
                    }
                    return Ok(response);
                }
                Err(_) if serde_json::from_str::<JsonRpcNotification>(&line).is_ok() => {
                    tracing::debug!("ignoring server notification");
                }
                Err(e) => return Err(GatewayError::JsonParse(e)),
            }
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), GatewayError> {
        let notif = JsonRpcNotification::new(method, params);
        let json = serde_json::to_string(&notif)?;
        self.transport.send(&json).await
    }

    /// Perform the MCP initialization handshake.
    async fn handshake(&mut self) -> Result<(), GatewayError> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: "sqlpilot".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
        };

        let response = self
            .request("initialize", Some(serde_json::to_value(&params)?))
            .await?;
        if let Some(err) = response.error {
            return Err(GatewayError::Connection(format!(
                "initialize rejected: {}",
                err.message
            )));
        }
        let result: InitializeResult = serde_json::from_value(
            response
                .result
                .ok_or_else(|| GatewayError::Protocol("initialize missing result".to_string()))?,
        )?;
        tracing::info!(
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP session initialized"
        );

        self.notify("notifications/initialized", None).await
    }
}

/// Client-side gateway to the tool server.
///
/// Construct with [`ToolGateway::new`] to spawn a server subprocess on first
/// use, or [`ToolGateway::from_transport`] to run over an existing transport.
/// The connection is established lazily, reused for every call, and released
/// by [`ToolGateway::close`].
pub struct ToolGateway {
    source: ConnectionSource,
    connection: Option<Connection>,
    closed: bool,
}

impl ToolGateway {
    /// Gateway that will spawn `command` when first used.
    pub fn new(command: ServerCommand) -> Self {
        Self {
            source: ConnectionSource::Spawn(command),
            connection: None,
            closed: false,
        }
    }

    /// Gateway over an already-constructed transport. The MCP handshake
    /// still runs lazily on first use.
    pub fn from_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            source: ConnectionSource::Prepared(Some(transport)),
            connection: None,
            closed: false,
        }
    }

    /// Whether a connection has been established and not yet closed.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn connection(&mut self) -> Result<&mut Connection, GatewayError> {
        if self.closed {
            return Err(GatewayError::Connection(
                "gateway has been closed".to_string(),
            ));
        }
        if self.connection.is_none() {
            let transport = self.source.take_transport()?;
            let mut connection = Connection::new(transport);
            if let Err(e) = connection.handshake().await {
                // Don't leave a half-initialized child running.
                let _ = connection.transport.close().await;
                return Err(GatewayError::Connection(e.to_string()));
            }
            self.connection = Some(connection);
        }
        self.connection
            .as_mut()
            .ok_or_else(|| GatewayError::Connection("connection unavailable".to_string()))
    }

    /// List the tools the server advertises.
    ///
    /// The `tools/list` round-trip happens once per connection; later calls
    /// return the cached snapshot in server order.
    pub async fn discover_tools(&mut self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let conn = self.connection().await?;
        if conn.tools.is_none() {
            let response = conn.request("tools/list", None).await?;
            if let Some(err) = response.error {
                return Err(GatewayError::Connection(format!(
                    "tools/list failed: {}",
                    err.message
                )));
            }
            let result: ListToolsResult = serde_json::from_value(
                response.result.ok_or_else(|| {
                    GatewayError::Protocol("tools/list missing result".to_string())
                })?,
            )?;

            let mut tools = IndexMap::new();
            for tool in result.tools {
                tracing::debug!(name = %tool.name, "discovered tool");
                tools.insert(tool.name.clone(), tool);
            }
            tracing::info!(count = tools.len(), "tool discovery complete");
            conn.tools = Some(tools);
        }
        Ok(conn
            .tools
            .as_ref()
            .map(|tools| tools.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Execute one tool call and classify its raw response.
    ///
    /// Establishes the connection first if none exists. Server-side failures
    /// (JSON-RPC errors, `isError` envelopes) and mid-call transport breaks
    /// surface as [`GatewayError::ToolExecution`]; the caller reports those
    /// back to the model rather than aborting.
    pub async fn invoke(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<RawToolResponse, GatewayError> {
        let conn = self.connection().await?;
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        tracing::debug!(tool = %name, "invoking tool");

        let response = conn
            .request("tools/call", Some(serde_json::to_value(&params)?))
            .await
            .map_err(|e| e.for_tool(name))?;

        if let Some(err) = response.error {
            return Err(GatewayError::ToolExecution {
                name: name.to_string(),
                cause: format!("server error {}: {}", err.code, err.message),
            });
        }
        let result = response.result.ok_or_else(|| GatewayError::ToolExecution {
            name: name.to_string(),
            cause: "response missing result".to_string(),
        })?;

        classify_result(name, result)
    }

    /// Tear down the connection. Safe to call more than once; after closing,
    /// the gateway refuses to reconnect.
    pub async fn close(&mut self) -> Result<(), GatewayError> {
        self.closed = true;
        if let Some(mut connection) = self.connection.take() {
            tracing::info!("closing MCP connection");
            connection.transport.close().await?;
        }
        Ok(())
    }
}

/// Sort a `tools/call` result into the raw-response union.
///
/// A result shaped like an MCP content envelope is unpacked; an `isError`
/// envelope becomes a tool-execution failure carrying the flattened text.
/// Everything else is classified by its JSON type.
fn classify_result(name: &str, result: Value) -> Result<RawToolResponse, GatewayError> {
    let looks_like_envelope = result
        .as_object()
        .is_some_and(|object| object.contains_key("content"));
    if looks_like_envelope {
        if let Ok(envelope) = serde_json::from_value::<CallToolResult>(result.clone()) {
            if envelope.is_error {
                return Err(GatewayError::ToolExecution {
                    name: name.to_string(),
                    cause: flatten_error_text(&envelope),
                });
            }
            return Ok(RawToolResponse::ContentBlocks(envelope.content));
        }
    }
    Ok(RawToolResponse::from_value(result))
}

fn flatten_error_text(envelope: &CallToolResult) -> String {
    let texts: Vec<&str> = envelope
        .content
        .iter()
        .filter_map(|block| match block {
            ToolContent::Text { text } => Some(text.as_str()),
            ToolContent::Unsupported => None,
        })
        .collect();
    if texts.is_empty() {
        "tool reported an error".to_string()
    } else {
        texts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::testing::{gateway_with_fake_server, FakeReply};
    use crate::transport::ChannelTransport;
    use crate::types::error_codes;
    use serde_json::json;

    #[tokio::test]
    async fn test_connects_lazily_and_handshakes_once() {
        let (mut gateway, seen) = gateway_with_fake_server(Vec::new());
        assert!(!gateway.is_connected());

        gateway.discover_tools().await.unwrap();
        assert!(gateway.is_connected());

        let methods = seen.lock().unwrap().clone();
        assert_eq!(
            methods,
            vec!["initialize", "notifications/initialized", "tools/list"]
        );
    }

    #[tokio::test]
    async fn test_discover_tools_returns_server_order() {
        let (mut gateway, _seen) = gateway_with_fake_server(Vec::new());
        let tools = gateway.discover_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_tables", "execute_sql"]);
        assert_eq!(tools[1].description, "Execute a SQL query");
    }

    #[tokio::test]
    async fn test_discovery_round_trip_happens_once_per_connection() {
        let (mut gateway, seen) = gateway_with_fake_server(Vec::new());
        gateway.discover_tools().await.unwrap();
        gateway.discover_tools().await.unwrap();

        let lists = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == "tools/list")
            .count();
        assert_eq!(lists, 1);
    }

    #[tokio::test]
    async fn test_invoke_unpacks_content_envelope() {
        let rows = r#"[{"schema":"dbo","table":"Customers","type":"BASE TABLE"}]"#;
        let (mut gateway, _seen) = gateway_with_fake_server(vec![FakeReply::Result(
            json!({"content": [{"type": "text", "text": rows}]}),
        )]);

        let raw = gateway.invoke("list_tables", json!({})).await.unwrap();
        assert!(matches!(raw, RawToolResponse::ContentBlocks(_)));
        assert_eq!(
            normalize(raw),
            json!([{"schema": "dbo", "table": "Customers", "type": "BASE TABLE"}])
        );
    }

    #[tokio::test]
    async fn test_invoke_passes_structured_result_through() {
        let select = json!({"type": "select", "columns": ["1"], "rows": [{"1": "1"}], "row_count": 1});
        let (mut gateway, _seen) =
            gateway_with_fake_server(vec![FakeReply::Result(select.clone())]);

        let raw = gateway
            .invoke("execute_sql", json!({"query": "SELECT 1"}))
            .await
            .unwrap();
        assert_eq!(normalize(raw), select);
    }

    #[tokio::test]
    async fn test_invoke_reports_is_error_envelope_as_failure() {
        let (mut gateway, _seen) = gateway_with_fake_server(vec![FakeReply::Result(json!({
            "content": [{"type": "text", "text": "no such table: Ordersz"}],
            "isError": true,
        }))]);

        let err = gateway
            .invoke("describe_table", json!({"table_name": "Ordersz"}))
            .await
            .unwrap_err();
        match err {
            GatewayError::ToolExecution { name, cause } => {
                assert_eq!(name, "describe_table");
                assert!(cause.contains("no such table"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invoke_reports_rpc_error_as_failure() {
        let (mut gateway, _seen) = gateway_with_fake_server(vec![FakeReply::Error(
            error_codes::INVALID_PARAMS,
            "Unknown tool: drop_everything".to_string(),
        )]);

        let err = gateway
            .invoke("drop_everything", json!({}))
            .await
            .unwrap_err();
        match err {
            GatewayError::ToolExecution { cause, .. } => {
                assert!(cause.contains("Unknown tool"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let (mut gateway, _seen) = gateway_with_fake_server(Vec::new());
        gateway.discover_tools().await.unwrap();

        gateway.close().await.unwrap();
        gateway.close().await.unwrap();
        assert!(!gateway.is_connected());

        let err = gateway.invoke("list_tables", json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
    }

    #[tokio::test]
    async fn test_request_skips_interleaved_notifications() {
        let (client_end, mut server_end) = ChannelTransport::pair();
        let mut gateway = ToolGateway::from_transport(Box::new(client_end));

        let server = tokio::spawn(async move {
            let line = server_end.receive().await.unwrap().unwrap();
            let req: Value = serde_json::from_str(&line).unwrap();
            let init = json!({"jsonrpc": "2.0", "id": req["id"], "result": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "serverInfo": {"name": "fake"},
            }});
            server_end.send(&init.to_string()).await.unwrap();

            // notifications/initialized from the client, no reply needed
            server_end.receive().await.unwrap().unwrap();

            let line = server_end.receive().await.unwrap().unwrap();
            let req: Value = serde_json::from_str(&line).unwrap();
            let log = json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info"}});
            server_end.send(&log.to_string()).await.unwrap();
            let list = json!({"jsonrpc": "2.0", "id": req["id"], "result": {"tools": []}});
            server_end.send(&list.to_string()).await.unwrap();
        });

        let tools = gateway.discover_tools().await.unwrap();
        assert!(tools.is_empty());
        server.await.unwrap();
    }

    #[test]
    fn test_classify_result_prefers_envelope_shape() {
        let raw = classify_result(
            "list_tables",
            json!({"content": [{"type": "text", "text": "[]"}]}),
        )
        .unwrap();
        assert!(matches!(raw, RawToolResponse::ContentBlocks(_)));
    }

    #[test]
    fn test_classify_result_keeps_plain_objects_structured() {
        let raw = classify_result("execute_sql", json!({"type": "delete", "rows_affected": 0}))
            .unwrap();
        assert!(matches!(raw, RawToolResponse::Structured(_)));
    }

    #[test]
    fn test_classify_result_degrades_malformed_envelope() {
        // Has a "content" key but not the MCP shape; treated as plain data.
        let raw = classify_result("execute_sql", json!({"content": "five rows"})).unwrap();
        assert!(matches!(raw, RawToolResponse::Structured(_)));
    }
}
