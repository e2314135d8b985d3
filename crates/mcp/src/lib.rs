//! MCP (Model Context Protocol) client for sqlpilot.
//!
//! This crate owns the tool side of the agent: it connects to an MCP server
//! over JSON-RPC 2.0, discovers the tools it advertises, executes tool calls
//! and reduces their heterogeneous response shapes to plain JSON values.
//!
//! # Architecture
//!
//! - **types**: JSON-RPC 2.0 and MCP-specific protocol types
//! - **transport**: Pluggable transport layer (subprocess stdio, channels)
//! - **client**: the `ToolGateway` owning the single server connection
//! - **normalize**: raw response classification and normalization
//! - **error**: unified error types
//!
//! # Usage
//!
//! ```no_run
//! use sqlpilot_mcp::{ServerCommand, ToolGateway};
//!
//! # async fn example() -> Result<(), sqlpilot_mcp::GatewayError> {
//! let command = ServerCommand::new("python").with_args(["sql_mcp_server.py"]);
//! let mut gateway = ToolGateway::new(command);
//! let tools = gateway.discover_tools().await?;
//! let raw = gateway
//!     .invoke("execute_sql", serde_json::json!({"query": "SELECT 1"}))
//!     .await?;
//! let value = sqlpilot_mcp::normalize(raw);
//! gateway.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod normalize;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod transport;
pub mod types;

pub use client::ToolGateway;
pub use error::GatewayError;
pub use normalize::{normalize, RawToolResponse};
pub use transport::{ChannelTransport, ProcessTransport, ServerCommand, Transport};
pub use types::{ToolContent, ToolDescriptor, PROTOCOL_VERSION};
