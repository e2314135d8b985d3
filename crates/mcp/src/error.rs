//! Error types for the MCP client crate.

/// Errors that can occur while talking to the tool server.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The connection could not be established or the handshake failed.
    /// Fatal when raised during tool discovery; without tools there is
    /// nothing to orchestrate.
    #[error("connection to tool server failed: {0}")]
    Connection(String),

    /// A specific tool call failed, either because the server reported an
    /// error or because the transport broke mid-call. Recoverable: the
    /// caller reports it back to the model and the conversation continues.
    #[error("tool '{name}' failed: {cause}")]
    ToolExecution { name: String, cause: String },

    /// The server sent something that is not valid for the protocol state,
    /// e.g. a response for an id we never issued or a result with the
    /// wrong shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failed to parse a JSON frame.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Transport I/O error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Wrap any gateway error as a per-call execution failure for `name`.
    pub fn for_tool(self, name: &str) -> Self {
        match self {
            GatewayError::ToolExecution { .. } => self,
            other => GatewayError::ToolExecution {
                name: name.to_string(),
                cause: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_execution_message_names_the_tool() {
        let err = GatewayError::ToolExecution {
            name: "execute_sql".to_string(),
            cause: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "tool 'execute_sql' failed: timeout");
    }

    #[test]
    fn test_for_tool_wraps_io_errors() {
        let io = GatewayError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        let wrapped = io.for_tool("list_tables");
        match wrapped {
            GatewayError::ToolExecution { name, cause } => {
                assert_eq!(name, "list_tables");
                assert!(cause.contains("pipe closed"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[test]
    fn test_for_tool_keeps_existing_execution_error() {
        let err = GatewayError::ToolExecution {
            name: "describe_table".to_string(),
            cause: "no such table".to_string(),
        };
        match err.for_tool("other") {
            GatewayError::ToolExecution { name, .. } => assert_eq!(name, "describe_table"),
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }
}
