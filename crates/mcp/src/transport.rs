//! Transport layer for the MCP client.
//!
//! Defines the `Transport` trait for exchanging newline-delimited JSON-RPC
//! messages, a `ProcessTransport` that owns a spawned server subprocess and
//! talks to it over its stdio pipes, and an in-memory `ChannelTransport`
//! for tests.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::GatewayError;

/// How long a server gets to exit on its own after stdin closes before it
/// is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Trait for MCP message transport.
///
/// Implementations carry the wire format (one JSON object per line) over
/// different channels. The gateway owns exactly one boxed transport and
/// drives it sequentially.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the next JSON-RPC message line from the transport.
    /// Returns `None` when the transport is closed.
    async fn receive(&mut self) -> Result<Option<String>, GatewayError>;

    /// Write a JSON-RPC message line to the transport.
    async fn send(&mut self, message: &str) -> Result<(), GatewayError>;

    /// Release the transport's resources. Default is a no-op; process-backed
    /// transports tear down their child here.
    async fn close(&mut self) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Command line used to launch an MCP server subprocess.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    /// Create a command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl std::fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Transport over a spawned server subprocess.
///
/// Writes to the child's stdin and reads its stdout line by line; stderr
/// passes through to the console. The child is registered for kill-on-drop
/// as a backstop, but `close` is the intended teardown path: stdin is
/// dropped first so a well-behaved server exits on EOF, then the child is
/// reaped, with a kill after [`SHUTDOWN_GRACE`].
pub struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
}

impl ProcessTransport {
    /// Spawn the server subprocess and wire up its stdio pipes.
    pub fn spawn(command: &ServerCommand) -> Result<Self, GatewayError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                GatewayError::Connection(format!("failed to spawn '{}': {e}", command.program))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::Connection("child stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Connection("child stdout was not captured".to_string()))?;

        tracing::debug!(program = %command.program, "spawned MCP server process");

        Ok(Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        })
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn receive(&mut self) -> Result<Option<String>, GatewayError> {
        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Ok(None); // EOF
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    async fn send(&mut self, message: &str) -> Result<(), GatewayError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            GatewayError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "transport already closed",
            ))
        })?;
        stdin.write_all(message.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        // Closing stdin signals EOF to the server.
        drop(self.stdin.take());
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::debug!(%status, "MCP server process exited");
            }
            Err(_) => {
                tracing::debug!("MCP server did not exit on EOF, killing");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

/// In-memory transport for testing, backed by channel pairs.
pub struct ChannelTransport {
    rx: tokio::sync::mpsc::Receiver<String>,
    tx: tokio::sync::mpsc::Sender<String>,
}

impl ChannelTransport {
    /// Create a pair of connected transports.
    ///
    /// Messages sent on one transport are received by the other, so one end
    /// can play the server in tests.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = tokio::sync::mpsc::channel(32);
        let (tx_b, rx_a) = tokio::sync::mpsc::channel(32);
        (
            Self { rx: rx_a, tx: tx_a },
            Self { rx: rx_b, tx: tx_b },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn receive(&mut self) -> Result<Option<String>, GatewayError> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, message: &str) -> Result<(), GatewayError> {
        self.tx.send(message.to_string()).await.map_err(|e| {
            GatewayError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })?;
        Ok(())
    }
}
