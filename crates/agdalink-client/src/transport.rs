use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::{debug, info};

use crate::error::{ClientError, Result};

/// Which wire the RPC session runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMethod {
    /// Spawn the server and speak over its stdio.
    Stdio,
    /// Connect to an already-running server over TCP.
    Tcp,
}

/// Settings for establishing RPC connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Language-server executable for the stdio method.
    pub command: String,
    pub args: Vec<String>,
    /// TCP endpoint for the socket method.
    pub host: String,
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command: "als".to_string(),
            args: Vec::new(),
            host: "127.0.0.1".to_string(),
            port: 4096,
        }
    }
}

/// A live connection over one of the methods. Line-oriented both ways.
pub enum ClientHandle {
    Stdio {
        child: Child,
        stdin: ChildStdin,
        stdout: BufReader<ChildStdout>,
    },
    Tcp {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    },
}

impl ClientHandle {
    /// Establish a handle for `method`.
    pub async fn connect(method: ConnectionMethod, config: &ClientConfig) -> Result<Self> {
        match method {
            ConnectionMethod::Tcp => {
                let stream = TcpStream::connect((config.host.as_str(), config.port))
                    .await
                    .map_err(|source| ClientError::ConnectFailed { method, source })?;
                info!(host = %config.host, port = config.port, "connected over tcp");
                let (read_half, writer) = stream.into_split();
                Ok(ClientHandle::Tcp {
                    reader: BufReader::new(read_half),
                    writer,
                })
            }
            ConnectionMethod::Stdio => {
                let mut child = tokio::process::Command::new(&config.command)
                    .args(&config.args)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|source| ClientError::ConnectFailed { method, source })?;
                let stdin = child.stdin.take().ok_or_else(|| ClientError::ConnectFailed {
                    method,
                    source: std::io::Error::other("no stdin handle"),
                })?;
                let stdout = child.stdout.take().ok_or_else(|| ClientError::ConnectFailed {
                    method,
                    source: std::io::Error::other("no stdout handle"),
                })?;
                info!(command = %config.command, "language server spawned over stdio");
                Ok(ClientHandle::Stdio {
                    child,
                    stdin,
                    stdout: BufReader::new(stdout),
                })
            }
        }
    }

    /// Write one line.
    pub async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        let writer: &mut (dyn tokio::io::AsyncWrite + Unpin + Send) = match self {
            ClientHandle::Stdio { stdin, .. } => stdin,
            ClientHandle::Tcp { writer, .. } => writer,
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Read one line; `Ok(None)` when the peer closed the connection.
    pub async fn recv_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let read = match self {
            ClientHandle::Stdio { stdout, .. } => stdout.read_line(&mut line).await?,
            ClientHandle::Tcp { reader, .. } => reader.read_line(&mut line).await?,
        };
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Release the transport.
    pub async fn shutdown(&mut self) {
        match self {
            ClientHandle::Stdio { child, .. } => {
                if let Err(err) = child.kill().await {
                    debug!(%err, "server already gone at shutdown");
                }
            }
            ClientHandle::Tcp { writer, .. } => {
                let _ = writer.shutdown().await;
            }
        }
    }

    /// Method this handle was established with.
    pub fn method(&self) -> ConnectionMethod {
        match self {
            ClientHandle::Stdio { .. } => ConnectionMethod::Stdio,
            ClientHandle::Tcp { .. } => ConnectionMethod::Tcp,
        }
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("method", &self.method())
            .finish()
    }
}

/// Whether a connect failure is the refused shape that triggers the
/// socket→stdio fallback.
pub fn is_connection_refused(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::ConnectionRefused
        || err.to_string().starts_with("ECONNREFUSED")
}
