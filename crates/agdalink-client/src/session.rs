use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::transport::{is_connection_refused, ClientConfig, ClientHandle, ConnectionMethod};
use crate::wire::{ClientRequest, ServerReply};

/// Connection status broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Connected { version: String },
    Disconnected,
}

enum SessionState {
    Disconnected,
    Connected {
        handle: ClientHandle,
        version: String,
    },
}

/// The persistent language-server session.
///
/// Owned by the application's composition root and passed by reference;
/// lifecycle operations take `&mut self`, so callers cannot race them.
/// Observers subscribe to three independent streams: connection status,
/// method changes, and transport-level errors.
pub struct RpcSession {
    state: SessionState,
    method: ConnectionMethod,
    config: ClientConfig,
    status_tx: broadcast::Sender<Status>,
    method_tx: broadcast::Sender<ConnectionMethod>,
    error_tx: broadcast::Sender<String>,
}

impl RpcSession {
    pub fn new(config: ClientConfig) -> Self {
        let (status_tx, _) = broadcast::channel(16);
        let (method_tx, _) = broadcast::channel(16);
        let (error_tx, _) = broadcast::channel(16);
        Self {
            state: SessionState::Disconnected,
            method: ConnectionMethod::Stdio,
            config,
            status_tx,
            method_tx,
            error_tx,
        }
    }

    /// Currently selected connection method.
    pub fn method(&self) -> ConnectionMethod {
        self.method
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    /// The version negotiated at handshake, when connected.
    pub fn version(&self) -> Option<&str> {
        match &self.state {
            SessionState::Connected { version, .. } => Some(version),
            SessionState::Disconnected => None,
        }
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<Status> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_method_changes(&self) -> broadcast::Receiver<ConnectionMethod> {
        self.method_tx.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.error_tx.subscribe()
    }

    /// Establish the session and return the negotiated version.
    ///
    /// Dev mode selects the socket method, otherwise stdio. Idempotent when
    /// already connected. A refused socket falls back to stdio once, with a
    /// method-change notification; every other failure surfaces as-is and
    /// leaves the session disconnected.
    pub async fn start(&mut self, dev_mode: bool) -> Result<String> {
        if let SessionState::Connected { version, .. } = &self.state {
            debug!(%version, "start on a connected session is a no-op");
            return Ok(version.clone());
        }

        self.method = if dev_mode {
            ConnectionMethod::Tcp
        } else {
            ConnectionMethod::Stdio
        };

        self.establish().await
    }

    /// Tear the session down. No-op when already disconnected.
    pub async fn stop(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Disconnected);
        if let SessionState::Connected { mut handle, .. } = state {
            handle.shutdown().await;
            let _ = self.status_tx.send(Status::Disconnected);
            info!("rpc session stopped");
        }
    }

    /// Send one request and decode its reply.
    ///
    /// Fails fast with [`ClientError::NotConnectedYet`] while disconnected,
    /// before any I/O. A transport failure emits `Status::Disconnected` on
    /// the status stream but leaves the state machine in Connected —
    /// `stop`/`change_method` remain the only transitions out.
    pub async fn send_request(&mut self, request: &ClientRequest) -> Result<ServerReply> {
        let SessionState::Connected { handle, .. } = &mut self.state else {
            return Err(ClientError::NotConnectedYet);
        };

        let line = encode_line(request)?;
        let outcome = exchange(handle, &line).await;

        match outcome {
            Ok(raw) => match decode_reply(raw)? {
                ServerReply::ResCannotDecodeRequest(message) => {
                    Err(ClientError::ServerCannotDecodeRequest { message })
                }
                reply => Ok(reply),
            },
            Err(err) => {
                warn!(%err, "request transport failed");
                let _ = self.error_tx.send(err.to_string());
                let _ = self.status_tx.send(Status::Disconnected);
                Err(ClientError::SendFailed(err))
            }
        }
    }

    /// Switch the connection method.
    ///
    /// `Ok(None)` when the method is already selected (state, version, and
    /// notifications untouched); otherwise stops the current session,
    /// announces the change, reconnects over the new method, and returns
    /// the freshly negotiated version.
    pub async fn change_method(&mut self, method: ConnectionMethod) -> Result<Option<String>> {
        if method == self.method {
            return Ok(None);
        }

        self.stop().await;
        self.set_method(method);
        let version = self.establish().await?;
        Ok(Some(version))
    }

    fn set_method(&mut self, method: ConnectionMethod) {
        self.method = method;
        let _ = self.method_tx.send(method);
    }

    /// Connect over the selected method (with the refused-socket fallback)
    /// and run the Initialize handshake.
    async fn establish(&mut self) -> Result<String> {
        let mut handle = match ClientHandle::connect(self.method, &self.config).await {
            Ok(handle) => handle,
            Err(ClientError::ConnectFailed {
                method: ConnectionMethod::Tcp,
                source,
            }) if is_connection_refused(&source) => {
                debug!(%source, "socket refused; falling back to stdio");
                self.set_method(ConnectionMethod::Stdio);
                match ClientHandle::connect(ConnectionMethod::Stdio, &self.config).await {
                    Ok(handle) => handle,
                    Err(err) => {
                        let _ = self.error_tx.send(err.to_string());
                        return Err(err);
                    }
                }
            }
            Err(err) => {
                let _ = self.error_tx.send(err.to_string());
                return Err(err);
            }
        };

        match self.handshake(&mut handle).await {
            Ok(version) => {
                self.state = SessionState::Connected {
                    handle,
                    version: version.clone(),
                };
                let _ = self.status_tx.send(Status::Connected {
                    version: version.clone(),
                });
                info!(%version, method = ?self.method, "rpc session connected");
                Ok(version)
            }
            Err(err) => {
                handle.shutdown().await;
                let _ = self.error_tx.send(err.to_string());
                Err(err)
            }
        }
    }

    /// Send `ReqInitialize` and await the version-carrying ack.
    async fn handshake(&self, handle: &mut ClientHandle) -> Result<String> {
        let line = encode_line(&ClientRequest::ReqInitialize)?;
        let raw = exchange(handle, &line)
            .await
            .map_err(|source| ClientError::ConnectFailed {
                method: handle.method(),
                source,
            })?;

        match decode_reply(raw)? {
            ServerReply::ResInitialize(version) => Ok(version),
            ServerReply::ResCannotDecodeRequest(message) => {
                Err(ClientError::ServerCannotDecodeRequest { message })
            }
        }
    }
}

fn encode_line(request: &ClientRequest) -> Result<String> {
    serde_json::to_string(request).map_err(|err| {
        ClientError::SendFailed(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}

/// One request/reply exchange; EOF counts as a transport failure.
async fn exchange(handle: &mut ClientHandle, line: &str) -> std::io::Result<String> {
    handle.send_line(line).await?;
    handle
        .recv_line()
        .await?
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed"))
}

fn decode_reply(raw: String) -> Result<ServerReply> {
    serde_json::from_str::<ServerReply>(&raw)
        .map_err(|_| ClientError::CannotDecodeResponse { raw })
}
