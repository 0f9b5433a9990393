use crate::transport::ConnectionMethod;

/// Errors from the RPC session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Could not establish a transport handle for the method.
    #[error("cannot connect via {method:?}: {source}")]
    ConnectFailed {
        method: ConnectionMethod,
        #[source]
        source: std::io::Error,
    },

    /// The transport dropped a request or its reply.
    #[error("cannot send request: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The server replied with something this client cannot decode.
    #[error("cannot decode server response: {raw:?}")]
    CannotDecodeResponse { raw: String },

    /// The server could not decode our request.
    #[error("server cannot decode request: {message}")]
    ServerCannotDecodeRequest { message: String },

    /// An operation that needs a connection ran while disconnected.
    #[error("not connected yet")]
    NotConnectedYet,
}

pub type Result<T> = std::result::Result<T, ClientError>;
