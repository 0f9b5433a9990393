use serde::{Deserialize, Serialize};

/// Outbound RPC message.
///
/// Serialized in the server's Aeson layout: `{"tag": "...", "contents": ...}`
/// with the contents key absent for nullary constructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", content = "contents")]
pub enum ClientRequest {
    /// Handshake opener; the reply carries the server version.
    ReqInitialize,
    /// A command line forwarded verbatim to the server.
    ReqCommand(String),
}

/// Inbound RPC reply.
///
/// Only these tags are recognized; any other payload is a client-side
/// decode error carrying the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "tag", content = "contents")]
pub enum ServerReply {
    /// Handshake ack carrying the server version.
    ResInitialize(String),
    /// The server could not decode our request.
    ResCannotDecodeRequest(String),
}
