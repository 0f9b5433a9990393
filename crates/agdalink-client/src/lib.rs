//! JSON-RPC language-server sessions.
//!
//! The alternative to driving the prover's REPL directly: a persistent
//! client that talks tagged JSON to the language server, over the server's
//! stdio or over TCP. The session is a two-state machine (Disconnected /
//! Connected) with a version-negotiating Initialize handshake, an automatic
//! socket→stdio fallback when the socket is refused, and three independent
//! notification streams for observers.
//!
//! One session object serves the whole application; it belongs to the
//! composition root and is passed by reference. Lifecycle operations take
//! `&mut self`, so concurrent `start`/`stop`/`change_method` calls are a
//! compile error rather than a runtime race.

pub mod error;
pub mod session;
pub mod transport;
pub mod wire;

pub use error::{ClientError, Result};
pub use session::{RpcSession, Status};
pub use transport::{is_connection_refused, ClientConfig, ClientHandle, ConnectionMethod};
pub use wire::{ClientRequest, ServerReply};
