//! Long-lived Agda interaction process sessions.
//!
//! A session owns one spawned prover process and the whole inbound
//! pipeline: the child's stdout is framed into units, classified, and
//! delivered through the turn scheduler to the session's single subscriber.
//! Opening a session resolves and validates the executable first — a
//! one-shot `--version` probe negotiates the version every outbound request
//! is encoded against.

pub mod config;
pub mod error;
pub mod metadata;
pub mod request;
pub mod session;

pub use config::{HighlightingMethod, SessionConfig};
pub use error::{ConnectionError, Result};
pub use metadata::{
    expand_tilde, extract_version, probe, resolve_executable, search_path, SessionMetadata,
};
pub use request::{encode, Request};
pub use session::ProcessSession;
