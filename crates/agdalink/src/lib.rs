//! Editor-side connection core for the Agda proof assistant.
//!
//! Agdalink frames the prover's chunked output, re-orders responses under
//! the NonLast/Last turn discipline, and manages both connection styles:
//! the direct interaction process and the JSON-RPC language server.
//!
//! # Crate Structure
//!
//! - [`frame`] — Incremental S-expression framing and prompt detection
//! - [`dispatch`] — Response classification and turn-ordered delivery
//! - [`process`] — Long-lived interaction process sessions
//! - [`client`] — Language-server sessions over stdio or TCP

/// Re-export framing types.
pub mod frame {
    pub use agdalink_frame::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use agdalink_dispatch::*;
}

/// Re-export process session types.
pub mod process {
    pub use agdalink_process::*;
}

/// Re-export language-server client types.
pub mod client {
    pub use agdalink_client::*;
}
