use agdalink_frame::TokenizeError;

use crate::response::ResponseParseError;

/// Errors delivered in-band on the session's response channel.
///
/// These are first-class stream items: the subscriber receives them through
/// the same callback as successful responses, and the turn state machine is
/// unaffected by them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The framer could not tokenize a fragment of prover output.
    #[error("malformed prover output near {fragment:?}: {error}")]
    Tokenize {
        fragment: String,
        #[source]
        error: TokenizeError,
    },

    /// A well-formed token that the payload classifier rejected.
    #[error("unparsable response {expr:?}: {source}")]
    ResponseParse {
        expr: String,
        #[source]
        source: ResponseParseError,
    },

    /// The session transport failed; fatal for the session.
    #[error("session transport failed: {0}")]
    Session(String),
}
