/// Reasons a fragment of prover output fails to tokenize.
///
/// These travel inside [`crate::Unit::Malformed`] rather than as `Err`
/// results: the stream keeps yielding units after any of them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    /// A close paren appeared at top level with no matching open paren.
    #[error("unbalanced close paren")]
    UnbalancedClose,

    /// An unterminated token grew past the configured maximum.
    #[error("token too large ({size} bytes, max {max})")]
    TokenTooLarge { size: usize, max: usize },

    /// The stream ended inside a parenthesized or quoted token.
    #[error("stream ended mid-token")]
    UnexpectedEof,
}
