use crate::error::TokenizeError;

/// The prompt atom the prover prints at the end of every interaction turn.
pub const PROMPT: &str = "Agda2>";

/// One decoded unit of prover output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// A complete top-level token: a parenthesized S-expression, a quoted
    /// string, or a bare atom.
    Expr(String),
    /// A fragment that could not be tokenized. The fragment has been
    /// consumed; framing continues with the bytes after it.
    Malformed {
        fragment: String,
        error: TokenizeError,
    },
}

impl Unit {
    /// Whether this unit is the end-of-turn prompt.
    ///
    /// Recognized by the decoded value, not by raw text position: the same
    /// characters inside a larger expression are ordinary output.
    pub fn is_prompt(&self) -> bool {
        matches!(self, Unit::Expr(text) if text == PROMPT)
    }
}
