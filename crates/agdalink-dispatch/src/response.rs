use crate::error::DispatchError;

/// Delivery class of a decoded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// Handled immediately, in arrival order.
    NonLast,
    /// Buffered until the turn ends, then handled in ascending priority.
    /// Only relative order matters; ties keep arrival order.
    Last(i32),
}

/// Failure to assign a class to a well-formed token.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct ResponseParseError {
    pub reason: String,
}

impl ResponseParseError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Pluggable payload classifier.
///
/// Implementations inspect only as much of the expression as class
/// assignment needs; payload grammar stays uninterpreted here.
pub trait ClassifyPayload: Send + Sync {
    fn classify(&self, expr: &str) -> Result<Class, ResponseParseError>;
}

/// Default classifier: recognizes the prover's `((last . N) . <payload>)`
/// annotation and treats everything else as NonLast.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastAnnotation;

impl ClassifyPayload for LastAnnotation {
    fn classify(&self, expr: &str) -> Result<Class, ResponseParseError> {
        let Some(rest) = expr.strip_prefix("((last . ") else {
            return Ok(Class::NonLast);
        };
        let digits: &str = rest
            .split_once(')')
            .map(|(head, _)| head.trim())
            .ok_or_else(|| ResponseParseError::new("unterminated last annotation"))?;
        let priority = digits
            .parse::<i32>()
            .map_err(|_| ResponseParseError::new(format!("bad last priority {digits:?}")))?;
        Ok(Class::Last(priority))
    }
}

/// One delivered item on the session's response channel.
#[derive(Debug, Clone)]
pub enum Event {
    /// A response payload, delivered under the turn ordering rules.
    Response(String),
    /// Synthetic end-of-turn marker: every NonLast handler of the turn has
    /// settled and the prioritized tail follows.
    TurnCompleted,
    /// An in-band error. Delivered immediately; turn state is unaffected.
    Error(DispatchError),
}
