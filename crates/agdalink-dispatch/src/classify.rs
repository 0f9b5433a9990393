use agdalink_frame::Unit;

use crate::error::DispatchError;
use crate::response::{Class, ClassifyPayload};

/// Outcome of classifying one decoded unit.
#[derive(Debug, Clone)]
pub enum Classified {
    /// The end-of-turn prompt.
    Prompt,
    /// A response with its delivery class and raw payload.
    Response(Class, String),
    /// A malformed unit or classifier rejection, forwarded in-band.
    Error(DispatchError),
}

/// Classify one unit. Pure: no state, no side effects.
///
/// Malformed units pass through unchanged as errors; the prompt is matched
/// on the decoded value before the payload classifier ever sees it.
pub fn classify(unit: Unit, classifier: &dyn ClassifyPayload) -> Classified {
    if unit.is_prompt() {
        return Classified::Prompt;
    }
    match unit {
        Unit::Expr(expr) => match classifier.classify(&expr) {
            Ok(class) => Classified::Response(class, expr),
            Err(source) => Classified::Error(DispatchError::ResponseParse { expr, source }),
        },
        Unit::Malformed { fragment, error } => {
            Classified::Error(DispatchError::Tokenize { fragment, error })
        }
    }
}
