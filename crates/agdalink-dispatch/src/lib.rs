//! Response classification and turn-ordered delivery.
//!
//! The prover answers one request with a burst of responses terminated by
//! its prompt. Within such a turn two delivery disciplines apply:
//!
//! - *NonLast* responses fire immediately, in arrival order, and never
//!   issue follow-up requests.
//! - *Last* responses carry a priority and fire only after every NonLast
//!   handler of the turn has settled, in ascending priority, strictly one
//!   at a time — a Last handler may send follow-up requests whose replies
//!   must not interleave with the rest of the turn's tail.
//!
//! The [`CompletionLatch`] is the counted barrier between the two phases;
//! the [`Scheduler`] owns the turn state machine.

pub mod classify;
pub mod error;
pub mod latch;
pub mod response;
pub mod scheduler;

pub use classify::{classify, Classified};
pub use error::DispatchError;
pub use latch::{CompletionLatch, TrackGuard};
pub use response::{Class, ClassifyPayload, Event, LastAnnotation, ResponseParseError};
pub use scheduler::{handler, Handler, HandlerFuture, Scheduler};
