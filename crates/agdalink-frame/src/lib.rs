//! Incremental framing of Agda interaction output.
//!
//! The prover writes S-expression responses to stdout in arbitrary chunks:
//! a chunk may hold zero, one, or many complete tokens, and a token may span
//! any number of chunks. This crate re-assembles whole tokens from that
//! stream and recognizes the end-of-turn prompt among them. Decode failures
//! are ordinary stream items, never faults — framing stays live after bad
//! input so later tokens are not lost.

pub mod codec;
pub mod error;
pub mod tokenizer;
pub mod unit;

pub use codec::UnitCodec;
pub use error::TokenizeError;
pub use tokenizer::{Tokenizer, TokenizerConfig, DEFAULT_MAX_TOKEN};
pub use unit::{Unit, PROMPT};
