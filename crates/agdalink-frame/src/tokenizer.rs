use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::error::TokenizeError;
use crate::unit::Unit;

/// Default maximum token size: 16 MiB.
pub const DEFAULT_MAX_TOKEN: usize = 16 * 1024 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Configuration for incremental tokenization.
#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    /// Maximum size of one token in bytes. An unterminated token that grows
    /// past this is reported as malformed and discarded.
    pub max_token_size: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            max_token_size: DEFAULT_MAX_TOKEN,
        }
    }
}

/// Scan position carried across chunk boundaries.
///
/// `pos` indexes the first unexamined byte of the token at the front of the
/// buffer, so re-feeding never rescans bytes already classified.
#[derive(Debug, Default)]
pub(crate) struct ScanState {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl ScanState {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Decode one complete unit from the front of `buf`, or return `None` when
/// more bytes are needed. Consumes decoded bytes from the buffer.
pub(crate) fn scan_unit(
    buf: &mut BytesMut,
    state: &mut ScanState,
    config: &TokenizerConfig,
) -> Option<Unit> {
    if state.pos == 0 {
        let skip = buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(buf.len());
        buf.advance(skip);
    }

    if buf.is_empty() {
        return None;
    }

    let unit = match buf[0] {
        b')' => {
            let fragment = take_lossy(buf, 1);
            state.reset();
            Some(Unit::Malformed {
                fragment,
                error: TokenizeError::UnbalancedClose,
            })
        }
        b'(' => scan_expr(buf, state),
        b'"' => scan_string(buf, state),
        _ => scan_atom(buf, state),
    };

    if unit.is_some() {
        return unit;
    }

    // Incomplete token; bound its growth so a stream that never closes a
    // paren cannot hold the buffer hostage.
    if buf.len() > config.max_token_size {
        let size = buf.len();
        let fragment = take_lossy(buf, size);
        state.reset();
        return Some(Unit::Malformed {
            fragment,
            error: TokenizeError::TokenTooLarge {
                size,
                max: config.max_token_size,
            },
        });
    }

    None
}

/// Like [`scan_unit`], for end-of-stream: a trailing atom completes, an
/// open parenthesized or quoted token is malformed.
pub(crate) fn scan_unit_eof(
    buf: &mut BytesMut,
    state: &mut ScanState,
    config: &TokenizerConfig,
) -> Option<Unit> {
    if let Some(unit) = scan_unit(buf, state, config) {
        return Some(unit);
    }
    if buf.is_empty() {
        return None;
    }

    let len = buf.len();
    let open = matches!(buf[0], b'(' | b'"');
    let fragment = take_lossy(buf, len);
    state.reset();

    if open {
        Some(Unit::Malformed {
            fragment,
            error: TokenizeError::UnexpectedEof,
        })
    } else {
        Some(Unit::Expr(fragment))
    }
}

fn scan_expr(buf: &mut BytesMut, state: &mut ScanState) -> Option<Unit> {
    let mut i = state.pos;
    while i < buf.len() {
        let b = buf[i];
        if state.in_string {
            if state.escaped {
                state.escaped = false;
            } else if b == b'\\' {
                state.escaped = true;
            } else if b == b'"' {
                state.in_string = false;
            }
        } else {
            match b {
                b'"' => state.in_string = true,
                b'(' => state.depth += 1,
                b')' => {
                    state.depth -= 1;
                    if state.depth == 0 {
                        let token = take_lossy(buf, i + 1);
                        state.reset();
                        return Some(Unit::Expr(token));
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    state.pos = i;
    None
}

fn scan_string(buf: &mut BytesMut, state: &mut ScanState) -> Option<Unit> {
    let mut i = state.pos;
    while i < buf.len() {
        let b = buf[i];
        if i == 0 {
            // Opening quote.
        } else if state.escaped {
            state.escaped = false;
        } else if b == b'\\' {
            state.escaped = true;
        } else if b == b'"' {
            let token = take_lossy(buf, i + 1);
            state.reset();
            return Some(Unit::Expr(token));
        }
        i += 1;
    }
    state.pos = i;
    None
}

fn scan_atom(buf: &mut BytesMut, state: &mut ScanState) -> Option<Unit> {
    let mut i = state.pos;
    while i < buf.len() {
        let b = buf[i];
        if b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'"') {
            let token = take_lossy(buf, i);
            state.reset();
            return Some(Unit::Expr(token));
        }
        i += 1;
    }
    state.pos = i;
    None
}

/// Split `len` bytes off the front of the buffer as (lossy) UTF-8 text.
fn take_lossy(buf: &mut BytesMut, len: usize) -> String {
    let bytes = buf.split_to(len);
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Incremental tokenizer over chunked prover output.
///
/// Keeps the residual between [`feed`](Self::feed) calls; callers always get
/// complete units, in arrival order, no matter how the stream is chunked.
#[derive(Debug)]
pub struct Tokenizer {
    buf: BytesMut,
    state: ScanState,
    config: TokenizerConfig,
}

impl Tokenizer {
    /// Create a tokenizer with default configuration.
    pub fn new() -> Self {
        Self::with_config(TokenizerConfig::default())
    }

    /// Create a tokenizer with explicit configuration.
    pub fn with_config(config: TokenizerConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ScanState::default(),
            config,
        }
    }

    /// Feed one chunk; `emit` fires once per completed unit, in order.
    pub fn feed(&mut self, chunk: &[u8], mut emit: impl FnMut(Unit)) {
        self.buf.extend_from_slice(chunk);
        while let Some(unit) = scan_unit(&mut self.buf, &mut self.state, &self.config) {
            trace!(?unit, "unit decoded");
            emit(unit);
        }
    }

    /// Flush at end-of-stream. A trailing atom completes here (end of
    /// stream terminates it); an open expression is reported malformed.
    pub fn finish(&mut self, mut emit: impl FnMut(Unit)) {
        while let Some(unit) = scan_unit_eof(&mut self.buf, &mut self.state, &self.config) {
            emit(unit);
        }
    }

    /// Bytes currently held waiting for more input.
    pub fn residual_len(&self) -> usize {
        self.buf.len()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
