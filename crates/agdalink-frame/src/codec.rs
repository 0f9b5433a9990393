use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::tokenizer::{scan_unit, scan_unit_eof, ScanState, TokenizerConfig};
use crate::unit::Unit;

/// [`Decoder`] adapter for driving the tokenizer from a `FramedRead`.
///
/// Yields one [`Unit`] per call once enough bytes have arrived; malformed
/// input surfaces as `Unit::Malformed` items, so the only `Err` this codec
/// produces is a real I/O failure from the underlying stream.
#[derive(Debug, Default)]
pub struct UnitCodec {
    state: ScanState,
    config: TokenizerConfig,
}

impl UnitCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: TokenizerConfig) -> Self {
        Self {
            state: ScanState::default(),
            config,
        }
    }
}

impl Decoder for UnitCodec {
    type Item = Unit;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Unit>, Self::Error> {
        Ok(scan_unit(src, &mut self.state, &self.config))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Unit>, Self::Error> {
        Ok(scan_unit_eof(src, &mut self.state, &self.config))
    }
}
