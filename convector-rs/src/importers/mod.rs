//! Decoders that drive a [`Canvas`] from an input document.

pub mod dov;
pub mod gcode;
pub mod ps;
pub mod svg;

use convector_core::{Canvas, ConvectorResult};

/// A format decoder.
pub trait Importer {
    /// Decode `input`, painting into `canvas`.
    fn process(&mut self, input: &[u8], canvas: &mut Canvas) -> ConvectorResult<()>;
}

/// Input bytes as text; invalid UTF-8 is a malformed document.
pub(crate) fn text(input: &[u8]) -> ConvectorResult<&str> {
    std::str::from_utf8(input)
        .map_err(|e| convector_core::ConvectorError::malformed(format!("invalid UTF-8: {}", e)))
}
