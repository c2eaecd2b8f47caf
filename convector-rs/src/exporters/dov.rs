//! Compact binary encoder, the counterpart of
//! [`crate::importers::dov::DovImporter`].

use crate::importers::dov::{ESCAPE, MAGIC, MOVE_TAG};
use convector_core::kurbo::Point;
use convector_core::{Color, ConvectorError, ConvectorResult, ExportFlags, Exporter, Segment};
use std::io::Write;

#[derive(Debug, Default)]
pub struct DovExporter;

impl DovExporter {
    pub fn new() -> Self {
        Self
    }
}

/// A coordinate as a word. `FFFF` is reserved for the escape.
fn word(v: f64) -> [u8; 2] {
    (v.round().clamp(0.0, (ESCAPE - 1) as f64) as u16).to_be_bytes()
}

fn write_point(out: &mut dyn Write, p: Point) -> ConvectorResult<()> {
    out.write_all(&word(p.x))?;
    out.write_all(&word(p.y))?;
    Ok(())
}

impl Exporter for DovExporter {
    fn flags(&self) -> ExportFlags {
        ExportFlags::FLATTEN | ExportFlags::MERGE | ExportFlags::SHORTEN
    }

    fn write_header(
        &mut self,
        out: &mut dyn Write,
        width: f64,
        height: f64,
        inverse_scale: f64,
    ) -> ConvectorResult<()> {
        out.write_all(&MAGIC)?;
        // The decoder recovers the scale from the size in drawing units
        for side in [width * inverse_scale, height * inverse_scale] {
            out.write_all(&(side.round().clamp(0.0, u16::MAX as f64) as u16).to_be_bytes())?;
        }
        Ok(())
    }

    fn write_color(&mut self, _out: &mut dyn Write, _color: Color) -> ConvectorResult<()> {
        Ok(())
    }

    fn write_segment(&mut self, out: &mut dyn Write, segment: &Segment) -> ConvectorResult<()> {
        match *segment {
            Segment::MoveTo(p) => {
                out.write_all(&ESCAPE.to_be_bytes())?;
                out.write_all(&MOVE_TAG.to_be_bytes())?;
                write_point(out, p)
            }
            Segment::LineTo(p) => write_point(out, p),
            // The decoder fills, which closes every subpath
            Segment::Close(_) => Ok(()),
            Segment::QuadTo(..) | Segment::CubicTo(..) => Err(ConvectorError::UnsupportedOperator(
                "curve in compact binary output".to_string(),
            )),
        }
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        out.write_all(&ESCAPE.to_be_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convector_core::{export, Canvas, ExportOptions};

    fn encode(canvas: Canvas) -> Vec<u8> {
        let mut out = Vec::new();
        export(
            &mut DovExporter::new(),
            canvas.into_drawing(),
            &ExportOptions::default(),
            &mut out,
        )
        .unwrap();
        out
    }

    fn words(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn test_rectangle_layout() {
        let mut canvas = Canvas::new();
        canvas.rect(0.0, 0.0, 100.0, 40.0);
        canvas.fill();
        let bytes = encode(canvas);
        assert_eq!(&bytes[..4], &MAGIC);
        assert_eq!(
            words(&bytes[4..]),
            vec![
                100, 40, // header
                0xFFFF, 0x0001, 0, 0, // move
                65534, 0, 65534, 26214, 0, 26214, // lines, clamped below the escape
                0xFFFF,
            ]
        );
    }

    #[test]
    fn test_curves_are_flattened() {
        let mut canvas = Canvas::new();
        canvas.arc(50.0, 50.0, 50.0, 0.0, 360.0, true);
        canvas.fill();
        let bytes = encode(canvas);
        let w = words(&bytes[4..]);
        assert_eq!(&w[2..4], &[0xFFFF, 0x0001]);
        assert!(w.len() > 20);
        assert_eq!(w[2..].iter().filter(|&&v| v == 0xFFFF).count(), 2);
    }

    #[test]
    fn test_size_survives_round_trip() {
        use crate::importers::{dov::DovImporter, Importer};

        let mut canvas = Canvas::new();
        canvas.rect(10.0, 20.0, 300.0, 120.0);
        canvas.fill();
        let bytes = encode(canvas);
        assert_eq!(words(&bytes[4..8]), vec![300, 120]);

        let mut decoded = Canvas::new();
        DovImporter::new().process(&bytes, &mut decoded).unwrap();
        let bounds = decoded.drawing().bounds().unwrap();
        assert!((bounds.width() - 300.0).abs() < 0.01, "{:?}", bounds);
        assert!((bounds.height() - 120.0).abs() < 0.01, "{:?}", bounds);
    }

    #[test]
    fn test_empty_drawing() {
        let bytes = encode(Canvas::new());
        assert_eq!(words(&bytes[4..]), vec![0, 0, 0xFFFF]);
    }
}
