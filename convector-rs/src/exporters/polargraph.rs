//! Polargraph encoder.
//!
//! A polargraph hangs its pen from two motors at the top corners of the
//! machine. Every point is sent as its string lengths to the left and right
//! motors (`C17,a,b,END`), with the pen raised (`C14`) for travel and lowered
//! (`C13`) once it reaches the start of a subpath.

use convector_core::kurbo::Point;
use convector_core::{
    Color, ConvectorError, ConvectorResult, ExportFlags, Exporter, Segment, EXTENT,
};
use std::io::Write;

/// Distance between the two motors, in machine steps.
pub const DEFAULT_MACHINE_WIDTH: f64 = 1000.0;

const PEN_UP: &[u8] = b"C14,END\n";
const PEN_DOWN: &[u8] = b"C13,END\n";

#[derive(Debug)]
pub struct PolargraphExporter {
    machine_width: f64,
}

impl Default for PolargraphExporter {
    fn default() -> Self {
        Self::new(DEFAULT_MACHINE_WIDTH)
    }
}

impl PolargraphExporter {
    pub fn new(machine_width: f64) -> Self {
        Self { machine_width }
    }

    /// String lengths to the left and right motors.
    fn lengths(&self, p: Point) -> (i64, i64) {
        let ratio = self.machine_width / EXTENT;
        let (x, y) = (p.x * ratio, p.y * ratio);
        let a = x.hypot(y);
        let b = (self.machine_width - x).hypot(y);
        (a.round() as i64, b.round() as i64)
    }

    fn goto(&self, out: &mut dyn Write, p: Point) -> ConvectorResult<()> {
        let (a, b) = self.lengths(p);
        writeln!(out, "C17,{},{},END", a, b)?;
        Ok(())
    }
}

impl Exporter for PolargraphExporter {
    fn flags(&self) -> ExportFlags {
        ExportFlags::FLATTEN | ExportFlags::MERGE | ExportFlags::SHORTEN
    }

    fn write_header(
        &mut self,
        _out: &mut dyn Write,
        _width: f64,
        _height: f64,
        _inverse_scale: f64,
    ) -> ConvectorResult<()> {
        Ok(())
    }

    fn write_color(&mut self, _out: &mut dyn Write, _color: Color) -> ConvectorResult<()> {
        Ok(())
    }

    fn write_segment(&mut self, out: &mut dyn Write, segment: &Segment) -> ConvectorResult<()> {
        match *segment {
            Segment::MoveTo(p) => {
                out.write_all(PEN_UP)?;
                self.goto(out, p)?;
                out.write_all(PEN_DOWN)?;
                Ok(())
            }
            Segment::LineTo(p) | Segment::Close(p) => self.goto(out, p),
            Segment::QuadTo(..) | Segment::CubicTo(..) => Err(ConvectorError::UnsupportedOperator(
                "curve in polargraph output".to_string(),
            )),
        }
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        out.write_all(PEN_UP)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convector_core::{export, Canvas, ExportOptions};
    use rstest::rstest;

    #[rstest]
    #[case(Point::new(0.0, 0.0), (0, 1000))]
    #[case(Point::new(EXTENT, 0.0), (1000, 0))]
    #[case(Point::new(EXTENT / 2.0, EXTENT / 2.0), (707, 707))]
    fn test_motor_lengths(#[case] p: Point, #[case] expected: (i64, i64)) {
        assert_eq!(PolargraphExporter::default().lengths(p), expected);
    }

    #[test]
    fn test_pen_lifts_around_moves() {
        let mut canvas = Canvas::new();
        canvas.rect(0.0, 0.0, 10.0, 10.0);
        canvas.fill();
        let mut out = Vec::new();
        export(
            &mut PolargraphExporter::new(2000.0),
            canvas.into_drawing(),
            &ExportOptions::default(),
            &mut out,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(&lines[..3], &["C14,END", "C17,0,2000,END", "C13,END"]);
        assert_eq!(lines[3], "C17,2000,0,END");
        assert_eq!(lines.last(), Some(&"C14,END"));
        // Four corners and the return to the start
        assert_eq!(lines.iter().filter(|l| l.starts_with("C17")).count(), 5);
    }
}
