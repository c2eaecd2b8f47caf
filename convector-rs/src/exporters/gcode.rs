//! G-code encoder.
//!
//! Coordinates are written in drawing units (millimetres once imported from
//! G-code). Curve words carry their control points as offsets, `I J` from the
//! segment start and `P Q` from its end.

use super::decimal;
use convector_core::kurbo::Point;
use convector_core::{Color, ConvectorResult, ExportFlags, Exporter, Segment};
use std::io::Write;

const PLACES: usize = 3;

#[derive(Debug)]
pub struct GCodeExporter {
    inverse_scale: f64,
    last: Point,
}

impl Default for GCodeExporter {
    fn default() -> Self {
        Self {
            inverse_scale: 1.0,
            last: Point::ORIGIN,
        }
    }
}

impl GCodeExporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn coord(&self, v: f64) -> String {
        decimal(v * self.inverse_scale, PLACES)
    }

    fn axes(&self, p: Point) -> String {
        format!("X{} Y{}", self.coord(p.x), self.coord(p.y))
    }
}

impl Exporter for GCodeExporter {
    fn flags(&self) -> ExportFlags {
        ExportFlags::MERGE | ExportFlags::SHORTEN | ExportFlags::REVERSE
    }

    fn write_header(
        &mut self,
        out: &mut dyn Write,
        _width: f64,
        _height: f64,
        inverse_scale: f64,
    ) -> ConvectorResult<()> {
        self.inverse_scale = inverse_scale;
        out.write_all(b"G21\n")?;
        Ok(())
    }

    fn write_color(&mut self, _out: &mut dyn Write, _color: Color) -> ConvectorResult<()> {
        // Single pen
        Ok(())
    }

    fn write_segment(&mut self, out: &mut dyn Write, segment: &Segment) -> ConvectorResult<()> {
        let line = match *segment {
            Segment::MoveTo(p) => format!("G0 {}", self.axes(p)),
            Segment::LineTo(p) | Segment::Close(p) => format!("G1 {}", self.axes(p)),
            Segment::QuadTo(c, p) => format!(
                "G5.1 I{} J{} {}",
                self.coord(c.x - self.last.x),
                self.coord(c.y - self.last.y),
                self.axes(p)
            ),
            Segment::CubicTo(c1, c2, p) => format!(
                "G5 I{} J{} P{} Q{} {}",
                self.coord(c1.x - self.last.x),
                self.coord(c1.y - self.last.y),
                self.coord(c2.x - p.x),
                self.coord(c2.y - p.y),
                self.axes(p)
            ),
        };
        self.last = segment.end();
        writeln!(out, "{}", line)?;
        Ok(())
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        out.write_all(b"M30\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convector_core::{export, Canvas, CubicBezierParams, ExportOptions};

    fn encode(canvas: Canvas) -> String {
        let mut out = Vec::new();
        export(
            &mut GCodeExporter::new(),
            canvas.into_drawing(),
            &ExportOptions::default(),
            &mut out,
        )
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_square_outline_in_drawing_units() {
        let mut canvas = Canvas::new();
        canvas.rect(0.0, 0.0, 10.0, 10.0);
        canvas.fill();
        let text = encode(canvas);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.first(), Some(&"G21"));
        assert_eq!(lines.last(), Some(&"M30"));
        assert!(lines[1].starts_with("G0 "));
        assert!(lines.contains(&"G1 X10 Y10") || lines.contains(&"G1 X10 Y0"));
        for line in &lines[1..lines.len() - 1] {
            assert!(line.starts_with("G0 ") || line.starts_with("G1 "), "{}", line);
        }
    }

    #[test]
    fn test_y_axis_is_reversed() {
        let mut canvas = Canvas::new();
        canvas.rect(0.0, 0.0, 20.0, 5.0);
        canvas.fill();
        canvas.rect(0.0, 15.0, 1.0, 5.0);
        canvas.fill();
        let text = encode(canvas);
        // The lower rectangle in device space lands at the bottom
        assert!(text.contains("Y0\n"));
        assert!(text.contains("Y20\n"));
    }

    #[test]
    fn test_cubic_offsets() {
        let mut canvas = Canvas::new();
        canvas.move_to(0.0, 0.0);
        canvas.curve_to(&CubicBezierParams {
            cp1x: 0.0,
            cp1y: -10.0,
            cp2x: 10.0,
            cp2y: -10.0,
            x: 10.0,
            y: 0.0,
        });
        canvas.fill();
        let text = encode(canvas);
        let g5 = text.lines().find(|l| l.starts_with("G5 ")).unwrap();
        assert!(g5.starts_with("G5 I0 J"), "{}", g5);
        assert!(g5.contains(" P0 Q"), "{}", g5);
    }

    #[test]
    fn test_empty_drawing() {
        assert_eq!(encode(Canvas::new()), "G21\nM30\n");
    }
}
