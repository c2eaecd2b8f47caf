//! PostScript encoder.

use super::decimal;
use convector_core::{
    Color, ConvectorResult, ExportFlags, Exporter, SegmentTemplates, WindingRule,
};
use std::io::Write;

const TEMPLATES: SegmentTemplates = SegmentTemplates {
    move_to: "% % m\n",
    line_to: "% % l\n",
    quad_to: None,
    cubic_to: "% % % % % % c\n",
    close: "h\n",
};

/// Short names for the painting operators, defined in the prolog.
const PROLOG: &str = "/d{load def}bind def/m/moveto d/l/lineto d/c/curveto d\
                      /h/closepath d/f/fill d/ef/eofill d/rg/setrgbcolor d\n";

#[derive(Debug, Default)]
pub struct PsExporter {
    rule: WindingRule,
}

impl PsExporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Exporter for PsExporter {
    fn flags(&self) -> ExportFlags {
        ExportFlags::REVERSE | ExportFlags::ELEVATE
    }

    fn templates(&self) -> Option<SegmentTemplates> {
        Some(TEMPLATES)
    }

    fn write_header(
        &mut self,
        out: &mut dyn Write,
        width: f64,
        height: f64,
        inverse_scale: f64,
    ) -> ConvectorResult<()> {
        writeln!(out, "%!PS-Adobe-3.0")?;
        writeln!(
            out,
            "%%BoundingBox: 0 0 {} {}",
            (width * inverse_scale).round(),
            (height * inverse_scale).round()
        )?;
        writeln!(out, "%%Creator: ConVector")?;
        out.write_all(PROLOG.as_bytes())?;
        let s = decimal(inverse_scale, 9);
        writeln!(out, "{} {} scale", s, s)?;
        Ok(())
    }

    fn write_color(&mut self, out: &mut dyn Write, color: Color) -> ConvectorResult<()> {
        let (r, g, b) = color.to_unit_rgb();
        writeln!(out, "{} {} {} rg", decimal(r, 3), decimal(g, 3), decimal(b, 3))?;
        Ok(())
    }

    fn write_rule(&mut self, _out: &mut dyn Write, rule: WindingRule) -> ConvectorResult<()> {
        self.rule = rule;
        Ok(())
    }

    fn end_splash(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        match self.rule {
            WindingRule::NonZero => out.write_all(b"f\n")?,
            WindingRule::EvenOdd => out.write_all(b"ef\n")?,
        }
        Ok(())
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        out.write_all(b"showpage\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convector_core::{export, Canvas, ExportOptions, QuadraticBezierParams};

    fn encode(canvas: Canvas) -> String {
        let mut out = Vec::new();
        export(
            &mut PsExporter::new(),
            canvas.into_drawing(),
            &ExportOptions::default(),
            &mut out,
        )
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_splash_structure() {
        let mut canvas = Canvas::new();
        canvas.set_color(Color::rgb(255, 0, 0));
        canvas.rect(0.0, 0.0, 100.0, 100.0);
        canvas.fill();
        let text = encode(canvas);
        assert!(text.starts_with("%!PS"));
        assert!(text.contains("%%BoundingBox: 0 0 100 100\n"));
        assert!(text.contains("1 0 0 rg\n0 65535 m\n"));
        assert!(text.ends_with("h\nf\nshowpage\n"));
    }

    #[test]
    fn test_quadratics_are_raised() {
        let mut canvas = Canvas::new();
        canvas.move_to(0.0, 0.0);
        canvas.quad_to(&QuadraticBezierParams {
            cpx: 50.0,
            cpy: 100.0,
            x: 100.0,
            y: 0.0,
        });
        canvas.fill();
        let text = encode(canvas);
        assert_eq!(text.lines().filter(|l| l.ends_with(" c")).count(), 1);
    }

    #[test]
    fn test_even_odd_fill() {
        let mut canvas = Canvas::new();
        canvas.set_winding_rule(WindingRule::EvenOdd);
        canvas.rect(0.0, 0.0, 10.0, 10.0);
        canvas.fill();
        assert!(encode(canvas).contains("h\nef\n"));
    }
}
