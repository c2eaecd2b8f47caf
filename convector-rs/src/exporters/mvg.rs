//! ImageMagick vector graphics (MVG) encoder.

use super::decimal;
use convector_core::{
    Color, ConvectorResult, ExportFlags, Exporter, SegmentTemplates, WindingRule,
};
use std::io::Write;

const TEMPLATES: SegmentTemplates = SegmentTemplates {
    move_to: "M%,% ",
    line_to: "L%,% ",
    quad_to: Some("Q%,% %,% "),
    cubic_to: "C%,% %,% %,% ",
    close: "Z",
};

#[derive(Debug, Default)]
pub struct MvgExporter;

impl MvgExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for MvgExporter {
    fn flags(&self) -> ExportFlags {
        ExportFlags::NONE
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
        writeln!(
            out,
            "viewbox 0 0 {} {}",
            (width * inverse_scale).round(),
            (height * inverse_scale).round()
        )?;
        let s = decimal(inverse_scale, 9);
        writeln!(out, "affine {} 0 0 {} 0 0", s, s)?;
        Ok(())
    }

    fn write_color(&mut self, out: &mut dyn Write, color: Color) -> ConvectorResult<()> {
        writeln!(out, "fill '{}'", color)?;
        if color.a < 255 {
            writeln!(out, "fill-opacity {}", decimal(color.alpha(), 3))?;
        }
        Ok(())
    }

    fn write_rule(&mut self, out: &mut dyn Write, rule: WindingRule) -> ConvectorResult<()> {
        let rule = match rule {
            WindingRule::NonZero => "nonzero",
            WindingRule::EvenOdd => "evenodd",
        };
        write!(out, "fill-rule {}\npath '", rule)?;
        Ok(())
    }

    fn end_splash(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        out.write_all(b"'\n")?;
        Ok(())
    }

    fn write_footer(&mut self, _out: &mut dyn Write) -> ConvectorResult<()> {
        Ok(())
    }
}
