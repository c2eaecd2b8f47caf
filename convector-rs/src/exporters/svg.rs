//! SVG encoder: one filled `<path>` per splash, in normalized units under a
//! `viewBox` sized to the drawing.

use super::decimal;
use convector_core::{
    Color, ConvectorResult, ExportFlags, Exporter, SegmentTemplates, WindingRule,
};
use std::io::Write;

const TEMPLATES: SegmentTemplates = SegmentTemplates {
    move_to: "M%,%",
    line_to: "L%,%",
    quad_to: Some("Q%,% %,%"),
    cubic_to: "C%,% %,% %,%",
    close: "Z",
};

#[derive(Debug, Default)]
pub struct SvgExporter {
    color: Color,
}

impl SvgExporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Exporter for SvgExporter {
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
        out.write_all(b"<?xml version='1.0' encoding='UTF-8' standalone='no'?>\n")?;
        out.write_all(b"<!DOCTYPE svg PUBLIC '-//W3C//DTD SVG 1.0//EN' ")?;
        out.write_all(b"'http://www.w3.org/TR/2001/REC-SVG-20010904/DTD/svg10.dtd'>\n")?;
        out.write_all(b"<!-- Generated by ConVector -->\n")?;
        writeln!(
            out,
            "<svg xmlns='http://www.w3.org/2000/svg' width='{}' height='{}' viewBox='0 0 {} {}'>",
            decimal(width * inverse_scale, 3),
            decimal(height * inverse_scale, 3),
            width.round(),
            height.round()
        )?;
        Ok(())
    }

    fn write_color(&mut self, _out: &mut dyn Write, color: Color) -> ConvectorResult<()> {
        self.color = color;
        Ok(())
    }

    fn write_rule(&mut self, out: &mut dyn Write, rule: WindingRule) -> ConvectorResult<()> {
        let rule = match rule {
            WindingRule::NonZero => "nonzero",
            WindingRule::EvenOdd => "evenodd",
        };
        write!(out, "<path style='fill:{};fill-rule:{}", self.color, rule)?;
        if self.color.a < 255 {
            write!(out, ";fill-opacity:{}", decimal(self.color.alpha(), 3))?;
        }
        write!(out, ";stroke:none' d='")?;
        Ok(())
    }

    fn end_splash(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        out.write_all(b"'/>\n")?;
        Ok(())
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        out.write_all(b"</svg>\n")?;
        Ok(())
    }
}
