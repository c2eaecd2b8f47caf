//! PDF encoder: a single page whose content stream paints every splash.
//!
//! `pdf-writer` records object offsets as it writes and emits the
//! cross-reference table from them.

use convector_core::{
    Color, ConvectorError, ConvectorResult, ExportFlags, Exporter, Segment, WindingRule,
};
use pdf_writer::{Content, Finish, Pdf, Rect, Ref};
use std::io::Write;

pub struct PdfExporter {
    content: Content,
    size: (f32, f32),
    rule: WindingRule,
}

impl Default for PdfExporter {
    fn default() -> Self {
        Self {
            content: Content::new(),
            size: (0.0, 0.0),
            rule: WindingRule::NonZero,
        }
    }
}

impl PdfExporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Exporter for PdfExporter {
    fn flags(&self) -> ExportFlags {
        ExportFlags::REVERSE | ExportFlags::ELEVATE
    }

    fn write_header(
        &mut self,
        _out: &mut dyn Write,
        width: f64,
        height: f64,
        inverse_scale: f64,
    ) -> ConvectorResult<()> {
        self.size = (
            (width * inverse_scale) as f32,
            (height * inverse_scale) as f32,
        );
        let s = inverse_scale as f32;
        self.content.transform([s, 0.0, 0.0, s, 0.0, 0.0]);
        Ok(())
    }

    fn write_color(&mut self, _out: &mut dyn Write, color: Color) -> ConvectorResult<()> {
        let (r, g, b) = color.to_unit_rgb();
        self.content.set_fill_rgb(r as f32, g as f32, b as f32);
        Ok(())
    }

    fn write_rule(&mut self, _out: &mut dyn Write, rule: WindingRule) -> ConvectorResult<()> {
        self.rule = rule;
        Ok(())
    }

    fn write_segment(&mut self, _out: &mut dyn Write, segment: &Segment) -> ConvectorResult<()> {
        // Normalized coordinates stay integral, as in the text formats
        let r = |v: f64| v.round() as f32;
        match *segment {
            Segment::MoveTo(p) => {
                self.content.move_to(r(p.x), r(p.y));
            }
            Segment::LineTo(p) => {
                self.content.line_to(r(p.x), r(p.y));
            }
            Segment::QuadTo(_, _) => {
                return Err(ConvectorError::UnsupportedOperator(
                    "quadratic segment in PDF output".to_string(),
                ))
            }
            Segment::CubicTo(c1, c2, p) => {
                self.content
                    .cubic_to(r(c1.x), r(c1.y), r(c2.x), r(c2.y), r(p.x), r(p.y));
            }
            Segment::Close(_) => {
                self.content.close_path();
            }
        }
        Ok(())
    }

    fn end_splash(&mut self, _out: &mut dyn Write) -> ConvectorResult<()> {
        match self.rule {
            WindingRule::NonZero => self.content.fill_nonzero(),
            WindingRule::EvenOdd => self.content.fill_even_odd(),
        };
        Ok(())
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        let content = std::mem::replace(&mut self.content, Content::new()).finish();
        let (width, height) = self.size;
        let catalog_id = Ref::new(1);
        let page_tree_id = Ref::new(2);
        let page_id = Ref::new(3);
        let content_id = Ref::new(4);

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(page_tree_id);
        pdf.pages(page_tree_id).kids([page_id]).count(1);

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, width.max(1.0), height.max(1.0)));
        page.parent(page_tree_id);
        page.contents(content_id);
        page.finish();

        pdf.stream(content_id, &content);
        out.write_all(&pdf.finish())?;
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
            &mut PdfExporter::new(),
            canvas.into_drawing(),
            &ExportOptions::default(),
            &mut out,
        )
        .unwrap();
        out
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    #[test]
    fn test_document_structure() {
        let mut canvas = Canvas::new();
        canvas.set_color(Color::rgb(0, 0, 255));
        canvas.rect(0.0, 0.0, 200.0, 100.0);
        canvas.fill();
        let pdf = encode(canvas);
        assert!(pdf.starts_with(b"%PDF-"));
        assert!(contains(&pdf, "/MediaBox"));
        assert!(contains(&pdf, "0 0 200 100]"));
        assert!(contains(&pdf, "xref"));
        assert!(contains(&pdf, "%%EOF"));
    }

    #[test]
    fn test_content_stream_paints() {
        let mut exporter = PdfExporter::new();
        let mut sink = Vec::new();
        exporter.write_header(&mut sink, 65535.0, 65535.0, 10.0 / 65535.0).unwrap();
        exporter.write_color(&mut sink, Color::BLACK).unwrap();
        exporter.write_rule(&mut sink, WindingRule::EvenOdd).unwrap();
        exporter
            .write_segment(&mut sink, &Segment::MoveTo(convector_core::kurbo::Point::new(1.0, 2.0)))
            .unwrap();
        exporter.end_splash(&mut sink).unwrap();
        let content = std::mem::replace(&mut exporter.content, Content::new()).finish();
        let text = String::from_utf8(content).unwrap();
        assert!(text.contains("0 0 0 rg"));
        assert!(text.contains("1 2 m"));
        assert!(text.contains("f*"));
        // Nothing reaches the output before the footer
        assert!(sink.is_empty());
    }

    #[test]
    fn test_empty_drawing_is_a_valid_page() {
        let pdf = encode(Canvas::new());
        assert!(contains(&pdf, "0 0 1 1]"));
    }
}
