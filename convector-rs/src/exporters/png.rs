//! PNG encoder. Splashes are rasterized with `tiny-skia` onto a white page
//! at the drawing's own size, one pixel per drawing unit.

use convector_core::{
    Color, ConvectorError, ConvectorResult, ExportFlags, Exporter, Segment, WindingRule,
};
use std::io::Write;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

pub struct PngExporter {
    pixmap: Option<Pixmap>,
    scale: f32,
    paint: Paint<'static>,
    rule: FillRule,
    builder: PathBuilder,
}

impl Default for PngExporter {
    fn default() -> Self {
        Self {
            pixmap: None,
            scale: 1.0,
            paint: Paint::default(),
            rule: FillRule::Winding,
            builder: PathBuilder::new(),
        }
    }
}

impl PngExporter {
    pub fn new() -> Self {
        Self::default()
    }
}

fn raster_error(e: impl std::fmt::Display) -> ConvectorError {
    ConvectorError::RasterError(e.to_string())
}

/// Pixel count for one side of the image; never zero.
fn pixels(side: f64) -> u32 {
    side.ceil().clamp(1.0, u32::MAX as f64) as u32
}

impl Exporter for PngExporter {
    fn flags(&self) -> ExportFlags {
        ExportFlags::NONE
    }

    fn write_header(
        &mut self,
        _out: &mut dyn Write,
        width: f64,
        height: f64,
        inverse_scale: f64,
    ) -> ConvectorResult<()> {
        // Normalization leaves rounding noise in the last digits
        let (w, h) = (
            pixels(width * inverse_scale - 1e-6),
            pixels(height * inverse_scale - 1e-6),
        );
        let mut pixmap = Pixmap::new(w, h)
            .ok_or_else(|| raster_error(format!("cannot allocate a {}x{} image", w, h)))?;
        pixmap.fill(tiny_skia::Color::WHITE);
        log::debug!(target: "export", "rasterizing at {}x{}", w, h);
        self.pixmap = Some(pixmap);
        self.scale = inverse_scale as f32;
        Ok(())
    }

    fn write_color(&mut self, _out: &mut dyn Write, color: Color) -> ConvectorResult<()> {
        self.paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        self.paint.anti_alias = true;
        Ok(())
    }

    fn write_rule(&mut self, _out: &mut dyn Write, rule: WindingRule) -> ConvectorResult<()> {
        self.rule = match rule {
            WindingRule::NonZero => FillRule::Winding,
            WindingRule::EvenOdd => FillRule::EvenOdd,
        };
        Ok(())
    }

    fn write_segment(&mut self, _out: &mut dyn Write, segment: &Segment) -> ConvectorResult<()> {
        let b = &mut self.builder;
        match *segment {
            Segment::MoveTo(p) => b.move_to(p.x as f32, p.y as f32),
            Segment::LineTo(p) => b.line_to(p.x as f32, p.y as f32),
            Segment::QuadTo(c, p) => b.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            Segment::CubicTo(c1, c2, p) => b.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            Segment::Close(_) => b.close(),
        }
        Ok(())
    }

    fn end_splash(&mut self, _out: &mut dyn Write) -> ConvectorResult<()> {
        let builder = std::mem::replace(&mut self.builder, PathBuilder::new());
        let (Some(path), Some(pixmap)) = (builder.finish(), self.pixmap.as_mut()) else {
            return Ok(());
        };
        pixmap.fill_path(
            &path,
            &self.paint,
            self.rule,
            Transform::from_scale(self.scale, self.scale),
            None,
        );
        Ok(())
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        let pixmap = self
            .pixmap
            .take()
            .ok_or_else(|| raster_error("footer before header"))?;
        let mut encoder = png::Encoder::new(out, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(raster_error)?;
        // The page is opaque, so premultiplied pixels are already straight
        writer
            .write_image_data(pixmap.data())
            .map_err(raster_error)?;
        writer.finish().map_err(raster_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convector_core::{export, Canvas, ExportOptions};

    fn encode(canvas: Canvas) -> image::RgbaImage {
        let mut out = Vec::new();
        export(
            &mut PngExporter::new(),
            canvas.into_drawing(),
            &ExportOptions::default(),
            &mut out,
        )
        .unwrap();
        image::load_from_memory_with_format(&out, image::ImageFormat::Png)
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn test_size_and_colors() {
        let mut canvas = Canvas::new();
        canvas.set_color(Color::rgb(255, 0, 0));
        canvas.rect(0.0, 0.0, 40.0, 20.0);
        canvas.fill();
        canvas.set_color(Color::rgb(0, 0, 255));
        canvas.rect(20.0, 0.0, 20.0, 10.0);
        canvas.fill();
        let img = encode(canvas);
        assert_eq!(img.dimensions(), (40, 20));
        assert_eq!(img.get_pixel(5, 15).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(30, 5).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_background_is_white() {
        let mut canvas = Canvas::new();
        canvas.set_winding_rule(WindingRule::EvenOdd);
        canvas.rect(0.0, 0.0, 30.0, 30.0);
        canvas.rect(10.0, 10.0, 10.0, 10.0);
        canvas.fill();
        let img = encode(canvas);
        assert_eq!(img.get_pixel(15, 15).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(5, 5).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_empty_drawing_is_one_pixel() {
        let img = encode(Canvas::new());
        assert_eq!(img.dimensions(), (1, 1));
    }
}
