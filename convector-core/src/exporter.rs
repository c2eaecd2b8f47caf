//! Export pipeline: normalizes a finished drawing and streams it to a format
//! encoder through header/color/segment/footer callbacks.

use crate::drawing::Drawing;
use crate::error::{ConvectorError, ConvectorResult};
use crate::style::{Color, WindingRule};
use kurbo::{Affine, PathEl, Point, QuadBez};
use std::io::Write;
use std::ops::BitOr;

/// Normalized extent: the larger side of the drawing is scaled to this size.
pub const EXTENT: f64 = 65535.0;

/// Default flattening tolerance, in normalized units.
pub const DEFAULT_FLATNESS: f64 = 1.0;

/// Pipeline steps an exporter asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportFlags(u8);

impl ExportFlags {
    pub const NONE: ExportFlags = ExportFlags(0);
    /// Flip vertically: the target's Y axis runs opposite to device space.
    pub const REVERSE: ExportFlags = ExportFlags(1);
    /// Approximate curves with line segments.
    pub const FLATTEN: ExportFlags = ExportFlags(2);
    /// Reorder splashes to shorten pen travel.
    pub const SHORTEN: ExportFlags = ExportFlags(4);
    /// Merge layers into disjoint regions.
    pub const MERGE: ExportFlags = ExportFlags(8);
    /// Raise quadratic segments to cubics.
    pub const ELEVATE: ExportFlags = ExportFlags(16);

    pub fn contains(self, other: ExportFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ExportFlags {
    type Output = ExportFlags;

    fn bitor(self, rhs: ExportFlags) -> ExportFlags {
        ExportFlags(self.0 | rhs.0)
    }
}

/// Export settings shared by all formats.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Maximum deviation of flattened curves, in normalized units.
    pub flatness: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            flatness: DEFAULT_FLATNESS,
        }
    }
}

/// A path segment in normalized output space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    /// Close the subpath that started at the given point.
    Close(Point),
}

impl Segment {
    /// Points of the segment in template order.
    pub fn points(&self) -> Vec<Point> {
        match *self {
            Segment::MoveTo(p) | Segment::LineTo(p) | Segment::Close(p) => vec![p],
            Segment::QuadTo(c, p) => vec![c, p],
            Segment::CubicTo(c1, c2, p) => vec![c1, c2, p],
        }
    }

    /// End point of the segment.
    pub fn end(&self) -> Point {
        match *self {
            Segment::MoveTo(p)
            | Segment::LineTo(p)
            | Segment::Close(p)
            | Segment::QuadTo(_, p)
            | Segment::CubicTo(_, _, p) => p,
        }
    }
}

/// Text templates for each segment kind; each `%` takes the next coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTemplates {
    pub move_to: &'static str,
    pub line_to: &'static str,
    /// `None` for targets without quadratic curves; pair with
    /// `ExportFlags::ELEVATE`.
    pub quad_to: Option<&'static str>,
    pub cubic_to: &'static str,
    pub close: &'static str,
}

impl SegmentTemplates {
    pub fn template(&self, segment: &Segment) -> Option<&'static str> {
        match segment {
            Segment::MoveTo(_) => Some(self.move_to),
            Segment::LineTo(_) => Some(self.line_to),
            Segment::QuadTo(_, _) => self.quad_to,
            Segment::CubicTo(_, _, _) => Some(self.cubic_to),
            Segment::Close(_) => Some(self.close),
        }
    }
}

/// Replace each `%` in `template` with the next coordinate, rounded to an
/// integer. Surplus placeholders are dropped.
pub fn substitute(template: &str, points: &[Point]) -> String {
    let mut values = points.iter().flat_map(|p| [p.x, p.y]);
    let mut out = String::with_capacity(template.len() + points.len() * 12);
    for ch in template.chars() {
        if ch == '%' {
            if let Some(v) = values.next() {
                out.push_str(&(v.round() as i64).to_string());
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// A format encoder driven by [`export`].
pub trait Exporter {
    /// Pipeline steps this format needs.
    fn flags(&self) -> ExportFlags;

    /// Templates used by the default `write_segment`.
    fn templates(&self) -> Option<SegmentTemplates> {
        None
    }

    /// Called once with the normalized size and the factor mapping
    /// normalized units back to drawing units.
    fn write_header(
        &mut self,
        out: &mut dyn Write,
        width: f64,
        height: f64,
        inverse_scale: f64,
    ) -> ConvectorResult<()>;

    /// Called at the start of every splash.
    fn write_color(&mut self, out: &mut dyn Write, color: Color) -> ConvectorResult<()>;

    /// Winding rule of the splash, right after its color.
    fn write_rule(&mut self, _out: &mut dyn Write, _rule: WindingRule) -> ConvectorResult<()> {
        Ok(())
    }

    /// Write one segment. The default substitutes the format's templates.
    fn write_segment(&mut self, out: &mut dyn Write, segment: &Segment) -> ConvectorResult<()> {
        let templates = self.templates().ok_or_else(|| {
            ConvectorError::UnsupportedOperator("exporter has no segment templates".to_string())
        })?;
        let template = templates.template(segment).ok_or_else(|| {
            ConvectorError::UnsupportedOperator(format!("no template for {:?}", segment))
        })?;
        out.write_all(substitute(template, &segment.points()).as_bytes())?;
        Ok(())
    }

    /// Called after the last segment of every splash.
    fn end_splash(&mut self, _out: &mut dyn Write) -> ConvectorResult<()> {
        Ok(())
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()>;
}

/// Transform from drawing space to normalized output space, with the
/// scale factor applied.
pub fn normalization(bounds: kurbo::Rect, reverse: bool) -> (Affine, f64) {
    let extent = bounds.width().max(bounds.height());
    let scale = if extent > 0.0 { EXTENT / extent } else { 1.0 };
    let affine = if reverse {
        Affine::new([scale, 0.0, 0.0, -scale, -bounds.x0 * scale, bounds.y1 * scale])
    } else {
        Affine::new([scale, 0.0, 0.0, scale, -bounds.x0 * scale, -bounds.y0 * scale])
    };
    (affine, scale)
}

/// Run the export pipeline, consuming the drawing.
pub fn export(
    exporter: &mut dyn Exporter,
    mut drawing: Drawing,
    options: &ExportOptions,
    out: &mut dyn Write,
) -> ConvectorResult<()> {
    let flags = exporter.flags();
    if flags.contains(ExportFlags::MERGE) {
        drawing.merge_layers();
    }
    if flags.contains(ExportFlags::SHORTEN) {
        drawing.optimize();
    }

    let Some(bounds) = drawing.bounds() else {
        log::debug!(target: "export", "empty drawing");
        exporter.write_header(out, 0.0, 0.0, 1.0)?;
        return exporter.write_footer(out);
    };
    let (affine, scale) = normalization(bounds, flags.contains(ExportFlags::REVERSE));
    log::debug!(target: "export", "bounds {:?} scale {}", bounds, scale);
    exporter.write_header(out, bounds.width() * scale, bounds.height() * scale, 1.0 / scale)?;

    let flatness = if options.flatness > 0.0 {
        options.flatness
    } else {
        DEFAULT_FLATNESS
    };
    for splash in drawing.into_splashes() {
        exporter.write_color(out, splash.color)?;
        exporter.write_rule(out, splash.region.rule())?;
        let mut path = splash.region.into_path();
        path.apply_affine(affine);
        let elements: Vec<PathEl> = if flags.contains(ExportFlags::FLATTEN) {
            let mut flat = Vec::new();
            kurbo::flatten(path.iter(), flatness, |el| flat.push(el));
            flat
        } else {
            path.elements().to_vec()
        };
        for segment in segments(&elements, flags.contains(ExportFlags::ELEVATE)) {
            exporter.write_segment(out, &segment)?;
        }
        exporter.end_splash(out)?;
    }
    exporter.write_footer(out)
}

/// Convert path elements to segments, tracking subpath starts for `Close`.
fn segments(elements: &[PathEl], elevate: bool) -> Vec<Segment> {
    let mut result = Vec::with_capacity(elements.len());
    let mut start = Point::ORIGIN;
    let mut last = Point::ORIGIN;
    for el in elements {
        let segment = match *el {
            PathEl::MoveTo(p) => {
                start = p;
                Segment::MoveTo(p)
            }
            PathEl::LineTo(p) => Segment::LineTo(p),
            PathEl::QuadTo(c, p) if elevate => {
                let cubic = QuadBez::new(last, c, p).raise();
                Segment::CubicTo(cubic.p1, cubic.p2, p)
            }
            PathEl::QuadTo(c, p) => Segment::QuadTo(c, p),
            PathEl::CurveTo(c1, c2, p) => Segment::CubicTo(c1, c2, p),
            PathEl::ClosePath => Segment::Close(start),
        };
        last = segment.end();
        result.push(segment);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_rounds_coordinates() {
        let s = substitute("C%,% %,%", &[Point::new(1.4, 1.6), Point::new(-2.5, 3.0)]);
        assert_eq!(s, "C1,2 -3,3");
    }

    #[test]
    fn test_substitute_drops_surplus_placeholders() {
        assert_eq!(substitute("% % %", &[Point::new(1.0, 2.0)]), "1 2 ");
        assert_eq!(substitute("Z", &[Point::new(1.0, 2.0)]), "Z");
    }

    #[test]
    fn test_flags_combine() {
        let flags = ExportFlags::MERGE | ExportFlags::SHORTEN;
        assert!(flags.contains(ExportFlags::MERGE));
        assert!(flags.contains(ExportFlags::SHORTEN));
        assert!(!flags.contains(ExportFlags::REVERSE));
        assert!(flags.contains(ExportFlags::NONE));
    }

    #[test]
    fn test_normalization_maps_long_side_to_extent() {
        let bounds = kurbo::Rect::new(10.0, 20.0, 110.0, 70.0);
        let (affine, scale) = normalization(bounds, false);
        assert_eq!(scale, EXTENT / 100.0);
        assert_eq!(affine * Point::new(10.0, 20.0), Point::new(0.0, 0.0));
        let far = affine * Point::new(110.0, 70.0);
        assert!((far.x - EXTENT).abs() < 1e-9);
        assert!((far.y - EXTENT / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_reverse_normalization_flips() {
        let bounds = kurbo::Rect::new(0.0, 0.0, 100.0, 100.0);
        let (affine, _) = normalization(bounds, true);
        let top = affine * Point::new(0.0, 0.0);
        assert!((top.y - EXTENT).abs() < 1e-9);
        let bottom = affine * Point::new(0.0, 100.0);
        assert!(bottom.y.abs() < 1e-9);
    }

    #[test]
    fn test_segments_close_carries_start_and_quads_elevate() {
        let elements = [
            PathEl::MoveTo(Point::new(1.0, 1.0)),
            PathEl::QuadTo(Point::new(2.0, 2.0), Point::new(3.0, 1.0)),
            PathEl::ClosePath,
        ];
        let plain = segments(&elements, false);
        assert_eq!(plain[2], Segment::Close(Point::new(1.0, 1.0)));
        assert!(matches!(plain[1], Segment::QuadTo(_, _)));
        let raised = segments(&elements, true);
        assert!(matches!(raised[1], Segment::CubicTo(_, _, p) if p == Point::new(3.0, 1.0)));
    }
}
