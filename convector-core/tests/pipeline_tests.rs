//! End-to-end tests: canvas operations through the export pipeline.

use convector_core::kurbo::{CubicBez, ParamCurve, Point};
use convector_core::{
    export, ArcToParams, Canvas, Color, ConvectorResult, CubicBezierParams, Drawing, ExportFlags,
    ExportOptions, Exporter, Segment, SegmentTemplates, WindingRule, EXTENT,
};
use rstest::rstest;
use std::io::Write;

/// Records every callback for inspection.
#[derive(Default)]
struct RecordingExporter {
    flags: ExportFlags,
    header: Option<(f64, f64, f64)>,
    colors: Vec<Color>,
    rules: Vec<WindingRule>,
    segments: Vec<Segment>,
    footer: bool,
}

impl RecordingExporter {
    fn with_flags(flags: ExportFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }
}

impl Exporter for RecordingExporter {
    fn flags(&self) -> ExportFlags {
        self.flags
    }

    fn write_header(
        &mut self,
        _out: &mut dyn Write,
        width: f64,
        height: f64,
        inverse_scale: f64,
    ) -> ConvectorResult<()> {
        self.header = Some((width, height, inverse_scale));
        Ok(())
    }

    fn write_color(&mut self, _out: &mut dyn Write, color: Color) -> ConvectorResult<()> {
        self.colors.push(color);
        Ok(())
    }

    fn write_rule(&mut self, _out: &mut dyn Write, rule: WindingRule) -> ConvectorResult<()> {
        self.rules.push(rule);
        Ok(())
    }

    fn write_segment(&mut self, _out: &mut dyn Write, segment: &Segment) -> ConvectorResult<()> {
        self.segments.push(*segment);
        Ok(())
    }

    fn write_footer(&mut self, _out: &mut dyn Write) -> ConvectorResult<()> {
        self.footer = true;
        Ok(())
    }
}

/// Text exporter relying on the default template substitution.
struct TemplateExporter;

impl Exporter for TemplateExporter {
    fn flags(&self) -> ExportFlags {
        ExportFlags::NONE
    }

    fn templates(&self) -> Option<SegmentTemplates> {
        Some(SegmentTemplates {
            move_to: "M%,%",
            line_to: "L%,%",
            quad_to: Some("Q%,% %,%"),
            cubic_to: "C%,% %,% %,%",
            close: "Z",
        })
    }

    fn write_header(
        &mut self,
        out: &mut dyn Write,
        width: f64,
        height: f64,
        _inverse_scale: f64,
    ) -> ConvectorResult<()> {
        write!(out, "{}x{}", width.round(), height.round())?;
        Ok(())
    }

    fn write_color(&mut self, out: &mut dyn Write, color: Color) -> ConvectorResult<()> {
        write!(out, "|{}:", color)?;
        Ok(())
    }

    fn write_footer(&mut self, out: &mut dyn Write) -> ConvectorResult<()> {
        write!(out, "|")?;
        Ok(())
    }
}

fn red_square_drawing() -> Drawing {
    let mut canvas = Canvas::new();
    canvas.set_color(Color::rgb(255, 0, 0));
    canvas.rect(10.0, 10.0, 100.0, 50.0);
    canvas.fill();
    canvas.into_drawing()
}

/// Template substitution writes rounded normalized coordinates
#[test]
fn test_template_export() {
    let mut out = Vec::new();
    export(
        &mut TemplateExporter,
        red_square_drawing(),
        &ExportOptions::default(),
        &mut out,
    )
    .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        "65535x32768|#ff0000:M0,0L65535,0L65535,32768L0,32768Z|"
    );
}

/// The larger bounding box side maps to the normalized extent
#[rstest]
#[case(100.0, 50.0)]
#[case(3.0, 70.0)]
#[case(1000.0, 1000.0)]
fn test_larger_side_maps_to_extent(#[case] width: f64, #[case] height: f64) {
    let mut canvas = Canvas::new();
    canvas.rect(-5.0, 7.0, width, height);
    canvas.fill();
    let mut exporter = RecordingExporter::default();
    export(
        &mut exporter,
        canvas.into_drawing(),
        &ExportOptions::default(),
        &mut std::io::sink(),
    )
    .unwrap();
    let (w, h, inverse) = exporter.header.unwrap();
    assert!((w.max(h) - EXTENT).abs() < 1e-6);
    assert!((inverse - width.max(height) / EXTENT).abs() < 1e-12);
    let max_x = exporter
        .segments
        .iter()
        .map(|s| s.end().x)
        .fold(f64::MIN, f64::max);
    let max_y = exporter
        .segments
        .iter()
        .map(|s| s.end().y)
        .fold(f64::MIN, f64::max);
    assert!((max_x.max(max_y) - EXTENT).abs() < 1e-6);
}

/// Reverse export flips the drawing vertically
#[test]
fn test_reverse_flag_flips_y() {
    let mut exporter = RecordingExporter::with_flags(ExportFlags::REVERSE);
    export(
        &mut exporter,
        red_square_drawing(),
        &ExportOptions::default(),
        &mut std::io::sink(),
    )
    .unwrap();
    // The top-left corner of the rectangle ends up at the top of the output
    match exporter.segments[0] {
        Segment::MoveTo(p) => {
            assert!(p.x.abs() < 1e-6);
            assert!((p.y - EXTENT / 2.0).abs() < 1e-6);
        }
        other => panic!("unexpected {:?}", other),
    }
}

/// Flattened curves stay within the flatness tolerance
#[rstest]
#[case(1.0)]
#[case(10.0)]
#[case(100.0)]
fn test_flatten_respects_tolerance(#[case] flatness: f64) {
    let mut canvas = Canvas::new();
    canvas.set_line_width(0.0);
    canvas.move_to(0.0, 0.0);
    canvas.curve_to(&CubicBezierParams {
        cp1x: 0.0,
        cp1y: 100.0,
        cp2x: 100.0,
        cp2y: 100.0,
        x: 100.0,
        y: 0.0,
    });
    canvas.close_path();
    canvas.fill();

    let mut exporter = RecordingExporter::with_flags(ExportFlags::FLATTEN);
    export(
        &mut exporter,
        canvas.into_drawing(),
        &ExportOptions { flatness },
        &mut std::io::sink(),
    )
    .unwrap();
    let polyline: Vec<Point> = exporter
        .segments
        .iter()
        .map(|s| match s {
            Segment::MoveTo(p) | Segment::LineTo(p) => *p,
            Segment::Close(p) => *p,
            other => panic!("curve left after flattening: {:?}", other),
        })
        .collect();

    // Same curve in normalized space: bounds are 100 x 75
    let scale = EXTENT / 100.0;
    let curve = CubicBez::new(
        (0.0, 0.0),
        (0.0, 100.0 * scale),
        (100.0 * scale, 100.0 * scale),
        (100.0 * scale, 0.0),
    );
    for i in 0..=200 {
        let p = curve.eval(i as f64 / 200.0);
        let distance = polyline
            .windows(2)
            .map(|w| distance_to_segment(p, w[0], w[1]))
            .fold(f64::INFINITY, f64::min);
        assert!(distance <= flatness + 1e-6, "deviation {} > {}", distance, flatness);
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 == 0.0 {
        return (p - a).hypot();
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).hypot()
}

/// Merge and shorten run before normalization
#[test]
fn test_merge_and_shorten_flags() {
    let mut canvas = Canvas::new();
    canvas.set_color(Color::rgb(255, 0, 0));
    canvas.rect(10.0, 10.0, 10.0, 10.0);
    canvas.fill();
    canvas.reset_path();
    canvas.set_color(Color::rgb(0, 0, 255));
    canvas.rect(0.0, 0.0, 30.0, 30.0);
    canvas.fill();
    canvas.reset_path();
    canvas.set_color(Color::rgb(0, 255, 0));
    canvas.rect(100.0, 100.0, 5.0, 5.0);
    canvas.fill();

    let mut exporter = RecordingExporter::with_flags(ExportFlags::MERGE | ExportFlags::SHORTEN);
    export(
        &mut exporter,
        canvas.into_drawing(),
        &ExportOptions::default(),
        &mut std::io::sink(),
    )
    .unwrap();
    assert_eq!(
        exporter.colors,
        vec![Color::rgb(0, 0, 255), Color::rgb(0, 255, 0)]
    );
    assert_eq!(exporter.rules.len(), 2);
    assert!(exporter.footer);
}

/// An empty drawing still gets a header and footer
#[test]
fn test_empty_drawing_export() {
    let mut exporter = RecordingExporter::default();
    export(
        &mut exporter,
        Drawing::new(),
        &ExportOptions::default(),
        &mut std::io::sink(),
    )
    .unwrap();
    assert_eq!(exporter.header, Some((0.0, 0.0, 1.0)));
    assert!(exporter.segments.is_empty());
    assert!(exporter.footer);
}

/// Half circle from arcTo exports with the expected aspect
#[test]
fn test_arc_half_circle_export() {
    let mut canvas = Canvas::new();
    canvas.move_to(0.0, 0.0);
    canvas.arc_to(&ArcToParams {
        rx: 50.0,
        ry: 50.0,
        x_axis_rotation: 0.0,
        large_arc: false,
        sweep: true,
        x: 100.0,
        y: 0.0,
    });
    canvas.close_path();
    canvas.fill();
    let mut exporter = RecordingExporter::default();
    export(
        &mut exporter,
        canvas.into_drawing(),
        &ExportOptions::default(),
        &mut std::io::sink(),
    )
    .unwrap();
    let (w, h, _) = exporter.header.unwrap();
    assert!((w - EXTENT).abs() < 1e-6);
    assert!((h - EXTENT / 2.0).abs() < 1.0);
}
