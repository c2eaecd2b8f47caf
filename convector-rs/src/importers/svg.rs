//! SVG decoder.
//!
//! The document tree is walked once. Every shape element saves the graphics
//! state, applies its presentation attributes, builds its outline, fills and
//! strokes it, then restores.

use super::{text, Importer};
use convector_core::kurbo::Point;
use convector_core::{
    ArcToParams, Canvas, Color, ConvectorError, ConvectorResult, CubicBezierParams, LineCap,
    LineJoin, Mode, Paint, QuadraticBezierParams, Transform, WindingRule,
};
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::HashMap;
use std::str::FromStr;

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// `use` references nested deeper than this are dropped.
const MAX_USE_DEPTH: usize = 16;

/// Elements that only define resources.
const NOT_RENDERED: &[&str] = &[
    "defs",
    "symbol",
    "clipPath",
    "mask",
    "marker",
    "pattern",
    "linearGradient",
    "radialGradient",
    "style",
    "title",
    "desc",
    "metadata",
];

/// Presentation attributes, in the order they are applied.
const PROPERTIES: &[&str] = &[
    "display",
    "fill",
    "stroke",
    "fill-rule",
    "stroke-width",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-dasharray",
    "stroke-dashoffset",
    "opacity",
    "fill-opacity",
    "stroke-opacity",
    "font-family",
    "font-size",
    "stop-color",
    "stop-opacity",
];

lazy_static! {
    static ref FONT_SIZES: HashMap<&'static str, f64> = [
        ("xx-small", 125.0 / 18.0),
        ("x-small", 25.0 / 3.0),
        ("small", 10.0),
        ("medium", 12.0),
        ("large", 14.4),
        ("x-large", 17.28),
        ("xx-large", 20.736),
    ]
    .into_iter()
    .collect();
}

/// Presentation attributes then inline `style` declarations of one element.
/// Later entries win.
struct Declarations<'a>(Vec<(&'a str, &'a str)>);

impl<'a> Declarations<'a> {
    fn of(node: Node<'a, '_>) -> Self {
        let mut list = Vec::new();
        for name in PROPERTIES {
            if let Some(value) = node.attribute(*name) {
                list.push((*name, value.trim()));
            }
        }
        if let Some(style) = node.attribute("style") {
            for declaration in style.split(';') {
                if let Some((name, value)) = declaration.split_once(':') {
                    list.push((name.trim(), value.trim()));
                }
            }
        }
        list.retain(|(_, value)| *value != "inherit");
        Self(list)
    }

    fn get(&self, name: &str) -> Option<&'a str> {
        self.0.iter().rev().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

/// Document-wide lookups built before rendering.
struct Context<'a, 'input> {
    ids: HashMap<&'a str, Node<'a, 'input>>,
    gradients: HashMap<&'a str, Paint>,
}

impl<'a, 'input> Context<'a, 'input> {
    fn new(doc: &'a Document<'input>) -> Self {
        let mut ids = HashMap::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            if let Some(id) = node.attribute("id") {
                ids.entry(id).or_insert(node);
            }
        }
        let mut context = Self {
            ids,
            gradients: HashMap::new(),
        };
        let gradients: Vec<_> = context
            .ids
            .iter()
            .filter(|(_, node)| {
                matches!(
                    node.tag_name().name(),
                    "linearGradient" | "radialGradient"
                )
            })
            .map(|(id, node)| (*id, context.gradient_paint(*node, 0)))
            .collect();
        context.gradients.extend(gradients);
        context
    }

    /// Linear gradients paint with their first stop; radial ones paint
    /// nothing.
    fn gradient_paint(&self, node: Node<'a, 'input>, depth: usize) -> Paint {
        if node.tag_name().name() == "radialGradient" {
            return Paint::None;
        }
        let first_stop = node
            .children()
            .find(|c| c.is_element() && c.tag_name().name() == "stop");
        if let Some(stop) = first_stop {
            let decls = Declarations::of(stop);
            let color = decls
                .get("stop-color")
                .and_then(|v| svgtypes::Color::from_str(v).ok())
                .map(convert_color)
                .unwrap_or(Color::BLACK);
            let opacity = decls.get("stop-opacity").and_then(parse_number).unwrap_or(1.0);
            return Paint::Color(color.with_opacity(opacity));
        }
        match href(node).and_then(|id| self.ids.get(id)) {
            Some(target) if depth < MAX_USE_DEPTH => self.gradient_paint(*target, depth + 1),
            _ => Paint::None,
        }
    }

    /// `uses` counts the `use` references being expanded.
    fn render(&self, node: Node<'a, 'input>, canvas: &mut Canvas, uses: usize) {
        if !node.is_element() {
            return;
        }
        let name = node.tag_name().name();
        if NOT_RENDERED.contains(&name) {
            return;
        }
        let decls = Declarations::of(node);
        if decls.get("display") == Some("none") {
            return;
        }

        canvas.save();
        if let Some(value) = node.attribute("transform") {
            apply_transform(value, canvas);
        }
        self.apply(&decls, canvas);
        if let Some(value) = node.attribute("clip-path") {
            self.apply_clip(value, canvas);
        }
        match name {
            "svg" => {
                viewport(node, canvas, node.parent_element().is_none());
                self.render_children(node, canvas, uses);
            }
            "g" | "a" | "switch" => self.render_children(node, canvas, uses),
            "use" => self.render_use(node, canvas, uses),
            "text" => {
                let mut pen = canvas.transform().apply(0.0, 0.0);
                self.render_text(node, canvas, &mut pen);
                canvas.fill();
                canvas.stroke();
            }
            _ => {
                if build_shape(node, canvas) {
                    canvas.fill();
                    canvas.stroke();
                }
            }
        }
        canvas.reset_path();
        canvas.restore();
    }

    fn render_children(&self, node: Node<'a, 'input>, canvas: &mut Canvas, uses: usize) {
        for child in node.children() {
            self.render(child, canvas, uses);
        }
    }

    fn render_use(&self, node: Node<'a, 'input>, canvas: &mut Canvas, uses: usize) {
        let Some(target) = href(node).and_then(|id| self.ids.get(id)) else {
            log::debug!(target: "import", "use without a resolvable reference skipped");
            return;
        };
        if uses >= MAX_USE_DEPTH {
            log::warn!(target: "import", "recursive use of {:?} skipped", target.attribute("id"));
            return;
        }
        canvas.translate(length_attr(node, "x", 0.0), length_attr(node, "y", 0.0));
        if target.tag_name().name() == "symbol" {
            self.render_children(*target, canvas, uses + 1);
        } else {
            self.render(*target, canvas, uses + 1);
        }
    }

    /// Append glyph outlines for a text element and its spans. `pen` is the
    /// device-space position of the next glyph.
    fn render_text(&self, node: Node<'a, 'input>, canvas: &mut Canvas, pen: &mut Point) {
        if let Some(inverse) = canvas.transform().invert() {
            let at = inverse.apply(pen.x, pen.y);
            let x = first_length(node, "x").unwrap_or(at.x);
            let y = first_length(node, "y").unwrap_or(at.y);
            *pen = canvas.transform().apply(x, y);
        }
        for child in node.children() {
            if child.is_text() {
                if let Some(content) = child.text() {
                    let content = content.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !content.is_empty() {
                        draw_text(canvas, pen, &content);
                    }
                }
            } else if child.is_element() && child.tag_name().name() == "tspan" {
                let decls = Declarations::of(child);
                if decls.get("display") == Some("none") {
                    continue;
                }
                // Paint what the parent laid out so far in its own style
                canvas.fill();
                canvas.stroke();
                canvas.reset_path();

                canvas.save();
                self.apply(&decls, canvas);
                self.render_text(child, canvas, pen);
                canvas.fill();
                canvas.stroke();
                canvas.reset_path();
                canvas.restore();
            }
        }
    }

    fn apply(&self, decls: &Declarations, canvas: &mut Canvas) {
        let em = canvas.state().font.size;
        for (name, value) in &decls.0 {
            match *name {
                "fill" => self.apply_paint(Mode::Fill, value, canvas),
                "stroke" => self.apply_paint(Mode::Stroke, value, canvas),
                "fill-rule" => canvas.set_winding_rule(match *value {
                    "evenodd" => WindingRule::EvenOdd,
                    _ => WindingRule::NonZero,
                }),
                "stroke-width" => {
                    if let Some(width) = parse_length(value, em) {
                        canvas.set_line_width(width);
                    }
                }
                "stroke-linecap" => canvas.set_line_cap(match *value {
                    "round" => LineCap::Round,
                    "square" => LineCap::Square,
                    _ => LineCap::Butt,
                }),
                "stroke-linejoin" => canvas.set_line_join(match *value {
                    "round" => LineJoin::Round,
                    "bevel" => LineJoin::Bevel,
                    _ => LineJoin::Miter,
                }),
                "stroke-miterlimit" => {
                    if let Some(limit) = parse_number(value) {
                        canvas.set_miter_limit(limit);
                    }
                }
                "stroke-dasharray" => {
                    let phase = canvas.state().stroke.dash_phase;
                    canvas.set_dash(parse_dash_array(value, em), phase);
                }
                "stroke-dashoffset" => {
                    if let Some(phase) = parse_length(value, em) {
                        let dash = canvas.state().stroke.dash.clone();
                        canvas.set_dash(dash, phase);
                    }
                }
                "font-family" => {
                    let family = value
                        .split(',')
                        .next()
                        .unwrap_or_default()
                        .trim()
                        .trim_matches(|c| c == '\'' || c == '"');
                    if !family.is_empty() {
                        canvas.set_font_family(family);
                    }
                }
                "font-size" => {
                    if let Some(size) = parse_length(value, em) {
                        canvas.set_font_size(size);
                    }
                }
                _ => {}
            }
        }

        let opacity = decls.get("opacity").and_then(parse_number).unwrap_or(1.0);
        for (mode, property) in [(Mode::Fill, "fill-opacity"), (Mode::Stroke, "stroke-opacity")] {
            let factor = opacity * decls.get(property).and_then(parse_number).unwrap_or(1.0);
            if factor >= 1.0 {
                continue;
            }
            let state = canvas.state();
            let paint = match mode {
                Mode::Fill => state.fill_paint,
                _ => state.stroke_paint,
            };
            if let Some(color) = state.resolve(paint) {
                canvas.set_paint(mode, Paint::Color(color.with_opacity(factor)));
            }
        }
    }

    fn apply_paint(&self, mode: Mode, value: &str, canvas: &mut Canvas) {
        match svgtypes::Paint::from_str(value) {
            Ok(svgtypes::Paint::None) => canvas.set_paint(mode, Paint::None),
            Ok(svgtypes::Paint::Color(color)) => {
                canvas.set_paint(mode, Paint::Color(convert_color(color)))
            }
            Ok(svgtypes::Paint::FuncIRI(url, fallback)) => {
                let paint = match self.gradients.get(url) {
                    Some(paint) => *paint,
                    None => match fallback {
                        Some(svgtypes::PaintFallback::Color(color)) => {
                            Paint::Color(convert_color(color))
                        }
                        _ => Paint::None,
                    },
                };
                canvas.set_paint(mode, paint);
            }
            Ok(other) => log::debug!(target: "import", "paint {:?} ignored", other),
            Err(e) => log::warn!(target: "import", "invalid paint {:?}: {}", value, e),
        }
    }

    /// Intersect the clip with a `clipPath` outline built in the current
    /// user space.
    fn apply_clip(&self, value: &str, canvas: &mut Canvas) {
        let Some(id) = value
            .trim()
            .strip_prefix("url(")
            .and_then(|v| v.strip_suffix(')'))
            .map(|v| v.trim().trim_start_matches('#'))
        else {
            return;
        };
        let Some(clip) = self.ids.get(id).filter(|n| n.tag_name().name() == "clipPath") else {
            log::debug!(target: "import", "clip-path {:?} not found", id);
            return;
        };
        canvas.reset_path();
        for child in clip.children().filter(|c| c.is_element()) {
            canvas.save();
            if let Some(transform) = child.attribute("transform") {
                apply_transform(transform, canvas);
            }
            build_shape(child, canvas);
            canvas.restore();
        }
        let rule = match Declarations::of(*clip).get("clip-rule") {
            Some("evenodd") => WindingRule::EvenOdd,
            _ => WindingRule::NonZero,
        };
        canvas.save();
        canvas.set_winding_rule(rule);
        let region = canvas.path_region();
        canvas.restore();
        canvas.clip(region);
        canvas.reset_path();
    }
}

#[derive(Debug, Default)]
pub struct SvgImporter;

impl SvgImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Importer for SvgImporter {
    fn process(&mut self, input: &[u8], canvas: &mut Canvas) -> ConvectorResult<()> {
        let source = text(input)?;
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(source, options)
            .map_err(|e| ConvectorError::malformed(format!("invalid XML: {}", e)))?;
        let root = doc.root_element();
        if root.tag_name().name() != "svg" {
            return Err(ConvectorError::malformed(format!(
                "root element is <{}>, expected <svg>",
                root.tag_name().name()
            )));
        }
        canvas.set_paint(Mode::Fill, Paint::Color(Color::BLACK));
        canvas.set_paint(Mode::Stroke, Paint::None);
        let context = Context::new(&doc);
        context.render(root, canvas, 0);
        Ok(())
    }
}

/// Establish the coordinate system and clip of an `svg` element.
fn viewport(node: Node, canvas: &mut Canvas, outermost: bool) {
    if !outermost {
        canvas.translate(length_attr(node, "x", 0.0), length_attr(node, "y", 0.0));
    }
    let width = node.attribute("width").and_then(|v| parse_length(v, 12.0));
    let height = node.attribute("height").and_then(|v| parse_length(v, 12.0));
    let view_box = node
        .attribute("viewBox")
        .and_then(|v| svgtypes::ViewBox::from_str(v).ok())
        .filter(|vb| vb.w > 0.0 && vb.h > 0.0);

    match view_box {
        Some(vb) => {
            let (w, h) = match (width, height) {
                (Some(w), Some(h)) => (w, h),
                (Some(w), None) => (w, vb.h * w / vb.w),
                (None, Some(h)) => (vb.w * h / vb.h, h),
                (None, None) => (vb.w, vb.h),
            };
            let scale = (w / vb.w).min(h / vb.h);
            canvas.translate((w - vb.w * scale) / 2.0, (h - vb.h * scale) / 2.0);
            canvas.scale(scale, scale);
            canvas.translate(-vb.x, -vb.y);
            clip_rect(canvas, vb.x, vb.y, vb.w, vb.h);
        }
        None => {
            if let (Some(w), Some(h)) = (width, height) {
                clip_rect(canvas, 0.0, 0.0, w, h);
            }
        }
    }
}

fn clip_rect(canvas: &mut Canvas, x: f64, y: f64, width: f64, height: f64) {
    canvas.reset_path();
    canvas.rect(x, y, width, height);
    canvas.save();
    canvas.set_winding_rule(WindingRule::NonZero);
    let region = canvas.path_region();
    canvas.restore();
    canvas.clip(region);
    canvas.reset_path();
}

fn apply_transform(value: &str, canvas: &mut Canvas) {
    match svgtypes::Transform::from_str(value) {
        Ok(t) => canvas.concat(Transform::new(t.a, t.b, t.c, t.d, t.e, t.f)),
        Err(e) => log::warn!(target: "import", "invalid transform {:?}: {}", value, e),
    }
}

/// Append a shape element's outline to the path. Returns `false` for
/// elements that are not shapes or have no geometry.
fn build_shape(node: Node, canvas: &mut Canvas) -> bool {
    match node.tag_name().name() {
        "path" => match node.attribute("d") {
            Some(data) => {
                path_data(data, canvas);
                true
            }
            None => false,
        },
        "rect" => {
            let x = length_attr(node, "x", 0.0);
            let y = length_attr(node, "y", 0.0);
            let width = length_attr(node, "width", 0.0);
            let height = length_attr(node, "height", 0.0);
            if width <= 0.0 || height <= 0.0 {
                return false;
            }
            let rx = node.attribute("rx").and_then(|v| parse_length(v, 12.0));
            let ry = node.attribute("ry").and_then(|v| parse_length(v, 12.0));
            let (rx, ry) = match (rx, ry) {
                (Some(rx), Some(ry)) => (rx, ry),
                (Some(r), None) | (None, Some(r)) => (r, r),
                (None, None) => (0.0, 0.0),
            };
            let rx = rx.clamp(0.0, width / 2.0);
            let ry = ry.clamp(0.0, height / 2.0);
            if rx == 0.0 || ry == 0.0 {
                canvas.rect(x, y, width, height);
            } else {
                rounded_rect(canvas, x, y, width, height, rx, ry);
            }
            true
        }
        "circle" => {
            let r = length_attr(node, "r", 0.0);
            ellipse(canvas, length_attr(node, "cx", 0.0), length_attr(node, "cy", 0.0), r, r)
        }
        "ellipse" => ellipse(
            canvas,
            length_attr(node, "cx", 0.0),
            length_attr(node, "cy", 0.0),
            length_attr(node, "rx", 0.0),
            length_attr(node, "ry", 0.0),
        ),
        "line" => {
            canvas.move_to(length_attr(node, "x1", 0.0), length_attr(node, "y1", 0.0));
            canvas.line_to(length_attr(node, "x2", 0.0), length_attr(node, "y2", 0.0));
            true
        }
        name @ ("polyline" | "polygon") => {
            let Some(points) = node.attribute("points") else {
                return false;
            };
            let mut any = false;
            for (x, y) in svgtypes::PointsParser::from(points) {
                if any {
                    canvas.line_to(x, y);
                } else {
                    canvas.move_to(x, y);
                    any = true;
                }
            }
            if any && name == "polygon" {
                canvas.close_path();
            }
            any
        }
        _ => false,
    }
}

fn arc(canvas: &mut Canvas, rx: f64, ry: f64, x: f64, y: f64) {
    canvas.arc_to(&ArcToParams {
        rx,
        ry,
        x_axis_rotation: 0.0,
        large_arc: false,
        sweep: true,
        x,
        y,
    });
}

fn rounded_rect(canvas: &mut Canvas, x: f64, y: f64, w: f64, h: f64, rx: f64, ry: f64) {
    canvas.move_to(x + rx, y);
    canvas.line_to(x + w - rx, y);
    arc(canvas, rx, ry, x + w, y + ry);
    canvas.line_to(x + w, y + h - ry);
    arc(canvas, rx, ry, x + w - rx, y + h);
    canvas.line_to(x + rx, y + h);
    arc(canvas, rx, ry, x, y + h - ry);
    canvas.line_to(x, y + ry);
    arc(canvas, rx, ry, x + rx, y);
    canvas.close_path();
}

fn ellipse(canvas: &mut Canvas, cx: f64, cy: f64, rx: f64, ry: f64) -> bool {
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    canvas.move_to(cx + rx, cy);
    arc(canvas, rx, ry, cx - rx, cy);
    arc(canvas, rx, ry, cx + rx, cy);
    canvas.close_path();
    true
}

/// Feed path data to the canvas. Drawing stops at the first error, keeping
/// the segments before it.
fn path_data(data: &str, canvas: &mut Canvas) {
    use svgtypes::PathSegment as S;
    for segment in svgtypes::PathParser::from(data) {
        let segment = match segment {
            Ok(segment) => segment,
            Err(e) => {
                log::warn!(target: "import", "path data truncated: {}", e);
                break;
            }
        };
        match segment {
            S::MoveTo { abs, x, y } => {
                canvas.set_relative(!abs);
                canvas.move_to(x, y);
            }
            S::LineTo { abs, x, y } => {
                canvas.set_relative(!abs);
                canvas.line_to(x, y);
            }
            S::HorizontalLineTo { abs, x } => {
                canvas.set_relative(!abs);
                canvas.horizontal_to(x);
            }
            S::VerticalLineTo { abs, y } => {
                canvas.set_relative(!abs);
                canvas.vertical_to(y);
            }
            S::CurveTo {
                abs,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                canvas.set_relative(!abs);
                canvas.curve_to(&CubicBezierParams {
                    cp1x: x1,
                    cp1y: y1,
                    cp2x: x2,
                    cp2y: y2,
                    x,
                    y,
                });
            }
            S::SmoothCurveTo { abs, x2, y2, x, y } => {
                canvas.set_relative(!abs);
                canvas.smooth_curve_to(x2, y2, x, y);
            }
            S::Quadratic { abs, x1, y1, x, y } => {
                canvas.set_relative(!abs);
                canvas.quad_to(&QuadraticBezierParams {
                    cpx: x1,
                    cpy: y1,
                    x,
                    y,
                });
            }
            S::SmoothQuadratic { abs, x, y } => {
                canvas.set_relative(!abs);
                canvas.smooth_quad_to(x, y);
            }
            S::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                canvas.set_relative(!abs);
                canvas.arc_to(&ArcToParams {
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    x,
                    y,
                });
            }
            S::ClosePath { .. } => canvas.close_path(),
        }
    }
    canvas.set_relative(false);
}

/// Lay out `content` with its baseline at `pen`, flipping the glyphs' Y-up
/// outlines into SVG's Y-down user space.
fn draw_text(canvas: &mut Canvas, pen: &mut Point, content: &str) {
    let Some(inverse) = canvas.transform().invert() else {
        return;
    };
    let at = inverse.apply(pen.x, pen.y);
    canvas.save();
    canvas.translate(at.x, at.y);
    canvas.scale(1.0, -1.0);
    canvas.move_to(0.0, 0.0);
    canvas.char_path(content);
    if let Some(end) = canvas.device_point() {
        *pen = end;
    }
    canvas.restore();
}

fn convert_color(color: svgtypes::Color) -> Color {
    Color::rgba(color.red, color.green, color.blue, color.alpha)
}

fn href<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((XLINK_NS, "href"))
        .or_else(|| node.attribute("href"))?
        .trim()
        .strip_prefix('#')
}

fn length_attr(node: Node, name: &str, default: f64) -> f64 {
    node.attribute(name)
        .and_then(|v| parse_length(v, 12.0))
        .unwrap_or(default)
}

/// First entry of a coordinate list attribute such as `text`'s `x`.
fn first_length(node: Node, name: &str) -> Option<f64> {
    let value = node.attribute(name)?;
    let first = value.split(|c: char| c == ',' || c.is_whitespace()).find(|s| !s.is_empty())?;
    parse_length(first, 12.0)
}

fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    match value.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok().map(|v| v / 100.0),
        None => value.parse::<f64>().ok(),
    }
}

/// A length in user units. Units convert at 90 dpi; percentages have no
/// reference box and are rejected.
fn parse_length(value: &str, em: f64) -> Option<f64> {
    if let Some(size) = FONT_SIZES.get(value.trim()) {
        return Some(*size);
    }
    let length = svgtypes::Length::from_str(value.trim()).ok()?;
    to_user_units(length, em)
}

fn to_user_units(length: svgtypes::Length, em: f64) -> Option<f64> {
    use svgtypes::LengthUnit as U;
    let factor = match length.unit {
        U::None | U::Px => 1.0,
        U::Pt => 1.25,
        U::Pc => 15.0,
        U::Mm => 3.543307,
        U::Cm => 35.43307,
        U::In => 90.0,
        U::Em => em,
        U::Ex => em / 2.0,
        U::Percent => return None,
    };
    Some(length.number * factor)
}

fn parse_dash_array(value: &str, em: f64) -> Vec<f64> {
    if value == "none" {
        return Vec::new();
    }
    let mut dashes = Vec::new();
    for length in svgtypes::LengthListParser::from(value) {
        match length.ok().and_then(|l| to_user_units(l, em)) {
            Some(v) => dashes.push(v),
            None => return Vec::new(),
        }
    }
    if dashes.len() % 2 == 1 {
        dashes.extend_from_slice(&dashes.clone());
    }
    dashes
}
