//! Path building operations for Canvas.

use super::{Canvas, LastControl};
use crate::arc::{arc_end, arc_start, circular_arc, endpoint_to_center, ArcSegment};
use crate::error::{ConvectorError, ConvectorResult};
use crate::geometry::{ArcToParams, CubicBezierParams, QuadraticBezierParams};
use crate::region::Region;
use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape};

impl Canvas {
    /// Interpret subsequent coordinates as offsets from the current point.
    pub fn set_relative(&mut self, relative: bool) {
        self.relative = relative;
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Discard the current path.
    pub fn reset_path(&mut self) {
        log::debug!(target: "canvas", "newPath");
        self.path = BezPath::new();
        self.current = None;
        self.subpath_start = None;
        self.subpath_closed = false;
        self.last_control = None;
    }

    /// The path under construction, in device space.
    pub fn path(&self) -> &BezPath {
        &self.path
    }

    /// Current point in user space, or `None` when there is none or the
    /// transform cannot be inverted.
    pub fn current_point(&self) -> Option<Point> {
        let current = self.current?;
        let inverse = self.state.transform.invert()?;
        Some(inverse.apply(current.x, current.y))
    }

    /// Current point in device space.
    pub fn device_point(&self) -> Option<Point> {
        self.current
    }

    /// Device-space bounding box of the current path.
    pub fn path_bounds(&self) -> Option<Rect> {
        if self.path.elements().is_empty() {
            return None;
        }
        Some(self.path.bounding_box())
    }

    /// Resolve a user coordinate to device space, honoring relative mode.
    fn resolve(&self, x: f64, y: f64) -> Point {
        let t = &self.state.transform;
        match (self.relative, self.current) {
            (true, Some(current)) => current + t.apply_vector(x, y),
            _ => t.apply(x, y),
        }
    }

    /// Synthesize `MoveTo(0, 0)` when a segment is drawn without a current
    /// point, and reopen a closed subpath at its start.
    fn begin_segment(&mut self) {
        match self.current {
            None => {
                let origin = self.state.transform.apply(0.0, 0.0);
                self.start_subpath(origin);
            }
            Some(current) if self.subpath_closed => {
                self.path.move_to(current);
                self.subpath_closed = false;
            }
            Some(_) => {}
        }
    }

    fn start_subpath(&mut self, p: Point) {
        self.path.move_to(p);
        self.current = Some(p);
        self.subpath_start = Some(p);
        self.subpath_closed = false;
        self.last_control = None;
    }

    /// Move to a point without drawing.
    pub fn move_to(&mut self, x: f64, y: f64) {
        log::debug!(target: "canvas", "moveTo {} {}", x, y);
        let p = self.resolve(x, y);
        self.start_subpath(p);
    }

    /// Draw a line to a point.
    pub fn line_to(&mut self, x: f64, y: f64) {
        log::debug!(target: "canvas", "lineTo {} {}", x, y);
        let p = self.resolve(x, y);
        self.push_line(p);
    }

    /// Add a quadratic Bézier curve.
    pub fn quad_to(&mut self, params: &QuadraticBezierParams) {
        log::debug!(target: "canvas", "quadTo {:?}", params);
        let c = self.resolve(params.cpx, params.cpy);
        let p = self.resolve(params.x, params.y);
        self.push_quad(c, p);
    }

    /// Add a cubic Bézier curve.
    pub fn curve_to(&mut self, params: &CubicBezierParams) {
        log::debug!(target: "canvas", "curveTo {:?}", params);
        let c1 = self.resolve(params.cp1x, params.cp1y);
        let c2 = self.resolve(params.cp2x, params.cp2y);
        let p = self.resolve(params.x, params.y);
        self.push_cubic(c1, c2, p);
    }

    /// Add a straight, quadratic or cubic segment from one, two or three
    /// coordinate pairs.
    pub fn bezier_to(&mut self, coords: &[f64]) -> ConvectorResult<()> {
        match *coords {
            [x, y] => self.line_to(x, y),
            [cpx, cpy, x, y] => self.quad_to(&QuadraticBezierParams { cpx, cpy, x, y }),
            [cp1x, cp1y, cp2x, cp2y, x, y] => self.curve_to(&CubicBezierParams {
                cp1x,
                cp1y,
                cp2x,
                cp2y,
                x,
                y,
            }),
            _ => return Err(ConvectorError::InvalidPointCount(coords.len())),
        }
        Ok(())
    }

    /// Quadratic curve whose control point mirrors the previous one.
    pub fn smooth_quad_to(&mut self, x: f64, y: f64) {
        log::debug!(target: "canvas", "smoothQuadTo {} {}", x, y);
        let p = self.resolve(x, y);
        let c = self.reflected_control(|last| match last {
            LastControl::Quad(c) => Some(c),
            LastControl::Cubic(_) => None,
        });
        self.push_quad(c, p);
    }

    /// Cubic curve whose first control point mirrors the previous one.
    pub fn smooth_curve_to(&mut self, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        log::debug!(target: "canvas", "smoothCurveTo {} {} {} {}", cp2x, cp2y, x, y);
        let c2 = self.resolve(cp2x, cp2y);
        let p = self.resolve(x, y);
        let c1 = self.reflected_control(|last| match last {
            LastControl::Cubic(c) => Some(c),
            LastControl::Quad(_) => None,
        });
        self.push_cubic(c1, c2, p);
    }

    fn reflected_control(&mut self, pick: impl Fn(LastControl) -> Option<Point>) -> Point {
        self.begin_segment();
        let current = self.current.unwrap_or(Point::ORIGIN);
        match self.last_control.and_then(pick) {
            Some(c) => current + (current - c),
            None => current,
        }
    }

    /// Horizontal line keeping the current Y coordinate.
    pub fn horizontal_to(&mut self, x: f64) {
        if self.relative {
            self.line_to(x, 0.0);
        } else {
            let y = self.current_point().map(|p| p.y).unwrap_or(0.0);
            self.line_to(x, y);
        }
    }

    /// Vertical line keeping the current X coordinate.
    pub fn vertical_to(&mut self, y: f64) {
        if self.relative {
            self.line_to(0.0, y);
        } else {
            let x = self.current_point().map(|p| p.x).unwrap_or(0.0);
            self.line_to(x, y);
        }
    }

    /// Elliptical arc from the current point to `(params.x, params.y)`.
    pub fn arc_to(&mut self, params: &ArcToParams) {
        log::debug!(target: "canvas", "arcTo {:?}", params);
        let end_device = self.resolve(params.x, params.y);
        self.begin_segment();
        let Some(inverse) = self.state.transform.invert() else {
            log::debug!(target: "canvas", "arcTo with non-invertible transform drawn as line");
            self.push_line(end_device);
            return;
        };
        let current = self.current.unwrap_or(Point::ORIGIN);
        let from = inverse.apply(current.x, current.y);
        let end = inverse.apply(end_device.x, end_device.y);
        let absolute = ArcToParams {
            x: end.x,
            y: end.y,
            ..*params
        };
        match endpoint_to_center(from, &absolute) {
            ArcSegment::Empty => {}
            ArcSegment::Line(_) => self.push_line(end_device),
            ArcSegment::Arc(arc) => {
                let tolerance = (arc.radii.x.max(arc.radii.y) * 1e-4).max(1e-9);
                let ctm = Affine::from(self.state.transform);
                for el in arc.append_iter(tolerance) {
                    if let PathEl::CurveTo(c1, c2, p) = el {
                        self.push_cubic(ctm * c1, ctm * c2, ctm * p);
                    }
                }
                // Land exactly on the requested end point
                self.current = Some(end_device);
                if let Some(PathEl::CurveTo(c1, c2, _)) = self.path.elements().last().copied() {
                    self.path.pop();
                    self.path.curve_to(c1, c2, end_device);
                }
                self.last_control = None;
            }
        }
    }

    /// Circular arc around `(cx, cy)` between two angles in degrees.
    ///
    /// A line joins the current point to the arc start; without a current
    /// point the arc starts a new subpath.
    pub fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64, anticlockwise: bool) {
        log::debug!(target: "canvas", "arc {} {} {} {} {} {}", cx, cy, radius, start, end, anticlockwise);
        let arc = circular_arc(Point::new(cx, cy), radius.abs(), start, end, anticlockwise);
        let ctm = Affine::from(self.state.transform);
        let first = ctm * arc_start(&arc);
        if self.current.is_some() {
            self.push_line(first);
        } else {
            self.start_subpath(first);
        }
        if radius == 0.0 || arc.sweep_angle == 0.0 {
            return;
        }
        let tolerance = (radius.abs() * 1e-4).max(1e-9);
        for el in arc.append_iter(tolerance) {
            if let PathEl::CurveTo(c1, c2, p) = el {
                self.push_cubic(ctm * c1, ctm * c2, ctm * p);
            }
        }
        self.current = Some(ctm * arc_end(&arc));
        self.last_control = None;
    }

    /// Add a closed rectangle subpath.
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        log::debug!(target: "canvas", "rect {} {} {} {}", x, y, width, height);
        let t = self.state.transform;
        let start = t.apply(x, y);
        self.start_subpath(start);
        self.path.line_to(t.apply(x + width, y));
        self.path.line_to(t.apply(x + width, y + height));
        self.path.line_to(t.apply(x, y + height));
        self.close_path();
    }

    /// Close the current subpath.
    pub fn close_path(&mut self) {
        log::debug!(target: "canvas", "closePath");
        if self.current.is_none() || self.subpath_closed {
            return;
        }
        self.path.close_path();
        self.current = self.subpath_start;
        self.subpath_closed = true;
        self.last_control = None;
    }

    /// Append device-space geometry, such as a clip outline, to the path.
    pub fn append_region(&mut self, region: &Region) {
        for el in region.path().elements() {
            match *el {
                PathEl::MoveTo(p) => self.start_subpath(p),
                PathEl::LineTo(p) => self.push_line(p),
                PathEl::QuadTo(c, p) => self.push_quad(c, p),
                PathEl::CurveTo(c1, c2, p) => self.push_cubic(c1, c2, p),
                PathEl::ClosePath => self.close_path(),
            }
        }
    }

    pub(crate) fn push_line(&mut self, p: Point) {
        self.begin_segment();
        self.path.line_to(p);
        self.current = Some(p);
        self.last_control = None;
    }

    pub(crate) fn push_quad(&mut self, c: Point, p: Point) {
        self.begin_segment();
        self.path.quad_to(c, p);
        self.current = Some(p);
        self.last_control = Some(LastControl::Quad(c));
    }

    pub(crate) fn push_cubic(&mut self, c1: Point, c2: Point, p: Point) {
        self.begin_segment();
        self.path.curve_to(c1, c2, p);
        self.current = Some(p);
        self.last_control = Some(LastControl::Cubic(c2));
    }
}
