//! Fill, stroke and clip operations for Canvas.

use super::Canvas;
use crate::region::Region;
use crate::style::{Color, Paint, WindingRule};
use kurbo::{Affine, BezPath, PathEl, Stroke, StrokeOpts};

impl Canvas {
    /// Fill the current path with the fill paint.
    ///
    /// Open subpaths are closed. The current path is kept.
    pub fn fill(&mut self) {
        log::debug!(target: "canvas", "fill");
        let Some(color) = self.paint_color(self.state.fill_paint) else {
            return;
        };
        let region = self.path_region();
        self.emit(color, region);
    }

    /// Stroke the current path with the stroke paint.
    ///
    /// The outline is computed in user space so the line width follows the
    /// transform. A non-invertible transform strokes nothing.
    pub fn stroke(&mut self) {
        log::debug!(target: "canvas", "stroke");
        let Some(color) = self.paint_color(self.state.stroke_paint) else {
            return;
        };
        let Some(region) = self.stroke_region() else {
            log::debug!(target: "canvas", "stroke with non-invertible transform skipped");
            return;
        };
        self.emit(color, region);
    }

    /// Outline of the current path as it would be stroked, in device space.
    pub fn stroke_region(&self) -> Option<Region> {
        let inverse = self.state.transform.invert()?;
        let mut user = self.path.clone();
        user.apply_affine(Affine::from(inverse));

        let params = &self.state.stroke;
        let mut style = Stroke::new(params.width)
            .with_caps(params.cap.into())
            .with_join(params.join.into())
            .with_miter_limit(params.miter_limit);
        if !params.dash.is_empty() {
            style = style.with_dashes(params.dash_phase, params.dash.iter().copied());
        }
        let tolerance = (params.width * 0.01).max(1e-6);
        let mut outline = kurbo::stroke(user.iter(), &style, &StrokeOpts::default(), tolerance);
        outline.apply_affine(Affine::from(self.state.transform));
        Some(Region::new(outline, WindingRule::NonZero))
    }

    /// Narrow the clip by the current path under the current winding rule.
    pub fn clip_path(&mut self) {
        log::debug!(target: "canvas", "clip");
        let region = self.path_region();
        self.clip(region);
    }

    /// Narrow the clip region. The clip never grows.
    pub fn clip(&mut self, region: Region) {
        let clip = match self.state.clip.take() {
            Some(existing) => existing.intersect(&region),
            None => region,
        };
        self.state.clip = Some(clip);
    }

    /// Device-space clip region, `None` when unclipped.
    pub fn clip_region(&self) -> Option<&Region> {
        self.state.clip.as_ref()
    }

    /// The current path, every subpath closed, under the current winding rule.
    pub fn path_region(&self) -> Region {
        Region::new(closed(&self.path), self.state.winding_rule)
    }

    /// Resolve the paint, or `None` when the call must paint nothing.
    fn paint_color(&self, paint: Paint) -> Option<Color> {
        if self.current.is_none() {
            log::debug!(target: "canvas", "paint without current point skipped");
            return None;
        }
        let color = self.state.resolve(paint)?;
        if !color.is_visible() {
            log::debug!(target: "canvas", "paint with alpha {} skipped", color.alpha());
            return None;
        }
        Some(color)
    }

    fn emit(&mut self, color: Color, region: Region) {
        let region = match &self.state.clip {
            Some(clip) => region.intersect(clip),
            None => region,
        };
        if region.is_empty() {
            log::debug!(target: "canvas", "empty region skipped");
            return;
        }
        self.drawing.paint(color, region);
    }
}

/// Copy of `path` with every subpath closed.
fn closed(path: &BezPath) -> BezPath {
    let mut result = BezPath::new();
    let mut open = false;
    for el in path.elements() {
        match el {
            PathEl::MoveTo(_) => {
                if open {
                    result.close_path();
                }
                open = true;
            }
            PathEl::ClosePath => open = false,
            _ => {}
        }
        if *el == PathEl::ClosePath && result.elements().last() == Some(&PathEl::ClosePath) {
            continue;
        }
        result.push(*el);
    }
    if open {
        result.close_path();
    }
    result
}
