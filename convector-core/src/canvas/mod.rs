//! Canvas: the path builder and graphics-state machine decoders draw into.

mod painting;
mod path_ops;
mod transform;

use crate::drawing::Drawing;
use crate::font_config::{font_config_to_fontdb, FontConfig, ResolvedFontConfig};
use crate::graphics_state::{FontDescriptor, GraphicsState};
use crate::style::{Color, LineCap, LineJoin, Mode, Paint, WindingRule};
use kurbo::{BezPath, Point};
use std::sync::Arc;

/// Control point left behind by the previous curve, for the smooth forms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LastControl {
    Quad(Point),
    Cubic(Point),
}

/// Stateful path builder.
///
/// Path coordinates are transformed into device space as they are appended.
/// Each `fill` or `stroke` turns the current path into one colored region of
/// the owned [`Drawing`].
pub struct Canvas {
    /// Current graphics state.
    pub(crate) state: GraphicsState,
    /// Stack of saved graphics states.
    state_stack: Vec<GraphicsState>,
    /// Path under construction, in device space.
    pub(crate) path: BezPath,
    /// Current point in device space.
    pub(crate) current: Option<Point>,
    /// Start of the current subpath in device space.
    pub(crate) subpath_start: Option<Point>,
    /// Set after `close_path` until the next segment reopens the subpath.
    pub(crate) subpath_closed: bool,
    pub(crate) last_control: Option<LastControl>,
    /// Interpret coordinates as offsets from the current point.
    pub(crate) relative: bool,
    pub(crate) drawing: Drawing,
    pub(crate) fonts: Option<Arc<fontdb::Database>>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    /// Create a canvas without fonts; `char_path` draws nothing.
    pub fn new() -> Self {
        Self {
            state: GraphicsState::default(),
            state_stack: Vec::new(),
            path: BezPath::new(),
            current: None,
            subpath_start: None,
            subpath_closed: false,
            last_control: None,
            relative: false,
            drawing: Drawing::new(),
            fonts: None,
        }
    }

    /// Create a canvas with a font configuration.
    pub fn with_config(config: &FontConfig) -> Self {
        let mut canvas = Self::new();
        canvas.fonts = Some(Arc::new(font_config_to_fontdb(config)));
        canvas
    }

    /// Create a canvas sharing an already resolved font database.
    pub fn with_resolved(resolved: &ResolvedFontConfig) -> Self {
        let mut canvas = Self::new();
        canvas.fonts = Some(resolved.fontdb.clone());
        canvas
    }

    /// Save the graphics state. The current path is not part of it.
    pub fn save(&mut self) {
        log::debug!(target: "canvas", "save");
        self.state_stack.push(self.state.clone());
    }

    /// Restore the most recently saved graphics state.
    pub fn restore(&mut self) {
        log::debug!(target: "canvas", "restore");
        match self.state_stack.pop() {
            Some(state) => self.state = state,
            None => log::debug!(target: "canvas", "restore with empty state stack ignored"),
        }
    }

    /// Restore the bottom-most saved state and empty the stack.
    pub fn restore_all(&mut self) {
        if !self.state_stack.is_empty() {
            self.state = self.state_stack.swap_remove(0);
            self.state_stack.clear();
        }
    }

    pub fn save_depth(&self) -> usize {
        self.state_stack.len()
    }

    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    pub fn drawing(&self) -> &Drawing {
        &self.drawing
    }

    /// Finish the pass and hand over the painted drawing.
    pub fn into_drawing(self) -> Drawing {
        self.drawing
    }

    /// Set the line width. Negative and non-finite values are ignored.
    pub fn set_line_width(&mut self, width: f64) {
        if width.is_finite() && width >= 0.0 {
            self.state.stroke.width = width;
        }
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.state.stroke.cap = cap;
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.state.stroke.join = join;
    }

    /// Set the miter limit. Non-positive and non-finite values are ignored.
    pub fn set_miter_limit(&mut self, limit: f64) {
        if limit.is_finite() && limit > 0.0 {
            self.state.stroke.miter_limit = limit;
        }
    }

    /// Set the dash pattern and phase.
    ///
    /// Patterns with negative or non-finite entries are ignored. An all-zero
    /// pattern means a solid line.
    pub fn set_dash(&mut self, pattern: Vec<f64>, phase: f64) {
        if pattern.iter().any(|v| !v.is_finite() || *v < 0.0) || !phase.is_finite() {
            return;
        }
        self.state.stroke.dash = if pattern.iter().all(|v| *v == 0.0) {
            Vec::new()
        } else {
            pattern
        };
        self.state.stroke.dash_phase = phase;
    }

    /// Set the paint for one mode.
    ///
    /// The base mode only takes solid colors.
    pub fn set_paint(&mut self, mode: Mode, paint: Paint) {
        match mode {
            Mode::Base => match paint {
                Paint::Color(color) => self.state.base_color = color,
                other => {
                    log::debug!(target: "canvas", "base paint {:?} ignored", other)
                }
            },
            Mode::Fill => self.state.fill_paint = paint,
            Mode::Stroke => self.state.stroke_paint = paint,
        }
    }

    /// Set the base color used by modes left at `Paint::Base`.
    pub fn set_color(&mut self, color: Color) {
        self.set_paint(Mode::Base, Paint::Color(color));
    }

    pub fn set_winding_rule(&mut self, rule: WindingRule) {
        self.state.winding_rule = rule;
    }

    pub fn set_font(&mut self, font: FontDescriptor) {
        self.state.font = font;
    }

    pub fn set_font_family(&mut self, family: impl Into<String>) {
        self.state.font.family = family.into();
    }

    /// Set the font size. Non-positive and non-finite values are ignored.
    pub fn set_font_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 {
            self.state.font.size = size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use crate::transform::Transform;
    use kurbo::Rect;

    #[test]
    fn test_new_canvas_defaults() {
        let canvas = Canvas::new();
        assert_eq!(canvas.state().stroke.width, 1.0);
        assert_eq!(canvas.state().stroke.miter_limit, 10.0);
        assert_eq!(canvas.state().base_color, Color::BLACK);
        assert_eq!(canvas.state().winding_rule, WindingRule::NonZero);
        assert!(canvas.current_point().is_none());
        assert!(canvas.drawing().is_empty());
    }

    #[test]
    fn test_line_width_ignore_invalid() {
        let mut canvas = Canvas::new();
        canvas.set_line_width(5.0);
        canvas.set_line_width(-1.0);
        canvas.set_line_width(f64::NAN);
        canvas.set_line_width(f64::INFINITY);
        assert_eq!(canvas.state().stroke.width, 5.0);
    }

    #[test]
    fn test_miter_limit_ignore_invalid() {
        let mut canvas = Canvas::new();
        canvas.set_miter_limit(4.0);
        canvas.set_miter_limit(0.0);
        canvas.set_miter_limit(-2.0);
        assert_eq!(canvas.state().stroke.miter_limit, 4.0);
    }

    #[test]
    fn test_dash_ignore_invalid() {
        let mut canvas = Canvas::new();
        canvas.set_dash(vec![5.0, 3.0], 1.0);
        canvas.set_dash(vec![5.0, -3.0], 0.0);
        assert_eq!(canvas.state().stroke.dash, vec![5.0, 3.0]);
        assert_eq!(canvas.state().stroke.dash_phase, 1.0);
        canvas.set_dash(vec![0.0, 0.0], 0.0);
        assert!(canvas.state().stroke.dash.is_empty());
    }

    #[test]
    fn test_save_restore_state() {
        let mut canvas = Canvas::new();
        canvas.set_line_width(3.0);
        canvas.set_color(Color::rgb(255, 0, 0));
        canvas.save();
        canvas.set_line_width(7.0);
        canvas.set_color(Color::rgb(0, 0, 255));
        canvas.scale(2.0, 2.0);
        canvas.set_font_size(30.0);
        canvas.restore();
        assert_eq!(canvas.state().stroke.width, 3.0);
        assert_eq!(canvas.state().base_color, Color::rgb(255, 0, 0));
        assert_eq!(canvas.state().transform, Transform::identity());
        assert_eq!(canvas.state().font.size, 12.0);
    }

    #[test]
    fn test_restore_on_empty_stack_is_noop() {
        let mut canvas = Canvas::new();
        canvas.set_line_width(2.0);
        canvas.restore();
        assert_eq!(canvas.state().stroke.width, 2.0);
        assert_eq!(canvas.save_depth(), 0);
    }

    #[test]
    fn test_path_survives_save_restore() {
        let mut canvas = Canvas::new();
        canvas.move_to(0.0, 0.0);
        canvas.save();
        canvas.translate(50.0, 50.0);
        canvas.line_to(10.0, 0.0);
        canvas.restore();
        canvas.line_to(10.0, 10.0);
        canvas.close_path();
        // The segment added inside save/restore is still present, in the
        // coordinates it was transformed to at append time
        let elements = canvas.path().elements();
        assert_eq!(elements.len(), 4);
        assert_eq!(elements[1], kurbo::PathEl::LineTo(Point::new(60.0, 50.0)));
        assert_eq!(elements[2], kurbo::PathEl::LineTo(Point::new(10.0, 10.0)));
    }

    #[test]
    fn test_clip_survives_only_until_restore() {
        let mut canvas = Canvas::new();
        canvas.save();
        canvas.clip(Region::rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert!(canvas.state().clip.is_some());
        canvas.restore();
        assert!(canvas.state().clip.is_none());
    }

    #[test]
    fn test_paint_overrides_resolve_against_base() {
        let mut canvas = Canvas::new();
        canvas.set_color(Color::rgb(1, 2, 3));
        canvas.set_paint(Mode::Stroke, Paint::None);
        assert_eq!(
            canvas.state().resolve(canvas.state().fill_paint),
            Some(Color::rgb(1, 2, 3))
        );
        assert_eq!(canvas.state().resolve(canvas.state().stroke_paint), None);
        canvas.set_paint(Mode::Base, Paint::None);
        assert_eq!(canvas.state().base_color, Color::rgb(1, 2, 3));
    }
}
