//! Graphics state that can be saved and restored.

use crate::region::Region;
use crate::style::{Color, LineCap, LineJoin, Paint, WindingRule};
use crate::transform::Transform;

/// Stroke parameters, in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    /// Line width.
    pub width: f64,
    /// Line cap style.
    pub cap: LineCap,
    /// Line join style.
    pub join: LineJoin,
    /// Miter limit.
    pub miter_limit: f64,
    /// Dash pattern; empty for a solid line.
    pub dash: Vec<f64>,
    /// Offset into the dash pattern.
    pub dash_phase: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: LineCap::default(),
            join: LineJoin::default(),
            miter_limit: 10.0,
            dash: Vec::new(),
            dash_phase: 0.0,
        }
    }
}

/// Font selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    /// Family name, or a generic family such as `sans-serif`.
    pub family: String,
    /// Em size in user units.
    pub size: f64,
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self {
            family: "sans-serif".to_string(),
            size: 12.0,
        }
    }
}

/// Graphics state snapshot pushed by `save` and popped by `restore`.
///
/// The path under construction lives on the canvas, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    /// Current transform matrix.
    pub transform: Transform,
    /// Clip region in device space; `None` means unclipped.
    pub clip: Option<Region>,
    /// Stroke parameters.
    pub stroke: StrokeStyle,
    /// Base color used by modes set to `Paint::Base`.
    pub base_color: Color,
    /// Fill paint.
    pub fill_paint: Paint,
    /// Stroke paint.
    pub stroke_paint: Paint,
    /// Winding rule for fill and clip.
    pub winding_rule: WindingRule,
    /// Current font.
    pub font: FontDescriptor,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            clip: None,
            stroke: StrokeStyle::default(),
            base_color: Color::BLACK,
            fill_paint: Paint::Base,
            stroke_paint: Paint::Base,
            winding_rule: WindingRule::default(),
            font: FontDescriptor::default(),
        }
    }
}

impl GraphicsState {
    /// Color to paint with, or `None` when the paint resolves to nothing.
    pub fn resolve(&self, paint: Paint) -> Option<Color> {
        match paint {
            Paint::Base => Some(self.base_color),
            Paint::None => None,
            Paint::Color(color) => Some(color),
        }
    }
}
