//! Format-agnostic core of the ConVector pen plotter converter.
//!
//! Decoders drive a [`Canvas`], which turns every fill and stroke into one
//! colored [`Region`] of a [`Drawing`]. An [`Exporter`] then consumes the
//! drawing once, normalizing it into a fixed coordinate range and streaming it
//! to a format encoder. It uses:
//! - `kurbo` for path geometry, flattening, stroking and arcs
//! - `geo` for the boolean region algebra behind clipping and layer merging
//! - `fontdb` and `ttf-parser` for glyph outlines
//!
//! # Example
//!
//! ```rust,ignore
//! use convector_core::{Canvas, Color};
//!
//! let mut canvas = Canvas::new();
//! canvas.set_color(Color::rgb(255, 0, 0));
//! canvas.rect(10.0, 10.0, 100.0, 50.0);
//! canvas.fill();
//! let drawing = canvas.into_drawing();
//! ```

mod arc;
mod canvas;
mod drawing;
mod error;
mod exporter;
mod font_config;
mod geometry;
mod graphics_state;
mod region;
mod style;
mod text;
mod transform;

// Re-export public API
pub use arc::{endpoint_to_center, ArcSegment};
pub use canvas::Canvas;
pub use drawing::{Drawing, Splash};
pub use error::{ConvectorError, ConvectorResult};
pub use exporter::{
    export, normalization, substitute, ExportFlags, ExportOptions, Exporter, Segment,
    SegmentTemplates, DEFAULT_FLATNESS, EXTENT,
};
pub use font_config::{font_config_to_fontdb, FontConfig, ResolvedFontConfig};
pub use geometry::{ArcToParams, CubicBezierParams, QuadraticBezierParams};
pub use graphics_state::{FontDescriptor, GraphicsState, StrokeStyle};
pub use region::Region;
pub use style::{Color, LineCap, LineJoin, Mode, Paint, WindingRule, MIN_ALPHA};
pub use transform::Transform;

pub use kurbo;
