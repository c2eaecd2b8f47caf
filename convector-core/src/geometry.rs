//! Parameter structs for canvas path operations.

/// Parameters for an elliptical arc given by its endpoint, as in SVG path
/// data and the `arcTo` operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcToParams {
    /// X-axis radius.
    pub rx: f64,
    /// Y-axis radius.
    pub ry: f64,
    /// Rotation of the ellipse X axis, in degrees.
    pub x_axis_rotation: f64,
    /// Take the arc spanning more than 180 degrees.
    pub large_arc: bool,
    /// Sweep in the positive-angle direction.
    pub sweep: bool,
    /// End point X.
    pub x: f64,
    /// End point Y.
    pub y: f64,
}

/// Parameters for a cubic Bézier curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezierParams {
    /// First control point X.
    pub cp1x: f64,
    /// First control point Y.
    pub cp1y: f64,
    /// Second control point X.
    pub cp2x: f64,
    /// Second control point Y.
    pub cp2y: f64,
    /// End point X.
    pub x: f64,
    /// End point Y.
    pub y: f64,
}

/// Parameters for a quadratic Bézier curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticBezierParams {
    /// Control point X.
    pub cpx: f64,
    /// Control point Y.
    pub cpy: f64,
    /// End point X.
    pub x: f64,
    /// End point Y.
    pub y: f64,
}
