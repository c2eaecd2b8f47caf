//! Affine transform used as the canvas CTM.

use kurbo::{Affine, Point, Vec2};

/// Transform represents a 2D affine transformation matrix.
///
/// The matrix is represented as:
/// ```text
/// | a c e |
/// | b d f |
/// | 0 0 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Scale X component.
    pub a: f64,
    /// Skew Y component.
    pub b: f64,
    /// Skew X component.
    pub c: f64,
    /// Scale Y component.
    pub d: f64,
    /// Translate X component.
    pub e: f64,
    /// Translate Y component.
    pub f: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// Create a new Transform with the specified components.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Create an identity matrix.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `angle` radians.
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Matrix product `self * other`: `other` is applied first.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform::from(Affine::from(*self) * Affine::from(*other))
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse matrix, or `None` when the matrix collapses the plane.
    pub fn invert(&self) -> Option<Transform> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < f64::EPSILON * 1e-3 {
            return None;
        }
        Some(Transform::from(Affine::from(*self).inverse()))
    }

    pub fn apply(&self, x: f64, y: f64) -> Point {
        Point::new(
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Apply only the linear part, used for relative offsets.
    pub fn apply_vector(&self, dx: f64, dy: f64) -> Vec2 {
        Vec2::new(self.a * dx + self.c * dy, self.b * dx + self.d * dy)
    }

    pub fn is_identity(&self) -> bool {
        *self == Transform::identity()
    }
}

impl From<Affine> for Transform {
    fn from(t: Affine) -> Self {
        let [a, b, c, d, e, f] = t.as_coeffs();
        Transform { a, b, c, d, e, f }
    }
}

impl From<Transform> for Affine {
    fn from(m: Transform) -> Self {
        Affine::new([m.a, m.b, m.c, m.d, m.e, m.f])
    }
}
