//! Transform operations for Canvas.

use super::Canvas;
use crate::transform::Transform;

impl Canvas {
    /// Translate the user space.
    pub fn translate(&mut self, x: f64, y: f64) {
        log::debug!(target: "canvas", "translate {} {}", x, y);
        self.concat(Transform::translation(x, y));
    }

    /// Rotate the user space by `angle` radians.
    pub fn rotate(&mut self, angle: f64) {
        log::debug!(target: "canvas", "rotate {}", angle);
        self.concat(Transform::rotation(angle));
    }

    /// Scale the user space.
    pub fn scale(&mut self, x: f64, y: f64) {
        log::debug!(target: "canvas", "scale {} {}", x, y);
        self.concat(Transform::scaling(x, y));
    }

    /// Apply a transform matrix before the current one.
    pub fn concat(&mut self, matrix: Transform) {
        self.state.transform = self.state.transform.then(&matrix);
    }

    /// Set the transform matrix (replacing the current one).
    pub fn set_transform(&mut self, matrix: Transform) {
        log::debug!(target: "canvas", "setTransform {:?}", matrix);
        self.state.transform = matrix;
    }

    /// Reset the transform to identity.
    pub fn reset_transform(&mut self) {
        self.state.transform = Transform::identity();
    }

    /// Get the current transformation matrix.
    pub fn transform(&self) -> Transform {
        self.state.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_transforms_compose_in_user_space() {
        let mut canvas = Canvas::new();
        canvas.translate(10.0, 0.0);
        canvas.scale(2.0, 2.0);
        canvas.move_to(1.0, 1.0);
        assert_eq!(canvas.device_point(), Some(Point::new(12.0, 2.0)));
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let mut canvas = Canvas::new();
        canvas.rotate(std::f64::consts::FRAC_PI_2);
        canvas.move_to(1.0, 0.0);
        let p = canvas.device_point().unwrap();
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_and_reset_transform() {
        let mut canvas = Canvas::new();
        let m = Transform::new(1.0, 0.0, 0.0, -1.0, 0.0, 792.0);
        canvas.set_transform(m);
        assert_eq!(canvas.transform(), m);
        canvas.reset_transform();
        assert!(canvas.transform().is_identity());
    }
}
