//! Elliptical arc parameterization.
//!
//! Arcs arrive in endpoint form (start, end, radii, flags). They are converted
//! to center form and handed to `kurbo::Arc`, which emits the cubic Bézier
//! approximation appended to the canvas path.

use crate::geometry::ArcToParams;
use kurbo::{Arc, Point, Vec2};
use std::f64::consts::PI;

/// Outcome of converting an endpoint arc.
#[derive(Debug, Clone, PartialEq)]
pub enum ArcSegment {
    /// Start and end coincide: nothing is drawn.
    Empty,
    /// A zero radius degrades the arc to a straight line to the end point.
    Line(Point),
    /// A proper elliptical arc in center form.
    Arc(Arc),
}

/// Convert an endpoint arc starting at `from` to center form.
///
/// Radii too small to span the chord are scaled up uniformly until the
/// ellipse passes through both endpoints.
pub fn endpoint_to_center(from: Point, params: &ArcToParams) -> ArcSegment {
    let to = Point::new(params.x, params.y);
    if from == to {
        return ArcSegment::Empty;
    }
    let mut rx = params.rx.abs();
    let mut ry = params.ry.abs();
    if rx == 0.0 || ry == 0.0 || !rx.is_finite() || !ry.is_finite() {
        return ArcSegment::Line(to);
    }

    let phi = params.x_axis_rotation.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();

    // Half chord in the ellipse frame
    let dx = (from.x - to.x) / 2.0;
    let dy = (from.y - to.y) / 2.0;
    let x1 = cos_phi * dx + sin_phi * dy;
    let y1 = -sin_phi * dx + cos_phi * dy;

    let lambda = (x1 * x1) / (rx * rx) + (y1 * y1) / (ry * ry);
    if lambda > 1.0 {
        let k = lambda.sqrt();
        rx *= k;
        ry *= k;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1 * y1 - ry2 * x1 * x1;
    let den = rx2 * y1 * y1 + ry2 * x1 * x1;
    let sign = if params.large_arc == params.sweep {
        -1.0
    } else {
        1.0
    };
    let coef = if den == 0.0 {
        0.0
    } else {
        sign * (num / den).max(0.0).sqrt()
    };
    let cx1 = coef * rx * y1 / ry;
    let cy1 = -coef * ry * x1 / rx;

    let center = Point::new(
        cos_phi * cx1 - sin_phi * cy1 + (from.x + to.x) / 2.0,
        sin_phi * cx1 + cos_phi * cy1 + (from.y + to.y) / 2.0,
    );

    let u = Vec2::new((x1 - cx1) / rx, (y1 - cy1) / ry);
    let v = Vec2::new((-x1 - cx1) / rx, (-y1 - cy1) / ry);
    let start_angle = u.y.atan2(u.x);
    let mut sweep_angle = u.cross(v).atan2(u.dot(v));
    if params.sweep && sweep_angle < 0.0 {
        sweep_angle += 2.0 * PI;
    } else if !params.sweep && sweep_angle > 0.0 {
        sweep_angle -= 2.0 * PI;
    }

    ArcSegment::Arc(Arc {
        center,
        radii: Vec2::new(rx, ry),
        start_angle,
        sweep_angle,
        x_rotation: phi,
    })
}

/// Circular arc between two angles in degrees, as drawn by `arc`/`arcn`.
///
/// The sweep always runs in the requested direction and never exceeds a full
/// turn.
pub fn circular_arc(
    center: Point,
    radius: f64,
    start_deg: f64,
    end_deg: f64,
    anticlockwise: bool,
) -> Arc {
    let start = start_deg.to_radians();
    let mut sweep = (end_deg - start_deg).to_radians();
    if anticlockwise {
        while sweep < 0.0 {
            sweep += 2.0 * PI;
        }
    } else {
        while sweep > 0.0 {
            sweep -= 2.0 * PI;
        }
    }
    if sweep.abs() > 2.0 * PI {
        sweep = sweep.signum() * 2.0 * PI;
    }
    Arc {
        center,
        radii: Vec2::new(radius, radius),
        start_angle: start,
        sweep_angle: sweep,
        x_rotation: 0.0,
    }
}

/// Start point of a center-form arc.
pub fn arc_start(arc: &Arc) -> Point {
    point_at(arc, arc.start_angle)
}

/// End point of a center-form arc.
pub fn arc_end(arc: &Arc) -> Point {
    point_at(arc, arc.start_angle + arc.sweep_angle)
}

fn point_at(arc: &Arc, angle: f64) -> Point {
    let (sin_rot, cos_rot) = arc.x_rotation.sin_cos();
    let (sin_a, cos_a) = angle.sin_cos();
    let x = arc.radii.x * cos_a;
    let y = arc.radii.y * sin_a;
    Point::new(
        arc.center.x + x * cos_rot - y * sin_rot,
        arc.center.y + x * sin_rot + y * cos_rot,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rx: f64, ry: f64, large_arc: bool, sweep: bool, x: f64, y: f64) -> ArcToParams {
        ArcToParams {
            rx,
            ry,
            x_axis_rotation: 0.0,
            large_arc,
            sweep,
            x,
            y,
        }
    }

    fn expect_arc(segment: ArcSegment) -> Arc {
        match segment {
            ArcSegment::Arc(arc) => arc,
            other => panic!("expected an arc, got {:?}", other),
        }
    }

    #[test]
    fn test_half_circle_center() {
        let arc = expect_arc(endpoint_to_center(
            Point::ORIGIN,
            &params(50.0, 50.0, false, true, 100.0, 0.0),
        ));
        assert!((arc.center.x - 50.0).abs() < 1e-9);
        assert!(arc.center.y.abs() < 1e-9);
        assert!((arc.sweep_angle.abs() - PI).abs() < 1e-9);
        assert!(arc.sweep_angle > 0.0);
    }

    #[test]
    fn test_small_radii_are_enlarged() {
        let arc = expect_arc(endpoint_to_center(
            Point::ORIGIN,
            &params(1.0, 1.0, false, true, 100.0, 0.0),
        ));
        assert!((arc.radii.x - 50.0).abs() < 1e-9);
        assert!((arc.radii.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_endpoints_are_preserved() {
        let from = Point::new(10.0, 20.0);
        let p = ArcToParams {
            rx: 40.0,
            ry: 25.0,
            x_axis_rotation: 30.0,
            large_arc: true,
            sweep: false,
            x: 60.0,
            y: 35.0,
        };
        let arc = expect_arc(endpoint_to_center(from, &p));
        let start = arc_start(&arc);
        let end = arc_end(&arc);
        assert!((start - from).hypot() < 1e-6);
        assert!((end - Point::new(60.0, 35.0)).hypot() < 1e-6);
        assert!(arc.sweep_angle.abs() > PI);
    }

    #[test]
    fn test_zero_radius_is_line() {
        let segment = endpoint_to_center(Point::ORIGIN, &params(0.0, 10.0, false, true, 5.0, 5.0));
        assert_eq!(segment, ArcSegment::Line(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_coincident_endpoints_are_empty() {
        let segment = endpoint_to_center(
            Point::new(5.0, 5.0),
            &params(10.0, 10.0, false, true, 5.0, 5.0),
        );
        assert_eq!(segment, ArcSegment::Empty);
    }

    #[test]
    fn test_circular_arc_direction() {
        let ccw = circular_arc(Point::ORIGIN, 10.0, 0.0, 90.0, true);
        assert!((ccw.sweep_angle - PI / 2.0).abs() < 1e-9);
        let cw = circular_arc(Point::ORIGIN, 10.0, 0.0, 90.0, false);
        assert!((cw.sweep_angle + 3.0 * PI / 2.0).abs() < 1e-9);
    }
}
