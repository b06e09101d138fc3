//! Shared 2D geometry helpers.

use nalgebra::{Point2, Vector2};

/// Right-hand perpendicular of `v`.
///
/// For a counter-clockwise polygon the perpendicular of an edge direction
/// points outward.
#[inline]
pub fn perp(v: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(v.y, -v.x)
}

/// Scalar 2D cross product (z component of the 3D cross product).
#[inline]
pub fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Signed turning angle from direction `a` to direction `b`, in `(-π, π]`.
///
/// Positive for a left (counter-clockwise) turn.
#[inline]
pub fn turning_angle(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    cross(a, b).atan2(a.dot(b))
}

/// Unsigned angle between two vectors, in `[0, π]`. Zero if either is zero.
pub fn angle_between(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Flip `v` if it points away from `reference`.
#[inline]
pub fn orient(v: Vector2<f64>, reference: &Vector2<f64>) -> Vector2<f64> {
    if v.dot(reference) < 0.0 {
        -v
    } else {
        v
    }
}

/// Centre of the circle through three points, or `None` if they are collinear.
pub fn circumcenter(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Option<Point2<f64>> {
    let ab = b - a;
    let ac = c - a;
    let d = 2.0 * cross(&ab, &ac);
    if d.abs() <= f64::EPSILON * ab.norm_squared().max(ac.norm_squared()) {
        return None;
    }
    let ab2 = ab.norm_squared();
    let ac2 = ac.norm_squared();
    let ux = (ac.y * ab2 - ab.y * ac2) / d;
    let uy = (ab.x * ac2 - ac.x * ab2) / d;
    Some(Point2::new(a.x + ux, a.y + uy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_perp_is_clockwise_rotation() {
        let v = Vector2::new(1.0, 0.0);
        assert_eq!(perp(&v), Vector2::new(0.0, -1.0));
        assert_eq!(perp(&v).dot(&v), 0.0);
    }

    #[test]
    fn test_turning_angle_sign() {
        let east = Vector2::new(1.0, 0.0);
        let north = Vector2::new(0.0, 1.0);
        assert_relative_eq!(turning_angle(&east, &north), FRAC_PI_2);
        assert_relative_eq!(turning_angle(&north, &east), -FRAC_PI_2);
    }

    #[test]
    fn test_circumcenter() {
        let c = circumcenter(
            &Point2::new(5.0, 0.0),
            &Point2::new(0.0, 5.0),
            &Point2::new(-5.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(c, Point2::new(0.0, 0.0), epsilon = 1e-12);

        let collinear = circumcenter(
            &Point2::new(0.0, 0.0),
            &Point2::new(1.0, 1.0),
            &Point2::new(2.0, 2.0),
        );
        assert!(collinear.is_none());
    }

    #[test]
    fn test_angle_between_degenerate() {
        assert_eq!(angle_between(&Vector2::zeros(), &Vector2::new(1.0, 0.0)), 0.0);
    }
}
