//! Per-vertex normal estimation.

use nalgebra::{Point2, Vector2};

use crate::geom::{circumcenter, orient, perp};

/// How automatic vertex normals are derived from the adjacent edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalEstimate {
    /// Average of the unit normals of both adjacent edges.
    #[default]
    Uniform,
    /// Average of the edge normals weighted by edge length.
    LengthWeighted,
    /// Direction from the centre of the circle through the vertex and its
    /// two neighbours. Falls back to [`NormalEstimate::Uniform`] on
    /// collinear neighbourhoods and curve endpoints.
    Circle,
}

/// Estimate the unit normal at `v` from its optional neighbours.
///
/// Edge normals are right-hand perpendiculars of the edge direction, so a
/// counter-clockwise closed curve gets outward normals. Returns the zero
/// vector when every adjacent edge is degenerate.
pub(crate) fn estimate_normal(
    prev: Option<&Point2<f64>>,
    v: &Point2<f64>,
    next: Option<&Point2<f64>>,
    method: NormalEstimate,
) -> Vector2<f64> {
    let left = prev.map(|p| perp(&(v - p))).unwrap_or_else(Vector2::zeros);
    let right = next.map(|n| perp(&(n - v))).unwrap_or_else(Vector2::zeros);

    let uniform = unit_or_zero(left) + unit_or_zero(right);
    // A hairpin cancels the two edge normals; fall back to one of them.
    let uniform = if uniform.norm_squared() > 0.0 {
        uniform
    } else if left.norm_squared() > 0.0 {
        left
    } else {
        right
    };

    let normal = match method {
        NormalEstimate::Uniform => uniform,
        NormalEstimate::LengthWeighted => {
            let weighted = left + right;
            if weighted.norm_squared() > 0.0 {
                weighted
            } else {
                uniform
            }
        }
        NormalEstimate::Circle => match (prev, next) {
            (Some(p), Some(n)) => match circumcenter(p, v, n) {
                Some(center) => orient(v - center, &uniform),
                None => uniform,
            },
            _ => uniform,
        },
    };

    unit_or_zero(normal)
}

#[inline]
pub(crate) fn unit_or_zero(v: Vector2<f64>) -> Vector2<f64> {
    v.try_normalize(0.0).unwrap_or_else(Vector2::zeros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_square_corner() {
        // Counter-clockwise corner at the origin of the unit square.
        let prev = Point2::new(0.0, 1.0);
        let v = Point2::new(0.0, 0.0);
        let next = Point2::new(1.0, 0.0);
        let n = estimate_normal(Some(&prev), &v, Some(&next), NormalEstimate::Uniform);
        let expected = Vector2::new(-1.0, -1.0).normalize();
        assert_relative_eq!(n, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_length_weighted_favours_long_edge() {
        let prev = Point2::new(0.0, 10.0);
        let v = Point2::new(0.0, 0.0);
        let next = Point2::new(1.0, 0.0);
        let uniform = estimate_normal(Some(&prev), &v, Some(&next), NormalEstimate::Uniform);
        let weighted = estimate_normal(Some(&prev), &v, Some(&next), NormalEstimate::LengthWeighted);
        // The long edge has normal (-1, 0).
        assert!(weighted.x < uniform.x);
        assert_relative_eq!(weighted.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_normal_is_radial() {
        let r = 3.0;
        let at = |a: f64| Point2::new(r * a.cos(), r * a.sin());
        let (prev, v, next) = (at(0.3), at(0.5), at(0.9));
        let n = estimate_normal(Some(&prev), &v, Some(&next), NormalEstimate::Circle);
        assert_relative_eq!(n, v.coords.normalize(), epsilon = 1e-10);
    }

    #[test]
    fn test_endpoint_uses_single_edge() {
        let v = Point2::new(0.0, 0.0);
        let next = Point2::new(2.0, 0.0);
        let n = estimate_normal(None, &v, Some(&next), NormalEstimate::Circle);
        assert_relative_eq!(n, Vector2::new(0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_fully_degenerate_is_zero() {
        let v = Point2::new(1.0, 1.0);
        let n = estimate_normal(Some(&v), &v, Some(&v), NormalEstimate::Uniform);
        assert_eq!(n, Vector2::zeros());
    }

    #[test]
    fn test_hairpin_uses_incoming_edge() {
        let v = Point2::new(0.0, 0.0);
        let back = Point2::new(2.0, 0.0);
        for method in [NormalEstimate::Uniform, NormalEstimate::LengthWeighted] {
            let n = estimate_normal(Some(&back), &v, Some(&back), method);
            assert_relative_eq!(n, Vector2::new(0.0, 1.0), epsilon = 1e-12);
        }
    }
}
