//! Discrete curvature of planar polylines.
//!
//! Every estimator takes three consecutive points `a, b, c` and returns the
//! signed curvature at `b`, positive for a left (counter-clockwise) turn.
//! On points sampled from a circle of radius `R` all of them converge to
//! `1/R` as the sampling gets finer.
//!
//! # Curvature Types
//!
//! - **CircleRadius**: inverse radius of the circle through `a, b, c`
//! - **DiscreteWinding**: turning angle divided by the mean edge length
//! - **GradientArcLength**: length of the change of unit tangent divided by
//!   the mean edge length
//! - **AreaInflation**: signed triangle area scaled by the cubed edge length sum
//!
//! # Example
//!
//! ```
//! use conisub::algo::curvature::{calc_curvature, CurvatureType};
//! use nalgebra::Point2;
//!
//! let at = |t: f64| Point2::new(2.0 * t.cos(), 2.0 * t.sin());
//! let k = calc_curvature(&at(0.0), &at(0.01), &at(0.02), CurvatureType::CircleRadius);
//! assert!((k - 0.5).abs() < 1e-6);
//! ```

use nalgebra::Point2;
use rayon::prelude::*;

use crate::curve::Curve;
use crate::geom::{cross, turning_angle};

/// Discrete curvature estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurvatureType {
    /// Inverse circumradius.
    #[default]
    CircleRadius,
    /// Turning angle over mean edge length.
    DiscreteWinding,
    /// Unit tangent change over mean edge length.
    GradientArcLength,
    /// Signed area over cubed length.
    AreaInflation,
}

/// Signed curvature at `b` of the polyline `a, b, c`.
///
/// Returns zero when an edge is degenerate.
pub fn calc_curvature(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, kind: CurvatureType) -> f64 {
    let e1 = b - a;
    let e2 = c - b;
    let l1 = e1.norm();
    let l2 = e2.norm();
    if l1 == 0.0 || l2 == 0.0 {
        return 0.0;
    }

    match kind {
        CurvatureType::CircleRadius => {
            let l3 = (c - a).norm();
            if l3 == 0.0 {
                return 0.0;
            }
            2.0 * cross(&e1, &e2) / (l1 * l2 * l3)
        }
        CurvatureType::DiscreteWinding => turning_angle(&e1, &e2) / (0.5 * (l1 + l2)),
        CurvatureType::GradientArcLength => {
            let theta = turning_angle(&e1, &e2);
            2.0 * (0.5 * theta).sin() / (0.5 * (l1 + l2))
        }
        CurvatureType::AreaInflation => {
            let sum = l1 + l2;
            8.0 * cross(&e1, &e2) / (sum * sum * sum)
        }
    }
}

/// Curvature at every vertex. Endpoints of open curves get zero.
pub fn curvature_profile(curve: &Curve, kind: CurvatureType, parallel: bool) -> Vec<f64> {
    let at = |i: usize| -> f64 {
        if !curve.is_interior(i) {
            return 0.0;
        }
        calc_curvature(
            &curve.vertex(curve.prev_index(i)),
            &curve.vertex(i),
            &curve.vertex(curve.next_index(i)),
            kind,
        )
    };

    if parallel {
        (0..curve.len()).into_par_iter().map(at).collect()
    } else {
        (0..curve.len()).map(at).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [CurvatureType; 4] = [
        CurvatureType::CircleRadius,
        CurvatureType::DiscreteWinding,
        CurvatureType::GradientArcLength,
        CurvatureType::AreaInflation,
    ];

    fn on_circle(r: f64, t: f64) -> Point2<f64> {
        Point2::new(r * t.cos(), r * t.sin())
    }

    #[test]
    fn test_circle_converges_to_inverse_radius() {
        let r = 4.0;
        let h = 1e-3;
        for kind in ALL {
            let k = calc_curvature(&on_circle(r, 0.0), &on_circle(r, h), &on_circle(r, 2.0 * h), kind);
            assert_relative_eq!(k, 1.0 / r, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_circle_radius_is_exact() {
        let k = calc_curvature(
            &on_circle(3.0, 0.0),
            &on_circle(3.0, 1.0),
            &on_circle(3.0, 2.5),
            CurvatureType::CircleRadius,
        );
        assert_relative_eq!(k, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sign_follows_turn_direction() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let left = Point2::new(2.0, 0.5);
        let right = Point2::new(2.0, -0.5);
        for kind in ALL {
            assert!(calc_curvature(&a, &b, &left, kind) > 0.0);
            assert!(calc_curvature(&a, &b, &right, kind) < 0.0);
        }
    }

    #[test]
    fn test_straight_and_degenerate_are_zero() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 1.0);
        let c = Point2::new(2.0, 2.0);
        for kind in ALL {
            assert_eq!(calc_curvature(&a, &b, &c, kind), 0.0);
            assert_eq!(calc_curvature(&a, &a, &c, kind), 0.0);
        }
    }

    #[test]
    fn test_profile_open_and_closed() {
        let points: Vec<_> = (0..8).map(|i| on_circle(2.0, i as f64 * std::f64::consts::FRAC_PI_4)).collect();
        let closed = Curve::from_vertices(points.clone(), true);
        let seq = curvature_profile(&closed, CurvatureType::CircleRadius, false);
        let par = curvature_profile(&closed, CurvatureType::CircleRadius, true);
        assert_eq!(seq, par);
        for k in seq {
            assert_relative_eq!(k, 0.5, epsilon = 1e-12);
        }

        let open = Curve::from_vertices(points, false);
        let profile = curvature_profile(&open, CurvatureType::CircleRadius, true);
        assert_eq!(profile[0], 0.0);
        assert_eq!(profile[7], 0.0);
        assert_relative_eq!(profile[3], 0.5, epsilon = 1e-12);
    }
}
