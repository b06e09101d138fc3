//! Weighted least-squares conic fitting from points and normals.
//!
//! Each [`PatchPoint`] contributes three homogeneous equations: the point
//! lies on the conic, and the conic gradient at the point is parallel to the
//! given normal. Because normals are directions, each point gets its own
//! scale unknown `λₖ` in `∇Q(pₖ)/2 = λₖ·nₖ`. For `N` points this gives a
//! `3N x (6 + N)` homogeneous system `M·h = 0`, solved in the least-squares
//! sense (`‖h‖ = 1`) by the right singular vector of the smallest singular
//! value.
//!
//! The unknowns `h = (q00, q11, q01, q02, q12, q22, λ₀, …)` are the entries
//! of the conic matrix, so the rows are:
//!
//! ```text
//! point:    [x², y², 2xy, 2x, 2y, 1 | 0 …       ] · point_weight
//! normal x: [x,  0,  y,   1,  0,  0 | … -nx …   ] · normal_weight
//! normal y: [0,  y,  x,   0,  1,  0 | … -ny …   ] · normal_weight
//! ```
//!
//! Coordinates are centred and scaled before the solve. The conic keeps that
//! frame (see [`Conic::from_normalized`]), which keeps both the system and
//! later ray intersections well conditioned at every subdivision level and
//! position.
//!
//! # Example
//!
//! ```
//! use conisub::algo::fit::{ConicFitter, PatchPoint};
//! use nalgebra::{Point2, Vector2};
//!
//! let patch: Vec<PatchPoint> = [0.0_f64, 0.7, 1.4, 2.1]
//!     .iter()
//!     .map(|&a| {
//!         let dir = Vector2::new(a.cos(), a.sin());
//!         PatchPoint::new(Point2::from(dir * 2.0), dir)
//!     })
//!     .collect();
//!
//! let mut fitter = ConicFitter::new(1e-8);
//! let conic = fitter.fit_conic(&patch);
//! assert!(conic.is_valid());
//! assert!(conic.evaluate(&Point2::new(0.0, 2.0)).abs() < 1e-9);
//! ```

use nalgebra::{DMatrix, Matrix3, Point2, Vector2};

use super::conic::Conic;

/// One constraint sample for the conic fitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchPoint {
    /// Point the conic should pass through.
    pub position: Point2<f64>,
    /// Direction the conic gradient should follow at `position`.
    pub normal: Vector2<f64>,
    /// Weight of the incidence equation.
    pub point_weight: f64,
    /// Weight of the two normal equations.
    pub normal_weight: f64,
}

impl PatchPoint {
    /// Create a patch point with unit weights.
    pub fn new(position: Point2<f64>, normal: Vector2<f64>) -> Self {
        Self::weighted(position, normal, 1.0, 1.0)
    }

    /// Create a patch point with explicit weights.
    pub fn weighted(
        position: Point2<f64>,
        normal: Vector2<f64>,
        point_weight: f64,
        normal_weight: f64,
    ) -> Self {
        Self {
            position,
            normal,
            point_weight,
            normal_weight,
        }
    }
}

/// Least-squares conic fitter.
///
/// Holds a scratch system matrix that is reused between fits; results do not
/// depend on previous calls.
#[derive(Debug, Clone)]
pub struct ConicFitter {
    epsilon: f64,
    system: DMatrix<f64>,
    stability: f64,
}

impl ConicFitter {
    /// Create a fitter whose conics use `epsilon` as their tolerance.
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            system: DMatrix::zeros(0, 0),
            stability: f64::NAN,
        }
    }

    /// Ratio of largest to smallest singular value of the last fit.
    ///
    /// `NaN` before the first fit or after a fit that could not be solved,
    /// infinite for an exactly rank-deficient system. Diagnostic only.
    #[inline]
    pub fn stability(&self) -> f64 {
        self.stability
    }

    /// Fit a conic to the patch.
    ///
    /// Returns an invalid conic for an empty patch or a failed solve. Fewer
    /// than three points under-determine the conic; the result is then one
    /// arbitrary member of the solution space.
    pub fn fit_conic(&mut self, patch: &[PatchPoint]) -> Conic {
        self.stability = f64::NAN;
        if patch.is_empty() {
            return Conic::invalid(self.epsilon);
        }

        let (center, scale) = normalization(patch);
        self.build_system(patch, &center, scale);

        let svd = self.system.clone().svd(false, true);
        let v_t = match svd.v_t {
            Some(v_t) => v_t,
            None => return Conic::invalid(self.epsilon),
        };

        let singular = &svd.singular_values;
        let (smallest, _) = singular
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |(bi, bv), (i, &v)| if v < bv { (i, v) } else { (bi, bv) });
        let largest = singular.iter().cloned().fold(0.0_f64, f64::max);
        self.stability = largest / singular[smallest];

        let h = v_t.row(smallest);
        let normalized = Matrix3::new(
            h[0], h[2], h[3], //
            h[2], h[1], h[4], //
            h[3], h[4], h[5],
        );

        log::trace!(
            "fitted conic to {} points, stability {:.3e}",
            patch.len(),
            self.stability
        );

        Conic::from_normalized(normalized, center, scale, self.epsilon)
    }

    fn build_system(&mut self, patch: &[PatchPoint], center: &Point2<f64>, scale: f64) {
        let n = patch.len();
        let cols = 6 + n;
        // Zero rows keep the system at least square so V is always complete.
        let rows = (3 * n).max(cols);

        self.system.resize_mut(rows, cols, 0.0);
        self.system.fill(0.0);

        for (k, pp) in patch.iter().enumerate() {
            let x = (pp.position.x - center.x) * scale;
            let y = (pp.position.y - center.y) * scale;
            let pw = pp.point_weight;
            let nw = pp.normal_weight;
            let normal = pp.normal.try_normalize(0.0).unwrap_or(pp.normal);

            let row = 3 * k;
            let point_row = [x * x, y * y, 2.0 * x * y, 2.0 * x, 2.0 * y, 1.0];
            for (j, v) in point_row.iter().enumerate() {
                self.system[(row, j)] = v * pw;
            }

            self.system[(row + 1, 0)] = x * nw;
            self.system[(row + 1, 2)] = y * nw;
            self.system[(row + 1, 3)] = nw;
            self.system[(row + 1, 6 + k)] = -normal.x * nw;

            self.system[(row + 2, 1)] = y * nw;
            self.system[(row + 2, 2)] = x * nw;
            self.system[(row + 2, 4)] = nw;
            self.system[(row + 2, 6 + k)] = -normal.y * nw;
        }
    }
}

impl Default for ConicFitter {
    fn default() -> Self {
        Self::new(super::conic::DEFAULT_EPSILON)
    }
}

/// Centroid and the scale that brings the mean distance to it to one.
fn normalization(patch: &[PatchPoint]) -> (Point2<f64>, f64) {
    let n = patch.len() as f64;
    let sum = patch
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, pp| acc + pp.position.coords);
    let center = Point2::from(sum / n);
    let mean_dist = patch
        .iter()
        .map(|pp| (pp.position - center).norm())
        .sum::<f64>()
        / n;

    let scale = if mean_dist > 0.0 && mean_dist.is_finite() {
        1.0 / mean_dist
    } else {
        1.0
    };
    (center, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::conic::DEFAULT_EPSILON;
    use approx::assert_relative_eq;

    /// Sample points and gradient directions of `a x² + b y² + c xy + d x + e y + f`.
    fn sample_patch(k: [f64; 6], points: &[Point2<f64>]) -> Vec<PatchPoint> {
        points
            .iter()
            .map(|p| {
                let g = Vector2::new(
                    2.0 * k[0] * p.x + k[2] * p.y + k[3],
                    k[2] * p.x + 2.0 * k[1] * p.y + k[4],
                );
                PatchPoint::new(*p, g.normalize())
            })
            .collect()
    }

    /// Compare coefficient vectors up to scale and sign.
    fn assert_proportional(actual: [f64; 6], expected: [f64; 6]) {
        let a = nalgebra::DVector::from_row_slice(&actual).normalize();
        let e = nalgebra::DVector::from_row_slice(&expected).normalize();
        assert_relative_eq!(a.dot(&e).abs(), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_fit_recovers_ellipse() {
        let k = [1.0 / 16.0, 1.0 / 4.0, 0.0, 0.0, 0.0, -1.0];
        let points: Vec<_> = [0.2_f64, 0.6, 1.1, 1.5, 2.0]
            .iter()
            .map(|&a| Point2::new(4.0 * a.cos(), 2.0 * a.sin()))
            .collect();
        let patch = sample_patch(k, &points);

        let mut fitter = ConicFitter::new(DEFAULT_EPSILON);
        let conic = fitter.fit_conic(&patch);
        assert!(conic.is_valid());
        assert_proportional(conic.coefficients(), k);
        assert!(fitter.stability() > 1.0);
    }

    #[test]
    fn test_fit_recovers_rotated_shifted_conic() {
        // Rotated ellipse x² + xy + y² = 3 shifted by (10, -4).
        let (dx, dy) = (10.0, -4.0);
        let k = [
            1.0,
            1.0,
            1.0,
            -2.0 * dx - dy,
            -dx - 2.0 * dy,
            dx * dx + dx * dy + dy * dy - 3.0,
        ];
        let base = [(1.0, 1.0), (1.0, -2.0), (-1.0, 2.0), (2.0, -1.0)];
        let points: Vec<_> = base.iter().map(|&(x, y)| Point2::new(x + dx, y + dy)).collect();
        let patch = sample_patch(k, &points);

        let conic = ConicFitter::default().fit_conic(&patch);
        assert_proportional(conic.coefficients(), k);
        for p in &points {
            assert!(conic.evaluate(p).abs() < 1e-8);
        }
    }

    #[test]
    fn test_fit_recovers_hyperbola_and_parabola() {
        let hyperbola = [0.0, 0.0, 1.0, 0.0, 0.0, -1.0]; // xy = 1
        let points: Vec<_> = [0.5, 1.0, 2.0, 3.0].iter().map(|&x| Point2::new(x, 1.0 / x)).collect();
        let conic = ConicFitter::default().fit_conic(&sample_patch(hyperbola, &points));
        assert_proportional(conic.coefficients(), hyperbola);

        let parabola = [1.0, 0.0, 0.0, 0.0, -1.0, 0.0]; // y = x²
        let points: Vec<_> = [-1.0, 0.0, 0.5, 1.5].iter().map(|&x| Point2::new(x, x * x)).collect();
        let conic = ConicFitter::default().fit_conic(&sample_patch(parabola, &points));
        assert_proportional(conic.coefficients(), parabola);
    }

    #[test]
    fn test_normal_sign_does_not_matter() {
        let k = [1.0, 1.0, 0.0, 0.0, 0.0, -4.0];
        let points: Vec<_> = [0.0_f64, 1.0, 2.0, 3.0]
            .iter()
            .map(|&a| Point2::new(2.0 * a.cos(), 2.0 * a.sin()))
            .collect();
        let mut patch = sample_patch(k, &points);
        patch[1].normal = -patch[1].normal;
        patch[3].normal = -patch[3].normal;

        let conic = ConicFitter::default().fit_conic(&patch);
        assert_proportional(conic.coefficients(), k);
    }

    #[test]
    fn test_empty_patch_is_invalid() {
        let mut fitter = ConicFitter::default();
        assert!(!fitter.fit_conic(&[]).is_valid());
        assert!(fitter.stability().is_nan());
    }

    #[test]
    fn test_scratch_reuse_is_stateless() {
        let k = [1.0, 1.0, 0.0, 0.0, 0.0, -1.0];
        let small: Vec<_> = [0.0_f64, 0.5, 1.0]
            .iter()
            .map(|&a| Point2::new(a.cos(), a.sin()))
            .collect();
        let large: Vec<_> = (0..7).map(|i| i as f64 * 0.8).map(|a: f64| Point2::new(a.cos(), a.sin())).collect();

        let mut fitter = ConicFitter::default();
        let first = fitter.fit_conic(&sample_patch(k, &small));
        fitter.fit_conic(&sample_patch(k, &large));
        let again = fitter.fit_conic(&sample_patch(k, &small));
        assert_eq!(first, again);
    }

    #[test]
    fn test_weights_are_applied() {
        let p = PatchPoint::weighted(Point2::new(1.0, 2.0), Vector2::new(0.0, 1.0), 2.0, 3.0);
        let mut fitter = ConicFitter::default();
        fitter.build_system(&[p], &Point2::origin(), 1.0);
        assert_eq!(fitter.system.nrows(), 7);
        assert_eq!(fitter.system[(0, 0)], 2.0);
        assert_eq!(fitter.system[(0, 5)], 2.0);
        assert_eq!(fitter.system[(1, 3)], 3.0);
        assert_eq!(fitter.system[(2, 6)], -3.0);
    }
}
