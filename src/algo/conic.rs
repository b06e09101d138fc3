//! Implicit conic sections and ray sampling.
//!
//! A [`Conic`] stores the symmetric 3x3 matrix `Q` of the implicit equation
//!
//! ```text
//! [x y 1] Q [x y 1]^T = A x² + B y² + C xy + D x + E y + F = 0
//! ```
//!
//! with `Q = [[A, C/2, D/2], [C/2, B, E/2], [D/2, E/2, F]]`. The subdivider
//! places every new point by shooting a ray from an edge midpoint and
//! intersecting it with a locally fitted conic; this module provides that
//! intersection, the sampled point and its normal.
//!
//! A fitted conic keeps the matrix of the centred, scaled frame it was solved
//! in. Evaluation, ray intersection and classification work in that frame,
//! so their tolerances do not change when the curve is moved or scaled.
//!
//! # Example
//!
//! ```
//! use conisub::algo::conic::Conic;
//! use nalgebra::{Point2, Vector2};
//!
//! // x² + y² - 25 = 0
//! let circle = Conic::from_coefficients(1.0, 1.0, 0.0, 0.0, 0.0, -25.0, 1e-8);
//!
//! let t = circle.intersect(&Point2::new(0.0, -10.0), &Vector2::new(0.0, 1.0));
//! assert_eq!(t, Some(5.0));
//!
//! let (point, normal) = circle
//!     .sample(&Point2::new(0.0, -10.0), &Vector2::new(0.0, 1.0))
//!     .unwrap();
//! assert_eq!(point, Point2::new(0.0, -5.0));
//! assert!(normal.dot(&Vector2::new(0.0, 1.0)) >= 0.0);
//! ```

use nalgebra::{Matrix3, Point2, Vector2, Vector3};

use crate::geom::orient;

/// Default tolerance for conic decisions and half-plane tests.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Which of the two ray parameters to return when a ray crosses a conic twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootSelection {
    /// The root closest to the ray origin.
    #[default]
    SmallestAbsolute,
    /// The root computed without cancellation, `t = c / q` with
    /// `q = -(b + sign(b)·√disc)`.
    SignConsistent,
    /// The smallest non-negative root; fails if both are behind the origin.
    SmallestPositive,
}

/// Classification of a conic by its invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConicKind {
    /// Quadratic part is definite. Includes imaginary ellipses.
    Ellipse,
    /// Quadratic part is singular.
    Parabola,
    /// Quadratic part is indefinite.
    Hyperbola,
    /// The full matrix is singular (line pairs, double lines, points) or invalid.
    Degenerate,
}

/// A planar conic in implicit matrix form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conic {
    /// World-space matrix, scaled to a unit largest entry for fitted conics.
    matrix: Matrix3<f64>,
    /// Matrix in the frame `p' = (p - center) · scale`.
    local: Matrix3<f64>,
    center: Point2<f64>,
    scale: f64,
    valid: bool,
    epsilon: f64,
}

impl Conic {
    /// Create a conic from a 3x3 matrix. The matrix is symmetrized.
    ///
    /// The conic is invalid if any entry is non-finite or all entries are zero.
    pub fn from_matrix(matrix: Matrix3<f64>, epsilon: f64) -> Self {
        let matrix = (matrix + matrix.transpose()) * 0.5;
        let finite = matrix.iter().all(|v| v.is_finite());
        let nonzero = matrix.iter().any(|&v| v != 0.0);
        Self {
            matrix,
            local: matrix,
            center: Point2::origin(),
            scale: 1.0,
            valid: finite && nonzero,
            epsilon,
        }
    }

    /// Create a conic from its matrix in the frame `p' = (p - center) · scale`.
    ///
    /// `scale` must be positive and finite; otherwise the conic is invalid.
    pub fn from_normalized(
        local: Matrix3<f64>,
        center: Point2<f64>,
        scale: f64,
        epsilon: f64,
    ) -> Self {
        let local = (local + local.transpose()) * 0.5;
        let t = Matrix3::new(
            scale, 0.0, -scale * center.x, //
            0.0, scale, -scale * center.y, //
            0.0, 0.0, 1.0,
        );
        let mut matrix = t.transpose() * local * t;
        let max = matrix.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if max > 0.0 && max.is_finite() {
            matrix /= max;
        }

        let finite = local.iter().chain(matrix.iter()).all(|v| v.is_finite())
            && center.x.is_finite()
            && center.y.is_finite();
        let nonzero = local.iter().any(|&v| v != 0.0);
        Self {
            matrix,
            local,
            center,
            scale,
            valid: finite && nonzero && scale > 0.0 && scale.is_finite(),
            epsilon,
        }
    }

    /// Create the conic `a x² + b y² + c xy + d x + e y + f = 0`.
    pub fn from_coefficients(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64, epsilon: f64) -> Self {
        let (hc, hd, he) = (0.5 * c, 0.5 * d, 0.5 * e);
        Self::from_matrix(
            Matrix3::new(
                a, hc, hd, //
                hc, b, he, //
                hd, he, f,
            ),
            epsilon,
        )
    }

    /// An invalid conic, used when a fit cannot produce coefficients.
    pub fn invalid(epsilon: f64) -> Self {
        Self {
            matrix: Matrix3::zeros(),
            local: Matrix3::zeros(),
            center: Point2::origin(),
            scale: 1.0,
            valid: false,
            epsilon,
        }
    }

    /// Whether the conic has finite, not-all-zero coefficients.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Tolerance used for tangency decisions.
    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The symmetric world-space matrix `Q`.
    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Coefficients `[A, B, C, D, E, F]` of the general implicit form.
    pub fn coefficients(&self) -> [f64; 6] {
        let m = &self.matrix;
        [
            m[(0, 0)],
            m[(1, 1)],
            2.0 * m[(0, 1)],
            2.0 * m[(0, 2)],
            2.0 * m[(1, 2)],
            m[(2, 2)],
        ]
    }

    /// Value of the implicit polynomial at `p`, up to a positive factor for
    /// fitted conics.
    pub fn evaluate(&self, p: &Point2<f64>) -> f64 {
        let h = self.to_local(p);
        h.dot(&(self.local * h))
    }

    /// Gradient of the implicit polynomial at `p`: `(2Ax + Cy + D, Cx + 2By + E)`.
    ///
    /// Returns the zero vector for an invalid conic.
    pub fn gradient_at(&self, p: &Point2<f64>) -> Vector2<f64> {
        if !self.valid {
            return Vector2::zeros();
        }
        let g = self.local * self.to_local(p);
        Vector2::new(2.0 * g.x, 2.0 * g.y) * self.scale
    }

    /// Gradient at `p`, flipped to have a non-negative dot product with `reference`.
    pub fn oriented_gradient_at(&self, p: &Point2<f64>, reference: &Vector2<f64>) -> Vector2<f64> {
        orient(self.gradient_at(p), reference)
    }

    /// Intersect the ray `origin + t·direction` with the conic.
    ///
    /// Returns the ray parameter chosen by [`RootSelection::SmallestAbsolute`].
    pub fn intersect(&self, origin: &Point2<f64>, direction: &Vector2<f64>) -> Option<f64> {
        self.intersect_with(origin, direction, RootSelection::default())
    }

    /// Intersect the ray `origin + t·direction` with the conic.
    ///
    /// Substituting the ray gives `a t² + 2b t + c = 0` with `a = uᵀQu`,
    /// `b = uᵀQp`, `c = pᵀQp`, taken in the conic's local frame. When
    /// `|a| <= epsilon · |Q₂ₓ₂| · |u|²` (the quadratic block) the direction is
    /// asymptotic and the linear solution is used. Returns `None` for an
    /// invalid conic, a negative discriminant, or a non-finite parameter.
    pub fn intersect_with(
        &self,
        origin: &Point2<f64>,
        direction: &Vector2<f64>,
        policy: RootSelection,
    ) -> Option<f64> {
        if !self.valid {
            return None;
        }

        let u = Vector3::new(direction.x, direction.y, 0.0) * self.scale;
        let p = self.to_local(origin);
        let qu = self.local * u;

        let a = u.dot(&qu);
        let b = qu.dot(&p);
        let c = p.dot(&(self.local * p));

        let quadratic = self.local.fixed_view::<2, 2>(0, 0).norm();
        if a.abs() <= self.epsilon * quadratic * u.norm_squared() {
            let t = -c / (2.0 * b);
            return t.is_finite().then_some(t);
        }

        let disc = difference_of_products(b, b, a, c);
        // Also rejects NaN.
        if !(disc >= 0.0) {
            return None;
        }

        // Both roots without cancellation: t = q / a and t = c / q.
        let q = -(b + b.signum() * disc.sqrt());
        let (t1, t2) = if q == 0.0 { (0.0, 0.0) } else { (q / a, c / q) };

        let t = match policy {
            RootSelection::SmallestAbsolute => {
                if t1.abs() <= t2.abs() {
                    t1
                } else {
                    t2
                }
            }
            RootSelection::SignConsistent => t2,
            RootSelection::SmallestPositive => {
                let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
                if lo >= 0.0 {
                    lo
                } else if hi >= 0.0 {
                    hi
                } else {
                    return None;
                }
            }
        };

        t.is_finite().then_some(t)
    }

    /// Sample the conic along a ray: the hit point and the gradient there,
    /// oriented along `direction`.
    ///
    /// Fails if the ray misses or the gradient vanishes at the hit point.
    pub fn sample(
        &self,
        origin: &Point2<f64>,
        direction: &Vector2<f64>,
    ) -> Option<(Point2<f64>, Vector2<f64>)> {
        self.sample_with(origin, direction, RootSelection::default())
    }

    /// [`Conic::sample`] with an explicit root selection policy.
    pub fn sample_with(
        &self,
        origin: &Point2<f64>,
        direction: &Vector2<f64>,
        policy: RootSelection,
    ) -> Option<(Point2<f64>, Vector2<f64>)> {
        let t = self.intersect_with(origin, direction, policy)?;
        let point = origin + direction * t;
        let normal = self.oriented_gradient_at(&point, direction);
        if normal.x == 0.0 && normal.y == 0.0 {
            return None;
        }
        Some((point, normal))
    }

    /// Classify the conic. Determinants are taken on the local matrix scaled
    /// to a unit largest entry and compared against `epsilon`.
    pub fn kind(&self) -> ConicKind {
        if !self.valid {
            return ConicKind::Degenerate;
        }
        let scale = self.local.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let m = self.local / scale;

        if m.determinant().abs() <= self.epsilon {
            return ConicKind::Degenerate;
        }

        let det2 = difference_of_products(m[(0, 0)], m[(1, 1)], m[(0, 1)], m[(0, 1)]);
        if det2.abs() <= self.epsilon {
            ConicKind::Parabola
        } else if det2 > 0.0 {
            ConicKind::Ellipse
        } else {
            ConicKind::Hyperbola
        }
    }

    #[inline]
    fn to_local(&self, p: &Point2<f64>) -> Vector3<f64> {
        let d = (p - self.center) * self.scale;
        Vector3::new(d.x, d.y, 1.0)
    }
}

/// `a·b - c·d` with one rounding error, using Kahan's FMA compensation.
#[inline]
pub fn difference_of_products(a: f64, b: f64, c: f64, d: f64) -> f64 {
    let cd = c * d;
    let err = (-c).mul_add(d, cd);
    let dop = a.mul_add(b, -cd);
    dop + err
}
