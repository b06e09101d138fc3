//! Conic-based non-linear curve subdivision.
//!
//! Each subdivision step keeps every vertex of the current polygon and
//! inserts one new vertex per edge. The new vertex is found by fitting a
//! conic (an implicit quadratic curve) to a small *patch* of vertices and
//! normals around the edge, then shooting a ray from the edge midpoint
//! along the edge's perpendicular and taking the nearest hit. The conic's
//! gradient at the hit becomes the new vertex normal.
//!
//! A single conic cannot follow an inflection, so before the first step the
//! subdivider optionally splits every non-convex edge by inserting an
//! *inflection point* with a custom normal (see
//! [`ConicSubdivider::get_infl_point_curve`]). Inflection points act as
//! barriers: patches never grow past them.
//!
//! When an edge cannot be fitted (degenerate patch, missed intersection,
//! vanishing gradient) the edge midpoint is used instead, so subdivision
//! never fails.
//!
//! # Example
//!
//! ```
//! use conisub::prelude::*;
//! use nalgebra::Point2;
//!
//! let mut curve = Curve::from_vertices(
//!     vec![
//!         Point2::new(1.0, 0.0),
//!         Point2::new(0.0, 1.0),
//!         Point2::new(-1.0, 0.0),
//!         Point2::new(0.0, -1.0),
//!     ],
//!     true,
//! );
//!
//! let mut subdivider = ConicSubdivider::new(SubdivisionSettings::default());
//! subdivider.subdivide(&mut curve, 3);
//! assert_eq!(curve.len(), 4 * 8);
//! ```

mod inflection;
mod patch;

pub use patch::same_half_plane;

use std::collections::BTreeSet;

use nalgebra::{Point2, Vector2};

use crate::algo::conic::{Conic, RootSelection, DEFAULT_EPSILON};
use crate::algo::fit::{ConicFitter, PatchPoint};
use crate::algo::Progress;
use crate::curve::{unit_or_zero, Curve, NormalEstimate};
use crate::error::{CurveError, Result};
use crate::geom::{orient, perp};

/// Upper bound on the patch half-width, for fixed and dynamic patches alike.
pub const MAX_PATCH_SIZE: usize = 4;

/// Parameters of the subdivision scheme.
///
/// The defaults are a patch half-width of 2 with dynamic growth, convexity
/// splitting enabled, and unit fitting weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubdivisionSettings {
    /// Patch half-width: vertices taken on each side of an edge,
    /// counting the edge endpoint. In `1..=MAX_PATCH_SIZE`.
    pub patch_size: usize,

    /// Grow the patch up to [`MAX_PATCH_SIZE`] when a fit fails.
    pub dynamic_patch_size: bool,

    /// Numerical tolerance for flatness tests and conic degeneracy.
    pub epsilon: f64,

    /// Insert inflection points before subdividing.
    pub convexity_split: bool,

    /// Place inflection points according to the turning angles at the edge
    /// endpoints instead of at the edge midpoint.
    pub weighted_infl_point_location: bool,

    /// With weighted placement, move inflection points toward the endpoint
    /// with the smaller turning angle (otherwise toward the larger one).
    pub gravitate_smaller_angles: bool,

    /// Blend inflection normals toward the edge perpendicular in proportion
    /// to edge length, and estimate automatic normals length-weighted.
    pub area_weighted_normals: bool,

    /// Estimate automatic normals from circumscribed circles.
    pub circle_normals: bool,

    /// Point weight of the two edge endpoints in the fit.
    pub middle_point_weight: f64,
    /// Normal weight of the two edge endpoints in the fit.
    pub middle_normal_weight: f64,
    /// Point weight of every other patch vertex.
    pub outer_point_weight: f64,
    /// Normal weight of every other patch vertex.
    pub outer_normal_weight: f64,

    /// Which ray/conic intersection becomes the new vertex.
    pub root_selection: RootSelection,
}

impl Default for SubdivisionSettings {
    fn default() -> Self {
        Self {
            patch_size: 2,
            dynamic_patch_size: true,
            epsilon: DEFAULT_EPSILON,
            convexity_split: true,
            weighted_infl_point_location: false,
            gravitate_smaller_angles: false,
            area_weighted_normals: false,
            circle_normals: false,
            middle_point_weight: 1.0,
            middle_normal_weight: 1.0,
            outer_point_weight: 1.0,
            outer_normal_weight: 1.0,
            root_selection: RootSelection::default(),
        }
    }
}

impl SubdivisionSettings {
    /// Set the patch half-width.
    pub fn with_patch_size(mut self, patch_size: usize) -> Self {
        self.patch_size = patch_size;
        self
    }

    /// Enable or disable dynamic patch growth.
    pub fn with_dynamic_patch_size(mut self, dynamic: bool) -> Self {
        self.dynamic_patch_size = dynamic;
        self
    }

    /// Set the numerical tolerance.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Enable or disable inflection point insertion.
    pub fn with_convexity_split(mut self, split: bool) -> Self {
        self.convexity_split = split;
        self
    }

    /// Enable angle-weighted inflection placement.
    pub fn with_weighted_infl_point_location(mut self, weighted: bool) -> Self {
        self.weighted_infl_point_location = weighted;
        self
    }

    /// Choose which endpoint weighted inflection placement favours.
    pub fn with_gravitate_smaller_angles(mut self, smaller: bool) -> Self {
        self.gravitate_smaller_angles = smaller;
        self
    }

    /// Enable length-weighted normals.
    pub fn with_area_weighted_normals(mut self, area_weighted: bool) -> Self {
        self.area_weighted_normals = area_weighted;
        self
    }

    /// Enable circle-based normals.
    pub fn with_circle_normals(mut self, circle: bool) -> Self {
        self.circle_normals = circle;
        self
    }

    /// Set the fitting weights of the edge endpoints.
    pub fn with_middle_weights(mut self, point: f64, normal: f64) -> Self {
        self.middle_point_weight = point;
        self.middle_normal_weight = normal;
        self
    }

    /// Set the fitting weights of the outer patch vertices.
    pub fn with_outer_weights(mut self, point: f64, normal: f64) -> Self {
        self.outer_point_weight = point;
        self.outer_normal_weight = normal;
        self
    }

    /// Set the root selection policy.
    pub fn with_root_selection(mut self, policy: RootSelection) -> Self {
        self.root_selection = policy;
        self
    }

    /// The estimator used for automatic (non-custom) normals.
    ///
    /// Circle normals take precedence over length weighting.
    pub fn normal_estimate(&self) -> NormalEstimate {
        if self.circle_normals {
            NormalEstimate::Circle
        } else if self.area_weighted_normals {
            NormalEstimate::LengthWeighted
        } else {
            NormalEstimate::Uniform
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PATCH_SIZE).contains(&self.patch_size) {
            return Err(CurveError::invalid_param(
                "patch_size",
                self.patch_size,
                "must be between 1 and 4",
            ));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(CurveError::invalid_param(
                "epsilon",
                self.epsilon,
                "must be finite and non-negative",
            ));
        }
        let weights = [
            ("middle_point_weight", self.middle_point_weight),
            ("middle_normal_weight", self.middle_normal_weight),
            ("outer_point_weight", self.outer_point_weight),
            ("outer_normal_weight", self.outer_normal_weight),
        ];
        for (name, w) in weights {
            if !(w.is_finite() && w >= 0.0) {
                return Err(CurveError::invalid_param(name, w, "must be finite and non-negative"));
            }
        }
        Ok(())
    }
}

/// Stateful conic subdivider.
///
/// Holds the settings, the current set of inflection point indices and
/// scratch buffers (fitter system, patch, back buffer) that are reused
/// across edges and levels.
#[derive(Debug, Clone)]
pub struct ConicSubdivider {
    settings: SubdivisionSettings,
    fitter: ConicFitter,
    patch: Vec<PatchPoint>,
    scratch: Curve,
    inflection_points: BTreeSet<usize>,
}

impl ConicSubdivider {
    /// Create a subdivider with an empty inflection set.
    pub fn new(settings: SubdivisionSettings) -> Self {
        Self {
            settings,
            fitter: ConicFitter::new(settings.epsilon),
            patch: Vec::with_capacity(2 * MAX_PATCH_SIZE),
            scratch: Curve::default(),
            inflection_points: BTreeSet::new(),
        }
    }

    /// Start from a known inflection set (used when subdividing a curve
    /// that was already split).
    pub fn with_inflection_points(mut self, points: BTreeSet<usize>) -> Self {
        self.inflection_points = points;
        self
    }

    /// The settings in use.
    pub fn settings(&self) -> &SubdivisionSettings {
        &self.settings
    }

    /// Indices of inflection points in the most recently produced curve.
    pub fn inflection_points(&self) -> &BTreeSet<usize> {
        &self.inflection_points
    }

    /// Replace the inflection set.
    pub fn set_inflection_points(&mut self, points: BTreeSet<usize>) {
        self.inflection_points = points;
    }

    /// Forget all inflection points.
    pub fn clear_inflection_points(&mut self) {
        self.inflection_points.clear();
    }

    /// Recompute the automatic normals of `curve` with the configured estimator.
    pub fn estimate_normals(&self, curve: &mut Curve) {
        curve.recalculate_normals(self.settings.normal_estimate());
    }

    /// Subdivide `curve` in place `level` times.
    ///
    /// A closed curve of `n` vertices ends with `n·2^level` vertices, an open
    /// one with `(n-1)·2^level + 1`, plus whatever the convexity split
    /// inserted. Every original vertex (and inflection point) keeps its
    /// position, normal and custom flag; inflection indices are updated.
    pub fn subdivide(&mut self, curve: &mut Curve, level: usize) {
        self.subdivide_with_progress(curve, level, &Progress::none());
    }

    /// [`ConicSubdivider::subdivide`] with per-level progress reporting.
    pub fn subdivide_with_progress(&mut self, curve: &mut Curve, level: usize, progress: &Progress) {
        if level == 0 || curve.is_empty() {
            return;
        }

        if self.settings.convexity_split {
            *curve = self.get_infl_point_curve(curve);
        } else {
            let len = curve.len();
            self.inflection_points.retain(|&i| i < len);
        }

        log::debug!(
            "Subdividing {} vertices ({}), {} levels, {} inflection points",
            curve.len(),
            if curve.is_closed() { "closed" } else { "open" },
            level,
            self.inflection_points.len()
        );

        self.subdivide_recursive(curve, level, level, progress);
        progress.report(level, level, "Conic subdivision");
    }

    fn subdivide_recursive(&mut self, curve: &mut Curve, level: usize, total: usize, progress: &Progress) {
        if level == 0 {
            return;
        }
        progress.report(total - level, total, "Conic subdivision");

        let mut target = std::mem::take(&mut self.scratch);
        self.subdivide_step(curve, &mut target);
        std::mem::swap(curve, &mut target);
        self.scratch = target;

        self.inflection_points = self.inflection_points.iter().map(|&i| 2 * i).collect();

        self.subdivide_recursive(curve, level - 1, total, progress);
    }

    /// One refinement level: `source` vertices go to even indices, edge
    /// points to odd ones.
    fn subdivide_step(&mut self, source: &Curve, target: &mut Curve) {
        let n = source.len();
        let closed = source.is_closed();
        let len = if closed { 2 * n } else { 2 * n - 1 };
        target.reset_for_fill(len, closed);

        for i in 0..n {
            target.put(2 * i, source.vertex(i), source.normal(i), source.is_custom_normal(i));
        }
        for edge in 0..source.num_edges() {
            let (position, normal) = self.edge_point(source, edge);
            target.put(2 * edge + 1, position, normal, false);
        }
    }

    /// Fit a conic to the patch of `edge` at the configured patch size.
    ///
    /// Panics if `edge` is out of range.
    pub fn fit_edge(&mut self, curve: &Curve, edge: usize) -> Conic {
        patch::fill_patch(
            curve,
            edge,
            self.settings.patch_size,
            &self.settings,
            &self.inflection_points,
            &mut self.patch,
        );
        self.fitter.fit_conic(&self.patch)
    }

    /// The patch points for `edge` with half-width `max_patch_size`
    /// (capped at [`MAX_PATCH_SIZE`]), in curve order.
    pub fn extract_patch(&self, curve: &Curve, edge: usize, max_patch_size: usize) -> Vec<PatchPoint> {
        let mut out = Vec::with_capacity(2 * MAX_PATCH_SIZE);
        patch::fill_patch(
            curve,
            edge,
            max_patch_size,
            &self.settings,
            &self.inflection_points,
            &mut out,
        );
        out
    }

    /// New vertex and unit normal for the edge from `edge` to its successor.
    fn edge_point(&mut self, source: &Curve, edge: usize) -> (Point2<f64>, Vector2<f64>) {
        let i0 = edge;
        let i1 = source.next_index(edge);
        let left = source.vertex(i0);
        let right = source.vertex(i1);

        let origin = nalgebra::center(&left, &right);
        let reference = source.normal(i0) + source.normal(i1);
        let direction = unit_or_zero(orient(perp(&(right - left)), &reference));

        let start = self.settings.patch_size.clamp(1, MAX_PATCH_SIZE);
        let mut last_len = 0;
        let found = grow_patch(start, self.settings.dynamic_patch_size, |size| {
            patch::fill_patch(
                source,
                edge,
                size,
                &self.settings,
                &self.inflection_points,
                &mut self.patch,
            );
            if self.patch.len() <= last_len {
                return Growth::Stalled;
            }
            last_len = self.patch.len();

            let conic = self.fitter.fit_conic(&self.patch);
            match conic.sample_with(&origin, &direction, self.settings.root_selection) {
                Some(hit) => Growth::Found(hit),
                None => Growth::Missed,
            }
        });
        if let Some((point, normal)) = found {
            return (point, unit_or_zero(normal));
        }

        log::debug!("Edge {} could not be fitted, using its midpoint", edge);

        let normal = [direction, unit_or_zero(reference)]
            .into_iter()
            .find(|n| n.norm_squared() > 0.0)
            .unwrap_or_else(|| source.normal(i0));
        (origin, normal)
    }
}

/// Outcome of one fit attempt at a given patch half-width.
#[derive(Debug)]
enum Growth<T> {
    /// The patch gained no points over the previous attempt.
    Stalled,
    /// The patch grew but its conic produced no point.
    Missed,
    Found(T),
}

/// Run `attempt` with half-widths `start, start + 1, …` until it finds a
/// point, the patch stalls, or [`MAX_PATCH_SIZE`] is reached. Without
/// `dynamic` only `start` is tried.
fn grow_patch<T>(start: usize, dynamic: bool, mut attempt: impl FnMut(usize) -> Growth<T>) -> Option<T> {
    let mut size = start;
    loop {
        match attempt(size) {
            Growth::Found(found) => return Some(found),
            Growth::Stalled => return None,
            Growth::Missed if !dynamic || size >= MAX_PATCH_SIZE => return None,
            Growth::Missed => size += 1,
        }
    }
}

impl Default for ConicSubdivider {
    fn default() -> Self {
        Self::new(SubdivisionSettings::default())
    }
}

/// Subdivide `curve` in place with a fresh [`ConicSubdivider`].
///
/// Returns the indices of the inflection points in the result.
pub fn conic_subdivide(curve: &mut Curve, level: usize, settings: &SubdivisionSettings) -> BTreeSet<usize> {
    let mut subdivider = ConicSubdivider::new(*settings);
    subdivider.subdivide(curve, level);
    subdivider.inflection_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::TAU;

    fn circle(n: usize, r: f64) -> Curve {
        let (pts, normals) = (0..n)
            .map(|i| {
                let a = TAU * i as f64 / n as f64;
                let u = Vector2::new(a.cos(), a.sin());
                (Point2::from(u * r), u)
            })
            .unzip();
        Curve::from_parts(pts, normals, true).unwrap()
    }

    fn sampled(
        closed: bool,
        ts: impl Iterator<Item = f64>,
        f: impl Fn(f64) -> (Point2<f64>, Vector2<f64>),
    ) -> Curve {
        let (pts, normals) = ts.map(f).unzip();
        Curve::from_parts(pts, normals, closed).unwrap()
    }

    fn assert_all_finite(curve: &Curve) {
        for i in 0..curve.len() {
            let p = curve.vertex(i);
            let n = curve.normal(i);
            assert!(p.x.is_finite() && p.y.is_finite(), "vertex {} = {:?}", i, p);
            assert!(n.x.is_finite() && n.y.is_finite(), "normal {} = {:?}", i, n);
        }
    }

    #[test]
    fn test_level_zero_is_identity() {
        let original = circle(6, 1.0);
        let mut curve = original.clone();
        let mut subdivider = ConicSubdivider::default();
        subdivider.subdivide(&mut curve, 0);
        assert_eq!(curve, original);
        assert!(subdivider.inflection_points().is_empty());
    }

    #[test]
    fn test_empty_curve() {
        let mut curve = Curve::new(true);
        ConicSubdivider::default().subdivide(&mut curve, 3);
        assert!(curve.is_empty());
    }

    #[test]
    fn test_lengths() {
        for level in 1..=3 {
            let mut closed = circle(5, 1.0);
            ConicSubdivider::default().subdivide(&mut closed, level);
            assert_eq!(closed.len(), 5 << level);
            assert!(closed.is_valid());

            let mut open = circle(5, 1.0);
            open.set_closed(false);
            ConicSubdivider::default().subdivide(&mut open, level);
            assert_eq!(open.len(), (4 << level) + 1);
        }
    }

    #[test]
    fn test_original_vertices_are_kept() {
        let original = circle(7, 2.0);
        let mut curve = original.clone();
        ConicSubdivider::default().subdivide(&mut curve, 2);
        for i in 0..original.len() {
            assert_eq!(curve.vertex(4 * i), original.vertex(i));
            assert_eq!(curve.normal(4 * i), original.normal(i));
            assert!(curve.is_custom_normal(4 * i));
            assert!(!curve.is_custom_normal(4 * i + 1));
        }
    }

    #[test]
    fn test_straight_line_stays_straight() {
        let up = Vector2::new(0.0, 1.0);
        let mut curve = Curve::from_parts(
            vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)],
            vec![up, up],
            false,
        )
        .unwrap();
        ConicSubdivider::default().subdivide(&mut curve, 3);
        assert_eq!(curve.len(), 9);
        for i in 0..curve.len() {
            assert_relative_eq!(curve.vertex(i).y, 0.0, epsilon = 1e-9);
            assert_relative_eq!(curve.normal(i), up, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_circle_is_reproduced() {
        let mut curve = circle(8, 5.0);
        let inflections = conic_subdivide(&mut curve, 3, &SubdivisionSettings::default());
        assert!(inflections.is_empty());
        assert_eq!(curve.len(), 64);
        for i in 0..curve.len() {
            let p = curve.vertex(i).coords;
            assert_relative_eq!(p.norm(), 5.0, epsilon = 1e-6);
            assert_relative_eq!(curve.normal(i), p.normalize(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_circle_is_reproduced_far_from_origin_and_at_large_scale() {
        let cases = [
            (Vector2::new(0.0, 0.0), 1.0),
            (Vector2::new(5e3, 5e3), 1.0),
            (Vector2::new(1e4, 1e4), 1.0),
            (Vector2::new(-1e4, 2e3), 3.0),
            (Vector2::new(0.0, 0.0), 1e4),
        ];
        for (center, r) in cases {
            let mut curve = circle(8, r);
            curve.translate(&center);
            ConicSubdivider::default().subdivide(&mut curve, 2);
            assert_eq!(curve.len(), 32);
            for i in 0..curve.len() {
                let d = curve.vertex(i).coords - center;
                assert_relative_eq!(d.norm() / r, 1.0, epsilon = 1e-9);
                assert_relative_eq!(curve.normal(i), d.normalize(), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_ellipse_is_reproduced() {
        let (a, b) = (4.0, 2.0);
        let mut curve = sampled(true, (0..12).map(|i| TAU * i as f64 / 12.0), |t| {
            let p = Point2::new(a * t.cos(), b * t.sin());
            (p, Vector2::new(p.x / (a * a), p.y / (b * b)))
        });
        ConicSubdivider::default().subdivide(&mut curve, 2);
        for i in 0..curve.len() {
            let p = curve.vertex(i);
            assert_relative_eq!(p.x * p.x / (a * a) + p.y * p.y / (b * b), 1.0, epsilon = 1e-6);
            let g = Vector2::new(p.x / (a * a), p.y / (b * b)).normalize();
            assert_relative_eq!(curve.normal(i), g, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_parabola_is_reproduced() {
        let mut curve = sampled(false, (0..9).map(|i| -2.0 + 0.5 * i as f64), |x| {
            (Point2::new(x, x * x), Vector2::new(2.0 * x, -1.0))
        });
        ConicSubdivider::default().subdivide(&mut curve, 2);
        assert_eq!(curve.len(), 33);
        for i in 0..curve.len() {
            let p = curve.vertex(i);
            assert_relative_eq!(p.y, p.x * p.x, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_hyperbola_is_reproduced() {
        let mut curve = sampled(false, (0..8).map(|i| 0.5 + 0.5 * i as f64), |x| {
            (Point2::new(x, 1.0 / x), -Vector2::new(1.0 / x, x))
        });
        ConicSubdivider::default().subdivide(&mut curve, 2);
        for i in 0..curve.len() {
            let p = curve.vertex(i);
            assert_relative_eq!(p.x * p.y, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_inflection_indices_double() {
        let mut curve = Curve::from_vertices(
            vec![
                Point2::new(0.0, 1.0),
                Point2::new(1.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(3.0, -1.0),
            ],
            false,
        );
        let mut subdivider = ConicSubdivider::default();
        subdivider.subdivide(&mut curve, 2);

        assert_eq!(curve.len(), 17);
        assert_eq!(subdivider.inflection_points().iter().copied().collect::<Vec<_>>(), vec![8]);
        assert_relative_eq!(curve.vertex(8), Point2::new(1.5, 0.0), epsilon = 1e-12);
        assert!(curve.is_custom_normal(8));
        assert_all_finite(&curve);
    }

    #[test]
    fn test_split_curve_keeps_barriers_when_subdivided() {
        let control = Curve::from_vertices(
            vec![
                Point2::new(0.0, 1.0),
                Point2::new(1.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(3.0, -1.0),
            ],
            false,
        );
        let mut subdivider = ConicSubdivider::default();
        let mut split = subdivider.get_infl_point_curve(&control);
        let barrier = split.vertex(2);
        let patch = subdivider.extract_patch(&split, 1, MAX_PATCH_SIZE);
        assert_eq!(patch.last().map(|p| p.position), Some(barrier));

        // The split curve is the new control polygon; the default settings
        // split it again before subdividing.
        subdivider.subdivide(&mut split, 1);
        assert_eq!(split.len(), 9);
        assert_eq!(subdivider.inflection_points().iter().copied().collect::<Vec<_>>(), vec![4]);
        assert_eq!(split.vertex(4), barrier);

        let patch = subdivider.extract_patch(&split, 3, MAX_PATCH_SIZE);
        assert_eq!(patch.last().map(|p| p.position), Some(barrier));
        let patch = subdivider.extract_patch(&split, 4, MAX_PATCH_SIZE);
        assert_eq!(patch.first().map(|p| p.position), Some(barrier));
    }

    #[test]
    fn test_existing_inflections_without_split() {
        let mut curve = circle(6, 1.0);
        let settings = SubdivisionSettings::default().with_convexity_split(false);
        let mut subdivider =
            ConicSubdivider::new(settings).with_inflection_points([2, 40].into_iter().collect());
        subdivider.subdivide(&mut curve, 1);
        assert_eq!(subdivider.inflection_points().iter().copied().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_degenerate_input_stays_finite() {
        let curves = [
            Curve::from_vertices(vec![Point2::new(1.0, 1.0)], true),
            Curve::from_vertices(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)], true),
            Curve::from_vertices(
                vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)],
                true,
            ),
            Curve::from_vertices(
                vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(0.0, 0.0),
                    Point2::new(1.0, 0.0),
                    Point2::new(1.0, 1.0),
                ],
                false,
            ),
        ];
        for mut curve in curves {
            let expected = if curve.is_closed() {
                curve.len() * 4
            } else {
                (curve.len() - 1) * 4 + 1
            };
            ConicSubdivider::default().subdivide(&mut curve, 2);
            assert_eq!(curve.len(), expected);
            assert_all_finite(&curve);
        }
    }

    #[test]
    fn test_coincident_edge_falls_back_to_midpoint() {
        let up = Vector2::new(0.0, 1.0);
        let curve = Curve::from_parts(vec![Point2::new(2.0, 3.0); 2], vec![up, up], false).unwrap();
        let mut subdivider = ConicSubdivider::default();
        let (p, n) = subdivider.edge_point(&curve, 0);
        assert_eq!(p, Point2::new(2.0, 3.0));
        assert_relative_eq!(n, up);
    }

    /// Run `grow_patch` over scripted outcomes, returning the result and the
    /// half-widths that were tried.
    fn scripted_growth(
        start: usize,
        dynamic: bool,
        script: impl Fn(usize) -> Growth<usize>,
    ) -> (Option<usize>, Vec<usize>) {
        let mut tried = Vec::new();
        let result = grow_patch(start, dynamic, |size| {
            tried.push(size);
            script(size)
        });
        (result, tried)
    }

    #[test]
    fn test_growth_retries_after_a_missed_fit() {
        let script = |size: usize| if size < 3 { Growth::Missed } else { Growth::Found(size) };
        assert_eq!(scripted_growth(1, true, script), (Some(3), vec![1, 2, 3]));
        assert_eq!(scripted_growth(3, true, script), (Some(3), vec![3]));
    }

    #[test]
    fn test_growth_stops_when_patch_stalls() {
        // A barrier or an open end: the patch stops gaining points at 3.
        let script = |size: usize| if size < 3 { Growth::Missed } else { Growth::Stalled };
        assert_eq!(scripted_growth(2, true, script), (None, vec![2, 3]));
    }

    #[test]
    fn test_growth_disabled_tries_one_size() {
        let script = |size: usize| if size < 3 { Growth::Missed } else { Growth::Found(size) };
        assert_eq!(scripted_growth(2, false, script), (None, vec![2]));
    }

    #[test]
    fn test_growth_is_capped() {
        let (result, tried) = scripted_growth(2, true, |_| Growth::<usize>::Missed);
        assert_eq!(result, None);
        assert_eq!(tried, vec![2, 3, MAX_PATCH_SIZE]);
    }

    #[test]
    fn test_patch_stalls_at_inflection_barrier() {
        // Edge 1 ends at the barrier 2, and vertex 0 is the open start, so
        // widening the patch adds nothing past half-width 2.
        let control = Curve::from_vertices(
            vec![
                Point2::new(0.0, 1.0),
                Point2::new(1.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(3.0, -1.0),
            ],
            false,
        );
        let mut subdivider = ConicSubdivider::default();
        let split = subdivider.get_infl_point_curve(&control);
        let sizes: Vec<_> = (1..=MAX_PATCH_SIZE)
            .map(|size| subdivider.extract_patch(&split, 1, size).len())
            .collect();
        assert_eq!(sizes, vec![2, 3, 3, 3]);
    }

    #[test]
    fn test_fit_edge_on_circle() {
        let curve = circle(8, 2.0);
        let mut subdivider = ConicSubdivider::default();
        let conic = subdivider.fit_edge(&curve, 3);
        assert!(conic.is_valid());
        for i in 0..curve.len() {
            let p = curve.vertex(i);
            let scale = conic.matrix().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            assert!(conic.evaluate(&p).abs() / scale < 1e-8);
        }
    }

    #[test]
    fn test_settings_validation() {
        assert!(SubdivisionSettings::default().validate().is_ok());
        assert!(SubdivisionSettings::default().with_patch_size(0).validate().is_err());
        assert!(SubdivisionSettings::default().with_patch_size(5).validate().is_err());
        assert!(SubdivisionSettings::default().with_epsilon(f64::NAN).validate().is_err());
        assert!(SubdivisionSettings::default()
            .with_outer_weights(-1.0, 1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_normal_estimate_selection() {
        let s = SubdivisionSettings::default();
        assert_eq!(s.normal_estimate(), NormalEstimate::Uniform);
        assert_eq!(s.with_area_weighted_normals(true).normal_estimate(), NormalEstimate::LengthWeighted);
        assert_eq!(
            s.with_area_weighted_normals(true).with_circle_normals(true).normal_estimate(),
            NormalEstimate::Circle
        );
    }
}
