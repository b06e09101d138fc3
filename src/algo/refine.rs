//! Normal refinement by curvature smoothness.
//!
//! The normals of a control polygon decide the shape of its conic limit
//! curve. Refinement adjusts them one vertex at a time: a candidate normal is
//! scored by subdividing a copy of the curve a few levels and comparing the
//! discrete curvature on both sides of the vertex. A bracketing search
//! rotates the normal left and right, keeps whichever improves the score and
//! halves the rotation until it drops below the angle limit.
//!
//! Refined normals are stored as custom normals so later edits and
//! subdivisions keep them.
//!
//! # Example
//!
//! ```
//! use conisub::prelude::*;
//! use nalgebra::Point2;
//!
//! let mut curve = Curve::from_vertices(
//!     vec![
//!         Point2::new(0.0, 0.0),
//!         Point2::new(2.0, 0.0),
//!         Point2::new(2.0, 1.0),
//!         Point2::new(0.0, 1.0),
//!     ],
//!     true,
//! );
//!
//! let options = RefineOptions::default().with_test_subdiv_level(2);
//! let refiner = NormalRefiner::new(SubdivisionSettings::default(), options);
//! refiner.refine(&mut curve);
//! assert!(curve.custom_normals().iter().all(|&c| c));
//! ```

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use nalgebra::{Rotation2, Vector2};

use crate::algo::curvature::{calc_curvature, CurvatureType};
use crate::algo::progress::CancelToken;
use crate::algo::subdivide::{ConicSubdivider, SubdivisionSettings};
use crate::algo::Progress;
use crate::curve::{unit_or_zero, Curve};
use crate::error::{CurveError, Result};
use crate::geom::{angle_between, orient, perp};

/// How the curvatures on both sides of a vertex are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothnessPenalty {
    /// `max(|k|) / min(|k|) - 1`.
    Ratio,
    /// `|k_prev - k_next|`.
    #[default]
    Difference,
}

/// Options for normal refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineOptions {
    /// Subdivision depth of the test curves used for scoring.
    pub test_subdiv_level: usize,

    /// The search stops once the rotation step is at most this (radians).
    pub angle_limit: f64,

    /// Passes over all vertices.
    pub max_iterations: usize,

    /// Curvature estimator used for scoring.
    pub curvature_type: CurvatureType,

    /// Score function.
    pub penalty: SmoothnessPenalty,

    /// Score both rotation candidates in parallel (default: true).
    pub parallel: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            test_subdiv_level: 4,
            angle_limit: 1e-3,
            max_iterations: 1,
            curvature_type: CurvatureType::default(),
            penalty: SmoothnessPenalty::default(),
            parallel: true,
        }
    }
}

impl RefineOptions {
    /// Set the test subdivision depth.
    pub fn with_test_subdiv_level(mut self, level: usize) -> Self {
        self.test_subdiv_level = level;
        self
    }

    /// Set the angle limit.
    pub fn with_angle_limit(mut self, angle_limit: f64) -> Self {
        self.angle_limit = angle_limit;
        self
    }

    /// Set the number of passes.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the curvature estimator.
    pub fn with_curvature_type(mut self, kind: CurvatureType) -> Self {
        self.curvature_type = kind;
        self
    }

    /// Set the score function.
    pub fn with_penalty(mut self, penalty: SmoothnessPenalty) -> Self {
        self.penalty = penalty;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.test_subdiv_level == 0 {
            return Err(CurveError::invalid_param(
                "test_subdiv_level",
                self.test_subdiv_level,
                "must be at least 1",
            ));
        }
        if !(self.angle_limit.is_finite() && self.angle_limit > 0.0) {
            return Err(CurveError::invalid_param(
                "angle_limit",
                self.angle_limit,
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// Adjusts vertex normals so the subdivided curve has smooth curvature.
#[derive(Debug, Clone)]
pub struct NormalRefiner {
    settings: SubdivisionSettings,
    options: RefineOptions,
    inflection_points: BTreeSet<usize>,
}

impl NormalRefiner {
    /// Create a refiner. Test subdivisions use `settings` without the
    /// convexity split.
    pub fn new(settings: SubdivisionSettings, options: RefineOptions) -> Self {
        Self {
            settings: settings.with_convexity_split(false),
            options,
            inflection_points: BTreeSet::new(),
        }
    }

    /// Treat these vertices as inflection points of the curve being refined.
    pub fn with_inflection_points(mut self, points: BTreeSet<usize>) -> Self {
        self.inflection_points = points;
        self
    }

    /// The refinement options.
    pub fn options(&self) -> &RefineOptions {
        &self.options
    }

    /// Refine every eligible vertex, `max_iterations` times.
    ///
    /// Endpoints of open curves are never changed. Inflection points are
    /// refined only while their normal is custom.
    pub fn refine(&self, curve: &mut Curve) {
        self.run(curve, &Progress::none(), || None::<Infallible>, |_| {})
            .unwrap_or_else(|never| match never {});
    }

    /// Refine a single vertex as a regular (non-inflection) vertex.
    pub fn refine_selected(&self, curve: &mut Curve, idx: usize) -> Result<()> {
        CurveError::check_index(idx, curve.len())?;
        self.refine_vertex(curve, idx, false);
        Ok(())
    }

    /// [`NormalRefiner::refine`] with progress reporting and cancellation.
    ///
    /// Cancellation is checked before each vertex; vertices refined so far
    /// keep their new normals.
    pub fn refine_with_progress(
        &self,
        curve: &mut Curve,
        progress: &Progress,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.run(curve, progress, cancelled(cancel), |_| {})
    }

    /// Refine on a worker thread, handing snapshots to `on_update`.
    ///
    /// `on_update` runs on the calling thread at most once per `interval`
    /// with the latest intermediate curve, and once more with the final
    /// curve, which is also returned.
    pub fn refine_progressive<F>(
        &self,
        curve: &Curve,
        interval: Duration,
        cancel: &CancelToken,
        mut on_update: F,
    ) -> Result<Curve>
    where
        F: FnMut(&Curve),
    {
        let (tx, rx) = mpsc::channel::<Curve>();
        let mut working = curve.clone();

        std::thread::scope(|scope| {
            let worker = scope.spawn(move || {
                self.run(&mut working, &Progress::none(), cancelled(cancel), |snapshot| {
                    // The receiver outlives the worker.
                    let _ = tx.send(snapshot.clone());
                })
                .map(|()| working)
            });

            let mut latest = None;
            let mut next_tick = Instant::now() + interval;
            loop {
                let timeout = next_tick.saturating_duration_since(Instant::now());
                match rx.recv_timeout(timeout) {
                    Ok(snapshot) => latest = Some(snapshot),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                if Instant::now() >= next_tick {
                    if let Some(snapshot) = latest.take() {
                        on_update(&snapshot);
                    }
                    next_tick = Instant::now() + interval;
                }
            }

            match worker.join() {
                Ok(result) => {
                    let refined = result?;
                    on_update(&refined);
                    Ok(refined)
                }
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })
    }

    /// Score of the current normal at `idx`; lower is smoother.
    ///
    /// Returns zero for vertices without two neighbours.
    pub fn smoothness_penalty(&self, curve: &Curve, idx: usize) -> f64 {
        if idx >= curve.len() || !curve.is_interior(idx) {
            return 0.0;
        }
        self.penalty_for(curve, idx, curve.normal(idx))
    }

    /// Refinement passes. `interrupt` is polled before each vertex and stops
    /// the run with its error.
    fn run<E>(
        &self,
        curve: &mut Curve,
        progress: &Progress,
        mut interrupt: impl FnMut() -> Option<E>,
        mut after_vertex: impl FnMut(&Curve),
    ) -> std::result::Result<(), E> {
        let targets: Vec<usize> = (0..curve.len()).filter(|&i| self.is_refinable(curve, i)).collect();
        let total = targets.len() * self.options.max_iterations;
        let mut done = 0;

        for pass in 0..self.options.max_iterations {
            for &i in &targets {
                if let Some(err) = interrupt() {
                    log::info!("Normal refinement stopped after {} of {} vertices", done, total);
                    return Err(err);
                }
                progress.report(done, total, "Refining normals");
                self.refine_vertex(curve, i, self.inflection_points.contains(&i));
                done += 1;
                after_vertex(curve);
            }
            log::info!(
                "Refinement pass {}/{}: {} vertices",
                pass + 1,
                self.options.max_iterations,
                targets.len()
            );
        }

        progress.report(total, total, "Refining normals");
        Ok(())
    }

    fn is_refinable(&self, curve: &Curve, i: usize) -> bool {
        curve.is_interior(i) && (!self.inflection_points.contains(&i) || curve.is_custom_normal(i))
    }

    fn refine_vertex(&self, curve: &mut Curve, idx: usize, is_inflection: bool) {
        if let Some(normal) = self.binary_search_best_normal(curve, idx, is_inflection) {
            let v = curve.vertex(idx);
            curve.put(idx, v, normal, true);
        }
    }

    /// Search the normal at `idx` that minimizes the smoothness penalty.
    ///
    /// Regular vertices start from the mean of the two adjacent edge
    /// normals and search a quarter of the angle between them. Inflection
    /// vertices start halfway between the chord of their neighbours and its
    /// normal and search `π/8` either side. Each step tries the current best
    /// rotated by `±angle`, then halves `angle` until it drops below the
    /// angle limit.
    ///
    /// Returns `None` for endpoints of open curves and when no start
    /// direction exists.
    pub fn binary_search_best_normal(
        &self,
        curve: &Curve,
        idx: usize,
        is_inflection: bool,
    ) -> Option<Vector2<f64>> {
        if curve.len() < 3 || idx >= curve.len() || !curve.is_interior(idx) {
            return None;
        }

        let prev = curve.vertex(curve.prev_index(idx));
        let v = curve.vertex(idx);
        let next = curve.vertex(curve.next_index(idx));
        let current = curve.normal(idx);

        let (start, half_width) = if is_inflection {
            let edge = unit_or_zero(next - prev);
            let orth = orient(perp(&edge), &current);
            (unit_or_zero(orient(edge, &current) + orth), std::f64::consts::FRAC_PI_8)
        } else {
            let lp = unit_or_zero(perp(&(v - prev)));
            let rp = unit_or_zero(perp(&(next - v)));
            let mean = orient(lp, &current) + orient(rp, &current);
            (unit_or_zero(mean), 0.25 * angle_between(&lp, &rp))
        };
        let start = if start.norm_squared() > 0.0 { start } else { current };
        if start.norm_squared() == 0.0 {
            return None;
        }

        let mut best = start;
        let mut best_penalty = self.penalty_for(curve, idx, best);
        let mut angle = half_width;
        while angle > self.options.angle_limit {
            let plus = Rotation2::new(angle) * best;
            let minus = Rotation2::new(-angle) * best;
            let (p_plus, p_minus) = if self.options.parallel {
                rayon::join(
                    || self.penalty_for(curve, idx, plus),
                    || self.penalty_for(curve, idx, minus),
                )
            } else {
                (self.penalty_for(curve, idx, plus), self.penalty_for(curve, idx, minus))
            };

            if p_plus < best_penalty && p_plus <= p_minus {
                best = plus;
                best_penalty = p_plus;
            } else if p_minus < best_penalty {
                best = minus;
                best_penalty = p_minus;
            }
            angle *= 0.5;
        }

        log::trace!("Vertex {} refined, penalty {:.3e}", idx, best_penalty);
        Some(unit_or_zero(best))
    }

    /// Score `normal` at `idx` on a test subdivision of `curve`.
    fn penalty_for(&self, curve: &Curve, idx: usize, normal: Vector2<f64>) -> f64 {
        let level = self.options.test_subdiv_level;
        let mut test = curve.clone();
        test.put(idx, curve.vertex(idx), unit_or_zero(normal), true);

        let mut subdivider =
            ConicSubdivider::new(self.settings).with_inflection_points(self.inflection_points.clone());
        subdivider.subdivide(&mut test, level);

        let j = idx << level;
        let before = test.prev_index(j);
        let after = test.next_index(j);
        let k = |i: usize| {
            calc_curvature(
                &test.vertex(test.prev_index(i)),
                &test.vertex(i),
                &test.vertex(test.next_index(i)),
                self.options.curvature_type,
            )
        };
        let (ka, kb) = (k(before), k(after));

        match self.options.penalty {
            SmoothnessPenalty::Difference => (ka - kb).abs(),
            SmoothnessPenalty::Ratio => {
                let (lo, hi) = if ka.abs() <= kb.abs() {
                    (ka.abs(), kb.abs())
                } else {
                    (kb.abs(), ka.abs())
                };
                if hi == 0.0 {
                    0.0
                } else if lo == 0.0 {
                    f64::INFINITY
                } else {
                    hi / lo - 1.0
                }
            }
        }
    }
}

/// Interrupt for [`NormalRefiner::run`] that fires once `cancel` is set.
fn cancelled(cancel: &CancelToken) -> impl FnMut() -> Option<CurveError> + '_ {
    move || cancel.is_cancelled().then_some(CurveError::Cancelled)
}
