//! # Conisub
//!
//! Non-linear subdivision of planar curves with conic precision.
//!
//! A control polygon with one normal per vertex is refined by repeatedly
//! inserting a point on every edge. Each new point lies on a conic fitted to
//! the nearby vertices and normals, so circles, ellipses, parabolas and
//! hyperbolas sampled with exact normals are reproduced exactly.
//!
//! ## Features
//!
//! - **Curve container**: open and closed polylines with automatic or custom normals
//! - **Conic fitting**: SVD-based least squares on positions and normals
//! - **Convexity split**: inflection points so every patch is locally convex
//! - **Normal refinement**: bracketing search for curvature-smooth normals
//! - **Parallel evaluation**: rayon-backed refinement and curvature profiles
//!
//! ## Quick Start
//!
//! ```
//! use conisub::prelude::*;
//! use nalgebra::{Point2, Vector2};
//!
//! // Six points of the unit circle with their exact normals.
//! let (points, normals): (Vec<_>, Vec<_>) = (0..6)
//!     .map(|i| {
//!         let a = std::f64::consts::TAU * i as f64 / 6.0;
//!         let n = Vector2::new(a.cos(), a.sin());
//!         (Point2::from(n), n)
//!     })
//!     .unzip();
//! let mut curve = Curve::from_parts(points, normals, true).unwrap();
//!
//! let mut subdivider = ConicSubdivider::new(SubdivisionSettings::default());
//! subdivider.subdivide(&mut curve, 4);
//!
//! assert_eq!(curve.len(), 96);
//! for p in curve.vertices() {
//!     assert!((p.coords.norm() - 1.0).abs() < 1e-6);
//! }
//! ```
//!
//! ## Refining Normals
//!
//! ```
//! use conisub::prelude::*;
//! use nalgebra::Point2;
//!
//! let mut curve = Curve::from_vertices(
//!     vec![
//!         Point2::new(0.0, 0.0),
//!         Point2::new(3.0, 0.0),
//!         Point2::new(3.0, 1.0),
//!         Point2::new(0.0, 2.0),
//!     ],
//!     true,
//! );
//!
//! let settings = SubdivisionSettings::default();
//! let refiner = NormalRefiner::new(settings, RefineOptions::default().with_test_subdiv_level(2));
//! refiner.refine(&mut curve);
//!
//! let mut subdivider = ConicSubdivider::new(settings);
//! subdivider.subdivide(&mut curve, 3);
//! assert_eq!(curve.len(), 32);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod curve;
pub mod error;
pub mod geom;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use conisub::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::conic::{Conic, ConicKind, RootSelection};
    pub use crate::algo::curvature::{calc_curvature, curvature_profile, CurvatureType};
    pub use crate::algo::fit::{ConicFitter, PatchPoint};
    pub use crate::algo::progress::{CancelToken, Progress};
    pub use crate::algo::refine::{NormalRefiner, RefineOptions, SmoothnessPenalty};
    pub use crate::algo::subdivide::{conic_subdivide, ConicSubdivider, SubdivisionSettings};
    pub use crate::curve::{Curve, NormalEstimate};
    pub use crate::error::{CurveError, Result};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
