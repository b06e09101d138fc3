//! Curve processing algorithms.
//!
//! - **Conics**: implicit quadratic curves, ray intersection, classification
//! - **Fitting**: least-squares conic fitting to points with normals
//! - **Subdivision**: conic-based non-linear subdivision with inflection splitting
//! - **Refinement**: normal optimization for smooth curvature
//! - **Curvature**: discrete curvature estimation

pub mod conic;
pub mod curvature;
pub mod fit;
pub mod progress;
pub mod refine;
pub mod subdivide;

pub use progress::Progress;
