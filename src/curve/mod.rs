//! Planar curve container.
//!
//! A [`Curve`] is an ordered list of vertices with one normal and one
//! "custom normal" flag per vertex, either open or closed. It is the control
//! polygon fed to the subdivider and also the type the subdivider produces.
//!
//! # Normals
//!
//! Normals are stored as unit vectors. Vertices whose normal was supplied by
//! the caller (or placed by an algorithm that must not be overridden, such as
//! inflection point insertion) are flagged as *custom*; every other normal is
//! derived from the neighbouring edges and recomputed after geometric edits.
//!
//! # Indexing
//!
//! [`Curve::next_index`] and [`Curve::prev_index`] wrap around on closed
//! curves and clamp at the ends of open curves.
//!
//! # Example
//!
//! ```
//! use conisub::curve::Curve;
//! use nalgebra::Point2;
//!
//! let square = Curve::from_vertices(
//!     vec![
//!         Point2::new(0.0, 0.0),
//!         Point2::new(1.0, 0.0),
//!         Point2::new(1.0, 1.0),
//!         Point2::new(0.0, 1.0),
//!     ],
//!     true,
//! );
//! assert_eq!(square.len(), 4);
//! assert_eq!(square.next_index(3), 0);
//! assert_eq!(square.prev_index(0), 3);
//! ```

mod normals;

pub use normals::NormalEstimate;

pub(crate) use normals::unit_or_zero;

use nalgebra::{Point2, Vector2};

use crate::error::{CurveError, Result};

/// An open or closed planar curve with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    /// Vertex positions in curve order.
    pub(crate) vertices: Vec<Point2<f64>>,

    /// Unit normal per vertex.
    pub(crate) normals: Vec<Vector2<f64>>,

    /// True where the normal must not be recomputed automatically.
    pub(crate) custom_normals: Vec<bool>,

    /// Whether the last vertex connects back to the first.
    pub(crate) closed: bool,
}

impl Curve {
    /// Create an empty curve.
    pub fn new(closed: bool) -> Self {
        Self {
            vertices: Vec::new(),
            normals: Vec::new(),
            custom_normals: Vec::new(),
            closed,
        }
    }

    /// Create a curve from vertices, estimating all normals.
    pub fn from_vertices(vertices: Vec<Point2<f64>>, closed: bool) -> Self {
        let n = vertices.len();
        let mut curve = Self {
            vertices,
            normals: vec![Vector2::zeros(); n],
            custom_normals: vec![false; n],
            closed,
        };
        curve.recalculate_normals(NormalEstimate::Uniform);
        curve
    }

    /// Create a curve from vertices and explicit normals.
    ///
    /// Normals are normalized and flagged as custom.
    ///
    /// # Errors
    ///
    /// - [`CurveError::LengthMismatch`] if the lists differ in length
    /// - [`CurveError::NonFiniteVertex`] for NaN or infinite coordinates
    /// - [`CurveError::DegenerateNormal`] for zero or non-finite normals
    pub fn from_parts(
        vertices: Vec<Point2<f64>>,
        normals: Vec<Vector2<f64>>,
        closed: bool,
    ) -> Result<Self> {
        if vertices.len() != normals.len() {
            return Err(CurveError::LengthMismatch {
                vertices: vertices.len(),
                normals: normals.len(),
            });
        }

        if let Some(index) = vertices.iter().position(|v| !v.coords.iter().all(|c| c.is_finite())) {
            return Err(CurveError::NonFiniteVertex { index });
        }

        let normals = normals
            .into_iter()
            .enumerate()
            .map(|(index, n)| {
                if n.iter().all(|c| c.is_finite()) {
                    n.try_normalize(0.0)
                        .ok_or(CurveError::DegenerateNormal { index })
                } else {
                    Err(CurveError::DegenerateNormal { index })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let n = vertices.len();
        Ok(Self {
            vertices,
            normals,
            custom_normals: vec![true; n],
            closed,
        })
    }

    /// Number of vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the curve has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether the curve is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Open or close the curve. Automatic normals at the ends are refreshed.
    pub fn set_closed(&mut self, closed: bool) {
        self.closed = closed;
        if !self.is_empty() {
            let last = self.len() - 1;
            self.refresh_normal(0);
            self.refresh_normal(last);
        }
    }

    /// Position of vertex `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[inline]
    pub fn vertex(&self, i: usize) -> Point2<f64> {
        self.vertices[i]
    }

    /// Normal of vertex `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[inline]
    pub fn normal(&self, i: usize) -> Vector2<f64> {
        self.normals[i]
    }

    /// Whether vertex `i` carries a custom normal.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    #[inline]
    pub fn is_custom_normal(&self, i: usize) -> bool {
        self.custom_normals[i]
    }

    /// All vertex positions.
    #[inline]
    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    /// All normals.
    #[inline]
    pub fn normals(&self) -> &[Vector2<f64>] {
        &self.normals
    }

    /// All custom normal flags.
    #[inline]
    pub fn custom_normals(&self) -> &[bool] {
        &self.custom_normals
    }

    /// Whether any vertex carries a custom normal.
    pub fn has_custom_normals(&self) -> bool {
        self.custom_normals.iter().any(|&c| c)
    }

    /// Index after `i`: wraps on closed curves, clamps on open ones.
    #[inline]
    pub fn next_index(&self, i: usize) -> usize {
        let n = self.len();
        if n == 0 {
            0
        } else if i + 1 < n {
            i + 1
        } else if self.closed {
            0
        } else {
            n - 1
        }
    }

    /// Index before `i`: wraps on closed curves, clamps on open ones.
    #[inline]
    pub fn prev_index(&self, i: usize) -> usize {
        let n = self.len();
        if n == 0 {
            0
        } else if i > 0 {
            i - 1
        } else if self.closed {
            n - 1
        } else {
            0
        }
    }

    /// Number of edges: `len` for closed curves, `len - 1` for open ones.
    #[inline]
    pub fn num_edges(&self) -> usize {
        match (self.len(), self.closed) {
            (0, _) => 0,
            (n, true) => n,
            (n, false) => n - 1,
        }
    }

    /// Whether `i` has a neighbour on both sides.
    #[inline]
    pub fn is_interior(&self, i: usize) -> bool {
        self.closed || (i > 0 && i + 1 < self.len())
    }

    /// Move vertex `i`, refreshing the automatic normals around it.
    pub fn set_vertex(&mut self, i: usize, position: Point2<f64>) -> Result<()> {
        CurveError::check_index(i, self.len())?;
        self.vertices[i] = position;
        self.refresh_around(i);
        Ok(())
    }

    /// Set the normal of vertex `i` and flag it as custom.
    pub fn set_normal(&mut self, i: usize, normal: Vector2<f64>) -> Result<()> {
        CurveError::check_index(i, self.len())?;
        self.normals[i] = unit_or_zero(normal);
        self.custom_normals[i] = true;
        Ok(())
    }

    /// Clear the custom flag of vertex `i` and re-estimate its normal.
    pub fn reset_normal(&mut self, i: usize) -> Result<()> {
        CurveError::check_index(i, self.len())?;
        self.custom_normals[i] = false;
        self.refresh_normal(i);
        Ok(())
    }

    /// Append a vertex with an automatic normal.
    pub fn push_vertex(&mut self, position: Point2<f64>) {
        let i = self.len();
        self.vertices.push(position);
        self.normals.push(Vector2::zeros());
        self.custom_normals.push(false);
        self.refresh_around(i);
    }

    /// Insert a vertex before index `i` (`i == len` appends).
    pub fn insert_vertex(&mut self, i: usize, position: Point2<f64>) -> Result<()> {
        CurveError::check_index(i, self.len() + 1)?;
        self.vertices.insert(i, position);
        self.normals.insert(i, Vector2::zeros());
        self.custom_normals.insert(i, false);
        self.refresh_around(i);
        Ok(())
    }

    /// Insert a vertex with a given normal before index `i`.
    pub fn insert_vertex_with_normal(
        &mut self,
        i: usize,
        position: Point2<f64>,
        normal: Vector2<f64>,
        custom: bool,
    ) -> Result<()> {
        CurveError::check_index(i, self.len() + 1)?;
        self.vertices.insert(i, position);
        self.normals.insert(i, unit_or_zero(normal));
        self.custom_normals.insert(i, custom);
        if !custom {
            self.refresh_normal(i);
        }
        Ok(())
    }

    /// Remove vertex `i`, returning its position.
    pub fn remove_vertex(&mut self, i: usize) -> Result<Point2<f64>> {
        CurveError::check_index(i, self.len())?;
        let removed = self.vertices.remove(i);
        self.normals.remove(i);
        self.custom_normals.remove(i);

        if !self.is_empty() {
            let after = i.min(self.len() - 1);
            let before = self.prev_index(i.min(self.len()));
            self.refresh_normal(before);
            self.refresh_normal(after);
        }
        Ok(removed)
    }

    /// Translate every vertex by `offset`. Normals are unchanged.
    pub fn translate(&mut self, offset: &Vector2<f64>) {
        for v in &mut self.vertices {
            *v += offset;
        }
    }

    /// Re-estimate every non-custom normal.
    pub fn recalculate_normals(&mut self, method: NormalEstimate) {
        for i in 0..self.len() {
            if !self.custom_normals[i] {
                self.normals[i] = self.estimate_normal(i, method);
            }
        }
    }

    /// Clear all custom flags and re-estimate every normal.
    pub fn reset_all_normals(&mut self, method: NormalEstimate) {
        self.custom_normals.iter_mut().for_each(|c| *c = false);
        self.recalculate_normals(method);
    }

    /// Estimate the normal at `i` from its neighbours, ignoring the stored one.
    pub fn estimate_normal(&self, i: usize, method: NormalEstimate) -> Vector2<f64> {
        let prev = (self.closed || i > 0).then(|| &self.vertices[self.prev_index(i)]);
        let next = (self.closed || i + 1 < self.len()).then(|| &self.vertices[self.next_index(i)]);
        normals::estimate_normal(prev, &self.vertices[i], next, method)
    }

    /// Copy all data into `target`, reusing its allocations.
    pub fn copy_into(&self, target: &mut Curve) {
        target.vertices.clone_from(&self.vertices);
        target.normals.clone_from(&self.normals);
        target.custom_normals.clone_from(&self.custom_normals);
        target.closed = self.closed;
    }

    /// Resize to `len` vertices for in-place filling, keeping allocations.
    pub(crate) fn reset_for_fill(&mut self, len: usize, closed: bool) {
        self.vertices.clear();
        self.vertices.resize(len, Point2::origin());
        self.normals.clear();
        self.normals.resize(len, Vector2::zeros());
        self.custom_normals.clear();
        self.custom_normals.resize(len, false);
        self.closed = closed;
    }

    /// Overwrite vertex `i` without refreshing neighbours.
    #[inline]
    pub(crate) fn put(&mut self, i: usize, position: Point2<f64>, normal: Vector2<f64>, custom: bool) {
        self.vertices[i] = position;
        self.normals[i] = normal;
        self.custom_normals[i] = custom;
    }

    /// Append a vertex with its normal and custom flag as stored.
    pub(crate) fn push_parts(&mut self, position: Point2<f64>, normal: Vector2<f64>, custom: bool) {
        self.vertices.push(position);
        self.normals.push(normal);
        self.custom_normals.push(custom);
    }

    fn refresh_around(&mut self, i: usize) {
        let prev = self.prev_index(i);
        let next = self.next_index(i);
        self.refresh_normal(prev);
        self.refresh_normal(i);
        self.refresh_normal(next);
    }

    fn refresh_normal(&mut self, i: usize) {
        if !self.custom_normals[i] {
            self.normals[i] = self.estimate_normal(i, NormalEstimate::Uniform);
        }
    }

    /// Check the length invariant.
    pub fn is_valid(&self) -> bool {
        self.vertices.len() == self.normals.len() && self.vertices.len() == self.custom_normals.len()
    }
}
