//! Patch extraction: the local neighbourhood a conic is fitted to.
//!
//! A patch always contains the two endpoints of the edge being subdivided
//! and grows outward on both sides, one vertex per side per step. A side
//! stops growing when
//!
//! - its outermost vertex is an inflection point (a convexity barrier),
//! - the window formed by the candidate and the three vertices next to it is
//!   not convex (see [`same_half_plane`]),
//! - it reaches the end of an open curve, or
//! - on a closed curve, every vertex is already part of the patch.

use std::collections::BTreeSet;

use nalgebra::Point2;

use crate::algo::fit::PatchPoint;
use crate::curve::Curve;
use crate::geom::cross;

use super::{SubdivisionSettings, MAX_PATCH_SIZE};

/// Whether `v0` and `v3` lie on the same side of the line through `v1` and `v2`.
///
/// This is the local convexity test of the window `v0 v1 v2 v3`. Repeated
/// points and near-flat configurations (normalized cross products within
/// `epsilon` of zero) count as the same side.
pub fn same_half_plane(
    v0: &Point2<f64>,
    v1: &Point2<f64>,
    v2: &Point2<f64>,
    v3: &Point2<f64>,
    epsilon: f64,
) -> bool {
    let edge = v2 - v1;
    let before = v0 - v1;
    let after = v3 - v2;

    let le = edge.norm();
    let lb = before.norm();
    let la = after.norm();
    if le == 0.0 || lb == 0.0 || la == 0.0 {
        return true;
    }

    let s0 = cross(&edge, &before) / (le * lb);
    let s3 = cross(&edge, &after) / (le * la);
    if s0.abs() <= epsilon || s3.abs() <= epsilon {
        return true;
    }
    (s0 > 0.0) == (s3 > 0.0)
}

/// Previous index, or `None` past the start of an open curve.
#[inline]
fn step_back(curve: &Curve, i: usize) -> Option<usize> {
    (curve.is_closed() || i > 0).then(|| curve.prev_index(i))
}

/// Next index, or `None` past the end of an open curve.
#[inline]
fn step_forward(curve: &Curve, i: usize) -> Option<usize> {
    (curve.is_closed() || i + 1 < curve.len()).then(|| curve.next_index(i))
}

/// Whether the window `(a, b, c, d)` is convex; missing ends pass.
fn window_is_convex(curve: &Curve, window: [Option<usize>; 4], epsilon: f64) -> bool {
    match window {
        [Some(a), Some(b), Some(c), Some(d)] => same_half_plane(
            &curve.vertex(a),
            &curve.vertex(b),
            &curve.vertex(c),
            &curve.vertex(d),
            epsilon,
        ),
        _ => true,
    }
}

/// Fill `out` with the patch around `edge` (from `edge` to its successor).
///
/// `max_patch_size` is the half-width: at most `max_patch_size - 1` extra
/// vertices per side, capped by [`MAX_PATCH_SIZE`]. Points are emitted in
/// curve order.
pub(crate) fn fill_patch(
    curve: &Curve,
    edge: usize,
    max_patch_size: usize,
    settings: &SubdivisionSettings,
    barriers: &BTreeSet<usize>,
    out: &mut Vec<PatchPoint>,
) {
    out.clear();
    let n = curve.len();
    if n == 0 || edge >= n {
        return;
    }

    let left = edge;
    let right = curve.next_index(edge);
    let extra = max_patch_size.clamp(1, MAX_PATCH_SIZE) - 1;

    let mut lefts = [0usize; MAX_PATCH_SIZE];
    let mut rights = [0usize; MAX_PATCH_SIZE];
    let (mut nl, mut nr) = (0, 0);
    let (mut l_cur, mut r_cur) = (left, right);
    let (mut l_open, mut r_open) = (left != right, left != right);
    let mut used = if left == right { 1 } else { 2 };

    for _ in 0..extra {
        if l_open {
            l_open = false;
            if !barriers.contains(&l_cur) && used < n {
                if let Some(cand) = step_back(curve, l_cur) {
                    let inner = step_forward(curve, l_cur);
                    let inner2 = inner.and_then(|i| step_forward(curve, i));
                    let window = [Some(cand), Some(l_cur), inner, inner2];
                    if window_is_convex(curve, window, settings.epsilon) {
                        lefts[nl] = cand;
                        nl += 1;
                        used += 1;
                        l_cur = cand;
                        l_open = true;
                    }
                }
            }
        }

        if r_open {
            r_open = false;
            if !barriers.contains(&r_cur) && used < n {
                if let Some(cand) = step_forward(curve, r_cur) {
                    let inner = step_back(curve, r_cur);
                    let inner2 = inner.and_then(|i| step_back(curve, i));
                    let window = [inner2, inner, Some(r_cur), Some(cand)];
                    if window_is_convex(curve, window, settings.epsilon) {
                        rights[nr] = cand;
                        nr += 1;
                        used += 1;
                        r_cur = cand;
                        r_open = true;
                    }
                }
            }
        }

        if !l_open && !r_open {
            break;
        }
    }

    let outer = |i: usize| {
        PatchPoint::weighted(
            curve.vertex(i),
            curve.normal(i),
            settings.outer_point_weight,
            settings.outer_normal_weight,
        )
    };
    let middle = |i: usize| {
        PatchPoint::weighted(
            curve.vertex(i),
            curve.normal(i),
            settings.middle_point_weight,
            settings.middle_normal_weight,
        )
    };

    out.extend(lefts[..nl].iter().rev().map(|&i| outer(i)));
    out.push(middle(left));
    if right != left {
        out.push(middle(right));
    }
    out.extend(rights[..nr].iter().map(|&i| outer(i)));
}
