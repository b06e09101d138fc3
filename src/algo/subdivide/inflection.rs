//! Inflection point insertion (the convexity split).
//!
//! An edge `v1 v2` is an inflection edge when its neighbours `v0` and `v3`
//! lie on opposite sides of it. A new vertex with a custom normal is inserted
//! on every such edge so that each remaining edge has a locally convex
//! neighbourhood a single conic can follow.

use std::collections::BTreeSet;

use nalgebra::{Point2, Vector2};

use crate::curve::{unit_or_zero, Curve};
use crate::geom::{angle_between, orient, perp};

use super::patch::same_half_plane;
use super::{ConicSubdivider, SubdivisionSettings};

impl ConicSubdivider {
    /// A copy of `curve` with an inflection point inserted on every
    /// non-convex edge.
    ///
    /// The inflection set of the subdivider must describe `curve`. Afterwards
    /// it holds the inserted points together with the previous inflection
    /// points, all indexed into the returned curve, so splitting a curve that
    /// was already split keeps its barriers. Previous indices that are out of
    /// range or lack a custom normal are dropped. Inserted points carry
    /// custom normals; every other vertex is copied unchanged.
    pub fn get_infl_point_curve(&mut self, curve: &Curve) -> Curve {
        let before = self.inflection_points.len();
        let (split, points) = insert_inflection_points(curve, &self.settings, &self.inflection_points);
        if points.len() > before {
            log::debug!("Inserted {} inflection points", points.len() - before);
        }
        self.inflection_points = points;
        split
    }
}

/// Split every non-convex edge of `curve`; see [`ConicSubdivider::get_infl_point_curve`].
///
/// `existing` inflection indices of `curve` are carried over, shifted past
/// the points inserted before them.
pub(crate) fn insert_inflection_points(
    curve: &Curve,
    settings: &SubdivisionSettings,
    existing: &BTreeSet<usize>,
) -> (Curve, BTreeSet<usize>) {
    let mut out = Curve::new(curve.is_closed());
    let mut points = BTreeSet::new();

    for i in 0..curve.len() {
        if existing.contains(&i) && curve.is_custom_normal(i) {
            points.insert(out.len());
        }
        out.push_parts(curve.vertex(i), curve.normal(i), curve.is_custom_normal(i));
        if let Some((position, normal)) = inflection_on_edge(curve, i, settings) {
            points.insert(out.len());
            out.push_parts(position, normal, true);
        }
    }

    (out, points)
}

/// Inflection point and normal for the edge from `i` to its successor, if
/// that edge is non-convex.
fn inflection_on_edge(
    curve: &Curve,
    i: usize,
    settings: &SubdivisionSettings,
) -> Option<(Point2<f64>, Vector2<f64>)> {
    let n = curve.len();
    let window = if curve.is_closed() {
        n >= 3
    } else {
        i >= 1 && i + 2 < n
    };
    if !window {
        return None;
    }

    let i2 = curve.next_index(i);
    let v0 = curve.vertex(curve.prev_index(i));
    let v1 = curve.vertex(i);
    let v2 = curve.vertex(i2);
    let v3 = curve.vertex(curve.next_index(i2));

    if v0 == v1 || v1 == v2 || v2 == v3 {
        return None;
    }
    if same_half_plane(&v0, &v1, &v2, &v3, settings.epsilon) {
        return None;
    }

    let edge = v2 - v1;
    let ratio = if settings.weighted_infl_point_location {
        let a1 = angle_between(&(v1 - v0), &edge);
        let a2 = angle_between(&edge, &(v3 - v2));
        if a1 + a2 > 0.0 {
            if settings.gravitate_smaller_angles {
                a1 / (a1 + a2)
            } else {
                a2 / (a1 + a2)
            }
        } else {
            0.5
        }
    } else {
        0.5
    };
    let position = v1 + edge * ratio;

    let orth = orient(unit_or_zero(perp(&edge)), &(curve.normal(i) + curve.normal(i2)));
    let from_start = side_normal(&orth, &edge, &(v1 - v0), settings);
    let from_end = side_normal(&orth, &edge, &(v3 - v2), settings);
    let normal = if from_start.dot(&orth) >= from_end.dot(&orth) {
        from_start
    } else {
        from_end
    };

    Some((position, normal))
}

/// Candidate inflection normal from one side of the edge.
///
/// Blends the edge perpendicular `orth` with the normal of the neighbouring
/// edge `side`. The blend factor is 0 when the corner between the two edges
/// is straight and 0.5 when it is a right angle.
fn side_normal(
    orth: &Vector2<f64>,
    edge: &Vector2<f64>,
    side: &Vector2<f64>,
    settings: &SubdivisionSettings,
) -> Vector2<f64> {
    let theta = std::f64::consts::PI - angle_between(edge, side);
    let gamma = 0.5 - (theta / std::f64::consts::PI - 0.5).abs();
    let side_normal = orient(unit_or_zero(perp(side)), orth);

    let mut normal = orth * (1.0 - gamma) + side_normal * gamma;
    if settings.area_weighted_normals {
        let (le, ls) = (edge.norm(), side.norm());
        let w = le / (le + ls);
        normal = normal * (1.0 - w) + orth * w;
    }
    unit_or_zero(normal)
}
