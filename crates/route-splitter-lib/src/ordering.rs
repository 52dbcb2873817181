//! Deterministic ordering of projected points along the line

use crate::projector::ProjectedPoint;
use std::cmp::Ordering;

/// Sort projected points ascending by arc length, breaking ties by marker index
///
/// The order is the total order on `(arc_length, source_marker_index)`, so it is
/// ascending everywhere and does not depend on the order markers were given in.
/// Markers that project to the same place come out in input-index order. Points
/// that differ by less than the cut tolerance keep their arc order; the segmenter
/// cuts at the first of them and skips the rest as degenerate.
///
/// Nothing is dropped or merged here.
pub fn order(mut points: Vec<ProjectedPoint>) -> Vec<ProjectedPoint> {
    points.sort_by(exact_order);
    points
}

fn exact_order(a: &ProjectedPoint, b: &ProjectedPoint) -> Ordering {
    a.arc_length
        .total_cmp(&b.arc_length)
        .then(a.source_marker_index.cmp(&b.source_marker_index))
}
