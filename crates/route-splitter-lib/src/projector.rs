//! Nearest-point projection of markers onto the reference line

use crate::coords::{Coordinate, Planar, Polyline};
use crate::{Result, SplitError};
use geo::{Closest, ClosestPoint, Distance, Euclidean, Line, Point};
use rayon::prelude::*;

/// A marker's nearest location on the reference line
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectedPoint {
    /// Nearest point on the line, in planar coordinates
    pub position: Coordinate<Planar>,
    /// Distance from the start of the line to `position`, measured along the line
    pub arc_length: f64,
    /// Index of the originating marker in the caller's marker list
    pub source_marker_index: usize,
    /// Straight-line distance between the marker and `position`
    pub offset: f64,
}

/// Project one marker onto `line`
///
/// Every sub-segment is visited, the perpendicular foot is clamped to the
/// sub-segment, and the global minimum wins. On exact distance ties the piece
/// closest to the start of the line is kept, so the result is deterministic.
/// No distance threshold applies: a far-away marker still projects.
///
/// Fails with `InvalidGeometry` for a line with fewer than two coordinates or
/// when the line or the marker has a non-finite coordinate.
pub fn project(
    line: &Polyline<Planar>,
    marker: &Coordinate<Planar>,
    source_marker_index: usize,
) -> Result<ProjectedPoint> {
    line.ensure_splittable()?;
    line.ensure_finite()?;
    nearest(line, marker, source_marker_index)
}

/// Project every marker, in parallel when `parallel` is set
///
/// Output order matches `markers`; each entry records its marker index.
pub fn project_all(
    line: &Polyline<Planar>,
    markers: &[Coordinate<Planar>],
    parallel: bool,
) -> Result<Vec<ProjectedPoint>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("projector::project_all");

    line.ensure_splittable()?;
    line.ensure_finite()?;
    if parallel {
        markers
            .par_iter()
            .enumerate()
            .map(|(index, marker)| nearest(line, marker, index))
            .collect()
    } else {
        markers
            .iter()
            .enumerate()
            .map(|(index, marker)| nearest(line, marker, index))
            .collect()
    }
}

/// Nearest point search over a line already known to be splittable and finite
fn nearest(
    line: &Polyline<Planar>,
    marker: &Coordinate<Planar>,
    source_marker_index: usize,
) -> Result<ProjectedPoint> {
    if !marker.is_finite() {
        return Err(SplitError::InvalidGeometry(format!(
            "marker {source_marker_index} is not finite: {marker:?}"
        )));
    }

    let target = Point::from(marker.coord());
    let mut best: Option<ProjectedPoint> = None;
    let mut travelled = 0.0;

    for pair in line.coords().windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let start = Point::from(a.coord());
        let piece = Line::new(a.coord(), b.coord());
        let piece_length = Euclidean.distance(start, Point::from(b.coord()));
        let foot = match piece.closest_point(&target) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => p,
            // Zero-length piece
            Closest::Indeterminate => start,
        };
        let offset = Euclidean.distance(foot, target);

        if best.is_none_or(|current| offset < current.offset) {
            let along = Euclidean.distance(start, foot);
            // Only used to carry elevation across the piece
            let t = if piece_length > 0.0 {
                (along / piece_length).clamp(0.0, 1.0)
            } else {
                0.0
            };
            best = Some(ProjectedPoint {
                position: Coordinate::from_coord(foot.0, a.lerp(b, t).elevation()),
                arc_length: travelled + along,
                source_marker_index,
                offset,
            });
        }
        travelled += piece_length;
    }

    let mut point = best.ok_or_else(|| {
        SplitError::InvalidGeometry("line has no segments to project onto".to_string())
    })?;
    point.arc_length = point.arc_length.clamp(0.0, travelled);
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar(x: f64, y: f64) -> Coordinate<Planar> {
        Coordinate::new(x, y)
    }

    fn straight_line() -> Polyline<Planar> {
        Polyline::from_xy(&[(0.0, 0.0), (10.0, 0.0)]).unwrap()
    }

    #[test]
    fn test_far_marker_projects_without_threshold() {
        let p = project(&straight_line(), &planar(5.0, 1000.0), 0).unwrap();
        assert!((p.position.x() - 5.0).abs() < 1e-12);
        assert!(p.position.y().abs() < 1e-12);
        assert!((p.arc_length - 5.0).abs() < 1e-12);
        assert!((p.offset - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_marker_beyond_ends_clamps() {
        let line = straight_line();
        let before = project(&line, &planar(-4.0, 3.0), 0).unwrap();
        assert_eq!(before.arc_length, 0.0);
        assert_eq!(before.position, planar(0.0, 0.0));

        let after = project(&line, &planar(25.0, -1.0), 1).unwrap();
        assert!((after.arc_length - 10.0).abs() < 1e-12);
        assert_eq!(after.position, planar(10.0, 0.0));
        assert_eq!(after.source_marker_index, 1);
    }

    #[test]
    fn test_arc_length_accumulates_over_vertices() {
        let line = Polyline::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]).unwrap();
        let p = project(&line, &planar(12.0, 4.0), 0).unwrap();
        assert!((p.position.x() - 10.0).abs() < 1e-12);
        assert!((p.position.y() - 4.0).abs() < 1e-12);
        assert!((p.arc_length - 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_length_pieces_are_harmless() {
        let line =
            Polyline::from_xy(&[(0.0, 0.0), (0.0, 0.0), (10.0, 0.0), (10.0, 0.0), (20.0, 0.0)])
                .unwrap();
        let p = project(&line, &planar(15.0, 2.0), 0).unwrap();
        assert!((p.arc_length - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_equidistant_pieces_prefer_earliest() {
        // A U-turn: the marker sits exactly between both legs
        let line = Polyline::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 2.0), (0.0, 2.0)]).unwrap();
        let p = project(&line, &planar(5.0, 1.0), 0).unwrap();
        assert!((p.arc_length - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_coincident_markers_share_arc_length() {
        let line = Polyline::from_xy(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]).unwrap();
        let a = project(&line, &planar(7.0, 3.0), 0).unwrap();
        let b = project(&line, &planar(7.0, -8.0), 1).unwrap();
        assert!((a.arc_length - b.arc_length).abs() < 1e-12);
    }

    #[test]
    fn test_elevation_interpolated_on_projection() {
        let line = Polyline::new(vec![
            Coordinate::with_elevation(0.0, 0.0, 100.0),
            Coordinate::with_elevation(10.0, 0.0, 200.0),
        ])
        .unwrap();
        let p = project(&line, &planar(2.5, 1.0), 0).unwrap();
        assert_eq!(p.position.elevation(), Some(125.0));
    }

    #[test]
    fn test_single_point_line_is_invalid() {
        let line = Polyline::from_xy(&[(0.0, 0.0)]).unwrap();
        assert!(matches!(
            project(&line, &planar(1.0, 1.0), 0),
            Err(SplitError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_non_finite_input_is_invalid() {
        let line = Polyline::from_xy(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]).unwrap();
        assert!(matches!(
            project(&line, &planar(f64::NAN, 1.0), 0),
            Err(SplitError::InvalidGeometry(_))
        ));
        assert!(matches!(
            project_all(&line, &[planar(5.0, 1.0), planar(3.0, f64::INFINITY)], true),
            Err(SplitError::InvalidGeometry(_))
        ));

        let broken = Polyline::from_xy(&[(0.0, 0.0), (f64::NAN, 0.0), (20.0, 0.0)]).unwrap();
        assert!(matches!(
            project_all(&broken, &[planar(5.0, 1.0)], false),
            Err(SplitError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_project_all_parallel_matches_sequential() {
        let line = Polyline::from_xy(&[(0.0, 0.0), (10.0, 0.0), (20.0, 5.0)]).unwrap();
        let markers: Vec<_> = (0..50)
            .map(|i| planar(i as f64 * 0.4, (i % 7) as f64 - 3.0))
            .collect();
        let sequential = project_all(&line, &markers, false).unwrap();
        let parallel = project_all(&line, &markers, true).unwrap();
        assert_eq!(sequential, parallel);
        for (i, p) in parallel.iter().enumerate() {
            assert_eq!(p.source_marker_index, i);
        }
    }
}
