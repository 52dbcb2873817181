//! GPX input and output through the `gpx` crate

use crate::coords::{Coordinate, Geodetic, Polyline};
use crate::document::{Feature, Geometry};
use crate::{Result, SplitError};
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use std::io::{Read, Write};

const CREATOR: &str = concat!("route-splitter ", env!("CARGO_PKG_VERSION"));

/// Read tracks, routes and waypoints as features
///
/// Each non-empty track segment and each route becomes a line named after its
/// track or route; each waypoint becomes a point. Tracks come first, then routes,
/// then waypoints.
pub fn read_gpx<R: Read>(reader: R) -> Result<Vec<Feature>> {
    let gpx = gpx::read(reader)?;
    let mut features = Vec::new();

    for track in &gpx.tracks {
        for segment in &track.segments {
            if let Some(line) = waypoints_to_line(&segment.points)? {
                features.push(Feature::new(track.name.clone(), Geometry::Line(line)));
            }
        }
    }
    for route in &gpx.routes {
        if let Some(line) = waypoints_to_line(&route.points)? {
            features.push(Feature::new(route.name.clone(), Geometry::Line(line)));
        }
    }
    for waypoint in &gpx.waypoints {
        features.push(Feature::new(
            waypoint.name.clone(),
            Geometry::Point(waypoint_to_coordinate(waypoint)),
        ));
    }

    tracing::debug!(
        "Read GPX with {} track(s), {} route(s), {} waypoint(s)",
        gpx.tracks.len(),
        gpx.routes.len(),
        gpx.waypoints.len()
    );
    Ok(features)
}

/// Write line features as one single-segment track each, points as waypoints
pub fn write_gpx<W: Write>(writer: W, features: &[Feature], document_name: &str) -> Result<()> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.to_string()),
        ..Default::default()
    };
    let mut metadata = gpx::Metadata::default();
    metadata.name = Some(document_name.to_string());
    gpx.metadata = Some(metadata);

    for feature in features {
        match &feature.geometry {
            Geometry::Line(line) => {
                let mut segment = TrackSegment::default();
                segment
                    .points
                    .extend(line.coords().iter().map(coordinate_to_waypoint));
                let mut track = Track::default();
                track.name = feature.name.clone();
                track.segments.push(segment);
                gpx.tracks.push(track);
            }
            Geometry::Point(point) => {
                let mut waypoint = coordinate_to_waypoint(point);
                waypoint.name = feature.name.clone();
                gpx.waypoints.push(waypoint);
            }
            Geometry::Other => {}
        }
    }

    gpx::write(&gpx, writer).map_err(SplitError::from)
}

fn waypoints_to_line(points: &[Waypoint]) -> Result<Option<Polyline<Geodetic>>> {
    if points.is_empty() {
        return Ok(None);
    }
    Polyline::new(points.iter().map(waypoint_to_coordinate).collect()).map(Some)
}

#[inline]
fn waypoint_to_coordinate(waypoint: &Waypoint) -> Coordinate<Geodetic> {
    let point = waypoint.point();
    match waypoint.elevation {
        Some(elevation) => Coordinate::with_elevation(point.x(), point.y(), elevation),
        None => Coordinate::new(point.x(), point.y()),
    }
}

#[inline]
fn coordinate_to_waypoint(coordinate: &Coordinate<Geodetic>) -> Waypoint {
    let mut waypoint = Waypoint::new(geo::Point::new(
        coordinate.longitude(),
        coordinate.latitude(),
    ));
    waypoint.elevation = coordinate.elevation();
    waypoint
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn create_test_waypoint(lat: f64, lon: f64) -> Waypoint {
        Waypoint::new(geo::Point::new(lon, lat))
    }

    fn create_test_gpx() -> Gpx {
        let mut gpx = Gpx {
            version: GpxVersion::Gpx11,
            ..Default::default()
        };
        let mut track = Track::default();
        track.name = Some("Ruta".to_string());
        let mut segment = TrackSegment::default();
        for i in 0..5 {
            segment
                .points
                .push(create_test_waypoint(-33.45, -70.70 + i as f64 * 0.01));
        }
        track.segments.push(segment);
        track.segments.push(TrackSegment::default());
        gpx.tracks.push(track);

        let mut waypoint = create_test_waypoint(-33.449, -70.675);
        waypoint.name = Some("Portón".to_string());
        waypoint.elevation = Some(600.0);
        gpx.waypoints.push(waypoint);
        gpx
    }

    #[test]
    fn test_read_tracks_and_waypoints() {
        let mut buffer = Vec::new();
        gpx::write(&create_test_gpx(), &mut buffer).unwrap();

        let features = read_gpx(Cursor::new(buffer)).unwrap();
        // The empty track segment is skipped
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name.as_deref(), Some("Ruta"));
        match &features[0].geometry {
            Geometry::Line(line) => assert_eq!(line.len(), 5),
            other => panic!("expected a line, got {other:?}"),
        }
        assert_eq!(features[1].name.as_deref(), Some("Portón"));
        match features[1].geometry {
            Geometry::Point(p) => {
                assert!((p.longitude() + 70.675).abs() < 1e-9);
                assert_eq!(p.elevation(), Some(600.0));
            }
            ref other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn test_write_then_read() {
        let features = vec![
            Feature::new(
                Some("Segment 1".to_string()),
                Geometry::Line(
                    Polyline::new(vec![
                        Coordinate::with_elevation(-70.70, -33.45, 500.0),
                        Coordinate::with_elevation(-70.69, -33.45, 505.0),
                    ])
                    .unwrap(),
                ),
            ),
            Feature::new(
                Some("Segment 2".to_string()),
                Geometry::Line(Polyline::from_xy(&[(-70.69, -33.45), (-70.68, -33.45)]).unwrap()),
            ),
        ];
        let mut buffer = Vec::new();
        write_gpx(&mut buffer, &features, "segments").unwrap();

        let parsed = read_gpx(Cursor::new(buffer)).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name.as_deref(), Some("Segment 1"));
        assert_eq!(parsed[1].name.as_deref(), Some("Segment 2"));
        match &parsed[0].geometry {
            Geometry::Line(line) => {
                assert_eq!(line.first().elevation(), Some(500.0));
                assert!((line.last().longitude() + 70.69).abs() < 1e-9);
            }
            other => panic!("expected a line, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_gpx_is_an_error() {
        let result = read_gpx(Cursor::new(b"<gpx><trk>".to_vec()));
        assert!(matches!(result, Err(SplitError::GpxParse(_))));
    }
}
