//! End-to-end runs through the document collaborators and the segmentation core

use route_splitter_lib::document::{self, kml, kmz};
use route_splitter_lib::{
    Coordinate, Feature, Geodetic, Geometry, Polyline, RouteSplitter, SplitConfig, SplitError,
    segment_route,
};
use std::io::Cursor;

const SOURCE: &str = "EPSG:4326";
const UTM_19S: &str = "EPSG:32719";

fn route() -> Polyline<Geodetic> {
    Polyline::new(vec![
        Coordinate::with_elevation(-70.700, -33.450, 540.0),
        Coordinate::with_elevation(-70.690, -33.452, 545.0),
        Coordinate::with_elevation(-70.680, -33.455, 551.0),
        Coordinate::with_elevation(-70.670, -33.455, 560.0),
        Coordinate::with_elevation(-70.660, -33.458, 566.0),
    ])
    .unwrap()
}

fn source_features() -> Vec<Feature> {
    vec![
        Feature::new(Some("Ruta".to_string()), Geometry::Line(route())),
        Feature::new(
            Some("Km 2".to_string()),
            Geometry::Point(Coordinate::new(-70.6755, -33.4552)),
        ),
        Feature::new(
            Some("Km 1".to_string()),
            Geometry::Point(Coordinate::new(-70.6850, -33.4531)),
        ),
    ]
}

fn kmz_bytes(features: &[Feature], name: &str) -> Vec<u8> {
    let text = kml::write_kml(features, name).unwrap();
    kmz::package_kml(Cursor::new(Vec::new()), &text)
        .unwrap()
        .into_inner()
}

fn assert_close(a: &Coordinate<Geodetic>, b: &Coordinate<Geodetic>, eps: f64) {
    assert!(
        (a.longitude() - b.longitude()).abs() < eps && (a.latitude() - b.latitude()).abs() < eps,
        "{a:?} is not within {eps} of {b:?}"
    );
}

#[test]
fn test_kmz_route_and_markers_to_kmz_segments() {
    let input = kmz_bytes(&source_features(), "Entrada");

    let features = kml::parse_kml(&kmz::extract_kml(Cursor::new(input)).unwrap()).unwrap();
    let line = document::first_line(&features).unwrap();
    let markers = document::points(&features).unwrap();
    assert_eq!(markers.len(), 2);

    let segments = segment_route(line, &markers, SOURCE, UTM_19S).unwrap();
    assert_eq!(segments.len(), 3);

    let output = kmz_bytes(&document::segments_to_features(&segments, "Tramo {i}"), "Salida");
    let written = kml::parse_kml(&kmz::extract_kml(Cursor::new(output)).unwrap()).unwrap();
    assert_eq!(written.len(), 3);

    let names: Vec<_> = written.iter().map(|f| f.name.clone().unwrap()).collect();
    assert_eq!(names, ["Tramo 1", "Tramo 2", "Tramo 3"]);

    let lines: Vec<&Polyline<Geodetic>> = written
        .iter()
        .map(|f| match &f.geometry {
            Geometry::Line(line) => line,
            other => panic!("expected a line, got {other:?}"),
        })
        .collect();

    // Ends of the route are preserved and consecutive segments share a seam
    assert_close(lines[0].first(), route().first(), 1e-7);
    assert_close(lines[2].last(), route().last(), 1e-7);
    for pair in lines.windows(2) {
        assert_close(pair[0].last(), pair[1].first(), 1e-9);
    }
    // The "Km 1" marker comes first along the route even though it was listed second
    assert!((lines[0].last().longitude() + 70.685).abs() < 1e-3);
    assert!((lines[1].last().longitude() + 70.6755).abs() < 1e-3);
}

#[test]
fn test_gpx_round_trip_keeps_elevation() {
    let mut input = Vec::new();
    document::write_gpx(&mut input, &source_features(), "Entrada").unwrap();

    let features = document::read_gpx(Cursor::new(input)).unwrap();
    let line = document::first_line(&features).unwrap();
    assert_eq!(line.first().elevation(), Some(540.0));
    let markers = document::points(&features).unwrap();

    let segments = segment_route(line, &markers, SOURCE, UTM_19S).unwrap();
    let mut output = Vec::new();
    document::write_gpx(
        &mut output,
        &document::segments_to_features(&segments, "Segment {i}"),
        "Salida",
    )
    .unwrap();

    let written = document::read_gpx(Cursor::new(output)).unwrap();
    assert_eq!(written.len(), 3);
    match &written[2].geometry {
        Geometry::Line(line) => assert_eq!(line.last().elevation(), Some(566.0)),
        other => panic!("expected a line, got {other:?}"),
    }
}

#[test]
fn test_markers_are_optional() {
    let features = vec![Feature::new(None, Geometry::Line(route()))];
    let line = document::first_line(&features).unwrap();
    let segments = segment_route(line, &[], SOURCE, UTM_19S).unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].line().len(), route().len());
}

#[test]
fn test_document_without_line() {
    let text = kml::write_kml(&source_features()[1..], "Solo puntos").unwrap();
    let features = kml::parse_kml(&text).unwrap();
    assert!(matches!(
        document::first_line(&features),
        Err(SplitError::NoGeometryFound(_))
    ));
}

#[test]
fn test_custom_config_and_auto_utm() {
    let line = route();
    let planar = route_splitter_lib::Crs::utm_zone_for(
        line.first().longitude(),
        line.first().latitude(),
    )
    .unwrap();
    assert_eq!(planar.to_string(), UTM_19S);

    let splitter = RouteSplitter::new(SplitConfig {
        name_template: "Parte {i}".to_string(),
        parallel_projection: false,
        ..SplitConfig::default()
    });
    let markers = vec![Coordinate::new(-70.6755, -33.4552)];
    let segments = splitter
        .split(&line, &markers, SOURCE, &planar.to_string())
        .unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(
        segments[1].name(&splitter.config().name_template),
        "Parte 2"
    );
}

#[test]
fn test_files_on_disk() {
    let dir = std::env::temp_dir().join(format!("route-splitter-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    for extension in ["kml", "kmz", "gpx"] {
        let path = dir.join(format!("route.{extension}"));
        document::write_features(&path, &source_features(), "route").unwrap();
        let features = document::read_features(&path).unwrap();
        assert_eq!(document::first_line(&features).unwrap().len(), 5);
        assert_eq!(document::points(&features).unwrap().len(), 2);
    }

    let unsupported = dir.join("route.geojson");
    assert!(matches!(
        document::write_features(&unsupported, &source_features(), "route"),
        Err(SplitError::UnsupportedFormat(_))
    ));

    std::fs::remove_dir_all(&dir).unwrap();
}
